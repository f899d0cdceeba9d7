//! Type-erased values that can cross the daemon boundary.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{FetchError, Result};

/// A value that can be shipped between the IDE and the Gradle daemon.
///
/// `TYPE_TAG` identifies the type on the wire. The receiving side can only
/// decode the value if its [`TypeCatalog`](crate::TypeCatalog) registered the
/// same tag, mirroring how a class must be loadable on both sides.
///
/// # Examples
///
/// ```
/// use gradle_fetch_core::{TransferValue, Transferable};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct SourceSets {
///     names: Vec<String>,
/// }
///
/// impl Transferable for SourceSets {
///     const TYPE_TAG: &'static str = "acme.SourceSets";
/// }
///
/// let value = TransferValue::new(SourceSets { names: vec!["main".into()] });
/// assert_eq!(value.type_tag(), "acme.SourceSets");
/// assert!(value.downcast_ref::<SourceSets>().is_some());
/// ```
pub trait Transferable: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Stable wire identifier of this type.
    const TYPE_TAG: &'static str;
}

/// Anything that can be turned into an [`EncodedValue`].
pub trait Encodable {
    fn type_tag(&self) -> &str;

    fn encode_bytes(&self) -> std::result::Result<Vec<u8>, serde_json::Error>;

    fn to_encoded(&self) -> Result<EncodedValue> {
        let bytes = self
            .encode_bytes()
            .map_err(|source| FetchError::Serialization {
                type_tag: self.type_tag().to_string(),
                source,
            })?;
        Ok(EncodedValue::new(self.type_tag(), bytes))
    }
}

impl<T: Transferable> Encodable for T {
    fn type_tag(&self) -> &str {
        T::TYPE_TAG
    }

    fn encode_bytes(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

trait ErasedValue: fmt::Debug + Send + Sync {
    fn tag(&self) -> &'static str;
    fn encode(&self) -> std::result::Result<Vec<u8>, serde_json::Error>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Transferable> ErasedValue for T {
    fn tag(&self) -> &'static str {
        T::TYPE_TAG
    }

    fn encode(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared, type-erased [`Transferable`] value.
///
/// Cheap to clone. Recover the concrete type with [`downcast_ref`](Self::downcast_ref).
#[derive(Clone)]
pub struct TransferValue(Arc<dyn ErasedValue>);

impl TransferValue {
    pub fn new<T: Transferable>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn type_tag(&self) -> &'static str {
        self.0.tag()
    }

    pub fn downcast_ref<T: Transferable>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Transferable>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Whether both handles point at the same decoded instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Encodable for TransferValue {
    fn type_tag(&self) -> &str {
        self.0.tag()
    }

    fn encode_bytes(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        self.0.encode()
    }
}

impl fmt::Debug for TransferValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Wire form of a value: its type tag and serialized bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedValue {
    tag: String,
    bytes: Bytes,
}

impl EncodedValue {
    pub fn new(tag: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            tag: tag.into(),
            bytes: bytes.into(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}
