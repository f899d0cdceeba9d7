//! Type catalogs: the decoding side of [`Transferable`].
//!
//! A [`TypeCatalog`] plays the role of a classloader. Every contributed query
//! names the [`ClassPath`] its results need, and the IDE decodes the results
//! with a catalog built for exactly that classpath.

use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{FetchError, Result};
use crate::issue::BuilderIssue;
use crate::value::{EncodedValue, TransferValue, Transferable};

type DecodeFn = fn(&[u8]) -> std::result::Result<TransferValue, serde_json::Error>;

fn decode_as<T: Transferable>(
    bytes: &[u8],
) -> std::result::Result<TransferValue, serde_json::Error> {
    serde_json::from_slice::<T>(bytes).map(TransferValue::new)
}

/// Set of classpath entries a query needs to decode its results.
///
/// Order and duplicates are irrelevant: two classpaths with the same entries
/// are equal and share one catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassPath {
    entries: BTreeSet<String>,
}

impl ClassPath {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Decoders for the value types visible on one classpath.
///
/// [`BuilderIssue`] is always registered.
#[derive(Clone)]
pub struct TypeCatalog {
    decoders: HashMap<&'static str, (DecodeFn, TypeId)>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        let mut catalog = Self {
            decoders: HashMap::new(),
        };
        catalog.register::<BuilderIssue>();
        catalog
    }

    pub fn register<T: Transferable>(&mut self) -> &mut Self {
        self.decoders
            .insert(T::TYPE_TAG, (decode_as::<T>, TypeId::of::<T>()));
        self
    }

    #[must_use]
    pub fn with<T: Transferable>(mut self) -> Self {
        self.register::<T>();
        self
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.decoders.contains_key(type_tag)
    }

    /// The concrete type `type_tag` decodes to in this catalog.
    pub fn decoded_type(&self, type_tag: &str) -> Option<TypeId> {
        self.decoders.get(type_tag).map(|(_, type_id)| *type_id)
    }

    pub fn decode(&self, encoded: &EncodedValue) -> Result<TransferValue> {
        let (decode, _) = self
            .decoders
            .get(encoded.tag())
            .ok_or_else(|| FetchError::UnknownType {
                type_tag: encoded.tag().to_string(),
            })?;
        decode(encoded.bytes()).map_err(|source| FetchError::Deserialization {
            type_tag: encoded.tag().to_string(),
            source,
        })
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.decoders.keys().collect();
        tags.sort();
        f.debug_struct("TypeCatalog").field("types", &tags).finish()
    }
}

/// Builds the catalog for a classpath.
pub trait CatalogProvider: Send + Sync {
    fn catalog_for(&self, classpath: &ClassPath) -> TypeCatalog;
}

impl<F> CatalogProvider for F
where
    F: Fn(&ClassPath) -> TypeCatalog + Send + Sync,
{
    fn catalog_for(&self, classpath: &ClassPath) -> TypeCatalog {
        self(classpath)
    }
}

/// Per-pass cache of catalogs keyed by classpath.
///
/// Entries sharing a classpath get the same `Arc`, so values decoded for
/// them come from a single catalog instance.
pub struct CatalogCache<'a> {
    provider: &'a dyn CatalogProvider,
    catalogs: HashMap<ClassPath, Arc<TypeCatalog>>,
}

impl<'a> CatalogCache<'a> {
    pub fn new(provider: &'a dyn CatalogProvider) -> Self {
        Self {
            provider,
            catalogs: HashMap::new(),
        }
    }

    pub fn catalog(&mut self, classpath: &ClassPath) -> Arc<TypeCatalog> {
        if let Some(catalog) = self.catalogs.get(classpath) {
            return Arc::clone(catalog);
        }
        tracing::debug!("building type catalog for {} classpath entries", classpath.len());
        let catalog = Arc::new(self.provider.catalog_for(classpath));
        self.catalogs.insert(classpath.clone(), Arc::clone(&catalog));
        catalog
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }
}

/// Per-pass cache of decoded values.
///
/// Identical encodings decode to one shared instance, as long as the
/// catalogs asking for them map the tag to the same type.
#[derive(Debug, Default)]
pub struct SharedValueCache {
    values: HashMap<(TypeId, EncodedValue), TransferValue>,
}

impl SharedValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(
        &mut self,
        catalog: &TypeCatalog,
        encoded: &EncodedValue,
    ) -> Result<TransferValue> {
        let Some(type_id) = catalog.decoded_type(encoded.tag()) else {
            return catalog.decode(encoded);
        };
        let key = (type_id, encoded.clone());
        if let Some(value) = self.values.get(&key) {
            return Ok(value.clone());
        }
        let value = catalog.decode(encoded)?;
        self.values.insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
