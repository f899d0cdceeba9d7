//! Decoding of shipped builders inside the daemon.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use gradle_fetch_core::{
    BuildInfoBuilder, CustomSerializedMap, EncodedValue, EntryKey, ErasedBuildInfoBuilder,
    ErasedProjectInfoBuilder, FetchError, ProjectInfoBuilder, Result, TransferableIssue,
};

type BuildDecodeFn =
    fn(&[u8]) -> std::result::Result<Arc<dyn ErasedBuildInfoBuilder>, serde_json::Error>;
type ProjectDecodeFn =
    fn(&[u8]) -> std::result::Result<Arc<dyn ErasedProjectInfoBuilder>, serde_json::Error>;

fn decode_build<B: BuildInfoBuilder>(
    bytes: &[u8],
) -> std::result::Result<Arc<dyn ErasedBuildInfoBuilder>, serde_json::Error> {
    Ok(Arc::new(serde_json::from_slice::<B>(bytes)?))
}

fn decode_project<B: ProjectInfoBuilder>(
    bytes: &[u8],
) -> std::result::Result<Arc<dyn ErasedProjectInfoBuilder>, serde_json::Error> {
    Ok(Arc::new(serde_json::from_slice::<B>(bytes)?))
}

/// Builder types the daemon can instantiate.
///
/// Populated from the classpath the init script injects; a builder whose tag
/// is missing here cannot run and is reported as an issue for its entry.
#[derive(Clone, Default)]
pub struct BuilderCatalog {
    build: HashMap<&'static str, BuildDecodeFn>,
    project: HashMap<&'static str, ProjectDecodeFn>,
}

impl BuilderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_build<B: BuildInfoBuilder>(&mut self) -> &mut Self {
        self.build.insert(B::TYPE_TAG, decode_build::<B>);
        self
    }

    pub fn register_project<B: ProjectInfoBuilder>(&mut self) -> &mut Self {
        self.project.insert(B::TYPE_TAG, decode_project::<B>);
        self
    }

    #[must_use]
    pub fn with_build<B: BuildInfoBuilder>(mut self) -> Self {
        self.register_build::<B>();
        self
    }

    #[must_use]
    pub fn with_project<B: ProjectInfoBuilder>(mut self) -> Self {
        self.register_project::<B>();
        self
    }

    pub fn decode_build(&self, encoded: &EncodedValue) -> Result<Arc<dyn ErasedBuildInfoBuilder>> {
        let decode = self.build.get(encoded.tag()).ok_or_else(|| unknown(encoded))?;
        decode(encoded.bytes()).map_err(|source| deserialization(encoded, source))
    }

    pub fn decode_project(
        &self,
        encoded: &EncodedValue,
    ) -> Result<Arc<dyn ErasedProjectInfoBuilder>> {
        let decode = self.project.get(encoded.tag()).ok_or_else(|| unknown(encoded))?;
        decode(encoded.bytes()).map_err(|source| deserialization(encoded, source))
    }
}

fn unknown(encoded: &EncodedValue) -> FetchError {
    FetchError::UnknownType {
        type_tag: encoded.tag().to_string(),
    }
}

fn deserialization(encoded: &EncodedValue, source: serde_json::Error) -> FetchError {
    FetchError::Deserialization {
        type_tag: encoded.tag().to_string(),
        source,
    }
}

impl fmt::Debug for BuilderCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut build: Vec<_> = self.build.keys().collect();
        let mut project: Vec<_> = self.project.keys().collect();
        build.sort();
        project.sort();
        f.debug_struct("BuilderCatalog")
            .field("build", &build)
            .field("project", &project)
            .finish()
    }
}

/// Builders decoded from a shipped map, with the entries that could not be.
#[derive(Debug)]
pub struct DecodedBuilders<T: ?Sized> {
    pub builders: Vec<(EntryKey, Arc<T>)>,
    pub failures: Vec<(EntryKey, TransferableIssue)>,
}

impl<T: ?Sized> Default for DecodedBuilders<T> {
    fn default() -> Self {
        Self {
            builders: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Decodes one builder per entry of `map`.
///
/// Failures already recorded in `map` are carried over, so every shipped key
/// ends up either with a builder or with an issue.
pub fn decode_builders<T: ?Sized>(
    map: &CustomSerializedMap,
    decode: impl Fn(&EncodedValue) -> Result<Arc<T>>,
) -> DecodedBuilders<T> {
    let mut decoded = DecodedBuilders::default();

    for (key, issue) in map.failures() {
        decoded.failures.push((key, issue.clone()));
    }

    for key in map.keys() {
        let values = map.serialized(key).map(|entries| entries.values()).unwrap_or_default();
        let result = match values {
            [single] => decode(single),
            other => Err(FetchError::wire(format!(
                "expected exactly one builder for entry {key}, found {}",
                other.len()
            ))),
        };
        match result {
            Ok(builder) => decoded.builders.push((key, builder)),
            Err(err) => {
                tracing::warn!("Cannot instantiate builder for entry {}: {}", key, err);
                decoded.failures.push((key, TransferableIssue::from_error(&err)));
            }
        }
    }

    decoded
}
