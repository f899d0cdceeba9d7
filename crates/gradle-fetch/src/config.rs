//! Fetch configuration.

use serde::Deserialize;
use std::path::PathBuf;

use gradle_fetch_core::ClassPath;

/// Settings for one model fetch.
///
/// Deserializable from the host's JSON settings; every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchConfig {
    /// File name prefix of the serialized builder input.
    pub input_file_prefix: String,
    /// File name prefix of the generated init script.
    pub init_script_prefix: String,
    /// Directory for both temporary files. System temp dir when `None`.
    pub temp_dir: Option<PathBuf>,
    /// Classpath the init script adds to the daemon so it can load the
    /// shipped builder types.
    pub init_script_classpath: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            input_file_prefix: "gradle-models-input".to_string(),
            init_script_prefix: "gradle-models-init".to_string(),
            temp_dir: None,
            init_script_classpath: Vec::new(),
        }
    }
}

impl FetchConfig {
    /// The classpath the IDE itself decodes default-classpath values with.
    pub fn default_classpath(&self) -> ClassPath {
        ClassPath::new(self.init_script_classpath.iter().cloned())
    }
}
