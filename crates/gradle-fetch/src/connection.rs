//! The Tooling API connection seam.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::ConnectionError;

/// Arguments of one build action run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOperation {
    pub arguments: Vec<String>,
    pub jvm_arguments: Vec<String>,
    pub java_home: Option<PathBuf>,
}

impl BuildOperation {
    pub fn add_arguments<I, S>(&mut self, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Path following the last `--init-script` argument.
    pub fn init_script(&self) -> Option<&Path> {
        self.arguments
            .windows(2)
            .rev()
            .find(|pair| pair[0] == "--init-script")
            .map(|pair| Path::new(&pair[1]))
    }
}

/// Host-supplied configuration of a build operation (JVM, arguments, ...).
pub trait OperationInitializer: Send + Sync {
    fn initialize(&self, operation: &mut BuildOperation);
}

impl<F> OperationInitializer for F
where
    F: Fn(&mut BuildOperation) + Send + Sync,
{
    fn initialize(&self, operation: &mut BuildOperation) {
        self(operation);
    }
}

/// Runs a serialized build action against a Gradle build.
///
/// `action` is the encoded request; the returned bytes are the encoded
/// outcome produced inside the daemon.
#[async_trait]
pub trait ToolingConnection: Send + Sync {
    async fn run_build_action(
        &self,
        operation: &BuildOperation,
        action: Bytes,
    ) -> Result<Bytes, ConnectionError>;
}
