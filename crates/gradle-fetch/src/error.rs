//! Errors of the IDE-side fetcher.

use thiserror::Error;

use gradle_fetch_core::{BoxError, FetchError};

/// Failure reported by a Tooling API connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Could not connect to the Gradle daemon: {message}")]
    Unavailable { message: String },

    #[error("Build action failed in the Gradle daemon: {0}")]
    Action(BoxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a fetch as a whole.
///
/// Failures of individual builders are never reported here; they are
/// attached to the affected result slot instead.
#[derive(Error, Debug)]
pub enum ModelFetchError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Protocol(#[from] FetchError),

    #[error("Failed to create temporary file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelFetchError>;
