//! Errors shared by both sides of the model fetch protocol.

use thiserror::Error;

use crate::builder::BoxError;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to serialize value of type '{type_tag}': {source}")]
    Serialization {
        type_tag: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to deserialize value of type '{type_tag}': {source}")]
    Deserialization {
        type_tag: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Type '{type_tag}' is not registered in catalog")]
    UnknownType { type_tag: String },

    #[error("Malformed wire data: {message}")]
    Wire { message: String },

    #[error("Inconsistent build state: {message}")]
    Consistency { message: String },

    #[error("Tooling controller request failed: {0}")]
    Controller(BoxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub fn wire(message: impl Into<String>) -> Self {
        Self::Wire {
            message: message.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
