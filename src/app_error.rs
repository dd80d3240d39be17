use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors surfaced by the link, the query binder, associations and the model helpers.
///
/// None of these are recovered locally: remote failures reported by a
/// [`Collection`](crate::collection::Collection) travel through unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    /// The binder was built without a client in its context.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A query or mutation descriptor is missing a required field.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// A raw mutation descriptor carried a discriminant outside the known set.
    #[error("Unknown mutation type: {0}")]
    UnsupportedMutation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Failure reported by the remote collection layer.
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<SerdeError> for AppError {
    fn from(err: SerdeError) -> Self {
        AppError::Serialization(format!("JSON serialization error: {}", err))
    }
}
