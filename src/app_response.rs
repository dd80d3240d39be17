use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::app_error::AppError;

/// JSON envelope returned across the C ABI.
#[derive(Debug, Serialize, Deserialize)]
pub enum AppResponse {
    RemoteError(String),
    SerializationError(String),
    NotFound(String),
    ValidationError(String),
    BadRequest(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::RemoteError(msg) => write!(f, "Remote error: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppResponse::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::Ok(msg) => write!(f, "Ok: {}", msg),
        }
    }
}

impl From<AppError> for AppResponse {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Configuration(_)
            | AppError::InvalidDescriptor(_)
            | AppError::UnsupportedMutation(_) => AppResponse::BadRequest(err.to_string()),
            AppError::NotFound(msg) => AppResponse::NotFound(msg),
            AppError::Remote(msg) => AppResponse::RemoteError(msg),
            AppError::Serialization(msg) => AppResponse::SerializationError(msg),
            AppError::Validation(msg) => AppResponse::ValidationError(msg),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }
}
