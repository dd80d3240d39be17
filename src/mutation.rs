//! Mutation descriptors.
//!
//! The set of mutation kinds is closed: typed callers build a [`Mutation`]
//! directly and the link matches on it exhaustively. Raw JSON descriptors
//! (`{"mutationType": "...", ...}`) go through [`Mutation::from_value`], which
//! is the only place an unknown discriminant can show up.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::app_error::AppError;
use crate::document::Document;

/// Discriminant of a mutation descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationType {
    CreateDocument,
    UpdateDocument,
    DeleteDocument,
    AddReferencesTo,
    UploadFile,
}

impl MutationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationType::CreateDocument => "CREATE_DOCUMENT",
            MutationType::UpdateDocument => "UPDATE_DOCUMENT",
            MutationType::DeleteDocument => "DELETE_DOCUMENT",
            MutationType::AddReferencesTo => "ADD_REFERENCES_TO",
            MutationType::UploadFile => "UPLOAD_FILE",
        }
    }
}

impl Display for MutationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE_DOCUMENT" => Ok(MutationType::CreateDocument),
            "UPDATE_DOCUMENT" => Ok(MutationType::UpdateDocument),
            "DELETE_DOCUMENT" => Ok(MutationType::DeleteDocument),
            "ADD_REFERENCES_TO" => Ok(MutationType::AddReferencesTo),
            "UPLOAD_FILE" => Ok(MutationType::UploadFile),
            other => Err(AppError::UnsupportedMutation(other.to_string())),
        }
    }
}

/// File content handed to the files collection on upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub data: Vec<u8>,
}

/// A write against a remote collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateDocument {
        document: Document,
    },
    UpdateDocument {
        document: Document,
    },
    DeleteDocument {
        document: Document,
    },
    AddReferencesTo {
        document: Document,
        referenced_documents: Vec<Document>,
    },
    UploadFile {
        file: FileUpload,
        dir_path: String,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutationPayload {
    #[serde(default)]
    document: Option<Document>,
    #[serde(default)]
    referenced_documents: Option<Vec<Document>>,
    #[serde(default)]
    file: Option<FileUpload>,
    #[serde(default)]
    dir_path: Option<String>,
}

impl Mutation {
    pub fn create_document(document: Document) -> Self {
        Mutation::CreateDocument { document }
    }

    pub fn update_document(document: Document) -> Self {
        Mutation::UpdateDocument { document }
    }

    pub fn delete_document(document: Document) -> Self {
        Mutation::DeleteDocument { document }
    }

    pub fn add_references_to(document: Document, referenced_documents: Vec<Document>) -> Self {
        Mutation::AddReferencesTo {
            document,
            referenced_documents,
        }
    }

    pub fn upload_file(file: FileUpload, dir_path: impl Into<String>) -> Self {
        Mutation::UploadFile {
            file,
            dir_path: dir_path.into(),
        }
    }

    pub fn mutation_type(&self) -> MutationType {
        match self {
            Mutation::CreateDocument { .. } => MutationType::CreateDocument,
            Mutation::UpdateDocument { .. } => MutationType::UpdateDocument,
            Mutation::DeleteDocument { .. } => MutationType::DeleteDocument,
            Mutation::AddReferencesTo { .. } => MutationType::AddReferencesTo,
            Mutation::UploadFile { .. } => MutationType::UploadFile,
        }
    }

    /// Parses a raw `{"mutationType": ..., ...}` descriptor.
    ///
    /// The discriminant is checked before the payload, so an unknown kind is
    /// always reported as [`AppError::UnsupportedMutation`].
    pub fn from_value(value: JsonValue) -> Result<Self, AppError> {
        let mutation_type = match value.get("mutationType") {
            Some(JsonValue::String(s)) => MutationType::from_str(s)?,
            Some(other) => return Err(AppError::UnsupportedMutation(other.to_string())),
            None => {
                return Err(AppError::InvalidDescriptor(
                    "Mutation descriptor has no mutationType".to_string(),
                ))
            }
        };

        let payload: MutationPayload = serde_json::from_value(value).map_err(|e| {
            AppError::InvalidDescriptor(format!("Malformed {mutation_type} payload: {e}"))
        })?;

        let document = |payload: MutationPayload| {
            payload.document.ok_or_else(|| {
                AppError::InvalidDescriptor(format!("{mutation_type} requires a document"))
            })
        };

        match mutation_type {
            MutationType::CreateDocument => Ok(Mutation::create_document(document(payload)?)),
            MutationType::UpdateDocument => Ok(Mutation::update_document(document(payload)?)),
            MutationType::DeleteDocument => Ok(Mutation::delete_document(document(payload)?)),
            MutationType::AddReferencesTo => {
                let referenced = payload.referenced_documents.clone().unwrap_or_default();
                Ok(Mutation::add_references_to(document(payload)?, referenced))
            }
            MutationType::UploadFile => {
                let file = payload.file.ok_or_else(|| {
                    AppError::InvalidDescriptor("UPLOAD_FILE requires a file".to_string())
                })?;
                let dir_path = payload.dir_path.ok_or_else(|| {
                    AppError::InvalidDescriptor("UPLOAD_FILE requires a dirPath".to_string())
                })?;
                Ok(Mutation::upload_file(file, dir_path))
            }
        }
    }
}
