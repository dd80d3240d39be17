//! Helpers for documents of the files doctype.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::app_error::AppError;
use crate::collection::CollectionProvider;
use crate::document::{Document, FILES_DOCTYPE};
use crate::qualification::Qualification;

const NOTE_EXTENSION: &str = ".cozy-note";

/// Result of [`split_filename`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitFilename {
    pub filename: String,
    pub extension: String,
}

/// Ensures both `_id` and `id` are set (`_id` wins) and that `_type` defaults
/// to the files doctype. Other fields are kept.
pub fn normalize(doc: &Document) -> Document {
    let mut normalized = doc.clone();
    if let Some(id) = doc.id().map(str::to_string) {
        normalized.insert("_id", JsonValue::String(id.clone()));
        normalized.insert("id", JsonValue::String(id));
    }
    if doc.doctype().is_none() {
        normalized.insert("_type", JsonValue::String(FILES_DOCTYPE.to_string()));
    }
    normalized
}

/// Whether the file is a note: a `.cozy-note` name plus note metadata. Empty
/// metadata values still count.
pub fn is_note(doc: &Document) -> bool {
    let named_as_note = doc
        .str_field("name")
        .is_some_and(|name| name.ends_with(NOTE_EXTENSION));
    named_as_note
        && doc.metadata().is_some_and(|metadata| {
            ["content", "schema", "title", "version"]
                .iter()
                .all(|key| metadata.contains_key(*key))
        })
}

pub fn is_shortcut(doc: &Document) -> bool {
    doc.str_field("class") == Some("shortcut")
}

pub fn is_directory(doc: &Document) -> bool {
    doc.str_field("type") == Some("directory")
}

/// Splits a file name at its last dot. Directories, names without a dot and
/// names whose only dot is the leading one have no extension.
pub fn split_filename(doc: &Document) -> Result<SplitFilename, AppError> {
    let name = doc
        .str_field("name")
        .ok_or_else(|| AppError::Validation("Document has no name, cannot split it".to_string()))?;

    if is_directory(doc) {
        return Ok(SplitFilename {
            filename: name.to_string(),
            extension: String::new(),
        });
    }

    let (filename, extension) = match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    };
    Ok(SplitFilename {
        filename: filename.to_string(),
        extension: extension.to_string(),
    })
}

/// Keeps an existing `path`, otherwise derives it from the parent's path.
pub fn ensure_file_path(doc: &Document, parent: Option<&Document>) -> Result<Document, AppError> {
    if doc.str_field("path").is_some() {
        return Ok(doc.clone());
    }

    let parent_path = parent.and_then(|parent| parent.str_field("path")).ok_or_else(|| {
        AppError::Validation(format!(
            "Could not define a path for file {:?} without a parent path",
            doc.id()
        ))
    })?;
    let name = doc.str_field("name").unwrap_or_default();

    let path = if parent_path.ends_with('/') {
        format!("{parent_path}{name}")
    } else {
        format!("{parent_path}/{name}")
    };

    let mut with_path = doc.clone();
    with_path.insert("path", JsonValue::String(path));
    Ok(with_path)
}

fn metadata_pointer<'a>(doc: &'a Document, pointer: &str) -> Option<&'a JsonValue> {
    doc.get("metadata").and_then(|metadata| metadata.pointer(pointer))
}

pub fn sharing_shortcut_status(doc: &Document) -> Option<&str> {
    metadata_pointer(doc, "/sharing/status").and_then(JsonValue::as_str)
}

pub fn is_sharing_shortcut(doc: &Document) -> bool {
    sharing_shortcut_status(doc).is_some()
}

pub fn is_sharing_shortcut_new(doc: &Document) -> bool {
    sharing_shortcut_status(doc) == Some("new")
}

pub fn sharing_shortcut_target_mime(doc: &Document) -> Option<&str> {
    metadata_pointer(doc, "/target/mime").and_then(JsonValue::as_str)
}

pub fn sharing_shortcut_target_doctype(doc: &Document) -> Option<&str> {
    metadata_pointer(doc, "/target/_type").and_then(JsonValue::as_str)
}

/// Stores `qualification` in the file's metadata, keeping the other metadata
/// attributes, and returns the updated file.
pub async fn save_file_qualification(
    provider: &dyn CollectionProvider,
    doc: &Document,
    qualification: &Qualification,
) -> Result<Document, AppError> {
    let id = doc
        .id()
        .ok_or_else(|| AppError::Validation("Cannot qualify a file without an id".to_string()))?;

    let mut metadata = doc.metadata().cloned().unwrap_or_else(Map::new);
    metadata.insert("qualification".to_string(), serde_json::to_value(qualification)?);

    debug!("Qualifying file {} as {}", id, qualification.label);
    provider
        .collection(FILES_DOCTYPE)
        .update_metadata_attribute(id, &metadata)
        .await
}
