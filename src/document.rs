//! Document representation shared by the link, associations and model helpers.
//!
//! A [`Document`] is a JSON object as stored by the remote collection. Only
//! two fields carry meaning for this crate:
//!
//! - **`_id`** (or **`id`**): the stable identifier. `_id` wins when both are set.
//! - **`_type`**: the doctype, which names the remote collection the document
//!   belongs to.
//!
//! Everything else (metadata, relationships, note content) is kept verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::app_error::AppError;

/// Doctype of the files collection, used for uploads and as the default `_type`
/// of file-like documents.
pub const FILES_DOCTYPE: &str = "io.cozy.files";

/// A JSON object stored in, or destined for, a remote collection.
///
/// # Examples
///
/// ```rust
/// use stack_link_core::document::Document;
/// use serde_json::json;
///
/// let doc = Document::from_value(json!({"_id": "c1", "_type": "io.cozy.contacts"}))?;
/// assert_eq!(doc.id(), Some("c1"));
/// assert_eq!(doc.doctype(), Some("io.cozy.contacts"));
/// # Ok::<(), stack_link_core::app_error::AppError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, JsonValue>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a document from any JSON value; only objects are accepted.
    pub fn from_value(value: JsonValue) -> Result<Self, AppError> {
        match value {
            JsonValue::Object(map) => Ok(Self(map)),
            other => Err(AppError::InvalidDescriptor(format!(
                "Expected a JSON object for a document, got: {other}"
            ))),
        }
    }

    /// The stable identifier: `_id` when present, `id` otherwise.
    pub fn id(&self) -> Option<&str> {
        self.str_field("_id").or_else(|| self.str_field("id"))
    }

    pub fn doctype(&self) -> Option<&str> {
        self.str_field("_type")
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut JsonValue> {
        self.0.get_mut(key)
    }

    /// String value of `key`, if it holds one.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(JsonValue::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) -> Option<JsonValue> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Nested `metadata` object, when present.
    pub fn metadata(&self) -> Option<&Map<String, JsonValue>> {
        self.0.get("metadata").and_then(JsonValue::as_object)
    }

    /// `{_id, _type}` pair used to point at this document from a relationship.
    pub fn reference(&self) -> JsonValue {
        let mut reference = Map::new();
        if let Some(id) = self.id() {
            reference.insert("_id".to_string(), JsonValue::String(id.to_string()));
        }
        if let Some(doctype) = self.doctype() {
            reference.insert("_type".to_string(), JsonValue::String(doctype.to_string()));
        }
        JsonValue::Object(reference)
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.0)
    }
}

impl From<Map<String, JsonValue>> for Document {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

impl TryFrom<JsonValue> for Document {
    type Error = AppError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        Document::from_value(value)
    }
}

/// Truthiness of a stored reference: absent, `null`, `false`, `0` and `""` all
/// count as "no reference".
pub(crate) fn is_truthy(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::String(s)) => !s.is_empty(),
        Some(JsonValue::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(JsonValue::Array(_)) | Some(JsonValue::Object(_)) => true,
    }
}
