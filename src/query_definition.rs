//! Declarative query descriptors.
//!
//! A [`QueryDefinition`] names a doctype and one of four shapes, in order of
//! precedence when the link resolves it:
//!
//! 1. `id`: a single document fetched by identifier
//! 2. `referenced`: the documents referenced by another document
//! 3. no `selector`: every document of the doctype, subject to `options`
//! 4. `selector`: the documents matching the selector and `options`
//!
//! Definitions are immutable once handed to a link or a client; the builder
//! methods consume and return `self`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::app_error::AppError;
use crate::document::Document;

/// Pagination, sorting and projection options forwarded to the collection.
///
/// Keys this crate does not know about are preserved in `extra` so they reach
/// the collection unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl QueryOptions {
    pub fn is_empty(&self) -> bool {
        *self == QueryOptions::default()
    }
}

/// Immutable description of what to read from a remote collection.
///
/// # Examples
///
/// ```rust
/// use stack_link_core::query_definition::QueryDefinition;
/// use serde_json::json;
///
/// let by_dir = QueryDefinition::new("io.cozy.files")
///     .matching(json!({"dir_id": "d1"}))
///     .limit_by(50);
/// assert_eq!(by_dir.options.limit, Some(50));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDefinition {
    #[serde(default)]
    pub doctype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced: Option<Document>,
    #[serde(flatten)]
    pub options: QueryOptions,
}

impl QueryDefinition {
    pub fn new(doctype: impl Into<String>) -> Self {
        Self {
            doctype: doctype.into(),
            ..Default::default()
        }
    }

    /// Parses a raw JSON descriptor, rejecting it when the doctype is missing.
    pub fn from_value(value: JsonValue) -> Result<Self, AppError> {
        let definition: QueryDefinition = serde_json::from_value(value)
            .map_err(|e| AppError::InvalidDescriptor(format!("Malformed query definition: {e}")))?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.doctype.trim().is_empty() {
            return Err(AppError::InvalidDescriptor(
                "No doctype found in a query definition".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_by_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn matching(mut self, selector: JsonValue) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn referenced_by(mut self, document: Document) -> Self {
        self.referenced = Some(document);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn indexed_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.indexed_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sort clauses in the collection's format, e.g. `[{"name": "asc"}]`.
    pub fn sort_by(mut self, sort: Vec<JsonValue>) -> Self {
        self.options.sort = Some(sort);
        self
    }

    pub fn limit_by(mut self, limit: u64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn offset(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    pub fn include<I, S>(mut self, includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.includes = Some(includes.into_iter().map(Into::into).collect());
        self
    }
}
