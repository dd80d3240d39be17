//! Relationship declarations per doctype.
//!
//! The schema is plain configuration, usually loaded from JSON:
//!
//! ```json
//! {
//!   "io.cozy.files": {
//!     "relationships": {
//!       "owner": { "doctype": "io.cozy.contacts", "type": "has-one-in-place" }
//!     }
//!   }
//! }
//! ```
//!
//! It decides which [`Association`] variant a document field gets, and strips
//! hydrated relations from documents before they are persisted.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::app_error::AppError;
use crate::association::{dehydrate_field, stored_reference, Association, AssociationContext, Relationship};
use crate::document::Document;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctypeSchema {
    #[serde(default)]
    pub relationships: BTreeMap<String, Relationship>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    doctypes: BTreeMap<String, DoctypeSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parses a schema; relationship names are taken from their keys.
    pub fn from_value(value: JsonValue) -> Result<Self, AppError> {
        let mut schema: Schema = serde_json::from_value(value)?;
        for (doctype, definition) in schema.doctypes.iter_mut() {
            for (name, relationship) in definition.relationships.iter_mut() {
                if relationship.doctype.trim().is_empty() {
                    return Err(AppError::Validation(format!(
                        "Relationship {doctype}.{name} has no doctype"
                    )));
                }
                relationship.name = name.clone();
            }
        }
        debug!("Loaded schema for {} doctypes", schema.doctypes.len());
        Ok(schema)
    }

    /// Declares (or replaces) a relationship of `doctype`.
    pub fn with_relationship(mut self, doctype: impl Into<String>, relationship: Relationship) -> Self {
        self.doctypes
            .entry(doctype.into())
            .or_default()
            .relationships
            .insert(relationship.name.clone(), relationship);
        self
    }

    pub fn relationship(&self, doctype: &str, name: &str) -> Option<&Relationship> {
        self.doctypes
            .get(doctype)
            .and_then(|definition| definition.relationships.get(name))
    }

    pub fn relationships(&self, doctype: &str) -> impl Iterator<Item = &Relationship> {
        self.doctypes
            .get(doctype)
            .into_iter()
            .flat_map(|definition| definition.relationships.values())
    }

    /// Association for `doc[name]`, with the variant picked from the
    /// declaration of the document's doctype.
    pub fn association(
        &self,
        doc: &Document,
        name: &str,
        context: Arc<dyn AssociationContext>,
    ) -> Option<Association> {
        let doctype = doc.doctype()?;
        match self.relationship(doctype, name) {
            Some(relationship) => Some(Association::new(doc.clone(), relationship, context)),
            None => {
                warn!("No relationship {name} declared on {doctype}");
                None
            }
        }
    }

    /// Copy of `doc` with every declared relationship collapsed to its stored
    /// reference. Documents of undeclared doctypes come back unchanged.
    pub fn dehydrate(&self, doc: &Document) -> Document {
        let Some(doctype) = doc.doctype() else {
            return doc.clone();
        };
        self.relationships(doctype).fold(doc.clone(), |dehydrated, relationship| {
            let raw = stored_reference(&dehydrated, &relationship.name, relationship.kind);
            dehydrate_field(&dehydrated, &relationship.name, relationship.kind, raw)
        })
    }
}
