//! Resolution of references embedded in documents.
//!
//! An [`Association`] ties a target document, one of its fields and the
//! doctype that field points at. Where the foreign key lives depends on the
//! declared [`AssociationKind`]:
//!
//! - **in place** (`has-one-in-place`, `belongs-to-in-place`): directly in
//!   `target[name]`
//! - **has one**: in `target.relationships[name].data._id`
//! - **has many**: in `target.relationships[name].data[*]._id`
//!
//! Resolution always consults local state first and only then goes remote.
//! Dehydration collapses whatever was hydrated under `name` back to the bare
//! reference before the document is persisted.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use crate::app_error::AppError;
use crate::collection::{Client, CollectionResponse};
use crate::document::{is_truthy, Document};
use crate::mutation::Mutation;
use crate::query_definition::QueryDefinition;

/// Declared kind of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssociationKind {
    HasOneInPlace,
    BelongsToInPlace,
    HasOne,
    HasMany,
}

impl AssociationKind {
    pub fn is_in_place(&self) -> bool {
        matches!(self, AssociationKind::HasOneInPlace | AssociationKind::BelongsToInPlace)
    }
}

/// A relationship as declared in a [`Schema`](crate::schema::Schema).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub name: String,
    pub doctype: String,
    #[serde(rename = "type")]
    pub kind: AssociationKind,
}

impl Relationship {
    pub fn new(name: impl Into<String>, doctype: impl Into<String>, kind: AssociationKind) -> Self {
        Self {
            name: name.into(),
            doctype: doctype.into(),
            kind,
        }
    }
}

/// Updates pushed into the owning client's local state.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
    ReceiveDocuments {
        doctype: String,
        documents: Vec<Document>,
    },
    UpdateDocument(Document),
}

/// Capabilities an association borrows from its owning context.
#[async_trait]
pub trait AssociationContext: Send + Sync {
    /// Local state lookup.
    fn get(&self, doctype: &str, id: &str) -> Option<Document>;

    async fn query(&self, definition: &QueryDefinition) -> Result<CollectionResponse, AppError>;

    async fn mutate(&self, mutation: Mutation) -> Result<CollectionResponse, AppError>;

    async fn save(&self, document: Document) -> Result<Document, AppError>;

    fn dispatch(&self, action: StoreAction);
}

/// Resolved value of an association.
#[derive(Debug, Clone, PartialEq)]
pub enum AssociationData {
    One(Option<Document>),
    Many(Vec<Document>),
}

impl AssociationData {
    pub fn as_one(&self) -> Option<&Document> {
        match self {
            AssociationData::One(doc) => doc.as_ref(),
            AssociationData::Many(docs) => docs.first(),
        }
    }

    pub fn into_documents(self) -> Vec<Document> {
        match self {
            AssociationData::One(doc) => doc.into_iter().collect(),
            AssociationData::Many(docs) => docs,
        }
    }
}

fn relationship_data<'a>(doc: &'a Document, name: &str) -> Option<&'a JsonValue> {
    doc.get("relationships")
        .and_then(|relationships| relationships.get(name))
        .and_then(|relationship| relationship.get("data"))
}

fn reference_id(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(id) if !id.is_empty() => Some(id.clone()),
        JsonValue::Object(map) => map
            .get("_id")
            .or_else(|| map.get("id"))
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Foreign keys stored on `doc` for a relationship of the given kind.
fn referenced_ids(doc: &Document, name: &str, kind: AssociationKind) -> Vec<String> {
    match kind {
        AssociationKind::HasOneInPlace | AssociationKind::BelongsToInPlace => {
            doc.get(name).and_then(reference_id).into_iter().collect()
        }
        AssociationKind::HasOne => relationship_data(doc, name)
            .and_then(reference_id)
            .into_iter()
            .collect(),
        AssociationKind::HasMany => match relationship_data(doc, name) {
            Some(JsonValue::Array(items)) => items.iter().filter_map(reference_id).collect(),
            _ => Vec::new(),
        },
    }
}

/// Reference stored on `doc` itself, with a hydrated in-place object reduced
/// to its id.
pub(crate) fn stored_reference(doc: &Document, name: &str, kind: AssociationKind) -> Option<JsonValue> {
    if kind.is_in_place() {
        doc.get(name).and_then(reference_id).map(JsonValue::String)
    } else {
        relationship_data(doc, name).cloned()
    }
}

pub(crate) fn dehydrate_field(
    doc: &Document,
    name: &str,
    kind: AssociationKind,
    raw: Option<JsonValue>,
) -> Document {
    let mut dehydrated = doc.clone();

    if kind.is_in_place() {
        let value = raw
            .filter(|value| is_truthy(Some(value)))
            .unwrap_or(JsonValue::Null);
        dehydrated.insert(name.to_string(), value);
        return dehydrated;
    }

    let data = match (kind, raw) {
        (AssociationKind::HasMany, Some(JsonValue::Array(items))) => JsonValue::Array(items),
        (AssociationKind::HasMany, _) => JsonValue::Array(Vec::new()),
        (_, Some(value)) if is_truthy(Some(&value)) => value,
        _ => JsonValue::Null,
    };

    dehydrated.remove(name);
    let mut relationships = dehydrated
        .get("relationships")
        .and_then(JsonValue::as_object)
        .cloned()
        .unwrap_or_else(Map::new);
    relationships.insert(name.to_string(), json!({ "data": data }));
    dehydrated.insert("relationships", JsonValue::Object(relationships));
    dehydrated
}

/// A reference from `target[name]` to documents of `doctype`.
#[derive(Clone)]
pub struct Association {
    target: Document,
    name: String,
    doctype: String,
    kind: AssociationKind,
    context: Arc<dyn AssociationContext>,
}

impl Debug for Association {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Association")
            .field("target", &self.target.id())
            .field("name", &self.name)
            .field("doctype", &self.doctype)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Association {
    pub fn new(
        target: Document,
        relationship: &Relationship,
        context: Arc<dyn AssociationContext>,
    ) -> Self {
        Self {
            target,
            name: relationship.name.clone(),
            doctype: relationship.doctype.clone(),
            kind: relationship.kind,
            context,
        }
    }

    pub fn target(&self) -> &Document {
        &self.target
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doctype(&self) -> &str {
        &self.doctype
    }

    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    /// The stored reference, verbatim.
    ///
    /// In-place kinds return `target[name]`; relationship kinds return
    /// `target.relationships[name].data`.
    pub fn raw(&self) -> Option<JsonValue> {
        if self.kind.is_in_place() {
            self.target.get(&self.name).cloned()
        } else {
            relationship_data(&self.target, &self.name).cloned()
        }
    }

    /// Identifiers of the referenced documents.
    pub fn ids(&self) -> Vec<String> {
        referenced_ids(&self.target, &self.name, self.kind)
    }

    /// Resolves the referenced document(s), local state first.
    pub async fn data(&self) -> Result<AssociationData, AppError> {
        match self.kind {
            AssociationKind::HasMany => {
                let mut documents = Vec::new();
                for id in self.ids() {
                    documents.push(self.resolve(&id).await?);
                }
                Ok(AssociationData::Many(documents))
            }
            _ => match self.ids().into_iter().next() {
                Some(id) => self.resolve(&id).await.map(|doc| AssociationData::One(Some(doc))),
                None => Ok(AssociationData::One(None)),
            },
        }
    }

    async fn resolve(&self, id: &str) -> Result<Document, AppError> {
        if let Some(doc) = self.context.get(&self.doctype, id) {
            debug!("{}/{} resolved from local state", self.doctype, id);
            return Ok(doc);
        }

        debug!("{}/{} not in local state, fetching", self.doctype, id);
        let definition = QueryDefinition::new(self.doctype.clone()).get_by_id(id);
        let response = self.context.query(&definition).await?;
        let doc = response
            .data
            .into_documents()
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", self.doctype, id)))?;

        self.context.dispatch(StoreAction::ReceiveDocuments {
            doctype: self.doctype.clone(),
            documents: vec![doc.clone()],
        });
        Ok(doc)
    }

    /// Resolves a relationship of `doc` without an association instance.
    pub async fn query(
        doc: &Document,
        client: &dyn Client,
        relationship: &Relationship,
    ) -> Result<AssociationData, AppError> {
        let ids = referenced_ids(doc, &relationship.name, relationship.kind);
        let mut documents = Vec::with_capacity(ids.len());
        for id in &ids {
            let found = match client.get_document_from_state(&relationship.doctype, id) {
                Some(local) => local,
                None => client.get(&relationship.doctype, id).await?,
            };
            documents.push(found);
        }

        Ok(match relationship.kind {
            AssociationKind::HasMany => AssociationData::Many(documents),
            _ => AssociationData::One(documents.into_iter().next()),
        })
    }

    /// Copy of `doc` with the field collapsed back to the stored reference.
    ///
    /// A hydrated in-place target is reduced to its id first. For in-place
    /// kinds a falsy reference leaves the key present with an explicit `null`.
    pub fn dehydrate(&self, doc: &Document) -> Document {
        let reference = stored_reference(&self.target, &self.name, self.kind);
        dehydrate_field(doc, &self.name, self.kind, reference)
    }

    /// Points a single-valued association at `document` and saves the target.
    pub async fn set(&mut self, document: &Document) -> Result<Document, AppError> {
        let id = document.id().ok_or_else(|| {
            AppError::Validation("Cannot reference a document without an id".to_string())
        })?;

        match self.kind {
            AssociationKind::HasOneInPlace | AssociationKind::BelongsToInPlace => {
                self.target.insert(self.name.clone(), JsonValue::String(id.to_string()));
            }
            AssociationKind::HasOne => {
                self.set_relationship_data(document.reference());
            }
            AssociationKind::HasMany => {
                warn!("set() called on has-many association {}", self.name);
                return Err(AppError::Validation(format!(
                    "Association {} holds many documents, use add()",
                    self.name
                )));
            }
        }

        let saved = self.context.save(self.dehydrate(&self.target)).await?;
        self.context.dispatch(StoreAction::UpdateDocument(saved.clone()));
        self.target = saved.clone();
        Ok(saved)
    }

    /// Adds `documents` to a has-many association through an
    /// ADD_REFERENCES_TO mutation.
    pub async fn add(&mut self, documents: &[Document]) -> Result<CollectionResponse, AppError> {
        if self.kind != AssociationKind::HasMany {
            return Err(AppError::Validation(format!(
                "Association {} holds a single document, use set()",
                self.name
            )));
        }

        let mut items = match relationship_data(&self.target, &self.name) {
            Some(JsonValue::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let known = self.ids();
        for document in documents {
            if document.id().is_some_and(|id| !known.iter().any(|k| k == id)) {
                items.push(document.reference());
            }
        }
        self.set_relationship_data(JsonValue::Array(items));

        self.context
            .mutate(Mutation::add_references_to(self.target.clone(), documents.to_vec()))
            .await
    }

    fn set_relationship_data(&mut self, data: JsonValue) {
        let mut relationships = self
            .target
            .get("relationships")
            .and_then(JsonValue::as_object)
            .cloned()
            .unwrap_or_else(Map::new);
        relationships.insert(self.name.clone(), json!({ "data": data }));
        self.target.insert("relationships", JsonValue::Object(relationships));
    }
}
