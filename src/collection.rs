//! Contracts of the collaborators this crate drives but does not implement:
//! the remote [`Collection`] API, the [`Client`] that owns local state, and
//! the [`ObservableQuery`] handles it hands out.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::app_error::AppError;
use crate::association::Association;
use crate::document::Document;
use crate::mutation::FileUpload;
use crate::query_binder::QueryProps;
use crate::query_definition::{QueryDefinition, QueryOptions};

/// Payload of a collection response: one document or a page of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    One(Document),
    Many(Vec<Document>),
}

impl ResponseData {
    pub fn documents(&self) -> Vec<&Document> {
        match self {
            ResponseData::One(doc) => vec![doc],
            ResponseData::Many(docs) => docs.iter().collect(),
        }
    }

    pub fn into_documents(self) -> Vec<Document> {
        match self {
            ResponseData::One(doc) => vec![doc],
            ResponseData::Many(docs) => docs,
        }
    }
}

/// What a remote collection answers to any call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse {
    pub data: ResponseData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<Document>,
    #[serde(default)]
    pub next: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
}

impl CollectionResponse {
    pub fn one(document: Document) -> Self {
        Self {
            data: ResponseData::One(document),
            included: Vec::new(),
            next: false,
            skip: None,
        }
    }

    pub fn many(documents: Vec<Document>) -> Self {
        Self {
            data: ResponseData::Many(documents),
            included: Vec::new(),
            next: false,
            skip: None,
        }
    }
}

/// A named remote collection. Every method is a single remote call; failures
/// are reported as-is and never retried by this crate.
#[async_trait]
pub trait Collection: Send + Sync {
    async fn get(&self, id: &str) -> Result<CollectionResponse, AppError>;

    async fn all(&self, options: &QueryOptions) -> Result<CollectionResponse, AppError>;

    async fn find(
        &self,
        selector: &JsonValue,
        options: &QueryOptions,
    ) -> Result<CollectionResponse, AppError>;

    async fn find_referenced_by(&self, document: &Document) -> Result<CollectionResponse, AppError>;

    async fn create(&self, document: &Document) -> Result<CollectionResponse, AppError>;

    async fn update(&self, document: &Document) -> Result<CollectionResponse, AppError>;

    async fn destroy(&self, document: &Document) -> Result<CollectionResponse, AppError>;

    async fn add_references_to(
        &self,
        document: &Document,
        referenced_documents: &[Document],
    ) -> Result<CollectionResponse, AppError>;

    async fn upload(&self, file: &FileUpload, dir_path: &str) -> Result<CollectionResponse, AppError>;

    async fn update_metadata_attribute(
        &self,
        id: &str,
        metadata: &Map<String, JsonValue>,
    ) -> Result<Document, AppError>;
}

/// Anything able to hand out a collection by doctype.
pub trait CollectionProvider: Send + Sync {
    fn collection(&self, doctype: &str) -> Arc<dyn Collection>;
}

/// The client owning local document state and observable queries.
#[async_trait]
pub trait Client: CollectionProvider {
    fn watch_query(&self, definition: &QueryDefinition, props: &QueryProps) -> Arc<dyn ObservableQuery>;

    async fn create(&self, document: Document) -> Result<Document, AppError>;

    async fn save(&self, document: Document) -> Result<Document, AppError>;

    async fn destroy(&self, document: Document) -> Result<Document, AppError>;

    fn get_association(&self, document: &Document, name: &str) -> Option<Association>;

    /// Local state lookup; never touches the network.
    fn get_document_from_state(&self, doctype: &str, id: &str) -> Option<Document>;

    /// Remote fetch of a single document.
    async fn get(&self, doctype: &str, id: &str) -> Result<Document, AppError>;
}

/// Called on every change of an observable query.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync>;

/// Tears a subscription down. Consumed on use, so it runs at most once.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// A live handle on the result set of a query definition.
///
/// `fetch` and `fetch_more` only schedule work; the observable owns the
/// requests, their deduplication and the notifications that follow.
pub trait ObservableQuery: Send + Sync {
    fn subscribe(&self, callback: ChangeCallback) -> Unsubscribe;

    fn fetch(&self);

    fn fetch_more(&self);

    fn current_result(&self) -> QueryResult;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchStatus {
    #[default]
    Pending,
    Loading,
    Loaded,
    Failed,
}

/// Snapshot of an observable query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub data: Vec<Document>,
    #[serde(default)]
    pub fetch_status: FetchStatus,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
