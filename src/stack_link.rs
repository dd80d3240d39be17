//! Translation of query and mutation descriptors into remote collection calls.
//!
//! [`StackLink`] is stateless apart from its collection provider. A request is
//! resolved in two steps:
//!
//! 1. [`plan`] picks the collection and the method to call, without any I/O.
//! 2. [`StackLink::request`] executes that plan and hands back the collection's
//!    answer, or its error, untouched.

use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::app_error::AppError;
use crate::collection::{CollectionProvider, CollectionResponse};
use crate::document::{Document, FILES_DOCTYPE};
use crate::mutation::{FileUpload, Mutation};
use crate::query_definition::{QueryDefinition, QueryOptions};

/// Anything a link can be asked to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Query(QueryDefinition),
    Mutation(Mutation),
}

impl Operation {
    /// Parses a raw descriptor. A non-null `mutationType` makes it a
    /// mutation; anything else is read as a query definition.
    pub fn from_value(mut value: JsonValue) -> Result<Self, AppError> {
        if value.get("mutationType").is_some_and(|kind| !kind.is_null()) {
            return Mutation::from_value(value).map(Operation::Mutation);
        }
        if let Some(fields) = value.as_object_mut() {
            fields.remove("mutationType");
        }
        QueryDefinition::from_value(value).map(Operation::Query)
    }
}

impl From<QueryDefinition> for Operation {
    fn from(definition: QueryDefinition) -> Self {
        Operation::Query(definition)
    }
}

impl From<Mutation> for Operation {
    fn from(mutation: Mutation) -> Self {
        Operation::Mutation(mutation)
    }
}

/// The collection method a request resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum CollectionAction {
    Get {
        id: String,
    },
    FindReferencedBy {
        document: Document,
    },
    All {
        options: QueryOptions,
    },
    Find {
        selector: JsonValue,
        options: QueryOptions,
    },
    Create {
        document: Document,
    },
    Update {
        document: Document,
    },
    Destroy {
        document: Document,
    },
    #[serde(rename_all = "camelCase")]
    AddReferencesTo {
        document: Document,
        referenced_documents: Vec<Document>,
    },
    #[serde(rename_all = "camelCase")]
    Upload {
        file: FileUpload,
        dir_path: String,
    },
}

/// A fully resolved request: which collection, which method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionCall {
    pub doctype: String,
    #[serde(flatten)]
    pub action: CollectionAction,
}

/// Resolves an operation to the collection call it stands for.
pub fn plan(operation: &Operation) -> Result<CollectionCall, AppError> {
    match operation {
        Operation::Query(definition) => plan_query(definition),
        Operation::Mutation(mutation) => plan_mutation(mutation),
    }
}

fn plan_query(definition: &QueryDefinition) -> Result<CollectionCall, AppError> {
    definition.validate()?;

    // An empty id selects nothing and falls through to the other selectors.
    let action = if let Some(id) = definition.id.as_deref().filter(|id| !id.is_empty()) {
        CollectionAction::Get { id: id.to_string() }
    } else if let Some(referenced) = &definition.referenced {
        CollectionAction::FindReferencedBy {
            document: referenced.clone(),
        }
    } else {
        match &definition.selector {
            None => CollectionAction::All {
                options: definition.options.clone(),
            },
            Some(selector) => CollectionAction::Find {
                selector: selector.clone(),
                options: definition.options.clone(),
            },
        }
    };

    Ok(CollectionCall {
        doctype: definition.doctype.clone(),
        action,
    })
}

fn document_doctype(document: &Document) -> Result<String, AppError> {
    match document.doctype() {
        Some(doctype) if !doctype.is_empty() => Ok(doctype.to_string()),
        _ => Err(AppError::InvalidDescriptor(format!(
            "Document {:?} has no _type",
            document.id()
        ))),
    }
}

fn plan_mutation(mutation: &Mutation) -> Result<CollectionCall, AppError> {
    let call = match mutation {
        Mutation::CreateDocument { document } => CollectionCall {
            doctype: document_doctype(document)?,
            action: CollectionAction::Create {
                document: document.clone(),
            },
        },
        Mutation::UpdateDocument { document } => CollectionCall {
            doctype: document_doctype(document)?,
            action: CollectionAction::Update {
                document: document.clone(),
            },
        },
        Mutation::DeleteDocument { document } => CollectionCall {
            doctype: document_doctype(document)?,
            action: CollectionAction::Destroy {
                document: document.clone(),
            },
        },
        Mutation::AddReferencesTo {
            document,
            referenced_documents,
        } => CollectionCall {
            doctype: document_doctype(document)?,
            action: CollectionAction::AddReferencesTo {
                document: document.clone(),
                referenced_documents: referenced_documents.clone(),
            },
        },
        Mutation::UploadFile { file, dir_path } => CollectionCall {
            doctype: FILES_DOCTYPE.to_string(),
            action: CollectionAction::Upload {
                file: file.clone(),
                dir_path: dir_path.clone(),
            },
        },
    };
    Ok(call)
}

/// Link executing operations against the collections of a remote stack.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use stack_link_core::collection::CollectionProvider;
/// use stack_link_core::query_definition::QueryDefinition;
/// use stack_link_core::stack_link::StackLink;
///
/// async fn list_dir(provider: Arc<dyn CollectionProvider>) {
///     let link = StackLink::new(provider);
///     let query = QueryDefinition::new("io.cozy.files")
///         .matching(serde_json::json!({"dir_id": "d1"}));
///     let _page = link.request(&query.into()).await;
/// }
/// ```
#[derive(Clone)]
pub struct StackLink {
    provider: Arc<dyn CollectionProvider>,
}

impl StackLink {
    pub fn new(provider: Arc<dyn CollectionProvider>) -> Self {
        Self { provider }
    }

    pub async fn request(&self, operation: &Operation) -> Result<CollectionResponse, AppError> {
        let call = plan(operation).map_err(|e| {
            warn!("Rejected operation: {e}");
            e
        })?;
        debug!("Dispatching {:?} on {}", call.action, call.doctype);
        self.execute(call).await
    }

    /// Parses a raw JSON descriptor, then runs it like [`StackLink::request`].
    pub async fn request_json(&self, value: JsonValue) -> Result<CollectionResponse, AppError> {
        let operation = Operation::from_value(value).map_err(|e| {
            warn!("Invalid operation descriptor: {e}");
            e
        })?;
        self.request(&operation).await
    }

    async fn execute(&self, call: CollectionCall) -> Result<CollectionResponse, AppError> {
        let collection = self.provider.collection(&call.doctype);
        match call.action {
            CollectionAction::Get { id } => collection.get(&id).await,
            CollectionAction::FindReferencedBy { document } => {
                collection.find_referenced_by(&document).await
            }
            CollectionAction::All { options } => collection.all(&options).await,
            CollectionAction::Find { selector, options } => {
                collection.find(&selector, &options).await
            }
            CollectionAction::Create { document } => collection.create(&document).await,
            CollectionAction::Update { document } => collection.update(&document).await,
            CollectionAction::Destroy { document } => collection.destroy(&document).await,
            CollectionAction::AddReferencesTo {
                document,
                referenced_documents,
            } => {
                collection
                    .add_references_to(&document, &referenced_documents)
                    .await
            }
            CollectionAction::Upload { file, dir_path } => collection.upload(&file, &dir_path).await,
        }
    }
}
