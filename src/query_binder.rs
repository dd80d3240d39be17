//! Binding of an observable query to an activation scope.
//!
//! A [`QueryBinder`] is built from a [`ClientContext`] and [`QueryProps`]. It
//! moves through three states:
//!
//! ```text
//! Uninitialized --mount()--> Mounted --unmount()/drop--> Unmounted
//! ```
//!
//! Mounting subscribes to the observable query before anything else, then
//! triggers the initial fetch unless the fetch policy is `cache-only`.
//! Unmounting releases the subscription unconditionally; change notifications
//! that arrive afterwards are swallowed.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::app_error::AppError;
use crate::association::Association;
use crate::collection::{Client, ObservableQuery, QueryResult, Unsubscribe};
use crate::document::Document;
use crate::query_definition::QueryDefinition;

pub const CREATE_DOCUMENT: &str = "createDocument";
pub const SAVE_DOCUMENT: &str = "saveDocument";
pub const DELETE_DOCUMENT: &str = "deleteDocument";

/// A named document mutation exposed to the rendering callback.
pub type MutationFn = Arc<dyn Fn(Document) -> BoxFuture<'static, Result<Document, AppError>> + Send + Sync>;

/// Builds the query definition from the client and the props.
pub type QueryBuilder = Arc<dyn Fn(&dyn Client, &QueryProps) -> QueryDefinition + Send + Sync>;

/// Builds the caller's mutations from the client, the observable and the props.
pub type MutationsBuilder = Arc<
    dyn Fn(&Arc<dyn Client>, &Arc<dyn ObservableQuery>, &QueryProps) -> BTreeMap<String, MutationFn>
        + Send
        + Sync,
>;

/// How data is fetched when the binder is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Only read what the client already holds; no fetch on mount.
    CacheOnly,
}

#[derive(Clone)]
pub enum QuerySource {
    Definition(QueryDefinition),
    Builder(QueryBuilder),
}

#[derive(Clone)]
pub enum MutationsSource {
    Static(BTreeMap<String, MutationFn>),
    Builder(MutationsBuilder),
}

/// Inputs of a [`QueryBinder`].
#[derive(Clone)]
pub struct QueryProps {
    pub query: QuerySource,
    pub mutations: Option<MutationsSource>,
    /// Name under which the client stores the query.
    pub as_name: Option<String>,
    pub fetch_policy: Option<FetchPolicy>,
    /// Remaining caller props, handed to the query and mutations builders.
    pub extra: Map<String, JsonValue>,
}

impl Debug for QueryProps {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryProps")
            .field("as_name", &self.as_name)
            .field("fetch_policy", &self.fetch_policy)
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

impl QueryProps {
    pub fn new(definition: QueryDefinition) -> Self {
        Self::from_source(QuerySource::Definition(definition))
    }

    pub fn with_builder<F>(builder: F) -> Self
    where
        F: Fn(&dyn Client, &QueryProps) -> QueryDefinition + Send + Sync + 'static,
    {
        Self::from_source(QuerySource::Builder(Arc::new(builder)))
    }

    fn from_source(query: QuerySource) -> Self {
        Self {
            query,
            mutations: None,
            as_name: None,
            fetch_policy: None,
            extra: Map::new(),
        }
    }

    pub fn mutations(mut self, mutations: BTreeMap<String, MutationFn>) -> Self {
        self.mutations = Some(MutationsSource::Static(mutations));
        self
    }

    pub fn mutations_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&Arc<dyn Client>, &Arc<dyn ObservableQuery>, &QueryProps) -> BTreeMap<String, MutationFn>
            + Send
            + Sync
            + 'static,
    {
        self.mutations = Some(MutationsSource::Builder(Arc::new(builder)));
        self
    }

    pub fn as_name(mut self, name: impl Into<String>) -> Self {
        self.as_name = Some(name.into());
        self
    }

    pub fn fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = Some(policy);
        self
    }

    pub fn prop(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Ambient context a binder is created in.
#[derive(Clone, Default)]
pub struct ClientContext {
    client: Option<Arc<dyn Client>>,
}

impl ClientContext {
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self { client: Some(client) }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn client(&self) -> Option<&Arc<dyn Client>> {
        self.client.as_ref()
    }
}

/// Document helpers handed to the rendering callback.
///
/// The client's create/save/delete are registered first; caller mutations
/// are merged on top and win on name collisions. [`get_association`] is not
/// a document mutation and always resolves through the client: a caller
/// entry named `getAssociation` is reachable with [`get`] and [`call`] only.
///
/// [`get_association`]: MutationHelpers::get_association
/// [`get`]: MutationHelpers::get
/// [`call`]: MutationHelpers::call
#[derive(Clone)]
pub struct MutationHelpers {
    client: Arc<dyn Client>,
    mutations: BTreeMap<String, MutationFn>,
}

impl MutationHelpers {
    fn new(client: Arc<dyn Client>, custom: BTreeMap<String, MutationFn>) -> Self {
        let mut mutations: BTreeMap<String, MutationFn> = BTreeMap::new();

        let create = client.clone();
        mutations.insert(
            CREATE_DOCUMENT.to_string(),
            Arc::new(move |doc: Document| {
                let client = create.clone();
                async move { client.create(doc).await }.boxed()
            }),
        );
        let save = client.clone();
        mutations.insert(
            SAVE_DOCUMENT.to_string(),
            Arc::new(move |doc: Document| {
                let client = save.clone();
                async move { client.save(doc).await }.boxed()
            }),
        );
        let destroy = client.clone();
        mutations.insert(
            DELETE_DOCUMENT.to_string(),
            Arc::new(move |doc: Document| {
                let client = destroy.clone();
                async move { client.destroy(doc).await }.boxed()
            }),
        );

        mutations.extend(custom);
        Self { client, mutations }
    }

    pub fn get(&self, name: &str) -> Option<&MutationFn> {
        self.mutations.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mutations.keys().map(String::as_str)
    }

    /// Runs the mutation registered under `name`.
    pub async fn call(&self, name: &str, document: Document) -> Result<Document, AppError> {
        let mutation = self
            .mutations
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("No mutation named {name}")))?;
        mutation(document).await
    }

    pub async fn create_document(&self, document: Document) -> Result<Document, AppError> {
        self.call(CREATE_DOCUMENT, document).await
    }

    pub async fn save_document(&self, document: Document) -> Result<Document, AppError> {
        self.call(SAVE_DOCUMENT, document).await
    }

    pub async fn delete_document(&self, document: Document) -> Result<Document, AppError> {
        self.call(DELETE_DOCUMENT, document).await
    }

    /// Association `name` of `document`, as declared by the client's schema.
    pub fn get_association(&self, document: &Document, name: &str) -> Option<Association> {
        self.client.get_association(document, name)
    }
}

/// Query state plus fetch controls handed to the rendering callback.
pub struct QueryRenderProps {
    pub result: QueryResult,
    observable: Arc<dyn ObservableQuery>,
}

impl QueryRenderProps {
    pub fn fetch(&self) {
        self.observable.fetch();
    }

    pub fn fetch_more(&self) {
        self.observable.fetch_more();
    }
}

enum BinderState {
    Uninitialized,
    Mounted {
        active: Arc<AtomicBool>,
        unsubscribe: Unsubscribe,
    },
    Unmounted,
}

/// An observable query bound to an explicit mount/unmount scope.
pub struct QueryBinder {
    client: Arc<dyn Client>,
    definition: QueryDefinition,
    observable: Arc<dyn ObservableQuery>,
    helpers: MutationHelpers,
    fetch_policy: Option<FetchPolicy>,
    state: BinderState,
}

impl QueryBinder {
    pub fn new(context: &ClientContext, props: QueryProps) -> Result<Self, AppError> {
        let client = context.client().cloned().ok_or_else(|| {
            AppError::Configuration(
                "Query should be used with client in context (use a ClientContext holding a client)"
                    .to_string(),
            )
        })?;

        let definition = match &props.query {
            QuerySource::Definition(definition) => definition.clone(),
            QuerySource::Builder(builder) => builder(client.as_ref(), &props),
        };

        let observable = client.watch_query(&definition, &props);

        let custom = match &props.mutations {
            Some(MutationsSource::Static(mutations)) => mutations.clone(),
            Some(MutationsSource::Builder(builder)) => {
                // The builder sees the remaining props, not its own source.
                let rest = QueryProps {
                    mutations: None,
                    ..props.clone()
                };
                builder(&client, &observable, &rest)
            }
            None => BTreeMap::new(),
        };
        let helpers = MutationHelpers::new(client.clone(), custom);

        debug!("Query binder created for {}", definition.doctype);
        Ok(Self {
            client,
            definition,
            observable,
            helpers,
            fetch_policy: props.fetch_policy,
            state: BinderState::Uninitialized,
        })
    }

    pub fn definition(&self) -> &QueryDefinition {
        &self.definition
    }

    pub fn client(&self) -> &Arc<dyn Client> {
        &self.client
    }

    pub fn observable(&self) -> &Arc<dyn ObservableQuery> {
        &self.observable
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self.state, BinderState::Mounted { .. })
    }

    /// Subscribes to the observable, then fetches unless `cache-only`.
    ///
    /// `on_change` runs on every notification until the binder is unmounted.
    pub fn mount<F>(&mut self, on_change: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if !matches!(self.state, BinderState::Uninitialized) {
            warn!("Query binder for {} mounted twice; ignoring", self.definition.doctype);
            return;
        }

        let active = Arc::new(AtomicBool::new(true));
        let gate = active.clone();
        let unsubscribe = self.observable.subscribe(Box::new(move || {
            if gate.load(Ordering::Acquire) {
                on_change();
            }
        }));
        self.state = BinderState::Mounted { active, unsubscribe };
        info!("Query binder mounted for {}", self.definition.doctype);

        if self.fetch_policy != Some(FetchPolicy::CacheOnly) {
            self.observable.fetch();
        }
    }

    /// Releases the subscription. Safe to call any number of times.
    pub fn unmount(&mut self) {
        match std::mem::replace(&mut self.state, BinderState::Unmounted) {
            BinderState::Mounted { active, unsubscribe } => {
                active.store(false, Ordering::Release);
                unsubscribe();
                info!("Query binder unmounted for {}", self.definition.doctype);
            }
            BinderState::Uninitialized | BinderState::Unmounted => {}
        }
    }

    /// Hands the current snapshot and the mutation helpers to `children`.
    pub fn render<R, F>(&self, children: F) -> R
    where
        F: FnOnce(QueryRenderProps, &MutationHelpers) -> R,
    {
        let props = QueryRenderProps {
            result: self.observable.current_result(),
            observable: self.observable.clone(),
        };
        children(props, &self.helpers)
    }
}

impl Drop for QueryBinder {
    fn drop(&mut self) {
        self.unmount();
    }
}
