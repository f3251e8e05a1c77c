//! The generic CRUD adapter.
//!
//! Every ZIA resource is one of two shapes: a collection of objects with
//! API-assigned ids (`POST /path`, `GET|PUT|DELETE /path/{id}`), or an
//! organization-wide singleton read and written at a fixed path. A
//! [`ResourceKind`] declares the shape and the marshaling between state
//! documents and the API model; [`CrudAdapter`] supplies the lifecycle:
//!
//! - **create** posts the model, re-reads it, then activates. A failed
//!   activation still hands back the created state;
//! - **read** returns [`Lookup::NotFound`] when the object is gone;
//! - **update** compares against the remote object first and skips the write
//!   when nothing material changed;
//! - **delete** treats an already-missing object as deleted, and is a no-op
//!   for singletons.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::activation::ActivationTrigger;
use crate::client::{decode, encode, ApiClient, Lookup};
use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use crate::schema::Schema;
use crate::state::{set_attribute, StateReader};

/// How a resource type lives on the API side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Objects created under the type's path with API-assigned ids.
    Collection,
    /// One settings object at the type's path. `id` is what the state
    /// records as its identifier.
    Singleton {
        /// Fixed state id.
        id: &'static str,
    },
}

/// Identifier type of a resource kind.
pub trait ResourceId: fmt::Display + Clone + Send + Sync + 'static {
    /// Parse an id from its state or import representation.
    fn parse(raw: &str) -> Option<Self>;
}

impl ResourceId for i64 {
    fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().filter(|id| *id > 0)
    }
}

impl ResourceId for String {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        (!raw.is_empty()).then(|| raw.to_string())
    }
}

/// A resource type the generic adapter can manage.
pub trait ResourceKind: Send + Sync + 'static {
    /// Type name as used in configuration (`zia_firewall_filtering_rule`).
    const TYPE_NAME: &'static str;
    /// API path of the collection or singleton, relative to the base URL.
    const PATH: &'static str;
    /// Collection or singleton.
    const LIFECYCLE: Lifecycle;
    /// State attribute holding the value [`ResourceKind::name`] returns.
    const NAME_ATTRIBUTE: &'static str = "name";

    /// The API representation, used both as request body and response.
    type Model: Serialize + DeserializeOwned + Send + Sync;
    /// The id type.
    type Id: ResourceId;

    /// Resource schema.
    fn schema() -> Schema;

    /// Build the API model from a desired state document.
    fn expand(state: &Value) -> Result<Self::Model, ProviderError>;

    /// Build a state document from an API model. The adapter adds `id`.
    fn flatten(model: &Self::Model) -> Value;

    /// The model's id, once the API has assigned one.
    fn id(model: &Self::Model) -> Option<Self::Id>;

    /// Stamp an id onto a model built from state.
    fn assign_id(model: &mut Self::Model, id: &Self::Id);

    /// Whether `desired` materially differs from `remote`. Set-valued
    /// fields must compare order-independently.
    fn differs(desired: &Self::Model, remote: &Self::Model) -> bool;

    /// Display name, for lookups by name.
    fn name(_model: &Self::Model) -> Option<&str> {
        None
    }
}

/// Dependencies handed to every adapter.
#[derive(Clone)]
pub struct AdapterContext {
    /// The API client.
    pub api: Arc<dyn ApiClient>,
    /// Post-mutation activation.
    pub activation: ActivationTrigger,
    /// Retry policy applied to each API call.
    pub retry: RetryPolicy,
}

impl AdapterContext {
    /// Create a context.
    pub fn new(api: Arc<dyn ApiClient>, activation: ActivationTrigger, retry: RetryPolicy) -> Self {
        Self {
            api,
            activation,
            retry,
        }
    }

    /// GET with retries.
    pub async fn get(&self, path: &str) -> Result<Lookup<Value>, ProviderError> {
        self.retry.run("get", || self.api.get(path)).await
    }

    /// Run the activation trigger after a mutation.
    pub async fn activate_after(&self, operation: &str) -> Result<(), ProviderError> {
        self.activation.after_mutation(self.api.as_ref(), operation).await
    }
}

impl fmt::Debug for AdapterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterContext")
            .field("activation", &self.activation)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Type-erased resource operations, dispatched by type name.
///
/// State documents always carry the object id as a string `id` attribute.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// Create the object and return its state.
    async fn create(&self, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state. `None` means the object no longer exists.
    async fn read(&self, current: Value) -> Result<Option<Value>, ProviderError>;

    /// Apply the planned state.
    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError>;

    /// Delete the object.
    async fn delete(&self, current: Value) -> Result<(), ProviderError>;

    /// Bring an existing object under management by id (or name).
    async fn import(&self, id: &str) -> Result<Value, ProviderError>;
}

/// Lifecycle operations for one [`ResourceKind`].
pub struct CrudAdapter<K> {
    ctx: AdapterContext,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> CrudAdapter<K> {
    /// Create an adapter.
    pub fn new(ctx: AdapterContext) -> Self {
        Self {
            ctx,
            _kind: PhantomData,
        }
    }

    fn object_path(id: &K::Id) -> String {
        match K::LIFECYCLE {
            Lifecycle::Collection => format!("{}/{}", K::PATH, id),
            Lifecycle::Singleton { .. } => K::PATH.to_string(),
        }
    }

    fn label(operation: &str, id: &dyn fmt::Display) -> String {
        format!("{} {} {}", operation, K::TYPE_NAME, id)
    }

    fn state(model: &K::Model, id: &K::Id) -> Value {
        let mut state = K::flatten(model);
        set_attribute(&mut state, "id", json!(id.to_string()));
        state
    }

    /// The id recorded in a state document. Singletons fall back to their
    /// fixed id.
    pub fn state_id(state: &Value) -> Result<K::Id, ProviderError> {
        let raw = StateReader::new(state).string("id");
        let raw = match (raw, K::LIFECYCLE) {
            (Some(raw), _) => raw,
            (None, Lifecycle::Singleton { id }) => id.to_string(),
            (None, Lifecycle::Collection) => {
                return Err(ProviderError::InvalidRequest(format!(
                    "{} state has no id",
                    K::TYPE_NAME
                )))
            },
        };
        K::Id::parse(&raw).ok_or_else(|| {
            ProviderError::InvalidRequest(format!("{} is not a valid {} id", raw, K::TYPE_NAME))
        })
    }

    async fn fetch(&self, id: &K::Id) -> Result<Lookup<K::Model>, ProviderError> {
        let path = Self::object_path(id);
        self.ctx
            .get(&path)
            .await?
            .try_map(|doc| decode(doc, K::TYPE_NAME))
    }

    /// Create the object described by `desired`.
    pub async fn create(&self, desired: &Value) -> Result<Value, ProviderError> {
        if let Lifecycle::Singleton { id } = K::LIFECYCLE {
            let id = Self::state_id(&json!({ "id": id }))?;
            return self.update(&id, desired).await;
        }

        let model = K::expand(desired)?;
        let body = encode(&model)?;
        let response = self
            .ctx
            .retry
            .run_non_idempotent("create", || self.ctx.api.post(K::PATH, body.clone()))
            .await
            .map_err(|e| e.context(format!("create {}", K::TYPE_NAME)))?;

        let created: K::Model = decode(response, K::TYPE_NAME)?;
        let id = K::id(&created).ok_or_else(|| {
            ProviderError::Decode(format!("{} create response carried no id", K::TYPE_NAME))
        })?;
        info!(resource_type = K::TYPE_NAME, id = %id, "Created");

        let state = self.confirm(&id).await?;
        self.activate_keeping(&Self::label("create", &id), state).await
    }

    /// Refresh an object.
    pub async fn read(&self, id: &K::Id) -> Result<Lookup<Value>, ProviderError> {
        let found = self
            .fetch(id)
            .await
            .map_err(|e| e.context(Self::label("read", id)))?;
        if matches!(found, Lookup::NotFound) {
            info!(resource_type = K::TYPE_NAME, id = %id, "Object no longer exists");
        }
        Ok(found.map(|model| Self::state(&model, id)))
    }

    /// Converge the object to `desired`, writing only on material change.
    pub async fn update(&self, id: &K::Id, desired: &Value) -> Result<Value, ProviderError> {
        let remote = self
            .fetch(id)
            .await?
            .require(Self::label("update", id))?;

        let mut model = K::expand(desired)?;
        K::assign_id(&mut model, id);
        if !K::differs(&model, &remote) {
            debug!(resource_type = K::TYPE_NAME, id = %id, "No material change, skipping write");
            return Ok(Self::state(&remote, id));
        }

        let path = Self::object_path(id);
        let body = encode(&model)?;
        self.ctx
            .retry
            .run("update", || self.ctx.api.put(&path, body.clone()))
            .await
            .map_err(|e| e.context(Self::label("update", id)))?;
        info!(resource_type = K::TYPE_NAME, id = %id, "Updated");

        let state = self.confirm(id).await?;
        self.activate_keeping(&Self::label("update", id), state).await
    }

    /// Delete the object. Singletons are left in place.
    pub async fn delete(&self, id: &K::Id) -> Result<(), ProviderError> {
        if let Lifecycle::Singleton { .. } = K::LIFECYCLE {
            info!(
                resource_type = K::TYPE_NAME,
                "Settings object cannot be deleted, removing from state only"
            );
            return Ok(());
        }

        let path = Self::object_path(id);
        let outcome = self
            .ctx
            .retry
            .run("delete", || self.ctx.api.delete(&path))
            .await
            .map_err(|e| e.context(Self::label("delete", id)))?;
        match outcome {
            Lookup::Found(()) => {
                info!(resource_type = K::TYPE_NAME, id = %id, "Deleted");
                self.ctx.activate_after(&Self::label("delete", id)).await
            },
            Lookup::NotFound => {
                debug!(resource_type = K::TYPE_NAME, id = %id, "Already deleted");
                Ok(())
            },
        }
    }

    /// Import by id, or by name when the id does not resolve.
    pub async fn import(&self, raw: &str) -> Result<Value, ProviderError> {
        if let Some(id) = K::Id::parse(raw) {
            if let Lookup::Found(state) = self.read(&id).await? {
                return Ok(state);
            }
        }

        let model = self.find_by_name(raw).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("{} with id or name {:?}", K::TYPE_NAME, raw))
        })?;
        let id = K::id(&model).ok_or_else(|| {
            ProviderError::Decode(format!("{} listing entry carried no id", K::TYPE_NAME))
        })?;
        Ok(Self::state(&model, &id))
    }

    /// Every object in the collection. An absent collection is empty.
    pub async fn list(&self) -> Result<Vec<K::Model>, ProviderError> {
        match self.ctx.get(K::PATH).await? {
            Lookup::Found(Value::Null) | Lookup::NotFound => Ok(Vec::new()),
            Lookup::Found(doc) => decode(doc, K::TYPE_NAME),
        }
    }

    /// Find a collection object by name, case-insensitively.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<K::Model>, ProviderError> {
        if let Lifecycle::Singleton { .. } = K::LIFECYCLE {
            return Ok(None);
        }
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|model| K::name(model).is_some_and(|n| n.eq_ignore_ascii_case(name))))
    }

    /// Fetch an object by id, as state. Used by lookups.
    pub async fn find_by_id(&self, id: &K::Id) -> Result<Option<Value>, ProviderError> {
        Ok(self.read(id).await?.found())
    }

    async fn activate_keeping(&self, operation: &str, state: Value) -> Result<Value, ProviderError> {
        match self.ctx.activate_after(operation).await {
            Ok(()) => Ok(state),
            Err(source) => Err(ProviderError::PartiallyApplied {
                state: Box::new(state),
                source: Box::new(source),
            }),
        }
    }

    async fn confirm(&self, id: &K::Id) -> Result<Value, ProviderError> {
        self.read(id)
            .await?
            .require(format!("{} after write", Self::label("read", id)))
    }
}

#[async_trait]
impl<K: ResourceKind> ManagedResource for CrudAdapter<K> {
    async fn create(&self, planned: Value) -> Result<Value, ProviderError> {
        CrudAdapter::create(self, &planned).await
    }

    async fn read(&self, current: Value) -> Result<Option<Value>, ProviderError> {
        let id = Self::state_id(&current)?;
        Ok(CrudAdapter::read(self, &id).await?.found())
    }

    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let id = Self::state_id(&prior)?;
        CrudAdapter::update(self, &id, &planned).await
    }

    async fn delete(&self, current: Value) -> Result<(), ProviderError> {
        let id = Self::state_id(&current)?;
        CrudAdapter::delete(self, &id).await
    }

    async fn import(&self, id: &str) -> Result<Value, ProviderError> {
        CrudAdapter::import(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationSettings;
    use crate::reconcile::sets_equal;
    use crate::schema::Attribute;
    use crate::testing::MockApi;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Group {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<i64>,
        name: String,
        #[serde(default)]
        members: Vec<String>,
    }

    struct GroupKind;

    impl ResourceKind for GroupKind {
        const TYPE_NAME: &'static str = "test_group";
        const PATH: &'static str = "/groups";
        const LIFECYCLE: Lifecycle = Lifecycle::Collection;
        type Model = Group;
        type Id = i64;

        fn schema() -> Schema {
            Schema::v0()
                .with_attribute("id", Attribute::computed_string())
                .with_attribute("name", Attribute::required_string())
                .with_attribute("members", Attribute::optional_string_set())
        }

        fn expand(state: &Value) -> Result<Group, ProviderError> {
            let r = StateReader::new(state);
            Ok(Group {
                id: None,
                name: r.require_string("name")?,
                members: r.strings("members"),
            })
        }

        fn flatten(model: &Group) -> Value {
            json!({"name": model.name, "members": model.members})
        }

        fn id(model: &Group) -> Option<i64> {
            model.id
        }

        fn assign_id(model: &mut Group, id: &i64) {
            model.id = Some(*id);
        }

        fn differs(desired: &Group, remote: &Group) -> bool {
            desired.name != remote.name || !sets_equal(&desired.members, &remote.members)
        }

        fn name(model: &Group) -> Option<&str> {
            Some(&model.name)
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Toggles {
        enabled: bool,
    }

    struct TogglesKind;

    impl ResourceKind for TogglesKind {
        const TYPE_NAME: &'static str = "test_toggles";
        const PATH: &'static str = "/toggles";
        const LIFECYCLE: Lifecycle = Lifecycle::Singleton { id: "toggles" };
        type Model = Toggles;
        type Id = String;

        fn schema() -> Schema {
            Schema::v0().with_attribute("enabled", Attribute::optional_bool())
        }

        fn expand(state: &Value) -> Result<Toggles, ProviderError> {
            Ok(Toggles {
                enabled: StateReader::new(state).bool("enabled").unwrap_or(false),
            })
        }

        fn flatten(model: &Toggles) -> Value {
            json!({"enabled": model.enabled})
        }

        fn id(_model: &Toggles) -> Option<String> {
            Some("toggles".to_string())
        }

        fn assign_id(_model: &mut Toggles, _id: &String) {}

        fn differs(desired: &Toggles, remote: &Toggles) -> bool {
            desired.enabled != remote.enabled
        }
    }

    fn context(api: &Arc<MockApi>, activation: bool) -> AdapterContext {
        let settings = ActivationSettings {
            enabled: activation,
            delay: Duration::ZERO,
            ..ActivationSettings::default()
        };
        AdapterContext::new(
            api.clone(),
            ActivationTrigger::new(settings, RetryPolicy::none()),
            RetryPolicy::new(3, Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_create_reads_back_assigned_id() {
        let api = Arc::new(MockApi::new());
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, true));

        let state = adapter
            .create(&json!({"name": "eng", "members": ["b", "a"]}))
            .await
            .unwrap();

        assert_eq!(state["id"], json!("1"));
        assert_eq!(state["name"], json!("eng"));
        assert_eq!(api.writes(), 1);
        assert_eq!(api.activations(), 1);
    }

    #[tokio::test]
    async fn test_create_without_id_is_decode_error() {
        let api = Arc::new(MockApi::new());
        api.set_post_response("/groups", json!({"name": "eng"}));
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, true));

        let err = adapter.create(&json!({"name": "eng"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
        assert_eq!(api.activations(), 0);
    }

    #[tokio::test]
    async fn test_failed_activation_keeps_created_state() {
        let api = Arc::new(MockApi::new());
        api.fail_next(crate::client::ACTIVATE_PATH, || {
            ProviderError::PermissionDenied("activation not allowed".to_string())
        });
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, true));

        let err = adapter.create(&json!({"name": "eng"})).await.unwrap_err();
        assert!(err.message().contains("activation not allowed"));
        let (state, cause) = err.take_applied_state();
        assert!(matches!(cause, ProviderError::Activation(_)));
        let state = state.unwrap();
        assert_eq!(state["id"], json!("1"));
        assert_eq!(state["name"], json!("eng"));
        assert!(api.object("/groups/1").is_some());
        assert_eq!(api.writes(), 1);
    }

    #[tokio::test]
    async fn test_failed_activation_keeps_updated_state() {
        let api = Arc::new(MockApi::new());
        api.seed("/groups/7", json!({"id": 7, "name": "eng", "members": ["a"]}));
        api.fail_next(crate::client::ACTIVATE_PATH, || {
            ProviderError::Api {
                status: 500,
                message: "boom".to_string(),
            }
        });
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, true));

        let err = ManagedResource::update(
            &adapter,
            json!({"id": "7", "name": "eng", "members": ["a"]}),
            json!({"name": "eng", "members": ["a", "c"]}),
        )
        .await
        .unwrap_err();
        let (state, _) = err.take_applied_state();
        assert_eq!(state.unwrap()["members"], json!(["a", "c"]));
    }

    #[tokio::test]
    async fn test_create_does_not_resend_after_timeout() {
        let api = Arc::new(MockApi::new());
        api.fail_next("/groups", || ProviderError::DeadlineExceeded("timed out".to_string()));
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, false));

        let err = adapter.create(&json!({"name": "eng"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
        assert_eq!(api.writes(), 1);

        api.fail_next("/groups", || ProviderError::ResourceExhausted("429".to_string()));
        let state = adapter.create(&json!({"name": "ops"})).await.unwrap();
        assert_eq!(state["name"], json!("ops"));
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let api = Arc::new(MockApi::new());
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, false));

        assert_eq!(adapter.read(&404).await.unwrap(), Lookup::NotFound);
        let erased: &dyn ManagedResource = &adapter;
        assert_eq!(erased.read(json!({"id": "404"})).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_without_material_change_skips_write() {
        let api = Arc::new(MockApi::new());
        api.seed("/groups/7", json!({"id": 7, "name": "eng", "members": ["a", "b"]}));
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, true));

        let state = adapter
            .update(&7, &json!({"name": "eng", "members": ["b", "a", ""]}))
            .await
            .unwrap();

        assert_eq!(state["id"], json!("7"));
        assert_eq!(api.writes(), 0);
        assert_eq!(api.activations(), 0);
    }

    #[tokio::test]
    async fn test_update_with_change_writes_once_and_activates() {
        let api = Arc::new(MockApi::new());
        api.seed("/groups/7", json!({"id": 7, "name": "eng", "members": ["a"]}));
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, true));

        let state = adapter
            .update(&7, &json!({"name": "eng", "members": ["a", "c"]}))
            .await
            .unwrap();

        assert_eq!(state["members"], json!(["a", "c"]));
        assert_eq!(api.writes(), 1);
        assert_eq!(api.activations(), 1);
    }

    #[tokio::test]
    async fn test_update_of_missing_object_fails() {
        let api = Arc::new(MockApi::new());
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, false));

        let err = adapter.update(&9, &json!({"name": "x"})).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(api.writes(), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let api = Arc::new(MockApi::new());
        api.seed("/groups/7", json!({"id": 7, "name": "eng"}));
        api.fail_next("/groups/7", || {
            ProviderError::Unavailable("EDIT_LOCK_NOT_AVAILABLE".to_string())
        });
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, false));

        let state = adapter.read(&7).await.unwrap();
        assert!(matches!(state, Lookup::Found(_)));
    }

    #[tokio::test]
    async fn test_api_errors_surface_with_context() {
        let api = Arc::new(MockApi::new());
        api.fail_next("/groups", || ProviderError::InvalidRequest("DUPLICATE_ITEM".to_string()));
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, true));

        let err = adapter.create(&json!({"name": "eng"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(err.message().contains("DUPLICATE_ITEM"));
        assert!(err.message().contains("create test_group"));
        assert_eq!(api.activations(), 0);
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_object() {
        let api = Arc::new(MockApi::new());
        api.seed("/groups/3", json!({"id": 3, "name": "ops"}));
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, true));

        adapter.delete(&3).await.unwrap();
        assert_eq!(api.activations(), 1);

        adapter.delete(&3).await.unwrap();
        assert_eq!(api.activations(), 1);
    }

    #[tokio::test]
    async fn test_import_by_id_or_name() {
        let api = Arc::new(MockApi::new());
        api.seed("/groups/3", json!({"id": 3, "name": "Ops"}));
        api.seed("/groups/4", json!({"id": 4, "name": "Eng"}));
        let adapter = CrudAdapter::<GroupKind>::new(context(&api, false));

        assert_eq!(adapter.import("4").await.unwrap()["name"], json!("Eng"));
        assert_eq!(adapter.import("ops").await.unwrap()["id"], json!("3"));
        assert!(adapter.import("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_singleton_create_is_update_and_delete_is_noop() {
        let api = Arc::new(MockApi::new());
        api.seed("/toggles", json!({"enabled": false}));
        let adapter = CrudAdapter::<TogglesKind>::new(context(&api, true));

        let state = ManagedResource::create(&adapter, json!({"enabled": true}))
            .await
            .unwrap();
        assert_eq!(state, json!({"id": "toggles", "enabled": true}));
        assert_eq!(api.writes(), 1);
        assert_eq!(api.activations(), 1);

        ManagedResource::delete(&adapter, state).await.unwrap();
        assert_eq!(api.writes(), 1);
        assert_eq!(api.activations(), 1);
    }

    #[test]
    fn test_state_id() {
        assert_eq!(CrudAdapter::<GroupKind>::state_id(&json!({"id": "12"})).unwrap(), 12);
        assert!(CrudAdapter::<GroupKind>::state_id(&json!({})).is_err());
        assert!(CrudAdapter::<GroupKind>::state_id(&json!({"id": "abc"})).is_err());
        assert_eq!(
            CrudAdapter::<TogglesKind>::state_id(&json!({})).unwrap(),
            "toggles"
        );
    }
}
