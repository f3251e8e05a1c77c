//! Testing utilities.
//!
//! [`ProviderTester`] drives a [`ProviderService`] in-process, without a gRPC
//! server. [`MockApi`] is an in-memory ZIA API that records every call, so
//! tests can assert on the exact number of writes and activations.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zia_provider::provider::ZiaProvider;
//! use zia_provider::testing::{MockApi, ProviderTester};
//!
//! let api = Arc::new(MockApi::new());
//! let tester = ProviderTester::new(ZiaProvider::with_client(api.clone()));
//! tester.configure(config).await.unwrap();
//! let state = tester.create("zia_url_categories", desired).await.unwrap();
//! assert_eq!(api.writes(), 1);
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{ApiClient, Lookup, ACTIVATE_PATH, STATUS_PATH};
use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// A test harness wrapping a [`ProviderService`].
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Registered resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Registered data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate provider configuration. Error diagnostics become
    /// [`TestError::Diagnostics`].
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider. Error diagnostics become
    /// [`TestError::Diagnostics`].
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a create.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan an update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a destroy.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read a resource. `Null` means it no longer exists.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update a resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Validate as an apply would. Error diagnostics become
    /// [`ProviderError::Validation`].
    async fn validate_for_apply(&self, resource_type: &str, config: &Value) -> Result<(), ProviderError> {
        match self.validate_resource_config(resource_type, config.clone()).await {
            Ok(()) => Ok(()),
            Err(TestError::Provider(err)) => Err(err),
            Err(err) => Err(ProviderError::Validation(err.to_string())),
        }
    }

    /// Validate, plan, create, then read back. Returns the state after read.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.validate_for_apply(resource_type, &config).await?;
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Validate, plan, update, then read back. Returns the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        self.validate_for_apply(resource_type, &proposed_state).await?;
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Plan a destroy, then delete.
    pub async fn lifecycle_delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone()).await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update, delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Failure of a tester operation.
#[derive(Debug)]
pub enum TestError {
    /// The provider returned error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The provider returned an error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan changes `path`.
///
/// # Panics
///
/// Panics if the plan has no change for `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires replacement.
///
/// # Panics
///
/// Panics if the plan updates in place.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that some error diagnostic's summary contains `substring`.
///
/// # Panics
///
/// Panics if none does.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.is_error() && d.summary.contains(substring)),
        "Expected an error containing '{}'. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

/// One request received by [`MockApi`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    /// `GET`, `POST`, `PUT` or `DELETE`.
    pub method: &'static str,
    /// Request path.
    pub path: String,
    /// Request body, `Null` for GET and DELETE.
    pub body: Value,
}

type Failure = Box<dyn FnOnce() -> ProviderError + Send>;

#[derive(Default)]
struct MockState {
    objects: BTreeMap<String, Value>,
    calls: Vec<ApiCall>,
    failures: HashMap<String, VecDeque<Failure>>,
    post_responses: HashMap<String, Value>,
    activation_response: Option<Value>,
    string_ids: HashMap<String, String>,
    next_id: i64,
}

impl MockState {
    fn record(&mut self, method: &'static str, path: &str, body: Value) -> Result<(), ProviderError> {
        self.calls.push(ApiCall {
            method,
            path: path.to_string(),
            body,
        });
        match self.failures.get_mut(path).and_then(VecDeque::pop_front) {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }

    fn assign_id(&mut self, collection: &str) -> Value {
        self.next_id += 1;
        match self.string_ids.get(collection) {
            Some(prefix) => json!(format!("{}{:02}", prefix, self.next_id)),
            None => json!(self.next_id),
        }
    }

    fn children(&self, collection: &str) -> Vec<Value> {
        let prefix = format!("{}/", collection);
        self.objects
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .map(|(_, value)| value.clone())
            .collect()
    }
}

/// In-memory ZIA API.
///
/// Objects live at their full path. POST to a collection assigns the next
/// id (numeric, or prefixed for collections registered with
/// [`MockApi::use_string_ids`]) and stores the body at `collection/id`. GET
/// of a path with no object returns its direct children as an array, or
/// not-found when there are none. `/status` starts out `ACTIVE`.
pub struct MockApi {
    state: Mutex<MockState>,
}

impl MockApi {
    /// An empty API with nothing pending activation.
    pub fn new() -> Self {
        let api = Self {
            state: Mutex::new(MockState::default()),
        };
        api.seed(STATUS_PATH, json!({"status": "ACTIVE"}));
        api
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `value` at `path`, replacing what was there.
    pub fn seed(&self, path: &str, value: Value) {
        self.state().objects.insert(path.to_string(), value);
    }

    /// The object stored at `path`.
    pub fn object(&self, path: &str) -> Option<Value> {
        self.state().objects.get(path).cloned()
    }

    /// Fail the next request to `path`, of any method, with `error()`.
    /// Queued failures are consumed in order.
    pub fn fail_next(&self, path: &str, error: impl FnOnce() -> ProviderError + Send + 'static) {
        self.state()
            .failures
            .entry(path.to_string())
            .or_default()
            .push_back(Box::new(error));
    }

    /// Answer the next POST to `path` with `response`, storing nothing.
    pub fn set_post_response(&self, path: &str, response: Value) {
        self.state()
            .post_responses
            .insert(path.to_string(), response);
    }

    /// Answer activation requests with `response` instead of `ACTIVE`.
    pub fn set_activation_response(&self, response: Value) {
        self.state().activation_response = Some(response);
    }

    /// Assign string ids (`{prefix}01`, `{prefix}02`, ...) in `collection`.
    pub fn use_string_ids(&self, collection: &str, prefix: &str) {
        self.state()
            .string_ids
            .insert(collection.to_string(), prefix.to_string());
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    /// Number of POST, PUT and DELETE requests, activations excluded.
    pub fn writes(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method != "GET" && c.path != ACTIVATE_PATH)
            .count()
    }

    /// Number of activation requests.
    pub fn activations(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method == "POST" && c.path == ACTIVATE_PATH)
            .count()
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiClient for MockApi {
    async fn get(&self, path: &str) -> Result<Lookup<Value>, ProviderError> {
        let mut state = self.state();
        state.record("GET", path, Value::Null)?;
        if let Some(object) = state.objects.get(path) {
            return Ok(Lookup::Found(object.clone()));
        }
        let children = state.children(path);
        if children.is_empty() {
            Ok(Lookup::NotFound)
        } else {
            Ok(Lookup::Found(Value::Array(children)))
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ProviderError> {
        let mut state = self.state();
        state.record("POST", path, body.clone())?;
        if path == ACTIVATE_PATH {
            return Ok(state
                .activation_response
                .clone()
                .unwrap_or_else(|| json!({"status": "ACTIVE"})));
        }
        if let Some(response) = state.post_responses.remove(path) {
            return Ok(response);
        }

        let mut object = body;
        let id = match object.get("id").filter(|id| !id.is_null()) {
            Some(id) => id.clone(),
            None => state.assign_id(path),
        };
        let key = match &id {
            Value::String(id) => format!("{}/{}", path, id),
            other => format!("{}/{}", path, other),
        };
        if let Value::Object(fields) = &mut object {
            fields.insert("id".to_string(), id);
        }
        state.objects.insert(key, object.clone());
        Ok(object)
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, ProviderError> {
        let mut state = self.state();
        state.record("PUT", path, body.clone())?;
        match state.objects.get_mut(path) {
            Some(object) => {
                *object = body.clone();
                Ok(body)
            },
            None => Err(ProviderError::NotFound(path.to_string())),
        }
    }

    async fn delete(&self, path: &str) -> Result<Lookup<()>, ProviderError> {
        let mut state = self.state();
        state.record("DELETE", path, Value::Null)?;
        Ok(match state.objects.remove(path) {
            Some(_) => Lookup::Found(()),
            None => Lookup::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeChange;

    #[tokio::test]
    async fn test_post_assigns_ids_and_lists_children() {
        let api = MockApi::new();
        let first = api.post("/rules", json!({"name": "a"})).await.unwrap();
        let second = api.post("/rules", json!({"name": "b"})).await.unwrap();
        api.seed("/rules/2/labels", json!([]));

        assert_eq!(first["id"], json!(1));
        assert_eq!(second["id"], json!(2));
        assert_eq!(api.object("/rules/2"), Some(json!({"name": "b", "id": 2})));

        let listed = api.get("/rules").await.unwrap();
        assert_eq!(
            listed,
            Lookup::Found(json!([{"name": "a", "id": 1}, {"name": "b", "id": 2}]))
        );
        assert_eq!(api.get("/other").await.unwrap(), Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_writes_and_activations_are_counted_apart() {
        let api = MockApi::new();
        api.seed("/settings", json!({"enabled": false}));

        api.put("/settings", json!({"enabled": true})).await.unwrap();
        api.activate().await.unwrap();
        assert!(api.put("/missing", json!({})).await.unwrap_err().is_not_found());
        assert_eq!(api.delete("/settings").await.unwrap(), Lookup::Found(()));
        assert_eq!(api.delete("/settings").await.unwrap(), Lookup::NotFound);

        assert_eq!(api.writes(), 4);
        assert_eq!(api.activations(), 1);
        assert_eq!(api.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_queued_failures_fire_once() {
        let api = MockApi::new();
        api.fail_next(STATUS_PATH, || ProviderError::Unavailable("busy".to_string()));

        assert!(api.activation_status().await.unwrap_err().is_retryable());
        assert!(api.activation_status().await.unwrap().is_active());
    }

    #[test]
    fn test_check_diagnostics_keeps_errors_only() {
        assert!(check_diagnostics(vec![Diagnostic::warning("deprecated")]).is_ok());
        match check_diagnostics(vec![Diagnostic::warning("w"), Diagnostic::error("bad")]) {
            Err(TestError::Diagnostics(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_error_contains(&errors, "bad");
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_plan_assertions() {
        let plan = PlanResult::with_changes(
            json!({"name": "b"}),
            vec![AttributeChange::modified("name", json!("a"), json!("b"))],
            true,
        );
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_replaces(&plan);
        assert_plan_no_changes(&PlanResult::no_change(json!({})));
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Missing required attribute username").with_attribute("username"),
            Diagnostic::error("Invalid api_key").with_detail("too short"),
        ]);
        let display = err.to_string();
        assert!(display.contains("(at username)"));
        assert!(display.contains("too short"));
    }
}
