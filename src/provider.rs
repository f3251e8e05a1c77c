//! The ZIA provider: resource registration and dispatch.
//!
//! [`ZiaProvider`] holds the catalog of resource and data source kinds. On
//! `configure` it resolves credentials, builds the API client, and
//! instantiates every kind against one shared [`AdapterContext`]. All later
//! operations dispatch by type name into that registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::activation::ActivationTrigger;
use crate::client::http::ZiaHttpClient;
use crate::client::ApiClient;
use crate::config::{provider_schema, ProviderConfig, ProviderSettings};
use crate::crud::{AdapterContext, ManagedResource};
use crate::diff;
use crate::error::ProviderError;
use crate::lookup::DataSource;
use crate::resources::{self, DataSourceEntry, ResourceEntry};
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation::validate;

/// Builds the API client from resolved settings.
pub type ClientFactory =
    Box<dyn Fn(&ProviderSettings) -> Result<Arc<dyn ApiClient>, ProviderError> + Send + Sync>;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resource and data source instances bound to one configured client.
struct Registry {
    api: Arc<dyn ApiClient>,
    resources: HashMap<&'static str, Box<dyn ManagedResource>>,
    data_sources: HashMap<&'static str, Box<dyn DataSource>>,
}

impl Registry {
    fn resource(&self, type_name: &str) -> Result<&dyn ManagedResource, ProviderError> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn data_source(&self, type_name: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(type_name)
            .map(|d| d.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }
}

/// The Zscaler Internet Access provider.
pub struct ZiaProvider {
    resources: Vec<ResourceEntry>,
    data_sources: Vec<DataSourceEntry>,
    client_factory: ClientFactory,
    env: EnvLookup,
    registry: RwLock<Option<Arc<Registry>>>,
}

impl ZiaProvider {
    /// A provider talking to the ZIA API over HTTPS, with environment
    /// fallbacks read from the process environment.
    pub fn new() -> Self {
        Self::with_client_factory(Box::new(|settings: &ProviderSettings| {
            let client = ZiaHttpClient::new(
                settings.base_url.clone(),
                settings.credentials.clone(),
                settings.request_timeout,
            )?;
            Ok(Arc::new(client) as Arc<dyn ApiClient>)
        }))
    }

    /// A provider whose API client is built by `factory` on configure.
    pub fn with_client_factory(factory: ClientFactory) -> Self {
        Self {
            resources: resources::resources(),
            data_sources: resources::data_sources(),
            client_factory: factory,
            env: Box::new(|name: &str| std::env::var(name).ok()),
            registry: RwLock::new(None),
        }
    }

    /// A provider that uses `api` for every configuration.
    pub fn with_client(api: Arc<dyn ApiClient>) -> Self {
        Self::with_client_factory(Box::new(move |_: &ProviderSettings| Ok(api.clone())))
    }

    /// Replace the environment lookup used for configuration fallbacks.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    /// Whether `configure` has succeeded.
    pub async fn is_configured(&self) -> bool {
        self.registry.read().await.is_some()
    }

    async fn registry(&self) -> Result<Arc<Registry>, ProviderError> {
        self.registry.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider is not configured".to_string())
        })
    }

    fn resource_schema(&self, type_name: &str) -> Result<&Schema, ProviderError> {
        self.resources
            .iter()
            .find(|e| e.type_name == type_name)
            .map(|e| &e.schema)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn data_source_schema(&self, type_name: &str) -> Result<&Schema, ProviderError> {
        self.data_sources
            .iter()
            .find(|e| e.type_name == type_name)
            .map(|e| &e.schema)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn build_registry(&self, settings: &ProviderSettings) -> Result<Registry, ProviderError> {
        let api = (self.client_factory)(settings)?;
        let ctx = AdapterContext::new(
            api.clone(),
            ActivationTrigger::new(settings.activation, settings.retry),
            settings.retry,
        );
        Ok(Registry {
            api,
            resources: self
                .resources
                .iter()
                .map(|e| (e.type_name, (e.build)(&ctx)))
                .collect(),
            data_sources: self
                .data_sources
                .iter()
                .map(|e| (e.type_name, (e.build)(&ctx)))
                .collect(),
        })
    }
}

impl Default for ZiaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProviderService for ZiaProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(provider_schema());
        let schema = self
            .resources
            .iter()
            .fold(schema, |s, e| s.with_resource(e.type_name, e.schema.clone()));
        self.data_sources
            .iter()
            .fold(schema, |s, e| s.with_data_source(e.type_name, e.schema.clone()))
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.resources.iter().map(|e| e.type_name.to_string()).collect(),
            data_sources: self.data_sources.iter().map(|e| e.type_name.to_string()).collect(),
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&provider_schema(), &config);
        if let Err(problems) = ProviderConfig::from_value(&config) {
            diagnostics.extend(problems);
        }
        Ok(diagnostics)
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&provider_schema(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        let settings = match ProviderConfig::from_value(&config)
            .and_then(|c| c.resolve(|name| (self.env)(name)))
        {
            Ok(settings) => settings,
            Err(problems) => {
                warn!(problems = problems.len(), "Provider configuration rejected");
                return Ok(problems);
            },
        };

        let registry = self.build_registry(&settings)?;
        info!(
            base_url = %settings.base_url,
            activation = settings.activation.enabled,
            max_attempts = settings.retry.max_attempts,
            "Provider configured"
        );
        *self.registry.write().await = Some(Arc::new(registry));
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        let registry = self.registry.write().await.take();
        match registry {
            Some(registry) => registry.api.close().await,
            None => Ok(()),
        }
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(self.resource_schema(resource_type)?, &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.resource_schema(resource_type)?;
        Ok(diff::plan(schema, prior_state.as_ref(), &proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let registry = self.registry().await?;
        registry.resource(resource_type)?.create(planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let registry = self.registry().await?;
        match registry.resource(resource_type)?.read(current_state).await? {
            Some(state) => Ok(state),
            None => {
                debug!(resource_type = %resource_type, "Signalling removal from state");
                Ok(Value::Null)
            },
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let registry = self.registry().await?;
        registry
            .resource(resource_type)?
            .update(prior_state, planned_state)
            .await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let registry = self.registry().await?;
        registry.resource(resource_type)?.delete(current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let registry = self.registry().await?;
        let state = registry.resource(resource_type)?.import(id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(self.data_source_schema(data_source_type)?, &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let registry = self.registry().await?;
        registry.data_source(data_source_type)?.read(config).await
    }
}
