//! `zia_activation_status`: explicit activation of staged configuration.
//!
//! Creating or updating this resource activates pending changes regardless
//! of the provider's `activation` flag, so a configuration can stage many
//! changes and activate once at the end.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{DataSourceEntry, ResourceEntry};
use crate::client::{decode, ActivationState, STATUS_PATH};
use crate::crud::{AdapterContext, ManagedResource};
use crate::error::ProviderError;
use crate::lookup::DataSource;
use crate::schema::{Attribute, Schema, ValueValidator};

/// Type name of the resource and data source.
pub const TYPE_NAME: &str = "zia_activation_status";

const STATE_ID: &str = "activation";

fn schema() -> Schema {
    Schema::v0()
        .with_description("Activates staged ZIA configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "status",
            Attribute::optional_computed_string()
                .with_validator(ValueValidator::one_of(["ACTIVE"]))
                .with_description("Set to ACTIVE to activate pending changes"),
        )
}

fn data_source_schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("status", Attribute::computed_string())
}

fn to_state(state: &ActivationState) -> Value {
    json!({"id": STATE_ID, "status": state.status})
}

async fn current(ctx: &AdapterContext) -> Result<ActivationState, ProviderError> {
    let doc = ctx.get(STATUS_PATH).await?.require("activation status")?;
    decode(doc, "activation status")
}

/// The activation resource.
pub struct ActivationStatus {
    ctx: AdapterContext,
}

impl ActivationStatus {
    /// Create the resource.
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }

    async fn activate(&self, operation: &str) -> Result<Value, ProviderError> {
        let state = self
            .ctx
            .activation
            .activate_now(self.ctx.api.as_ref(), operation)
            .await?;
        info!(resource_type = TYPE_NAME, status = %state.status, "Activation applied");
        Ok(to_state(&state))
    }
}

#[async_trait]
impl ManagedResource for ActivationStatus {
    async fn create(&self, _planned: Value) -> Result<Value, ProviderError> {
        self.activate("create zia_activation_status").await
    }

    async fn read(&self, _current: Value) -> Result<Option<Value>, ProviderError> {
        Ok(Some(to_state(&current(&self.ctx).await?)))
    }

    async fn update(&self, _prior: Value, _planned: Value) -> Result<Value, ProviderError> {
        self.activate("update zia_activation_status").await
    }

    async fn delete(&self, _current: Value) -> Result<(), ProviderError> {
        info!(resource_type = TYPE_NAME, "Nothing to delete, removing from state only");
        Ok(())
    }

    async fn import(&self, _id: &str) -> Result<Value, ProviderError> {
        Ok(to_state(&current(&self.ctx).await?))
    }
}

/// The activation status data source.
pub struct ActivationStatusSource {
    ctx: AdapterContext,
}

#[async_trait]
impl DataSource for ActivationStatusSource {
    async fn read(&self, _config: Value) -> Result<Value, ProviderError> {
        Ok(to_state(&current(&self.ctx).await?))
    }
}

/// Catalog entry for the resource.
pub fn resource_entry() -> ResourceEntry {
    ResourceEntry {
        type_name: TYPE_NAME,
        schema: schema(),
        build: build_resource,
    }
}

fn build_resource(ctx: &AdapterContext) -> Box<dyn ManagedResource> {
    Box::new(ActivationStatus::new(ctx.clone()))
}

/// Catalog entry for the data source.
pub fn data_source_entry() -> DataSourceEntry {
    DataSourceEntry {
        type_name: TYPE_NAME,
        schema: data_source_schema(),
        build: build_data_source,
    }
}

fn build_data_source(ctx: &AdapterContext) -> Box<dyn DataSource> {
    Box::new(ActivationStatusSource { ctx: ctx.clone() })
}
