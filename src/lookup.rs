//! Data sources: read-only lookups over resource kinds.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::crud::{AdapterContext, CrudAdapter, Lifecycle, ResourceId, ResourceKind};
use crate::error::ProviderError;
use crate::schema::Schema;
use crate::state::StateReader;

/// Type-erased data source read.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Resolve the configured lookup into a state document.
    async fn read(&self, config: Value) -> Result<Value, ProviderError>;
}

/// Schema of the data source for `K`: every attribute computed, with `id`
/// and the name attribute usable as search keys.
pub fn lookup_schema<K: ResourceKind>() -> Schema {
    K::schema().lookup_view(&["id", K::NAME_ATTRIBUTE])
}

/// Looks objects of kind `K` up by id or name.
///
/// Collections are searched by `id` first, then by name (case-insensitive);
/// singletons always read their fixed path. Finding nothing is an error.
pub struct DataSourceAdapter<K> {
    crud: CrudAdapter<K>,
}

impl<K: ResourceKind> DataSourceAdapter<K> {
    /// Create a data source.
    pub fn new(ctx: AdapterContext) -> Self {
        Self {
            crud: CrudAdapter::new(ctx),
        }
    }

    async fn lookup(&self, config: &Value) -> Result<Option<Value>, ProviderError> {
        if let Lifecycle::Singleton { id } = K::LIFECYCLE {
            let id = CrudAdapter::<K>::state_id(&json!({ "id": id }))?;
            return self.crud.find_by_id(&id).await;
        }

        let reader = StateReader::new(config);
        if let Some(raw) = reader.string("id") {
            let id = K::Id::parse(&raw).ok_or_else(|| {
                ProviderError::InvalidRequest(format!("{} is not a valid {} id", raw, K::TYPE_NAME))
            })?;
            debug!(resource_type = K::TYPE_NAME, id = %id, "Looking up by id");
            return self.crud.find_by_id(&id).await;
        }

        let name = reader.string(K::NAME_ATTRIBUTE).ok_or_else(|| {
            ProviderError::InvalidRequest(format!(
                "{} lookup needs `id` or `{}`",
                K::TYPE_NAME,
                K::NAME_ATTRIBUTE
            ))
        })?;
        debug!(resource_type = K::TYPE_NAME, name = %name, "Looking up by name");
        let Some(model) = self.crud.find_by_name(&name).await? else {
            return Ok(None);
        };
        let id = K::id(&model).ok_or_else(|| {
            ProviderError::Decode(format!("{} listing entry carried no id", K::TYPE_NAME))
        })?;
        self.crud.find_by_id(&id).await
    }
}

#[async_trait]
impl<K: ResourceKind> DataSource for DataSourceAdapter<K> {
    async fn read(&self, config: Value) -> Result<Value, ProviderError> {
        self.lookup(&config).await?.ok_or_else(|| {
            let key = StateReader::new(&config)
                .string("id")
                .or_else(|| StateReader::new(&config).string(K::NAME_ATTRIBUTE))
                .unwrap_or_default();
            ProviderError::NotFound(format!("no {} matches {:?}", K::TYPE_NAME, key))
        })
    }
}
