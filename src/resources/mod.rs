//! ZIA resource kinds and the catalog the provider registers.

pub mod activation_status;
pub mod advanced_threat;
pub mod firewall_rule;
pub mod sandbox_settings;
pub mod static_ip;
pub mod url_category;

use serde::{Deserialize, Serialize};

use crate::crud::{AdapterContext, CrudAdapter, ManagedResource, ResourceKind};
use crate::lookup::{lookup_schema, DataSource, DataSourceAdapter};
use crate::schema::Schema;

/// Reference to another ZIA object, as embedded in rule bodies.
///
/// ZIA returns the referenced object's name alongside its id; only the id is
/// sent and compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    /// Referenced object id.
    pub id: i64,
    /// Referenced object name, as reported by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Build references from bare ids.
pub fn id_refs(ids: Vec<i64>) -> Vec<IdRef> {
    ids.into_iter().map(|id| IdRef { id, name: None }).collect()
}

/// The ids of a list of references.
pub fn ref_ids(refs: &[IdRef]) -> Vec<i64> {
    refs.iter().map(|r| r.id).collect()
}

/// Builds a managed resource once the provider is configured.
pub type ResourceFactory = fn(&AdapterContext) -> Box<dyn ManagedResource>;

/// Builds a data source once the provider is configured.
pub type DataSourceFactory = fn(&AdapterContext) -> Box<dyn DataSource>;

/// A registered resource type.
pub struct ResourceEntry {
    /// Type name.
    pub type_name: &'static str,
    /// Resource schema.
    pub schema: Schema,
    /// Instantiates the resource against an adapter context.
    pub build: ResourceFactory,
}

impl ResourceEntry {
    /// Register a generic CRUD kind.
    pub fn of<K: ResourceKind>() -> Self {
        Self {
            type_name: K::TYPE_NAME,
            schema: K::schema(),
            build: build_crud::<K>,
        }
    }
}

/// A registered data source type.
pub struct DataSourceEntry {
    /// Type name.
    pub type_name: &'static str,
    /// Data source schema.
    pub schema: Schema,
    /// Instantiates the data source against an adapter context.
    pub build: DataSourceFactory,
}

impl DataSourceEntry {
    /// Register the lookup data source of a generic CRUD kind.
    pub fn of<K: ResourceKind>() -> Self {
        Self {
            type_name: K::TYPE_NAME,
            schema: lookup_schema::<K>(),
            build: build_lookup::<K>,
        }
    }
}

fn build_crud<K: ResourceKind>(ctx: &AdapterContext) -> Box<dyn ManagedResource> {
    Box::new(CrudAdapter::<K>::new(ctx.clone()))
}

fn build_lookup<K: ResourceKind>(ctx: &AdapterContext) -> Box<dyn DataSource> {
    Box::new(DataSourceAdapter::<K>::new(ctx.clone()))
}

/// Every resource type the provider serves.
pub fn resources() -> Vec<ResourceEntry> {
    vec![
        ResourceEntry::of::<firewall_rule::FirewallRuleKind>(),
        ResourceEntry::of::<url_category::UrlCategoryKind>(),
        ResourceEntry::of::<static_ip::StaticIpKind>(),
        ResourceEntry::of::<sandbox_settings::SandboxSettingsKind>(),
        ResourceEntry::of::<advanced_threat::AdvancedThreatKind>(),
        activation_status::resource_entry(),
    ]
}

/// Every data source type the provider serves.
pub fn data_sources() -> Vec<DataSourceEntry> {
    vec![
        DataSourceEntry::of::<firewall_rule::FirewallRuleKind>(),
        DataSourceEntry::of::<url_category::UrlCategoryKind>(),
        DataSourceEntry::of::<static_ip::StaticIpKind>(),
        DataSourceEntry::of::<sandbox_settings::SandboxSettingsKind>(),
        DataSourceEntry::of::<advanced_threat::AdvancedThreatKind>(),
        activation_status::data_source_entry(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_are_unique_and_paired() {
        let resources: Vec<_> = resources().iter().map(|e| e.type_name).collect();
        let data_sources: Vec<_> = data_sources().iter().map(|e| e.type_name).collect();

        assert_eq!(resources.iter().collect::<HashSet<_>>().len(), resources.len());
        assert_eq!(resources, data_sources);
        assert!(resources.iter().all(|name| name.starts_with("zia_")));
    }

    #[test]
    fn test_every_resource_schema_has_id() {
        for entry in resources() {
            let id = entry
                .schema
                .block
                .attributes
                .get("id")
                .unwrap_or_else(|| panic!("{} has no id", entry.type_name));
            assert!(id.flags.computed, "{}", entry.type_name);
        }
    }

    #[test]
    fn test_id_refs() {
        let refs = id_refs(vec![4, 9]);
        assert_eq!(ref_ids(&refs), vec![4, 9]);
        let parsed: IdRef = serde_json::from_value(serde_json::json!({"id": 4, "name": "HQ"})).unwrap();
        assert_eq!(parsed.name.as_deref(), Some("HQ"));
        assert_eq!(serde_json::to_value(&refs[0]).unwrap(), serde_json::json!({"id": 4}));
    }
}
