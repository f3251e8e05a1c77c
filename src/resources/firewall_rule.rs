//! `zia_firewall_filtering_rule`: cloud firewall filtering rules.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{id_refs, ref_ids, IdRef};
use crate::crud::{Lifecycle, ResourceKind};
use crate::error::ProviderError;
use crate::reconcile::sets_equal;
use crate::schema::{Attribute, Schema, ValueValidator};
use crate::state::StateReader;

const DEFAULT_RANK: i64 = 7;
const DEFAULT_STATE: &str = "ENABLED";
const DEFAULT_ACTION: &str = "ALLOW";

/// Rule body as exchanged with `/firewallFilteringRules`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct FirewallRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order: i64,
    #[serde(default)]
    pub rank: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub enable_full_logging: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub src_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dest_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dest_countries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nw_services: Vec<IdRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<IdRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub departments: Vec<IdRef>,
}

/// Firewall filtering rules.
pub struct FirewallRuleKind;

impl ResourceKind for FirewallRuleKind {
    const TYPE_NAME: &'static str = "zia_firewall_filtering_rule";
    const PATH: &'static str = "/firewallFilteringRules";
    const LIFECYCLE: Lifecycle = Lifecycle::Collection;

    type Model = FirewallRule;
    type Id = i64;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A cloud firewall filtering rule")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(ValueValidator::LengthBetween { min: 1, max: 31 }),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_validator(ValueValidator::LengthBetween { min: 0, max: 10240 }),
            )
            .with_attribute(
                "order",
                Attribute::required_int64()
                    .with_validator(ValueValidator::IntBetween { min: 1, max: i64::MAX })
                    .with_description("Evaluation order, starting at 1"),
            )
            .with_attribute(
                "rank",
                Attribute::optional_int64()
                    .with_default(json!(DEFAULT_RANK))
                    .with_validator(ValueValidator::IntBetween { min: 0, max: 7 })
                    .with_description("Admin rank, 0 to 7"),
            )
            .with_attribute(
                "state",
                Attribute::optional_string()
                    .with_default(json!(DEFAULT_STATE))
                    .with_validator(ValueValidator::one_of(["ENABLED", "DISABLED"])),
            )
            .with_attribute(
                "action",
                Attribute::optional_string()
                    .with_default(json!(DEFAULT_ACTION))
                    .with_validator(ValueValidator::one_of([
                        "ALLOW",
                        "BLOCK_DROP",
                        "BLOCK_RESET",
                        "BLOCK_ICMP",
                        "EVAL_NWAPP",
                    ])),
            )
            .with_attribute("enable_full_logging", Attribute::optional_bool())
            .with_attribute(
                "src_ips",
                Attribute::optional_string_set().with_description("Source IPs, ranges or CIDRs"),
            )
            .with_attribute("dest_addresses", Attribute::optional_string_set())
            .with_attribute(
                "dest_countries",
                Attribute::optional_string_set().with_description("ISO country codes"),
            )
            .with_attribute("nw_services", Attribute::optional_id_set())
            .with_attribute("locations", Attribute::optional_id_set())
            .with_attribute("departments", Attribute::optional_id_set())
    }

    fn expand(state: &Value) -> Result<FirewallRule, ProviderError> {
        let r = StateReader::new(state);
        Ok(FirewallRule {
            id: None,
            name: r.require_string("name")?,
            description: r.string("description"),
            order: r
                .int("order")
                .ok_or_else(|| ProviderError::Validation("order is required".to_string()))?,
            rank: r.int("rank").unwrap_or(DEFAULT_RANK),
            state: Some(r.string("state").unwrap_or_else(|| DEFAULT_STATE.to_string())),
            action: r.string("action").unwrap_or_else(|| DEFAULT_ACTION.to_string()),
            enable_full_logging: r.bool("enable_full_logging").unwrap_or(false),
            src_ips: r.strings("src_ips"),
            dest_addresses: r.strings("dest_addresses"),
            dest_countries: r.strings("dest_countries"),
            nw_services: id_refs(r.ids("nw_services")),
            locations: id_refs(r.ids("locations")),
            departments: id_refs(r.ids("departments")),
        })
    }

    fn flatten(rule: &FirewallRule) -> Value {
        json!({
            "name": rule.name,
            "description": rule.description.clone().unwrap_or_default(),
            "order": rule.order,
            "rank": rule.rank,
            "state": rule.state.as_deref().unwrap_or(DEFAULT_STATE),
            "action": rule.action,
            "enable_full_logging": rule.enable_full_logging,
            "src_ips": rule.src_ips,
            "dest_addresses": rule.dest_addresses,
            "dest_countries": rule.dest_countries,
            "nw_services": ref_ids(&rule.nw_services),
            "locations": ref_ids(&rule.locations),
            "departments": ref_ids(&rule.departments),
        })
    }

    fn id(rule: &FirewallRule) -> Option<i64> {
        rule.id
    }

    fn assign_id(rule: &mut FirewallRule, id: &i64) {
        rule.id = Some(*id);
    }

    fn differs(desired: &FirewallRule, remote: &FirewallRule) -> bool {
        let state = |rule: &FirewallRule| rule.state.clone().unwrap_or_else(|| DEFAULT_STATE.to_string());
        desired.name != remote.name
            || desired.description.as_deref().unwrap_or_default()
                != remote.description.as_deref().unwrap_or_default()
            || desired.order != remote.order
            || desired.rank != remote.rank
            || state(desired) != state(remote)
            || desired.action != remote.action
            || desired.enable_full_logging != remote.enable_full_logging
            || !sets_equal(&desired.src_ips, &remote.src_ips)
            || !sets_equal(&desired.dest_addresses, &remote.dest_addresses)
            || !sets_equal(&desired.dest_countries, &remote.dest_countries)
            || !sets_equal(&ref_ids(&desired.nw_services), &ref_ids(&remote.nw_services))
            || !sets_equal(&ref_ids(&desired.locations), &ref_ids(&remote.locations))
            || !sets_equal(&ref_ids(&desired.departments), &ref_ids(&remote.departments))
    }

    fn name(rule: &FirewallRule) -> Option<&str> {
        Some(&rule.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{ActivationSettings, ActivationTrigger};
    use crate::crud::{AdapterContext, CrudAdapter};
    use crate::retry::RetryPolicy;
    use crate::testing::MockApi;
    use crate::validation::validate;
    use std::sync::Arc;
    use std::time::Duration;

    fn desired() -> Value {
        json!({
            "name": "Block P2P",
            "order": 3,
            "action": "BLOCK_DROP",
            "src_ips": ["10.0.0.0/8", "192.168.1.1"],
            "dest_countries": ["COUNTRY_CN", "COUNTRY_RU"],
            "locations": [101, 102],
            "nw_services": []
        })
    }

    #[test]
    fn test_expand_wire_shape() {
        let rule = FirewallRuleKind::expand(&desired()).unwrap();
        let body = serde_json::to_value(&rule).unwrap();
        assert_eq!(body["rank"], json!(7));
        assert_eq!(body["state"], json!("ENABLED"));
        assert_eq!(body["srcIps"], json!(["10.0.0.0/8", "192.168.1.1"]));
        assert_eq!(body["locations"], json!([{"id": 101}, {"id": 102}]));
        assert!(body.get("nwServices").is_none());
        assert!(body.get("id").is_none());
    }

    #[test]
    fn test_differs_ignores_order_and_reference_names() {
        let desired = FirewallRuleKind::expand(&desired()).unwrap();
        let remote: FirewallRule = serde_json::from_value(json!({
            "id": 55,
            "name": "Block P2P",
            "order": 3,
            "rank": 7,
            "state": "ENABLED",
            "action": "BLOCK_DROP",
            "srcIps": ["192.168.1.1", "10.0.0.0/8"],
            "destCountries": ["COUNTRY_RU", "COUNTRY_CN"],
            "locations": [{"id": 102, "name": "Branch"}, {"id": 101, "name": "HQ"}]
        }))
        .unwrap();
        assert!(!FirewallRuleKind::differs(&desired, &remote));

        let mut moved = remote.clone();
        moved.order = 4;
        assert!(FirewallRuleKind::differs(&desired, &moved));

        let mut relocated = remote;
        relocated.locations.pop();
        assert!(FirewallRuleKind::differs(&desired, &relocated));
    }

    #[test]
    fn test_schema_validation() {
        let schema = FirewallRuleKind::schema();
        assert!(validate(&schema, &desired()).is_empty());

        let mut bad = desired();
        bad["rank"] = json!(9);
        bad["action"] = json!("DENY");
        bad["order"] = json!(0);
        let diags = validate(&schema, &bad);
        assert_eq!(diags.len(), 3);
    }

    #[tokio::test]
    async fn test_lifecycle_against_mock() {
        let api = Arc::new(MockApi::new());
        let ctx = AdapterContext::new(
            api.clone(),
            ActivationTrigger::new(
                ActivationSettings::enabled().with_delay(Duration::ZERO),
                RetryPolicy::none(),
            ),
            RetryPolicy::none(),
        );
        let adapter = CrudAdapter::<FirewallRuleKind>::new(ctx);

        let state = adapter.create(&desired()).await.unwrap();
        let id: i64 = state["id"].as_str().unwrap().parse().unwrap();
        assert_eq!(state["locations"], json!([101, 102]));

        let mut reordered = desired();
        reordered["src_ips"] = json!(["192.168.1.1", "10.0.0.0/8"]);
        adapter.update(&id, &reordered).await.unwrap();
        assert_eq!(api.writes(), 1);

        adapter.delete(&id).await.unwrap();
        assert_eq!(api.writes(), 2);
        assert_eq!(api.activations(), 2);
    }
}
