//! `zia_advanced_threat_settings`: tenant-wide Advanced Threat Protection
//! policy.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::crud::{Lifecycle, ResourceKind};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, ValueValidator};
use crate::state::StateReader;

/// Settings body at `/cyberThreatProtection/advancedThreatSettings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct AdvancedThreatSettings {
    pub risk_tolerance: i64,
    pub risk_tolerance_capture: bool,
    pub cmd_ctl_server_blocked: bool,
    pub cmd_ctl_traffic_blocked: bool,
    pub malware_sites_blocked: bool,
    #[serde(rename = "activeXBlocked")]
    pub activex_blocked: bool,
    pub browser_exploits_blocked: bool,
    #[serde(rename = "fileFormatVunerabilitesBlocked")]
    pub file_format_vulnerabilities_blocked: bool,
    pub known_phishing_sites_blocked: bool,
    pub suspected_phishing_sites_blocked: bool,
    pub crypto_mining_blocked: bool,
    pub dga_domains_blocked: bool,
    pub tor_blocked: bool,
    pub alert_for_unknown_or_suspicious_c2_traffic: bool,
}

/// State attribute names of the boolean toggles, in declaration order.
const TOGGLES: [&str; 13] = [
    "risk_tolerance_capture",
    "cmd_ctl_server_blocked",
    "cmd_ctl_traffic_blocked",
    "malware_sites_blocked",
    "activex_blocked",
    "browser_exploits_blocked",
    "file_format_vulnerabilities_blocked",
    "known_phishing_sites_blocked",
    "suspected_phishing_sites_blocked",
    "crypto_mining_blocked",
    "dga_domains_blocked",
    "tor_blocked",
    "alert_for_unknown_or_suspicious_c2_traffic",
];

impl AdvancedThreatSettings {
    fn toggles_mut(&mut self) -> [&mut bool; 13] {
        [
            &mut self.risk_tolerance_capture,
            &mut self.cmd_ctl_server_blocked,
            &mut self.cmd_ctl_traffic_blocked,
            &mut self.malware_sites_blocked,
            &mut self.activex_blocked,
            &mut self.browser_exploits_blocked,
            &mut self.file_format_vulnerabilities_blocked,
            &mut self.known_phishing_sites_blocked,
            &mut self.suspected_phishing_sites_blocked,
            &mut self.crypto_mining_blocked,
            &mut self.dga_domains_blocked,
            &mut self.tor_blocked,
            &mut self.alert_for_unknown_or_suspicious_c2_traffic,
        ]
    }

    fn toggles(&self) -> [bool; 13] {
        [
            self.risk_tolerance_capture,
            self.cmd_ctl_server_blocked,
            self.cmd_ctl_traffic_blocked,
            self.malware_sites_blocked,
            self.activex_blocked,
            self.browser_exploits_blocked,
            self.file_format_vulnerabilities_blocked,
            self.known_phishing_sites_blocked,
            self.suspected_phishing_sites_blocked,
            self.crypto_mining_blocked,
            self.dga_domains_blocked,
            self.tor_blocked,
            self.alert_for_unknown_or_suspicious_c2_traffic,
        ]
    }
}

/// Advanced Threat Protection settings.
pub struct AdvancedThreatKind;

impl ResourceKind for AdvancedThreatKind {
    const TYPE_NAME: &'static str = "zia_advanced_threat_settings";
    const PATH: &'static str = "/cyberThreatProtection/advancedThreatSettings";
    const LIFECYCLE: Lifecycle = Lifecycle::Singleton {
        id: "advanced_threat_settings",
    };

    type Model = AdvancedThreatSettings;
    type Id = String;

    fn schema() -> Schema {
        let schema = Schema::v0()
            .with_description("Advanced Threat Protection policy")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "risk_tolerance",
                Attribute::optional_int64()
                    .with_validator(ValueValidator::IntBetween { min: 0, max: 100 })
                    .with_description("Page risk score above which content is blocked"),
            );
        TOGGLES
            .iter()
            .fold(schema, |schema, name| schema.with_attribute(*name, Attribute::optional_bool()))
    }

    fn expand(state: &Value) -> Result<AdvancedThreatSettings, ProviderError> {
        let r = StateReader::new(state);
        let mut settings = AdvancedThreatSettings {
            risk_tolerance: r.int("risk_tolerance").unwrap_or(0),
            ..AdvancedThreatSettings::default()
        };
        for (name, toggle) in TOGGLES.iter().zip(settings.toggles_mut()) {
            *toggle = r.bool(name).unwrap_or(false);
        }
        Ok(settings)
    }

    fn flatten(settings: &AdvancedThreatSettings) -> Value {
        let mut state = Map::new();
        state.insert("risk_tolerance".to_string(), Value::from(settings.risk_tolerance));
        for (name, toggle) in TOGGLES.iter().zip(settings.toggles()) {
            state.insert(name.to_string(), Value::Bool(toggle));
        }
        Value::Object(state)
    }

    fn id(_settings: &AdvancedThreatSettings) -> Option<String> {
        Some("advanced_threat_settings".to_string())
    }

    fn assign_id(_settings: &mut AdvancedThreatSettings, _id: &String) {}

    fn differs(desired: &AdvancedThreatSettings, remote: &AdvancedThreatSettings) -> bool {
        desired != remote
    }
}
