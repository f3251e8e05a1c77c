//! `zia_sandbox_behavioral_analysis_v2`: the organization's custom file hash
//! allow and block lists for Sandbox behavioral analysis.
//!
//! This is a singleton: there is exactly one list per tenant, replaced as a
//! whole by PUT. The list is a set; entries are compared with
//! [`crate::reconcile`], so reordering or placeholder blocks never cause a
//! write.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::crud::{Lifecycle, ResourceKind};
use crate::error::ProviderError;
use crate::reconcile::{effective, join_key, sets_equal, SetEntry};
use crate::schema::{Attribute, Block, NestedBlock, Schema, ValueValidator};
use crate::state::StateReader;

/// Hash list entry types.
pub const HASH_TYPES: [&str; 2] = ["CUSTOM_FILEHASH_ALLOW", "CUSTOM_FILEHASH_DENY"];

/// One entry of `md5HashValueList`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHashEntry {
    /// The MD5 digest.
    #[serde(default)]
    pub url: String,
    /// Free-form note.
    #[serde(default)]
    pub url_comment: String,
    /// `CUSTOM_FILEHASH_ALLOW` or `CUSTOM_FILEHASH_DENY`.
    #[serde(default, rename = "type")]
    pub hash_type: String,
}

impl SetEntry for FileHashEntry {
    fn is_placeholder(&self) -> bool {
        self.url.is_empty() && self.url_comment.is_empty() && self.hash_type.is_empty()
    }

    fn composite_key(&self) -> String {
        join_key(&[&self.url, &self.url_comment, &self.hash_type])
    }
}

/// Settings body at `/behavioralAnalysisAdvancedSettings/v2`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxSettings {
    /// The hash list.
    #[serde(default)]
    pub md5_hash_value_list: Vec<FileHashEntry>,
}

/// Sandbox behavioral analysis file hash list.
pub struct SandboxSettingsKind;

impl ResourceKind for SandboxSettingsKind {
    const TYPE_NAME: &'static str = "zia_sandbox_behavioral_analysis_v2";
    const PATH: &'static str = "/behavioralAnalysisAdvancedSettings/v2";
    const LIFECYCLE: Lifecycle = Lifecycle::Singleton {
        id: "sandbox_settings",
    };

    type Model = SandboxSettings;
    type Id = String;

    fn schema() -> Schema {
        let entry = Block::new()
            .with_attribute(
                "url",
                Attribute::required_string()
                    .with_validator(ValueValidator::Md5Hex)
                    .with_description("MD5 hash of the file"),
            )
            .with_attribute("url_comment", Attribute::optional_string())
            .with_attribute(
                "type",
                Attribute::required_string().with_validator(ValueValidator::one_of(HASH_TYPES)),
            );
        Schema::v0()
            .with_description("Custom file hash lists for Sandbox behavioral analysis")
            .with_attribute("id", Attribute::computed_string())
            .with_block("md5_hash_value_list", NestedBlock::set(entry))
    }

    fn expand(state: &Value) -> Result<SandboxSettings, ProviderError> {
        let entries: Vec<FileHashEntry> = StateReader::new(state)
            .blocks("md5_hash_value_list")
            .iter()
            .map(|block| FileHashEntry {
                url: block.string("url").unwrap_or_default(),
                url_comment: block.string("url_comment").unwrap_or_default(),
                hash_type: block.string("type").unwrap_or_default(),
            })
            .collect();
        Ok(SandboxSettings {
            md5_hash_value_list: effective(&entries),
        })
    }

    fn flatten(settings: &SandboxSettings) -> Value {
        let entries: Vec<Value> = settings
            .md5_hash_value_list
            .iter()
            .map(|entry| {
                json!({
                    "url": entry.url,
                    "url_comment": entry.url_comment,
                    "type": entry.hash_type,
                })
            })
            .collect();
        json!({ "md5_hash_value_list": entries })
    }

    fn id(_settings: &SandboxSettings) -> Option<String> {
        Some("sandbox_settings".to_string())
    }

    fn assign_id(_settings: &mut SandboxSettings, _id: &String) {}

    fn differs(desired: &SandboxSettings, remote: &SandboxSettings) -> bool {
        !sets_equal(&desired.md5_hash_value_list, &remote.md5_hash_value_list)
    }
}
