//! `zia_url_categories`: custom URL categories.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::crud::{Lifecycle, ResourceKind};
use crate::error::ProviderError;
use crate::reconcile::sets_equal;
use crate::schema::{Attribute, Schema, ValueValidator};
use crate::state::StateReader;

/// Category body as exchanged with `/urlCategories`.
///
/// Ids are strings (`CUSTOM_01`); predefined categories share the namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct UrlCategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_name: Option<String>,
    pub super_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub db_categorized_urls: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub ip_ranges: Vec<String>,
    #[serde(default)]
    pub custom_category: bool,
}

/// Custom URL categories.
pub struct UrlCategoryKind;

impl ResourceKind for UrlCategoryKind {
    const TYPE_NAME: &'static str = "zia_url_categories";
    const PATH: &'static str = "/urlCategories";
    const LIFECYCLE: Lifecycle = Lifecycle::Collection;
    const NAME_ATTRIBUTE: &'static str = "configured_name";

    type Model = UrlCategory;
    type Id = String;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A custom URL category")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "configured_name",
                Attribute::required_string()
                    .with_validator(ValueValidator::LengthBetween { min: 1, max: 255 }),
            )
            .with_attribute(
                "super_category",
                Attribute::required_string()
                    .with_description("Predefined super category, e.g. USER_DEFINED"),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("urls", Attribute::optional_string_set())
            .with_attribute(
                "db_categorized_urls",
                Attribute::optional_string_set()
                    .with_description("URLs retaining their predefined category as well"),
            )
            .with_attribute("keywords", Attribute::optional_string_set())
            .with_attribute("ip_ranges", Attribute::optional_string_set())
            .with_attribute("custom_category", Attribute::computed_bool())
    }

    fn expand(state: &Value) -> Result<UrlCategory, ProviderError> {
        let r = StateReader::new(state);
        Ok(UrlCategory {
            id: None,
            configured_name: Some(r.require_string("configured_name")?),
            super_category: r.require_string("super_category")?,
            description: r.string("description"),
            urls: r.strings("urls"),
            db_categorized_urls: r.strings("db_categorized_urls"),
            keywords: r.strings("keywords"),
            ip_ranges: r.strings("ip_ranges"),
            custom_category: true,
        })
    }

    fn flatten(category: &UrlCategory) -> Value {
        json!({
            "configured_name": category.configured_name.clone().unwrap_or_default(),
            "super_category": category.super_category,
            "description": category.description.clone().unwrap_or_default(),
            "urls": category.urls,
            "db_categorized_urls": category.db_categorized_urls,
            "keywords": category.keywords,
            "ip_ranges": category.ip_ranges,
            "custom_category": category.custom_category,
        })
    }

    fn id(category: &UrlCategory) -> Option<String> {
        category.id.clone().filter(|id| !id.is_empty())
    }

    fn assign_id(category: &mut UrlCategory, id: &String) {
        category.id = Some(id.clone());
    }

    fn differs(desired: &UrlCategory, remote: &UrlCategory) -> bool {
        desired.configured_name != remote.configured_name
            || desired.super_category != remote.super_category
            || desired.description.as_deref().unwrap_or_default()
                != remote.description.as_deref().unwrap_or_default()
            || !sets_equal(&desired.urls, &remote.urls)
            || !sets_equal(&desired.db_categorized_urls, &remote.db_categorized_urls)
            || !sets_equal(&desired.keywords, &remote.keywords)
            || !sets_equal(&desired.ip_ranges, &remote.ip_ranges)
    }

    fn name(category: &UrlCategory) -> Option<&str> {
        category.configured_name.as_deref()
    }
}
