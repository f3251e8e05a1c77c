//! Schema types describing provider configuration, resources and data sources.
//!
//! A [`Schema`] is a versioned root [`Block`]; blocks hold typed
//! [`Attribute`]s and [`NestedBlock`]s. Attributes may carry
//! [`ValueValidator`]s which [`crate::validation`] applies to configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A 64-bit floating point number.
    Float64,
    /// A boolean value.
    Bool,
    /// An ordered list of values.
    List(Box<AttributeType>),
    /// An unordered collection of unique values.
    Set(Box<AttributeType>),
    /// A map from string keys to values.
    Map(Box<AttributeType>),
    /// An object with a fixed set of attributes.
    Object(HashMap<String, AttributeType>),
    /// Any JSON value.
    Dynamic,
}

impl AttributeType {
    /// Create a list type.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create a set type.
    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }

    /// Create a map type.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }
}

/// Describes how an attribute can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must be set in configuration.
    pub required: bool,
    /// May be set in configuration.
    pub optional: bool,
    /// Filled in by the provider.
    pub computed: bool,
    /// Hidden in logs and plan output.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Flags for a read-only attribute set by the provider.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Flags for an attribute the user may set and the API may default.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Whether the attribute is set by the provider only.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// A constraint on an attribute's value, checked during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueValidator {
    /// The string must be one of the listed values.
    OneOf {
        /// Accepted values.
        values: Vec<String>,
    },
    /// The string length (in characters) must be within bounds.
    LengthBetween {
        /// Minimum length, inclusive.
        min: usize,
        /// Maximum length, inclusive.
        max: usize,
    },
    /// The integer must be within bounds.
    IntBetween {
        /// Minimum, inclusive.
        min: i64,
        /// Maximum, inclusive.
        max: i64,
    },
    /// The string must be an IPv4 or IPv6 address.
    IpAddress,
    /// The string must be a 32-character hexadecimal MD5 digest.
    Md5Hex,
}

impl ValueValidator {
    /// Accept only the given strings.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Check a value. Non-matching JSON types are left to type validation.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (Self::OneOf { values }, Value::String(s)) => {
                if values.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(format!("expected one of {:?}, got {:?}", values, s))
                }
            },
            (Self::LengthBetween { min, max }, Value::String(s)) => {
                let len = s.chars().count();
                if len >= *min && len <= *max {
                    Ok(())
                } else {
                    Err(format!(
                        "expected length between {} and {}, got {}",
                        min, max, len
                    ))
                }
            },
            (Self::IntBetween { min, max }, Value::Number(n)) => match n.as_i64() {
                Some(i) if i >= *min && i <= *max => Ok(()),
                _ => Err(format!("expected integer between {} and {}, got {}", min, max, n)),
            },
            (Self::IpAddress, Value::String(s)) => s
                .parse::<IpAddr>()
                .map(|_| ())
                .map_err(|_| format!("{:?} is not a valid IP address", s)),
            (Self::Md5Hex, Value::String(s)) => {
                if s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit()) {
                    Ok(())
                } else {
                    Err(format!("{:?} is not an MD5 hash", s))
                }
            },
            _ => Ok(()),
        }
    }
}

/// Describes a single attribute in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// How the attribute can be used.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Changing this attribute replaces the object.
    #[serde(default)]
    pub force_new: bool,
    /// Default value used when the attribute is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Constraints applied to the value (and to each element of collections).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<ValueValidator>,
}

impl Attribute {
    /// Create a new attribute with the given type and flags.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            validators: Vec::new(),
        }
    }

    /// Required string.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// Optional string.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// Computed string.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// Optional string that the API fills in when unset.
    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional_computed())
    }

    /// Required int64.
    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    /// Optional int64.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// Optional float64.
    pub fn optional_float64() -> Self {
        Self::new(AttributeType::Float64, AttributeFlags::optional())
    }

    /// Optional bool.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// Computed bool.
    pub fn computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::computed())
    }

    /// Optional set of strings.
    pub fn optional_string_set() -> Self {
        Self::new(
            AttributeType::set(AttributeType::String),
            AttributeFlags::optional(),
        )
    }

    /// Optional set of numeric ids.
    pub fn optional_id_set() -> Self {
        Self::new(
            AttributeType::set(AttributeType::Int64),
            AttributeFlags::optional(),
        )
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Changing this attribute replaces the object.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Set a default value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Add a value validator.
    pub fn with_validator(mut self, validator: ValueValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Mark as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    /// Whether the value is an unordered collection.
    pub fn is_set(&self) -> bool {
        matches!(self.attr_type, AttributeType::Set(_))
    }
}

/// The nesting mode for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// At most one block.
    #[default]
    Single,
    /// Ordered blocks.
    List,
    /// Unordered, unique blocks.
    Set,
    /// Blocks keyed by string.
    Map,
}

/// A group of attributes and nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Attribute>,
    /// Nested blocks by name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub blocks: HashMap<String, NestedBlock>,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A nested block with its nesting mode and item bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// The block definition.
    #[serde(flatten)]
    pub block: Block,
    /// How the block nests.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Minimum number of blocks.
    #[serde(default)]
    pub min_items: u32,
    /// Maximum number of blocks (0 = unlimited).
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    fn with_mode(block: Block, nesting_mode: BlockNestingMode, max_items: u32) -> Self {
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
        }
    }

    /// At most one nested block.
    pub fn single(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Single, 1)
    }

    /// Ordered nested blocks.
    pub fn list(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::List, 0)
    }

    /// Unordered nested blocks, compared with [`crate::reconcile`].
    pub fn set(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Set, 0)
    }

    /// Nested blocks keyed by string.
    pub fn map(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Map, 0)
    }

    /// Set the minimum number of blocks.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Set the maximum number of blocks.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }
}

/// Schema for a resource, data source or the provider itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Version used for state upgrades.
    #[serde(default)]
    pub version: u64,
    /// The root block.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// Create a schema with the given version.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// Create a version 0 schema.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }

    /// Derive a data source schema from a resource schema.
    ///
    /// Every attribute becomes computed and loses its validators and
    /// force-new flag; the `lookup` attributes become optional+computed so
    /// they can be used as search keys.
    pub fn lookup_view(&self, lookup: &[&str]) -> Schema {
        let mut view = Schema {
            version: 0,
            block: computed_block(&self.block),
        };
        for key in lookup {
            if let Some(attr) = view.block.attributes.get_mut(*key) {
                attr.flags = AttributeFlags::optional_computed();
            }
        }
        view
    }
}

fn computed_block(block: &Block) -> Block {
    Block {
        attributes: block
            .attributes
            .iter()
            .map(|(name, attr)| {
                let mut computed =
                    Attribute::new(attr.attr_type.clone(), AttributeFlags::computed());
                computed.description = attr.description.clone();
                (name.clone(), computed)
            })
            .collect(),
        blocks: block
            .blocks
            .iter()
            .map(|(name, nested)| {
                (
                    name.clone(),
                    NestedBlock::with_mode(computed_block(&nested.block), nested.nesting_mode, 0),
                )
            })
            .collect(),
        description: block.description.clone(),
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// The full schema a provider advertises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Provider configuration schema.
    #[serde(default)]
    pub provider: Schema,
    /// Resource schemas by type name.
    #[serde(default)]
    pub resources: HashMap<String, Schema>,
    /// Data source schemas by type name.
    #[serde(default)]
    pub data_sources: HashMap<String, Schema>,
}

impl ProviderSchema {
    /// Create an empty provider schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Add a data source schema.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Prevents the operation from completing.
    Error,
    /// Reported but not fatal.
    Warning,
}

/// A diagnostic message returned to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: DiagnosticSeverity,
    /// Short summary.
    pub summary: String,
    /// Longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Attribute path the diagnostic concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_flags() {
        assert!(AttributeFlags::computed().is_computed_only());
        assert!(!AttributeFlags::optional_computed().is_computed_only());
        assert!(!AttributeFlags::required().is_computed_only());

        let attr = Attribute::required_string().sensitive();
        assert!(attr.flags.sensitive);
        assert!(attr.flags.required);
    }

    #[test]
    fn test_one_of_validator() {
        let v = ValueValidator::one_of(["ENABLED", "DISABLED"]);
        assert!(v.check(&json!("ENABLED")).is_ok());
        let err = v.check(&json!("enabled")).unwrap_err();
        assert!(err.contains("expected one of"));
        // Type mismatches are reported by type validation, not here.
        assert!(v.check(&json!(1)).is_ok());
    }

    #[test]
    fn test_range_validators() {
        let rank = ValueValidator::IntBetween { min: 0, max: 7 };
        assert!(rank.check(&json!(7)).is_ok());
        assert!(rank.check(&json!(8)).is_err());
        assert!(rank.check(&json!(-1)).is_err());

        let name = ValueValidator::LengthBetween { min: 1, max: 5 };
        assert!(name.check(&json!("abcde")).is_ok());
        assert!(name.check(&json!("")).is_err());
        assert!(name.check(&json!("abcdef")).is_err());
    }

    #[test]
    fn test_format_validators() {
        assert!(ValueValidator::IpAddress.check(&json!("203.0.113.7")).is_ok());
        assert!(ValueValidator::IpAddress.check(&json!("2001:db8::1")).is_ok());
        assert!(ValueValidator::IpAddress.check(&json!("203.0.113")).is_err());

        let md5 = ValueValidator::Md5Hex;
        assert!(md5.check(&json!("d41d8cd98f00b204e9800998ecf8427e")).is_ok());
        assert!(md5.check(&json!("d41d8cd98f00b204e9800998ecf8427")).is_err());
        assert!(md5.check(&json!("z41d8cd98f00b204e9800998ecf8427e")).is_err());
    }

    #[test]
    fn test_lookup_view() {
        let schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(ValueValidator::LengthBetween { min: 1, max: 31 }),
            )
            .with_attribute("order", Attribute::required_int64().with_force_new())
            .with_block(
                "entries",
                NestedBlock::set(Block::new().with_attribute("url", Attribute::required_string()))
                    .with_max_items(10),
            );

        let view = schema.lookup_view(&["id", "name"]);
        assert_eq!(view.block.attributes["id"].flags, AttributeFlags::optional_computed());
        assert_eq!(view.block.attributes["name"].flags, AttributeFlags::optional_computed());
        assert!(view.block.attributes["name"].validators.is_empty());
        assert!(view.block.attributes["order"].flags.is_computed_only());
        assert!(!view.block.attributes["order"].force_new);

        let entries = &view.block.blocks["entries"];
        assert_eq!(entries.nesting_mode, BlockNestingMode::Set);
        assert_eq!(entries.max_items, 0);
        assert!(entries.block.attributes["url"].flags.is_computed_only());
    }

    #[test]
    fn test_schema_serializes_validators() {
        let attr = Attribute::optional_string()
            .with_validator(ValueValidator::one_of(["ALLOW"]));
        let json = serde_json::to_value(&attr).unwrap();
        assert_eq!(json["validators"][0]["kind"], "one_of");
        assert_eq!(json["validators"][0]["values"][0], "ALLOW");

        let bare = serde_json::to_value(Attribute::optional_string()).unwrap();
        assert!(bare.get("validators").is_none());
    }

    #[test]
    fn test_provider_schema() {
        let schema = ProviderSchema::new()
            .with_provider_config(
                Schema::v0().with_attribute("api_key", Attribute::optional_string().sensitive()),
            )
            .with_resource("zia_url_categories", Schema::v0())
            .with_data_source("zia_url_categories", Schema::v0());

        assert!(schema.provider.block.attributes["api_key"].flags.sensitive);
        assert!(schema.resources.contains_key("zia_url_categories"));
        assert!(schema.data_sources.contains_key("zia_url_categories"));
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid rank")
            .with_detail("expected integer between 0 and 7, got 9")
            .with_attribute("rank");

        assert!(err.is_error());
        assert_eq!(err.attribute.as_deref(), Some("rank"));
        assert!(!Diagnostic::warning("deprecated").is_error());
    }
}
