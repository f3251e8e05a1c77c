//! Configuration validation against a [`Schema`].
//!
//! Validation walks the configuration alongside the schema and collects
//! [`Diagnostic`]s tagged with dotted attribute paths (`rules.0.url`).
//! Besides presence and type checks it applies each attribute's
//! [`ValueValidator`](crate::schema::ValueValidator)s, element-wise for lists
//! and sets. Set entries whose fields are all empty are placeholders: they
//! carry no meaning, so they are neither checked nor counted.
//!
//! # Example
//!
//! ```
//! use zia_provider::schema::{Attribute, Schema, ValueValidator};
//! use zia_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute(
//!         "state",
//!         Attribute::optional_string().with_validator(ValueValidator::one_of(["ENABLED", "DISABLED"])),
//!     );
//!
//! assert!(validate(&schema, &json!({"name": "allow-dns", "state": "ENABLED"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "allow-dns", "state": "ON"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("state"));
//! ```

use crate::reconcile::is_zero;
use crate::schema::{Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema};
use serde_json::{Map, Value};

/// Validate a configuration value, returning every problem found.
///
/// - Required attributes must be present and non-null.
/// - Computed-only attributes are skipped.
/// - Types must match; `Int64` accepts integral floats.
/// - Value validators run on present values.
/// - Nested blocks are checked recursively against their item bounds.
/// - All-empty entries of set blocks are skipped.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut walker = Walker::default();
    walker.block(&schema.block, value, "");
    walker.diagnostics
}

/// Like [`validate`], but as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether the value passes validation.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

#[derive(Default)]
struct Walker {
    diagnostics: Vec<Diagnostic>,
}

impl Walker {
    fn block(&mut self, block: &Block, value: &Value, path: &str) {
        let obj = match value {
            Value::Object(map) => map,
            Value::Null => return,
            other => {
                let mut diag = Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", type_name(other)));
                if !path.is_empty() {
                    diag = diag.with_attribute(path);
                }
                self.diagnostics.push(diag);
                return;
            },
        };

        for (name, attr) in &block.attributes {
            self.attribute(attr, obj.get(name), &join(path, name));
        }
        for (name, nested) in &block.blocks {
            self.nested(nested, obj.get(name), &join(path, name));
        }
    }

    fn attribute(&mut self, attr: &Attribute, value: Option<&Value>, path: &str) {
        if attr.flags.is_computed_only() {
            return;
        }

        let Some(value) = value.filter(|v| !v.is_null()) else {
            if attr.flags.required {
                self.diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
            return;
        };

        if self.value_type(&attr.attr_type, value, path) && !attr.validators.is_empty() {
            self.constraints(attr, value, path);
        }
    }

    fn constraints(&mut self, attr: &Attribute, value: &Value, path: &str) {
        let elements: Vec<(String, &Value)> = match (&attr.attr_type, value) {
            (AttributeType::List(_) | AttributeType::Set(_), Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (format!("{}.{}", path, i), item))
                .collect(),
            _ => vec![(path.to_string(), value)],
        };

        for (elem_path, elem) in elements {
            for validator in &attr.validators {
                if let Err(detail) = validator.check(elem) {
                    self.diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", elem_path))
                            .with_detail(detail)
                            .with_attribute(elem_path.clone()),
                    );
                }
            }
        }
    }

    /// Returns whether the value (and all its elements) had the right type.
    fn value_type(&mut self, expected: &AttributeType, value: &Value, path: &str) -> bool {
        let before = self.diagnostics.len();
        match expected {
            AttributeType::String => self.expect(value.is_string(), path, "string", value),
            AttributeType::Int64 => self.expect(is_int64(value), path, "int64", value),
            AttributeType::Float64 => self.expect(value.is_number(), path, "float64", value),
            AttributeType::Bool => self.expect(value.is_boolean(), path, "bool", value),
            AttributeType::List(elem) | AttributeType::Set(elem) => match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.value_type(elem, item, &format!("{}.{}", path, i));
                    }
                },
                None => {
                    let kind = if matches!(expected, AttributeType::Set(_)) {
                        "set"
                    } else {
                        "list"
                    };
                    self.expect(false, path, kind, value);
                },
            },
            AttributeType::Map(elem) => match value.as_object() {
                Some(obj) => {
                    for (key, item) in obj {
                        self.value_type(elem, item, &format!("{}.{}", path, key));
                    }
                },
                None => self.expect(false, path, "map", value),
            },
            AttributeType::Object(fields) => match value.as_object() {
                Some(obj) => {
                    for (name, field_type) in fields {
                        if let Some(item) = obj.get(name) {
                            self.value_type(field_type, item, &join(path, name));
                        }
                    }
                },
                None => self.expect(false, path, "object", value),
            },
            AttributeType::Dynamic => {},
        }
        self.diagnostics.len() == before
    }

    fn expect(&mut self, ok: bool, path: &str, expected: &str, got: &Value) {
        if !ok {
            self.diagnostics.push(
                Diagnostic::error(format!("Invalid type for attribute '{}'", path))
                    .with_detail(format!("Expected {}, got {}", expected, type_name(got)))
                    .with_attribute(path),
            );
        }
    }

    fn nested(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &str) {
        let value = value.filter(|v| !v.is_null());
        match (nested.nesting_mode, value) {
            (BlockNestingMode::Single, None) => {
                if nested.min_items > 0 {
                    self.diagnostics.push(
                        Diagnostic::error(format!("Missing required block '{}'", path))
                            .with_detail("At least one block is required")
                            .with_attribute(path),
                    );
                }
            },
            (BlockNestingMode::Single, Some(v)) => self.block(&nested.block, v, path),
            (_, None) => self.bounds(nested, 0, path),
            (BlockNestingMode::Set, Some(Value::Array(items))) => {
                let entries: Vec<(usize, &Value)> = items
                    .iter()
                    .enumerate()
                    .filter(|(_, item)| !is_zero(item))
                    .collect();
                self.bounds(nested, entries.len(), path);
                for (i, item) in entries {
                    self.block(&nested.block, item, &format!("{}.{}", path, i));
                }
            },
            (BlockNestingMode::List, Some(Value::Array(items))) => {
                self.bounds(nested, items.len(), path);
                for (i, item) in items.iter().enumerate() {
                    self.block(&nested.block, item, &format!("{}.{}", path, i));
                }
            },
            (BlockNestingMode::Map, Some(Value::Object(items))) => {
                self.bounds(nested, items.len(), path);
                self.keyed_blocks(&nested.block, items, path);
            },
            (mode, Some(other)) => {
                let expected = if mode == BlockNestingMode::Map { "map" } else { "list" };
                self.diagnostics.push(
                    Diagnostic::error(format!("Expected {} for block '{}'", expected, path))
                        .with_detail(format!("Got {}", type_name(other)))
                        .with_attribute(path),
                );
            },
        }
    }

    fn keyed_blocks(&mut self, block: &Block, items: &Map<String, Value>, path: &str) {
        for (key, item) in items {
            self.block(block, item, &format!("{}.{}", path, key));
        }
    }

    fn bounds(&mut self, nested: &NestedBlock, len: usize, path: &str) {
        let len = len as u32;
        if len < nested.min_items {
            self.diagnostics.push(
                Diagnostic::error(format!(
                    "Block '{}' requires at least {} item(s), got {}",
                    path, nested.min_items, len
                ))
                .with_attribute(path),
            );
        }
        if nested.max_items > 0 && len > nested.max_items {
            self.diagnostics.push(
                Diagnostic::error(format!(
                    "Block '{}' allows at most {} item(s), got {}",
                    path, nested.max_items, len
                ))
                .with_attribute(path),
            );
        }
    }
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() => true,
        Value::Number(n) => n
            .as_f64()
            .map(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, ValueValidator};
    use serde_json::json;

    fn rule_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "rank",
                Attribute::optional_int64().with_validator(ValueValidator::IntBetween { min: 0, max: 7 }),
            )
            .with_attribute(
                "action",
                Attribute::optional_string()
                    .with_validator(ValueValidator::one_of(["ALLOW", "BLOCK_DROP"])),
            )
            .with_attribute(
                "src_ips",
                Attribute::optional_string_set().with_validator(ValueValidator::IpAddress),
            )
    }

    #[test]
    fn test_required_and_types() {
        let schema = rule_schema();

        assert!(validate(&schema, &json!({"name": "r1"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 5}));
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_computed_attribute_skipped() {
        let schema = rule_schema();
        assert!(validate(&schema, &json!({"name": "r1", "id": 12345})).is_empty());
    }

    #[test]
    fn test_validators_run_on_present_values() {
        let schema = rule_schema();

        let diagnostics = validate(&schema, &json!({"name": "r1", "rank": 9}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("rank"));
        assert!(diagnostics[0].summary.contains("Invalid value"));

        let diagnostics = validate(&schema, &json!({"name": "r1", "action": "DENY"}));
        assert_eq!(diagnostics.len(), 1);

        // Absent optional attributes are not validated.
        assert!(validate(&schema, &json!({"name": "r1", "action": null})).is_empty());
    }

    #[test]
    fn test_validators_skip_mistyped_values() {
        let schema = rule_schema();
        let diagnostics = validate(&schema, &json!({"name": "r1", "rank": "high"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validators_apply_element_wise() {
        let schema = rule_schema();
        let diagnostics = validate(
            &schema,
            &json!({"name": "r1", "src_ips": ["10.0.0.1", "not-an-ip", "10.0.0.3"]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("src_ips.1"));
    }

    #[test]
    fn test_int64_accepts_integral_floats() {
        let schema = Schema::v0().with_attribute("order", Attribute::required_int64());
        assert!(validate(&schema, &json!({"order": 3})).is_empty());
        assert!(validate(&schema, &json!({"order": 3.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"order": 3.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"order": "3"})).len(), 1);
    }

    #[test]
    fn test_set_block_bounds_and_nested_validators() {
        let schema = Schema::v0().with_block(
            "md5_hash_value_list",
            NestedBlock::set(
                Block::new()
                    .with_attribute(
                        "url",
                        Attribute::optional_string().with_validator(ValueValidator::Md5Hex),
                    )
                    .with_attribute("type", Attribute::optional_string()),
            )
            .with_max_items(2),
        );

        let ok = json!({"md5_hash_value_list": [
            {"url": "d41d8cd98f00b204e9800998ecf8427e", "type": "CUSTOM_FILEHASH_DENY"}
        ]});
        assert!(validate(&schema, &ok).is_empty());

        let bad = json!({"md5_hash_value_list": [{"url": "nope"}]});
        let diagnostics = validate(&schema, &bad);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("md5_hash_value_list.0.url")
        );

        let too_many = json!({"md5_hash_value_list": [
            {"type": "a"},
            {"type": "b"},
            {"type": "c"},
            {}
        ]});
        let diagnostics = validate(&schema, &too_many);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 2"));

        let not_a_list = json!({"md5_hash_value_list": "x"});
        assert!(validate(&schema, &not_a_list)[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_set_block_skips_placeholder_entries() {
        let entry = Block::new()
            .with_attribute(
                "url",
                Attribute::required_string().with_validator(ValueValidator::Md5Hex),
            )
            .with_attribute("url_comment", Attribute::optional_string())
            .with_attribute(
                "type",
                Attribute::required_string().with_validator(ValueValidator::one_of(["ALLOW", "DENY"])),
            );
        let schema = Schema::v0().with_block("hashes", NestedBlock::set(entry).with_max_items(1));

        let value = json!({"hashes": [
            {"url": "0cc175b9c0f1b6a831c399e269772661", "type": "DENY"},
            {"url": "", "url_comment": "", "type": ""},
            {}
        ]});
        assert!(validate(&schema, &value).is_empty());

        // A partially filled entry is a real entry.
        let value = json!({"hashes": [{"url": "", "url_comment": "note", "type": ""}]});
        let diagnostics = validate(&schema, &value);
        let mut attributes: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        attributes.sort_unstable();
        assert_eq!(attributes, vec!["hashes.0.type", "hashes.0.url"]);
    }

    #[test]
    fn test_single_and_map_blocks() {
        let schema = Schema::v0()
            .with_block(
                "geo",
                NestedBlock::single(Block::new().with_attribute("latitude", Attribute::optional_float64()))
                    .with_min_items(1),
            )
            .with_block(
                "labels",
                NestedBlock::map(Block::new().with_attribute("value", Attribute::required_string())),
            );

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Missing required block"));

        let diagnostics = validate(
            &schema,
            &json!({"geo": {"latitude": 1.5}, "labels": {"env": {"value": 3}}}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("labels.env.value"));
    }

    #[test]
    fn test_object_and_dynamic_types() {
        let fields = [("lat".to_string(), AttributeType::Float64)].into_iter().collect();
        let schema = Schema::v0()
            .with_attribute(
                "point",
                Attribute::new(AttributeType::Object(fields), AttributeFlags::required()),
            )
            .with_attribute(
                "raw",
                Attribute::new(AttributeType::Dynamic, AttributeFlags::optional()),
            );

        assert!(validate(&schema, &json!({"point": {"lat": 1.0}, "raw": [1, "a"]})).is_empty());
        let diagnostics = validate(&schema, &json!({"point": {"lat": "north"}}));
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("point.lat"));
    }

    #[test]
    fn test_helpers_and_root_shape() {
        let schema = rule_schema();
        assert!(is_valid(&schema, &json!({"name": "r1"})));
        assert!(!is_valid(&schema, &json!({})));
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);

        let diagnostics = validate(&schema, &json!("not an object"));
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert!(diagnostics[0].attribute.is_none());
    }
}
