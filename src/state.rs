//! Typed access to resource state documents.

use serde_json::{Map, Value};

use crate::error::ProviderError;

/// Read-only view over a state or configuration object.
///
/// Missing attributes, nulls and empty strings all read as absent, which is
/// how the runtime represents unset optional attributes.
#[derive(Debug, Clone, Copy)]
pub struct StateReader<'a> {
    fields: Option<&'a Map<String, Value>>,
}

impl<'a> StateReader<'a> {
    /// Wrap a state document. Non-object documents read as empty.
    pub fn new(state: &'a Value) -> Self {
        Self {
            fields: state.as_object(),
        }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.fields?.get(name).filter(|v| !v.is_null())
    }

    /// A string attribute; empty strings read as `None`.
    pub fn string(&self, name: &str) -> Option<String> {
        self.get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// A string attribute that must be present.
    pub fn require_string(&self, name: &str) -> Result<String, ProviderError> {
        self.string(name)
            .ok_or_else(|| ProviderError::Validation(format!("{} is required", name)))
    }

    /// An integer attribute. Integral floats are accepted.
    pub fn int(&self, name: &str) -> Option<i64> {
        let value = self.get(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
    }

    /// A float attribute.
    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// A boolean attribute.
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// A list or set of strings. Empty elements are skipped.
    pub fn strings(&self, name: &str) -> Vec<String> {
        self.array(name)
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// A list or set of ids. Ids may arrive as numbers or numeric strings;
    /// zeros are skipped.
    pub fn ids(&self, name: &str) -> Vec<i64> {
        self.array(name)
            .iter()
            .filter_map(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .filter(|id| *id != 0)
            .collect()
    }

    /// Nested block elements.
    pub fn blocks(&self, name: &str) -> Vec<StateReader<'a>> {
        self.array(name).iter().map(StateReader::new).collect()
    }

    fn array(&self, name: &str) -> &'a [Value] {
        self.get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Set `name` in `state`, creating the object if needed.
pub fn set_attribute(state: &mut Value, name: &str, value: Value) {
    if !state.is_object() {
        *state = Value::Object(Map::new());
    }
    if let Value::Object(fields) = state {
        fields.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        let state = json!({
            "name": "Block social",
            "description": "",
            "order": 3,
            "rank": 7.0,
            "latitude": 37.4,
            "enable_full_logging": true,
            "comment": null
        });
        let r = StateReader::new(&state);
        assert_eq!(r.string("name").as_deref(), Some("Block social"));
        assert_eq!(r.string("description"), None);
        assert_eq!(r.string("comment"), None);
        assert_eq!(r.int("order"), Some(3));
        assert_eq!(r.int("rank"), Some(7));
        assert_eq!(r.float("latitude"), Some(37.4));
        assert_eq!(r.bool("enable_full_logging"), Some(true));
        assert_eq!(r.bool("missing"), None);
        assert!(r.require_string("missing").is_err());
    }

    #[test]
    fn test_collections() {
        let state = json!({
            "urls": ["a.com", "", "b.com"],
            "locations": [12, "40", 0],
            "md5_hash_value_list": [{"url": "x"}, {"url": "y"}]
        });
        let r = StateReader::new(&state);
        assert_eq!(r.strings("urls"), vec!["a.com", "b.com"]);
        assert_eq!(r.ids("locations"), vec![12, 40]);
        let blocks = r.blocks("md5_hash_value_list");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].string("url").as_deref(), Some("y"));
        assert!(r.strings("keywords").is_empty());
    }

    #[test]
    fn test_non_object_reads_empty() {
        let state = Value::Null;
        let r = StateReader::new(&state);
        assert_eq!(r.string("id"), None);
        assert!(r.blocks("anything").is_empty());
    }

    #[test]
    fn test_set_attribute() {
        let mut state = Value::Null;
        set_attribute(&mut state, "id", json!("7"));
        assert_eq!(state, json!({"id": "7"}));
    }
}
