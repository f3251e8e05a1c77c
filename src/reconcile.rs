//! Order-independent comparison of set-valued attributes.
//!
//! The runtime and the ZIA API both treat nested blocks and string lists as
//! unordered, but neither agrees on ordering, and the runtime may hand us
//! placeholder entries whose every field is empty. Comparing the two sides
//! therefore goes through four steps:
//!
//! 1. drop placeholder entries ([`effective`]),
//! 2. de-duplicate by the MD5 of each entry's composite key ([`set_hash`]),
//! 3. reject on cardinality mismatch,
//! 4. sort both sides by composite key and compare entry by entry.
//!
//! An entry with a populated key field and empty secondary fields is *not* a
//! placeholder and is retained.

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Separator placed between fields of a composite key. It cannot appear in
/// any value ZIA accepts.
pub const KEY_SEPARATOR: char = '\u{1f}';

/// An element of a set-valued attribute.
pub trait SetEntry: PartialEq {
    /// Whether every field holds its zero value.
    fn is_placeholder(&self) -> bool;

    /// A stable key built from the entry's fields; equal entries have equal
    /// keys.
    fn composite_key(&self) -> String;
}

/// Join key fields with [`KEY_SEPARATOR`].
pub fn join_key<S: AsRef<str>>(fields: &[S]) -> String {
    let mut key = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(field.as_ref());
    }
    key
}

/// Set-membership hash: hex MD5 of the composite key.
pub fn set_hash<E: SetEntry>(entry: &E) -> String {
    format!("{:x}", md5::compute(entry.composite_key()))
}

/// Entries that are not placeholders, in their original order.
pub fn effective<E: SetEntry + Clone>(entries: &[E]) -> Vec<E> {
    entries
        .iter()
        .filter(|entry| !entry.is_placeholder())
        .cloned()
        .collect()
}

/// Effective entries, de-duplicated and sorted by composite key.
pub fn normalize<E: SetEntry + Clone>(entries: &[E]) -> Vec<E> {
    let mut seen = HashSet::new();
    let mut keyed: Vec<(String, E)> = effective(entries)
        .into_iter()
        .filter(|entry| seen.insert(set_hash(entry)))
        .map(|entry| (entry.composite_key(), entry))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, entry)| entry).collect()
}

/// Whether two sets hold the same effective entries, ignoring order,
/// duplicates and placeholders.
pub fn sets_equal<E: SetEntry + Clone>(desired: &[E], remote: &[E]) -> bool {
    let desired = normalize(desired);
    let remote = normalize(remote);
    desired.len() == remote.len() && desired.iter().zip(&remote).all(|(d, r)| d == r)
}

impl SetEntry for String {
    fn is_placeholder(&self) -> bool {
        self.is_empty()
    }

    fn composite_key(&self) -> String {
        self.clone()
    }
}

impl SetEntry for i64 {
    fn is_placeholder(&self) -> bool {
        *self == 0
    }

    fn composite_key(&self) -> String {
        // Zero-padded so lexical order matches numeric order for ids.
        format!("{:020}", self)
    }
}

/// Whether a JSON value is the zero value of its type.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.values().all(is_zero),
    }
}

/// An untyped set element, used when diffing state documents.
///
/// Object entries drop zero-valued fields on construction, so `{"a": "x",
/// "b": ""}` and `{"a": "x"}` are the same entry.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonEntry(Value);

impl JsonEntry {
    /// Wrap a JSON element.
    pub fn new(value: &Value) -> Self {
        Self(strip_zero_fields(value))
    }

    /// The normalized value.
    pub fn value(&self) -> &Value {
        &self.0
    }
}

fn strip_zero_fields(value: &Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(_, v)| !is_zero(v))
                .map(|(k, v)| (k.clone(), strip_zero_fields(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

impl SetEntry for JsonEntry {
    fn is_placeholder(&self) -> bool {
        is_zero(&self.0)
    }

    fn composite_key(&self) -> String {
        match &self.0 {
            Value::Object(fields) => {
                let mut names: Vec<&String> = fields.keys().collect();
                names.sort();
                join_key(
                    &names
                        .into_iter()
                        .map(|name| format!("{}={}", name, fields[name]))
                        .collect::<Vec<_>>(),
                )
            },
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Compare two JSON set values. Anything other than an array counts as an
/// empty set.
pub fn json_sets_equal(desired: &Value, remote: &Value) -> bool {
    sets_equal(&json_entries(desired), &json_entries(remote))
}

fn json_entries(value: &Value) -> Vec<JsonEntry> {
    value
        .as_array()
        .map(|items| items.iter().map(JsonEntry::new).collect())
        .unwrap_or_default()
}
