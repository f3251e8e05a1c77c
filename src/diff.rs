//! Plan computation: attribute-level changes between prior and proposed
//! state.
//!
//! Set-valued attributes and set-nested blocks are compared with
//! [`crate::reconcile`], so reordering or placeholder entries never show up as
//! a change. When a set is unchanged the prior value is carried into the
//! planned state, keeping the API's ordering stable across refreshes.

use serde_json::{Map, Value};

use crate::reconcile::{is_zero, json_sets_equal};
use crate::schema::{Attribute, BlockNestingMode, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan a change to one resource.
///
/// `prior` is `None` for a create; a `Null` `proposed` is a destroy.
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());

    let Some(prior) = prior else {
        let changes = sorted_fields(proposed)
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| AttributeChange::added(name, value.clone()))
            .collect();
        return PlanResult::with_changes(proposed.clone(), changes, false);
    };

    if proposed.is_null() {
        let changes = sorted_fields(prior)
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| AttributeChange::removed(name, value.clone()))
            .collect();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let empty = Map::new();
    let prior_fields = prior.as_object().unwrap_or(&empty);
    let mut planned = proposed.as_object().cloned().unwrap_or_default();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    let mut names: Vec<&String> = schema.block.attributes.keys().collect();
    names.sort();
    for name in names {
        let attr = &schema.block.attributes[name];
        let before = prior_fields.get(name).cloned().unwrap_or(Value::Null);

        if keeps_prior(attr, planned.get(name)) {
            planned.insert(name.clone(), before);
            continue;
        }

        let after = planned.get(name).cloned().unwrap_or(Value::Null);
        let unchanged = if attr.is_set() {
            json_sets_equal(&before, &after)
        } else {
            values_equal(&before, &after)
        };
        if unchanged {
            if !before.is_null() {
                planned.insert(name.clone(), before);
            }
            continue;
        }

        requires_replace |= attr.force_new;
        changes.push(change(name, before, after));
    }

    let mut blocks: Vec<&String> = schema.block.blocks.keys().collect();
    blocks.sort();
    for name in blocks {
        let nested = &schema.block.blocks[name];
        let before = prior_fields.get(name).cloned().unwrap_or(Value::Null);
        let after = planned.get(name).cloned().unwrap_or(Value::Null);
        let unchanged = match nested.nesting_mode {
            BlockNestingMode::Set => json_sets_equal(&before, &after),
            _ => values_equal(&before, &after),
        };
        if unchanged {
            if !before.is_null() {
                planned.insert(name.clone(), before);
            }
        } else {
            changes.push(change(name, before, after));
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

/// Whether the planned value of `attr` is taken from prior state.
fn keeps_prior(attr: &Attribute, proposed: Option<&Value>) -> bool {
    if attr.flags.is_computed_only() {
        return true;
    }
    attr.flags.optional && attr.flags.computed && proposed.map_or(true, Value::is_null)
}

fn change(name: &str, before: Value, after: Value) -> AttributeChange {
    if is_zero(&before) {
        AttributeChange::added(name, after)
    } else if is_zero(&after) {
        AttributeChange::removed(name, before)
    } else {
        AttributeChange::modified(name, before, after)
    }
}

/// Equality where unset and zero values match, and numbers compare by value.
fn values_equal(a: &Value, b: &Value) -> bool {
    if is_zero(a) && is_zero(b) {
        return true;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        },
        (Value::Object(x), Value::Object(y)) => x
            .keys()
            .chain(y.keys())
            .all(|k| values_equal(x.get(k).unwrap_or(&Value::Null), y.get(k).unwrap_or(&Value::Null))),
        _ => a == b,
    }
}

fn sorted_fields(value: &Value) -> Vec<(&String, &Value)> {
    let mut fields: Vec<_> = value
        .as_object()
        .map(|fields| fields.iter().collect())
        .unwrap_or_default();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    fields
}
