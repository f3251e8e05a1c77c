//! Plan, import and metadata types exchanged with the runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generated;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute path.
    pub path: String,
    /// Value before the change (None when added).
    pub before: Option<Value>,
    /// Value after the change (None when removed).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// An attribute that gains a value.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: None,
            after: Some(value),
        }
    }

    /// An attribute that loses its value.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(value),
            after: None,
        }
    }

    /// An attribute whose value changes.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: Some(after),
        }
    }
}

impl From<generated::AttributeChange> for AttributeChange {
    fn from(proto: generated::AttributeChange) -> Self {
        Self {
            path: proto.path,
            before: decode_optional(&proto.before),
            after: decode_optional(&proto.after),
        }
    }
}

impl From<AttributeChange> for generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: change.before.as_ref().map(encode).unwrap_or_default(),
            after: change.after.as_ref().map(encode).unwrap_or_default(),
        }
    }
}

fn decode_optional(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

fn encode(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

/// The result of planning a resource change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The state expected after apply.
    pub planned_state: Value,
    /// Attribute-level changes; empty means nothing to apply.
    pub changes: Vec<AttributeChange>,
    /// Whether applying requires destroying and recreating the object.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan with nothing to do.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether the plan has anything to apply.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// An object brought under management by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Resource type name.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create an imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata returned by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether destroy plans are routed through the provider.
    pub plan_destroy: bool,
}

/// Plugin protocol version advertised in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// First field of the handshake line.
pub const HANDSHAKE_PREFIX: &str = "ZIA_PROVIDER";
