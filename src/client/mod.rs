//! The downstream seam: calls into the ZIA REST API.
//!
//! Adapters only see the [`ApiClient`] trait. [`http::ZiaHttpClient`] is the
//! production implementation; `testing::MockApi`, behind the `testing`
//! feature, is the in-memory one used by the test suite.

pub mod http;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ProviderError;

/// Path that commits staged configuration changes.
pub const ACTIVATE_PATH: &str = "/status/activate";

/// Path reporting whether staged changes are pending.
pub const STATUS_PATH: &str = "/status";

/// Outcome of a lookup that may legitimately find nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The object exists.
    Found(T),
    /// The API reports the object does not exist.
    NotFound,
}

impl<T> Lookup<T> {
    /// Convert to an `Option`.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    /// Map the found value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    /// Map the found value through a fallible conversion.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Lookup<U>, E> {
        match self {
            Lookup::Found(value) => f(value).map(Lookup::Found),
            Lookup::NotFound => Ok(Lookup::NotFound),
        }
    }

    /// Turn `NotFound` into a [`ProviderError::NotFound`] describing `what`.
    pub fn require(self, what: impl std::fmt::Display) -> Result<T, ProviderError> {
        match self {
            Lookup::Found(value) => Ok(value),
            Lookup::NotFound => Err(ProviderError::NotFound(what.to_string())),
        }
    }
}

/// Activation state reported by `/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationState {
    /// `ACTIVE` once every staged change is live; `PENDING` or
    /// `INPROGRESS` otherwise.
    pub status: String,
}

impl ActivationState {
    /// Whether all staged changes are live.
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("ACTIVE")
    }
}

/// JSON REST access to the ZIA API.
///
/// Paths are relative to the API base (`/firewallFilteringRules/42`).
#[async_trait]
pub trait ApiClient: Send + Sync + 'static {
    /// GET a JSON document.
    async fn get(&self, path: &str) -> Result<Lookup<Value>, ProviderError>;

    /// POST a JSON body, returning the response document.
    async fn post(&self, path: &str, body: Value) -> Result<Value, ProviderError>;

    /// PUT a JSON body, returning the response document (`Null` when empty).
    async fn put(&self, path: &str, body: Value) -> Result<Value, ProviderError>;

    /// DELETE an object.
    async fn delete(&self, path: &str) -> Result<Lookup<()>, ProviderError>;

    /// Commit staged configuration changes.
    async fn activate(&self) -> Result<ActivationState, ProviderError> {
        let response = self.post(ACTIVATE_PATH, json!({})).await?;
        decode(response, "activation response")
    }

    /// Read the current activation state.
    async fn activation_status(&self) -> Result<ActivationState, ProviderError> {
        let response = self.get(STATUS_PATH).await?.require("activation status")?;
        decode(response, "activation status")
    }

    /// Release any server-side session. Called when the provider stops.
    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Decode an API document into a typed model.
///
/// A shape mismatch means the API and this provider disagree on the contract,
/// so it surfaces as [`ProviderError::Decode`] rather than a defaulted value.
pub fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, ProviderError> {
    serde_json::from_value(value)
        .map_err(|e| ProviderError::Decode(format!("unexpected {} shape: {}", what, e)))
}

/// Encode a typed model as an API request body.
pub fn encode<T: Serialize>(model: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Rule {
        id: i64,
    }

    #[test]
    fn test_lookup_helpers() {
        let found: Lookup<i32> = Lookup::Found(2);
        assert_eq!(found.clone().map(|v| v * 2), Lookup::Found(4));
        assert_eq!(found.clone().found(), Some(2));
        assert_eq!(found.require("x").unwrap(), 2);

        let missing: Lookup<i32> = Lookup::NotFound;
        assert_eq!(missing.clone().found(), None);
        let err = missing.require("firewall rule 9").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.message(), "firewall rule 9");
    }

    #[test]
    fn test_try_map() {
        let found: Lookup<Value> = Lookup::Found(json!({"id": 3}));
        let rule = found.try_map(|v| decode::<Rule>(v, "rule")).unwrap();
        assert!(matches!(rule, Lookup::Found(Rule { id: 3 })));

        let missing: Lookup<Value> = Lookup::NotFound;
        assert!(matches!(
            missing.try_map(|v| decode::<Rule>(v, "rule")),
            Ok(Lookup::NotFound)
        ));
    }

    #[test]
    fn test_decode_failure_is_fatal() {
        let err = decode::<Rule>(json!({"id": "not-a-number"}), "firewall rule").unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
        assert!(!err.is_retryable());
        assert!(err.message().contains("firewall rule"));
    }

    #[test]
    fn test_activation_state() {
        let state: ActivationState = decode(json!({"status": "active"}), "status").unwrap();
        assert!(state.is_active());
        let state: ActivationState = decode(json!({"status": "PENDING"}), "status").unwrap();
        assert!(!state.is_active());
    }
}
