//! Post-mutation activation of staged ZIA configuration.
//!
//! ZIA stages every configuration write until an admin activates it. When the
//! provider is configured with activation enabled, each successful mutating
//! operation is followed by exactly one activation call, after a short delay,
//! and the `/status` endpoint is polled until the change is live.

use std::time::Duration;

use tracing::{debug, info};

use crate::client::{ActivationState, ApiClient};
use crate::error::ProviderError;
use crate::retry::RetryPolicy;

/// Environment variable that enables activation when the provider
/// configuration leaves it unset.
pub const ACTIVATION_ENV: &str = "ZIA_ACTIVATION";

/// Interpret a boolean-like flag (`true`, `1`, `yes`; case-insensitive).
pub fn flag_enabled(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

/// Activation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationSettings {
    /// Whether mutations are followed by activation.
    pub enabled: bool,
    /// Pause between the mutation and the activation call.
    pub delay: Duration,
    /// Pause between status checks while activation settles.
    pub poll_interval: Duration,
    /// Status checks made before giving up on settlement.
    pub max_polls: u32,
}

impl Default for ActivationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            max_polls: 5,
        }
    }
}

impl ActivationSettings {
    /// Default timings with activation switched on.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Set the pre-activation delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Fires activation after mutations.
#[derive(Debug, Clone, Default)]
pub struct ActivationTrigger {
    settings: ActivationSettings,
    retry: RetryPolicy,
}

impl ActivationTrigger {
    /// Create a trigger. `retry` applies to the activation call itself.
    pub fn new(settings: ActivationSettings, retry: RetryPolicy) -> Self {
        Self { settings, retry }
    }

    /// A trigger that never activates.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether mutations are followed by activation.
    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// The configured settings.
    pub fn settings(&self) -> &ActivationSettings {
        &self.settings
    }

    /// Activate after a successful mutation, if enabled.
    ///
    /// `operation` names the mutation for logs and error messages.
    pub async fn after_mutation(
        &self,
        api: &dyn ApiClient,
        operation: &str,
    ) -> Result<(), ProviderError> {
        if !self.settings.enabled {
            info!(
                operation = %operation,
                "Skipping activation, {} is not enabled", ACTIVATION_ENV
            );
            return Ok(());
        }
        self.activate_now(api, operation).await.map(|_| ())
    }

    /// Activate regardless of the enabled flag and wait for settlement.
    pub async fn activate_now(
        &self,
        api: &dyn ApiClient,
        operation: &str,
    ) -> Result<ActivationState, ProviderError> {
        tokio::time::sleep(self.settings.delay).await;

        let state = self
            .retry
            .run("activate", || api.activate())
            .await
            .map_err(|e| ProviderError::Activation(format!("{}: {}", operation, e)))?;
        debug!(operation = %operation, status = %state.status, "Activation requested");

        let state = self.settle(api, state, operation).await?;
        info!(operation = %operation, status = %state.status, "Configuration activated");
        Ok(state)
    }

    async fn settle(
        &self,
        api: &dyn ApiClient,
        mut state: ActivationState,
        operation: &str,
    ) -> Result<ActivationState, ProviderError> {
        let mut polls = 0;
        while !state.is_active() {
            if polls >= self.settings.max_polls {
                return Err(ProviderError::Activation(format!(
                    "{}: status still {} after {} checks",
                    operation, state.status, polls
                )));
            }
            tokio::time::sleep(self.settings.poll_interval).await;
            state = api
                .activation_status()
                .await
                .map_err(|e| ProviderError::Activation(format!("{}: {}", operation, e)))?;
            polls += 1;
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ACTIVATE_PATH, STATUS_PATH};
    use crate::testing::MockApi;
    use serde_json::json;

    #[test]
    fn test_flag_enabled() {
        for raw in ["true", "TRUE", "1", "yes", " Yes "] {
            assert!(flag_enabled(raw), "{raw}");
        }
        for raw in ["false", "0", "no", "", "on"] {
            assert!(!flag_enabled(raw), "{raw}");
        }
    }

    #[tokio::test]
    async fn test_disabled_trigger_makes_no_calls() {
        let api = MockApi::new();
        ActivationTrigger::disabled()
            .after_mutation(&api, "create zia_url_categories")
            .await
            .unwrap();
        assert_eq!(api.activations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enabled_trigger_waits_then_activates_once() {
        let api = MockApi::new();
        let trigger = ActivationTrigger::new(
            ActivationSettings::enabled().with_delay(Duration::from_secs(3)),
            RetryPolicy::none(),
        );

        let started = tokio::time::Instant::now();
        trigger.after_mutation(&api, "update").await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(api.activations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_active() {
        let api = MockApi::new();
        api.set_activation_response(json!({"status": "PENDING"}));
        api.seed(STATUS_PATH, json!({"status": "INPROGRESS"}));

        let trigger = ActivationTrigger::new(ActivationSettings::enabled(), RetryPolicy::none());
        let api_ref = &api;
        let flip = async {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            api_ref.seed(STATUS_PATH, json!({"status": "ACTIVE"}));
        };
        let (result, _) = tokio::join!(trigger.activate_now(&api, "delete"), flip);

        assert!(result.unwrap().is_active());
        assert_eq!(api.activations(), 1);
        assert!(api.calls().iter().filter(|c| c.path == STATUS_PATH).count() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_settling_is_activation_error() {
        let api = MockApi::new();
        api.set_activation_response(json!({"status": "PENDING"}));
        api.seed(STATUS_PATH, json!({"status": "PENDING"}));

        let trigger = ActivationTrigger::new(ActivationSettings::enabled(), RetryPolicy::none());
        let err = trigger.activate_now(&api, "create").await.unwrap_err();

        assert!(matches!(err, ProviderError::Activation(_)));
        assert!(err.message().contains("PENDING"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_call_failure_is_reported_distinctly() {
        let api = MockApi::new();
        api.fail_next(ACTIVATE_PATH, || {
            ProviderError::PermissionDenied("not an admin".to_string())
        });

        let trigger = ActivationTrigger::new(ActivationSettings::enabled(), RetryPolicy::none());
        let err = trigger.after_mutation(&api, "create").await.unwrap_err();

        assert!(matches!(err, ProviderError::Activation(_)));
        assert!(err.message().contains("not an admin"));
    }
}
