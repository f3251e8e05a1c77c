//! Provider configuration: attributes, environment fallbacks and resolution
//! into the settings the API client and adapters run with.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::activation::{flag_enabled, ActivationSettings, ACTIVATION_ENV};
use crate::retry::RetryPolicy;
use crate::schema::{Attribute, Diagnostic, Schema, ValueValidator};

/// Cloud names accepted by `zia_cloud`.
pub const ZIA_CLOUDS: &[&str] = &[
    "zscaler",
    "zscalerone",
    "zscalertwo",
    "zscalerthree",
    "zscloud",
    "zscalerbeta",
    "zscalergov",
    "zscalerten",
    "zspreview",
];

/// Minimum length of a ZIA API key.
pub const MIN_API_KEY_LEN: usize = 12;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// API base URL for a cloud name, or `None` if the cloud is unknown.
pub fn cloud_base_url(cloud: &str) -> Option<String> {
    let cloud = cloud.trim().to_ascii_lowercase();
    ZIA_CLOUDS
        .contains(&cloud.as_str())
        .then(|| format!("https://zsapi.{}.net/api/v1", cloud))
}

/// Admin credentials used to open an API session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Admin login.
    pub username: String,
    /// Admin password.
    pub password: String,
    /// Raw (unobfuscated) API key.
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Provider configuration as written by the user. Every field may be left
/// out in favor of its environment variable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct ProviderConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub zia_cloud: Option<String>,
    pub base_url: Option<String>,
    pub activation: Option<bool>,
    pub activation_delay_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub request_timeout_seconds: Option<u64>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    /// Session credentials.
    pub credentials: Credentials,
    /// API base URL, without a trailing slash.
    pub base_url: String,
    /// Post-mutation activation.
    pub activation: ActivationSettings,
    /// Retry policy for API calls.
    pub retry: RetryPolicy,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl ProviderConfig {
    /// Decode the configuration document sent by the runtime. `Null` means
    /// nothing was configured.
    pub fn from_value(value: &Value) -> Result<Self, Vec<Diagnostic>> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).map_err(|e| {
            vec![Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())]
        })
    }

    /// Resolve against the process environment.
    pub fn resolve_from_env(self) -> Result<ProviderSettings, Vec<Diagnostic>> {
        self.resolve(|name| std::env::var(name).ok())
    }

    /// Resolve, taking unset attributes from `env`.
    ///
    /// All problems are collected so the user sees them in one pass.
    pub fn resolve<F>(self, env: F) -> Result<ProviderSettings, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let mut required = |value: Option<String>, attribute: &str, var: &str| {
            value.or_else(|| env(var)).unwrap_or_else(|| {
                problems.push(
                    Diagnostic::error(format!("Missing required attribute {}", attribute))
                        .with_detail(format!("Set `{}` or the {} environment variable", attribute, var))
                        .with_attribute(attribute),
                );
                String::new()
            })
        };
        let username = required(self.username, "username", "ZIA_USERNAME");
        let password = required(self.password, "password", "ZIA_PASSWORD");
        let api_key = required(self.api_key, "api_key", "ZIA_API_KEY");

        if !api_key.is_empty() && api_key.chars().count() < MIN_API_KEY_LEN {
            problems.push(
                Diagnostic::error("Invalid api_key")
                    .with_detail(format!("API keys are at least {} characters", MIN_API_KEY_LEN))
                    .with_attribute("api_key"),
            );
        }

        let base_url = match self.base_url.or_else(|| env("ZIA_BASE_URL")) {
            Some(url) => url,
            None => match self.zia_cloud.or_else(|| env("ZIA_CLOUD")) {
                Some(cloud) => cloud_base_url(&cloud).unwrap_or_else(|| {
                    problems.push(
                        Diagnostic::error(format!("Unknown zia_cloud {:?}", cloud))
                            .with_detail(format!("Expected one of {}", ZIA_CLOUDS.join(", ")))
                            .with_attribute("zia_cloud"),
                    );
                    String::new()
                }),
                None => {
                    problems.push(
                        Diagnostic::error("Missing required attribute zia_cloud")
                            .with_detail("Set `zia_cloud`, `base_url`, or the ZIA_CLOUD environment variable")
                            .with_attribute("zia_cloud"),
                    );
                    String::new()
                },
            },
        };

        let enabled = self
            .activation
            .unwrap_or_else(|| env(ACTIVATION_ENV).map(|v| flag_enabled(&v)).unwrap_or(false));
        let delay = number(
            self.activation_delay_seconds,
            env("ZIA_ACTIVATION_DELAY"),
            "activation_delay_seconds",
            &mut problems,
        )
        .unwrap_or(ActivationSettings::default().delay.as_secs());
        let max_retries = number(
            self.max_retries,
            env("ZIA_MAX_RETRIES"),
            "max_retries",
            &mut problems,
        )
        .unwrap_or(RetryPolicy::default().max_attempts);
        let timeout = number(
            self.request_timeout_seconds,
            env("ZIA_REQUEST_TIMEOUT"),
            "request_timeout_seconds",
            &mut problems,
        )
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

        if !problems.is_empty() {
            return Err(problems);
        }

        Ok(ProviderSettings {
            credentials: Credentials {
                username,
                password,
                api_key,
            },
            base_url,
            activation: ActivationSettings {
                enabled,
                delay: Duration::from_secs(delay),
                ..ActivationSettings::default()
            },
            retry: RetryPolicy {
                max_attempts: max_retries,
                ..RetryPolicy::default()
            },
            request_timeout: Duration::from_secs(timeout),
        })
    }
}

fn number<T: std::str::FromStr>(
    configured: Option<T>,
    from_env: Option<String>,
    attribute: &str,
    problems: &mut Vec<Diagnostic>,
) -> Option<T> {
    if configured.is_some() {
        return configured;
    }
    let raw = from_env?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            problems.push(
                Diagnostic::error(format!("Invalid {}", attribute))
                    .with_detail(format!("{:?} is not a non-negative integer", raw))
                    .with_attribute(attribute),
            );
            None
        },
    }
}

/// Schema of the provider configuration block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Zscaler Internet Access")
        .with_attribute(
            "username",
            Attribute::optional_string().with_description("Admin username. Env: ZIA_USERNAME"),
        )
        .with_attribute(
            "password",
            Attribute::optional_string()
                .sensitive()
                .with_description("Admin password. Env: ZIA_PASSWORD"),
        )
        .with_attribute(
            "api_key",
            Attribute::optional_string()
                .sensitive()
                .with_validator(ValueValidator::LengthBetween {
                    min: MIN_API_KEY_LEN,
                    max: 128,
                })
                .with_description("API key. Env: ZIA_API_KEY"),
        )
        .with_attribute(
            "zia_cloud",
            Attribute::optional_string()
                .with_validator(ValueValidator::one_of(ZIA_CLOUDS.iter().copied()))
                .with_description("Cloud the tenant lives on. Env: ZIA_CLOUD"),
        )
        .with_attribute(
            "base_url",
            Attribute::optional_string().with_description("Overrides the cloud URL. Env: ZIA_BASE_URL"),
        )
        .with_attribute(
            "activation",
            Attribute::optional_bool()
                .with_description("Activate after every change. Env: ZIA_ACTIVATION"),
        )
        .with_attribute(
            "activation_delay_seconds",
            Attribute::optional_int64()
                .with_validator(ValueValidator::IntBetween { min: 0, max: 600 })
                .with_description("Wait before activating. Env: ZIA_ACTIVATION_DELAY"),
        )
        .with_attribute(
            "max_retries",
            Attribute::optional_int64()
                .with_validator(ValueValidator::IntBetween { min: 1, max: 20 })
                .with_description("Attempts per API call. Env: ZIA_MAX_RETRIES"),
        )
        .with_attribute(
            "request_timeout_seconds",
            Attribute::optional_int64()
                .with_validator(ValueValidator::IntBetween { min: 1, max: 3600 })
                .with_description("HTTP timeout. Env: ZIA_REQUEST_TIMEOUT"),
        )
}
