//! HTTP implementation of [`ApiClient`] for the ZIA cloud.
//!
//! Authentication uses the ZIA session flow: a `POST /authenticatedSession`
//! carrying the obfuscated API key sets a `JSESSIONID` cookie, which the
//! cookie store replays on every later call. Sessions are established lazily,
//! reused, and re-established after [`SESSION_TTL`] or when the API answers
//! 401.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ApiClient, Lookup};
use crate::config::Credentials;
use crate::error::ProviderError;

/// Session establishment endpoint.
pub const SESSION_PATH: &str = "/authenticatedSession";

/// How long a session is reused before re-authenticating. ZIA expires idle
/// sessions after 30 minutes.
pub const SESSION_TTL: Duration = Duration::from_secs(25 * 60);

/// Error code ZIA returns while another admin session holds the edit lock.
const EDIT_LOCK_CODE: &str = "EDIT_LOCK_NOT_AVAILABLE";

/// ZIA API client over `reqwest`.
pub struct ZiaHttpClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    session: Mutex<Option<Instant>>,
}

impl ZiaHttpClient {
    /// Build a client for `base_url` (e.g. `https://zsapi.zscalertwo.net/api/v1`).
    ///
    /// No network traffic happens until the first call.
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .user_agent(concat!("zia-provider/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            session: Mutex::new(None),
        })
    }

    /// The API base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn ensure_session(&self) -> Result<(), ProviderError> {
        let mut session = self.session.lock().await;
        if matches!(*session, Some(started) if started.elapsed() < SESSION_TTL) {
            return Ok(());
        }
        self.authenticate().await?;
        *session = Some(Instant::now());
        Ok(())
    }

    async fn authenticate(&self) -> Result<(), ProviderError> {
        let timestamp = now_millis();
        let body = json!({
            "apiKey": obfuscate_api_key(&self.credentials.api_key, timestamp)?,
            "username": self.credentials.username,
            "password": self.credentials.password,
            "timestamp": timestamp.to_string(),
        });

        debug!(base_url = %self.base_url, username = %self.credentials.username, "Authenticating ZIA session");
        let response = self
            .http
            .post(self.url(SESSION_PATH))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text).context("authenticate"));
        }

        info!(base_url = %self.base_url, "ZIA session established");
        Ok(())
    }

    /// Send a request. `Ok(None)` means the API answered 404.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ProviderError> {
        self.ensure_session().await?;
        let mut reauthenticated = false;

        loop {
            let mut request = self.http.request(method.clone(), self.url(path));
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(method = %method, path = %path, "ZIA API request");
            let response = request.send().await.map_err(transport_error)?;
            let status = response.status();
            debug!(method = %method, path = %path, status = status.as_u16(), "ZIA API response");

            if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                warn!(path = %path, "ZIA session rejected, re-authenticating");
                *self.session.lock().await = None;
                self.ensure_session().await?;
                reauthenticated = true;
                continue;
            }
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            let text = response.text().await.map_err(transport_error)?;
            if !status.is_success() {
                return Err(status_error(status, &text));
            }
            if text.trim().is_empty() {
                return Ok(Some(Value::Null));
            }
            return serde_json::from_str(&text).map(Some).map_err(|e| {
                ProviderError::Decode(format!("{} {} returned invalid JSON: {}", method, path, e))
            });
        }
    }
}

#[async_trait]
impl ApiClient for ZiaHttpClient {
    async fn get(&self, path: &str) -> Result<Lookup<Value>, ProviderError> {
        Ok(match self.send(Method::GET, path, None).await? {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ProviderError> {
        self.send(Method::POST, path, Some(&body))
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("POST {}", path)))
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, ProviderError> {
        self.send(Method::PUT, path, Some(&body))
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("PUT {}", path)))
    }

    async fn delete(&self, path: &str) -> Result<Lookup<()>, ProviderError> {
        Ok(match self.send(Method::DELETE, path, None).await? {
            Some(_) => Lookup::Found(()),
            None => Lookup::NotFound,
        })
    }

    async fn close(&self) -> Result<(), ProviderError> {
        let mut session = self.session.lock().await;
        if session.take().is_none() {
            return Ok(());
        }
        let response = self
            .http
            .delete(self.url(SESSION_PATH))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text).context("end session"));
        }
        info!("ZIA session closed");
        Ok(())
    }
}

/// Obfuscate the raw API key the way `/authenticatedSession` expects.
///
/// The last six digits of the millisecond timestamp select characters of the
/// key; the same digits shifted right by one (zero-padded to six) select
/// characters offset by two.
pub fn obfuscate_api_key(api_key: &str, timestamp_ms: u128) -> Result<String, ProviderError> {
    let key: Vec<char> = api_key.chars().collect();
    if key.len() < 12 {
        return Err(ProviderError::Configuration(
            "api_key must be at least 12 characters".to_string(),
        ));
    }

    let now = format!("{:06}", timestamp_ms);
    let tail = &now[now.len() - 6..];
    let shifted = format!("{:06}", timestamp_ms % 1_000_000 >> 1);

    let digit = |c: char| c.to_digit(10).map(|d| d as usize).unwrap_or(0);
    let mut obfuscated: String = tail.chars().map(|c| key[digit(c)]).collect();
    obfuscated.extend(shifted.chars().map(|c| key[digit(c) + 2]));
    Ok(obfuscated)
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[derive(Debug, Default, Deserialize)]
struct VendorError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Map a non-success HTTP status and body onto the error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let vendor: VendorError = serde_json::from_str(body).unwrap_or_default();
    let message = match (vendor.code.is_empty(), vendor.message.is_empty()) {
        (true, true) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string(),
        (true, true) => body.trim().to_string(),
        (false, true) => vendor.code.clone(),
        (true, false) => vendor.message,
        (false, false) => format!("{}: {}", vendor.code, vendor.message),
    };

    match status {
        StatusCode::BAD_REQUEST => ProviderError::InvalidRequest(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::PermissionDenied(message),
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        StatusCode::CONFLICT if vendor.code == EDIT_LOCK_CODE => ProviderError::Unavailable(message),
        StatusCode::CONFLICT => ProviderError::AlreadyExists(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::ResourceExhausted(message),
        StatusCode::SERVICE_UNAVAILABLE => ProviderError::Unavailable(message),
        _ => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_connect() {
        ProviderError::Unavailable(err.to_string())
    } else if err.is_timeout() || err.is_request() {
        // Sent, but the outcome is unknown.
        ProviderError::DeadlineExceeded(err.to_string())
    } else if err.is_decode() || err.is_body() {
        ProviderError::Decode(err.to_string())
    } else {
        ProviderError::Sdk(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            username: "admin@example.com".to_string(),
            password: "hunter2".to_string(),
            api_key: "abcdefghijklmnop".to_string(),
        }
    }

    #[test]
    fn test_obfuscate_api_key() {
        // tail "123456", shifted 123456 >> 1 = 61728 -> "061728"
        let key = obfuscate_api_key("abcdefghijklmnop", 1_700_000_123_456).unwrap();
        assert_eq!(key, "bcdefgcidjek");
    }

    #[test]
    fn test_obfuscate_pads_shifted_digits() {
        // tail "000010", shifted 5 -> "000005"
        let key = obfuscate_api_key("abcdefghijklmnop", 1_700_000_000_010).unwrap();
        assert_eq!(key, "aaaabaccccch");
    }

    #[test]
    fn test_obfuscate_rejects_short_keys() {
        let err = obfuscate_api_key("short", 1_700_000_123_456).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_status_error_mapping() {
        let err = status_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":"INVALID_INPUT_ARGUMENT","message":"Rule name already in use"}"#,
        );
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert_eq!(err.message(), "INVALID_INPUT_ARGUMENT: Rule name already in use");

        let err = status_error(
            StatusCode::CONFLICT,
            r#"{"code":"EDIT_LOCK_NOT_AVAILABLE","message":"Another admin is editing"}"#,
        );
        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert!(err.is_retryable());

        let err = status_error(StatusCode::CONFLICT, r#"{"code":"DUPLICATE_ITEM"}"#);
        assert!(matches!(err, ProviderError::AlreadyExists(_)));
        assert_eq!(err.message(), "DUPLICATE_ITEM");

        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(err, ProviderError::ResourceExhausted(_)));
        assert_eq!(err.message(), "Too Many Requests");

        let err = status_error(StatusCode::FORBIDDEN, "plain text denial");
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
        assert_eq!(err.message(), "plain text denial");

        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"boom"}"#);
        assert!(matches!(err, ProviderError::Api { status: 500, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = ZiaHttpClient::new(
            "https://zsapi.zscalertwo.net/api/v1/",
            credentials(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url(), "https://zsapi.zscalertwo.net/api/v1");
        assert_eq!(
            client.url("/staticIP/7"),
            "https://zsapi.zscalertwo.net/api/v1/staticIP/7"
        );
    }

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let client =
            ZiaHttpClient::new("http://127.0.0.1:9", credentials(), Duration::from_secs(1)).unwrap();
        assert!(client.close().await.is_ok());
    }
}
