//! Error types for the ZIA provider.

use serde_json::Value;
use thiserror::Error;

/// Errors produced while serving provider operations.
///
/// The variants follow the gRPC status taxonomy so they map cleanly onto the
/// plugin protocol, and the ZIA API's HTTP failures are folded into the same
/// set by [`crate::client::http`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A configuration value failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// The provider is not configured, or its configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is not registered.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// Local JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The API rejected a create because the object already exists.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Authentication or authorization failed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The API rate limit was hit.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The API could not be reached, or the tenant's edit lock is held elsewhere.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The request timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The operation is not valid in the current state.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// The operation is not supported for this type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// The API (or the runtime) rejected the request as malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other error status reported by the ZIA API.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The vendor's message, verbatim.
        message: String,
    },

    /// An API response could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The mutation succeeded but activating the staged configuration failed.
    #[error("Activation failed: {0}")]
    Activation(String),

    /// The write reached the API, then a later step failed. `state` is the
    /// object as read back after the write and must be kept.
    #[error("{source}")]
    PartiallyApplied {
        /// Confirmed state of the written object.
        state: Box<Value>,
        /// What failed after the write.
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Get the error message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Sdk(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg)
            | Self::Decode(msg)
            | Self::Activation(msg) => msg,
            Self::Api { message, .. } => message,
            Self::PartiallyApplied { source, .. } => source.message(),
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
        }
    }

    /// Whether the failure is transient and the call may be retried as is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::ResourceExhausted(_) | Self::DeadlineExceeded(_)
        )
    }

    /// Whether a non-idempotent call (a create `POST`) may be sent again.
    ///
    /// A timeout is excluded: the API may have committed the first request.
    pub fn is_safe_to_resend(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::ResourceExhausted(_))
    }

    /// Whether the error means the target object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Split off the state of a write that landed before the failure.
    pub fn take_applied_state(self) -> (Option<Value>, Self) {
        match self {
            Self::PartiallyApplied { state, source } => (Some(*state), *source),
            other => (None, other),
        }
    }

    /// Prefix the message with the operation and object it concerns.
    ///
    /// The variant is preserved so retry and not-found checks still apply.
    pub fn context(self, what: impl std::fmt::Display) -> Self {
        let with = |msg: String| format!("{}: {}", what, msg);
        match self {
            Self::NotFound(msg) => Self::NotFound(with(msg)),
            Self::Validation(msg) => Self::Validation(with(msg)),
            Self::Sdk(msg) => Self::Sdk(with(msg)),
            Self::Configuration(msg) => Self::Configuration(with(msg)),
            Self::UnknownResource(msg) => Self::UnknownResource(with(msg)),
            Self::AlreadyExists(msg) => Self::AlreadyExists(with(msg)),
            Self::PermissionDenied(msg) => Self::PermissionDenied(with(msg)),
            Self::ResourceExhausted(msg) => Self::ResourceExhausted(with(msg)),
            Self::Unavailable(msg) => Self::Unavailable(with(msg)),
            Self::DeadlineExceeded(msg) => Self::DeadlineExceeded(with(msg)),
            Self::FailedPrecondition(msg) => Self::FailedPrecondition(with(msg)),
            Self::Unimplemented(msg) => Self::Unimplemented(with(msg)),
            Self::InvalidRequest(msg) => Self::InvalidRequest(with(msg)),
            Self::Decode(msg) => Self::Decode(with(msg)),
            Self::Activation(msg) => Self::Activation(with(msg)),
            Self::Api { status, message } => Self::Api {
                status,
                message: with(message),
            },
            Self::PartiallyApplied { state, source } => Self::PartiallyApplied {
                state,
                source: Box::new(source.context(what)),
            },
            other @ (Self::Serialization(_) | Self::Transport(_)) => other,
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Sdk(msg) => tonic::Status::internal(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::DeadlineExceeded(msg) => tonic::Status::deadline_exceeded(msg),
            ProviderError::FailedPrecondition(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Api { status, message } => {
                tonic::Status::unknown(format!("HTTP {}: {}", status, message))
            },
            ProviderError::Decode(msg) => tonic::Status::data_loss(msg),
            ProviderError::Activation(msg) => tonic::Status::aborted(msg),
            ProviderError::PartiallyApplied { source, .. } => (*source).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("firewall rule 42".to_string());
        assert_eq!(format!("{}", err), "Resource not found: firewall rule 42");

        let err = ProviderError::Api {
            status: 500,
            message: "UNEXPECTED_ERROR".to_string(),
        };
        assert_eq!(format!("{}", err), "API error (HTTP 500): UNEXPECTED_ERROR");

        let err = ProviderError::Activation("status PENDING".to_string());
        assert_eq!(format!("{}", err), "Activation failed: status PENDING");
    }

    #[test]
    fn test_error_to_status() {
        let status: tonic::Status = ProviderError::NotFound("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = ProviderError::InvalidRequest("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = ProviderError::Unavailable("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::Unavailable);

        let status: tonic::Status = ProviderError::Decode("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::DataLoss);

        let status: tonic::Status = ProviderError::Activation("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::Aborted);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Unavailable("edit lock".to_string()).is_retryable());
        assert!(ProviderError::ResourceExhausted("429".to_string()).is_retryable());
        assert!(ProviderError::DeadlineExceeded("timeout".to_string()).is_retryable());

        assert!(!ProviderError::InvalidRequest("bad".to_string()).is_retryable());
        assert!(!ProviderError::Decode("shape".to_string()).is_retryable());
        assert!(!ProviderError::NotFound("gone".to_string()).is_retryable());
        assert!(!ProviderError::Api {
            status: 500,
            message: "boom".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_resend_excludes_timeouts() {
        assert!(ProviderError::Unavailable("EDIT_LOCK_NOT_AVAILABLE".to_string()).is_safe_to_resend());
        assert!(ProviderError::ResourceExhausted("429".to_string()).is_safe_to_resend());
        assert!(!ProviderError::DeadlineExceeded("timeout".to_string()).is_safe_to_resend());
        assert!(!ProviderError::Api {
            status: 500,
            message: "boom".to_string()
        }
        .is_safe_to_resend());
    }

    #[test]
    fn test_partially_applied_keeps_state() {
        let err = ProviderError::PartiallyApplied {
            state: Box::new(serde_json::json!({"id": "7"})),
            source: Box::new(ProviderError::Activation("status PENDING".to_string())),
        }
        .context("create zia_traffic_forwarding_static_ip 7");
        assert_eq!(
            format!("{}", err),
            "Activation failed: create zia_traffic_forwarding_static_ip 7: status PENDING"
        );

        let (state, cause) = err.take_applied_state();
        assert_eq!(state, Some(serde_json::json!({"id": "7"})));
        assert!(matches!(cause, ProviderError::Activation(_)));

        let (state, _) = ProviderError::NotFound("x".to_string()).take_applied_state();
        assert!(state.is_none());
    }

    #[test]
    fn test_context_keeps_variant() {
        let err = ProviderError::Unavailable("EDIT_LOCK_NOT_AVAILABLE".to_string())
            .context("update zia_url_categories CUSTOM_01");
        assert!(err.is_retryable());
        assert_eq!(
            err.message(),
            "update zia_url_categories CUSTOM_01: EDIT_LOCK_NOT_AVAILABLE"
        );

        let err = ProviderError::NotFound("missing".to_string()).context("read 7");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("username is required".to_string());
        assert_eq!(err.message(), "username is required");

        let err = ProviderError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.message(), "bad gateway");
    }
}
