//! Error types for compute driver operations.
//!
//! Every driver reports failures through the single [`Error`] enum so that callers never
//! branch on vendor identity. Three kinds carry the driver semantics:
//!
//! - [`Error::Transport`]: the vendor answered with a non-success HTTP status.
//! - [`Error::Normalization`]: a vendor record could not be mapped onto the entity model.
//! - [`Error::Reconciliation`]: a create call succeeded but the new node never showed up.
//!
//! The remaining variants describe failures below or around the HTTP exchange.

use thiserror::Error;

/// Main error type for compute driver operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The vendor returned a non-success status; `body` is the raw response text.
    #[error("HTTP {status}: {body}")]
    Transport {
        /// HTTP status code
        status: u16,
        /// Raw response body, verbatim
        body: String,
    },

    /// A vendor record is missing a field or a value failed coercion
    #[error("Normalization failed: {0}")]
    Normalization(String),

    /// The node returned by a create call was not found when listing nodes
    #[error("Created node `{id}` was not found in the node listing")]
    Reconciliation {
        /// Identifier returned by the create call
        id: String,
    },

    /// Vendor endpoint is unreachable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Operation timed out
    #[error("Timeout waiting for service: {0}")]
    Timeout(String),

    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The driver an entity was produced by has been dropped
    #[error("Driver is no longer available: {0}")]
    DriverDetached(String),
}

/// Specialized result type for compute driver operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "TRANSPORT_FAILURE",
            Self::Normalization(_) => "NORMALIZATION_FAILURE",
            Self::Reconciliation { .. } => "RECONCILIATION_FAILURE",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Timeout(_) => "TIMEOUT",
            Self::Http(_) => "HTTP_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::DriverDetached(_) => "DRIVER_DETACHED",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        match self {
            Self::Transport { status, .. } => *status >= 500,
            Self::Normalization(_) | Self::Reconciliation { .. } | Self::Config(_) => true,
            _ => false,
        }
    }

    /// Returns true if the failure is transient at the transport level.
    ///
    /// Only timeouts, connection failures and the throttling/gateway statuses
    /// (429, 502, 503, 504) qualify. Vendor application errors never do.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::ServiceUnavailable(_) => true,
            Self::Transport { status, .. } => matches!(*status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Diagnostic text carried by the error.
    ///
    /// For transport failures this is the raw response body.
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        match self {
            Self::Transport { body, .. } => body,
            Self::Reconciliation { id } => id,
            Self::Normalization(msg)
            | Self::ServiceUnavailable(msg)
            | Self::Timeout(msg)
            | Self::Http(msg)
            | Self::Config(msg)
            | Self::InvalidEndpoint(msg)
            | Self::DriverDetached(msg) => msg,
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Normalization(format!("response body is not valid JSON: {err}"))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Config(format!("Invalid configuration: {err}"))
    }
}
