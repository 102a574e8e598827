//! Configuration structures for compute drivers.
//!
//! [`DriverConfig`] is the serde-friendly description of one driver instance: where the
//! vendor API lives, the credential, and the timing knobs for transport retries and
//! post-create reconciliation.

use crate::client::{ClientConfig, RetryPolicy};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Configuration for a driver instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DriverConfig {
    /// Vendor API base URL
    #[validate(url)]
    pub base_url: String,

    /// API key; never serialized
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Transport retries for idempotent requests
    #[validate(range(min = 0, max = 10))]
    #[serde(default)]
    pub max_retries: u32,

    /// Additional node listings after a create call before giving up
    #[validate(range(min = 0, max = 10))]
    #[serde(default)]
    pub reconcile_attempts: u32,

    /// Initial delay between reconcile listings, in milliseconds
    #[validate(range(min = 0, max = 60000))]
    #[serde(default = "default_reconcile_delay_ms")]
    pub reconcile_delay_ms: u64,
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_reconcile_delay_ms() -> u64 {
    1000
}

impl DriverConfig {
    /// Create a validated configuration for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            base_url: base_url.into(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: 0,
            reconcile_attempts: 0,
            reconcile_delay_ms: default_reconcile_delay_ms(),
        };
        config.check()?;
        Ok(config)
    }

    /// Run field validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing every failing field.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()?;
        Ok(())
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set transport retry attempts.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set reconcile polling.
    #[must_use]
    pub const fn with_reconcile(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.reconcile_attempts = attempts;
        self.reconcile_delay_ms = delay_ms;
        self
    }

    /// Request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Transport retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        if self.max_retries == 0 {
            RetryPolicy::no_retry()
        } else {
            RetryPolicy::new().with_max_retries(self.max_retries)
        }
    }

    /// Reconcile polling policy; `no_retry` lists exactly once.
    #[must_use]
    pub const fn reconcile_policy(&self) -> RetryPolicy {
        if self.reconcile_attempts == 0 {
            RetryPolicy::no_retry()
        } else {
            let delay = Duration::from_millis(self.reconcile_delay_ms);
            RetryPolicy::new()
                .with_max_retries(self.reconcile_attempts)
                .with_initial_delay(delay)
                .with_max_delay(Duration::from_millis(self.reconcile_delay_ms * 8))
        }
    }

    /// HTTP client configuration derived from this config.
    #[must_use]
    pub const fn http_config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_timeout(self.timeout())
            .with_retry_policy(self.retry_policy())
    }
}
