//! HTTP plumbing shared by all vendor drivers.
//!
//! [`ServiceClient`] is the connection adapter drivers send requests through. It owns the
//! `reqwest` client, injects the vendor's authentication into every request, and hands
//! non-success statuses to a driver supplied mapper. Successful responses come back as an
//! [`ApiResponse`] carrying the status and the body.

use reqwest::{Client, ClientBuilder, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::types::Provider;

/// Whole-request timeout for Vultr calls, in seconds
pub const VULTR_DEFAULT_TIMEOUT: u64 = 30;

/// TCP connect timeout, in seconds
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// Seconds an idle pooled connection to a vendor host is kept
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Idle connections kept per vendor host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Attempts after the first one when a policy is built with [`RetryPolicy::new`]
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// First backoff step, in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Backoff ceiling, in milliseconds
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5000;

/// Bounded exponential backoff.
///
/// One type drives two loops: resending idempotent requests that failed transiently, and
/// re-listing nodes until a freshly created one appears. [`RetryPolicy::no_retry`] makes
/// either loop run exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub max_retries: u32,

    /// Wait before the second attempt
    pub initial_delay: Duration,

    /// Upper bound on any single wait
    pub max_delay: Duration,

    /// Growth factor between consecutive waits
    pub backoff_multiplier: u32,
}

impl RetryPolicy {
    /// Three extra attempts, doubling from 500ms up to 5s.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            backoff_multiplier: 2,
        }
    }

    /// Single attempt, no waiting. Default for Vultr drivers.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            backoff_multiplier: 1,
        }
    }

    /// Set the number of extra attempts.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the first wait.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Cap every wait at `delay`.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the growth factor between waits.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// `min(initial_delay * multiplier^(attempt - 1), max_delay)`; attempt 0 has no delay.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let multiplier = self.backoff_multiplier.saturating_pow(attempt - 1);
        let initial_ms = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(initial_ms.saturating_mul(u64::from(multiplier)));

        std::cmp::min(delay, self.max_delay)
    }

    /// Returns true if more than one attempt is allowed.
    #[must_use]
    pub const fn has_retries(&self) -> bool {
        self.max_retries > 0
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings for the `reqwest` client behind a [`ServiceClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Whole-request timeout, body included
    pub timeout: Duration,

    /// Backoff for GET and other idempotent calls; POSTs never retry
    pub retry_policy: RetryPolicy,

    /// How long idle pooled connections survive
    pub pool_idle_timeout: Duration,

    /// Idle pooled connections per host
    pub pool_max_idle_per_host: usize,

    /// Emit a `debug!` event per attempt
    pub enable_logging: bool,

    /// Accept gzip-encoded vendor responses
    pub enable_compression: bool,
}

impl ClientConfig {
    /// 30 second timeout, default backoff, pooling and gzip on.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(VULTR_DEFAULT_TIMEOUT),
            retry_policy: RetryPolicy::new(),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_logging: true,
            enable_compression: true,
        }
    }

    /// Set the whole-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the backoff for idempotent calls.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Send every request exactly once.
    #[must_use]
    pub const fn without_retries(mut self) -> Self {
        self.retry_policy = RetryPolicy::no_retry();
        self
    }

    /// Set how long idle connections are pooled.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set the idle connection limit per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Toggle per-attempt `debug!` events.
    #[must_use]
    pub const fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Toggle gzip response decoding.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Authentication attached to every outgoing request.
#[derive(Debug, Default)]
pub enum Auth {
    /// No authentication
    #[default]
    None,
    /// A secret sent as a query parameter
    QueryParam {
        /// Parameter name
        name: &'static str,
        /// Parameter value
        value: SecretString,
    },
}

impl Auth {
    /// API key passed as the named query parameter.
    #[must_use]
    pub fn query_param(name: &'static str, key: impl Into<String>) -> Self {
        Self::QueryParam {
            name,
            value: SecretString::from(key.into()),
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::None => request,
            Self::QueryParam { name, value } => {
                request.query(&[(*name, value.expose_secret())])
            }
        }
    }
}

/// A successful vendor response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    /// Wrap a status and raw body.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns true for exactly `200 OK`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// Raw body text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Parse the body as JSON. An empty body parses as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Normalization`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self.body.trim();
        let body = if body.is_empty() { "null" } else { body };
        serde_json::from_str(body).map_err(Error::from)
    }
}

/// Builder for [`ServiceClient`].
#[derive(Debug)]
pub struct ServiceClientBuilder {
    provider: Provider,
    base_url: Url,
    http_config: ClientConfig,
    user_agent: Option<String>,
    auth: Auth,
}

impl ServiceClientBuilder {
    /// Create a builder for the given provider endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL cannot be parsed.
    pub fn new(provider: Provider, base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let raw = base_url.as_ref();
        let mut url = Url::parse(raw).map_err(|err| {
            Error::Config(format!("Invalid {provider} base URL `{raw}`: {err}"))
        })?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            provider,
            base_url: url,
            http_config: ClientConfig::new().with_timeout(timeout),
            user_agent: None,
            auth: Auth::None,
        })
    }

    /// Set the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.http_config.retry_policy = retry;
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Set the authentication injected into every request.
    #[must_use]
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the underlying HTTP client cannot be constructed.
    pub fn build(self) -> Result<ServiceClient> {
        let config = &self.http_config;
        let mut builder = ClientBuilder::new()
            .timeout(config.timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT));

        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        if !config.enable_compression {
            builder = builder.no_gzip();
        }

        let http = builder.build().map_err(|err| {
            Error::Config(format!(
                "Failed to build {} HTTP client: {err}",
                self.provider
            ))
        })?;

        Ok(ServiceClient {
            http,
            provider: self.provider,
            base_url: self.base_url,
            retry_policy: config.retry_policy,
            log_requests: config.enable_logging,
            auth: Arc::new(self.auth),
        })
    }
}

/// HTTP client bound to one vendor endpoint.
#[derive(Clone)]
pub struct ServiceClient {
    http: Client,
    provider: Provider,
    base_url: Url,
    retry_policy: RetryPolicy,
    log_requests: bool,
    auth: Arc<Auth>,
}

impl ServiceClient {
    /// Return the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Return the provider this client talks to.
    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    /// Return the transport retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        let normalized = path.strip_prefix('/').unwrap_or(path);
        self.base_url.join(normalized).map_err(|err| {
            Error::InvalidEndpoint(format!("Invalid {} path `{path}`: {err}", self.provider))
        })
    }

    /// Send a request, retrying idempotent methods on transient failures.
    ///
    /// `configure` adds the body and headers; authentication and `params` are applied here.
    /// Non-success statuses are turned into errors by `map_status` with the raw body text.
    ///
    /// # Errors
    ///
    /// Returns the mapped status error, or the transport error of the last attempt.
    pub async fn execute_with_retry<F, M>(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
        configure: F,
        map_status: M,
    ) -> Result<ApiResponse>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Send + Sync,
        M: Fn(StatusCode, String) -> Error + Send + Sync,
    {
        let url = self.build_url(path)?;
        let retries = if is_idempotent(&method) {
            self.retry_policy.max_retries
        } else {
            0
        };
        let mut attempt = 0;

        loop {
            let mut request = self.http.request(method.clone(), url.clone());
            request = self.auth.apply(request);
            if !params.is_empty() {
                request = request.query(params);
            }
            request = configure(request);

            if self.log_requests {
                debug!(provider = %self.provider, %method, path, attempt, "sending request");
            }

            let error = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(text) => return Ok(ApiResponse::new(status, text)),
                            Err(err) => Error::from(err),
                        }
                    } else {
                        let text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        map_status(status, text)
                    }
                }
                Err(err) => Error::from(err),
            };

            if !error.is_retryable() || attempt >= retries {
                if error.should_log() {
                    warn!(provider = %self.provider, %method, path, code = error.error_code(), "request failed: {error}");
                }
                return Err(error);
            }

            attempt += 1;
            let delay = self.retry_policy.delay_for_attempt(attempt);
            debug!("Retrying {} request after {:?}", self.provider, delay);
            sleep(delay).await;
        }
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}
