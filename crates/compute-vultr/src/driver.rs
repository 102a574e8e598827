//! Vultr implementation of [`NodeDriver`].

use async_trait::async_trait;
use compute_core::client::{
    Auth, ClientConfig, RetryPolicy, ServiceClientBuilder, VULTR_DEFAULT_TIMEOUT,
};
use compute_core::config::DriverConfig;
use compute_core::params::Params;
use compute_core::{
    reconcile_node, CreateNodeOptions, DriverRef, Error, Node, NodeDriver, NodeImage,
    NodeLocation, NodeSize, Provider, Result,
};
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::connection::{VultrConnection, API_KEY_PARAM, DEFAULT_BASE_URL};
use crate::normalize;

const USER_AGENT: &str = concat!("compute-vultr/", env!("CARGO_PKG_VERSION"));

const SERVER_LIST: &str = "/v1/server/list";
const SERVER_CREATE: &str = "/v1/server/create";
const SERVER_REBOOT: &str = "/v1/server/reboot";
const SERVER_DESTROY: &str = "/v1/server/destroy";
const OS_LIST: &str = "/v1/os/list";
const PLANS_LIST: &str = "/v1/plans/list";
const REGIONS_LIST: &str = "/v1/regions/list";

/// Builder for [`VultrNodeDriver`].
#[derive(Debug)]
pub struct VultrNodeDriverBuilder {
    api_key: String,
    base_url: String,
    http_config: ClientConfig,
    reconcile: RetryPolicy,
}

impl VultrNodeDriverBuilder {
    /// Create a builder for the public Vultr API.
    ///
    /// Transport retries and reconcile polling are both off by default.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http_config: ClientConfig::new()
                .with_timeout(Duration::from_secs(VULTR_DEFAULT_TIMEOUT))
                .without_retries(),
            reconcile: RetryPolicy::no_retry(),
        }
    }

    /// Point the driver at another endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the transport retry policy.
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

    /// Poll the node listing after a create call with this policy.
    #[must_use]
    pub fn with_reconcile_policy(mut self, policy: RetryPolicy) -> Self {
        self.reconcile = policy;
        self
    }

    /// Build the driver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid base URL or HTTP client setup.
    pub fn build(self) -> Result<Arc<VultrNodeDriver>> {
        let client = ServiceClientBuilder::new(
            Provider::Vultr,
            &self.base_url,
            self.http_config.timeout,
        )?
        .with_http_config(self.http_config)
        .with_user_agent(USER_AGENT)
        .with_auth(Auth::query_param(API_KEY_PARAM, self.api_key))
        .build()?;

        let connection = VultrConnection::new(client);
        let reconcile = self.reconcile;
        Ok(Arc::new_cyclic(|me| VultrNodeDriver {
            connection,
            reconcile,
            me: me.clone(),
        }))
    }
}

/// Node driver for Vultr.
///
/// Always handled through an `Arc` so entities can refer back to it without owning it.
pub struct VultrNodeDriver {
    connection: VultrConnection,
    reconcile: RetryPolicy,
    me: Weak<VultrNodeDriver>,
}

impl VultrNodeDriver {
    /// Start building a driver with the given API key.
    #[must_use]
    pub fn builder(api_key: impl Into<String>) -> VultrNodeDriverBuilder {
        VultrNodeDriverBuilder::new(api_key)
    }

    /// Construct a driver for the public Vultr API.
    ///
    /// # Errors
    ///
    /// See [`VultrNodeDriverBuilder::build`].
    pub fn new(api_key: impl Into<String>) -> Result<Arc<Self>> {
        Self::builder(api_key).build()
    }

    /// Construct a driver from a validated [`DriverConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails or no API key is configured.
    pub fn from_config(config: &DriverConfig) -> Result<Arc<Self>> {
        config.check()?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("Vultr driver requires an api_key".to_string()))?;

        Self::builder(api_key)
            .with_base_url(config.base_url.clone())
            .with_http_config(config.http_config())
            .with_reconcile_policy(config.reconcile_policy())
            .build()
    }

    /// Return the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        self.connection.base_url()
    }

    fn driver_ref(&self) -> DriverRef {
        let me: Weak<dyn NodeDriver> = self.me.clone();
        DriverRef::new(me)
    }

    async fn fetch(&self, path: &str) -> Result<Value> {
        self.connection.get(path).await?.json()
    }

    async fn server_action(&self, path: &str, node: &Node) -> Result<bool> {
        let mut form = Params::new();
        form.push("SUBID", &node.id);

        let response = self.connection.post(path, &form.into_pairs()).await?;
        info!(id = %node.id, path, status = %response.status(), "Vultr server action");
        Ok(response.is_ok())
    }
}

#[async_trait]
impl NodeDriver for VultrNodeDriver {
    fn provider(&self) -> Provider {
        Provider::Vultr
    }

    fn name(&self) -> &'static str {
        "Vultr"
    }

    fn website(&self) -> &'static str {
        "https://www.vultr.com"
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let body = self.fetch(SERVER_LIST).await?;
        normalize::nodes(body, &self.driver_ref())
    }

    async fn list_images(&self, _location: Option<&NodeLocation>) -> Result<Vec<NodeImage>> {
        let body = self.fetch(OS_LIST).await?;
        normalize::images(body, &self.driver_ref())
    }

    async fn list_sizes(&self, _location: Option<&NodeLocation>) -> Result<Vec<NodeSize>> {
        let body = self.fetch(PLANS_LIST).await?;
        normalize::sizes(body, &self.driver_ref())
    }

    async fn list_locations(&self) -> Result<Vec<NodeLocation>> {
        let body = self.fetch(REGIONS_LIST).await?;
        normalize::locations(body, &self.driver_ref())
    }

    async fn create_node(
        &self,
        name: &str,
        size: &NodeSize,
        image: &NodeImage,
        location: &NodeLocation,
        options: &CreateNodeOptions,
    ) -> Result<Node> {
        let mut form = Params::new();
        form.push("DCID", &location.id);
        form.push("OSID", &image.id);
        form.push("VPSPLANID", &size.id);
        form.push("label", name);
        form.extend_missing(options.iter());

        let response = self.connection.post(SERVER_CREATE, &form.into_pairs()).await?;
        // Only a 200 carries the new SUBID.
        if !response.is_ok() {
            return Err(Error::Transport {
                status: response.status().as_u16(),
                body: response.text().to_string(),
            });
        }
        let id = normalize::created_id(&response.json::<Value>()?)?;
        info!(%id, name, location = %location.id, plan = %size.id, "Vultr server created");

        reconcile_node(self, &id, &self.reconcile).await
    }

    async fn reboot_node(&self, node: &Node) -> Result<bool> {
        self.server_action(SERVER_REBOOT, node).await
    }

    async fn destroy_node(&self, node: &Node) -> Result<bool> {
        self.server_action(SERVER_DESTROY, node).await
    }
}
