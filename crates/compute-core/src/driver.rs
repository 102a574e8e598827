//! The capability contract every vendor driver implements.
//!
//! Callers hold an `Arc<dyn NodeDriver>` and never a vendor type. All operations return
//! [`crate::Result`]: listing operations fail instead of yielding an empty collection, and
//! state-changing operations report `Ok(false)` only when the vendor answered with a
//! success status other than 200.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::time::sleep;
use tracing::debug;

use crate::client::RetryPolicy;
use crate::error::{Error, Result};
use crate::types::{Node, NodeImage, NodeLocation, NodeSize, Provider};

/// Additional vendor form fields for [`NodeDriver::create_node`].
///
/// Fields named here are sent alongside the core create parameters but never replace them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateNodeOptions {
    fields: BTreeMap<String, String>,
}

impl CreateNodeOptions {
    /// Create an empty set of options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vendor-specific field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Iterate over the configured fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns true if no fields have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Compute driver capability interface.
#[async_trait]
pub trait NodeDriver: Send + Sync {
    /// Provider this driver talks to.
    fn provider(&self) -> Provider;

    /// Human readable vendor name.
    fn name(&self) -> &'static str;

    /// Vendor website.
    fn website(&self) -> &'static str;

    /// List all nodes owned by the account.
    ///
    /// # Errors
    ///
    /// Returns a transport error for non-success statuses and a normalization error for
    /// records that cannot be mapped.
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// List installable images.
    ///
    /// The location filter may be ignored by vendors with a global catalog.
    ///
    /// # Errors
    ///
    /// See [`NodeDriver::list_nodes`].
    async fn list_images(&self, location: Option<&NodeLocation>) -> Result<Vec<NodeImage>>;

    /// List compute plans.
    ///
    /// The location filter may be ignored by vendors with a global catalog.
    ///
    /// # Errors
    ///
    /// See [`NodeDriver::list_nodes`].
    async fn list_sizes(&self, location: Option<&NodeLocation>) -> Result<Vec<NodeSize>>;

    /// List data centers.
    ///
    /// # Errors
    ///
    /// See [`NodeDriver::list_nodes`].
    async fn list_locations(&self) -> Result<Vec<NodeLocation>>;

    /// Create a node and return its full record.
    ///
    /// Not idempotent: every successful call provisions a new node.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the create call fails and [`Error::Reconciliation`]
    /// if the created node cannot be found afterwards.
    async fn create_node(
        &self,
        name: &str,
        size: &NodeSize,
        image: &NodeImage,
        location: &NodeLocation,
        options: &CreateNodeOptions,
    ) -> Result<Node>;

    /// Reboot a node.
    ///
    /// # Errors
    ///
    /// Returns a transport error for non-success statuses.
    async fn reboot_node(&self, node: &Node) -> Result<bool>;

    /// Destroy a node.
    ///
    /// # Errors
    ///
    /// Returns a transport error for non-success statuses.
    async fn destroy_node(&self, node: &Node) -> Result<bool>;
}

/// Find the node with `id` by re-listing after a create call.
///
/// Lists once, then up to `policy.max_retries` more times with the policy's backoff between
/// attempts. `RetryPolicy::no_retry()` yields exactly one listing.
///
/// # Errors
///
/// Propagates listing failures and returns [`Error::Reconciliation`] when no listing
/// contains the node.
pub async fn reconcile_node<D>(driver: &D, id: &str, policy: &RetryPolicy) -> Result<Node>
where
    D: NodeDriver + ?Sized,
{
    let mut attempt = 0;
    loop {
        let nodes = driver.list_nodes().await?;
        if let Some(node) = nodes.into_iter().find(|node| node.id == id) {
            return Ok(node);
        }

        attempt += 1;
        if attempt > policy.max_retries {
            break;
        }
        let delay = policy.delay_for_attempt(attempt);
        debug!(id, attempt, ?delay, "created node not listed yet");
        sleep(delay).await;
    }

    Err(Error::Reconciliation { id: id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DriverRef, Extra, NodeState};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Weak};
    use std::time::Duration;

    /// Driver whose node listing only contains the node after `visible_after` calls.
    struct DelayedListing {
        visible_after: u32,
        list_calls: AtomicU32,
        reboots: AtomicU32,
        me: Weak<Self>,
    }

    impl DelayedListing {
        fn new(visible_after: u32) -> Arc<Self> {
            Arc::new_cyclic(|me| Self {
                visible_after,
                list_calls: AtomicU32::new(0),
                reboots: AtomicU32::new(0),
                me: me.clone(),
            })
        }

        fn node(&self, id: &str) -> Node {
            let me: Weak<dyn NodeDriver> = self.me.clone();
            Node {
                id: id.to_string(),
                name: "web".to_string(),
                state: NodeState::Pending,
                public_ips: vec!["0.0.0.0".to_string()],
                private_ips: None,
                extra: Extra::new(),
                driver: DriverRef::new(me),
            }
        }
    }

    #[async_trait]
    impl NodeDriver for DelayedListing {
        fn provider(&self) -> Provider {
            Provider::Vultr
        }

        fn name(&self) -> &'static str {
            "Delayed"
        }

        fn website(&self) -> &'static str {
            "https://example.com"
        }

        async fn list_nodes(&self) -> Result<Vec<Node>> {
            let calls = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let mut nodes = vec![self.node("1")];
            if calls >= self.visible_after {
                nodes.push(self.node("42"));
            }
            Ok(nodes)
        }

        async fn list_images(&self, _: Option<&NodeLocation>) -> Result<Vec<NodeImage>> {
            Ok(Vec::new())
        }

        async fn list_sizes(&self, _: Option<&NodeLocation>) -> Result<Vec<NodeSize>> {
            Ok(Vec::new())
        }

        async fn list_locations(&self) -> Result<Vec<NodeLocation>> {
            Ok(Vec::new())
        }

        async fn create_node(
            &self,
            _: &str,
            _: &NodeSize,
            _: &NodeImage,
            _: &NodeLocation,
            _: &CreateNodeOptions,
        ) -> Result<Node> {
            reconcile_node(self, "42", &RetryPolicy::no_retry()).await
        }

        async fn reboot_node(&self, _: &Node) -> Result<bool> {
            self.reboots.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn destroy_node(&self, _: &Node) -> Result<bool> {
            Ok(true)
        }
    }

    fn fast_policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(retries)
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
    }

    #[tokio::test]
    async fn reconcile_finds_node_on_first_listing() {
        let driver = DelayedListing::new(1);
        let node = reconcile_node(driver.as_ref(), "42", &RetryPolicy::no_retry())
            .await
            .unwrap();
        assert_eq!(node.id, "42");
        assert_eq!(driver.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reconcile_without_retries_lists_once() {
        let driver = DelayedListing::new(3);
        let err = reconcile_node(driver.as_ref(), "42", &RetryPolicy::no_retry())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::Reconciliation {
                id: "42".to_string()
            }
        );
        assert_eq!(driver.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reconcile_polls_until_visible() {
        let driver = DelayedListing::new(3);
        let node = reconcile_node(driver.as_ref(), "42", &fast_policy(5))
            .await
            .unwrap();
        assert_eq!(node.id, "42");
        assert_eq!(driver.list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn reconcile_gives_up_after_policy_exhausted() {
        let driver = DelayedListing::new(10);
        let err = reconcile_node(driver.as_ref(), "42", &fast_policy(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Reconciliation { .. }));
        assert_eq!(driver.list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn node_reboot_goes_through_back_reference() {
        let driver = DelayedListing::new(1);
        let node = driver.list_nodes().await.unwrap().remove(0);
        assert!(node.reboot().await.unwrap());
        assert!(node.destroy().await.unwrap());
        assert_eq!(driver.reboots.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn back_reference_does_not_keep_driver_alive() {
        let driver = DelayedListing::new(1);
        let node = driver.list_nodes().await.unwrap().remove(0);
        drop(driver);
        assert!(node.driver.upgrade().is_none());
        assert!(matches!(
            node.reboot().await.unwrap_err(),
            Error::DriverDetached(_)
        ));
    }

    #[test]
    fn create_options_keep_key_order() {
        let options = CreateNodeOptions::new()
            .with_field("enable_ipv6", "yes")
            .with_field("SSHKEYID", "abc");
        let fields: Vec<_> = options.iter().collect();
        assert_eq!(fields, vec![("SSHKEYID", "abc"), ("enable_ipv6", "yes")]);
        assert!(!options.is_empty());
    }
}
