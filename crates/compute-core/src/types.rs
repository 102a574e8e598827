//! Vendor-independent entity model.
//!
//! Nodes, images, sizes and locations are produced only by a driver's normalizer and are
//! never mutated afterwards. Observing a state change means listing again.
//!
//! Every entity carries a [`DriverRef`], a non-owning association with the driver that
//! produced it, so follow-up operations such as [`Node::reboot`] can be issued without the
//! caller threading the driver through.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use crate::driver::NodeDriver;
use crate::error::{Error, Result};

/// Vendor-specific attributes kept alongside the first-class entity fields.
pub type Extra = BTreeMap<String, serde_json::Value>;

/// Supported compute providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Provider {
    /// Vultr
    Vultr,
}

impl Provider {
    /// Returns the provider name as a string.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Vultr => "vultr",
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "vultr" => Ok(Self::Vultr),
            _ => Err(Error::Config(format!("Unknown provider: {s}"))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Being provisioned
    Pending,
    /// Provisioned and powered on
    Running,
    /// Provisioned but not running
    Stopped,
    /// Destroyed
    Terminated,
    /// Anything the vendor vocabulary does not map onto
    Unknown,
}

impl NodeState {
    /// Returns the state as a lowercase string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-owning reference from an entity back to the driver that produced it.
///
/// Holding an entity never keeps a driver alive. Entities built outside a driver (or
/// deserialized) are detached.
#[derive(Clone, Default)]
pub struct DriverRef(Option<Weak<dyn NodeDriver>>);

impl DriverRef {
    /// Reference the given driver without taking ownership.
    #[must_use]
    pub fn new(driver: Weak<dyn NodeDriver>) -> Self {
        Self(Some(driver))
    }

    /// A reference to no driver.
    #[must_use]
    pub const fn detached() -> Self {
        Self(None)
    }

    /// Returns the driver if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<dyn NodeDriver>> {
        self.0.as_ref().and_then(Weak::upgrade)
    }

    /// Returns true if this reference was never attached to a driver.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        self.0.is_none()
    }

    fn require(&self, operation: &str) -> Result<Arc<dyn NodeDriver>> {
        self.upgrade().ok_or_else(|| {
            Error::DriverDetached(format!("cannot {operation}: owning driver was dropped"))
        })
    }
}

impl fmt::Debug for DriverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(driver) => write!(f, "DriverRef({})", driver.name()),
            None => f.write_str("DriverRef(detached)"),
        }
    }
}

/// Two references are equal when they point at the same driver (or both at none).
impl PartialEq for DriverRef {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Weak::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// A virtual machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Vendor identifier, stable across calls
    pub id: String,
    /// Display name
    pub name: String,
    /// Normalized state
    pub state: NodeState,
    /// Public addresses, primary first
    pub public_ips: Vec<String>,
    /// Private addresses, when the vendor reports any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ips: Option<Vec<String>>,
    /// Vendor-specific attributes
    #[serde(default)]
    pub extra: Extra,
    /// Producing driver
    #[serde(skip)]
    pub driver: DriverRef,
}

impl Node {
    /// Reboot this node through the driver that listed it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DriverDetached`] if the driver has been dropped, otherwise whatever
    /// the driver's `reboot_node` returns.
    pub async fn reboot(&self) -> Result<bool> {
        self.driver.require("reboot node")?.reboot_node(self).await
    }

    /// Destroy this node through the driver that listed it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DriverDetached`] if the driver has been dropped, otherwise whatever
    /// the driver's `destroy_node` returns.
    pub async fn destroy(&self) -> Result<bool> {
        self.driver.require("destroy node")?.destroy_node(self).await
    }
}

/// An installable operating system image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeImage {
    /// Vendor identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Vendor-specific attributes
    #[serde(default)]
    pub extra: Extra,
    /// Producing driver
    #[serde(skip)]
    pub driver: DriverRef,
}

/// A compute plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSize {
    /// Vendor identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Memory (MB)
    pub ram: u64,
    /// Disk (GB)
    pub disk: u64,
    /// Bandwidth allowance
    pub bandwidth: f64,
    /// Monthly price
    pub price: f64,
    /// Vendor-specific attributes
    #[serde(default)]
    pub extra: Extra,
    /// Producing driver
    #[serde(skip)]
    pub driver: DriverRef,
}

/// A data center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLocation {
    /// Vendor identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// ISO country code
    pub country: String,
    /// Producing driver
    #[serde(skip)]
    pub driver: DriverRef,
}
