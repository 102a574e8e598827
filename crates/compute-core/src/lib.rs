//! # compute-core
//!
//! Vendor-agnostic building blocks for cloud compute drivers.
//!
//! Application code programs against [`NodeDriver`] and the entity model in [`types`];
//! vendor crates implement the trait on top of [`client::ServiceClient`] and the
//! normalization helpers in [`normalize`].
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy shared by every driver
//! - [`types`] - Nodes, images, sizes, locations and node states
//! - [`driver`] - The driver contract and create-then-reconcile helper
//! - [`normalize`] - Helpers mapping raw vendor JSON onto entity fields
//! - [`client`] - HTTP connection adapter, auth injection and retry policy
//! - [`config`] - Serializable driver configuration
//! - [`params`] - Query/form parameter builder

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod normalize;
pub mod params;
pub mod types;

// Re-export commonly used types
pub use driver::{reconcile_node, CreateNodeOptions, NodeDriver};
pub use error::{Error, Result};
pub use types::{DriverRef, Extra, Node, NodeImage, NodeLocation, NodeSize, NodeState, Provider};
