//! Vultr compute driver.
//!
//! Implements [`compute_core::NodeDriver`] against the Vultr v1 REST API.
//!
//! ```no_run
//! use compute_core::NodeDriver;
//! use compute_vultr::VultrNodeDriver;
//!
//! # async fn run() -> compute_core::Result<()> {
//! let driver = VultrNodeDriver::new("my-api-key")?;
//! for node in driver.list_nodes().await? {
//!     println!("{} {} {}", node.id, node.name, node.state);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod connection;
pub mod driver;
pub mod normalize;

pub use connection::VultrConnection;
pub use driver::{VultrNodeDriver, VultrNodeDriverBuilder};

/// Convenient result alias that reuses the shared compute error type.
pub type Result<T> = compute_core::Result<T>;
