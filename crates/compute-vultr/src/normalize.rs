//! Mapping of Vultr records onto the shared entity model.
//!
//! Vultr answers list calls with objects keyed by identifier and encodes most numbers as
//! strings; both are absorbed by [`compute_core::normalize`].

use compute_core::normalize::{records, Record};
use compute_core::{
    DriverRef, Error, Extra, Node, NodeImage, NodeLocation, NodeSize, NodeState, Result,
};
use serde_json::Value;

const NODE: &str = "server";
const IMAGE: &str = "os";
const SIZE: &str = "plan";
const LOCATION: &str = "region";

/// Node extras that must be present on every server record.
const NODE_REQUIRED_EXTRA: &[&str] = &["v6_network", "v6_network_size", "v6_main_ip"];

/// Node extras copied when present.
const NODE_OPTIONAL_EXTRA: &[&str] = &[
    "DCID",
    "VPSPLANID",
    "os",
    "location",
    "date_created",
    "cost_per_month",
];

/// Derive a node state from Vultr's `status` and `power_status`.
///
/// `pending` wins regardless of power status; an active server is running only when powered
/// on and stopped otherwise.
#[must_use]
pub fn node_state(status: &str, power_status: &str) -> NodeState {
    match (status, power_status) {
        ("pending", _) => NodeState::Pending,
        ("active", "running") => NodeState::Running,
        ("active", _) => NodeState::Stopped,
        _ => NodeState::Unknown,
    }
}

/// Map one server record.
///
/// # Errors
///
/// Fails if an identity, state, address or IPv6 field is missing.
pub fn to_node(record: &Record<'_>, driver: &DriverRef) -> Result<Node> {
    let state = node_state(
        &record.string("status")?,
        &record.string("power_status")?,
    );

    let mut extra = Extra::new();
    for key in NODE_REQUIRED_EXTRA {
        extra.insert((*key).to_string(), record.value(key)?.clone());
    }
    copy_present(record, NODE_OPTIONAL_EXTRA, &mut extra);

    let private_ips = record.opt_string("internal_ip")?.map(|ip| vec![ip]);

    Ok(Node {
        id: record.id("SUBID")?,
        name: record.string("label")?,
        state,
        public_ips: vec![record.string("main_ip")?],
        private_ips,
        extra,
        driver: driver.clone(),
    })
}

/// Map one operating system record.
///
/// # Errors
///
/// Fails if `OSID` or `name` is missing.
pub fn to_image(record: &Record<'_>, driver: &DriverRef) -> Result<NodeImage> {
    let mut extra = Extra::new();
    copy_present(record, &["arch", "family", "windows"], &mut extra);

    Ok(NodeImage {
        id: record.id("OSID")?,
        name: record.string("name")?,
        extra,
        driver: driver.clone(),
    })
}

/// Map one plan record.
///
/// # Errors
///
/// Fails on missing fields or when `ram`/`disk` are not integers or
/// `bandwidth`/`price_per_month` are not numbers.
pub fn to_size(record: &Record<'_>, driver: &DriverRef) -> Result<NodeSize> {
    let mut extra = Extra::new();
    extra.insert("windows".into(), record.value("windows")?.clone());
    extra.insert("vcpu_count".into(), record.value("vcpu_count")?.clone());
    copy_present(record, &["available_locations"], &mut extra);

    Ok(NodeSize {
        id: record.id("VPSPLANID")?,
        name: record.string("name")?,
        ram: record.integer("ram")?,
        disk: record.integer("disk")?,
        bandwidth: record.float("bandwidth")?,
        price: record.float("price_per_month")?,
        extra,
        driver: driver.clone(),
    })
}

/// Map one region record.
///
/// # Errors
///
/// Fails if `DCID`, `name` or `country` is missing.
pub fn to_location(record: &Record<'_>, driver: &DriverRef) -> Result<NodeLocation> {
    Ok(NodeLocation {
        id: record.id("DCID")?,
        name: record.string("name")?,
        country: record.string("country")?,
        driver: driver.clone(),
    })
}

/// Normalize a `server/list` body.
///
/// # Errors
///
/// Fails on the first record that cannot be mapped.
pub fn nodes(body: Value, driver: &DriverRef) -> Result<Vec<Node>> {
    map_all(body, NODE, driver, to_node)
}

/// Normalize an `os/list` body.
///
/// # Errors
///
/// Fails on the first record that cannot be mapped.
pub fn images(body: Value, driver: &DriverRef) -> Result<Vec<NodeImage>> {
    map_all(body, IMAGE, driver, to_image)
}

/// Normalize a `plans/list` body.
///
/// # Errors
///
/// Fails on the first record that cannot be mapped.
pub fn sizes(body: Value, driver: &DriverRef) -> Result<Vec<NodeSize>> {
    map_all(body, SIZE, driver, to_size)
}

/// Normalize a `regions/list` body.
///
/// # Errors
///
/// Fails on the first record that cannot be mapped.
pub fn locations(body: Value, driver: &DriverRef) -> Result<Vec<NodeLocation>> {
    map_all(body, LOCATION, driver, to_location)
}

/// Extract the `SUBID` a `server/create` call returns.
///
/// # Errors
///
/// Fails if the body is not an object carrying `SUBID`.
pub fn created_id(body: &Value) -> Result<String> {
    let fields = body.as_object().ok_or_else(|| {
        Error::Normalization(format!("server create response is not an object: {body}"))
    })?;
    Record::new(NODE, fields).id("SUBID")
}

fn map_all<T>(
    body: Value,
    kind: &'static str,
    driver: &DriverRef,
    map: fn(&Record<'_>, &DriverRef) -> Result<T>,
) -> Result<Vec<T>> {
    records(body, kind)?
        .iter()
        .map(|fields| map(&Record::new(kind, fields), driver))
        .collect()
}

fn copy_present(record: &Record<'_>, keys: &[&str], extra: &mut Extra) {
    for key in keys {
        if let Some(value) = record.get(key) {
            extra.insert((*key).to_string(), value.clone());
        }
    }
}
