//! Home Assistant discovery.
//!
//! Entity descriptions live in a [`Registry`]. The topic and payload builders
//! turn a description plus the shared [`DiscoveryContext`] into a
//! [`DiscoveryMessage`], and [`publish_discovery`] drives those messages to the
//! broker until every entity has been accepted once.
//!
//! # Topics
//!
//! ```text
//! homeassistant/<device_type>/<device_id>/availability
//! homeassistant/<device_type>/<device_id>/state
//! homeassistant/<device_type>/<device_id>/diagnostics
//! homeassistant/<device_type>/<device_id>/<entity_id>/config
//! homeassistant/<device_type>/<device_id>/<control_id>/set
//! homeassistant/<device_type>/<device_id>/<control_id>/get
//! ```

pub mod entity;
pub mod payload;
pub mod publisher;
pub mod registry;
pub mod topic;

pub use entity::{
    ControlEntity, CustomSettings, Discoverable, EntityKind, FactDiagnostic, MeasuredDiagnostic,
    SensorEntity,
};
pub use payload::{DiscoveryContext, DiscoveryMessage};
pub use publisher::publish_discovery;
pub use registry::Registry;
pub use topic::{DeviceTopics, Role};
