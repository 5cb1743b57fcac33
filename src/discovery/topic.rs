//! Topic builders.
//!
//! Every topic follows `homeassistant/<device_type>/<device_id>[/<entity>]/<role>`.
//! The builders are pure: identical arguments always produce identical topics.
//!
//! Segments are expected to be [`Label`](crate::config::Label)-sized, which keeps
//! the longest possible topic within [`MAX_TOPIC_LEN`](crate::config::MAX_TOPIC_LEN).
//! Oversized segments are the caller's responsibility and are truncated.

use core::fmt;

use crate::config::{TOPIC_BASE, Topic};

/// Final segment of a topic, describing what flows over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// `online`/`offline`, also the last-will topic.
    Availability,
    /// Sensor readings.
    State,
    /// Diagnostic facts and measurements.
    Diagnostics,
    /// Retained discovery payload of one entity.
    Config,
    /// Hub to device: control commands.
    Set,
    /// Device to hub: reflected control state.
    Get,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Availability => "availability",
            Role::State => "state",
            Role::Diagnostics => "diagnostics",
            Role::Config => "config",
            Role::Set => "set",
            Role::Get => "get",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build `<base>/<device_type>/<device_id>[/<entity>]/<role>`.
pub fn build_topic(device_type: &str, device_id: &str, entity: Option<&str>, role: Role) -> Topic {
    match entity {
        Some(entity) => join(&[device_type, device_id, entity, role.as_str()]),
        None => join(&[device_type, device_id, role.as_str()]),
    }
}

/// Join `segments` under the topic base. Used for explicit topic overrides.
pub fn join(segments: &[&str]) -> Topic {
    let mut topic = Topic::new();
    let _ = topic.push_str(TOPIC_BASE);
    for segment in segments {
        let _ = topic.push('/');
        let _ = topic.push_str(segment);
    }
    topic
}

/// `homeassistant/siren/featheresp32s2/availability`
pub fn availability_topic(device_type: &str, device_id: &str) -> Topic {
    build_topic(device_type, device_id, None, Role::Availability)
}

/// `homeassistant/siren/featheresp32s2/state`
pub fn state_topic(device_type: &str, device_id: &str) -> Topic {
    build_topic(device_type, device_id, None, Role::State)
}

/// `homeassistant/siren/featheresp32s2/diagnostics`
pub fn diagnostics_topic(device_type: &str, device_id: &str) -> Topic {
    build_topic(device_type, device_id, None, Role::Diagnostics)
}

/// `homeassistant/sensor/featheresp32s2/temperature/config`
pub fn discovery_topic(device_type: &str, device_id: &str, entity_id: &str) -> Topic {
    build_topic(device_type, device_id, Some(entity_id), Role::Config)
}

/// `homeassistant/number/featheresp32s2/refreshrate/set`
pub fn setter_topic(device_type: &str, device_id: &str, control_id: &str) -> Topic {
    build_topic(device_type, device_id, Some(control_id), Role::Set)
}

/// `homeassistant/number/featheresp32s2/refreshrate/get`
pub fn getter_topic(device_type: &str, device_id: &str, control_id: &str) -> Topic {
    build_topic(device_type, device_id, Some(control_id), Role::Get)
}

/// The device-wide topics shared by all entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    pub availability: Topic,
    pub state: Topic,
    pub diagnostics: Topic,
}

impl DeviceTopics {
    pub fn new(device_type: &str, device_id: &str) -> Self {
        Self {
            availability: availability_topic(device_type, device_id),
            state: state_topic(device_type, device_id),
            diagnostics: diagnostics_topic(device_type, device_id),
        }
    }
}
