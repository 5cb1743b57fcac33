//! Entity descriptions.
//!
//! Four kinds of hub-visible entities are described here. Their identifier is
//! not part of the description: it is the key under which the description is
//! stored in the [`Registry`](super::registry::Registry).

use heapless::String;

use crate::config::{Label, MAX_CUSTOM_SETTINGS_LEN, Topic, label};
use crate::discovery::payload::{self, DiscoveryContext, DiscoveryMessage};
use crate::discovery::topic;
use crate::error::Error;

/// Pre-escaped JSON `"key": value` pairs appended to a control's discovery payload.
pub type CustomSettings = String<MAX_CUSTOM_SETTINGS_LEN>;

/// The four entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EntityKind {
    Sensor,
    Control,
    MeasuredDiagnostic,
    FactDiagnostic,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Sensor => "sensor",
            EntityKind::Control => "control",
            EntityKind::MeasuredDiagnostic => "measured diagnostic",
            EntityKind::FactDiagnostic => "fact diagnostic",
        }
    }
}

/// Common behavior of everything that is announced to the hub.
pub trait Discoverable {
    const KIND: EntityKind;

    /// Whether the discovery message has been accepted by the broker.
    fn is_published(&self) -> bool;

    /// Record that the broker accepted the discovery message. Never reverts.
    fn mark_published(&mut self);

    /// Build the discovery message for the entity stored under `id`.
    fn discovery_message(
        &self,
        id: &str,
        ctx: &DiscoveryContext<'_>,
    ) -> Result<DiscoveryMessage, Error>;
}

/// A plain sensor reporting one attribute of the shared state document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorEntity {
    pub device_type: Label,
    pub device_class: Option<Label>,
    pub icon: Label,
    pub unit: Option<Label>,
    /// Adds `json_attributes_*` keys reading `<id>_details` from the state document.
    pub has_sub_attributes: bool,
    published: bool,
}

impl SensorEntity {
    /// A `sensor` entity of the given device class.
    pub fn new(device_class: &str) -> Self {
        Self {
            device_type: label("sensor"),
            device_class: Some(label(device_class)),
            icon: Label::new(),
            unit: None,
            has_sub_attributes: false,
            published: false,
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = label(icon);
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(label(unit));
        self
    }

    pub fn with_sub_attributes(mut self) -> Self {
        self.has_sub_attributes = true;
        self
    }
}

impl Discoverable for SensorEntity {
    const KIND: EntityKind = EntityKind::Sensor;

    fn is_published(&self) -> bool {
        self.published
    }

    fn mark_published(&mut self) {
        self.published = true;
    }

    fn discovery_message(
        &self,
        id: &str,
        ctx: &DiscoveryContext<'_>,
    ) -> Result<DiscoveryMessage, Error> {
        Ok(DiscoveryMessage {
            topic: topic::discovery_topic(&self.device_type, ctx.device_id(), id),
            payload: payload::sensor_payload(ctx, id, self)?,
        })
    }
}

/// A bidirectional control: the hub writes its setter topic and the device
/// reflects the resulting state on its getter topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEntity {
    pub device_type: Label,
    pub icon: Label,
    pub unit: Option<Label>,
    pub custom_settings: Option<CustomSettings>,
    set_topic: Option<Topic>,
    get_topic: Option<Topic>,
    published: bool,
}

impl ControlEntity {
    pub fn new(device_type: &str) -> Self {
        Self {
            device_type: label(device_type),
            icon: Label::new(),
            unit: None,
            custom_settings: None,
            set_topic: None,
            get_topic: None,
            published: false,
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = label(icon);
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(label(unit));
        self
    }

    /// Settings fragment such as `"min": 1, "max": 60`. Must already be valid,
    /// escaped JSON; it is appended to the discovery payload as-is.
    ///
    /// Fails with [`Error::PayloadTooLarge`] if the fragment does not fit.
    pub fn with_custom_settings(mut self, fragment: &str) -> Result<Self, Error> {
        let mut settings = CustomSettings::new();
        settings
            .push_str(fragment)
            .map_err(|_| Error::PayloadTooLarge)?;
        self.custom_settings = Some(settings);
        Ok(self)
    }

    /// Replace the default `<...>/<id>/set` topic.
    pub fn with_set_topic(mut self, topic: Topic) -> Self {
        self.set_topic = Some(topic);
        self
    }

    /// Replace the default `<...>/<id>/get` topic.
    pub fn with_get_topic(mut self, topic: Topic) -> Self {
        self.get_topic = Some(topic);
        self
    }

    /// The setter topic: the override if present, the default otherwise.
    pub fn setter_topic(&self, device_id: &str, id: &str) -> Topic {
        match &self.set_topic {
            Some(topic) => topic.clone(),
            None => topic::setter_topic(&self.device_type, device_id, id),
        }
    }

    /// The getter topic: the override if present, the default otherwise.
    pub fn getter_topic(&self, device_id: &str, id: &str) -> Topic {
        match &self.get_topic {
            Some(topic) => topic.clone(),
            None => topic::getter_topic(&self.device_type, device_id, id),
        }
    }

    /// The setter topic as resolved so far; `None` until resolved or overridden.
    pub fn resolved_set_topic(&self) -> Option<&Topic> {
        self.set_topic.as_ref()
    }

    /// The getter topic as resolved so far; `None` until resolved or overridden.
    pub fn resolved_get_topic(&self) -> Option<&Topic> {
        self.get_topic.as_ref()
    }

    /// Memoize the default getter and setter topics where no override exists.
    pub(crate) fn resolve_topics(&mut self, device_id: &str, id: &str) {
        if self.set_topic.is_none() {
            self.set_topic = Some(topic::setter_topic(&self.device_type, device_id, id));
        }
        if self.get_topic.is_none() {
            self.get_topic = Some(topic::getter_topic(&self.device_type, device_id, id));
        }
    }
}

impl Discoverable for ControlEntity {
    const KIND: EntityKind = EntityKind::Control;

    fn is_published(&self) -> bool {
        self.published
    }

    fn mark_published(&mut self) {
        self.published = true;
    }

    fn discovery_message(
        &self,
        id: &str,
        ctx: &DiscoveryContext<'_>,
    ) -> Result<DiscoveryMessage, Error> {
        Ok(DiscoveryMessage {
            topic: topic::discovery_topic(&self.device_type, ctx.device_id(), id),
            payload: payload::control_payload(ctx, id, self)?,
        })
    }
}

/// A diagnostic with a measurable value, such as signal strength.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasuredDiagnostic {
    pub device_type: Label,
    pub device_class: Option<Label>,
    /// `measurement`, `total` or `total_increasing`.
    pub state_class: Label,
    pub icon: Label,
    pub unit: Option<Label>,
    published: bool,
}

impl MeasuredDiagnostic {
    pub fn new() -> Self {
        Self {
            device_type: label("sensor"),
            device_class: None,
            state_class: label("measurement"),
            icon: Label::new(),
            unit: None,
            published: false,
        }
    }

    pub fn with_device_class(mut self, device_class: &str) -> Self {
        self.device_class = Some(label(device_class));
        self
    }

    pub fn with_state_class(mut self, state_class: &str) -> Self {
        self.state_class = label(state_class);
        self
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = label(icon);
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(label(unit));
        self
    }
}

impl Default for MeasuredDiagnostic {
    fn default() -> Self {
        Self::new()
    }
}

impl Discoverable for MeasuredDiagnostic {
    const KIND: EntityKind = EntityKind::MeasuredDiagnostic;

    fn is_published(&self) -> bool {
        self.published
    }

    fn mark_published(&mut self) {
        self.published = true;
    }

    fn discovery_message(
        &self,
        id: &str,
        ctx: &DiscoveryContext<'_>,
    ) -> Result<DiscoveryMessage, Error> {
        Ok(DiscoveryMessage {
            topic: topic::discovery_topic(&self.device_type, ctx.device_id(), id),
            payload: payload::measured_diagnostic_payload(ctx, id, self)?,
        })
    }
}

/// A diagnostic fact, such as the IP address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactDiagnostic {
    pub device_type: Label,
    pub icon: Label,
    published: bool,
}

impl FactDiagnostic {
    pub fn new() -> Self {
        Self {
            device_type: label("sensor"),
            icon: Label::new(),
            published: false,
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = label(icon);
        self
    }
}

impl Default for FactDiagnostic {
    fn default() -> Self {
        Self::new()
    }
}

impl Discoverable for FactDiagnostic {
    const KIND: EntityKind = EntityKind::FactDiagnostic;

    fn is_published(&self) -> bool {
        self.published
    }

    fn mark_published(&mut self) {
        self.published = true;
    }

    fn discovery_message(
        &self,
        id: &str,
        ctx: &DiscoveryContext<'_>,
    ) -> Result<DiscoveryMessage, Error> {
        Ok(DiscoveryMessage {
            topic: topic::discovery_topic(&self.device_type, ctx.device_id(), id),
            payload: payload::fact_diagnostic_payload(ctx, id, self)?,
        })
    }
}
