//! Entity registry.
//!
//! Four collections keyed by entity identifier, one per [`EntityKind`]. Each
//! collection keeps insertion order, which is the order discovery payloads are
//! published and setter topics subscribed. Identifiers are unique within a
//! collection only.

use heapless::Vec;

use crate::config::{Label, MAX_ENTITIES, Topic, label};
use crate::discovery::entity::{
    ControlEntity, Discoverable, EntityKind, FactDiagnostic, MeasuredDiagnostic, SensorEntity,
};
use crate::error::Error;

/// One collection: `(id, entity)` pairs in insertion order.
pub type Collection<E> = Vec<(Label, E), MAX_ENTITIES>;

/// All hub-visible entities of the device.
///
/// # Example
///
/// ```ignore
/// let mut registry = Registry::new();
/// registry.add_control("refreshrate", ControlEntity::new("number"))?;
/// registry.add_fact_diagnostic("wifi_ip", FactDiagnostic::new())?;
///
/// for topic in registry.resolve_subscriptions(device_id) {
///     broker.subscribe(&topic).await?;
/// }
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    sensors: Collection<SensorEntity>,
    controls: Collection<ControlEntity>,
    measured: Collection<MeasuredDiagnostic>,
    facts: Collection<FactDiagnostic>,
}

fn insert<E>(collection: &mut Collection<E>, id: &str, entity: E) -> Result<(), Error> {
    if collection.iter().any(|(key, _)| key == id) {
        return Err(Error::DuplicateEntity);
    }
    collection
        .push((label(id), entity))
        .map_err(|_| Error::RegistryFull)
}

fn mark<E: Discoverable>(collection: &mut Collection<E>, id: &str) -> bool {
    match collection.iter_mut().find(|(key, _)| key == id) {
        Some((_, entity)) => {
            entity.mark_published();
            true
        }
        None => false,
    }
}

fn pending<E: Discoverable>(collection: &Collection<E>) -> usize {
    collection.iter().filter(|(_, e)| !e.is_published()).count()
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sensor(&mut self, id: &str, sensor: SensorEntity) -> Result<(), Error> {
        insert(&mut self.sensors, id, sensor)
    }

    pub fn add_control(&mut self, id: &str, control: ControlEntity) -> Result<(), Error> {
        insert(&mut self.controls, id, control)
    }

    pub fn add_measured_diagnostic(
        &mut self,
        id: &str,
        diagnostic: MeasuredDiagnostic,
    ) -> Result<(), Error> {
        insert(&mut self.measured, id, diagnostic)
    }

    pub fn add_fact_diagnostic(
        &mut self,
        id: &str,
        diagnostic: FactDiagnostic,
    ) -> Result<(), Error> {
        insert(&mut self.facts, id, diagnostic)
    }

    pub fn sensors(&self) -> impl Iterator<Item = (&str, &SensorEntity)> {
        self.sensors.iter().map(|(id, e)| (id.as_str(), e))
    }

    pub fn controls(&self) -> impl Iterator<Item = (&str, &ControlEntity)> {
        self.controls.iter().map(|(id, e)| (id.as_str(), e))
    }

    pub fn measured_diagnostics(&self) -> impl Iterator<Item = (&str, &MeasuredDiagnostic)> {
        self.measured.iter().map(|(id, e)| (id.as_str(), e))
    }

    pub fn fact_diagnostics(&self) -> impl Iterator<Item = (&str, &FactDiagnostic)> {
        self.facts.iter().map(|(id, e)| (id.as_str(), e))
    }

    pub fn control(&self, id: &str) -> Option<&ControlEntity> {
        self.controls
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, control)| control)
    }

    /// The control whose resolved setter topic equals `topic`.
    pub fn control_for_topic(&self, topic: &str) -> Option<(&str, &ControlEntity)> {
        self.controls
            .iter()
            .find(|(_, control)| {
                control
                    .resolved_set_topic()
                    .is_some_and(|set| set.as_str() == topic)
            })
            .map(|(id, control)| (id.as_str(), control))
    }

    pub fn has_sensors(&self) -> bool {
        !self.sensors.is_empty()
    }

    /// Mark the entity `id` of `kind` as published. Returns `false` if no such
    /// entity exists.
    pub fn mark_published(&mut self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Sensor => mark(&mut self.sensors, id),
            EntityKind::Control => mark(&mut self.controls, id),
            EntityKind::MeasuredDiagnostic => mark(&mut self.measured, id),
            EntityKind::FactDiagnostic => mark(&mut self.facts, id),
        }
    }

    /// Number of entities whose discovery message has not been accepted yet.
    pub fn pending_count(&self) -> usize {
        pending(&self.sensors)
            + pending(&self.controls)
            + pending(&self.measured)
            + pending(&self.facts)
    }

    /// Memoize every control's default getter and setter topics and return
    /// the setter topics in insertion order.
    pub fn resolve_subscriptions(&mut self, device_id: &str) -> Vec<Topic, MAX_ENTITIES> {
        let mut topics = Vec::new();
        for (id, control) in self.controls.iter_mut() {
            control.resolve_topics(device_id, id);
            let _ = topics.push(control.setter_topic(device_id, id));
        }
        topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_are_rejected_per_collection() {
        let mut registry = Registry::new();
        registry
            .add_sensor("temperature", SensorEntity::new("temperature"))
            .unwrap();
        assert_eq!(
            registry.add_sensor("temperature", SensorEntity::new("temperature")),
            Err(Error::DuplicateEntity)
        );
        // Same id in another collection is fine.
        registry
            .add_fact_diagnostic("temperature", FactDiagnostic::new())
            .unwrap();
    }

    #[test]
    fn full_collection_is_reported() {
        let mut registry = Registry::new();
        let ids = ["a", "b", "c", "d", "e", "f", "g", "h"];
        for id in ids {
            registry
                .add_fact_diagnostic(id, FactDiagnostic::new())
                .unwrap();
        }
        assert_eq!(
            registry.add_fact_diagnostic("i", FactDiagnostic::new()),
            Err(Error::RegistryFull)
        );
    }

    #[test]
    fn subscriptions_follow_insertion_order_and_resolve_topics() {
        let mut registry = Registry::new();
        registry
            .add_control("refreshrate", ControlEntity::new("number"))
            .unwrap();
        registry
            .add_control("chime", ControlEntity::new("siren"))
            .unwrap();

        assert!(
            registry
                .control_for_topic("homeassistant/siren/dev/chime/set")
                .is_none()
        );

        let topics = registry.resolve_subscriptions("dev");
        let topics: std::vec::Vec<&str> = topics.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            topics,
            [
                "homeassistant/number/dev/refreshrate/set",
                "homeassistant/siren/dev/chime/set",
            ]
        );

        let (id, _) = registry
            .control_for_topic("homeassistant/siren/dev/chime/set")
            .unwrap();
        assert_eq!(id, "chime");
        assert_eq!(
            registry
                .control("chime")
                .and_then(|c| c.resolved_get_topic())
                .map(|t| t.as_str()),
            Some("homeassistant/siren/dev/chime/get")
        );
    }

    #[test]
    fn marking_counts_down_pending() {
        let mut registry = Registry::new();
        registry
            .add_sensor("temperature", SensorEntity::new("temperature"))
            .unwrap();
        registry
            .add_measured_diagnostic("wifi_rssi", MeasuredDiagnostic::new())
            .unwrap();
        assert_eq!(registry.pending_count(), 2);

        assert!(registry.mark_published(EntityKind::Sensor, "temperature"));
        assert!(!registry.mark_published(EntityKind::Sensor, "wifi_rssi"));
        assert_eq!(registry.pending_count(), 1);

        assert!(registry.mark_published(EntityKind::MeasuredDiagnostic, "wifi_rssi"));
        assert_eq!(registry.pending_count(), 0);
    }
}
