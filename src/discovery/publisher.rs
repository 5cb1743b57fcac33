//! Idempotent discovery publishing.
//!
//! A pass walks every collection in a fixed order (sensors, controls, measured
//! diagnostics, fact diagnostics) and publishes the retained discovery
//! message of each entity not yet accepted by the broker. Accepted entities are
//! marked and skipped by later passes, so a pass interrupted by a failure picks
//! up where it stopped on the next attempt.

use heapless::Vec;

use crate::config::{Label, MAX_ENTITIES, label};
use crate::discovery::entity::{Discoverable, EntityKind};
use crate::discovery::payload::DiscoveryContext;
use crate::discovery::registry::Registry;
use crate::runtime::traits::{Broker, Delivery};

/// Outcome of publishing one collection.
struct Pass {
    kind: EntityKind,
    pending: usize,
    accepted: Vec<Label, MAX_ENTITIES>,
}

impl Pass {
    /// Mark the accepted entities in `registry` and return the pending count.
    fn settle(self, registry: &mut Registry) -> usize {
        for id in &self.accepted {
            registry.mark_published(self.kind, id);
        }
        self.pending
    }
}

async fn publish_collection<'r, E, B>(
    entities: impl Iterator<Item = (&'r str, &'r E)>,
    broker: &mut B,
    ctx: &DiscoveryContext<'_>,
) -> Pass
where
    E: Discoverable + 'r,
    B: Broker,
{
    let mut pass = Pass {
        kind: E::KIND,
        pending: 0,
        accepted: Vec::new(),
    };
    for (id, entity) in entities {
        if entity.is_published() {
            continue;
        }

        let kind = E::KIND.as_str();
        let message = match entity.discovery_message(id, ctx) {
            Ok(message) => message,
            Err(e) => {
                error!("discovery payload for {} {} failed: {:?}", kind, id, e);
                pass.pending += 1;
                continue;
            }
        };

        match broker
            .publish(
                &message.topic,
                message.payload.as_bytes(),
                Delivery::RETAINED,
            )
            .await
        {
            Ok(()) => {
                debug!("published discovery for {} {}", kind, id);
                // Same capacity as the collection.
                let _ = pass.accepted.push(label(id));
            }
            Err(_) => {
                warn!("discovery publish for {} {} failed", kind, id);
                pass.pending += 1;
            }
        }
    }
    pass
}

/// Publish the discovery message of every unpublished entity.
///
/// Returns the number of entities still unpublished after the pass; zero
/// means discovery is complete. Failures are logged and never propagated.
pub async fn publish_discovery<B: Broker>(
    registry: &mut Registry,
    broker: &mut B,
    ctx: &DiscoveryContext<'_>,
) -> usize {
    let pass = publish_collection(registry.sensors(), broker, ctx).await;
    let mut pending = pass.settle(registry);
    let pass = publish_collection(registry.controls(), broker, ctx).await;
    pending += pass.settle(registry);
    let pass = publish_collection(registry.measured_diagnostics(), broker, ctx).await;
    pending += pass.settle(registry);
    let pass = publish_collection(registry.fact_diagnostics(), broker, ctx).await;
    pending += pass.settle(registry);
    pending
}
