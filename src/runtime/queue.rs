//! Inbound command queue.
//!
//! The broker hands inbound messages to an [`Inbox`] from inside its delivery
//! callback. The inbox only matches the topic against the resolved setter
//! topics and enqueues a [`PendingOperation`]; the command processor drains the
//! queue later, after the callback has returned, where publishing is allowed.

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use heapless::String;

use crate::config::{COMMAND_QUEUE_DEPTH, Label, MAX_COMMAND_LEN, label};
use crate::discovery::registry::Registry;
use crate::runtime::traits::MessageSink;

/// A command received for a control, consumed exactly once by the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Identifier of the control the command targets.
    pub control: Label,
    /// Raw command value.
    pub value: String<MAX_COMMAND_LEN>,
}

impl PendingOperation {
    /// Returns `None` if `value` does not fit the command buffer.
    pub fn new(control: &str, value: &str) -> Option<Self> {
        let mut owned = String::new();
        owned.push_str(value).ok()?;
        Some(Self {
            control: label(control),
            value: owned,
        })
    }
}

/// Bounded FIFO of pending operations.
///
/// The main loop is the only producer and the only consumer, so the channel
/// uses a no-op mutex.
pub struct CommandQueue {
    channel: Channel<NoopRawMutex, PendingOperation, COMMAND_QUEUE_DEPTH>,
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue `op`. Returns `false` if the queue is full.
    pub fn push(&self, op: PendingOperation) -> bool {
        self.channel.try_send(op).is_ok()
    }

    /// Dequeue the oldest operation.
    pub fn pop(&self) -> Option<PendingOperation> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Enqueue `value` for the control `control_id` as if it had arrived on the
    /// control's setter topic. No broker traffic is involved.
    ///
    /// Returns `false` if no such control exists or the operation was dropped.
    pub fn simulate_publish(&self, registry: &Registry, control_id: &str, value: &str) -> bool {
        if registry.control(control_id).is_none() {
            warn!("simulated publish for unknown control {}", control_id);
            return false;
        }
        enqueue(self, control_id, value)
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn enqueue(queue: &CommandQueue, control: &str, value: &str) -> bool {
    let Some(op) = PendingOperation::new(control, value) else {
        warn!(
            "command for {} exceeds {} bytes, dropped",
            control, MAX_COMMAND_LEN
        );
        return false;
    };
    if !queue.push(op) {
        warn!("command queue full, dropped command for {}", control);
        return false;
    }
    debug!("queued command for {}", control);
    true
}

/// The [`MessageSink`] handed to [`Broker::poll`](crate::runtime::traits::Broker::poll).
pub struct Inbox<'a> {
    registry: &'a Registry,
    queue: &'a CommandQueue,
}

impl<'a> Inbox<'a> {
    pub fn new(registry: &'a Registry, queue: &'a CommandQueue) -> Self {
        Self { registry, queue }
    }
}

impl MessageSink for Inbox<'_> {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        let Some((id, _)) = self.registry.control_for_topic(topic) else {
            debug!("ignoring message on {}", topic);
            return;
        };
        let Ok(value) = core::str::from_utf8(payload) else {
            warn!("command for {} is not UTF-8, dropped", id);
            return;
        };
        enqueue(self.queue, id, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::entity::ControlEntity;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        for id in ["a", "b", "c"] {
            registry
                .add_control(id, ControlEntity::new("number"))
                .unwrap();
        }
        registry.resolve_subscriptions("dev");
        registry
    }

    #[test]
    fn messages_on_setter_topics_are_queued_in_order() {
        let registry = registry();
        let queue = CommandQueue::new();
        let mut inbox = Inbox::new(&registry, &queue);

        inbox.on_message("homeassistant/number/dev/a/set", b"1");
        inbox.on_message("homeassistant/number/dev/a/get", b"ignored");
        inbox.on_message("homeassistant/number/dev/b/set", b"2");
        inbox.on_message("homeassistant/number/dev/c/set", b"3");

        let order: std::vec::Vec<_> = core::iter::from_fn(|| queue.pop())
            .map(|op| (op.control.as_str().to_owned(), op.value.as_str().to_owned()))
            .collect();
        assert_eq!(
            order,
            [
                ("a".to_owned(), "1".to_owned()),
                ("b".to_owned(), "2".to_owned()),
                ("c".to_owned(), "3".to_owned()),
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn invalid_or_oversized_payloads_are_dropped() {
        let registry = registry();
        let queue = CommandQueue::new();
        let mut inbox = Inbox::new(&registry, &queue);

        inbox.on_message("homeassistant/number/dev/a/set", &[0xff, 0xfe]);
        let oversized = "x".repeat(MAX_COMMAND_LEN + 1);
        inbox.on_message("homeassistant/number/dev/a/set", oversized.as_bytes());
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_drops_new_commands() {
        let registry = registry();
        let queue = CommandQueue::new();
        for _ in 0..COMMAND_QUEUE_DEPTH {
            assert!(queue.simulate_publish(&registry, "a", "1"));
        }
        assert!(!queue.simulate_publish(&registry, "b", "2"));
        assert_eq!(queue.len(), COMMAND_QUEUE_DEPTH);
    }

    #[test]
    fn simulated_publish_requires_a_known_control() {
        let registry = registry();
        let queue = CommandQueue::new();
        assert!(!queue.simulate_publish(&registry, "nope", "1"));
        assert!(queue.simulate_publish(&registry, "b", "7"));
        assert_eq!(queue.pop().map(|op| op.control), Some(label("b")));
    }
}
