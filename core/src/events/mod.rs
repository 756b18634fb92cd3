//! Domain event system.
//!
//! Adapted from a sibling module's `BroadcastEvent` enum-of-enums shape: one
//! outer tagged enum wrapping a per-subsystem inner enum, plus an
//! `EventEmitter` trait so callers never depend on the transport directly.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Connected { guild_id: String, room: String },
    Disconnected { guild_id: String },
    StateChanged { guild_id: String, state: &'static str },
    TrackStarted { guild_id: String, title: String },
    TrackCompleted { guild_id: String, title: String },
    AutoDisconnectArmed { guild_id: String, delay_secs: u64 },
}

#[derive(Debug, Clone)]
pub enum QueueEvent {
    Enqueued { guild_id: String, title: String },
}

#[derive(Debug, Clone)]
pub enum RegistryEvent {
    PlayerCreated { guild_id: String },
    PlayerEvicted { guild_id: String },
}

/// A domain event, timestamped at emission.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    Player(PlayerEvent),
    Queue(QueueEvent),
    Registry(RegistryEvent),
}

#[derive(Debug, Clone)]
pub struct TimestampedEvent {
    pub at_millis: u64,
    pub event: DomainEvent,
}

/// Emits domain events to whatever transport is wired in. Decouples player,
/// queue, and registry logic from the transport (a broadcast channel here,
/// but the trait lets a test double swap in a `Vec`-backed collector).
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

/// Broadcasts every event over a `tokio::sync::broadcast` channel. Lagging
/// subscribers miss events rather than stalling the emitter.
pub struct BroadcastEventBridge {
    sender: broadcast::Sender<TimestampedEvent>,
}

impl BroadcastEventBridge {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimestampedEvent> {
        self.sender.subscribe()
    }
}

impl EventEmitter for BroadcastEventBridge {
    fn emit(&self, event: DomainEvent) {
        let _ = self.sender.send(TimestampedEvent {
            at_millis: now_millis(),
            event,
        });
    }
}

/// No-op emitter for tests and embedders that don't care about events.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: DomainEvent) {}
}

pub fn noop_emitter() -> Arc<dyn EventEmitter> {
    Arc::new(NoopEventEmitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_delivers_to_subscriber() {
        let bridge = BroadcastEventBridge::new(16);
        let mut rx = bridge.subscribe();
        bridge.emit(DomainEvent::Registry(RegistryEvent::PlayerCreated {
            guild_id: "g1".into(),
        }));
        let received = rx.try_recv().unwrap();
        matches!(received.event, DomainEvent::Registry(RegistryEvent::PlayerCreated { .. }));
    }
}
