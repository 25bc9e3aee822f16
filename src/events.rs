//! Closed-topic event bus decoupling the engine from its consumers.
//!
//! Consumers (presence publishers, a future UI) only ever see these
//! payloads, never internal marker types.

use tokio::sync::broadcast;

use crate::phase::SessionPhase;

const CHANNEL_CAPACITY: usize = 32;

/// Events published by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A game process lifetime began.
    SessionStarted,
    /// The tracked game process disappeared.
    SessionEnded,
    /// The phase genuinely changed; emitted at most once per transition.
    PhaseChanged(SessionPhase),
}

/// Cheap-to-clone handle over a broadcast channel with a fixed topic set.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Broadcast to all current subscribers. Having none is fine; events are
    /// not queued for subscribers that arrive later.
    pub fn emit(&self, event: EngineEvent) {
        if let Err(dropped) = self.tx.send(event) {
            tracing::trace!(event = ?dropped.0, "engine event had no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_all_subscribers() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(EngineEvent::SessionStarted);

        assert!(matches!(first.recv().await, Ok(EngineEvent::SessionStarted)));
        assert!(matches!(second.recv().await, Ok(EngineEvent::SessionStarted)));
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit(EngineEvent::SessionEnded);
    }
}
