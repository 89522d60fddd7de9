//! Event dispatch: bounded queue in, subscriber fan-out.
//!
//! The core task pushes each burst into a bounded FIFO queue; a
//! dispatcher task drains it, serializes each event once, and fans the
//! frame out to every subscriber. Subscribers register under their own
//! lock so new connections never block matching. A subscriber whose
//! buffer is full (slow consumer) or whose connection is gone is
//! dropped silently.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error};
use types::events::ExchangeEvent;

/// Depth of the core -> dispatcher queue.
pub const EVENT_QUEUE_DEPTH: usize = 1024;

/// Per-subscriber frame buffer; filling it counts as a failed send.
pub const SUBSCRIBER_BUFFER: usize = 256;

/// Registry of live event-stream subscribers.
#[derive(Debug)]
pub struct SubscriberRegistry {
    senders: Mutex<Vec<mpsc::Sender<String>>>,
    buffer: usize,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::with_buffer(SUBSCRIBER_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
            buffer,
        }
    }

    /// Register a new subscriber and return its frame receiver.
    pub fn subscribe(&self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.lock_senders().push(tx);
        rx
    }

    /// Fan one serialized frame out to every live subscriber, dropping
    /// the ones that fail.
    pub fn broadcast(&self, frame: &str) {
        let mut senders = self.lock_senders();
        let before = senders.len();
        senders.retain(|tx| tx.try_send(frame.to_string()).is_ok());
        let dropped = before - senders.len();
        if dropped > 0 {
            debug!(dropped, "dropped unresponsive event subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_senders().len()
    }

    fn lock_senders(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::Sender<String>>> {
        self.senders.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain the event queue and fan out until the core drops its sender.
pub async fn run_dispatcher(
    mut events: mpsc::Receiver<ExchangeEvent>,
    subscribers: Arc<SubscriberRegistry>,
) {
    while let Some(event) = events.recv().await {
        match serde_json::to_string(&event) {
            Ok(frame) => subscribers.broadcast(&frame),
            Err(err) => error!(%err, kind = event.kind(), "failed to serialize event"),
        }
    }
    debug!("event dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::TraderId;

    fn sample_event() -> ExchangeEvent {
        ExchangeEvent::SessionStart {
            round: 1,
            duration_seconds: 60,
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers() {
        let registry = SubscriberRegistry::new();
        let mut rx1 = registry.subscribe();
        let mut rx2 = registry.subscribe();

        registry.broadcast("{\"type\":\"session_start\"}");
        assert_eq!(rx1.recv().await.unwrap(), "{\"type\":\"session_start\"}");
        assert_eq!(rx2.recv().await.unwrap(), "{\"type\":\"session_start\"}");
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped() {
        let registry = SubscriberRegistry::with_buffer(1);
        let _rx_slow = registry.subscribe();
        assert_eq!(registry.subscriber_count(), 1);

        // First frame fills the buffer, second one overflows it.
        registry.broadcast("frame-1");
        registry.broadcast("frame-2");
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_dropped() {
        let registry = SubscriberRegistry::new();
        let rx = registry.subscribe();
        drop(rx);

        registry.broadcast("frame");
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatcher_preserves_enqueue_order() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut rx = registry.subscribe();
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let dispatcher = tokio::spawn(run_dispatcher(events_rx, registry.clone()));

        events_tx.send(sample_event()).await.unwrap();
        events_tx
            .send(ExchangeEvent::Liquidation {
                trader_id: TraderId::from("trader_1"),
                reason: types::events::LiquidationReason::MaintenanceMarginBreach,
                qty: 1,
                side: types::order::Side::Sell,
                timestamp: 1,
            })
            .await
            .unwrap();
        drop(events_tx);
        dispatcher.await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.contains("session_start"));
        assert!(second.contains("liquidation"));
    }
}
