use std::sync::Arc;

use tokio::sync::broadcast;

use courier_types::events::GatewayEvent;

/// Fans lifecycle and message events out to all connected observers.
///
/// Observers are anonymous and interchangeable; every event goes to every
/// observer, so a plain broadcast channel is the whole mechanism.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<GatewayEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Push an event to all connected observers. Dropped silently when no
    /// observer is connected.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    pub fn observer_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut rx1 = dispatcher.subscribe();
        let mut rx2 = dispatcher.subscribe();

        dispatcher.broadcast(GatewayEvent::Connected);

        assert_eq!(rx1.recv().await.unwrap(), GatewayEvent::Connected);
        assert_eq!(rx2.recv().await.unwrap(), GatewayEvent::Connected);
    }

    #[tokio::test]
    async fn broadcast_without_observers_is_a_no_op() {
        let dispatcher = Dispatcher::new();
        dispatcher.broadcast(GatewayEvent::SessionLoggedOut);
        assert_eq!(dispatcher.observer_count(), 0);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let dispatcher = Dispatcher::new();
        dispatcher.broadcast(GatewayEvent::Qr("AAAA".into()));

        let mut rx = dispatcher.subscribe();
        dispatcher.broadcast(GatewayEvent::Connected);
        // Replay of earlier pairing codes is the connection handler's job,
        // not the channel's.
        assert_eq!(rx.recv().await.unwrap(), GatewayEvent::Connected);
    }
}
