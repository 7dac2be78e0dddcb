use crate::common::EventEnvelope;
use crate::domains::dispatch::Notifier;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// In-process fan-out for dashboards and tests. Publishing with no
/// subscribers is not an error.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<EventEnvelope>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn publish(&self, event: EventEnvelope) -> Result<(), String> {
        let _ = self.sender.send(event);
        Ok(())
    }
}

pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn publish(&self, _event: EventEnvelope) -> Result<(), String> {
        Ok(())
    }
}
