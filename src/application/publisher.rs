use crate::common::EventEnvelope;
use crate::domains::dispatch::Notifier;
use crate::domains::logger::DynLogger;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Hands envelopes to a background task that forwards them to a `Notifier`.
/// `publish` never waits: a full queue drops the envelope with a warning.
/// The drain task ends once every clone of the publisher is dropped.
#[derive(Clone)]
pub struct EventPublisher {
    sender: mpsc::Sender<EventEnvelope>,
    logger: DynLogger,
}

impl EventPublisher {
    /// Must be called from within a Tokio runtime.
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize, logger: DynLogger) -> Self {
        let (sender, mut receiver) = mpsc::channel::<EventEnvelope>(capacity.max(1));

        let drain_logger = logger.clone();
        tokio::spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                let event_type = envelope.event_type.clone();
                if let Err(e) = notifier.publish(envelope).await {
                    drain_logger.warn(&format!("Dropped {} notification: {}", event_type, e));
                }
            }
        });

        Self { sender, logger }
    }

    pub fn publish(&self, envelope: EventEnvelope) {
        match self.sender.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(envelope)) => self.logger.warn(&format!(
                "Notification queue full; dropped {} for {}",
                envelope.event_type, envelope.aggregate_id
            )),
            Err(TrySendError::Closed(envelope)) => self
                .logger
                .warn(&format!("Notifier is gone; dropped {}", envelope.event_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::EventMetadata;
    use crate::domains::agent::AgentEvent;
    use crate::domains::logger::DomainLogger;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    struct HangingNotifier;

    #[async_trait]
    impl Notifier for HangingNotifier {
        async fn publish(&self, _event: EventEnvelope) -> Result<(), String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Captured(Mutex<Vec<String>>);

    impl DomainLogger for Captured {
        fn info(&self, _msg: &str) {}
        fn warn(&self, msg: &str) {
            self.0.lock().unwrap().push(msg.to_string());
        }
        fn error(&self, _msg: &str) {}
    }

    fn envelope(agent_id: &str) -> EventEnvelope {
        let event = AgentEvent::Started {
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
        };
        EventEnvelope::new(&event, "Agent", EventMetadata::from_source("test")).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_instead_of_waiting() {
        let logs = Arc::new(Captured::default());
        let publisher = EventPublisher::spawn(Arc::new(HangingNotifier), 2, logs.clone());

        let started = tokio::time::Instant::now();
        for i in 0..10 {
            publisher.publish(envelope(&format!("a-{}", i)));
        }
        assert_eq!(started.elapsed(), Duration::ZERO);

        let warnings = logs.0.lock().unwrap().clone();
        assert!(!warnings.is_empty());
        assert!(warnings.iter().all(|w| w.starts_with("Notification queue full")));
    }
}
