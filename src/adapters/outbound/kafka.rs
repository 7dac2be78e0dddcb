use crate::common::EventEnvelope;
use crate::config::KafkaConfig;
use crate::domains::dispatch::Notifier;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;

/// Publishes agent and dispatch events to Kafka, keyed by aggregate.
pub struct KafkaNotifier {
    producer: FutureProducer,
    config: KafkaConfig,
}

impl KafkaNotifier {
    pub fn new(config: KafkaConfig) -> Result<Self, String> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("client.id", &config.client_id)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| format!("Failed to create Kafka producer: {}", e))?;

        Ok(Self { producer, config })
    }

    fn topic_for(&self, aggregate_type: &str) -> &str {
        match aggregate_type.to_lowercase().as_str() {
            "agent" => &self.config.topics.agent_events,
            _ => &self.config.topics.dispatch_events,
        }
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn publish(&self, event: EventEnvelope) -> Result<(), String> {
        let topic = self.topic_for(&event.aggregate_type);
        let key = format!("{}:{}", event.aggregate_type, event.aggregate_id);
        let payload = serde_json::to_string(&event).map_err(|e| format!("Failed to serialize event: {}", e))?;

        self.producer
            .send(FutureRecord::to(topic).key(&key).payload(&payload), Duration::from_secs(5))
            .await
            .map_err(|(e, _)| format!("Failed to send event to Kafka: {}", e))?;
        Ok(())
    }
}
