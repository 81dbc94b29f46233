//! Notification producer
//!
//! Publishes [`NotificationEvent`]s to the fixed notification topic. The only
//! acknowledgement awaited is the broker accepting the write; failures are
//! returned to the caller and never retried here.

use super::events::NotificationEvent;
use crate::error::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{error, info};

/// Sink for notification events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, event: NotificationEvent) -> Result<()>;
}

/// Kafka-backed [`NotificationPublisher`]
pub struct KafkaNotificationProducer {
    producer: FutureProducer,
    topic: String,
    delivery_timeout: Duration,
}

impl KafkaNotificationProducer {
    pub fn new(brokers: &str, topic: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", "10000")
            .create()
            .map_err(|e| AppError::Internal(format!("Failed to create Kafka producer: {e}")))?;

        info!(brokers = %brokers, topic = %topic, "Notification producer initialized");

        Ok(Self {
            producer,
            topic: topic.to_string(),
            delivery_timeout: Duration::from_secs(10),
        })
    }
}

#[async_trait]
impl NotificationPublisher for KafkaNotificationProducer {
    async fn publish(&self, event: NotificationEvent) -> Result<()> {
        let payload = serde_json::to_string(&event)
            .map_err(|e| AppError::PublishError(format!("Failed to serialize notification: {e}")))?;
        let key = event.user_id.to_string();

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        match self.producer.send(record, self.delivery_timeout).await {
            Ok((partition, offset)) => {
                metrics::record_notification("published");
                info!(
                    user_id = event.user_id,
                    topic = %self.topic,
                    partition = partition,
                    offset = offset,
                    "Published notification"
                );
                Ok(())
            }
            Err((err, _)) => {
                metrics::record_notification("failed");
                error!(
                    user_id = event.user_id,
                    topic = %self.topic,
                    error = %err,
                    "Failed to publish notification"
                );
                Err(AppError::PublishError(err.to_string()))
            }
        }
    }
}
