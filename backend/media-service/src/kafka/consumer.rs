//! Kafka consumer for avatar and post uploads
//!
//! One [`UploadConsumer`] runs per image class, each on its own topic and
//! consumer group. Offsets are committed manually and only after the image
//! has been stored, so a failed event stays uncommitted and is redelivered
//! when the process restarts.

use super::events::{NotificationEvent, UploadEvent};
use super::producer::NotificationPublisher;
use crate::config::KafkaConfig;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{validate_extension, ImageClass};
use crate::services::image::{validate_target_name, ImageProcessor, ProcessedImage};
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Per-class consumer configuration
#[derive(Clone, Debug)]
pub struct UploadConsumerConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub image_class: ImageClass,
    /// Message sent to the uploader once the image is stored
    pub success_message: String,
}

impl UploadConsumerConfig {
    pub fn for_class(kafka: &KafkaConfig, image_class: ImageClass) -> Self {
        let topic = kafka.topic_for(image_class);
        let success_message = match image_class {
            ImageClass::Avatar => "Avatar updated successfully",
            ImageClass::Post => "Post created successfully",
        };

        Self {
            brokers: kafka.brokers.clone(),
            topic: topic.topic.clone(),
            group_id: topic.group_id.clone(),
            image_class,
            success_message: success_message.to_string(),
        }
    }
}

/// A message taken off the broker, detached from the client
#[derive(Clone, Debug)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

/// Ordered source of records with manual commit
#[async_trait]
pub trait EventStream: Send {
    /// Wait for the next record; `None` once the stream is closed
    async fn next_record(&mut self) -> Option<Result<ConsumedRecord>>;

    /// Advance the group's committed position past `record`
    async fn commit(&mut self, record: &ConsumedRecord) -> Result<()>;
}

/// [`EventStream`] over an rdkafka `StreamConsumer`
pub struct KafkaEventStream {
    consumer: StreamConsumer,
}

impl KafkaEventStream {
    /// Create the client and subscribe to the configured topic
    pub fn subscribe(config: &UploadConsumerConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| AppError::Internal(format!("Failed to create Kafka consumer: {e}")))?;

        consumer.subscribe(&[&config.topic]).map_err(|e| {
            AppError::Internal(format!("Failed to subscribe to topic: {e}"))
        })?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            class = %config.image_class,
            "Upload consumer subscribed"
        );

        Ok(Self { consumer })
    }
}

#[async_trait]
impl EventStream for KafkaEventStream {
    async fn next_record(&mut self) -> Option<Result<ConsumedRecord>> {
        let record = self.consumer.recv().await.map(|msg| ConsumedRecord {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            payload: msg.payload().map(<[u8]>::to_vec),
        });
        Some(record.map_err(AppError::from))
    }

    async fn commit(&mut self, record: &ConsumedRecord) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &record.topic,
            record.partition,
            Offset::Offset(record.offset + 1),
        )?;
        self.consumer.commit(&offsets, CommitMode::Sync)?;
        Ok(())
    }
}

/// What happened to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Image stored; offset committed
    Processed,
    /// No usable event in the payload; committed so it is not redelivered
    Malformed,
    /// Processing failed; offset left uncommitted for redelivery
    Failed,
}

impl MessageOutcome {
    pub fn should_commit(self) -> bool {
        !matches!(self, MessageOutcome::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageOutcome::Processed => "processed",
            MessageOutcome::Malformed => "malformed",
            MessageOutcome::Failed => "failed",
        }
    }
}

/// Background consumer for one image class
pub struct UploadConsumer<S = KafkaEventStream> {
    stream: S,
    config: UploadConsumerConfig,
    processor: Arc<ImageProcessor>,
    publisher: Arc<dyn NotificationPublisher>,
    shutdown_rx: watch::Receiver<bool>,
}

impl UploadConsumer<KafkaEventStream> {
    /// Create a Kafka-backed consumer
    pub fn new(
        config: UploadConsumerConfig,
        processor: Arc<ImageProcessor>,
        publisher: Arc<dyn NotificationPublisher>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        let stream = KafkaEventStream::subscribe(&config)?;
        Ok(Self::with_stream(
            stream,
            config,
            processor,
            publisher,
            shutdown_rx,
        ))
    }
}

impl<S: EventStream> UploadConsumer<S> {
    pub fn with_stream(
        stream: S,
        config: UploadConsumerConfig,
        processor: Arc<ImageProcessor>,
        publisher: Arc<dyn NotificationPublisher>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            stream,
            config,
            processor,
            publisher,
            shutdown_rx,
        }
    }

    /// Run the consumer loop until shutdown or the stream closes
    ///
    /// Shutdown only interrupts the wait for the next record; a record that
    /// was already received is processed to completion first.
    pub async fn run(mut self) -> Result<()> {
        info!(
            topic = %self.config.topic,
            class = %self.config.image_class,
            "Starting upload consumer loop"
        );

        loop {
            if *self.shutdown_rx.borrow() {
                info!(class = %self.config.image_class, "Shutdown signal received, stopping consumer");
                break;
            }

            let next = tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() {
                        warn!(class = %self.config.image_class, "Shutdown channel closed, stopping consumer");
                        break;
                    }
                    continue;
                }
                next = self.stream.next_record() => next,
            };

            match next {
                Some(Ok(record)) => {
                    self.handle_record(&record).await;
                }
                Some(Err(e)) => {
                    error!(class = %self.config.image_class, error = %e, "Kafka consumer error");
                }
                None => {
                    warn!(class = %self.config.image_class, "Message stream ended");
                    break;
                }
            }
        }

        info!(class = %self.config.image_class, "Upload consumer stopped");
        Ok(())
    }

    /// Process one record, commit when appropriate and notify on success
    pub async fn handle_record(&mut self, record: &ConsumedRecord) -> MessageOutcome {
        let class = self.config.image_class;
        let (outcome, user_id) = self.process_payload(record.payload.as_deref()).await;
        metrics::record_upload_event(class.as_str(), outcome.as_str());

        if !outcome.should_commit() {
            warn!(
                class = %class,
                partition = record.partition,
                offset = record.offset,
                "Upload event left uncommitted, will be redelivered after restart"
            );
            return outcome;
        }

        if let Err(e) = self.stream.commit(record).await {
            error!(
                class = %class,
                partition = record.partition,
                offset = record.offset,
                error = %e,
                "Failed to commit offset"
            );
            return outcome;
        }

        if let Some(user_id) = user_id {
            let notification = NotificationEvent::info(user_id, self.config.success_message.clone());
            if let Err(e) = self.publisher.publish(notification).await {
                // The upload is already stored and committed; nothing to undo.
                error!(class = %class, user_id = user_id, error = %e, "Failed to send upload notification");
            }
        }

        outcome
    }

    async fn process_payload(&self, payload: Option<&[u8]>) -> (MessageOutcome, Option<i64>) {
        let class = self.config.image_class;

        let Some(payload) = payload else {
            debug!(class = %class, "Empty message payload, skipping");
            return (MessageOutcome::Malformed, None);
        };

        let event = match UploadEvent::from_payload(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(class = %class, error = %e, "Failed to parse upload event, skipping");
                return (MessageOutcome::Malformed, None);
            }
        };

        if let Err(e) = validate_target_name(&event.file_name) {
            warn!(class = %class, user_id = event.user_id, error = %e, "Unusable target file name, skipping");
            return (MessageOutcome::Malformed, None);
        }

        debug!(
            class = %class,
            user_id = event.user_id,
            file_name = %event.file_name,
            "Received upload event"
        );

        match self.ingest(&event).await {
            Ok(processed) => {
                info!(
                    class = %class,
                    user_id = event.user_id,
                    file_name = %processed.file_name,
                    width = processed.width,
                    height = processed.height,
                    "Upload event processed"
                );
                (MessageOutcome::Processed, Some(event.user_id))
            }
            Err(e) => {
                error!(
                    class = %class,
                    user_id = event.user_id,
                    file_name = %event.file_name,
                    error = %e,
                    "Failed to process upload event"
                );
                (MessageOutcome::Failed, None)
            }
        }
    }

    async fn ingest(&self, event: &UploadEvent) -> Result<ProcessedImage> {
        validate_extension(&event.file_extension)?;
        let raw = base64::engine::general_purpose::STANDARD.decode(event.file_base64.trim())?;

        self.processor
            .clone()
            .process_async(
                self.config.image_class,
                Bytes::from(raw),
                event.file_name.clone(),
            )
            .await
    }
}
