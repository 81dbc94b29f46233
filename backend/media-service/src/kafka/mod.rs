//! Kafka integration for media-service
//!
//! - Consumer: avatar and post upload events, manual offset commit
//! - Producer: upload-completed notifications
//! - Events: message schemas

pub mod consumer;
pub mod events;
pub mod producer;

pub use consumer::{
    ConsumedRecord, EventStream, KafkaEventStream, MessageOutcome, UploadConsumer,
    UploadConsumerConfig,
};
pub use events::{NotificationEvent, NotificationType, UploadEvent};
pub use producer::{KafkaNotificationProducer, NotificationPublisher};
