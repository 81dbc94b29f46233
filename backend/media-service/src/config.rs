/// Configuration management for media-service
///
/// Loads configuration from environment variables with sensible defaults.
use crate::models::ImageClass;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub kafka: KafkaConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
    /// Largest accepted multipart file, in bytes
    pub max_upload_bytes: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CorsConfig {
    /// Exact origins, or `*` for any
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub images_path: PathBuf,
    /// Base64 PNG served for `default` / `default.png`
    pub default_avatar: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthConfig {
    pub base_url: String,
    pub validate_token_path: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub avatar: TopicConfig,
    pub post: TopicConfig,
    pub notification_topic: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TopicConfig {
    pub topic: String,
    pub group_id: String,
}

impl KafkaConfig {
    /// Topic/group pair for the given image class
    pub fn topic_for(&self, class: ImageClass) -> &TopicConfig {
        match class {
            ImageClass::Avatar => &self.avatar,
            ImageClass::Post => &self.post,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("MEDIA_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("MEDIA_SERVICE_PORT")
                    .unwrap_or_else(|_| "8082".to_string())
                    .parse()
                    .unwrap_or(8082),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10 * 1024 * 1024),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect(),
            },
            storage: StorageConfig {
                images_path: std::env::var("IMAGES_PATH")
                    .unwrap_or_else(|_| "./images".to_string())
                    .into(),
                default_avatar: std::env::var("DEFAULT_AVATAR").ok(),
            },
            auth: AuthConfig {
                base_url: std::env::var("AUTH_API_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
                validate_token_path: std::env::var("AUTH_API_VALIDATE_TOKEN_PATH")
                    .unwrap_or_else(|_| "/auth/validate-token".to_string()),
            },
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                avatar: TopicConfig {
                    topic: std::env::var("KAFKA_AVATAR_TOPIC")
                        .unwrap_or_else(|_| "send-avatar".to_string()),
                    group_id: std::env::var("KAFKA_AVATAR_GROUP_ID")
                        .unwrap_or_else(|_| "media-avatar-consumer".to_string()),
                },
                post: TopicConfig {
                    topic: std::env::var("KAFKA_POST_TOPIC")
                        .unwrap_or_else(|_| "send-post".to_string()),
                    group_id: std::env::var("KAFKA_POST_GROUP_ID")
                        .unwrap_or_else(|_| "media-post-consumer".to_string()),
                },
                notification_topic: std::env::var("KAFKA_NOTIFICATION_TOPIC")
                    .unwrap_or_else(|_| "send-notification".to_string()),
            },
        })
    }
}
