/// Error types for Media Service
///
/// Every failure the ingestion paths can produce. The HTTP layer turns these
/// into status codes; the Kafka consumers only log them.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;

/// Result type for media-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Caller lacks the role required for the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Missing or rejected bearer token
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Extension or content is not png/jpg/jpeg
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Bytes could not be decoded as an image
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Image does not exist in the store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Writing to the image directory failed
    #[error("Store write error: {0}")]
    StoreWriteError(String),

    /// Notification could not be handed to the broker
    #[error("Publish error: {0}")]
    PublishError(String),

    /// Malformed request payload
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "AUTHORIZATION_ERROR",
            AppError::Unauthenticated(_) => "INVALID_CREDENTIALS",
            AppError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            AppError::DecodeError(_) => "IMAGE_DECODE_ERROR",
            AppError::NotFound(_) => "MEDIA_NOT_FOUND",
            AppError::StoreWriteError(_) => "STORE_WRITE_ERROR",
            AppError::PublishError(_) => "PUBLISH_ERROR",
            AppError::BadRequest(_) => "INVALID_REQUEST",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    status: u16,
    code: &'a str,
    message: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::DecodeError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::StoreWriteError(_) | AppError::PublishError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorBody {
            status: status.as_u16(),
            code: self.code(),
            message: self.to_string(),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StoreWriteError(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => AppError::UnsupportedFormat(e.to_string()),
            image::ImageError::IoError(e) => AppError::StoreWriteError(e.to_string()),
            other => AppError::DecodeError(other.to_string()),
        }
    }
}

impl From<base64::DecodeError> for AppError {
    fn from(err: base64::DecodeError) -> Self {
        AppError::DecodeError(format!("invalid base64 payload: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Internal(format!("auth service request failed: {err}"))
    }
}

impl From<rdkafka::error::KafkaError> for AppError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        AppError::Internal(format!("Kafka error: {err}"))
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        AppError::BadRequest(format!("invalid multipart payload: {err}"))
    }
}
