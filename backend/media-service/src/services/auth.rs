//! Token validation against the remote auth service
//!
//! The auth service owns token verification; this client forwards the
//! caller's bearer token and returns the resolved user id and roles.

use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use crate::models::{lowercase_keys, Roles};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Caller identity resolved from a bearer token
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub roles: Roles,
}

#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Resolve the raw `Authorization` header value into an identity
    async fn validate(&self, authorization: Option<&str>) -> Result<Identity>;
}

#[derive(Debug, Deserialize)]
struct ValidateTokenResponse {
    #[serde(rename = "iduser")]
    user_id: i64,
    #[serde(default)]
    roles: Vec<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct ErrorMessageResponse {
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the auth service
pub struct AuthClient {
    http_client: Client,
    validate_url: String,
}

impl AuthClient {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            validate_url: format!(
                "{}/{}",
                config.base_url.trim_end_matches('/'),
                config.validate_token_path.trim_start_matches('/')
            ),
        })
    }
}

#[async_trait]
impl TokenValidator for AuthClient {
    async fn validate(&self, authorization: Option<&str>) -> Result<Identity> {
        let token = bearer_token(authorization)?;

        let response = self
            .http_client
            .get(&self.validate_url)
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = parse_json::<ErrorMessageResponse>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| "Token validation error".to_string());
            warn!(status = %status, message = %message, "Token validation rejected");
            return Err(map_rejection(status, message));
        }

        let parsed: ValidateTokenResponse = parse_json(&body)
            .map_err(|e| AppError::Internal(format!("Token validation error: {e}")))?;
        debug!(user_id = parsed.user_id, "Token validated");

        Ok(Identity {
            user_id: parsed.user_id,
            roles: parsed.roles.into_iter().flatten().collect(),
        })
    }
}

/// Strip the `Bearer ` scheme; a missing or empty header is rejected
fn bearer_token(authorization: Option<&str>) -> Result<&str> {
    let raw = authorization.map(str::trim_start).unwrap_or_default();
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() {
        return Err(AppError::Unauthenticated("Invalid token".to_string()));
    }
    Ok(token)
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> serde_json::Result<T> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    serde_json::from_value(lowercase_keys(value))
}

fn map_rejection(status: StatusCode, message: String) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED => AppError::Unauthenticated(message),
        StatusCode::FORBIDDEN => AppError::Unauthorized(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        s if s.is_client_error() => AppError::BadRequest(message),
        _ => AppError::Internal(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(Some("abc")).unwrap(), "abc");
        assert!(matches!(bearer_token(None), Err(AppError::Unauthenticated(_))));
        assert!(matches!(bearer_token(Some("Bearer  ")), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn test_parse_validate_response_case_insensitive() {
        let body = br#"{"IDUser": 42, "Roles": ["developer", null, "member"]}"#;
        let parsed: ValidateTokenResponse = parse_json(body).unwrap();
        assert_eq!(parsed.user_id, 42);
        let roles: Roles = parsed.roles.into_iter().flatten().collect();
        assert!(roles.contains("developer"));
        assert!(roles.contains("member"));
    }

    #[test]
    fn test_map_rejection() {
        assert!(matches!(
            map_rejection(StatusCode::UNAUTHORIZED, "x".into()),
            AppError::Unauthenticated(_)
        ));
        assert!(matches!(
            map_rejection(StatusCode::FORBIDDEN, "x".into()),
            AppError::Unauthorized(_)
        ));
        assert!(matches!(
            map_rejection(StatusCode::BAD_GATEWAY, "x".into()),
            AppError::Internal(_)
        ));
    }
}
