/// Data models for media-service
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::error::{AppError, Result};

/// Image category; decides the output width and PNG compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageClass {
    Avatar,
    Post,
}

/// PNG compression level applied on re-encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Best,
    Default,
}

impl ImageClass {
    /// Fixed output width in pixels; height follows the aspect ratio
    pub fn target_width(self) -> u32 {
        match self {
            ImageClass::Avatar => 120,
            ImageClass::Post => 300,
        }
    }

    pub fn compression(self) -> Compression {
        match self {
            ImageClass::Avatar => Compression::Best,
            ImageClass::Post => Compression::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageClass::Avatar => "avatar",
            ImageClass::Post => "post",
        }
    }
}

impl fmt::Display for ImageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extensions accepted on both ingestion paths
pub const ALLOWED_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// Checks an extension (with or without the leading dot) against
/// [`ALLOWED_EXTENSIONS`], ignoring case.
pub fn validate_extension(extension: &str) -> Result<()> {
    let trimmed = extension.trim();
    let normalized = if trimmed.starts_with('.') {
        trimmed.to_ascii_lowercase()
    } else {
        format!(".{}", trimmed.to_ascii_lowercase())
    };

    if ALLOWED_EXTENSIONS.contains(&normalized.as_str()) {
        Ok(())
    } else {
        Err(AppError::UnsupportedFormat(format!(
            "Invalid file extension '{extension}'"
        )))
    }
}

pub const ROLE_ADMINISTRATOR: &str = "administrator";
pub const ROLE_DEVELOPER: &str = "developer";

/// Role set resolved by the auth service for one caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roles(HashSet<String>);

impl Roles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    /// Upload and delete are open to administrators and developers
    pub fn require_uploader(&self, action: &str) -> Result<()> {
        if self.contains(ROLE_ADMINISTRATOR) || self.contains(ROLE_DEVELOPER) {
            Ok(())
        } else {
            Err(AppError::Unauthorized(format!(
                "You do not have permission to {action}"
            )))
        }
    }

    /// Listing the store is administrator-only
    pub fn require_administrator(&self) -> Result<()> {
        if self.contains(ROLE_ADMINISTRATOR) {
            Ok(())
        } else {
            Err(AppError::Unauthorized(
                "Invalid permission to access this resource".to_string(),
            ))
        }
    }
}

impl<S: Into<String>> FromIterator<S> for Roles {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Lowercases the top-level keys of a JSON object so that payloads can be
/// matched against lowercase serde names regardless of sender casing.
pub(crate) fn lowercase_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(key, value)| (key.to_lowercase(), value))
                .collect(),
        ),
        other => other,
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct ImageListResponse {
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
