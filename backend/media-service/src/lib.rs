//! Media Service
//!
//! Image ingestion for avatars and post pictures. Images arrive either as
//! direct multipart uploads or as base64 upload events on Kafka; both paths
//! normalize them to fixed-width PNGs in a flat image directory.

pub mod config;
pub mod error;
pub mod handlers;
pub mod kafka;
pub mod metrics;
pub mod models;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
