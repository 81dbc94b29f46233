//! Image ingestion
//!
//! - Store: flat PNG directory with atomic writes
//! - Processor: decode, resize per image class, encode PNG, store
//! - Service: role-gated direct upload, delete, lookup and listing

pub mod processor;
pub mod service;
pub mod store;

pub use processor::{validate_target_name, ImageProcessor, ProcessedImage, RenderedImage};
pub use service::{ImageService, UploadRequest};
pub use store::ImageStore;
