/// Business logic layer for media-service
pub mod auth;
pub mod image;

pub use auth::{AuthClient, Identity, TokenValidator};
pub use image::{ImageProcessor, ImageService, ImageStore, UploadRequest};
