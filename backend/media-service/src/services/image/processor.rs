//! Image processor - normalizes uploaded images into stored PNGs
//!
//! Decodes png/jpeg input, resizes it to the fixed width of its image class
//! (height follows the aspect ratio) with a Lanczos3 filter, re-encodes it as
//! PNG at the class compression level and writes it to the image store.
//!
//! Uses `spawn_blocking` for CPU-intensive operations to avoid blocking the async runtime.

use super::store::{self, ImageStore};
use crate::error::{AppError, Result};
use crate::models::{Compression, ImageClass};
use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageEncoder, ImageFormat};
use std::sync::Arc;
use tracing::debug;

/// Tallest output accepted; taller results are rejected before resizing
pub const MAX_OUTPUT_HEIGHT: u32 = 8192;

/// Encoded output of one processing call
#[derive(Debug)]
pub struct RenderedImage {
    /// PNG bytes
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Result of a stored processing call
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Name under which the image was stored (always `*.png`)
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub size: usize,
}

/// Image processor bound to one image store
pub struct ImageProcessor {
    store: ImageStore,
}

impl ImageProcessor {
    pub fn new(store: ImageStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Decode, resize, encode and store `raw` as `{target_base_name}.png`
    /// (blocking version)
    ///
    /// An existing file with the same name is replaced.
    pub fn process(
        &self,
        class: ImageClass,
        raw: &[u8],
        target_base_name: &str,
    ) -> Result<ProcessedImage> {
        validate_target_name(target_base_name)?;

        let rendered = Self::render(class, raw)?;
        let file_name = format!("{target_base_name}.png");
        self.store.write(&file_name, &rendered.data)?;

        debug!(
            class = %class,
            file_name = %file_name,
            width = rendered.width,
            height = rendered.height,
            size = rendered.data.len(),
            "Image processed"
        );

        Ok(ProcessedImage {
            file_name,
            width: rendered.width,
            height: rendered.height,
            size: rendered.data.len(),
        })
    }

    /// Run [`process`](Self::process) on the blocking thread pool
    pub async fn process_async(
        self: Arc<Self>,
        class: ImageClass,
        raw: Bytes,
        target_base_name: String,
    ) -> Result<ProcessedImage> {
        tokio::task::spawn_blocking(move || self.process(class, &raw, &target_base_name))
            .await
            .map_err(|e| AppError::Internal(format!("Image processing task panicked: {e}")))?
    }

    /// Decode, resize and encode without touching the store
    pub fn render(class: ImageClass, raw: &[u8]) -> Result<RenderedImage> {
        let img = decode(raw)?;

        let (orig_w, orig_h) = img.dimensions();
        let (new_w, new_h) = calculate_dimensions(class.target_width(), orig_w, orig_h);
        if new_h > MAX_OUTPUT_HEIGHT {
            return Err(AppError::DecodeError(format!(
                "Image {orig_w}x{orig_h} would resize to {new_w}x{new_h}, above the {MAX_OUTPUT_HEIGHT}px height limit"
            )));
        }
        debug!(
            original_width = orig_w,
            original_height = orig_h,
            width = new_w,
            height = new_h,
            "Resizing image"
        );

        let resized = img.resize_exact(new_w, new_h, FilterType::Lanczos3);
        let data = encode_png(&resized, class.compression())?;

        Ok(RenderedImage {
            data,
            width: new_w,
            height: new_h,
        })
    }
}

/// A base name that can never be stored: blank, or escaping the directory
pub fn validate_target_name(target_base_name: &str) -> Result<()> {
    if target_base_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Target file name must not be empty".to_string(),
        ));
    }
    store::validate_name(&format!("{target_base_name}.png"))
}

/// Only png and jpeg content is accepted
fn decode(raw: &[u8]) -> Result<DynamicImage> {
    let format = image::guess_format(raw)
        .map_err(|e| AppError::DecodeError(format!("Unrecognized image data: {e}")))?;

    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
        return Err(AppError::UnsupportedFormat(format!(
            "Image content is {format:?}, expected png or jpeg"
        )));
    }

    image::load_from_memory_with_format(raw, format)
        .map_err(|e| AppError::DecodeError(format!("Failed to decode image: {e}")))
}

/// Fixed width, height scaled to keep the aspect ratio (at least 1px)
fn calculate_dimensions(target_width: u32, width: u32, height: u32) -> (u32, u32) {
    let ratio = target_width as f64 / width.max(1) as f64;
    let new_height = ((height as f64) * ratio).round().max(1.0) as u32;
    (target_width, new_height)
}

fn encode_png(img: &DynamicImage, compression: Compression) -> Result<Vec<u8>> {
    let compression = match compression {
        Compression::Best => CompressionType::Best,
        Compression::Default => CompressionType::Default,
    };

    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, compression, PngFilterType::Adaptive);

    let result = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        encoder.write_image(rgba.as_raw(), rgba.width(), rgba.height(), image::ColorType::Rgba8)
    } else {
        let rgb = img.to_rgb8();
        encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
    };
    result.map_err(|e| AppError::Internal(format!("Failed to encode PNG: {e}")))?;

    Ok(buf)
}
