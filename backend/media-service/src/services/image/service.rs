//! Image service - role-gated operations behind the HTTP API
//!
//! Direct uploads, deletion, lookup and listing. Authorization has already
//! resolved the caller's roles; this layer only applies the role rules.

use super::processor::ImageProcessor;
use super::store::ImageStore;
use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{validate_extension, ImageClass, Roles};
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A synchronous upload from an authenticated caller
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub roles: Roles,
    pub user_id: i64,
    /// Client-side file name; only its extension is used
    pub original_file_name: String,
    pub data: Bytes,
}

pub struct ImageService {
    processor: Arc<ImageProcessor>,
    default_avatar: Option<Bytes>,
}

impl ImageService {
    pub fn new(processor: Arc<ImageProcessor>, default_avatar: Option<Bytes>) -> Self {
        Self {
            processor,
            default_avatar,
        }
    }

    /// Build from storage configuration; the default avatar is base64 PNG
    pub fn from_config(processor: Arc<ImageProcessor>, cfg: &StorageConfig) -> Result<Self> {
        let default_avatar = cfg
            .default_avatar
            .as_deref()
            .map(|encoded| {
                base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map(Bytes::from)
                    .map_err(|e| AppError::Internal(format!("Invalid DEFAULT_AVATAR: {e}")))
            })
            .transpose()?;

        Ok(Self::new(processor, default_avatar))
    }

    pub fn processor(&self) -> &Arc<ImageProcessor> {
        &self.processor
    }

    fn store(&self) -> &ImageStore {
        self.processor.store()
    }

    /// Store a directly uploaded image and return its generated name
    pub async fn upload(&self, class: ImageClass, request: UploadRequest) -> Result<String> {
        let result = self.try_upload(class, request).await;
        metrics::record_direct_upload(
            class.as_str(),
            if result.is_ok() { "success" } else { "error" },
        );
        result
    }

    async fn try_upload(&self, class: ImageClass, request: UploadRequest) -> Result<String> {
        request
            .roles
            .require_uploader("upload images directly")?;

        let extension = Path::new(&request.original_file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        validate_extension(extension)?;

        let base_name = generate_base_name(request.user_id);
        let processed = self
            .processor
            .clone()
            .process_async(class, request.data, base_name)
            .await?;

        info!(
            class = %class,
            user_id = request.user_id,
            file_name = %processed.file_name,
            "Direct upload stored"
        );
        Ok(processed.file_name)
    }

    pub fn delete(&self, roles: &Roles, file_name: &str) -> Result<()> {
        roles.require_uploader("delete images")?;
        self.store().delete(file_name)
    }

    /// Bytes of a stored image; bare names get `.png` appended
    pub fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        self.store().read(file_name)
    }

    pub fn list(&self, roles: &Roles) -> Result<Vec<String>> {
        roles.require_administrator()?;
        self.store().list()
    }

    pub fn default_avatar(&self) -> Result<Bytes> {
        self.default_avatar
            .clone()
            .ok_or_else(|| AppError::NotFound("Default avatar is not configured".to_string()))
    }
}

/// `{userId}_{timestamp}_{uuid}`; the processor appends `.png`
fn generate_base_name(user_id: i64) -> String {
    format!(
        "{}_{}_{}",
        user_id,
        Utc::now().timestamp_micros(),
        Uuid::new_v4()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn jpeg(width: u32, height: u32) -> Bytes {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([9, 9, 9])))
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(85))
            .unwrap();
        Bytes::from(buf)
    }

    fn service() -> (tempfile::TempDir, ImageService) {
        let dir = tempfile::tempdir().unwrap();
        let processor = Arc::new(ImageProcessor::new(ImageStore::open(dir.path()).unwrap()));
        (dir, ImageService::new(processor, Some(Bytes::from_static(b"default"))))
    }

    fn request(roles: &[&str], file_name: &str) -> UploadRequest {
        UploadRequest {
            roles: Roles::new(roles.iter().copied()),
            user_id: 7,
            original_file_name: file_name.to_string(),
            data: jpeg(600, 400),
        }
    }

    #[tokio::test]
    async fn test_upload_generates_unique_png_names() {
        let (_dir, service) = service();
        let first = service
            .upload(ImageClass::Post, request(&["developer"], "photo.JPG"))
            .await
            .unwrap();
        let second = service
            .upload(ImageClass::Post, request(&["developer"], "photo.JPG"))
            .await
            .unwrap();

        assert_ne!(first, second);
        for name in [&first, &second] {
            assert!(name.starts_with("7_"));
            assert!(name.ends_with(".png"));
            assert_eq!(name.split('_').count(), 3);
        }
        assert_eq!(service.list(&Roles::new(["administrator"])).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_requires_role() {
        let (dir, service) = service();
        let err = service
            .upload(ImageClass::Avatar, request(&["member"], "me.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_extension() {
        let (_dir, service) = service();
        let err = service
            .upload(ImageClass::Avatar, request(&["administrator"], "anim.gif"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));

        let err = service
            .upload(ImageClass::Avatar, request(&["administrator"], "noext"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_delete_and_list_rules() {
        let (_dir, service) = service();
        let name = service
            .upload(ImageClass::Avatar, request(&["administrator"], "a.png"))
            .await
            .unwrap();

        let member = Roles::new(["member"]);
        let developer = Roles::new(["developer"]);
        assert!(matches!(service.list(&developer), Err(AppError::Unauthorized(_))));
        assert!(matches!(service.list(&member), Err(AppError::Unauthorized(_))));
        assert!(matches!(
            service.delete(&member, &name),
            Err(AppError::Unauthorized(_))
        ));

        let bare = name.trim_end_matches(".png");
        assert!(service.read(bare).is_ok());
        service.delete(&developer, bare).unwrap();
        assert!(matches!(
            service.delete(&developer, bare),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_default_avatar() {
        let (_dir, service) = service();
        assert_eq!(service.default_avatar().unwrap(), Bytes::from_static(b"default"));

        let unset = ImageService::new(service.processor().clone(), None);
        assert!(matches!(unset.default_avatar(), Err(AppError::NotFound(_))));
    }
}
