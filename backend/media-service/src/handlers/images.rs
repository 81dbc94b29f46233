/// Image handlers - HTTP endpoints for direct uploads and the image store
use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::{ImageClass, ImageListResponse, MessageResponse, UploadResponse};
use crate::services::{ImageService, TokenValidator, UploadRequest};

const FILE_FIELD: &str = "file";
const DEFAULT_AVATAR_NAMES: [&str; 2] = ["default", "default.png"];

/// Size cap applied while streaming the multipart `file` field
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: usize,
}

struct UploadedFile {
    file_name: String,
    data: Bytes,
}

/// Upload an avatar (120px wide)
pub async fn upload_avatar(
    req: HttpRequest,
    payload: Multipart,
    auth: web::Data<dyn TokenValidator>,
    images: web::Data<ImageService>,
    limits: web::Data<UploadLimits>,
) -> Result<HttpResponse> {
    upload(ImageClass::Avatar, req, payload, auth, images, limits).await
}

/// Upload a post image (300px wide)
pub async fn upload_post(
    req: HttpRequest,
    payload: Multipart,
    auth: web::Data<dyn TokenValidator>,
    images: web::Data<ImageService>,
    limits: web::Data<UploadLimits>,
) -> Result<HttpResponse> {
    upload(ImageClass::Post, req, payload, auth, images, limits).await
}

async fn upload(
    class: ImageClass,
    req: HttpRequest,
    payload: Multipart,
    auth: web::Data<dyn TokenValidator>,
    images: web::Data<ImageService>,
    limits: web::Data<UploadLimits>,
) -> Result<HttpResponse> {
    let file = read_file_field(payload, limits.max_bytes).await?;
    let identity = auth.validate(authorization(&req)).await?;

    let image = images
        .upload(
            class,
            UploadRequest {
                roles: identity.roles,
                user_id: identity.user_id,
                original_file_name: file.file_name,
                data: file.data,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(UploadResponse { image }))
}

/// Delete a stored image
pub async fn delete_image(
    req: HttpRequest,
    file_name: web::Path<String>,
    auth: web::Data<dyn TokenValidator>,
    images: web::Data<ImageService>,
) -> Result<HttpResponse> {
    let identity = auth.validate(authorization(&req)).await?;
    images.delete(&identity.roles, &file_name)?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Image deleted".to_string(),
    }))
}

/// Serve a stored image; public
pub async fn get_image(
    file_name: web::Path<String>,
    images: web::Data<ImageService>,
) -> Result<HttpResponse> {
    let data = if DEFAULT_AVATAR_NAMES.contains(&file_name.as_str()) {
        images.default_avatar()?
    } else {
        Bytes::from(images.read(&file_name)?)
    };

    Ok(HttpResponse::Ok().content_type("image/png").body(data))
}

/// List every stored image (administrators only)
pub async fn list_images(
    req: HttpRequest,
    auth: web::Data<dyn TokenValidator>,
    images: web::Data<ImageService>,
) -> Result<HttpResponse> {
    let identity = auth.validate(authorization(&req)).await?;
    let images = images.list(&identity.roles)?;

    Ok(HttpResponse::Ok().json(ImageListResponse { images }))
}

fn authorization(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// Read the `file` field, enforcing presence, non-emptiness and the size cap
async fn read_file_field(mut payload: Multipart, max_bytes: usize) -> Result<UploadedFile> {
    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string)
            .unwrap_or_default();

        let mut data = BytesMut::new();
        while let Some(chunk) = field.try_next().await? {
            if data.len() + chunk.len() > max_bytes {
                return Err(AppError::BadRequest(format!(
                    "File exceeds the {max_bytes} byte upload limit"
                )));
            }
            data.extend_from_slice(&chunk);
        }

        if data.is_empty() {
            return Err(AppError::BadRequest("File is empty".to_string()));
        }

        debug!(file_name = %file_name, size = data.len(), "Multipart file received");
        return Ok(UploadedFile {
            file_name,
            data: data.freeze(),
        });
    }

    Err(AppError::BadRequest("File is required".to_string()))
}
