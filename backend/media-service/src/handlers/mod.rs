/// HTTP handlers for media-service
///
/// - Images: direct uploads, deletion, lookup and listing
/// - Health: liveness and readiness probes
pub mod health;
pub mod images;

pub use health::{health, live, ready};
pub use images::{
    delete_image, get_image, list_images, upload_avatar, upload_post, UploadLimits,
};

use crate::config::CorsConfig;
use crate::metrics;
use actix_cors::Cors;
use actix_web::web;

/// CORS layer from the configured origin allow-list; `*` admits any origin
pub fn cors(config: &CorsConfig) -> Cors {
    let mut cors = Cors::default();
    for origin in &config.allowed_origins {
        if origin == "*" {
            cors = cors.allow_any_origin();
        } else {
            cors = cors.allowed_origin(origin);
        }
    }
    cors.allow_any_method().allow_any_header().max_age(3600)
}

/// Register every route on an actix app
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/health/live", web::get().to(live))
        .route("/health/ready", web::get().to(ready))
        .route("/metrics", web::get().to(metrics::serve_metrics))
        .service(
            web::scope("/image")
                .route("", web::get().to(list_images))
                .route("/upload/avatar", web::post().to(upload_avatar))
                .route("/upload/post", web::post().to(upload_post))
                .route("/delete/{file_name}", web::post().to(delete_image))
                .route("/{file_name}", web::get().to(get_image)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::models::Roles;
    use crate::services::{Identity, ImageProcessor, ImageService, ImageStore, TokenValidator};
    use actix_web::{http::StatusCode, test, App};
    use async_trait::async_trait;
    use bytes::Bytes;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Arc;

    const BOUNDARY: &str = "media-test-boundary";

    /// Treats the bearer token as a comma-separated role list
    struct RolesFromToken;

    #[async_trait]
    impl TokenValidator for RolesFromToken {
        async fn validate(&self, authorization: Option<&str>) -> Result<Identity> {
            let token = authorization
                .and_then(|h| h.strip_prefix("Bearer "))
                .ok_or_else(|| AppError::Unauthenticated("Invalid token".to_string()))?;
            Ok(Identity {
                user_id: 7,
                roles: Roles::new(token.split(',')),
            })
        }
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 80, 120])))
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(85))
            .unwrap();
        buf
    }

    fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(uri: &str, token: Option<&str>, body: Vec<u8>) -> test::TestRequest {
        let mut req = test::TestRequest::post().uri(uri).insert_header((
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ));
        if let Some(token) = token {
            req = req.insert_header(("authorization", format!("Bearer {token}")));
        }
        req.set_payload(body)
    }

    macro_rules! app {
        ($dir:expr) => {
            app!($dir, ["*"])
        };
        ($dir:expr, $origins:expr) => {{
            let cors_config = CorsConfig {
                allowed_origins: $origins.iter().map(|o: &&str| o.to_string()).collect(),
            };
            let store = ImageStore::open($dir.path()).unwrap();
            let processor = Arc::new(ImageProcessor::new(store));
            let images = ImageService::new(processor, Some(Bytes::from_static(b"default-avatar")));
            let auth: Arc<dyn TokenValidator> = Arc::new(RolesFromToken);
            test::init_service(
                App::new()
                    .wrap(cors(&cors_config))
                    .app_data(web::Data::new(images))
                    .app_data(web::Data::from(auth))
                    .app_data(web::Data::new(UploadLimits { max_bytes: 1024 * 1024 }))
                    .configure(configure),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn test_upload_avatar_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir);

        let body = multipart_body("file", "me.jpg", &jpeg(640, 480));
        let resp = test::call_service(
            &app,
            upload_request("/image/upload/avatar", Some("developer"), body).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = test::read_body_json(resp).await;
        let name = json["image"].as_str().unwrap().to_string();
        assert!(name.starts_with("7_") && name.ends_with(".png"));

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri(&format!("/image/{name}")).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
        let png = test::read_body(resp).await;
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 90));
    }

    #[actix_web::test]
    async fn test_upload_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir);

        let cases = [
            ("developer", multipart_body("other", "me.jpg", &jpeg(10, 10)), StatusCode::BAD_REQUEST),
            ("developer", multipart_body("file", "me.jpg", b""), StatusCode::BAD_REQUEST),
            ("developer", multipart_body("file", "anim.gif", &jpeg(10, 10)), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            ("developer", multipart_body("file", "fake.png", b"not an image"), StatusCode::BAD_REQUEST),
            ("member", multipart_body("file", "me.jpg", &jpeg(10, 10)), StatusCode::FORBIDDEN),
        ];
        for (roles, body, expected) in cases {
            let resp = test::call_service(
                &app,
                upload_request("/image/upload/post", Some(roles), body).to_request(),
            )
            .await;
            assert_eq!(resp.status(), expected);
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn test_upload_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir);

        let body = multipart_body("file", "big.png", &vec![0u8; 2 * 1024 * 1024]);
        let resp = test::call_service(
            &app,
            upload_request("/image/upload/post", Some("developer"), body).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_upload_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir);

        let body = multipart_body("file", "me.jpg", &jpeg(10, 10));
        let resp = test::call_service(
            &app,
            upload_request("/image/upload/avatar", None, body).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_default_avatar_and_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir);

        for uri in ["/image/default", "/image/default.png"] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(test::read_body(resp).await, Bytes::from_static(b"default-avatar"));
        }

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/image/nope").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        let app = app!(dir);

        let list = |token: &str| {
            test::TestRequest::get()
                .uri("/image")
                .insert_header(("authorization", format!("Bearer {token}")))
                .to_request()
        };

        let resp = test::call_service(&app, list("developer")).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = test::call_service(&app, list("administrator")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(json, serde_json::json!({ "images": ["a.png"] }));

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/image/delete/a")
                .insert_header(("authorization", "Bearer developer"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(json, serde_json::json!({ "message": "Image deleted" }));
        assert!(!dir.path().join("a.png").exists());
    }

    #[actix_web::test]
    async fn test_cors_allows_configured_origins() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/image/default")
                .insert_header(("origin", "https://app.example.com"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "https://app.example.com"
        );

        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir, ["https://app.example.com"]);

        let resp = test::call_service(
            &app,
            test::TestRequest::default()
                .method(actix_web::http::Method::OPTIONS)
                .uri("/image/upload/avatar")
                .insert_header(("origin", "https://app.example.com"))
                .insert_header(("access-control-request-method", "POST"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "https://app.example.com"
        );

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/image/default")
                .insert_header(("origin", "https://evil.example.com"))
                .to_request(),
        )
        .await;
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }

    #[actix_web::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir);

        for uri in ["/health", "/health/live", "/health/ready"] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }
}
