/// Health probes
use actix_web::HttpResponse;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "media-service",
    }))
}

pub async fn live() -> HttpResponse {
    HttpResponse::Ok().finish()
}

pub async fn ready() -> HttpResponse {
    HttpResponse::Ok().finish()
}
