use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};

static UPLOAD_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "media_service_upload_events_total",
            "Upload events consumed from Kafka, by image class and outcome",
        ),
        &["class", "outcome"],
    )
    .expect("failed to create media_service_upload_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register media_service_upload_events_total");
    counter
});

static DIRECT_UPLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "media_service_direct_uploads_total",
            "Synchronous uploads, by image class and status",
        ),
        &["class", "status"],
    )
    .expect("failed to create media_service_direct_uploads_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register media_service_direct_uploads_total");
    counter
});

static NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "media_service_notifications_total",
            "Notification publish attempts, by status",
        ),
        &["status"],
    )
    .expect("failed to create media_service_notifications_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register media_service_notifications_total");
    counter
});

pub fn record_upload_event(class: &str, outcome: &str) {
    UPLOAD_EVENTS_TOTAL.with_label_values(&[class, outcome]).inc();
}

pub fn record_direct_upload(class: &str, status: &str) {
    DIRECT_UPLOADS_TOTAL.with_label_values(&[class, status]).inc();
}

pub fn record_notification(status: &str) {
    NOTIFICATIONS_TOTAL.with_label_values(&[status]).inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
