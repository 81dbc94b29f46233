/// Media Service - HTTP server and upload consumers
///
/// One process serves the image HTTP API and runs the avatar and post
/// upload consumers. Ctrl-C stops the consumers after their in-flight event
/// and shuts the HTTP server down gracefully.
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use anyhow::Context;
use media_service::handlers::{self, UploadLimits};
use media_service::kafka::{
    KafkaNotificationProducer, NotificationPublisher, UploadConsumer, UploadConsumerConfig,
};
use media_service::models::ImageClass;
use media_service::services::{AuthClient, ImageProcessor, ImageService, ImageStore, TokenValidator};
use media_service::Config;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;
    info!(
        env = %config.app.env,
        images_path = %config.storage.images_path.display(),
        kafka_brokers = %config.kafka.brokers,
        "Configuration loaded"
    );

    let store = ImageStore::open(&config.storage.images_path)
        .context("Failed to open image store")?;
    let processor = Arc::new(ImageProcessor::new(store));
    let images = web::Data::new(
        ImageService::from_config(processor.clone(), &config.storage)
            .context("Failed to initialize image service")?,
    );
    let auth: Arc<dyn TokenValidator> =
        Arc::new(AuthClient::new(&config.auth).context("Failed to create auth client")?);
    let auth = web::Data::from(auth);
    let limits = web::Data::new(UploadLimits {
        max_bytes: config.app.max_upload_bytes,
    });

    let publisher: Arc<dyn NotificationPublisher> = Arc::new(
        KafkaNotificationProducer::new(&config.kafka.brokers, &config.kafka.notification_topic)
            .context("Failed to create notification producer")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut consumers = JoinSet::new();
    for class in [ImageClass::Avatar, ImageClass::Post] {
        let consumer = UploadConsumer::new(
            UploadConsumerConfig::for_class(&config.kafka, class),
            processor.clone(),
            publisher.clone(),
            shutdown_rx.clone(),
        )
        .with_context(|| format!("Failed to create {class} consumer"))?;

        consumers.spawn(async move { (class, consumer.run().await) });
    }

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    info!(address = %bind_address, "Starting HTTP server");

    let cors_config = config.cors.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(handlers::cors(&cors_config))
            .app_data(images.clone())
            .app_data(auth.clone())
            .app_data(limits.clone())
            .wrap(actix_middleware::Logger::default())
            .configure(handlers::configure)
    })
    .disable_signals()
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run();

    let server_handle = server.handle();
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        let _ = signal_tx.send(true);
        server_handle.stop(true).await;
    });

    let served = server.await;
    let _ = shutdown_tx.send(true);

    while let Some(joined) = consumers.join_next().await {
        match joined {
            Ok((class, Ok(()))) => info!(class = %class, "Consumer finished"),
            Ok((class, Err(e))) => error!(class = %class, error = %e, "Consumer failed"),
            Err(e) => warn!(error = %e, "Consumer task panicked or was cancelled"),
        }
    }

    served.context("HTTP server failed")?;
    info!("Media-service shut down");
    Ok(())
}

/// `LOG_FORMAT=json` switches to structured JSON output
fn init_tracing() {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "media_service=info,rdkafka=warn,info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.with_target(false).json().init();
    } else {
        builder.init();
    }
}
