//! Tourdesk backend server
//!
//! Excursion catalogue, seat booking, gateway payments and cascading
//! cancellations behind one HTTP API.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tourdesk_api::configure_routes;
use tourdesk_auth::JwtService;
use tourdesk_cache::RedisCache;
use tourdesk_core::traits::{CacheService, NotificationSink};
use tourdesk_core::AppConfig;
use tourdesk_db::{create_pool, run_migrations, PgBookingStore};
use tourdesk_gateway::HttpPaymentGateway;
use tourdesk_services::{
    BookingServices, LocalPhotoStore, LogNotifier, ServiceDeps, SmtpNotifier,
};
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tourdesk={lvl},tourdesk_api={lvl},tourdesk_services={lvl},tourdesk_db={lvl},tourdesk_gateway={lvl},actix_web=info,sqlx=warn",
            lvl = log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Periodically release seats held by reservations that were never paid and
/// publish upcoming sessions of recurring schedules
fn spawn_housekeeping(services: BookingServices, every: Duration, window: chrono::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match services.schedules.publish_upcoming(services.schedules.today()).await {
                Ok(run) if !run.failed.is_empty() => {
                    warn!("Schedules {:?} could not publish sessions", run.failed)
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Schedule pass failed"),
            }
            match services.reservations.purge_stale_unpaid(window).await {
                Ok(purged) if !purged.is_empty() => {
                    info!("Housekeeping released {} unpaid reservations", purged.len())
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Housekeeping purge failed"),
            }
        }
    });
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Tourdesk v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("Failed to load configuration")?;
    let tz = config.booking.timezone()?;
    let stale_window = config.booking.stale_window()?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;
    info!(
        "Database ready with {} max connections",
        config.database.max_connections
    );

    let cache: Option<Arc<dyn CacheService>> = match config.redis.url.as_deref() {
        Some(url) => match RedisCache::new(url).await {
            Ok(cache) => Some(Arc::new(cache)),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, webhook replays rely on store checks only");
                None
            }
        },
        None => None,
    };

    let notifier: Arc<dyn NotificationSink> = if config.mail.enabled {
        info!(
            "Mail delivery through {}:{}",
            config.mail.smtp_host, config.mail.smtp_port
        );
        Arc::new(SmtpNotifier::new(&config.mail)?)
    } else {
        warn!("Mail delivery disabled, messages are only logged");
        Arc::new(LogNotifier)
    };

    let services = BookingServices::new(ServiceDeps {
        store: Arc::new(PgBookingStore::new(pool)),
        gateway: Arc::new(HttpPaymentGateway::new(config.gateway.clone())?),
        notifier,
        photos: Arc::new(LocalPhotoStore::new(&config.storage.photo_root)),
        cache,
        currency: config.gateway.currency.clone(),
        gateway_timeout: Duration::from_secs(config.gateway.timeout_secs),
        webhook_ttl_secs: config.redis.webhook_ttl_secs,
        schedule_horizon_days: config.booking.schedule_horizon_days,
        tz,
    });

    if config.booking.housekeeping_interval_secs > 0 {
        info!(
            "Housekeeping every {}s: schedules {} days ahead, unpaid reservations older than {} minutes",
            config.booking.housekeeping_interval_secs,
            config.booking.schedule_horizon_days,
            config.booking.stale_unpaid_minutes
        );
        spawn_housekeeping(
            services.clone(),
            Duration::from_secs(config.booking.housekeeping_interval_secs),
            stale_window,
        );
    }

    let jwt_service = Arc::new(JwtService::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_minutes * 60,
    ));

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    let cors_origins = config.server.cors_origins.clone();
    let booking = config.booking.clone();

    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    HttpServer::new(move || {
        let cors = if cors_origins.is_empty() {
            Cors::default().allow_any_origin()
        } else {
            cors_origins
                .iter()
                .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        };
        let cors = cors
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::COOKIE,
            ])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(services.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::Data::new(booking.clone()))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_query",
                        "message": error_message,
                        "status": 400
                    })),
                )
                .into()
            }))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes)
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .client_request_timeout(Duration::from_secs(config.server.timeout_secs))
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
