use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use geoattend::attendance::SystemClock;
use geoattend::config::Config;
use geoattend::db::init_db;
use geoattend::docs::ApiDoc;
use geoattend::routes;
use geoattend::state::AppState;
use geoattend::store::{AttendanceStore, MemoryStore, MySqlStore};

#[get("/")]
async fn index() -> impl Responder {
    "Attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(
        latitude = config.geofence.reference.latitude,
        longitude = config.geofence.reference.longitude,
        radius = config.geofence.max_distance_meters,
        "Server starting..."
    );

    let store: Arc<dyn AttendanceStore> = match &config.database_url {
        Some(url) => {
            let pool = init_db(url).await.context("failed to connect to the database")?;
            Arc::new(MySqlStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    let clock = Arc::new(SystemClock::new(config.utc_offset));

    let state = Data::new(AppState::new(&config, store, clock).context("failed to build HTTP client")?);
    if !state.summarizer.is_configured() {
        info!("SUMMARY_API_KEY not set, summary generation disabled");
    }
    let config_data = Data::new(config.clone());
    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        let routes_config = config.clone();
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches the JS/CSS assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(state.clone())
            .app_data(config_data.clone())
            .service(index)
            .configure(move |cfg| routes::configure(cfg, routes_config))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
