#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for septic/sewer lookups.
//!
//! Loads the `DuckDB` feature store into in-memory spatial indexes and
//! serves the lookup API. The feature store file is only opened, read-only,
//! while an index snapshot is loaded, so `septic_locator import` can write
//! to it while the server runs; new data is served after the next reload.
//! Every lookup is recorded in a separate lookup log file off the request
//! path.

pub mod auth;
mod handlers;
pub mod interactive;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use septic_locator_database::{lookup_log::LookupLog, paths};
use septic_locator_lookup::{IndexedStore, LookupConfig, SepticLookup};

use crate::auth::{AdminAuthorizer, TokenAuthorizer};

/// Shared application state.
pub struct AppState {
    /// The classification engine.
    pub lookup: SepticLookup,
    /// The indexed store behind `lookup`, kept for reloads.
    pub store: Arc<IndexedStore>,
    /// Lookup log. `None` disables logging.
    pub lookup_log: Option<Arc<LookupLog>>,
    /// Gate for admin routes.
    pub authorizer: Arc<dyn AdminAuthorizer>,
}

impl AppState {
    /// Builds the state over an indexed store and an optional lookup log.
    #[must_use]
    pub fn new(
        store: Arc<IndexedStore>,
        lookup_log: Option<LookupLog>,
        config: LookupConfig,
        authorizer: Arc<dyn AdminAuthorizer>,
    ) -> Self {
        let lookup = SepticLookup::new(store.clone(), config);

        Self {
            lookup,
            store,
            lookup_log: lookup_log.map(Arc::new),
            authorizer,
        }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/lookup", web::get().to(handlers::lookup_get))
            .route("/lookup", web::post().to(handlers::lookup_post))
            .route("/coverage", web::get().to(handlers::coverage))
            .route("/sources", web::get().to(handlers::sources))
            .route("/admin/reload", web::post().to(handlers::admin_reload)),
    );
}

/// Reads `SEPTIC_RELOAD_INTERVAL_SECS`. Unset, zero or unparseable
/// disables periodic reloads.
#[must_use]
pub fn reload_interval_from_env() -> Option<Duration> {
    std::env::var("SEPTIC_RELOAD_INTERVAL_SECS")
        .ok()
        .and_then(|v| parse_reload_interval(&v))
}

fn parse_reload_interval(value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(0) => None,
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            log::warn!(
                "Ignoring SEPTIC_RELOAD_INTERVAL_SECS={value:?}: expected a number of seconds"
            );
            None
        }
    }
}

/// Reloads `store` every `interval` on the current actix system.
///
/// A failed reload (for example while an import holds the store's write
/// lock) keeps the current snapshot and is retried on the next tick.
pub fn spawn_periodic_reload(store: Arc<IndexedStore>, interval: Duration) {
    actix_web::rt::spawn(async move {
        let mut ticker = actix_web::rt::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let store = store.clone();
            match web::block(move || store.reload()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::warn!("Periodic reload failed, keeping current index: {e}"),
                Err(e) => log::error!("Periodic reload task failed: {e}"),
            }
        }
    });
}

/// Starts the septic locator API server.
///
/// Loads the feature store at `SEPTIC_DB_PATH`. A store that is missing or
/// was never migrated still serves, reporting every location as not
/// covered and logging the missing schema. Lookups are logged to
/// `SEPTIC_LOOKUP_LOG_PATH`. This is a regular async function; the caller
/// provides the runtime (e.g. via `#[actix_web::main]`) and initializes
/// logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let config = LookupConfig::from_env();
    log::info!(
        "Lookup config: default radius {}m, fallback radius {}m, query timeout {}ms",
        config.default_radius_meters,
        config.coverage_fallback_radius_meters,
        config.query_timeout.as_millis()
    );

    let path = paths::store_path_from_env();
    log::info!("Loading feature store from {}...", path.display());
    let store = Arc::new(IndexedStore::open(
        &path,
        config.coverage_fallback_radius_meters,
    ));

    let log_path = paths::lookup_log_path_from_env();
    let lookup_log = match LookupLog::open(&log_path) {
        Ok(log) => Some(log),
        Err(e) => {
            log::warn!("Lookup log disabled: {}: {e}", log_path.display());
            None
        }
    };

    if let Some(interval) = reload_interval_from_env() {
        log::info!("Reloading the feature store every {}s", interval.as_secs());
        spawn_periodic_reload(store.clone(), interval);
    }

    let state = web::Data::new(AppState::new(
        store,
        lookup_log,
        config,
        Arc::new(TokenAuthorizer::from_env()),
    ));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
