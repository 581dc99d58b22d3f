//! bkd-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads configuration,
//! opens the store, wires middleware, and starts the HTTP server. All route
//! handlers live in `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use bkd_config::{DaemonConfig, LoadedConfig, SmtpConfig, StoreKind};
use bkd_daemon::{routes, state::AppState};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config()?;
    info!(config_hash = %loaded.config_hash, "configuration loaded");
    let cfg = loaded.config;

    let store = open_store(&cfg).await?;
    let mailer = build_mailer(&cfg)?;
    let shared = Arc::new(AppState::new(
        store,
        mailer,
        Arc::new(bkd_notify::TextRenderer::new()),
    ));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_from_config(&cfg.http.cors_allowed_origins));

    let addr = bind_addr(&cfg)?;
    info!("bkd-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// BKD_CONFIG holds a comma-separated list of YAML paths, layered in order.
/// Unset means built-in defaults.
fn load_config() -> anyhow::Result<LoadedConfig> {
    match std::env::var("BKD_CONFIG") {
        Ok(raw) => {
            let paths: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
            bkd_config::load_layered_yaml(&paths)
        }
        Err(_) => bkd_config::load_layered_yaml_from_strings(&["{}"]),
    }
}

async fn open_store(cfg: &DaemonConfig) -> anyhow::Result<Arc<dyn bkd_db::ReservationStore>> {
    // BKD_STORE=memory overrides the config for local development.
    let kind = match std::env::var("BKD_STORE").ok().as_deref() {
        Some("memory") => StoreKind::Memory,
        Some("postgres") => StoreKind::Postgres,
        _ => cfg.store,
    };

    match kind {
        StoreKind::Memory => {
            warn!("running with the in-memory store; nothing is persisted");
            Ok(Arc::new(bkd_db::MemStore::new()))
        }
        StoreKind::Postgres => {
            let pool = bkd_db::connect_from_env(
                cfg.database.max_connections,
                Duration::from_secs(cfg.database.acquire_timeout_secs),
            )
            .await?;
            bkd_db::migrate(&pool).await?;
            let st = bkd_db::status(&pool).await?;
            info!(
                ok = st.ok,
                has_reservations_table = st.has_reservations_table,
                "store status"
            );
            Ok(Arc::new(bkd_db::PgStore::new(pool)))
        }
    }
}

fn build_mailer(cfg: &DaemonConfig) -> anyhow::Result<Arc<dyn bkd_notify::EmailSender>> {
    match &cfg.smtp {
        Some(smtp) => {
            let mailer = bkd_notify::SmtpMailer::new(
                &smtp.host,
                smtp.port,
                &smtp.from_address,
                smtp_credentials(smtp),
            )
            .map_err(|e| anyhow::anyhow!("smtp mailer setup failed: {e}"))?;
            Ok(Arc::new(mailer))
        }
        None => {
            info!("no smtp configured; using console mailer");
            Ok(Arc::new(bkd_notify::ConsoleMailer::new()))
        }
    }
}

/// Credentials come from the environment, via the env var names the config
/// points at. Missing vars downgrade to unauthenticated SMTP.
fn smtp_credentials(smtp: &SmtpConfig) -> Option<(String, String)> {
    let user = std::env::var(smtp.username_env.as_deref()?).ok()?;
    let pass = std::env::var(smtp.password_env.as_deref()?).ok()?;
    Some((user, pass))
}

fn bind_addr(cfg: &DaemonConfig) -> anyhow::Result<SocketAddr> {
    if let Ok(raw) = std::env::var("BKD_DAEMON_ADDR") {
        return raw
            .parse()
            .with_context(|| format!("invalid BKD_DAEMON_ADDR: {raw}"));
    }
    cfg.http
        .bind_addr
        .parse()
        .with_context(|| format!("invalid http.bind_addr: {}", cfg.http.bind_addr))
}

fn cors_from_config(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
