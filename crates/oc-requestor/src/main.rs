//! `oc-requestor` entry point.
//!
//! Thin by design: load config/secrets, build the shared `AppState`, wire
//! the router, and start the HTTP server. All handler logic lives in
//! `routes.rs`, `client.rs` and `tracking.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use oc_notify::HttpSink;
use oc_requestor::{routes, state::AppState};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let config_paths = config_paths_from_env();
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = oc_config::load_or_default(&path_refs).context("loading layered config")?;
    info!(config_hash = %loaded.config_hash, "loaded configuration");

    let secrets = oc_config::secrets::resolve_secrets(&loaded.config_json).context("resolving secrets")?;

    let client = reqwest::Client::new();
    let sink = Arc::new(HttpSink::new(client, loaded.settings.message_bus_base_url.clone(), secrets.gchat_webhook_url.clone()));

    let app = Arc::new(AppState::new(loaded.settings, sink));

    let router = routes::build_router(app).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));
    info!("oc-requestor listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("OC_REQUESTOR_ADDR").ok()?.parse().ok()
}

fn config_paths_from_env() -> Vec<String> {
    std::env::var("OC_REQUESTOR_CONFIG")
        .ok()
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}
