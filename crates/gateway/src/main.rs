mod api;
mod cli;
mod emitter;
mod runtime;
mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::http::Method;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use wsa_domain::config::{Config, Severity};
use wsa_store::{PgStore, Store};

use cli::{Cli, Command};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = <Cli as clap::Parser>::parse();

    match parsed.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _path) = cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = cli::load_config()?;
            tracing::info!(path = %config_path, "loaded configuration");
            let issues = config.validate();
            for issue in &issues {
                println!("{:?}: {}", issue.severity, issue.message);
            }
            if issues.iter().any(|i| i.severity == Severity::Error) {
                std::process::exit(1);
            }
            println!("ok");
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wsa_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("research-agent gateway starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            Severity::Warning => tracing::warn!("config: {}", issue.message),
            Severity::Error => tracing::error!("config: {}", issue.message),
        }
    }
    if issues.iter().any(|i| i.severity == Severity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == Severity::Error)
                .count()
        );
    }

    // ── Store ────────────────────────────────────────────────────────
    let database_url = config
        .store
        .database_url
        .clone()
        .expect("validate() guarantees database_url is set");
    let pg = PgStore::connect(&database_url, config.store.pool_size)
        .await
        .context("connecting to Postgres")?;
    pg.migrate().await.context("running migrations")?;
    let store: Arc<dyn Store> = Arc::new(pg);
    tracing::info!("store ready");

    // ── Event Hub ────────────────────────────────────────────────────
    let hub = wsa_hub::EventHub::new();
    tracing::info!("event hub ready");

    // ── Emitter (Journal + Hub) ──────────────────────────────────────
    let emitter = Arc::new(emitter::GatewayEmitter::new(store.clone(), hub.clone()));

    // ── Search adapter ───────────────────────────────────────────────
    let search = Arc::new(
        wsa_search::SearchAdapter::new(config.search.clone())
            .context("initializing search adapter")?,
    );
    tracing::info!(provider = ?config.search.provider, "search adapter ready");

    // ── Page acquirer ────────────────────────────────────────────────
    let fetch = wsa_fetch::PageAcquirer::new(config.fetch.clone(), store.clone());
    tracing::info!("page acquirer ready");

    // ── Model transport + Agent Loop ─────────────────────────────────
    let model_configured = config.model.is_configured();
    let transport = wsa_agent::transport::ModelTransport::new(config.model.clone());
    let agent_search = wsa_search::SearchAdapter::new(config.search.clone())
        .context("initializing agent's search adapter")?;
    let agent = Arc::new(wsa_agent::AgentLoop::new(
        transport,
        agent_search,
        fetch,
        store.clone(),
        config.pipeline.clone(),
    ));
    tracing::info!(model_configured, "agent loop ready");
    if !model_configured {
        tracing::warn!("no model credentials configured — runs will use the degenerate search-only path");
    }

    // ── Orchestrator ─────────────────────────────────────────────────
    let orchestrator = Arc::new(runtime::Orchestrator::new(
        store.clone(),
        emitter,
        search,
        agent,
        config.pipeline.clone(),
        model_configured,
    ));
    tracing::info!("orchestrator ready");

    let state = AppState {
        store,
        hub,
        orchestrator,
    };

    // ── Router ───────────────────────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);
    let app = api::router()
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(64))
        .with_state(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "gateway listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}

/// Builds a permissive or origin-list CORS layer from configuration,
/// grounded on the teacher's `build_cors_layer`, trimmed to drop the
/// wildcard-port-suffix predicate (not needed by this spec's CORS surface).
fn build_cors_layer(cors: &wsa_domain::config::CorsConfig) -> CorsLayer {
    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE]);
    }

    let origins: Vec<axum::http::HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}
