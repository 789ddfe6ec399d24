//! # Classroom Relay - Application Entry Point
//!
//! An actix-web server that sits between classroom clients and the speech
//! pipeline (ASR, translation, TTS):
//!
//! - **Realtime**: `/ws/translate` relays frames both ways and records every
//!   transcript the pipeline emits as a session segment
//! - **Push-to-talk**: `/api/v1/translate/push` runs one clip through the
//!   pipeline and returns the translation
//! - **Sessions**: CRUD over lesson sessions with a cache-aside read path
//! - **Post-lesson**: LLM-generated summary, vocabulary and flashcards
//!
//! ## Application Architecture:
//! - **config**: layered configuration (defaults, `config.toml`, environment)
//! - **model**: session, segment and artifact types
//! - **store / cache**: persistence and the cache-aside layer in front of it
//! - **pipeline**: WebSocket link to the speech pipeline and its wire protocol
//! - **relay / push**: the two ways audio reaches the pipeline
//! - **llm**: post-lesson artifact generation
//! - **services / handlers / websocket**: the HTTP surface
//! - **state / health / middleware**: metrics, health checks, request logging

mod cache;
mod config;
mod effect;
mod error;
mod handlers;
mod health;
mod llm;
mod middleware;
mod model;
mod pipeline;
mod push;
mod relay;
mod services;
mod state;
mod store;
mod websocket;

#[cfg(test)]
mod testing;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use cache::{CacheTtls, MemoryCache};
use config::AppConfig;
use handlers::Services;
use llm::OpenRouterGenerator;
use pipeline::WsLinkFactory;
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use store::SqliteSessionStore;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    init_tracing();

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        pipeline = %config.pipeline.ws_url,
        database = %config.storage.database_path,
        "Configuration loaded"
    );
    if config.llm.api_key.is_empty() {
        warn!("OPENROUTER_API_KEY is not set; post-lesson generation will be rejected upstream");
    }

    let ttls = CacheTtls::from_config(&config.cache);
    let services = Services::build(
        Arc::new(SqliteSessionStore::open(&config.storage.database_path)?),
        Arc::new(MemoryCache::new(config.cache.max_capacity, ttls.artifact)),
        Arc::new(WsLinkFactory),
        Arc::new(OpenRouterGenerator::new(&config.llm)?),
        ttls,
        &config.pipeline.ws_url,
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(config);

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(|cfg| services.register(cfg))
            // Middleware runs in reverse registration order on the way in
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::routes)
    })
    .disable_signals()
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task error"),
                Ok(Ok(())) => {}
            }
        }
        signal = shutdown_signal() => {
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for shutdown signals");
            }
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
            // Give open relays a moment to close their pipeline links
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// `RUST_LOG` controls filtering; defaults to debug for this crate.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "classroom_relay=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves on SIGTERM or SIGINT.
async fn shutdown_signal() -> std::io::Result<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received SIGINT");
        }
    }
    Ok(())
}
