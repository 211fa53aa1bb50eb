//! # realizhe
//!
//! Storefront API for Realizhe Real Food.
//!
//! Serves the meal-box catalog, a cookie-keyed shopping cart, customer signup
//! and sign-in, and order / custom-plan intake that hands off to WhatsApp.
//!
//! ## Architecture
//!
//! - **Backend**: `Backend` trait over the hosted database, auth and storage
//!   REST APIs, with an in-memory implementation for local runs and tests
//! - **Customers**: signup with a retried customer upsert and auth-user rollback
//! - **Orders**: find-or-create customer with terms acceptance, attachment upload
//! - **HTTP**: Axum router with rate limiting, request IDs, and graceful shutdown

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod backend;
mod cart;
mod catalog;
mod config;
mod customers;
mod error;
mod http;
mod legal;
mod orders;
mod whatsapp;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::backend::{Backend, MemoryBackend, SupabaseBackend};
use crate::cart::CartStore;
use crate::config::{AppConfig, Cli};
use crate::http::{router, AppState, SessionStore};
use crate::orders::SubmissionSettings;

/// Idle carts are kept this long.
const CART_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
const PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;
    info!(
        bind = %config.bind,
        memory_backend = config.memory_backend,
        supabase_url = ?config.supabase.url,
        storage_bucket = %config.supabase.storage_bucket,
        custom_plan_bucket = %config.supabase.custom_plan_bucket,
        custom_plan_bucket_public = config.supabase.custom_plan_bucket_public,
        session_ttl = %humantime::format_duration(config.session_ttl),
        secure_cookies = config.secure_cookies,
        "configuration loaded"
    );

    let backend = build_backend(&config);
    let sessions = SessionStore::new(config.session_ttl);
    let carts = CartStore::new(CART_TTL);
    spawn_store_purge(sessions.clone(), carts.clone(), PURGE_INTERVAL);

    let state = AppState {
        backend,
        sessions,
        carts,
        storage_base: config.supabase.storage_base_url(),
        submissions: SubmissionSettings::from_config(&config),
        secure_cookies: config.secure_cookies,
    };

    let app = router(state);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    if config.bind.ip().is_loopback() {
        warn!(
            bind = %config.bind,
            "binding to loopback; use --bind 0.0.0.0:3000 for LAN access"
        );
    }

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "realizhe listening");

    serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
            info!("shutting down gracefully");
        })
        .await
        .context("server exited with error")
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}

/// Missing hosted-backend settings are reported here but only fail the
/// requests that need them.
fn build_backend(config: &AppConfig) -> Arc<dyn Backend> {
    if config.memory_backend {
        info!(
            products = config.seed_products.len(),
            "using in-memory backend"
        );
        return Arc::new(MemoryBackend::with_products(config.seed_products.clone()));
    }

    let supabase = SupabaseBackend::new(&config.supabase);
    if config.supabase.url.is_none() {
        warn!("SUPABASE_URL is not set; backend requests will fail");
    }
    if !supabase.has_service_key() {
        warn!("SUPABASE_SERVICE_ROLE_KEY is not set; signup and order intake will fail");
    }
    if !supabase.has_anon_key() {
        warn!("SUPABASE_ANON_KEY is not set; sign in will fail");
    }
    Arc::new(supabase)
}

/// Periodically drops expired sessions and idle carts.
fn spawn_store_purge(sessions: SessionStore, carts: CartStore, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let sessions_removed = sessions.purge_expired();
            let carts_removed = carts.purge_expired();
            if sessions_removed + carts_removed > 0 {
                debug!(
                    sessions = sessions_removed,
                    carts = carts_removed,
                    "expired sessions and carts purged"
                );
            }
        }
    });
}
