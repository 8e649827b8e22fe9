//! # Rusty-Wiki Binary
//!
//! Assembles the application from the store plugin selected at compile time.

#[cfg(not(any(feature = "db-sqlite", feature = "db-memory")))]
compile_error!("enable one store backend: `db-sqlite` or `db-memory`");

mod logging;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rw_api::{router, ApiConfig, AppState};
use rw_auth_simple::{Argon2Hasher, MemorySessionStore};
use rw_config::Settings;
use rw_core::policy::DefaultPolicy;
use rw_core::traits::SystemClock;
use rw_core::validation::PasswordPolicy;
use rw_services::{AccountRules, AmmoniaSanitizer, Ports, Services};

const PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    logging::init(&settings);

    let sessions = Arc::new(MemorySessionStore::new(chrono::Duration::hours(
        settings.auth.session_ttl_hours,
    )));
    let ports = store_ports(&settings, sessions.clone()).await?;
    let services = Services::new(ports, account_rules(&settings));
    let state = AppState::new(services, api_config(&settings));

    spawn_purger(sessions, state.limiter.clone());

    let addr: SocketAddr = settings
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", settings.bind_address()))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, environment = settings.environment.as_str(), "rusty-wiki listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("rusty-wiki stopped");
    Ok(())
}

#[cfg(feature = "db-sqlite")]
async fn store_ports(settings: &Settings, sessions: Arc<MemorySessionStore>) -> anyhow::Result<Ports> {
    use secrecy::ExposeSecret;

    let store = rw_db_sqlite::SqliteStore::new(
        settings.database.url.expose_secret(),
        settings.database.max_connections,
    )
    .await
    .context("failed to open the sqlite store")?;
    tracing::info!(max_connections = settings.database.max_connections, "using sqlite store");

    let store = Arc::new(store);
    Ok(ports(store.clone(), store.clone(), store.clone(), store.clone(), store, sessions))
}

#[cfg(all(feature = "db-memory", not(feature = "db-sqlite")))]
async fn store_ports(_settings: &Settings, sessions: Arc<MemorySessionStore>) -> anyhow::Result<Ports> {
    tracing::warn!("using the in-memory store; data is lost on exit");
    let store = Arc::new(rw_db_memory::MemoryStore::new());
    Ok(ports(store.clone(), store.clone(), store.clone(), store.clone(), store, sessions))
}

fn ports(
    users: Arc<dyn rw_core::traits::UserRepo>,
    articles: Arc<dyn rw_core::traits::ArticleRepo>,
    talk: Arc<dyn rw_core::traits::TalkRepo>,
    portals: Arc<dyn rw_core::traits::PortalRepo>,
    mailing_list: Arc<dyn rw_core::traits::MailingListRepo>,
    sessions: Arc<MemorySessionStore>,
) -> Ports {
    Ports {
        users,
        articles,
        talk,
        portals,
        mailing_list,
        hasher: Arc::new(Argon2Hasher),
        sessions,
        sanitizer: Arc::new(AmmoniaSanitizer),
        policy: Arc::new(DefaultPolicy),
        clock: Arc::new(SystemClock),
    }
}

fn account_rules(settings: &Settings) -> AccountRules {
    AccountRules {
        password: PasswordPolicy {
            min_len: settings.auth.password_min_len,
            require_mixed: settings.auth.password_require_mixed,
        },
        max_failed_logins: settings.auth.max_failed_logins,
        lock_duration: chrono::Duration::minutes(settings.auth.lock_minutes),
        admin_usernames: settings.auth.admin_usernames.clone(),
    }
}

fn api_config(settings: &Settings) -> ApiConfig {
    ApiConfig {
        request_timeout: Duration::from_secs(settings.server.request_timeout_secs),
        body_limit_bytes: settings.server.body_limit_bytes,
        allowed_origins: settings.server.allowed_origins.clone(),
        cookie_name: settings.auth.cookie_name.clone(),
        cookie_secure: settings.auth.cookie_secure,
        session_ttl: chrono::Duration::hours(settings.auth.session_ttl_hours),
        rate_limit_window: Duration::from_secs(settings.rate_limit.window_secs),
        rate_limit_max: settings.rate_limit.max_requests,
    }
}

/// Periodically drops expired sessions and rate-limit windows.
fn spawn_purger(sessions: Arc<MemorySessionStore>, limiter: Arc<rw_api::rate_limit::FixedWindowLimiter>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let sessions = sessions.purge_expired();
            let windows = limiter.purge_expired();
            tracing::debug!(sessions, windows, "purged expired entries");
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
