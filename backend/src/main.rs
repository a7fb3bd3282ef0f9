//! users-api entry-point: loads configuration, prepares storage and serves
//! the REST API until SIGINT or SIGTERM.

use std::io;
use std::sync::Arc;

use actix_session::storage::RedisSessionStore;
use actix_web::dev::ServerHandle;
use actix_web::web;
use mockable::DefaultEnv;
use ortho_config::OrthoConfig;
use tracing::{error, info, warn};

use users_api::config::AppConfig;
use users_api::domain::verify_registry;
use users_api::inbound::http::health::HealthState;
use users_api::inbound::http::session_config::{BuildMode, session_settings_from_env};
use users_api::inbound::http::state::HttpState;
use users_api::outbound::persistence::{
    DbPool, DieselUserRepository, PoolConfig, run_pending_migrations,
};
use users_api::outbound::session_store::RedisPool;
#[cfg(feature = "metrics")]
use users_api::server::metrics::Metrics;
use users_api::server::{ServerConfig, create_server};
use users_api::telemetry::{self, LogFormat};

/// Log `err` with `context` and turn it into an I/O error for `main`.
fn startup_error(context: &'static str, err: impl std::fmt::Display) -> io::Error {
    error!(error = %err, "{context}");
    io::Error::other(format!("{context}: {err}"))
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = AppConfig::load().map_err(|err| io::Error::other(err.to_string()))?;
    let format: LogFormat = config.log_format.parse().map_err(io::Error::other)?;
    if let Err(e) = telemetry::init(&config.log_level, format) {
        warn!(error = %e, "tracing init failed");
    }

    verify_registry().map_err(|err| startup_error("error kind registry is inconsistent", err))?;
    config
        .validate()
        .map_err(|err| startup_error("invalid configuration", err))?;

    let database_url = config
        .postgres
        .database_url()
        .map_err(|err| startup_error("invalid database settings", err))?;
    run_pending_migrations(&database_url)
        .await
        .map_err(|err| startup_error("migrations failed", err))?;
    let pool = DbPool::new(
        PoolConfig::new(database_url)
            .with_max_size(config.postgres.max_conns)
            .with_min_idle(Some(config.postgres.min_conns))
            .with_connection_timeout(config.postgres.connect_timeout())
            .with_max_lifetime(Some(config.postgres.max_conn_lifetime())),
    )
    .await
    .map_err(|err| startup_error("database pool failed", err))?;
    let repository = DieselUserRepository::new(pool.clone())
        .with_query_timeout(config.postgres.query_timeout());

    let redis_url = config
        .redis
        .url()
        .map_err(|err| startup_error("invalid redis settings", err))?;
    let redis_pool = RedisPool::new(&redis_url, config.redis.dial_timeout())
        .map_err(|err| startup_error("redis pool failed", err))?;
    let session_store = RedisSessionStore::new(redis_url)
        .await
        .map_err(|err| startup_error("session store failed", err))?;
    let session = session_settings_from_env(&DefaultEnv::new(), BuildMode::from_debug_assertions())
        .map_err(|err| startup_error("invalid session settings", err))?;

    let server_config = ServerConfig::new(config.server.clone(), session);
    #[cfg(feature = "metrics")]
    let server_config = {
        let prometheus = Metrics::from_settings(&config.prometheus)
            .map_err(|err| startup_error("metrics registration failed", err))?;
        server_config
            .with_error_metrics(prometheus.errors)
            .with_metrics(prometheus.layer)
    };

    let health_state = web::Data::new(
        HealthState::new()
            .with_probe(Arc::new(pool))
            .with_probe(Arc::new(redis_pool))
            .with_ping_timeout(config.health.ping_timeout()),
    );
    let http_state = web::Data::new(HttpState::from_repository(Arc::new(repository)));

    let server = create_server(&server_config, health_state.clone(), http_state, move || {
        session_store.clone()
    })?;
    let (host, port) = server_config.bind_addr();
    info!(%host, port, "listening");

    tokio::spawn(drain_on_signal(server.handle(), health_state));
    server.await?;
    info!("server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM, fail readiness, then stop gracefully.
async fn drain_on_signal(handle: ServerHandle, health: web::Data<HealthState>) {
    wait_for_signal().await;
    info!("shutdown signal received; draining in-flight requests");
    health.mark_shutting_down();
    handle.stop(true).await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(err) => {
            warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl-C only");
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "Ctrl-C handler unavailable");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Ctrl-C handler unavailable");
    }
}
