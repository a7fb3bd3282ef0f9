//! Real listener harness for behaviour suites.
//!
//! The harness owns a single-threaded Tokio runtime plus a `LocalSet`
//! because Actix uses `spawn_local` internally. Dropping the fixture stops
//! the server even if a step panicked.

use std::cell::RefCell;
use std::net::TcpListener;
use std::sync::Arc;

use actix_session::storage::CookieSessionStore;
use actix_web::dev::ServerHandle;
use actix_web::{HttpServer, web};
use serde_json::Value;
use tokio::runtime::Runtime;
use tokio::task::LocalSet;

use users_api::config::ServerSettings;
use users_api::inbound::http::health::HealthState;
use users_api::inbound::http::state::HttpState;
use users_api::inbound::http::test_utils::test_session_settings;
use users_api::server::{ServerConfig, build_app};
use users_api::test_support::InMemoryUserRepository;

/// Last response seen by a scenario.
#[derive(Debug, Default)]
pub(crate) struct Exchange {
    pub(crate) status: Option<u16>,
    pub(crate) trace_id: Option<String>,
    pub(crate) set_cookie: Option<String>,
    pub(crate) body: Option<Value>,
}

pub(crate) struct ServerWorld {
    runtime: Runtime,
    local: LocalSet,
    base_url: String,
    server: ServerHandle,
    pub(crate) last: RefCell<Exchange>,
    pub(crate) user_id: RefCell<Option<String>>,
}

impl ServerWorld {
    /// Start a server on an ephemeral port with an empty repository.
    pub(crate) fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");
        let local = LocalSet::new();
        let (base_url, server) = local
            .block_on(&runtime, spawn_server())
            .expect("server starts");
        Self {
            runtime,
            local,
            base_url,
            server,
            last: RefCell::new(Exchange::default()),
            user_id: RefCell::new(None),
        }
    }

    /// Drive `operation` against the running server.
    pub(crate) fn run<R, F>(&self, operation: impl FnOnce(String) -> F) -> R
    where
        F: std::future::Future<Output = R>,
    {
        self.local
            .block_on(&self.runtime, operation(self.base_url.clone()))
    }
}

impl Drop for ServerWorld {
    fn drop(&mut self) {
        let server = self.server.clone();
        self.local.block_on(&self.runtime, async move {
            server.stop(true).await;
        });
    }
}

async fn spawn_server() -> Result<(String, ServerHandle), String> {
    let listener = TcpListener::bind("127.0.0.1:0").map_err(|err| err.to_string())?;
    let addr = listener.local_addr().map_err(|err| err.to_string())?;

    let health = web::Data::new(HealthState::new());
    let http = web::Data::new(HttpState::from_repository(Arc::new(
        InMemoryUserRepository::default(),
    )));
    let deps = ServerConfig::new(ServerSettings::default(), test_session_settings())
        .dependencies(health.clone(), http)
        .map_err(|err| err.to_string())?;

    let server = HttpServer::new(move || build_app(deps.clone(), CookieSessionStore::default()))
        .disable_signals()
        .workers(1)
        .listen(listener)
        .map_err(|err| err.to_string())?
        .run();
    health.mark_ready();

    let handle = server.handle();
    actix_web::rt::spawn(server);
    Ok((format!("http://{addr}"), handle))
}
