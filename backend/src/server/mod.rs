//! Server construction and middleware wiring.
//!
//! Middleware, outermost first:
//!
//! ```text
//! Trace -> Metrics -> CustomHeaders -> CORS -> ProblemDetails
//!       -> RateLimit -> Vary: Cookie -> Session -> routes
//! ```
//!
//! Trace sits outside everything so the access log and the `trace-id`
//! header cover rendered errors and `/metrics`. The renderer sits outside
//! the limiter so rejected requests get a problem-details body.

mod config;
#[cfg(feature = "metrics")]
pub mod metrics;

pub use config::{AppDependencies, ServerBuildError, ServerConfig};

use actix_session::storage::SessionStore;
use actix_web::body::MessageBody;
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::{Condition, DefaultHeaders};
use actix_web::{App, HttpServer, web};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
use crate::inbound::http::fallback::not_found;
use crate::inbound::http::health::{HealthState, liveness, readiness};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::users;
use crate::inbound::http::validation::{json_config, path_config};
use crate::middleware::{Trace, cors_from_settings};

/// Assemble the application for one worker.
///
/// `store` backs the session middleware: Redis in production, cookies in
/// tests.
pub fn build_app<S>(
    deps: AppDependencies,
    store: S,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
>
where
    S: SessionStore + 'static,
{
    let AppDependencies {
        health,
        http,
        renderer,
        session,
        rate_limit,
        custom_headers,
        cors,
        max_request_size,
        #[cfg(feature = "metrics")]
        metrics,
    } = deps;

    let cors = cors_from_settings(&cors);

    let app = App::new()
        .app_data(health)
        .app_data(http)
        .app_data(json_config(max_request_size))
        .app_data(path_config())
        .configure(users::configure)
        .service(readiness)
        .service(liveness);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let app = app
        .default_service(web::to(not_found))
        .wrap(session.middleware(store))
        .wrap(DefaultHeaders::new().add((header::VARY, "Cookie")))
        .wrap(rate_limit)
        .wrap(renderer)
        .wrap(Condition::new(cors.is_some(), cors.unwrap_or_default()))
        .wrap(custom_headers);

    #[cfg(feature = "metrics")]
    let app = app.wrap(metrics);

    app.wrap(Trace)
}

/// Construct an Actix HTTP server from `config`.
///
/// Readiness is marked once the listener is bound. OS signal handling is
/// left to the caller, which should flip the health state to shutting down
/// and then stop the server through its handle.
///
/// # Errors
/// Propagates [`std::io::Error`] when the settings are invalid or binding
/// the socket fails.
pub fn create_server<S, F>(
    config: &ServerConfig,
    health: web::Data<HealthState>,
    http: web::Data<HttpState>,
    make_store: F,
) -> std::io::Result<Server>
where
    S: SessionStore + 'static,
    F: Fn() -> S + Send + Clone + 'static,
{
    let deps = config
        .dependencies(health.clone(), http)
        .map_err(std::io::Error::other)?;
    let settings = config.settings();

    let server = HttpServer::new(move || build_app(deps.clone(), make_store()))
        .client_request_timeout(settings.read_timeout())
        .client_disconnect_timeout(settings.write_timeout())
        .keep_alive(settings.idle_timeout())
        .shutdown_timeout(settings.shutdown_grace_secs)
        .disable_signals()
        .bind(config.bind_addr())?
        .run();

    health.mark_ready();
    Ok(server)
}
