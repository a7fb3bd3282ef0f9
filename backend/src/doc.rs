//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] collects the annotated handlers of the inbound layer (users,
//! health) together with their wire schemas, including the problem-details
//! error body. The session cookie is declared as an optional security
//! scheme since no endpoint requires it.
//!
//! The generated specification is used by Swagger UI (debug builds) and
//! exported via `cargo run --bin openapi-dump` for external tooling.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::User;
use crate::inbound::http::health::{HealthResponse, ProbeStatus};
use crate::inbound::http::problem_details::{InvalidParam, ProblemDetails};
use crate::inbound::http::users::{UserEnvelope, UserList, UserRequest};

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie remembering the last user accessed.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only and used by tooling.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "users-api",
        description = "CRUD over users with problem-details errors and health probes."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::users::list_users,
        crate::inbound::http::users::create_user,
        crate::inbound::http::users::get_user,
        crate::inbound::http::users::update_user,
        crate::inbound::http::users::delete_user,
        crate::inbound::http::health::readiness,
        crate::inbound::http::health::liveness,
    ),
    components(schemas(
        User,
        UserRequest,
        UserEnvelope,
        UserList,
        ProblemDetails,
        InvalidParam,
        HealthResponse,
        ProbeStatus
    )),
    tags(
        (name = "users", description = "User records"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
