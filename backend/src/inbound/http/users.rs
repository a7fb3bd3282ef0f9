//! Users API handlers.
//!
//! ```text
//! GET    /users
//! POST   /users        {"name":"Ada","email":"ada@example.com"}
//! GET    /users/{id}
//! PATCH  /users/{id}   {"name":"Ada L","email":"ada@example.com"}
//! DELETE /users/{id}
//! ```
//!
//! Each handler that resolves a user remembers it in the session under
//! `last_user_id`; deleting that user clears the entry.

use actix_web::{HttpResponse, delete, get, patch, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{CustomError, ErrorKind, User, UserDraft, UserId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::problem_details::ProblemDetails;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{ValidatedJson, WireFields};

/// Body of `POST /users` and `PATCH /users/{id}`.
///
/// Both fields are required; `PATCH` replaces them wholesale.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct UserRequest {
    /// Display name, 1 to 100 characters.
    #[validate(required, length(min = 1, max = 100))]
    #[schema(value_type = String, min_length = 1, max_length = 100)]
    pub name: Option<String>,
    /// Contact email, at most 254 characters; stored lowercase.
    #[validate(required, email, length(max = 254))]
    #[schema(value_type = String, format = Email, max_length = 254)]
    pub email: Option<String>,
}

impl WireFields for UserRequest {
    const FIELDS: &'static [(&'static str, &'static str)] = &[("name", "name"), ("email", "email")];
}

impl UserRequest {
    fn into_draft(self) -> Result<UserDraft, CustomError> {
        match (self.name, self.email) {
            (Some(name), Some(email)) => Ok(UserDraft::new(name, email)),
            (None, _) => Err(ErrorKind::MissingField.new().with_message("name")),
            (_, None) => Err(ErrorKind::MissingField.new().with_message("email")),
        }
    }
}

/// Envelope for a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserEnvelope {
    /// The user.
    pub user: User,
}

/// Envelope for the user collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserList {
    /// Every user, oldest first.
    pub users: Vec<User>,
}

/// List every user.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use users_api::inbound::http::users::list_users;
///
/// let app = App::new().service(list_users);
/// ```
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Users", body = UserList),
        (status = 500, description = "Internal server error", body = ProblemDetails, content_type = "application/problem+json")
    ),
    tags = ["users"],
    operation_id = "listUsers"
)]
#[get("/users")]
pub async fn list_users(state: web::Data<HttpState>) -> ApiResult<web::Json<UserList>> {
    let users = state
        .users
        .list()
        .await
        .map_err(|err| err.checkpoint("list users handler"))?;
    Ok(web::Json(UserList { users }))
}

/// Create a user.
#[utoipa::path(
    post,
    path = "/users",
    request_body = UserRequest,
    responses(
        (status = 201, description = "User created", body = UserEnvelope),
        (status = 400, description = "Invalid request or duplicate email", body = ProblemDetails, content_type = "application/problem+json"),
        (status = 413, description = "Request body too large", body = ProblemDetails, content_type = "application/problem+json"),
        (status = 500, description = "Internal server error", body = ProblemDetails, content_type = "application/problem+json")
    ),
    tags = ["users"],
    operation_id = "createUser"
)]
#[post("/users")]
pub async fn create_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    ValidatedJson(body): ValidatedJson<UserRequest>,
) -> ApiResult<HttpResponse> {
    let user = state
        .users
        .create(body.into_draft()?)
        .await
        .map_err(|err| err.checkpoint("create user handler"))?;
    session.remember_user(user.id)?;
    Ok(HttpResponse::Created().json(UserEnvelope { user }))
}

/// Fetch one user.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "User", body = UserEnvelope),
        (status = 400, description = "Malformed identifier", body = ProblemDetails, content_type = "application/problem+json"),
        (status = 404, description = "No such user", body = ProblemDetails, content_type = "application/problem+json"),
        (status = 500, description = "Internal server error", body = ProblemDetails, content_type = "application/problem+json")
    ),
    tags = ["users"],
    operation_id = "getUser"
)]
#[get("/users/{id}")]
pub async fn get_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    id: web::Path<UserId>,
) -> ApiResult<web::Json<UserEnvelope>> {
    let user = state
        .users
        .get(id.into_inner())
        .await
        .map_err(|err| err.checkpoint("get user handler"))?;
    session.remember_user(user.id)?;
    Ok(web::Json(UserEnvelope { user }))
}

/// Replace a user's name and email.
#[utoipa::path(
    patch,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User identifier")),
    request_body = UserRequest,
    responses(
        (status = 200, description = "User updated", body = UserEnvelope),
        (status = 400, description = "Invalid request or duplicate email", body = ProblemDetails, content_type = "application/problem+json"),
        (status = 404, description = "No such user", body = ProblemDetails, content_type = "application/problem+json"),
        (status = 500, description = "Internal server error", body = ProblemDetails, content_type = "application/problem+json")
    ),
    tags = ["users"],
    operation_id = "updateUser"
)]
#[patch("/users/{id}")]
pub async fn update_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    id: web::Path<UserId>,
    ValidatedJson(body): ValidatedJson<UserRequest>,
) -> ApiResult<web::Json<UserEnvelope>> {
    let user = state
        .users
        .update(id.into_inner(), body.into_draft()?)
        .await
        .map_err(|err| err.checkpoint("update user handler"))?;
    session.remember_user(user.id)?;
    Ok(web::Json(UserEnvelope { user }))
}

/// Delete a user.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Malformed identifier", body = ProblemDetails, content_type = "application/problem+json"),
        (status = 404, description = "No such user", body = ProblemDetails, content_type = "application/problem+json"),
        (status = 500, description = "Internal server error", body = ProblemDetails, content_type = "application/problem+json")
    ),
    tags = ["users"],
    operation_id = "deleteUser"
)]
#[delete("/users/{id}")]
pub async fn delete_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    id: web::Path<UserId>,
) -> ApiResult<HttpResponse> {
    let id = id.into_inner();
    state
        .users
        .delete(id)
        .await
        .map_err(|err| err.checkpoint("delete user handler"))?;
    session.forget_user(id);
    Ok(HttpResponse::NoContent().finish())
}

/// Register every user route on `cfg`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_users)
        .service(create_user)
        .service(get_user)
        .service(update_user)
        .service(delete_user);
}

#[cfg(test)]
mod tests;
