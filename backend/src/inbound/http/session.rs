//! Session helpers to keep HTTP handlers free of framework-specific logic.
//!
//! actix-session tracks whether the session state changed during a request
//! and only emits `Set-Cookie` when it did. Handlers that never touch the
//! session therefore never produce a cookie.

use actix_session::Session;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::domain::{CustomError, ErrorKind, UserId};

pub(crate) const LAST_USER_ID_KEY: &str = "last_user_id";

/// Newtype wrapper that exposes higher-level session operations.
#[derive(Clone)]
pub struct SessionContext(Session);

impl SessionContext {
    /// Construct a new wrapper from the underlying Actix session.
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// Remember the user most recently accessed by this client.
    ///
    /// # Errors
    /// Returns `SystemInternal` when the value cannot be serialised into the
    /// session state.
    pub fn remember_user(&self, user_id: UserId) -> Result<(), CustomError> {
        self.0
            .insert(LAST_USER_ID_KEY, user_id.to_string())
            .map_err(|err| {
                ErrorKind::SystemInternal
                    .new()
                    .with_message(format!("failed to write session: {err}"))
            })
    }

    /// Drop the remembered user when it is `user_id`.
    ///
    /// Leaves the session untouched otherwise, so no cookie is emitted.
    pub fn forget_user(&self, user_id: UserId) {
        if self.last_user() == Some(user_id) {
            self.0.remove(LAST_USER_ID_KEY);
        }
    }

    /// The user most recently accessed by this client, if any.
    ///
    /// Unreadable or tampered values are logged and treated as absent.
    pub fn last_user(&self) -> Option<UserId> {
        let raw = match self.0.get::<String>(LAST_USER_ID_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %err, "unreadable session entry");
                return None;
            }
        };
        match raw.parse() {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(error = %err, "invalid user id in session cookie");
                None
            }
        }
    }
}

impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(Self::new) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_session::Session;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test, web};

    fn session_test_app() -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new().wrap(crate::inbound::http::test_utils::test_session_middleware())
    }

    fn fixture_id() -> UserId {
        "0190a5a4-4b1c-7cc3-8f4e-3a1d2c9b8e7f"
            .parse()
            .expect("fixture id")
    }

    #[actix_web::test]
    async fn round_trips_last_user() {
        let app = test::init_service(
            session_test_app()
                .route(
                    "/set",
                    web::get().to(|session: SessionContext| async move {
                        session.remember_user(fixture_id())?;
                        Ok::<_, CustomError>(HttpResponse::Ok())
                    }),
                )
                .route(
                    "/get",
                    web::get().to(|session: SessionContext| async move {
                        let id = session
                            .last_user()
                            .map(|id| id.to_string())
                            .unwrap_or_default();
                        HttpResponse::Ok().body(id)
                    }),
                ),
        )
        .await;

        let set_res =
            test::call_service(&app, test::TestRequest::get().uri("/set").to_request()).await;
        assert_eq!(set_res.status(), StatusCode::OK);
        let cookie = set_res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie set")
            .into_owned();

        let get_res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/get")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(get_res.status(), StatusCode::OK);
        let body = test::read_body(get_res).await;
        assert_eq!(body, "0190a5a4-4b1c-7cc3-8f4e-3a1d2c9b8e7f");
    }

    #[actix_web::test]
    async fn untouched_sessions_emit_no_cookie() {
        let app = test::init_service(session_test_app().route(
            "/read",
            web::get().to(|session: SessionContext| async move {
                HttpResponse::Ok().body(session.last_user().is_some().to_string())
            }),
        ))
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/read").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.response().cookies().count(), 0);
    }

    #[actix_web::test]
    async fn tampered_user_id_is_ignored() {
        let app = test::init_service(
            session_test_app()
                .route(
                    "/set-invalid",
                    web::get().to(|session: Session| async move {
                        session
                            .insert(LAST_USER_ID_KEY, "not-a-uuid")
                            .expect("set invalid user id");
                        HttpResponse::Ok()
                    }),
                )
                .route(
                    "/get",
                    web::get().to(|session: SessionContext| async move {
                        HttpResponse::Ok().body(session.last_user().is_some().to_string())
                    }),
                ),
        )
        .await;

        let set_res = test::call_service(
            &app,
            test::TestRequest::get().uri("/set-invalid").to_request(),
        )
        .await;
        let cookie = set_res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie set")
            .into_owned();

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/get")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(test::read_body(res).await, "false");
    }
}
