//! Handler tests for the users API over the in-memory repository.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use rstest::rstest;
use serde_json::{Value, json};

use super::*;
use crate::domain::ports::MockUserRepository;
use crate::inbound::http::problem_details::ProblemDetailsRenderer;
use crate::inbound::http::test_utils::test_session_middleware;
use crate::inbound::http::validation::{json_config, path_config};
use crate::test_support::InMemoryUserRepository;

fn app_with(
    state: HttpState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .wrap(test_session_middleware())
        .wrap(ProblemDetailsRenderer::new("https://example.com/").expect("valid base URI"))
        .app_data(web::Data::new(state))
        .app_data(json_config(1024))
        .app_data(path_config())
        .configure(configure)
}

fn in_memory_state() -> HttpState {
    HttpState::from_repository(Arc::new(InMemoryUserRepository::default()))
}

#[actix_web::test]
async fn create_then_fetch_round_trips_the_user() {
    let app = test::init_service(app_with(in_memory_state())).await;

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/users")
            .set_json(json!({ "name": "Ada", "email": "Ada@Example.com" }))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(
        res.response()
            .cookies()
            .any(|cookie| cookie.name() == "session"),
        "creating a user touches the session"
    );
    let created: UserEnvelope = test::read_body_json(res).await;
    assert_eq!(created.user.email, "ada@example.com");
    assert_eq!(created.user.id.as_uuid().get_version_num(), 7);

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/users/{}", created.user.id))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: UserEnvelope = test::read_body_json(res).await;
    assert_eq!(fetched, created);
}

#[actix_web::test]
async fn list_returns_users_in_creation_order() {
    let app = test::init_service(app_with(in_memory_state())).await;
    for (name, email) in [("Ada", "ada@example.com"), ("Grace", "grace@example.com")] {
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/users")
                .set_json(json!({ "name": name, "email": email }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = test::call_service(&app, test::TestRequest::get().uri("/users").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.response().cookies().count(), 0, "listing never writes the session");
    let list: UserList = test::read_body_json(res).await;
    let names: Vec<&str> = list.users.iter().map(|user| user.name.as_str()).collect();
    assert_eq!(names, ["Ada", "Grace"]);
}

#[actix_web::test]
async fn update_replaces_name_and_email() {
    let app = test::init_service(app_with(in_memory_state())).await;
    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/users")
            .set_json(json!({ "name": "Ada", "email": "ada@example.com" }))
            .to_request(),
    )
    .await;
    let created: UserEnvelope = test::read_body_json(res).await;

    let res = test::call_service(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/users/{}", created.user.id))
            .set_json(json!({ "name": "Ada Lovelace", "email": "COUNTESS@example.com" }))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: UserEnvelope = test::read_body_json(res).await;
    assert_eq!(updated.user.name, "Ada Lovelace");
    assert_eq!(updated.user.email, "countess@example.com");
    assert_eq!(updated.user.created_at, created.user.created_at);
    assert!(updated.user.updated_at >= created.user.updated_at);
}

#[actix_web::test]
async fn delete_removes_the_user_once() {
    let app = test::init_service(app_with(in_memory_state())).await;
    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/users")
            .set_json(json!({ "name": "Ada", "email": "ada@example.com" }))
            .to_request(),
    )
    .await;
    let created: UserEnvelope = test::read_body_json(res).await;
    let uri = format!("/users/{}", created.user.id);

    let res = test::call_service(&app, test::TestRequest::delete().uri(&uri).to_request()).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(test::read_body(res).await.is_empty());

    let res = test::call_service(&app, test::TestRequest::delete().uri(&uri).to_request()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["type"], "https://example.com/db-not-found");
}

async fn create(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    name: &str,
    email: &str,
) -> (UserId, actix_web::cookie::Cookie<'static>) {
    let res = test::call_service(
        app,
        test::TestRequest::post()
            .uri("/users")
            .set_json(json!({ "name": name, "email": email }))
            .to_request(),
    )
    .await;
    let cookie = res
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .expect("session cookie set")
        .into_owned();
    let created: UserEnvelope = test::read_body_json(res).await;
    (created.user.id, cookie)
}

#[actix_web::test]
async fn deleting_the_remembered_user_clears_the_session_entry() {
    let app = test::init_service(app_with(in_memory_state())).await;
    let (ada, _) = create(&app, "Ada", "ada@example.com").await;
    let (grace, cookie) = create(&app, "Grace", "grace@example.com").await;

    let other = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/users/{ada}"))
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(other.status(), StatusCode::NO_CONTENT);
    assert_eq!(other.response().cookies().count(), 0);

    let remembered = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/users/{grace}"))
            .cookie(cookie)
            .to_request(),
    )
    .await;
    assert_eq!(remembered.status(), StatusCode::NO_CONTENT);
    assert!(
        remembered
            .response()
            .cookies()
            .any(|cookie| cookie.name() == "session"),
        "clearing the entry rewrites the session"
    );
}

#[actix_web::test]
async fn duplicate_email_is_a_bad_request() {
    let app = test::init_service(app_with(in_memory_state())).await;
    for expected in [StatusCode::CREATED, StatusCode::BAD_REQUEST] {
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/users")
                .set_json(json!({ "name": "Ada", "email": "ada@example.com" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), expected);
        if expected == StatusCode::BAD_REQUEST {
            let body: Value = test::read_body_json(res).await;
            assert_eq!(body["type"], "https://example.com/db-duplicate");
            assert_eq!(body["detail"], "duplicate record detected in database");
        }
    }
}

#[rstest]
#[case(json!({ "email": "ada@example.com" }), json!([{ "name": "name", "reason": "'name' is required" }]))]
#[case(json!({ "name": "", "email": "ada@example.com" }), json!([{ "name": "name", "reason": "'name' must have the required length" }]))]
#[case(json!({ "name": "Ada" }), json!([{ "name": "email", "reason": "'email' is required" }]))]
#[case(json!({}), json!([
    { "name": "name", "reason": "'name' is required" },
    { "name": "email", "reason": "'email' is required" },
]))]
#[case(json!({ "name": "Ada", "email": "nope" }), json!([{ "name": "email", "reason": "'email' must be a valid email address" }]))]
#[actix_web::test]
async fn invalid_bodies_list_each_failing_field(#[case] body: Value, #[case] expected: Value) {
    let app = test::init_service(app_with(in_memory_state())).await;

    let res = test::call_service(
        &app,
        test::TestRequest::post().uri("/users").set_json(body).to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let problem: Value = test::read_body_json(res).await;
    assert_eq!(problem["type"], "https://example.com/validation-error");
    assert_eq!(problem["invalid_params"], expected);
}

#[actix_web::test]
async fn emails_longer_than_the_column_are_rejected() {
    let app = test::init_service(app_with(in_memory_state())).await;
    let domain = format!("{}example.com", format!("{}.", "b".repeat(60)).repeat(3));
    let email = format!("{}@{domain}", "a".repeat(60));
    assert!(email.len() > 254);

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/users")
            .set_json(json!({ "name": "Ada", "email": email }))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let problem: Value = test::read_body_json(res).await;
    assert_eq!(
        problem["invalid_params"],
        json!([{ "name": "email", "reason": "'email' must have the required length" }])
    );
}

#[rstest]
#[case("/users/not-a-uuid")]
#[case("/users/12345")]
#[actix_web::test]
async fn malformed_ids_are_api_request_errors(#[case] uri: &str) {
    let app = test::init_service(app_with(in_memory_state())).await;

    let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let problem: Value = test::read_body_json(res).await;
    assert_eq!(problem["type"], "https://example.com/api-request");
}

#[actix_web::test]
async fn malformed_json_is_an_api_request_error() {
    let app = test::init_service(app_with(in_memory_state())).await;

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/users")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"name\":")
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let problem: Value = test::read_body_json(res).await;
    assert_eq!(problem["type"], "https://example.com/api-request");
}

#[actix_web::test]
async fn oversized_bodies_are_rejected_with_413() {
    let app = test::init_service(app_with(in_memory_state())).await;
    let long_name = "a".repeat(2048);

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/users")
            .set_json(json!({ "name": long_name, "email": "ada@example.com" }))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let problem: Value = test::read_body_json(res).await;
    assert_eq!(problem["status"], 413);
    assert_eq!(problem["title"], "Payload Too Large");
    assert_eq!(problem["type"], "https://example.com/api-request");
}

#[actix_web::test]
async fn repository_failures_hide_their_cause() {
    let mut repo = MockUserRepository::new();
    repo.expect_list().times(1).returning(|| {
        Err(ErrorKind::DbConnection
            .new()
            .with_message("host db-7.internal refused connection"))
    });
    let app = test::init_service(app_with(HttpState::from_repository(Arc::new(repo)))).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/users").to_request()).await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = test::read_body(res).await;
    let text = std::str::from_utf8(&body).expect("utf-8 body");
    assert!(!text.contains("db-7.internal"));
    let problem: Value = serde_json::from_str(text).expect("json body");
    assert!(problem.get("detail").is_none());
}
