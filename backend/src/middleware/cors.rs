//! CORS policy built from `server.cors`.
//!
//! Origins may be `*`, a full origin such as `https://app.example.com`, or a
//! bare hostname that matches any scheme and port on that host.

use actix_cors::Cors;
use url::Url;

use crate::config::CorsSettings;

/// Build the CORS middleware, or `None` when CORS is disabled.
///
/// Settings are expected to have passed `AppConfig::validate`.
///
/// # Examples
/// ```
/// use users_api::config::CorsSettings;
/// use users_api::middleware::cors_from_settings;
///
/// assert!(cors_from_settings(&CorsSettings::default()).is_none());
/// ```
#[must_use]
pub fn cors_from_settings(settings: &CorsSettings) -> Option<Cors> {
    if !settings.enabled {
        return None;
    }

    let mut cors = Cors::default();
    if settings.allow_origins.iter().any(|origin| origin == "*") {
        cors = cors.allow_any_origin();
    } else {
        let mut hosts = Vec::new();
        for origin in &settings.allow_origins {
            if Url::parse(origin).is_ok_and(|url| url.has_host()) {
                cors = cors.allowed_origin(origin.trim_end_matches('/'));
            } else {
                hosts.push(origin.to_ascii_lowercase());
            }
        }
        if !hosts.is_empty() {
            cors = cors.allowed_origin_fn(move |origin, _head| {
                origin
                    .to_str()
                    .ok()
                    .and_then(|origin| Url::parse(origin).ok())
                    .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
                    .is_some_and(|host| hosts.contains(&host))
            });
        }
    }

    let methods: Vec<String> = settings
        .allow_methods
        .iter()
        .map(|method| method.to_ascii_uppercase())
        .collect();
    cors = cors.allowed_methods(methods.iter().map(String::as_str));
    if !settings.allow_headers.is_empty() {
        cors = cors.allowed_headers(settings.allow_headers.iter().map(String::as_str));
    }
    if !settings.expose_headers.is_empty() {
        cors = cors.expose_headers(settings.expose_headers.iter().map(String::as_str));
    }
    if settings.allow_credentials {
        cors = cors.supports_credentials();
    }
    Some(cors.max_age(usize::from(settings.max_age_hours) * 3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::{BoxBody, EitherBody};
    use actix_web::dev::ServiceResponse;
    use actix_web::http::{Method, StatusCode, header};
    use actix_web::{App, HttpResponse, test as actix_test, web};
    use rstest::rstest;

    fn enabled(origins: &[&str]) -> CorsSettings {
        CorsSettings {
            enabled: true,
            allow_origins: origins.iter().map(|o| (*o).to_owned()).collect(),
            allow_methods: vec!["GET".to_owned(), "post".to_owned()],
            allow_headers: vec!["content-type".to_owned()],
            expose_headers: vec!["trace-id".to_owned()],
            allow_credentials: false,
            max_age_hours: 1,
        }
    }

    async fn preflight(
        settings: CorsSettings,
        origin: &str,
    ) -> ServiceResponse<EitherBody<BoxBody>> {
        let cors = cors_from_settings(&settings).expect("cors enabled");
        let app = actix_test::init_service(
            App::new()
                .wrap(cors)
                .route("/users", web::post().to(HttpResponse::Created)),
        )
        .await;
        actix_test::call_service(
            &app,
            actix_test::TestRequest::default()
                .method(Method::OPTIONS)
                .uri("/users")
                .insert_header((header::ORIGIN, origin.to_owned()))
                .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
                .to_request(),
        )
        .await
    }

    #[rstest]
    #[case::wildcard(&["*"], "https://anywhere.test")]
    #[case::exact(&["https://app.example.com"], "https://app.example.com")]
    #[case::hostname(&["localhost"], "http://localhost:5173")]
    #[actix_web::test]
    async fn allowed_origins_pass_preflight(#[case] origins: &[&str], #[case] origin: &str) {
        let res = preflight(enabled(origins), origin).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(
            res.headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
        assert_eq!(
            res.headers()
                .get(header::ACCESS_CONTROL_MAX_AGE)
                .and_then(|v| v.to_str().ok()),
            Some("3600")
        );
    }

    #[actix_web::test]
    async fn unknown_origins_are_refused() {
        let res = preflight(enabled(&["https://app.example.com"]), "https://evil.test").await;

        assert!(
            !res.headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }

    #[rstest]
    fn disabled_settings_install_nothing() {
        assert!(cors_from_settings(&CorsSettings::default()).is_none());
    }
}
