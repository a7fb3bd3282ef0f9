//! Test helpers for inbound HTTP components.

use std::time::Duration;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Key, SameSite};

use super::session_config::SessionSettings;

/// Session settings for local HTTP tests.
///
/// Generates a fresh key per call, names the cookie `session` and leaves
/// the `Secure` flag off so plain-HTTP test requests carry the cookie.
pub fn test_session_settings() -> SessionSettings {
    SessionSettings {
        key: Key::generate(),
        cookie_name: "session".to_owned(),
        cookie_path: "/".to_owned(),
        cookie_domain: None,
        cookie_secure: false,
        cookie_http_only: true,
        same_site: SameSite::Lax,
        ttl: Duration::from_secs(3600),
    }
}

/// Cookie-backed session middleware configured for tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    test_session_settings().middleware(CookieSessionStore::default())
}
