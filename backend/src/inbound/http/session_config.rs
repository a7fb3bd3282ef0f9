//! Session cookie configuration parsing and validation.
//!
//! Settings come from `USERS_API_SESSION_*` environment variables read
//! through [`mockable::Env`] so every rule can be tested without touching
//! the process environment. Release builds insist on explicit security
//! toggles; debug builds warn and fall back to defaults.

use std::path::PathBuf;
use std::time::Duration;

use actix_session::config::PersistentSession;
use actix_session::storage::SessionStore;
use actix_session::SessionMiddleware;
use actix_web::cookie::{Key, SameSite, time};
use mockable::Env;
use tracing::warn;
use zeroize::Zeroize;

const SESSION_KEY_DEFAULT_PATH: &str = "/var/run/secrets/session_key";
const SESSION_KEY_MIN_LEN: usize = 64;
// `Key::derive_from` rejects shorter master keys.
const SESSION_KEY_DERIVE_MIN_LEN: usize = 32;
const DEFAULT_COOKIE_NAME: &str = "session";
const DEFAULT_COOKIE_PATH: &str = "/";
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const COOKIE_NAME_ENV: &str = "USERS_API_SESSION_COOKIE_NAME";
const COOKIE_PATH_ENV: &str = "USERS_API_SESSION_COOKIE_PATH";
const COOKIE_DOMAIN_ENV: &str = "USERS_API_SESSION_COOKIE_DOMAIN";
const COOKIE_SECURE_ENV: &str = "USERS_API_SESSION_COOKIE_SECURE";
const HTTP_ONLY_ENV: &str = "USERS_API_SESSION_HTTP_ONLY";
const SAMESITE_ENV: &str = "USERS_API_SESSION_SAMESITE";
const TTL_ENV: &str = "USERS_API_SESSION_TTL_SECS";
const ALLOW_EPHEMERAL_ENV: &str = "USERS_API_SESSION_ALLOW_EPHEMERAL";
const KEY_FILE_ENV: &str = "USERS_API_SESSION_KEY_FILE";

const BOOL_EXPECTED: &str = "1|0|true|false|yes|no|y|n";
const SAMESITE_EXPECTED: &str = "Strict|Lax|None";
const TTL_EXPECTED: &str = "a positive number of seconds";
const NAME_EXPECTED: &str = "a non-empty cookie name without separators";

/// Build mode for session configuration validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    /// Debug builds tolerate defaults and emit warnings for missing toggles.
    Debug,
    /// Release builds require explicit, valid session toggles.
    Release,
}

impl BuildMode {
    /// Determine the build mode from `cfg!(debug_assertions)`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use users_api::inbound::http::session_config::BuildMode;
    ///
    /// let mode = BuildMode::from_debug_assertions();
    /// if cfg!(debug_assertions) {
    ///     assert_eq!(mode, BuildMode::Debug);
    /// } else {
    ///     assert_eq!(mode, BuildMode::Release);
    /// }
    /// ```
    #[must_use]
    pub const fn from_debug_assertions() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }

    const fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }
}

/// Cookie and key settings for the session middleware.
#[derive(Clone)]
pub struct SessionSettings {
    /// Signing key for session cookies.
    pub key: Key,
    /// Cookie name.
    pub cookie_name: String,
    /// Cookie `Path` attribute.
    pub cookie_path: String,
    /// Cookie `Domain` attribute; host-only when absent.
    pub cookie_domain: Option<String>,
    /// Whether session cookies are marked `Secure`.
    pub cookie_secure: bool,
    /// Whether session cookies are marked `HttpOnly`.
    pub cookie_http_only: bool,
    /// Configured `SameSite` policy for session cookies.
    pub same_site: SameSite,
    /// Lifetime of a session after its last change.
    pub ttl: Duration,
}

impl SessionSettings {
    /// Session middleware over `store` configured from these settings.
    ///
    /// The middleware only writes a cookie when the session state changed
    /// during the request.
    pub fn middleware<S: SessionStore>(&self, store: S) -> SessionMiddleware<S> {
        let ttl = time::Duration::seconds(i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX));
        SessionMiddleware::builder(store, self.key.clone())
            .cookie_name(self.cookie_name.clone())
            .cookie_path(self.cookie_path.clone())
            .cookie_domain(self.cookie_domain.clone())
            .cookie_secure(self.cookie_secure)
            .cookie_http_only(self.cookie_http_only)
            .cookie_same_site(self.same_site)
            .session_lifecycle(PersistentSession::default().session_ttl(ttl))
            .build()
    }
}

/// Errors raised while validating session configuration.
#[derive(thiserror::Error, Debug)]
pub enum SessionConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {name}")]
    MissingEnv { name: &'static str },
    /// A variable is present but contains an invalid value.
    #[error("invalid value for {name}='{value}'; expected {expected}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    /// Reading the session key file failed.
    #[error("failed to read session key at {path}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The session key file is too short for release builds.
    #[error("session key at {path} too short: need >= {min_len} bytes, got {length}")]
    KeyTooShort {
        path: PathBuf,
        length: usize,
        min_len: usize,
    },
    /// `SameSite=None` requires a secure cookie in release builds.
    #[error("USERS_API_SESSION_SAMESITE=None requires USERS_API_SESSION_COOKIE_SECURE=1")]
    InsecureSameSiteNone,
    /// Release builds must not allow ephemeral session keys.
    #[error("USERS_API_SESSION_ALLOW_EPHEMERAL must be 0 in release builds")]
    EphemeralNotAllowed,
}

/// Build session settings from environment variables and build mode.
///
/// # Errors
/// Returns a [`SessionConfigError`] when a release build is missing a
/// required toggle, a value does not parse, or the key file is unusable.
///
/// # Examples
///
/// ```rust
/// use users_api::inbound::http::session_config::{
///     session_settings_from_env, BuildMode,
/// };
/// use mockable::MockEnv;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let key_path = std::env::temp_dir().join("users_api_session_key_example");
/// std::fs::write(&key_path, vec![b'a'; 64])?;
///
/// let key_path = key_path.to_string_lossy().into_owned();
/// let mut env = MockEnv::new();
/// env.expect_string()
///     .returning(move |name| match name {
///         "USERS_API_SESSION_KEY_FILE" => Some(key_path.clone()),
///         "USERS_API_SESSION_COOKIE_SECURE" => Some("1".to_owned()),
///         "USERS_API_SESSION_SAMESITE" => Some("Strict".to_owned()),
///         "USERS_API_SESSION_ALLOW_EPHEMERAL" => Some("0".to_owned()),
///         _ => None,
///     });
///
/// let settings = session_settings_from_env(&env, BuildMode::Release)?;
/// assert!(settings.cookie_secure);
/// assert_eq!(settings.cookie_name, "session");
/// # Ok(())
/// # }
/// ```
pub fn session_settings_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
) -> Result<SessionSettings, SessionConfigError> {
    let cookie_secure = required_flag(env, mode, COOKIE_SECURE_ENV, true)?;
    let same_site = same_site_from_env(env, mode, cookie_secure)?;
    let allow_ephemeral = allow_ephemeral_from_env(env, mode)?;
    let key = session_key_from_env(env, mode, allow_ephemeral)?;

    Ok(SessionSettings {
        key,
        cookie_name: cookie_name_from_env(env)?,
        cookie_path: env
            .string(COOKIE_PATH_ENV)
            .unwrap_or_else(|| DEFAULT_COOKIE_PATH.to_owned()),
        cookie_domain: env.string(COOKIE_DOMAIN_ENV).filter(|d| !d.is_empty()),
        cookie_secure,
        cookie_http_only: optional_flag(env, HTTP_ONLY_ENV, true)?,
        same_site,
        ttl: ttl_from_env(env)?,
    })
}

fn required_flag<E: Env>(
    env: &E,
    mode: BuildMode,
    name: &'static str,
    debug_default: bool,
) -> Result<bool, SessionConfigError> {
    match env.string(name) {
        Some(value) => match parse_bool(&value) {
            Some(flag) => Ok(flag),
            None if mode.is_debug() => {
                warn!(variable = name, value = %value, default = debug_default, "invalid flag; using default");
                Ok(debug_default)
            }
            None => Err(SessionConfigError::InvalidEnv {
                name,
                value,
                expected: BOOL_EXPECTED,
            }),
        },
        None if mode.is_debug() => {
            warn!(variable = name, default = debug_default, "flag not set; using default");
            Ok(debug_default)
        }
        None => Err(SessionConfigError::MissingEnv { name }),
    }
}

fn optional_flag<E: Env>(
    env: &E,
    name: &'static str,
    default: bool,
) -> Result<bool, SessionConfigError> {
    env.string(name).map_or(Ok(default), |value| {
        parse_bool(&value).ok_or(SessionConfigError::InvalidEnv {
            name,
            value,
            expected: BOOL_EXPECTED,
        })
    })
}

fn same_site_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
    cookie_secure: bool,
) -> Result<SameSite, SessionConfigError> {
    let default_same_site = if mode.is_debug() {
        SameSite::Lax
    } else {
        SameSite::Strict
    };

    let Some(value) = env.string(SAMESITE_ENV) else {
        if mode.is_debug() {
            warn!(variable = SAMESITE_ENV, "not set; using default");
            return Ok(default_same_site);
        }
        return Err(SessionConfigError::MissingEnv { name: SAMESITE_ENV });
    };

    match value.to_ascii_lowercase().as_str() {
        "lax" => Ok(SameSite::Lax),
        "strict" => Ok(SameSite::Strict),
        "none" if cookie_secure => Ok(SameSite::None),
        "none" if mode.is_debug() => {
            warn!("SameSite=None without Secure; browsers may reject the cookie");
            Ok(SameSite::None)
        }
        "none" => Err(SessionConfigError::InsecureSameSiteNone),
        _ if mode.is_debug() => {
            warn!(variable = SAMESITE_ENV, value = %value, "invalid value; using default");
            Ok(default_same_site)
        }
        _ => Err(SessionConfigError::InvalidEnv {
            name: SAMESITE_ENV,
            value,
            expected: SAMESITE_EXPECTED,
        }),
    }
}

fn allow_ephemeral_from_env<E: Env>(env: &E, mode: BuildMode) -> Result<bool, SessionConfigError> {
    let allowed = required_flag(env, mode, ALLOW_EPHEMERAL_ENV, false)?;
    if allowed && !mode.is_debug() {
        return Err(SessionConfigError::EphemeralNotAllowed);
    }
    Ok(allowed)
}

fn cookie_name_from_env<E: Env>(env: &E) -> Result<String, SessionConfigError> {
    let Some(value) = env.string(COOKIE_NAME_ENV) else {
        return Ok(DEFAULT_COOKIE_NAME.to_owned());
    };
    let valid = !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if valid {
        Ok(value)
    } else {
        Err(SessionConfigError::InvalidEnv {
            name: COOKIE_NAME_ENV,
            value,
            expected: NAME_EXPECTED,
        })
    }
}

fn ttl_from_env<E: Env>(env: &E) -> Result<Duration, SessionConfigError> {
    let Some(value) = env.string(TTL_ENV) else {
        return Ok(DEFAULT_TTL);
    };
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(SessionConfigError::InvalidEnv {
            name: TTL_ENV,
            value,
            expected: TTL_EXPECTED,
        }),
    }
}

fn session_key_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
    allow_ephemeral: bool,
) -> Result<Key, SessionConfigError> {
    let path = PathBuf::from(
        env.string(KEY_FILE_ENV)
            .unwrap_or_else(|| SESSION_KEY_DEFAULT_PATH.to_owned()),
    );

    match std::fs::read(&path) {
        Ok(mut bytes) => {
            let length = bytes.len();
            if mode == BuildMode::Release && length < SESSION_KEY_MIN_LEN {
                bytes.zeroize();
                return Err(SessionConfigError::KeyTooShort {
                    path,
                    length,
                    min_len: SESSION_KEY_MIN_LEN,
                });
            }
            if length < SESSION_KEY_DERIVE_MIN_LEN {
                bytes.zeroize();
                warn!(
                    path = %path.display(),
                    length,
                    "session key too short to derive from; using temporary key (dev only)"
                );
                return Ok(Key::generate());
            }
            let key = Key::derive_from(&bytes);
            bytes.zeroize();
            Ok(key)
        }
        Err(error) if mode.is_debug() || allow_ephemeral => {
            warn!(
                path = %path.display(),
                error = %error,
                "using temporary session key (dev only)"
            );
            Ok(Key::generate())
        }
        Err(error) => Err(SessionConfigError::KeyRead {
            path,
            source: error,
        }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}
