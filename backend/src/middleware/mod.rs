//! Request middleware.
//!
//! Purpose: Define middleware components for request lifecycle concerns such
//! as tracing, rate limiting, response headers and CORS.

pub mod cors;
pub mod custom_headers;
pub mod rate_limit;
pub mod trace;

pub use cors::cors_from_settings;
pub use custom_headers::{CustomHeaderError, CustomHeaders};
pub use rate_limit::RateLimit;
pub use trace::Trace;
