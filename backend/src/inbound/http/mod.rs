//! HTTP inbound adapter exposing REST endpoints.

pub mod error;
pub mod fallback;
pub mod health;
pub mod problem_details;
pub mod session;
pub mod session_config;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod users;
pub mod validation;

pub use error::ApiResult;
