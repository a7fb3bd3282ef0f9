//! Domain ports and supporting types for the hexagonal boundary.

mod dependency_probe;
mod error_metrics;
mod user_repository;

pub use dependency_probe::DependencyProbe;
pub use error_metrics::{ErrorMetrics, NoOpErrorMetrics};
pub use user_repository::UserRepository;
#[cfg(any(test, feature = "test-support"))]
pub use user_repository::MockUserRepository;
