//! Port for readiness checks against backing services.

use async_trait::async_trait;

use crate::domain::CustomError;

/// A backing service the server needs before it can take traffic.
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    /// Short name used in logs, e.g. `postgres`.
    fn name(&self) -> &'static str;

    /// Round-trip a trivial request to the service.
    async fn ping(&self) -> Result<(), CustomError>;
}
