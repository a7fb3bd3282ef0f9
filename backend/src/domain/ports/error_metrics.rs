//! Domain port for counting errors rendered to clients.
//!
//! The problem-details renderer reports every error it writes so operators
//! can alert on spikes per code without parsing logs.

use crate::domain::ErrorKind;

/// Counter of rendered errors keyed by kind.
pub trait ErrorMetrics: Send + Sync {
    /// Count one rendered error of `kind`.
    fn record(&self, kind: ErrorKind);
}

/// No-op implementation for when metrics are disabled or in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpErrorMetrics;

impl ErrorMetrics for NoOpErrorMetrics {
    fn record(&self, _kind: ErrorKind) {}
}
