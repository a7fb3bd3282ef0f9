//! Prometheus adapter counting rendered problem-details responses.

use prometheus::{IntCounterVec, Opts, Registry};

use crate::domain::ErrorKind;
use crate::domain::ports::ErrorMetrics;

/// Prometheus-backed error counter.
///
/// # Metric
///
/// - **Name**: `users_api_errors_total`
/// - **Type**: Counter
/// - **Labels**: `code`, the stable error code such as `DB_NOT_FOUND`
pub struct PrometheusErrorMetrics {
    errors_total: IntCounterVec,
}

impl PrometheusErrorMetrics {
    /// Create and register the counter with the given registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name is already registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let errors_total = IntCounterVec::new(
            Opts::new("users_api_errors_total", "Error responses rendered by code"),
            &["code"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;
        Ok(Self { errors_total })
    }
}

impl ErrorMetrics for PrometheusErrorMetrics {
    fn record(&self, kind: ErrorKind) {
        self.errors_total.with_label_values(&[kind.code()]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn counts_by_code() {
        let registry = Registry::new();
        let metrics = PrometheusErrorMetrics::new(&registry).expect("register");

        metrics.record(ErrorKind::DbNotFound);
        metrics.record(ErrorKind::DbNotFound);
        metrics.record(ErrorKind::RateLimit);

        assert_eq!(
            metrics
                .errors_total
                .with_label_values(&["DB_NOT_FOUND"])
                .get(),
            2
        );
        assert_eq!(
            metrics.errors_total.with_label_values(&["RATE_LIMIT"]).get(),
            1
        );
    }

    #[rstest]
    fn double_registration_fails() {
        let registry = Registry::new();
        let _first = PrometheusErrorMetrics::new(&registry).expect("register");
        assert!(PrometheusErrorMetrics::new(&registry).is_err());
    }
}
