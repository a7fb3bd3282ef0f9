//! Optional Prometheus metrics middleware wrapper.
//!
//! [`MetricsLayer`] is always a valid middleware: when metrics are turned
//! off it only boxes the inner service, so the app has one shape either way.

use std::sync::Arc;

use actix_service::{
    Service, ServiceExt as _, Transform,
    boxed::{self, BoxService},
};
use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Compat;
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use futures_util::future::LocalBoxFuture;

use crate::config::PrometheusSettings;
use crate::domain::ports::{ErrorMetrics, NoOpErrorMetrics};
use crate::outbound::metrics::PrometheusErrorMetrics;

/// Namespace prefixed to the HTTP metrics.
pub const METRICS_NAMESPACE: &str = "users_api";

/// Errors raised while registering metrics.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The HTTP metrics middleware could not be built.
    #[error("failed to build HTTP metrics: {message}")]
    Middleware {
        /// Builder error text.
        message: String,
    },
    /// The error counter clashed with an existing metric.
    #[error("failed to register error metrics")]
    Register(#[from] prometheus::Error),
}

/// HTTP metrics middleware, or a pass-through when metrics are disabled.
#[derive(Clone)]
pub enum MetricsLayer {
    /// Record request metrics and answer the exposition path.
    Enabled(Arc<PrometheusMetrics>),
    /// Only box the inner service.
    Disabled,
}

impl MetricsLayer {
    /// Wrap `metrics` when present.
    #[must_use]
    pub fn from_option(metrics: Option<PrometheusMetrics>) -> Self {
        match metrics {
            Some(metrics) => Self::Enabled(Arc::new(metrics)),
            None => Self::Disabled,
        }
    }
}

/// Request metrics and the error counter sharing one registry.
pub struct Metrics {
    /// Middleware recording request duration and answering the exposition path.
    pub layer: MetricsLayer,
    /// Counter of rendered problem-details responses.
    pub errors: Arc<dyn ErrorMetrics>,
}

impl Metrics {
    /// Build both halves from `settings`.
    ///
    /// # Errors
    /// Returns [`MetricsError`] when the middleware cannot be built or the
    /// error counter cannot be registered.
    pub fn from_settings(settings: &PrometheusSettings) -> Result<Self, MetricsError> {
        if !settings.enabled {
            return Ok(Self::disabled());
        }
        let prometheus = PrometheusMetricsBuilder::new(METRICS_NAMESPACE)
            .endpoint(&settings.metrics_path)
            .build()
            .map_err(|err| MetricsError::Middleware {
                message: err.to_string(),
            })?;
        let errors = PrometheusErrorMetrics::new(&prometheus.registry)?;
        Ok(Self {
            layer: MetricsLayer::from_option(Some(prometheus)),
            errors: Arc::new(errors),
        })
    }

    /// No request metrics and a no-op error counter.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            layer: MetricsLayer::Disabled,
            errors: Arc::new(NoOpErrorMetrics),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsLayer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = BoxService<ServiceRequest, ServiceResponse<BoxBody>, actix_web::Error>;
    type Future = LocalBoxFuture<'static, Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        match self.clone() {
            MetricsLayer::Enabled(metrics) => {
                let fut = Compat::new((*metrics).clone()).new_transform(service);
                Box::pin(async move {
                    let svc = fut.await?;
                    Ok(boxed::service(svc))
                })
            }
            MetricsLayer::Disabled => Box::pin(async move {
                let svc = service.map(|res: ServiceResponse<B>| res.map_into_boxed_body());
                Ok(boxed::service(svc))
            }),
        }
    }
}
