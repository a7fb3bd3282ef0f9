//! HTTP server configuration object and helpers.

use std::sync::Arc;

use actix_web::web;

use crate::config::ServerSettings;
use crate::domain::ports::{ErrorMetrics, NoOpErrorMetrics};
use crate::inbound::http::health::HealthState;
use crate::inbound::http::problem_details::{ProblemDetailsRenderer, RendererConfigError};
use crate::inbound::http::session_config::SessionSettings;
use crate::inbound::http::state::HttpState;
use crate::middleware::{CustomHeaderError, CustomHeaders, RateLimit};

#[cfg(feature = "metrics")]
use super::metrics::MetricsLayer;

/// Errors raised while turning settings into app dependencies.
#[derive(Debug, thiserror::Error)]
pub enum ServerBuildError {
    /// `server.problem_base_uri` is not an absolute URI.
    #[error(transparent)]
    Renderer(#[from] RendererConfigError),
    /// An entry of `server.custom_headers` is invalid.
    #[error(transparent)]
    CustomHeader(#[from] CustomHeaderError),
}

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) settings: ServerSettings,
    pub(crate) session: SessionSettings,
    pub(crate) error_metrics: Arc<dyn ErrorMetrics>,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: MetricsLayer,
}

impl ServerConfig {
    /// Construct a server configuration from the `[server]` section and the
    /// session cookie settings.
    #[must_use]
    pub fn new(settings: ServerSettings, session: SessionSettings) -> Self {
        Self {
            settings,
            session,
            error_metrics: Arc::new(NoOpErrorMetrics),
            #[cfg(feature = "metrics")]
            metrics: MetricsLayer::Disabled,
        }
    }

    /// Count rendered errors through `error_metrics`.
    #[must_use]
    pub fn with_error_metrics(mut self, error_metrics: Arc<dyn ErrorMetrics>) -> Self {
        self.error_metrics = error_metrics;
        self
    }

    #[cfg(feature = "metrics")]
    /// Attach Prometheus middleware to the configuration.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsLayer) -> Self {
        self.metrics = metrics;
        self
    }

    /// Return the address pair the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> (String, u16) {
        self.settings.bind_addr()
    }

    /// Listener and middleware settings.
    #[must_use]
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Parse the settings into the values every worker's `App` shares.
    ///
    /// # Errors
    /// Returns [`ServerBuildError`] when the problem base URI or a custom
    /// header is invalid.
    pub fn dependencies(
        &self,
        health: web::Data<HealthState>,
        http: web::Data<HttpState>,
    ) -> Result<AppDependencies, ServerBuildError> {
        let renderer = ProblemDetailsRenderer::new(&self.settings.problem_base_uri)?
            .with_metrics(Arc::clone(&self.error_metrics));
        Ok(AppDependencies {
            health,
            http,
            renderer,
            session: self.session.clone(),
            rate_limit: RateLimit::from_settings(&self.settings.rate_limit),
            custom_headers: CustomHeaders::from_settings(&self.settings.custom_headers)?,
            cors: self.settings.cors.clone(),
            max_request_size: self.settings.max_request_size,
            #[cfg(feature = "metrics")]
            metrics: self.metrics.clone(),
        })
    }
}

/// Everything `build_app` needs, cloned into each worker.
#[derive(Clone)]
pub struct AppDependencies {
    /// Readiness state and probes.
    pub health: web::Data<HealthState>,
    /// Use-cases for the user routes.
    pub http: web::Data<HttpState>,
    /// Problem-details middleware.
    pub renderer: ProblemDetailsRenderer,
    /// Session cookie settings.
    pub session: SessionSettings,
    /// Shared token bucket; disabled unless rate limiting is on.
    pub rate_limit: RateLimit,
    /// Parsed custom headers.
    pub custom_headers: CustomHeaders,
    /// CORS policy, built per worker.
    pub cors: crate::config::CorsSettings,
    /// JSON body limit in bytes.
    pub max_request_size: usize,
    /// HTTP metrics middleware.
    #[cfg(feature = "metrics")]
    pub metrics: MetricsLayer,
}
