//! Health endpoints: liveness and readiness probes for orchestrators.
//!
//! Liveness only proves the worker answers. Readiness pings every backing
//! service under a deadline and reports 503 while any is down, before
//! startup has finished, or once shutdown has begun.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use actix_web::{HttpRequest, HttpResponse, get, http::header, web};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::domain::ports::DependencyProbe;
use crate::domain::{CustomError, ErrorKind};

use super::error::record_error;

const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Probe outcome reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// The server can take traffic.
    Available,
    /// The server or one of its dependencies is down.
    Unavailable,
}

/// Body of both probe endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Probe outcome.
    pub status: ProbeStatus,
}

/// Shared readiness state and the dependencies it checks.
pub struct HealthState {
    ready: AtomicBool,
    shutting_down: AtomicBool,
    probes: Vec<Arc<dyn DependencyProbe>>,
    ping_timeout: Duration,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            probes: Vec::new(),
            ping_timeout: DEFAULT_PING_TIMEOUT,
        }
    }
}

impl HealthState {
    /// Create a state that is not yet ready and checks no dependencies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency checked by readiness, in registration order.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn DependencyProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Deadline for each dependency ping.
    #[must_use]
    pub fn with_ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.ping_timeout = ping_timeout;
        self
    }

    /// Mark startup as finished.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Report not-ready from now on so load balancers drain the instance.
    pub fn mark_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }

    /// Whether startup finished and shutdown has not begun.
    pub fn is_accepting(&self) -> bool {
        self.ready.load(Ordering::Acquire) && !self.shutting_down.load(Ordering::Acquire)
    }

    /// Ping every dependency in order, stopping at the first failure.
    ///
    /// # Errors
    /// Returns the failing dependency's error, or `Timeout` when it did not
    /// answer within the ping deadline.
    pub async fn check_dependencies(&self) -> Result<(), CustomError> {
        for probe in &self.probes {
            match tokio::time::timeout(self.ping_timeout, probe.ping()).await {
                Ok(Ok(())) => debug!(dependency = probe.name(), "dependency answered"),
                Ok(Err(err)) => {
                    return Err(err.checkpoint(format!("ping {}", probe.name())));
                }
                Err(elapsed) => {
                    return Err(ErrorKind::Timeout
                        .new()
                        .with_cause(elapsed)
                        .append_message(format_args!("{} did not answer", probe.name())));
                }
            }
        }
        Ok(())
    }
}

fn probe_response(status: ProbeStatus) -> HttpResponse {
    let mut response = match status {
        ProbeStatus::Available => HttpResponse::Ok(),
        ProbeStatus::Unavailable => HttpResponse::ServiceUnavailable(),
    };
    response
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(HealthResponse { status })
}

/// Readiness probe.
///
/// Returns 200 when every dependency answers and 503 otherwise. The cause
/// of a failure is logged, never returned.
#[utoipa::path(
    get,
    path = "/health/readiness",
    tags = ["health"],
    responses(
        (status = 200, description = "Server is ready to handle traffic", body = HealthResponse),
        (status = 503, description = "Server or a dependency is unavailable", body = HealthResponse)
    )
)]
#[get("/health/readiness")]
pub async fn readiness(req: HttpRequest, state: web::Data<HealthState>) -> HttpResponse {
    if !state.is_accepting() {
        record_error(
            &req,
            ErrorKind::ServiceUnavailable
                .new()
                .with_message("server is starting or shutting down"),
        );
        return probe_response(ProbeStatus::Unavailable);
    }

    match state.check_dependencies().await {
        Ok(()) => probe_response(ProbeStatus::Available),
        Err(err) => {
            record_error(
                &req,
                ErrorKind::ServiceUnavailable
                    .new()
                    .with_cause(err)
                    .checkpoint("readiness"),
            );
            probe_response(ProbeStatus::Unavailable)
        }
    }
}

/// Liveness probe; answers 200 while the worker runs.
#[utoipa::path(
    get,
    path = "/health/liveness",
    tags = ["health"],
    responses(
        (status = 200, description = "Server is alive", body = HealthResponse)
    )
)]
#[get("/health/liveness")]
pub async fn liveness() -> HttpResponse {
    probe_response(ProbeStatus::Available)
}
