//! Process-wide token-bucket rate limiting.
//!
//! One bucket is shared by every worker. A request arriving with the bucket
//! empty is answered with a `RateLimit` error before it reaches routing; the
//! problem-details renderer turns that into a 429 body. A disabled limiter
//! passes every request through.

use std::num::NonZeroU32;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::debug;

use crate::config::RateLimitSettings;
use crate::domain::ErrorKind;

/// Shared token bucket.
///
/// Clones share the same bucket, so build it once and clone it into each
/// worker's `App`.
///
/// # Examples
/// ```
/// use std::num::NonZeroU32;
/// use actix_web::App;
/// use users_api::middleware::RateLimit;
///
/// let limit = RateLimit::new(NonZeroU32::MIN, NonZeroU32::MIN);
/// let app = App::new().wrap(limit.clone());
/// ```
#[derive(Clone, Default)]
pub struct RateLimit {
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl RateLimit {
    /// Bucket refilled at `rps` tokens per second holding at most `burst`.
    #[must_use]
    pub fn new(rps: NonZeroU32, burst: NonZeroU32) -> Self {
        let quota = Quota::per_second(rps).allow_burst(burst);
        Self {
            limiter: Some(Arc::new(RateLimiter::direct(quota))),
        }
    }

    /// A limiter that never rejects.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Limiter for `settings`; disabled when switched off or when `rps` or
    /// `burst` is zero.
    #[must_use]
    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        let rps = NonZeroU32::new(settings.rps);
        let burst = NonZeroU32::new(settings.burst);
        match (settings.enabled, rps, burst) {
            (true, Some(rps), Some(burst)) => Self::new(rps, burst),
            _ => Self::disabled(),
        }
    }

    /// Whether requests are counted at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

/// Service wrapper produced by [`RateLimit`].
pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let exhausted = self
            .limiter
            .as_ref()
            .is_some_and(|limiter| limiter.check().is_err());
        if exhausted {
            debug!(path = %req.path(), "rate limit exceeded");
            let error = ErrorKind::RateLimit
                .new()
                .with_message("token bucket empty");
            // `error_response` keeps the error attached for the renderer.
            let res = req.error_response(error).map_into_right_body();
            return Box::pin(async move { Ok(res) });
        }

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
