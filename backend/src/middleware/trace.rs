//! Tracing middleware attaching a request-scoped trace identifier.
//!
//! Each request runs inside an `http_request` span with its [`TraceId`] in
//! task-local storage, adopted from a valid W3C `traceparent` header or
//! freshly generated. The identifier is echoed in the `trace-id` response
//! header and an access-log event is written once the response is ready.
//!
//! Tokio task-local variables are not inherited across spawned tasks. Use
//! [`TraceId::scope`] when spawning new tasks or moving work onto blocking
//! threads to ensure the active trace identifier propagates correctly.

use std::task::{Context, Poll};
use std::time::Instant;

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{Instrument, error, info, info_span};

use crate::domain::{TRACE_ID_HEADER, TraceId};
use crate::inbound::http::error::authoritative_error;

const TRACEPARENT_HEADER: &str = "traceparent";

/// Tracing middleware attaching a request-scoped trace id and adding a
/// `trace-id` header to every response.
///
/// Handlers can read the trace ID via [`TraceId::current`].
///
/// # Examples
/// ```
/// use actix_web::App;
/// use users_api::Trace;
///
/// let app = App::new().wrap(Trace);
/// ```
#[derive(Clone)]
pub struct Trace;

impl<S, B> Transform<S, ServiceRequest> for Trace
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TraceMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TraceMiddleware { service }))
    }
}

/// Service wrapper produced by [`Trace`].
///
/// Applications should not use this type directly.
pub struct TraceMiddleware<S> {
    service: S,
}

fn incoming_trace_id(req: &ServiceRequest) -> TraceId {
    req.headers()
        .get(TRACEPARENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(TraceId::from_traceparent)
        .unwrap_or_else(TraceId::generate)
}

impl<S, B> Service<ServiceRequest> for TraceMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let trace_id = incoming_trace_id(&req);
        let method = req.method().clone();
        let path = req.path().to_owned();
        let client_ip = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("-")
            .to_owned();
        let span = info_span!("http_request", %trace_id, %method, %path);
        let started = Instant::now();
        let fut = span.in_scope(|| self.service.call(req));

        let handled = async move {
            let mut res = match fut.await {
                Ok(res) => res,
                Err(err) => {
                    error!(
                        error = %err,
                        client_ip = %client_ip,
                        "request failed before a response was built"
                    );
                    return Err(err);
                }
            };
            match HeaderValue::from_str(&trace_id.to_string()) {
                Ok(value) => {
                    res.response_mut()
                        .headers_mut()
                        .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
                }
                Err(error) => {
                    error!(
                        %error,
                        trace_id = %trace_id,
                        "failed to encode trace identifier header"
                    );
                }
            }

            let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            let error_code = authoritative_error(&res).map(|err| err.code());
            info!(
                status = res.status().as_u16(),
                %method,
                %path,
                latency_ms,
                client_ip = %client_ip,
                error_code,
                "request completed"
            );
            Ok(res)
        };
        Box::pin(TraceId::scope(trace_id, handled.instrument(span)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, test, web};
    use rstest::rstest;

    async fn test_trace_with_handler<F, Fut, Res>(
        handler: F,
        req: test::TestRequest,
    ) -> (
        actix_web::dev::ServiceResponse<actix_web::body::BoxBody>,
        String,
    )
    where
        F: Fn() -> Fut + Clone + 'static,
        Fut: std::future::Future<Output = Res> + 'static,
        Res: actix_web::Responder + 'static,
    {
        let app =
            test::init_service(App::new().wrap(Trace).route("/", web::get().to(handler))).await;
        let res = test::call_service(&app, req.uri("/").to_request()).await;
        let trace_id = res
            .headers()
            .get(TRACE_ID_HEADER)
            .expect("trace id header")
            .to_str()
            .expect("header is ascii")
            .to_owned();
        (res, trace_id)
    }

    async fn echo_trace_id() -> HttpResponse {
        let id = TraceId::current().expect("trace id in scope");
        HttpResponse::Ok().body(id.to_string())
    }

    #[actix_web::test]
    async fn exposes_trace_id_in_handler() {
        let (res, trace_id) =
            test_trace_with_handler(echo_trace_id, test::TestRequest::get()).await;
        let body = test::read_body(res).await;
        let body = std::str::from_utf8(&body).expect("utf8 body");
        assert_eq!(trace_id, body);
    }

    #[actix_web::test]
    async fn adopts_a_valid_traceparent() {
        let req = test::TestRequest::get().insert_header((
            TRACEPARENT_HEADER,
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        ));
        let (_, trace_id) = test_trace_with_handler(echo_trace_id, req).await;
        assert_eq!(trace_id, "4bf92f35-77b3-4da6-a3ce-929d0e0e4736");
    }

    #[rstest]
    #[case("garbage")]
    #[case("00-00000000000000000000000000000000-00f067aa0ba902b7-01")]
    #[actix_web::test]
    async fn invalid_traceparent_gets_a_fresh_id(#[case] header: &str) {
        let req = test::TestRequest::get().insert_header((TRACEPARENT_HEADER, header.to_owned()));
        let (_, trace_id) = test_trace_with_handler(echo_trace_id, req).await;
        let parsed: TraceId = trace_id.parse().expect("uuid trace id");
        assert_eq!(parsed.as_uuid().get_version_num(), 4);
    }

    #[actix_web::test]
    async fn distinct_requests_get_distinct_ids() {
        let (_, first) = test_trace_with_handler(echo_trace_id, test::TestRequest::get()).await;
        let (_, second) = test_trace_with_handler(echo_trace_id, test::TestRequest::get()).await;
        assert_ne!(first, second);
    }
}
