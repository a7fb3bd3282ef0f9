//! Problem-details rendering of request errors.
//!
//! [`ProblemDetailsRenderer`] wraps the application. After the inner service
//! has produced a response it looks for the authoritative error of the
//! request: the error the handler returned if there is one, otherwise the
//! last error recorded with [`record_error`](super::error::record_error).
//! When such an error exists and nothing has written a body yet, the
//! renderer replaces the empty body with an `application/problem+json`
//! document. Bodies already written are left alone.

use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::body::{BodySize, BoxBody, EitherBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::StatusCode;
use actix_web::http::header::{CONTENT_TYPE, HeaderValue};
use actix_web::Error;
use futures_util::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;
use utoipa::ToSchema;

use crate::domain::ports::{ErrorMetrics, NoOpErrorMetrics};
use crate::domain::{CustomError, TraceId};

use super::error::authoritative_error;
use super::validation::FieldErrors;

/// Media type of rendered error bodies.
pub const PROBLEM_JSON: &str = "application/problem+json";

const VALIDATION_SLUG: &str = "validation-error";
const VALIDATION_DETAIL: &str = "validation failed for one or more fields";
const FALLBACK_VERB: &str = "is invalid";

/// Wire body for failed requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type.
    #[serde(rename = "type")]
    pub type_uri: String,
    /// Reason phrase of `status`.
    pub title: String,
    /// HTTP status code of the response.
    pub status: u16,
    /// Client-safe explanation; absent on server errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Failing fields of a validation error.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_params: Vec<InvalidParam>,
    /// Trace identifier of the request, empty outside a trace scope.
    pub trace_id: String,
}

/// One failing request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InvalidParam {
    /// JSON name of the field.
    pub name: String,
    /// Sentence naming the field and the rule it broke.
    pub reason: String,
}

/// Errors raised while configuring the renderer.
#[derive(Debug, thiserror::Error)]
pub enum RendererConfigError {
    /// The base URI for problem types did not parse.
    #[error("invalid problem type base URI '{uri}': {source}")]
    InvalidBaseUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },
}

struct RendererInner {
    base_uri: String,
    metrics: Arc<dyn ErrorMetrics>,
}

/// Middleware factory that renders request errors as problem details.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use users_api::inbound::http::problem_details::ProblemDetailsRenderer;
///
/// let renderer = ProblemDetailsRenderer::new("https://example.com/problems/")
///     .expect("valid base URI");
/// let _app = App::new().wrap(renderer);
/// ```
#[derive(Clone)]
pub struct ProblemDetailsRenderer {
    inner: Arc<RendererInner>,
}

impl ProblemDetailsRenderer {
    /// Build a renderer whose type URIs start with `base_uri`.
    ///
    /// # Errors
    /// Returns [`RendererConfigError::InvalidBaseUri`] when `base_uri` is not
    /// an absolute URI.
    pub fn new(base_uri: &str) -> Result<Self, RendererConfigError> {
        let parsed = Url::parse(base_uri).map_err(|source| RendererConfigError::InvalidBaseUri {
            uri: base_uri.to_owned(),
            source,
        })?;
        let mut base = parsed.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            inner: Arc::new(RendererInner {
                base_uri: base,
                metrics: Arc::new(NoOpErrorMetrics),
            }),
        })
    }

    /// Count every rendered error through `metrics`.
    #[must_use]
    pub fn with_metrics(self, metrics: Arc<dyn ErrorMetrics>) -> Self {
        Self {
            inner: Arc::new(RendererInner {
                base_uri: self.inner.base_uri.clone(),
                metrics,
            }),
        }
    }

    /// Build the document for `error` answered with `status`.
    pub fn render(&self, error: &CustomError, status: StatusCode) -> ProblemDetails {
        let title = status.canonical_reason().unwrap_or_default().to_owned();
        let trace_id = TraceId::current()
            .map(|id| id.to_string())
            .unwrap_or_default();

        if let Some(fields) = error.find_cause::<FieldErrors>() {
            return ProblemDetails {
                type_uri: format!("{}{VALIDATION_SLUG}", self.inner.base_uri),
                title,
                status: status.as_u16(),
                detail: Some(VALIDATION_DETAIL.to_owned()),
                invalid_params: invalid_params(fields),
                trace_id,
            };
        }

        ProblemDetails {
            type_uri: format!("{}{}", self.inner.base_uri, error.kind().slug()),
            title,
            status: status.as_u16(),
            detail: (!status.is_server_error()).then(|| error.detail().to_owned()),
            invalid_params: Vec::new(),
            trace_id,
        }
    }

    fn finish<B>(&self, res: ServiceResponse<B>) -> ServiceResponse<EitherBody<B>>
    where
        B: MessageBody,
    {
        let Some(error) = authoritative_error(&res) else {
            return res.map_into_left_body();
        };

        let status = if res.status().as_u16() >= 400 {
            res.status()
        } else {
            StatusCode::BAD_REQUEST
        };
        log_error(&error, status);
        self.inner.metrics.record(error.kind());

        if body_written(res.response().body()) {
            debug!(code = error.code(), "response body already written; not rendering");
            return res.map_into_left_body();
        }

        let problem = self.render(&error, status);
        let body = match serde_json::to_vec(&problem) {
            Ok(body) => body,
            Err(err) => {
                error!(error = %err, "failed to serialise problem details");
                return res.map_into_left_body();
            }
        };

        res.map_body(|head, _| {
            head.status = status;
            head.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
            EitherBody::right(BoxBody::new(body))
        })
    }
}

fn body_written<B: MessageBody>(body: &B) -> bool {
    !matches!(body.size(), BodySize::None | BodySize::Sized(0))
}

fn invalid_params(fields: &FieldErrors) -> Vec<InvalidParam> {
    fields
        .iter()
        .map(|failure| {
            let verb = verb_for_rule(&failure.rule).unwrap_or_else(|| {
                error!(
                    rule = %failure.rule,
                    field = %failure.field,
                    "no verb registered for validation rule"
                );
                FALLBACK_VERB
            });
            InvalidParam {
                name: failure.field.clone(),
                reason: format!("'{}' {verb}", failure.field),
            }
        })
        .collect()
}

fn log_error(error: &CustomError, status: StatusCode) {
    let checkpoints: Vec<&str> = error
        .checkpoints()
        .iter()
        .map(|checkpoint| checkpoint.message.as_str())
        .collect();
    if status.is_server_error() {
        error!(
            code = error.code(),
            status = status.as_u16(),
            message = error.message(),
            cause = %error.cause_chain(),
            location = %error.location(),
            ?checkpoints,
            "request failed"
        );
    } else {
        warn!(
            code = error.code(),
            status = status.as_u16(),
            message = error.message(),
            cause = %error.cause_chain(),
            location = %error.location(),
            ?checkpoints,
            "request rejected"
        );
    }
    if tracing::enabled!(tracing::Level::DEBUG) {
        for (depth, frame) in error.stack().iter().enumerate() {
            debug!(code = error.code(), depth, %frame, "error stack frame");
        }
    }
}

/// Human-readable verb for a validation rule code.
///
/// Covers the rules `validator` emits plus the common tag names used by
/// custom validators; returns `None` for anything else.
pub fn verb_for_rule(rule: &str) -> Option<&'static str> {
    let verb = match rule {
        "required" | "required_if" | "required_unless" | "required_with"
        | "required_without" | "required_nested" => "is required",
        "excluded_if" | "excluded_with" | "excluded_without" => "must not be provided",
        "email" => "must be a valid email address",
        "url" | "http_url" => "must be a valid URL",
        "uri" => "must be a valid URI",
        "length" | "len" => "must have the required length",
        "range" => "must be within the allowed range",
        "min" => "must not be below the minimum allowed",
        "max" => "must not exceed the maximum allowed",
        "eq" => "must equal the specified value",
        "ne" => "must not equal the specified value",
        "lt" => "must be less than the specified value",
        "lte" => "must be less than or equal to the specified value",
        "gt" => "must be greater than the specified value",
        "gte" => "must be greater than or equal to the specified value",
        "must_match" | "eqfield" => "must equal the other field's value",
        "nefield" => "must not equal the other field's value",
        "contains" => "must contain the specified substring",
        "does_not_contain" | "excludes" => "must not contain the specified substring",
        "startswith" => "must start with the specified substring",
        "endswith" => "must end with the specified substring",
        "regex" => "must match the required pattern",
        "alpha" => "must contain only letters",
        "alphanum" => "must contain only letters and numbers",
        "numeric" => "must contain only digits",
        "number" => "must be a valid number",
        "boolean" => "must be a boolean (true or false)",
        "hexadecimal" => "must contain only hexadecimal characters",
        "lowercase" => "must be lowercase",
        "uppercase" => "must be uppercase",
        "ascii" => "must contain only ASCII characters",
        "non_control_character" => "must not contain control characters",
        "credit_card" => "must be a valid credit card number",
        "ip" => "must be a valid IP address",
        "ipv4" => "must be a valid IPv4 address",
        "ipv6" => "must be a valid IPv6 address",
        "uuid" => "must be a valid UUID",
        "datetime" => "must be a valid date and time",
        "timezone" => "must be a valid time zone",
        "json" => "must be valid JSON",
        "base64" => "must be a valid base64 string",
        "e164" => "must be a valid E.164 phone number",
        "oneof" => "must be one of the allowed values",
        "unique" => "must contain unique values",
        _ => return None,
    };
    Some(verb)
}

impl<S, B> Transform<S, ServiceRequest> for ProblemDetailsRenderer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ProblemDetailsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ProblemDetailsMiddleware {
            service: Rc::new(service),
            renderer: self.clone(),
        }))
    }
}

/// Service wrapper produced by [`ProblemDetailsRenderer`].
pub struct ProblemDetailsMiddleware<S> {
    service: Rc<S>,
    renderer: ProblemDetailsRenderer,
}

impl<S, B> Service<ServiceRequest> for ProblemDetailsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let renderer = self.renderer.clone();
        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(renderer.finish(res))
        })
    }
}
