//! HTTP adapter mapping for domain errors.
//!
//! Keeps [`CustomError`] HTTP-agnostic while letting Actix handlers return it
//! directly. The response produced here carries only a status; the
//! problem-details renderer writes the body once the handler has finished.

use actix_web::dev::ServiceResponse;
use actix_web::{HttpMessage, HttpRequest, HttpResponse, ResponseError, http::StatusCode};

use crate::domain::{CustomError, ErrorKind};

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, CustomError>;

/// Errors recorded against a request, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RecordedErrors(Vec<CustomError>);

impl RecordedErrors {
    /// Most recently recorded error.
    pub fn last(&self) -> Option<&CustomError> {
        self.0.last()
    }

    /// Every recorded error, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &CustomError> {
        self.0.iter()
    }
}

/// Attach `error` to the request without returning it.
///
/// Use this when a handler writes its own response body but still wants the
/// failure logged and counted, or when the response status must differ from
/// the kind's default.
pub fn record_error(req: &HttpRequest, error: CustomError) {
    let mut extensions = req.extensions_mut();
    match extensions.get_mut::<RecordedErrors>() {
        Some(recorded) => recorded.0.push(error),
        None => {
            extensions.insert(RecordedErrors(vec![error]));
        }
    }
}

/// The error that decides how a finished request is reported.
///
/// An error returned by the handler wins; otherwise the most recently
/// recorded one is used.
pub fn authoritative_error<B>(res: &ServiceResponse<B>) -> Option<CustomError> {
    let returned = res
        .response()
        .error()
        .and_then(|err| err.as_error::<CustomError>())
        .cloned();
    returned.or_else(|| {
        res.request()
            .extensions()
            .get::<RecordedErrors>()
            .and_then(RecordedErrors::last)
            .cloned()
    })
}

/// HTTP status for each kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation
        | ErrorKind::InvalidFormat
        | ErrorKind::MissingField
        | ErrorKind::InvalidState
        | ErrorKind::ApiRequest
        | ErrorKind::DbDuplicate
        | ErrorKind::DbConstraint
        | ErrorKind::BusinessRule
        | ErrorKind::InvalidOperation => StatusCode::BAD_REQUEST,
        ErrorKind::Authentication | ErrorKind::TokenExpired | ErrorKind::TokenInvalid => {
            StatusCode::UNAUTHORIZED
        }
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::DbNotFound | ErrorKind::ResourceNotFound => StatusCode::NOT_FOUND,
        ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::ApiResponse => StatusCode::BAD_GATEWAY,
        ErrorKind::Unavailable | ErrorKind::ServiceUnavailable | ErrorKind::ResourceExhausted => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Unknown
        | ErrorKind::SystemInternal
        | ErrorKind::DbConnection
        | ErrorKind::DbOperation
        | ErrorKind::OperationFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        status_for(self.kind())
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).finish()
    }
}
