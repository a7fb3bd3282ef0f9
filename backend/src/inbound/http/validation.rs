//! Request validation and extractor configuration for inbound HTTP adapters.
//!
//! Request bodies are deserialised with [`ValidatedJson`], which runs the
//! `validator` rules declared on the DTO. Failures become a `Validation`
//! error whose cause is a [`FieldErrors`] list naming fields by their JSON
//! names, in the DTO's declared field order.

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{FromRequest, HttpRequest, HttpResponse, dev::Payload, web};
use futures_util::future::LocalBoxFuture;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use validator::{Validate, ValidationErrors};

use crate::domain::ErrorKind;

use super::error::record_error;

/// Static map from struct field identifiers to their wire names.
///
/// Entries are listed in declaration order; failures are reported in the
/// same order.
pub trait WireFields {
    /// `(struct field, JSON name)` pairs.
    const FIELDS: &'static [(&'static str, &'static str)];
}

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// JSON name of the field.
    pub field: String,
    /// Validator rule code, e.g. `required` or `email`.
    pub rule: String,
}

/// Every failed rule of a request body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} field rule(s) failed validation", .0.len())]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    /// Flatten `errors` using the wire names declared by `T`.
    ///
    /// Fields missing from the table keep their struct name and follow the
    /// declared ones in alphabetical order.
    pub fn from_validation<T: WireFields>(errors: &ValidationErrors) -> Self {
        let by_field = errors.field_errors();
        let mut entries = Vec::new();

        for (struct_name, wire_name) in T::FIELDS {
            if let Some(failures) = by_field.get(*struct_name) {
                entries.extend(failures.iter().map(|failure| FieldError {
                    field: (*wire_name).to_owned(),
                    rule: failure.code.to_string(),
                }));
            }
        }

        let mut unmapped: Vec<String> = by_field
            .keys()
            .map(ToString::to_string)
            .filter(|name| !T::FIELDS.iter().any(|(struct_name, _)| struct_name == name))
            .collect();
        unmapped.sort();
        for name in unmapped {
            warn!(field = %name, "validated field has no wire name mapping");
            if let Some(failures) = by_field.get(name.as_str()) {
                entries.extend(failures.iter().map(|failure| FieldError {
                    field: name.clone(),
                    rule: failure.code.to_string(),
                }));
            }
        }

        Self(entries)
    }

    /// Wrap failures collected by a hand-written validator.
    pub fn from_entries(entries: Vec<FieldError>) -> Self {
        Self(entries)
    }

    /// Failures in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Whether no rule failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// JSON body extractor that also enforces the DTO's validation rules.
///
/// # Examples
/// ```
/// use serde::Deserialize;
/// use users_api::inbound::http::validation::{ValidatedJson, WireFields};
/// use validator::Validate;
///
/// #[derive(Deserialize, Validate)]
/// struct Rename {
///     #[validate(required, length(min = 1))]
///     display: Option<String>,
/// }
///
/// impl WireFields for Rename {
///     const FIELDS: &'static [(&'static str, &'static str)] = &[("display", "display")];
/// }
///
/// async fn rename(ValidatedJson(body): ValidatedJson<Rename>) -> String {
///     body.display.unwrap_or_default()
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T> ValidatedJson<T> {
    /// Unwrap the validated body.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> FromRequest for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + WireFields + 'static,
{
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = web::Json::<T>::from_request(req, payload);
        Box::pin(async move {
            let web::Json(value) = fut.await?;
            value.validate().map_err(|errors| {
                let fields = FieldErrors::from_validation::<T>(&errors);
                debug!(?fields, "request body failed validation");
                ErrorKind::Validation.new().with_cause(fields)
            })?;
            Ok(Self(value))
        })
    }
}

/// JSON extractor settings: body size limit and error classification.
///
/// Oversized bodies answer 413; every other JSON failure is an
/// `ApiRequest` error answering 400.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(json_error_handler)
}

fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    match err {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            record_error(
                req,
                ErrorKind::ApiRequest
                    .new()
                    .with_message("request body is too large")
                    .with_cause(err),
            );
            InternalError::from_response(
                "request body is too large",
                HttpResponse::PayloadTooLarge().finish(),
            )
            .into()
        }
        other => ErrorKind::ApiRequest.new().with_cause(other).into(),
    }
}

/// Path extractor settings: malformed segments are `ApiRequest` errors.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| ErrorKind::ApiRequest.new().with_cause(err).into())
}
