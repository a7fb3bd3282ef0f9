//! Static headers appended to every response.
//!
//! Entries come from `server.custom_headers`. Names and values are parsed
//! once at startup so a typo stops the server instead of every request.

use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use futures_util::future::{LocalBoxFuture, Ready, ready};

use crate::config::CustomHeaderSetting;

/// A configured header that failed to parse.
#[derive(Debug, thiserror::Error)]
pub enum CustomHeaderError {
    /// The name is not a valid HTTP header name.
    #[error("invalid custom header name {name:?}")]
    Name {
        /// Configured name.
        name: String,
    },
    /// The value contains bytes not allowed in a header.
    #[error("invalid value for custom header {name:?}")]
    Value {
        /// Header the value belongs to.
        name: String,
    },
}

#[derive(Debug, Clone)]
struct HeaderRule {
    name: HeaderName,
    value: HeaderValue,
    override_existing: bool,
}

/// Middleware adding the enabled custom headers to each response.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use users_api::config::CustomHeaderSetting;
/// use users_api::middleware::CustomHeaders;
///
/// let headers = CustomHeaders::from_settings(&[CustomHeaderSetting {
///     name: "x-content-type-options".into(),
///     value: "nosniff".into(),
///     enabled: true,
///     override_existing: false,
/// }])
/// .expect("valid header");
/// let app = App::new().wrap(headers);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CustomHeaders {
    rules: Arc<[HeaderRule]>,
}

impl CustomHeaders {
    /// Parse the enabled entries of `settings`.
    ///
    /// # Errors
    /// Returns [`CustomHeaderError`] for the first entry whose name or value
    /// is not a valid header, even if that entry is disabled.
    pub fn from_settings(settings: &[CustomHeaderSetting]) -> Result<Self, CustomHeaderError> {
        let mut rules = Vec::with_capacity(settings.len());
        for setting in settings {
            let name = HeaderName::from_bytes(setting.name.as_bytes()).map_err(|_| {
                CustomHeaderError::Name {
                    name: setting.name.clone(),
                }
            })?;
            let value =
                HeaderValue::from_str(&setting.value).map_err(|_| CustomHeaderError::Value {
                    name: setting.name.clone(),
                })?;
            if setting.enabled {
                rules.push(HeaderRule {
                    name,
                    value,
                    override_existing: setting.override_existing,
                });
            }
        }
        Ok(Self {
            rules: rules.into(),
        })
    }

    /// Whether no header will be added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<S, B> Transform<S, ServiceRequest> for CustomHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = CustomHeadersMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CustomHeadersMiddleware {
            service: Rc::new(service),
            rules: Arc::clone(&self.rules),
        }))
    }
}

/// Service wrapper produced by [`CustomHeaders`].
pub struct CustomHeadersMiddleware<S> {
    service: Rc<S>,
    rules: Arc<[HeaderRule]>,
}

impl<S, B> Service<ServiceRequest> for CustomHeadersMiddleware<S>
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
        let service = Rc::clone(&self.service);
        let rules = Arc::clone(&self.rules);
        Box::pin(async move {
            let mut res = service.call(req).await?;
            let headers = res.headers_mut();
            for rule in rules.iter() {
                if rule.override_existing || !headers.contains_key(&rule.name) {
                    headers.insert(rule.name.clone(), rule.value.clone());
                }
            }
            Ok(res)
        })
    }
}
