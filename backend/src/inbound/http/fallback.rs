//! Default service for requests no route matched.

use actix_web::{HttpRequest, HttpResponse};

use crate::domain::ErrorKind;
use crate::inbound::http::ApiResult;

/// Answer unmatched requests with a `ResourceNotFound` error.
///
/// # Examples
/// ```
/// use actix_web::{App, web};
/// use users_api::inbound::http::fallback::not_found;
///
/// let app = App::new().default_service(web::to(not_found));
/// ```
pub async fn not_found(req: HttpRequest) -> ApiResult<HttpResponse> {
    Err(ErrorKind::ResourceNotFound
        .new()
        .append_message(format_args!("no route for {} {}", req.method(), req.path())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, test, web};

    use crate::inbound::http::error::authoritative_error;

    #[actix_web::test]
    async fn unmatched_paths_are_resource_not_found() {
        let app = test::init_service(App::new().default_service(web::to(not_found))).await;

        let res =
            test::call_service(&app, test::TestRequest::get().uri("/nope").to_request()).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let error = authoritative_error(&res).expect("error attached");
        assert_eq!(error.kind(), ErrorKind::ResourceNotFound);
    }
}
