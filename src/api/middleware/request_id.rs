//! Request ID propagation.
//!
//! Every request carries an identifier: the caller's `x-request-id` when it
//! is a usable header value, otherwise a fresh UUID v4.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied ID that is reused as is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request ID stored in request extensions for downstream access.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

fn incoming_request_id(request: &Request) -> Option<String> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(String::from)
}

/// Stores a [`RequestId`] in the request extensions and echoes it in the
/// response headers.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id =
        incoming_request_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(header: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/api/categories");
        if let Some(value) = header {
            builder = builder.header(REQUEST_ID_HEADER, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_incoming_request_id_is_reused() {
        assert_eq!(
            incoming_request_id(&request_with(Some("abc-123"))),
            Some("abc-123".to_string())
        );
    }

    #[test]
    fn test_missing_or_unusable_request_id_is_ignored() {
        assert_eq!(incoming_request_id(&request_with(None)), None);
        assert_eq!(incoming_request_id(&request_with(Some("   "))), None);
        let oversized = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        assert_eq!(incoming_request_id(&request_with(Some(&oversized))), None);
    }
}
