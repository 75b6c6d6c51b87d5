//! Error handler for converting AppError to HTTP responses.
//!
//! [`AppError`] implements `IntoResponse` through a single status/code
//! table. [`global_error_handler`] then gives every error leaving the router
//! the same JSON shape and stamps it with the request ID.

use axum::{
    Json,
    body::{Body, to_bytes},
    extract::Request,
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::api::dto::ErrorResponse;
use crate::api::middleware::RequestId;
use crate::error::AppError;
use crate::hierarchy::HierarchyError;

/// Error bodies larger than this are replaced rather than rewritten.
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

fn hierarchy_status(error: &HierarchyError) -> StatusCode {
    match error {
        HierarchyError::AmbiguousParentReference { .. }
        | HierarchyError::InvalidParentPosition { .. }
        | HierarchyError::BlankName { .. }
        | HierarchyError::NameTooLong { .. } => StatusCode::BAD_REQUEST,
        HierarchyError::ParentNotFound { .. } => StatusCode::NOT_FOUND,
        HierarchyError::CycleDetected { .. } => StatusCode::CONFLICT,
    }
}

fn hierarchy_details(error: &HierarchyError) -> Value {
    match error {
        HierarchyError::AmbiguousParentReference {
            index,
            parent_id,
            parent_position,
        } => json!({
            "index": index,
            "parent_id": parent_id,
            "parent_position": parent_position,
        }),
        HierarchyError::InvalidParentPosition {
            index,
            parent_position,
        } => json!({ "index": index, "parent_position": parent_position }),
        HierarchyError::BlankName { index } => json!({ "index": index }),
        HierarchyError::NameTooLong { index, length, max } => {
            json!({ "index": index, "length": length, "max_length": max })
        }
        HierarchyError::ParentNotFound { index, parent_id } => match index {
            Some(index) => json!({ "index": index, "parent_id": parent_id }),
            None => json!({ "parent_id": parent_id }),
        },
        HierarchyError::CycleDetected {
            category_id,
            parent_id,
        } => json!({ "category_id": category_id, "parent_id": parent_id }),
    }
}

/// Maps an AppError variant to its corresponding HTTP status code.
pub fn error_to_status_code(error: &AppError) -> StatusCode {
    match error {
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Duplicate { .. } | AppError::Conflict { .. } => StatusCode::CONFLICT,
        AppError::Validation { .. }
        | AppError::ValidationErrors { .. }
        | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::Hierarchy(inner) => hierarchy_status(inner),
        AppError::ConnectionPool { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Database { .. } | AppError::Configuration { .. } | AppError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Maps an AppError variant to its error code string.
pub fn error_to_code(error: &AppError) -> &'static str {
    match error {
        AppError::NotFound { .. } => "NOT_FOUND",
        AppError::Duplicate { .. } => "DUPLICATE_ENTRY",
        AppError::Validation { .. } | AppError::ValidationErrors { .. } => "VALIDATION_ERROR",
        AppError::BadRequest { .. } => "BAD_REQUEST",
        AppError::Conflict { .. } => "CONFLICT",
        AppError::Hierarchy(inner) => inner.code(),
        AppError::Database { .. } => "DATABASE_ERROR",
        AppError::Configuration { .. } => "CONFIGURATION_ERROR",
        AppError::ConnectionPool { .. } => "SERVICE_UNAVAILABLE",
        AppError::Internal { .. } => "INTERNAL_ERROR",
    }
}

/// Builds the public body for `error`. Server-side failures never expose
/// their source chain.
fn error_body(error: &AppError) -> ErrorResponse {
    let code = error_to_code(error);
    match error {
        AppError::NotFound {
            entity,
            field,
            value,
        } => ErrorResponse::not_found_error(entity, field, value),
        AppError::Duplicate {
            entity,
            field,
            value,
        } => ErrorResponse::duplicate_error(entity, field, value),
        AppError::Validation { field, reason } => ErrorResponse::validation_error(field, reason),
        AppError::ValidationErrors { errors } => {
            ErrorResponse::new(code, "Request validation failed")
                .with_details(json!({ "errors": errors }))
        }
        AppError::BadRequest { message } | AppError::Conflict { message } => {
            ErrorResponse::new(code, message)
        }
        AppError::Hierarchy(inner) => {
            ErrorResponse::new(code, &inner.to_string()).with_details(hierarchy_details(inner))
        }
        AppError::Database { operation, .. } => {
            ErrorResponse::new(code, &format!("Database operation failed: {}", operation))
        }
        AppError::Configuration { .. } => ErrorResponse::new(code, "Service is misconfigured"),
        AppError::ConnectionPool { .. } => {
            ErrorResponse::new(code, "Database connection unavailable")
        }
        AppError::Internal { .. } => ErrorResponse::new(code, "An internal error occurred"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error_to_response_with_request_id(self, None)
    }
}

/// Converts `error` into a JSON response, tagging it with `request_id`.
pub fn error_to_response_with_request_id(error: AppError, request_id: Option<String>) -> Response {
    let status = error_to_status_code(&error);
    if status.is_server_error() {
        tracing::error!(error = ?error, status = status.as_u16(), "Request failed");
    } else {
        tracing::debug!(error = %error, status = status.as_u16(), "Request rejected");
    }

    let mut body = error_body(&error);
    if let Some(id) = request_id {
        body = body.with_request_id(&id);
    }
    (status, Json(body)).into_response()
}

fn default_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "The requested resource was not found",
        StatusCode::METHOD_NOT_ALLOWED => "HTTP method not allowed for this endpoint",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "Unsupported media type",
        StatusCode::PAYLOAD_TOO_LARGE => "Request payload too large",
        StatusCode::REQUEST_TIMEOUT => "Request timeout",
        StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable",
        s if s.is_server_error() => "An internal server error occurred",
        _ => "Bad request - invalid or malformed request",
    }
}

fn status_code_name(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("UNKNOWN_ERROR")
        .to_uppercase()
        .replace([' ', '-'], "_")
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Normalizes every 4xx/5xx response to the [`ErrorResponse`] shape.
///
/// JSON error bodies produced by handlers get the request ID added; plain
/// text bodies from axum's own rejections (unknown route, wrong method,
/// malformed path parameter) are wrapped.
pub async fn global_error_handler(request: Request, next: Next) -> Response {
    let request_id = request.extensions().get::<RequestId>().map(|r| r.0.clone());
    let response = next.run(request).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let json = is_json(&response);
    let (mut parts, body) = response.into_parts();
    let bytes = to_bytes(body, MAX_ERROR_BODY_BYTES).await.unwrap_or_default();

    let mut value = if json {
        serde_json::from_slice::<Value>(&bytes).ok()
    } else {
        None
    }
    .filter(Value::is_object)
    .unwrap_or_else(|| {
        let original = String::from_utf8_lossy(&bytes).trim().to_string();
        let message = if original.is_empty() || status.is_server_error() {
            default_message(status).to_string()
        } else {
            original
        };
        json!(ErrorResponse::new(&status_code_name(status), &message))
    });

    if let (Some(id), Some(object)) = (request_id, value.as_object_mut()) {
        object.entry("request_id").or_insert(Value::String(id));
    }

    let body = serde_json::to_vec(&value).unwrap_or_default();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(body))
}
