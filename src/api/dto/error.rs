//! Error response DTOs.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;

/// Standard error response format.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "code": "PARENT_NOT_FOUND",
    "message": "Parent category 99 not found (record 4)",
    "details": { "index": 4, "parent_id": 99 },
    "request_id": "4f7c2b9e-8a47-4a1f-9d35-0f2c7a5e1b6d"
}))]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
            request_id: None,
        }
    }

    pub fn not_found_error(entity: &str, field: &str, value: &str) -> Self {
        Self::new(
            "NOT_FOUND",
            &format!("{} with {} '{}' not found", entity, field, value),
        )
        .with_details(json!({ "entity": entity, "field": field, "value": value }))
    }

    pub fn duplicate_error(entity: &str, field: &str, value: &str) -> Self {
        Self::new(
            "DUPLICATE_ENTRY",
            &format!("{} with {} '{}' already exists", entity, field, value),
        )
        .with_details(json!({ "entity": entity, "field": field, "value": value }))
    }

    pub fn validation_error(field: &str, reason: &str) -> Self {
        Self::new("VALIDATION_ERROR", &format!("Invalid {}: {}", field, reason))
            .with_details(json!({ "field": field, "reason": reason }))
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Adds request ID to the error response for correlation.
    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}
