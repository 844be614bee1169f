//! Shared HTTP utilities for the username services.
//!
//! Provides the JSON error bodies and time formatting used by api-server,
//! kept framework-agnostic so any front-end can reuse them.

use chrono::{DateTime, SecondsFormat, Utc};
use domain::registration::FieldError;
use domain::validate::RuleKind;
use std::time::SystemTime;

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Resource not found",
        "bad_request" => "Bad request",
        "conflict" => "Resource already exists",
        "unavailable" => "Username availability could not be determined",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Error body for a username refused by one of the rules. The message is
/// the one shown to the user.
pub fn json_rule_rejection(kind: RuleKind, message: &str) -> serde_json::Value {
    json_error_with_message(kind.code(), message)
}

/// Error body listing every failing form field.
///
/// Returns: `{"error": {"code": "invalid_form", "message": ..., "fields": [...]}}`
pub fn json_field_errors(errors: &[FieldError]) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "code": "invalid_form",
            "message": "One or more fields are invalid",
            "fields": errors,
        }
    })
}

// ============================================================================
// Time Utilities
// ============================================================================

/// Convert SystemTime to RFC3339 string (seconds precision, UTC).
pub fn system_time_to_rfc3339(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
