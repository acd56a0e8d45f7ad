//! Error mapping for ServiceDesk Plus responses
//!
//! Converts non-success HTTP answers into `ServiceError::Upstream`, keeping
//! the raw body intact and lifting the upstream error code into the context.

use reqwest::StatusCode;
use serde_json::Value;

use super::{ErrorContext, RejectionReason, ServiceError};

/// Tag an upstream rejection from the text it came with.
///
/// Any mention of "template", case-insensitively, is read as a template
/// rejection. The upstream error vocabulary has not been pinned down, so
/// this stays as loose as the text match it replaces.
pub fn classify_rejection(text: &str) -> Option<RejectionReason> {
    if text.to_lowercase().contains("template") {
        Some(RejectionReason::TemplateRejected)
    } else {
        None
    }
}

/// Pull the most specific error code out of an SDP `response_status` block.
///
/// SDP v3 reports `{"response_status": {"status_code": 4000, "messages":
/// [{"status_code": 4001, ...}]}}`; the per-message code wins.
pub fn extract_sdp_error_code(json: &Value) -> Option<String> {
    let status = json.get("response_status")?;
    let status = match status {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let from_messages = status
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|messages| messages.first())
        .and_then(|message| message.get("status_code"))
        .and_then(code_to_string);

    from_messages.or_else(|| status.get("status_code").and_then(code_to_string))
}

fn code_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Map a non-success ServiceDesk Plus answer to a ServiceError
pub fn map_http_error(status: StatusCode, body: &str, context: &mut ErrorContext) -> ServiceError {
    context.service = "servicedesk".to_string();
    context.status_code = Some(status.as_u16());
    context.add("category", classify_http_error(status));

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(code) = extract_sdp_error_code(&json) {
            context.error_code = Some(code);
        }
    }

    ServiceError::upstream(status.as_u16(), body)
}

/// Helper function to classify HTTP errors by category
pub fn classify_http_error(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "validation",
        401 => "authentication",
        403 => "authorization",
        404 => "not_found",
        408 => "timeout",
        429 => "rate_limit",
        500..=599 => "server",
        _ => "unknown",
    }
}
