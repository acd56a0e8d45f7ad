//! Projection of raw ticket records into `NormalizedTicket`

use serde_json::{Map, Value};

use super::models::NormalizedTicket;

/// Whether a JSON value counts as present: not null, false, zero or empty
pub(crate) fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// First present value among `keys`
pub(crate) fn first_present<'v>(record: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| is_present(value))
}

/// Scalar rendered as text; strings verbatim, numbers and booleans formatted
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Nested mapping under `key`; anything else counts as absent
fn nested<'v>(record: &'v Value, key: &str) -> Option<&'v Map<String, Value>> {
    record.get(key).and_then(Value::as_object)
}

fn nested_text(record: &Value, key: &str, field: &str) -> Option<String> {
    nested(record, key)
        .and_then(|map| map.get(field))
        .and_then(scalar_text)
}

/// Project one raw record. Never fails; missing pieces become `None`.
///
/// `display_id` prefers the internal `id` over `display_id` and is empty
/// when neither is present.
pub fn compact_ticket(record: &Value) -> NormalizedTicket {
    let display_id = first_present(record, &["id", "display_id"])
        .and_then(scalar_text)
        .unwrap_or_default();

    let subject = first_present(record, &["subject", "short_description"]).and_then(scalar_text);

    let status_id = nested(record, "status")
        .and_then(|status| status.get("id"))
        .filter(|id| !id.is_null())
        .cloned();

    NormalizedTicket {
        display_id,
        subject,
        status: nested_text(record, "status", "name"),
        status_id,
        created_time: nested_text(record, "created_time", "display_value"),
        requester_email: nested_text(record, "requester", "email_id"),
        technician: nested_text(record, "technician", "name"),
        site: nested_text(record, "site", "name"),
    }
}
