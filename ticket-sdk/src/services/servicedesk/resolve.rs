//! Display identifier resolution and status lookup
//!
//! An all-digit display identifier is taken to be the internal id. That is
//! an assumption about the deployment's numbering, not something checked.

use log::debug;
use serde_json::{json, Value};

use crate::core::Transport;
use crate::error::{Result, ServiceError};
use crate::util::{is_all_digits, sanitize_for_logging};

use super::compact::compact_ticket;
use super::extract::extract_items;
use super::listing::REQUESTS_ENDPOINT;
use super::models::TicketStatus;
use super::payload::{input_data, single_record_search};

const REQUESTERS_ENDPOINT: &str = "/api/v3/requesters";

/// Digit-only identifier as a JSON number; `None` for anything else or overflow
fn numeric_id(display_id: &str) -> Option<Value> {
    if !is_all_digits(display_id) {
        return None;
    }
    display_id.parse::<u64>().ok().map(Value::from)
}

/// Internal id carried by a record: numbers as-is, numeric strings as numbers
fn record_id(record: &Value) -> Option<Value> {
    match record.get("id")? {
        Value::Number(n) => Some(Value::Number(n.clone())),
        Value::String(s) if !s.trim().is_empty() => {
            let s = s.trim();
            Some(s.parse::<u64>().map(Value::from).unwrap_or_else(|_| Value::from(s)))
        }
        _ => None,
    }
}

/// First record of a single-record search on `field`
async fn search_one(
    transport: &dyn Transport,
    endpoint: &str,
    field: &str,
    value: &str,
) -> Result<(Option<Value>, Value)> {
    let fields = input_data(&single_record_search(field, value))?;
    let response = transport.get(endpoint, &fields).await?;
    let first = extract_items(&response).into_iter().next();
    Ok((first, response))
}

fn missing_ticket(display_id: &str) -> ServiceError {
    ServiceError::not_found(format!("no ticket with display_id={}", display_id))
}

/// Internal id for a display identifier.
///
/// Digit-only identifiers are converted without a lookup; others cost one
/// single-record search. `NotFound` when the search matches nothing.
pub async fn resolve_request_id(transport: &dyn Transport, display_id: &str) -> Result<Value> {
    let display_id = display_id.trim();

    if let Some(id) = numeric_id(display_id) {
        return Ok(id);
    }

    let (first, _) = search_one(transport, REQUESTS_ENDPOINT, "display_id", display_id).await?;
    let record = first.ok_or_else(|| missing_ticket(display_id))?;

    record_id(&record).ok_or_else(|| {
        ServiceError::parsing(format!(
            "ticket matching display_id={} carries no id",
            display_id
        ))
    })
}

/// Current state of the ticket behind a display identifier.
///
/// A digit-only identifier is fetched directly first. Any failure there,
/// including a response without a `request` mapping, falls back to the
/// search; the direct-fetch error is not reported.
pub async fn status_by_display(transport: &dyn Transport, display_id: &str) -> Result<TicketStatus> {
    let display_id = display_id.trim();

    if is_all_digits(display_id) {
        let endpoint = format!("{}/{}", REQUESTS_ENDPOINT, display_id);
        match transport.get(&endpoint, &[]).await {
            Ok(response) => {
                if let Some(request) = response.get("request").filter(|r| r.is_object()) {
                    return Ok(TicketStatus {
                        ticket: compact_ticket(request),
                        raw: response.clone(),
                    });
                }
                debug!("direct fetch of {} had no request record, searching", display_id);
            }
            Err(err) => {
                debug!(
                    "direct fetch of {} failed, searching: {}",
                    display_id,
                    sanitize_for_logging(&err.to_string())
                );
            }
        }
    }

    let (first, response) = search_one(transport, REQUESTS_ENDPOINT, "display_id", display_id).await?;
    let record = first.ok_or_else(|| missing_ticket(display_id))?;

    Ok(TicketStatus {
        ticket: compact_ticket(&record),
        raw: json!({ "list_response": response }),
    })
}

/// Internal id of the requester registered under `email`
pub async fn requester_id(transport: &dyn Transport, email: &str) -> Result<Value> {
    let (first, _) = search_one(transport, REQUESTERS_ENDPOINT, "email_id", email).await?;

    first
        .as_ref()
        .and_then(record_id)
        .ok_or_else(|| ServiceError::not_found(format!("no requester id for email={}", email)))
}
