//! Note submission
//!
//! Upstream versions disagree on the note field name and envelope. The
//! shapes are tried richest first over multipart, with a plain form post of
//! the first shape as the final fallback.

use serde_json::{json, Value};

use crate::core::Transport;
use crate::error::Result;
use crate::negotiation::{Negotiated, StrategyChain};

use super::payload::input_data;

/// Notes endpoint of one request
pub fn notes_endpoint(request_id: &Value) -> String {
    match request_id {
        Value::String(id) => format!("/api/v3/requests/{}/notes", id),
        other => format!("/api/v3/requests/{}/notes", other),
    }
}

/// `request_note` envelope with the text under `field`
fn request_note(field: &str, text: &str) -> Value {
    json!({
        "request_note": {
            field: text,
            "show_to_requester": true,
            "add_to_linked_requests": false,
        }
    })
}

/// Flat `note` envelope
fn flat_note(text: &str) -> Value {
    json!({
        "note": {
            "description": text,
            "show_to_requester": true,
        }
    })
}

/// Attach `note_text` to the request with internal id `request_id`.
///
/// Returns the upstream answer of the first accepted shape together with
/// the label of that shape. If even the form fallback fails, its error is
/// returned.
pub async fn submit_note(
    transport: &dyn Transport,
    request_id: &Value,
    note_text: &str,
) -> Result<Negotiated<Value>> {
    let endpoint = notes_endpoint(request_id);
    let endpoint = endpoint.as_str();

    let description = input_data(&request_note("description", note_text))?;
    let content = input_data(&request_note("content", note_text))?;
    let flat = input_data(&flat_note(note_text))?;
    let form = description.clone();

    StrategyChain::new("add-note")
        .attempt("multipart-request-note-description", move || async move {
            transport.post_multipart(endpoint, &description).await
        })
        .attempt("multipart-request-note-content", move || async move {
            transport.post_multipart(endpoint, &content).await
        })
        .attempt("multipart-note", move || async move {
            transport.post_multipart(endpoint, &flat).await
        })
        .attempt("form-request-note-description", move || async move {
            transport.post_form(endpoint, &form).await
        })
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_formats_numeric_and_string_ids() {
        assert_eq!(notes_endpoint(&json!(1042)), "/api/v3/requests/1042/notes");
        assert_eq!(notes_endpoint(&json!("77")), "/api/v3/requests/77/notes");
    }

    #[test]
    fn test_envelopes() {
        let note = request_note("content", "hello");
        assert_eq!(note["request_note"]["content"], "hello");
        assert_eq!(note["request_note"]["show_to_requester"], true);
        assert_eq!(note["request_note"]["add_to_linked_requests"], false);
        assert!(note["request_note"].get("description").is_none());

        let flat = flat_note("hello");
        assert_eq!(flat["note"]["description"], "hello");
        assert!(flat["note"].get("add_to_linked_requests").is_none());
    }
}
