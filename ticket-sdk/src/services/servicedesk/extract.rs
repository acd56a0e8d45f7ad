//! Pulling record lists out of upstream responses
//!
//! Deployments nest the records under different keys. Extraction walks an
//! ordered list of named rules and stops at the first one that yields a list.

use log::debug;
use serde_json::{Map, Value};

/// One way of locating the record list inside a response mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractRule {
    /// The value under this key, if it is a list
    Key(&'static str),

    /// Last resort: the first list-valued entry in insertion order.
    /// Assumes a response carries at most one meaningful list.
    FirstListValue,
}

/// Rules in the order they are tried
pub const EXTRACT_RULES: &[ExtractRule] = &[
    ExtractRule::Key("requests"),
    ExtractRule::Key("list"),
    ExtractRule::Key("data"),
    ExtractRule::Key("response"),
    ExtractRule::FirstListValue,
];

impl ExtractRule {
    pub fn label(&self) -> &'static str {
        match self {
            ExtractRule::Key(key) => *key,
            ExtractRule::FirstListValue => "first-list-value",
        }
    }

    fn apply<'v>(&self, map: &'v Map<String, Value>) -> Option<&'v Vec<Value>> {
        match self {
            ExtractRule::Key(key) => map.get(*key).and_then(Value::as_array),
            ExtractRule::FirstListValue => map.values().find_map(Value::as_array),
        }
    }
}

/// Records contained in `response`, in upstream order.
///
/// A list response is returned as is. Anything that is neither a list nor
/// a mapping, or a mapping no rule matches, yields an empty list.
pub fn extract_items(response: &Value) -> Vec<Value> {
    match response {
        Value::Array(items) => items.clone(),
        Value::Object(map) => {
            for rule in EXTRACT_RULES {
                if let Some(items) = rule.apply(map) {
                    if matches!(rule, ExtractRule::FirstListValue) {
                        debug!("records located by last-resort rule {}", rule.label());
                    }
                    return items.clone();
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_keys_in_priority_order() {
        let response = json!({
            "data": [{"id": 3}],
            "requests": [{"id": 1}, {"id": 2}],
        });
        assert_eq!(extract_items(&response), vec![json!({"id": 1}), json!({"id": 2})]);

        let response = json!({"response_status": {}, "list": [{"id": 9}]});
        assert_eq!(extract_items(&response), vec![json!({"id": 9})]);
    }

    #[test]
    fn test_known_key_with_non_list_value_is_skipped() {
        let response = json!({"requests": {"id": 1}, "data": [{"id": 2}]});
        assert_eq!(extract_items(&response), vec![json!({"id": 2})]);
    }

    #[test]
    fn test_last_resort_scan_uses_insertion_order() {
        let response = json!({
            "response_status": [{"status_code": 2000}],
            "announcements": [{"id": 1}],
        });
        assert_eq!(
            extract_items(&response),
            vec![json!({"status_code": 2000})]
        );
    }

    #[test]
    fn test_list_passthrough_and_empty_cases() {
        let list = json!([{"id": 1}, 2, "x"]);
        assert_eq!(extract_items(&list).len(), 3);

        assert!(extract_items(&json!({"list_info": {"row_count": 0}})).is_empty());
        assert!(extract_items(&json!("text")).is_empty());
        assert!(extract_items(&Value::Null).is_empty());
    }
}
