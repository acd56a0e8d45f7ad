//! Utility module for common functionality

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

static SENSITIVE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)authtoken:?\s*[A-Za-z0-9\-_]+", "authtoken: [REDACTED]"),
        (r"(?i)technician_key[=:]\s*[A-Za-z0-9\-_]+", "technician_key=[REDACTED]"),
        (r"Bearer [A-Za-z0-9\-_.]+", "Bearer [REDACTED]"),
        (r"(?i)api[_-]?key[=:]\s*[A-Za-z0-9\-_]+", "api_key=[REDACTED]"),
        (r"(?i)password[=:]\s*[^\s&]+", "password=[REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

const HIDDEN_ELEMENTS: [&str; 2] = ["script", "style"];

/// Truncate a string to a maximum number of characters, adding ellipsis if truncated
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

/// Sanitize a string for logging (remove credentials)
pub fn sanitize_for_logging(s: &str) -> String {
    let mut result = s.to_string();
    for (re, replacement) in SENSITIVE_PATTERNS.iter() {
        result = re.replace_all(&result, *replacement).into_owned();
    }
    result
}

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Whether `s` is a non-empty run of ASCII digits
pub fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Render announcement HTML as plain text.
///
/// Every text node ends up on its own line; lines are trimmed and blank
/// ones dropped. Script and style contents are discarded and entities are
/// decoded by the parser.
pub fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(html);

    fragment
        .tree
        .root()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map_or(false, |element| HIDDEN_ELEMENTS.contains(&element.name()))
            });
            (!hidden).then_some(&**text)
        })
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("hi", 2), "hi");
        assert_eq!(truncate_string("añoñoño", 5), "añ...");
    }

    #[test]
    fn test_sanitize_for_logging() {
        let output = sanitize_for_logging("Authorization: authtoken: abc123xyz");
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("abc123xyz"));

        let output = sanitize_for_logging("TECHNICIAN_KEY=secret-value");
        assert!(!output.contains("secret-value"));
    }

    #[test]
    fn test_is_all_digits() {
        assert!(is_all_digits("1042"));
        assert!(!is_all_digits(""));
        assert!(!is_all_digits("REQ-77"));
        assert!(!is_all_digits("12 "));
        assert!(!is_all_digits("١٢"));
    }

    #[test]
    fn test_html_to_text() {
        let html = "<p>Planned <b>maintenance</b></p><script>alert(1)</script><br/>Sat &amp; Sun<!-- x -->";
        assert_eq!(html_to_text(html), "Planned\nmaintenance\nSat & Sun");
        assert_eq!(html_to_text(""), "");
        assert_eq!(html_to_text("plain text"), "plain text");
    }

    #[test]
    fn test_html_to_text_decodes_named_and_numeric_entities() {
        assert_eq!(
            html_to_text("<p>Caf&eacute; cerrado &#233; ma&ntilde;ana</p>"),
            "Café cerrado é mañana"
        );
        assert_eq!(html_to_text("<p>&iquest;Dudas?&nbsp;&#x41;</p>"), "¿Dudas?\u{a0}A");
    }

    #[test]
    fn test_html_to_text_ignores_attribute_markup() {
        assert_eq!(html_to_text("<p title=\"a>b\">Hola</p>"), "Hola");
        assert_eq!(
            html_to_text("<style>p { color: red }</style><a href=\"x?a=1&amp;b=2\">Enlace</a>"),
            "Enlace"
        );
    }
}
