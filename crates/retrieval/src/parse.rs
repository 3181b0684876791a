//! Defensive parsing of LLM output
//!
//! PRIVATE MODULE - Not exported from crate
//!
//! Nothing an LLM returns is structurally guaranteed; every parser
//! here degrades instead of raising.

use catalogchat_core::types::IntentMap;
use regex::Regex;
use serde_json::Value;

const MAX_ERROR_SNIPPET: usize = 200;

/// Greedy: the widest brace-delimited span
const BRACE_PATTERN: &str = r"(?s)\{.*\}";
const BRACKET_PATTERN: &str = r"(?s)\[.*\]";

/// Truncate LLM output for inclusion in error messages and logs
pub fn truncate_for_error(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_SNIPPET {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(MAX_ERROR_SNIPPET).collect();
        format!("{truncated}...")
    }
}

/// Greedy spans matching `pattern` inside `text`. The patterns are
/// literals, so compilation cannot realistically fail; an error simply
/// yields no spans and the caller's fallback chain continues.
fn scan_spans<'t>(pattern: &str, text: &'t str) -> Vec<&'t str> {
    match Regex::new(pattern) {
        Ok(re) => re.find_iter(text).map(|m| m.as_str()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Coerce a parsed JSON object into an IntentMap, stringifying
/// non-string values
fn object_to_intent_map(value: Value) -> Option<IntentMap> {
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .map(|(k, v)| {
                let term = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), term)
            })
            .collect(),
    )
}

/// Parse an LLM intent-extraction response into an IntentMap.
///
/// Ordered fallback chain, each attempt independent:
/// 1. parse the trimmed response directly as JSON
/// 2. scan for brace-delimited substrings (greedy) and parse each
/// 3. take the span between the first `{` and last `}`, normalize
///    single quotes to double quotes, and retry
/// 4. give up and return an empty map
pub fn parse_intent_response(response: &str) -> IntentMap {
    let trimmed = response.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(map) = object_to_intent_map(value) {
            return map;
        }
    }

    for span in scan_spans(BRACE_PATTERN, trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            if let Some(map) = object_to_intent_map(value) {
                return map;
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            let normalized = trimmed[start..=end].replace('\'', "\"");
            if let Ok(value) = serde_json::from_str::<Value>(&normalized) {
                if let Some(map) = object_to_intent_map(value) {
                    return map;
                }
            }
        }
    }

    IntentMap::new()
}

/// Parse a JSON array of document numbers out of a relevance-filter
/// response. Returns None when no array can be recovered, which the
/// caller treats as "keep everything".
pub fn parse_keep_list(response: &str) -> Option<Vec<usize>> {
    let trimmed = response.trim();

    let parse = |s: &str| -> Option<Vec<usize>> {
        let value: Value = serde_json::from_str(s).ok()?;
        let array = value.as_array()?;
        array
            .iter()
            .map(|v| v.as_u64().map(|n| n as usize))
            .collect()
    };

    if let Some(list) = parse(trimmed) {
        return Some(list);
    }

    scan_spans(BRACKET_PATTERN, trimmed)
        .into_iter()
        .find_map(parse)
}

/// Recover the SQL statement from an agent response.
///
/// Accepts `{"sql": "..."}` (directly or embedded in surrounding
/// text), a fenced code block, or a bare statement starting with
/// SELECT/WITH.
pub fn parse_sql_response(response: &str) -> Option<String> {
    let trimmed = response.trim();

    let from_object = |s: &str| -> Option<String> {
        let value: Value = serde_json::from_str(s).ok()?;
        let sql = value.get("sql")?.as_str()?.trim();
        (!sql.is_empty()).then(|| sql.to_string())
    };

    if let Some(sql) = from_object(trimmed) {
        return Some(sql);
    }

    if let Some(sql) = scan_spans(BRACE_PATTERN, trimmed)
        .into_iter()
        .find_map(|span| from_object(span))
    {
        return Some(sql);
    }

    // Fenced block: ```sql ... ``` or ``` ... ```
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = rest.strip_prefix("sql").unwrap_or(rest);
        if let Some(end) = body.rfind("```") {
            let candidate = body[..end].trim();
            if !candidate.is_empty() {
                return Some(candidate.to_string());
            }
        }
    }

    let lowered = trimmed.to_lowercase();
    if lowered.starts_with("select") || lowered.starts_with("with") {
        return Some(trimmed.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expected_map(pairs: &[(&str, &str)]) -> IntentMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_intent_plain_json() {
        let map = parse_intent_response(r#"{"item1": "employees"}"#);
        assert_eq!(map, expected_map(&[("item1", "employees")]));
    }

    #[test]
    fn test_intent_markdown_fenced_json() {
        let map = parse_intent_response("```json\n{\"item1\":\"employees\"}\n```");
        assert_eq!(map, expected_map(&[("item1", "employees")]));
    }

    #[test]
    fn test_intent_single_quoted_json() {
        let map = parse_intent_response("{'item1': 'employees'}");
        assert_eq!(map, expected_map(&[("item1", "employees")]));
    }

    #[test]
    fn test_intent_chatty_prefix() {
        let map = parse_intent_response(
            "Sure, here are the candidates:\n{\"item1\": \"employees\", \"item2\": \"salary\"}",
        );
        assert_eq!(
            map,
            expected_map(&[("item1", "employees"), ("item2", "salary")])
        );
    }

    #[test]
    fn test_intent_no_json_yields_empty_map() {
        assert!(parse_intent_response("no json here").is_empty());
    }

    #[test]
    fn test_intent_empty_object() {
        assert!(parse_intent_response("{}").is_empty());
    }

    #[test]
    fn test_intent_non_string_values_are_stringified() {
        let map = parse_intent_response(r#"{"item1": 42}"#);
        assert_eq!(map, expected_map(&[("item1", "42")]));
    }

    #[test]
    fn test_keep_list_plain_array() {
        assert_eq!(parse_keep_list("[1, 3]"), Some(vec![1, 3]));
    }

    #[test]
    fn test_keep_list_embedded_array() {
        assert_eq!(
            parse_keep_list("Keeping these:\n[2, 4]\nDone."),
            Some(vec![2, 4])
        );
    }

    #[test]
    fn test_keep_list_empty_array() {
        assert_eq!(parse_keep_list("[]"), Some(vec![]));
    }

    #[test]
    fn test_keep_list_garbage_is_none() {
        assert_eq!(parse_keep_list("keep the first two"), None);
        assert_eq!(parse_keep_list(r#"["one", "two"]"#), None);
    }

    #[test]
    fn test_sql_from_json_object() {
        assert_eq!(
            parse_sql_response(r#"{"sql": "SELECT * FROM catalog_objects"}"#),
            Some("SELECT * FROM catalog_objects".to_string())
        );
    }

    #[test]
    fn test_sql_from_embedded_object() {
        assert_eq!(
            parse_sql_response("Here you go: {\"sql\": \"SELECT 1\"} hope that helps"),
            Some("SELECT 1".to_string())
        );
    }

    #[test]
    fn test_sql_from_fenced_block() {
        assert_eq!(
            parse_sql_response("```sql\nSELECT name FROM catalog_fields\n```"),
            Some("SELECT name FROM catalog_fields".to_string())
        );
    }

    #[test]
    fn test_sql_bare_statement() {
        assert_eq!(
            parse_sql_response("SELECT count(*) FROM catalog_objects"),
            Some("SELECT count(*) FROM catalog_objects".to_string())
        );
    }

    #[test]
    fn test_sql_missing_is_none() {
        assert_eq!(parse_sql_response("I cannot produce a query."), None);
    }

    #[test]
    fn test_truncate_for_error_short_passthrough() {
        assert_eq!(truncate_for_error("short"), "short");
    }

    #[test]
    fn test_truncate_for_error_long_is_bounded() {
        let long = "x".repeat(500);
        let truncated = truncate_for_error(&long);
        assert!(truncated.len() < 250);
        assert!(truncated.ends_with("..."));
    }
}
