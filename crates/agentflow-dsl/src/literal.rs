//! Literal coercion for `name := literal` definitions.
//!
//! Rules are tried in order and the first match wins:
//! quoted string, boolean, integer, float, list, JSON object, raw string.

use agentflow_core::value::Value;

/// Coerce literal text (already trimmed) into a [`Value`].
pub fn coerce_literal(text: &str) -> Value {
    if let Some(inner) = strip_quotes(text) {
        return Value::String(inner.to_string());
    }

    if text.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    if is_integer(text) {
        if let Ok(i) = text.parse::<i64>() {
            return Value::Int(i);
        }
    }

    if is_float(text) {
        if let Ok(f) = text.parse::<f64>() {
            return Value::Float(f);
        }
    }

    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        let items = inner
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| Value::String(item.to_string()))
            .collect();
        return Value::List(items);
    }

    if text.starts_with('{') && text.ends_with('}') {
        if let Ok(value @ Value::Object(_)) = Value::from_json_str(text) {
            return value;
        }
    }

    Value::String(text.to_string())
}

/// The text between surrounding double quotes, if present.
pub(crate) fn strip_quotes(text: &str) -> Option<&str> {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Dot-separated digit groups, ignoring any `-`.
fn is_float(text: &str) -> bool {
    if !text.contains('.') {
        return false;
    }
    let unsigned: String = text.chars().filter(|c| *c != '-').collect();
    unsigned
        .split('.')
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_core::value::Object;

    #[test]
    fn test_quoted_string() {
        assert_eq!(coerce_literal(r#""hello""#), Value::from("hello"));
        assert_eq!(coerce_literal(r#""42""#), Value::from("42"));
        assert_eq!(coerce_literal(r#""""#), Value::from(""));
    }

    #[test]
    fn test_booleans_are_case_insensitive() {
        assert_eq!(coerce_literal("true"), Value::Bool(true));
        assert_eq!(coerce_literal("FALSE"), Value::Bool(false));
        assert_eq!(coerce_literal("True"), Value::Bool(true));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(coerce_literal("42"), Value::Int(42));
        assert_eq!(coerce_literal("-7"), Value::Int(-7));
        assert_eq!(coerce_literal("-3.5"), Value::Float(-3.5));
        assert_eq!(coerce_literal("0.25"), Value::Float(0.25));
    }

    #[test]
    fn test_malformed_numbers_fall_back_to_string() {
        assert_eq!(coerce_literal("1."), Value::from("1."));
        assert_eq!(coerce_literal("1.2.3"), Value::from("1.2.3"));
        assert_eq!(coerce_literal("-"), Value::from("-"));
        assert_eq!(coerce_literal("12abc"), Value::from("12abc"));
    }

    #[test]
    fn test_list_elements_stay_raw_strings() {
        assert_eq!(
            coerce_literal("[1, 2, three]"),
            Value::List(vec!["1".into(), "2".into(), "three".into()])
        );
        assert_eq!(
            coerce_literal(r#"["a", true]"#),
            Value::List(vec![r#""a""#.into(), "true".into()])
        );
        assert_eq!(coerce_literal("[]"), Value::List(vec![]));
        assert_eq!(coerce_literal("[a, , b]"), Value::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_object_literal() {
        let mut expected = Object::new();
        expected.insert("k".into(), Value::Int(1));
        assert_eq!(coerce_literal(r#"{"k": 1}"#), Value::Object(expected));
    }

    #[test]
    fn test_invalid_object_falls_back_to_string() {
        assert_eq!(coerce_literal("{not json}"), Value::from("{not json}"));
    }

    #[test]
    fn test_raw_string() {
        assert_eq!(coerce_literal("plain words"), Value::from("plain words"));
    }
}
