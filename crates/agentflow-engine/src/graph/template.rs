//! `{{ name }}` template rendering and `$name` parameter resolution.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use agentflow_core::value::{Object, Value};

use super::state::ExecutionState;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
static EMPTY: Value = Value::String(String::new());

fn placeholder() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{([^}]+)\}\}").expect("placeholder pattern is valid"))
}

/// Replace every `{{ expr }}` in `template`.
///
/// A dotted expression walks nested objects in the variables; if any segment
/// is missing (or resolves to null) the placeholder is left untouched. A bare
/// name checks variables, then input, and renders as empty text when absent.
pub fn resolve_template(template: &str, state: &ExecutionState) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures| {
            let expr = caps[1].trim();
            let resolved = if expr.contains('.') {
                state.lookup_path(expr)
            } else {
                Some(state.lookup(expr).unwrap_or(&EMPTY))
            };
            match resolved {
                Some(value) if !value.is_null() => value.to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Resolve a raw node parameter into a value.
///
/// JSON object text has each string value starting with `$` replaced by the
/// referenced variable (kept literally when the name is unknown). A bare
/// `$name` is resolved the same way. Anything else is returned as a string.
pub fn resolve_variables(raw: &str, state: &ExecutionState) -> Value {
    if raw.starts_with('{') && raw.ends_with('}') {
        if let Ok(Value::Object(map)) = Value::from_json_str(raw) {
            let resolved: Object = map
                .into_iter()
                .map(|(key, value)| match value {
                    Value::String(s) if s.starts_with('$') => (key, substitute(&s, state)),
                    other => (key, other),
                })
                .collect();
            return Value::Object(resolved);
        }
    }

    if raw.starts_with('$') {
        return substitute(raw, state);
    }

    Value::String(raw.to_string())
}

fn substitute(reference: &str, state: &ExecutionState) -> Value {
    state
        .lookup(&reference[1..])
        .cloned()
        .unwrap_or_else(|| Value::String(reference.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ExecutionState {
        let mut profile = Object::new();
        profile.insert("city".into(), Value::from("Oslo"));
        profile.insert("nickname".into(), Value::Null);
        let mut user = Object::new();
        user.insert("profile".into(), Value::Object(profile));

        let mut variables = Object::new();
        variables.insert("greeting".into(), Value::from("Hello"));
        variables.insert("user".into(), Value::Object(user));
        variables.insert("count".into(), Value::Int(3));
        variables.insert("enabled".into(), Value::Bool(true));
        variables.insert("nothing".into(), Value::Null);

        let mut input = Object::new();
        input.insert("name".into(), Value::from("Ada"));
        input.insert("greeting".into(), Value::from("shadowed"));
        ExecutionState::new(input, variables)
    }

    #[test]
    fn test_bare_names() {
        let s = state();
        assert_eq!(resolve_template("{{greeting}}, {{ name }}!", &s), "Hello, Ada!");
        assert_eq!(resolve_template("n={{count}} on={{enabled}}", &s), "n=3 on=true");
    }

    #[test]
    fn test_missing_bare_name_renders_empty() {
        assert_eq!(resolve_template("[{{missing}}]", &state()), "[]");
    }

    #[test]
    fn test_null_leaves_placeholder() {
        assert_eq!(resolve_template("[{{nothing}}]", &state()), "[{{nothing}}]");
    }

    #[test]
    fn test_dotted_paths() {
        let s = state();
        assert_eq!(resolve_template("{{user.profile.city}}", &s), "Oslo");
        assert_eq!(resolve_template("{{ user.profile.zip }}", &s), "{{ user.profile.zip }}");
        assert_eq!(resolve_template("{{user.profile.nickname}}", &s), "{{user.profile.nickname}}");
    }

    #[test]
    fn test_dotted_paths_do_not_search_input() {
        let mut input = Object::new();
        let mut nested = Object::new();
        nested.insert("b".into(), Value::from("from input"));
        input.insert("a".into(), Value::Object(nested));
        let s = ExecutionState::new(input, Object::new());
        assert_eq!(resolve_template("{{a.b}}", &s), "{{a.b}}");
    }

    #[test]
    fn test_object_values_render_as_json() {
        let s = state();
        assert_eq!(
            resolve_template("{{user}}", &s),
            r#"{"profile":{"city":"Oslo","nickname":null}}"#
        );
    }

    #[test]
    fn test_text_without_placeholders() {
        assert_eq!(resolve_template("plain { text }", &state()), "plain { text }");
    }

    #[test]
    fn test_resolve_json_object() {
        let s = state();
        let value = resolve_variables(r#"{"who": "$name", "n": "$count", "raw": "x", "gone": "$missing"}"#, &s);
        let obj = value.as_object().unwrap();
        assert_eq!(obj["who"], Value::from("Ada"));
        assert_eq!(obj["n"], Value::Int(3));
        assert_eq!(obj["raw"], Value::from("x"));
        assert_eq!(obj["gone"], Value::from("$missing"));
    }

    #[test]
    fn test_resolve_bare_reference() {
        let s = state();
        assert_eq!(resolve_variables("$greeting", &s), Value::from("Hello"));
        assert!(resolve_variables("$user", &s).get("profile").is_some());
        assert_eq!(resolve_variables("$missing", &s), Value::from("$missing"));
    }

    #[test]
    fn test_resolve_plain_and_malformed_text() {
        let s = state();
        assert_eq!(resolve_variables("hello", &s), Value::from("hello"));
        assert_eq!(resolve_variables("{not json}", &s), Value::from("{not json}"));
        assert_eq!(resolve_variables("{}", &s), Value::Object(Object::new()));
    }
}
