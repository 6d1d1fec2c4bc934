//! Line-oriented parser for workflow text.
//!
//! ```text
//! workflow: Greeter
//! greeting := "Hello"
//! in: input()
//! p: prompt(system="You are terse.", user="{{greeting}} {{name}}")
//! out: output(key="result", value="$p_result")
//! in --> p --> out
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. After the header, each
//! line is classified by content in a fixed priority order: variable (`:=`),
//! connection (`-->`, `==>`, `=/>`), then node (`name: kind(...)`).

use std::collections::BTreeMap;

use tracing::debug;

use agentflow_core::error::{FlowError, Result};

use crate::literal::{coerce_literal, strip_quotes};
use crate::workflow::{Edge, EdgeKind, NodeDef, NodeKind, Workflow};

const HEADER_PREFIX: &str = "workflow:";
const VARIABLE_OPERATOR: &str = ":=";

/// Parse workflow text into a [`Workflow`].
///
/// Parsing is strict: a non-blank, non-comment line that is not a header,
/// variable, edge or node definition fails with [`FlowError::Format`].
pub fn parse_workflow(text: &str) -> Result<Workflow> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let (header_no, header) = lines.next().ok_or_else(|| FlowError::Format {
        line: 1,
        message: "empty workflow, expected 'workflow: <name>'".to_string(),
    })?;
    let name = parse_header(header_no, header)?;
    let mut workflow = Workflow::new(name);

    for (line_no, line) in lines {
        if line.contains(VARIABLE_OPERATOR) {
            let (var_name, value) = parse_variable(line_no, line)?;
            workflow.variables.insert(var_name, value);
        } else if EdgeKind::ALL.iter().any(|k| line.contains(k.operator())) {
            workflow.edges.extend(parse_connection(line_no, line)?);
        } else if line.contains('(') && line.contains(')') && line.contains(':') {
            let node = parse_node(line_no, line)?;
            if workflow.insert_node(node) {
                debug!(line = line_no, "Node redefined, keeping the latest definition");
            }
        } else {
            return Err(FlowError::Format {
                line: line_no,
                message: format!("unrecognized line: {line}"),
            });
        }
    }

    debug!(
        workflow = %workflow.name,
        nodes = workflow.nodes.len(),
        edges = workflow.edges.len(),
        variables = workflow.variables.len(),
        "Parsed workflow"
    );

    Ok(workflow)
}

fn parse_header(line_no: usize, line: &str) -> Result<String> {
    let name = line
        .strip_prefix(HEADER_PREFIX)
        .map(str::trim)
        .ok_or_else(|| FlowError::Format {
            line: line_no,
            message: "workflow must start with 'workflow: <name>'".to_string(),
        })?;

    if name.is_empty() {
        return Err(FlowError::Format {
            line: line_no,
            message: "workflow name must not be empty".to_string(),
        });
    }
    Ok(name.to_string())
}

fn parse_variable(line_no: usize, line: &str) -> Result<(String, agentflow_core::Value)> {
    let (name, literal) = line
        .split_once(VARIABLE_OPERATOR)
        .map(|(n, v)| (n.trim(), v.trim()))
        .ok_or_else(|| FlowError::Format {
            line: line_no,
            message: format!("expected 'name := value': {line}"),
        })?;

    if name.is_empty() {
        return Err(FlowError::Format {
            line: line_no,
            message: "variable name must not be empty".to_string(),
        });
    }
    Ok((name.to_string(), coerce_literal(literal)))
}

/// Parse `a --> b`, or a chain such as `a --> b ==> c`, into edges.
fn parse_connection(line_no: usize, line: &str) -> Result<Vec<Edge>> {
    let (first, mut kind, mut rest) =
        split_at_operator(line).ok_or_else(|| FlowError::InvalidConnection {
            line: line_no,
            message: format!("no connection operator in: {line}"),
        })?;

    let mut source = endpoint(line_no, first, "source")?;
    let mut edges = Vec::new();
    loop {
        match split_at_operator(rest) {
            Some((target, next_kind, after)) => {
                let target = endpoint(line_no, target, "target")?;
                edges.push(Edge::new(source, target.clone(), kind));
                source = target;
                kind = next_kind;
                rest = after;
            }
            None => {
                let target = endpoint(line_no, rest, "target")?;
                edges.push(Edge::new(source, target, kind));
                return Ok(edges);
            }
        }
    }
}

/// Split at the earliest connection operator.
fn split_at_operator(text: &str) -> Option<(&str, EdgeKind, &str)> {
    EdgeKind::ALL
        .iter()
        .filter_map(|kind| text.find(kind.operator()).map(|pos| (pos, *kind)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(pos, kind)| (&text[..pos], kind, &text[pos + kind.operator().len()..]))
}

fn endpoint(line_no: usize, text: &str, role: &str) -> Result<String> {
    let name = text.trim();
    if name.is_empty() {
        return Err(FlowError::InvalidConnection {
            line: line_no,
            message: format!("connection is missing its {role} node"),
        });
    }
    Ok(name.to_string())
}

fn parse_node(line_no: usize, line: &str) -> Result<NodeDef> {
    let malformed = |message: String| FlowError::Format {
        line: line_no,
        message,
    };

    let (name, definition) = line
        .split_once(':')
        .map(|(n, d)| (n.trim(), d.trim()))
        .ok_or_else(|| malformed(format!("expected 'name: kind(...)': {line}")))?;
    if name.is_empty() {
        return Err(malformed("node name must not be empty".to_string()));
    }

    let open = definition
        .find('(')
        .ok_or_else(|| malformed(format!("missing '(' in node definition: {definition}")))?;
    let close = definition
        .rfind(')')
        .filter(|close| *close > open)
        .ok_or_else(|| malformed(format!("missing ')' in node definition: {definition}")))?;

    let keyword = definition[..open].trim();
    let kind = NodeKind::from_keyword(keyword).ok_or_else(|| FlowError::UnknownNodeType {
        line: line_no,
        kind: keyword.to_string(),
    })?;

    Ok(NodeDef {
        name: name.to_string(),
        kind,
        params: extract_params(&definition[open + 1..close]),
    })
}

/// Split `k1=v1, k2="v, 2"` on commas outside double quotes.
///
/// A backslash escapes the next character (the backslash itself is dropped and
/// an escaped quote does not open or close a quoted section). Surrounding
/// quotes are stripped from values; parts without `=` are ignored.
pub fn extract_params(param_str: &str) -> BTreeMap<String, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape_next = false;

    for c in param_str.chars() {
        if escape_next {
            current.push(c);
            escape_next = false;
        } else if c == '\\' {
            escape_next = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
            current.push(c);
        } else if c == ',' && !in_quotes {
            parts.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }

    parts
        .iter()
        .filter_map(|part| part.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = strip_quotes(value).unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}
