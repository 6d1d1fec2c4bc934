//! Condition expressions.
//!
//! `$name` references are substituted with rendered literals, then the text is
//! evaluated by a small expression language: numbers, quoted strings,
//! booleans and `null`, the comparisons `== != < > <= >=` (chainable),
//! `and`/`or`/`not`, and parentheses. Nothing else is accepted.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use agentflow_core::error::{FlowError, Result};
use agentflow_core::value::Value;

use super::state::ExecutionState;

const MAX_DEPTH: usize = 64;

static REFERENCE: OnceLock<Regex> = OnceLock::new();

fn reference() -> &'static Regex {
    REFERENCE.get_or_init(|| Regex::new(r"\$([a-zA-Z0-9_]+)").expect("reference pattern is valid"))
}

/// Substitute references and evaluate `expression` to a boolean.
pub fn evaluate_condition(expression: &str, state: &ExecutionState) -> Result<bool> {
    let substituted = substitute_references(expression, state);
    evaluate(&substituted).map_err(|message| FlowError::ConditionEval {
        expression: expression.to_string(),
        message,
    })
}

/// Replace each `$name` with a literal rendering of its value.
///
/// Strings are quoted with `"` and `\` escaped; unknown names become `""`.
pub fn substitute_references(expression: &str, state: &ExecutionState) -> String {
    reference()
        .replace_all(expression, |caps: &Captures| match state.lookup(&caps[1]) {
            Some(value) => render_literal(value),
            None => "\"\"".to_string(),
        })
        .into_owned()
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"")
        }
        other => other.to_string(),
    }
}

/// Evaluate an already-substituted expression.
pub fn evaluate(expression: &str) -> std::result::Result<bool, String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or(0)?;
    if let Some(token) = parser.peek() {
        return Err(format!("unexpected {token:?} after expression"));
    }
    Ok(expr.eval()?.is_truthy())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

impl Literal {
    fn is_truthy(&self) -> bool {
        match self {
            Literal::Int(n) => *n != 0,
            Literal::Float(f) => *f != 0.0,
            Literal::Str(s) => !s.is_empty(),
            Literal::Bool(b) => *b,
            Literal::Null => false,
        }
    }

    /// Numeric view; booleans count as 0 and 1.
    fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Int(n) => Some(*n as f64),
            Literal::Float(f) => Some(*f),
            Literal::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "string",
            Literal::Bool(_) => "bool",
            Literal::Null => "null",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Cmp(CmpOp),
    And,
    Or,
    Not,
    Lit(Literal),
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let (op, width) = match (c, next) {
                    ('=', Some('=')) => (CmpOp::Eq, 2),
                    ('!', Some('=')) => (CmpOp::Ne, 2),
                    ('<', Some('=')) => (CmpOp::Le, 2),
                    ('>', Some('=')) => (CmpOp::Ge, 2),
                    ('<', _) => (CmpOp::Lt, 1),
                    ('>', _) => (CmpOp::Gt, 1),
                    _ => return Err(format!("unexpected '{c}' at offset {i}")),
                };
                tokens.push(Token::Cmp(op));
                i += width;
            }
            '"' | '\'' => {
                let (text, end) = read_string(&chars, i)?;
                tokens.push(Token::Lit(Literal::Str(text)));
                i = end;
            }
            c if c.is_ascii_digit() || starts_number(c, next, chars.get(i + 2).copied()) => {
                let (literal, end) = read_number(&chars, i)?;
                tokens.push(Token::Lit(literal));
                i = end;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" | "True" => Token::Lit(Literal::Bool(true)),
                    "false" | "False" => Token::Lit(Literal::Bool(false)),
                    "null" | "None" => Token::Lit(Literal::Null),
                    _ => return Err(format!("unknown identifier '{word}'")),
                });
            }
            _ => return Err(format!("unexpected '{c}' at offset {i}")),
        }
    }

    Ok(tokens)
}

fn starts_number(c: char, next: Option<char>, after: Option<char>) -> bool {
    let digit = |ch: Option<char>| ch.is_some_and(|ch| ch.is_ascii_digit());
    match c {
        '-' | '+' => digit(next) || (next == Some('.') && digit(after)),
        '.' => digit(next),
        _ => false,
    }
}

fn read_number(chars: &[char], start: usize) -> std::result::Result<(Literal, usize), String> {
    let mut i = start;
    if matches!(chars[i], '-' | '+') {
        i += 1;
    }
    let mut is_float = false;
    while i < chars.len() {
        match chars[i] {
            '0'..='9' => i += 1,
            '.' if !is_float => {
                is_float = true;
                i += 1;
            }
            'e' | 'E' => {
                is_float = true;
                i += 1;
                if i < chars.len() && matches!(chars[i], '-' | '+') {
                    i += 1;
                }
            }
            _ => break,
        }
    }
    let text: String = chars[start..i].iter().collect();
    let literal = if is_float {
        text.parse::<f64>().map(Literal::Float).ok()
    } else {
        text.parse::<i64>()
            .map(Literal::Int)
            .ok()
            .or_else(|| text.parse::<f64>().map(Literal::Float).ok())
    };
    literal
        .map(|lit| (lit, i))
        .ok_or_else(|| format!("malformed number '{text}'"))
}

fn read_string(chars: &[char], start: usize) -> std::result::Result<(String, usize), String> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| "unterminated string".to_string())?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err("unterminated string".to_string())
}

#[derive(Debug)]
enum Expr {
    Lit(Literal),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self, depth: usize) -> std::result::Result<Expr, String> {
        if depth > MAX_DEPTH {
            return Err("expression nested too deeply".to_string());
        }
        let first = self.parse_and(depth)?;
        if self.peek() != Some(&Token::Or) {
            return Ok(first);
        }
        let mut terms = vec![first];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.parse_and(depth)?);
        }
        Ok(Expr::Or(terms))
    }

    fn parse_and(&mut self, depth: usize) -> std::result::Result<Expr, String> {
        let first = self.parse_not(depth)?;
        if self.peek() != Some(&Token::And) {
            return Ok(first);
        }
        let mut terms = vec![first];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.parse_not(depth)?);
        }
        Ok(Expr::And(terms))
    }

    fn parse_not(&mut self, depth: usize) -> std::result::Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            if depth + 1 > MAX_DEPTH {
                return Err("expression nested too deeply".to_string());
            }
            return Ok(Expr::Not(Box::new(self.parse_not(depth + 1)?)));
        }
        self.parse_comparison(depth)
    }

    fn parse_comparison(&mut self, depth: usize) -> std::result::Result<Expr, String> {
        let first = self.parse_primary(depth)?;
        let mut rest = Vec::new();
        while let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            rest.push((op, self.parse_primary(depth)?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn parse_primary(&mut self, depth: usize) -> std::result::Result<Expr, String> {
        match self.advance() {
            Some(Token::Lit(lit)) => Ok(Expr::Lit(lit)),
            Some(Token::LParen) => {
                let inner = self.parse_or(depth + 1)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("expected ')'".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

impl Expr {
    fn eval(&self) -> std::result::Result<Literal, String> {
        match self {
            Expr::Lit(lit) => Ok(lit.clone()),
            Expr::Not(inner) => Ok(Literal::Bool(!inner.eval()?.is_truthy())),
            // Both yield the deciding operand, short-circuiting left to right.
            Expr::And(terms) => {
                let mut last = Literal::Bool(true);
                for term in terms {
                    last = term.eval()?;
                    if !last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Or(terms) => {
                let mut last = Literal::Bool(false);
                for term in terms {
                    last = term.eval()?;
                    if last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Compare(first, rest) => {
                let mut left = first.eval()?;
                for (op, operand) in rest {
                    let right = operand.eval()?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Literal::Bool(false));
                    }
                    left = right;
                }
                Ok(Literal::Bool(true))
            }
        }
    }
}

fn compare(op: CmpOp, left: &Literal, right: &Literal) -> std::result::Result<bool, String> {
    match op {
        CmpOp::Eq => Ok(equals(left, right)),
        CmpOp::Ne => Ok(!equals(left, right)),
        _ => {
            let ordering = match (left, right) {
                (Literal::Str(a), Literal::Str(b)) => a.partial_cmp(b),
                _ => match (left.as_number(), right.as_number()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => {
                        return Err(format!(
                            "cannot order {} and {}",
                            left.type_name(),
                            right.type_name()
                        ))
                    }
                },
            };
            let Some(ordering) = ordering else {
                return Ok(false);
            };
            Ok(match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Gt => ordering.is_gt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Ge => ordering.is_ge(),
                CmpOp::Eq => ordering.is_eq(),
                CmpOp::Ne => ordering.is_ne(),
            })
        }
    }
}

fn equals(left: &Literal, right: &Literal) -> bool {
    match (left, right) {
        (Literal::Int(a), Literal::Int(b)) => a == b,
        (Literal::Str(a), Literal::Str(b)) => a == b,
        (Literal::Null, Literal::Null) => true,
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}
