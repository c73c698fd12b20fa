//! Filter-expression engine: parses and evaluates the small typed language used
//! for article hiding, query feeds, saved filters, and ignore rules.

use regex::RegexBuilder;
use thiserror::Error;

/// Anything that can be matched against: exposes named string attributes.
pub trait Attributed {
    fn attribute_value(&self, name: &str) -> Option<String>;
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MatchError {
    #[error("attribute unavailable: {0}")]
    AttributeUnavailable(String),
    #[error("invalid regex `{pattern}`: {detail}")]
    InvalidRegex { pattern: String, detail: String },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("parse error: {0}")]
pub struct ParseError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    RegexMatch,
    RegexNotMatch,
    Has,
    HasNot,
    Gt,
    Ge,
    Lt,
    Le,
    Between,
}

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Int(i64),
    Range(i64, i64),
}

#[derive(Debug, Clone)]
enum Node {
    Cmp { name: String, op: Op, value: Value },
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

/// A parsed filter expression, ready to be evaluated repeatedly.
#[derive(Debug, Clone)]
pub struct Matcher {
    source: String,
    root: Node,
}

impl Matcher {
    /// Parse an expression. Returns the human-readable parse error via
    /// `ParseError`'s `Display` on failure (mirrors `get_parse_error()`).
    pub fn parse(expr: &str) -> Result<Self, ParseError> {
        if expr.chars().any(|c| c == '\t' || c == '\n' || c == '\r') {
            return Err(ParseError(
                "whitespace other than space is not allowed in an expression".into(),
            ));
        }
        let mut p = Parser {
            input: expr.as_bytes(),
            pos: 0,
        };
        let root = p.parse_expr()?;
        p.skip_spaces();
        if p.pos != p.input.len() {
            return Err(ParseError(format!(
                "trailing garbage at byte {}",
                p.pos
            )));
        }
        Ok(Matcher {
            source: expr.to_string(),
            root,
        })
    }

    pub fn expression(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, obj: &dyn Attributed) -> Result<bool, MatchError> {
        eval(&self.root, obj)
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn skip_spaces(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos] == b' ' {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s.as_bytes())
    }

    // expr := term (LOGOP term)*, "and" binds tighter than "or"
    fn parse_expr(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_and_chain()?;
        loop {
            self.skip_spaces();
            if self.starts_with("or") && self.word_boundary_after("or") {
                self.pos += 2;
                self.skip_spaces();
                let rhs = self.parse_and_chain()?;
                lhs = Node::Or(Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_and_chain(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            self.skip_spaces();
            if self.starts_with("and") && self.word_boundary_after("and") {
                self.pos += 3;
                self.skip_spaces();
                let rhs = self.parse_term()?;
                lhs = Node::And(Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn word_boundary_after(&self, word: &str) -> bool {
        match self.input.get(self.pos + word.len()) {
            Some(&b) => b == b' ',
            None => true,
        }
    }

    fn parse_term(&mut self) -> Result<Node, ParseError> {
        self.skip_spaces();
        if self.peek() == Some(b'(') {
            self.pos += 1;
            let inner = self.parse_expr()?;
            self.skip_spaces();
            if self.peek() != Some(b')') {
                return Err(ParseError("expected ')'".into()));
            }
            self.pos += 1;
            return Ok(inner);
        }
        let name = self.parse_name()?;
        self.skip_spaces();
        let op = self.parse_op()?;
        self.skip_spaces();
        let value = self.parse_value()?;
        Ok(Node::Cmp { name, op, value })
    }

    fn parse_name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(ParseError(format!("expected attribute name at byte {start}")));
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn parse_op(&mut self) -> Result<Op, ParseError> {
        const OPS: &[(&str, Op)] = &[
            ("between", Op::Between),
            ("=~", Op::RegexMatch),
            ("!~", Op::RegexNotMatch),
            ("!=", Op::Ne),
            ("!#", Op::HasNot),
            (">=", Op::Ge),
            ("<=", Op::Le),
            ("=", Op::Eq),
            ("#", Op::Has),
            (">", Op::Gt),
            ("<", Op::Lt),
        ];
        for (text, op) in OPS {
            if self.starts_with(text) {
                self.pos += text.len();
                return Ok(*op);
            }
        }
        Err(ParseError(format!(
            "expected an operator at byte {}",
            self.pos
        )))
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        match self.peek() {
            Some(b'"') | Some(b'\'') => {
                let quote = self.peek().unwrap();
                self.pos += 1;
                let start = self.pos;
                while self.peek().map(|b| b != quote).unwrap_or(false) {
                    self.pos += 1;
                }
                if self.peek() != Some(quote) {
                    return Err(ParseError("unterminated string literal".into()));
                }
                let s = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
                self.pos += 1;
                Ok(Value::Str(s))
            }
            Some(b) if b.is_ascii_digit() || b == b'-' || b == b'+' => {
                let start = self.pos;
                if b == b'-' || b == b'+' {
                    self.pos += 1;
                }
                while self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
                    self.pos += 1;
                }
                if self.peek() == Some(b':') {
                    let a: i64 = std::str::from_utf8(&self.input[start..self.pos])
                        .unwrap()
                        .parse()
                        .map_err(|_| ParseError("invalid integer".into()))?;
                    self.pos += 1;
                    let bstart = self.pos;
                    if self.peek() == Some(b'-') || self.peek() == Some(b'+') {
                        self.pos += 1;
                    }
                    while self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
                        self.pos += 1;
                    }
                    let b: i64 = std::str::from_utf8(&self.input[bstart..self.pos])
                        .unwrap()
                        .parse()
                        .map_err(|_| ParseError("invalid integer".into()))?;
                    Ok(Value::Range(a, b))
                } else {
                    let n: i64 = std::str::from_utf8(&self.input[start..self.pos])
                        .unwrap()
                        .parse()
                        .map_err(|_| ParseError("invalid integer".into()))?;
                    Ok(Value::Int(n))
                }
            }
            _ => Err(ParseError(format!(
                "expected a value at byte {}",
                self.pos
            ))),
        }
    }
}

/// Extracts an optional sign and the longest leading run of digits; empty → 0.
/// Saturates at i32 bounds on overflow, per the numeric-prefix extraction rule.
fn numeric_prefix(s: &str) -> i64 {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut neg = false;
    if let Some(&b) = bytes.first() {
        if b == b'-' {
            neg = true;
            i = 1;
        } else if b == b'+' {
            i = 1;
        }
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return 0;
    }
    let digits = std::str::from_utf8(&bytes[digits_start..i]).unwrap();
    let magnitude: i64 = digits.parse().unwrap_or(i64::MAX);
    let signed = if neg { -magnitude } else { magnitude };
    signed.clamp(i32::MIN as i64, i32::MAX as i64)
}

fn value_as_string(v: &Value) -> String {
    match v {
        Value::Str(s) => s.clone(),
        Value::Int(n) => n.to_string(),
        Value::Range(a, b) => format!("{a}:{b}"),
    }
}

fn needs_attribute(op: Op) -> bool {
    !matches!(op, Op::Eq | Op::Ne)
}

fn eval(node: &Node, obj: &dyn Attributed) -> Result<bool, MatchError> {
    match node {
        Node::And(l, r) => Ok(eval(l, obj)? && eval(r, obj)?),
        Node::Or(l, r) => Ok(eval(l, obj)? || eval(r, obj)?),
        Node::Cmp { name, op, value } => {
            let attr = obj.attribute_value(name);
            if attr.is_none() {
                if needs_attribute(*op) {
                    return Err(MatchError::AttributeUnavailable(name.clone()));
                }
                return Ok(match op {
                    Op::Eq => false,
                    Op::Ne => true,
                    _ => unreachable!(),
                });
            }
            let attr = attr.unwrap();
            match op {
                Op::Eq => Ok(attr == value_as_string(value)),
                Op::Ne => Ok(attr != value_as_string(value)),
                Op::RegexMatch | Op::RegexNotMatch => {
                    let pattern = value_as_string(value);
                    let re = RegexBuilder::new(&pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| MatchError::InvalidRegex {
                            pattern: pattern.clone(),
                            detail: e.to_string(),
                        })?;
                    let m = re.is_match(&attr);
                    Ok(if *op == Op::RegexMatch { m } else { !m })
                }
                Op::Has | Op::HasNot => {
                    let token = value_as_string(value);
                    let member = attr.split(' ').any(|t| t == token);
                    Ok(if *op == Op::Has { member } else { !member })
                }
                Op::Gt | Op::Ge | Op::Lt | Op::Le => {
                    let n = numeric_prefix(&attr);
                    let rhs = match value {
                        Value::Int(i) => *i,
                        _ => return Err(MatchError::AttributeUnavailable(name.clone())),
                    };
                    Ok(match op {
                        Op::Gt => n > rhs,
                        Op::Ge => n >= rhs,
                        Op::Lt => n < rhs,
                        Op::Le => n <= rhs,
                        _ => unreachable!(),
                    })
                }
                Op::Between => {
                    let n = numeric_prefix(&attr);
                    let (a, b) = match value {
                        Value::Range(a, b) => (*a, *b),
                        _ => return Err(MatchError::AttributeUnavailable(name.clone())),
                    };
                    // `between A:B` with A > B matches unconditionally; see DESIGN.md
                    // Open Question 1 (confirmed against the reference test suite).
                    if a > b {
                        Ok(true)
                    } else {
                        Ok(n >= a && n <= b)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Map(HashMap<&'static str, String>);
    impl Attributed for Map {
        fn attribute_value(&self, name: &str) -> Option<String> {
            self.0.get(name).cloned()
        }
    }

    fn map(pairs: &[(&'static str, &str)]) -> Map {
        Map(pairs.iter().map(|(k, v)| (*k, v.to_string())).collect())
    }

    #[test]
    fn equality_is_pure_string_comparison() {
        let m = Matcher::parse("answer = 0042").unwrap();
        assert!(!m.matches(&map(&[("answer", "42")])).unwrap());
        assert!(m.matches(&map(&[("answer", "0042")])).unwrap());
    }

    #[test]
    fn missing_attribute_on_equality_is_false_not_error() {
        let m = Matcher::parse("title = \"x\"").unwrap();
        assert!(!m.matches(&map(&[])).unwrap());
        let m = Matcher::parse("title != \"x\"").unwrap();
        assert!(m.matches(&map(&[])).unwrap());
    }

    #[test]
    fn missing_attribute_on_other_ops_is_error() {
        let m = Matcher::parse("title =~ \"x\"").unwrap();
        assert_eq!(
            m.matches(&map(&[])),
            Err(MatchError::AttributeUnavailable("title".into()))
        );
    }

    #[test]
    fn hash_is_exact_token_membership_not_substring() {
        let m = Matcher::parse("tags # \"bar\"").unwrap();
        assert!(!m.matches(&map(&[("tags", "foo bar")])).is_err());
        assert!(m.matches(&map(&[("tags", "foo bar")])).unwrap());
        let m2 = Matcher::parse("tags # \"foo bar\"").unwrap();
        assert!(!m2.matches(&map(&[("tags", "foo bar baz")])).unwrap());
    }

    #[test]
    fn between_with_inverted_range_matches_unconditionally() {
        let m = Matcher::parse("age between 12346:12344").unwrap();
        assert!(m.matches(&map(&[("age", "12345")])).unwrap());
    }

    #[test]
    fn between_normal_range() {
        let m = Matcher::parse("age between 0:7").unwrap();
        assert!(m.matches(&map(&[("age", "3")])).unwrap());
        assert!(!m.matches(&map(&[("age", "8")])).unwrap());
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let m = Matcher::parse(
            "title =~ \"hello\" and ( author = \"Jane\" or tags # \"work\" )",
        )
        .unwrap();
        assert!(m
            .matches(&map(&[
                ("title", "hello world"),
                ("author", "Jane"),
                ("tags", "")
            ]))
            .unwrap());
    }

    #[test]
    fn numeric_compare_on_non_numeric_attribute() {
        assert!(!Matcher::parse("x > 0").unwrap().matches(&map(&[("x", "abc")])).unwrap());
        assert!(Matcher::parse("x >= 0").unwrap().matches(&map(&[("x", "abc")])).unwrap());
        assert!(!Matcher::parse("x < 0").unwrap().matches(&map(&[("x", "abc")])).unwrap());
        assert!(Matcher::parse("x <= 0").unwrap().matches(&map(&[("x", "abc")])).unwrap());
    }

    #[test]
    fn regex_case_insensitivity_agrees() {
        let upper = Matcher::parse("title =~ \"ABC\"").unwrap();
        let lower = Matcher::parse("title =~ \"abc\"").unwrap();
        for val in ["abc", "ABC", "xyz", "aBc123"] {
            let m = map(&[("title", val)]);
            assert_eq!(upper.matches(&m).unwrap(), lower.matches(&m).unwrap());
        }
    }

    #[test]
    fn tab_in_expression_is_rejected() {
        assert!(Matcher::parse("title\t= \"x\"").is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(Matcher::parse("title = \"x\" extra").is_err());
    }
}
