//! A small predicate sublanguage for process-group selections and bundle
//! flow-selection filters.
//!
//! Process-group query-string selections (`ProcessGroup.selection` as a
//! string) are evaluated against every row of a process dimension table and
//! may use the full grammar below. Bundle `flow_selection` strings are
//! restricted to a conjunction of equality/`in` terms (see
//! [`as_conjunctive_includes`]) because they must intersect directly into a
//! rule [`Query`](crate::constraint::Query), which has no general boolean
//! connectives.
//!
//! Grammar (lowest to highest precedence):
//! ```text
//! expr    := or_expr
//! or_expr := and_expr ("or" and_expr)*
//! and_expr:= unary ("and" unary)*
//! unary   := "not" unary | atom
//! atom    := "(" expr ")" | ident "==" literal | ident "in" list
//! list    := "[" literal ("," literal)* "]"
//! literal := ident | string | number
//! ```

use crate::constraint::{Constraint, Query};
use crate::error::CompileError;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Eq(String, String),
    In(String, Vec<String>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

pub fn parse(input: &str) -> Result<Predicate, CompileError> {
    let tokens = tokenize(input)
        .map_err(|e| CompileError::InvalidQueryString(input.to_string(), e))?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let pred = parser
        .parse_or()
        .map_err(|e| CompileError::InvalidQueryString(input.to_string(), e))?;
    if parser.pos != parser.tokens.len() {
        return Err(CompileError::InvalidQueryString(
            input.to_string(),
            "trailing input after expression".to_string(),
        ));
    }
    Ok(pred)
}

/// Evaluate `pred` against a row, fetching attribute values with `get`.
/// A missing attribute makes any comparison on it false.
pub fn evaluate(pred: &Predicate, get: &dyn Fn(&str) -> Option<&str>) -> bool {
    match pred {
        Predicate::Eq(attr, val) => get(attr).is_some_and(|v| v == val),
        Predicate::In(attr, vals) => get(attr).is_some_and(|v| vals.iter().any(|x| x == v)),
        Predicate::And(a, b) => evaluate(a, get) && evaluate(b, get),
        Predicate::Or(a, b) => evaluate(a, get) || evaluate(b, get),
        Predicate::Not(a) => !evaluate(a, get),
    }
}

/// Flatten a pure conjunction of `Eq`/`In` terms into a [`Query`] of
/// `Includes` constraints, one per attribute. Fails if the same attribute
/// is constrained twice, or if the predicate contains `or`/`not` (those have
/// no representation as a conjunctive `Query`).
pub fn as_conjunctive_includes(pred: &Predicate) -> Result<Query, CompileError> {
    let mut out: BTreeMap<String, Constraint> = BTreeMap::new();
    collect_conjuncts(pred, &mut out)?;
    Ok(out)
}

fn collect_conjuncts(
    pred: &Predicate,
    out: &mut BTreeMap<String, Constraint>,
) -> Result<(), CompileError> {
    match pred {
        Predicate::And(a, b) => {
            collect_conjuncts(a, out)?;
            collect_conjuncts(b, out)?;
            Ok(())
        }
        Predicate::Eq(attr, val) => insert_once(out, attr, Constraint::includes([val.clone()])),
        Predicate::In(attr, vals) => {
            insert_once(out, attr, Constraint::includes(vals.iter().cloned()))
        }
        Predicate::Or(_, _) | Predicate::Not(_) => Err(CompileError::InvalidQueryString(
            format!("{pred:?}"),
            "flow selection filters must be a plain conjunction (no or/not)".to_string(),
        )),
    }
}

fn insert_once(
    out: &mut BTreeMap<String, Constraint>,
    attr: &str,
    constraint: Constraint,
) -> Result<(), CompileError> {
    if out.contains_key(attr) {
        return Err(CompileError::AttributeAlreadyConstrained(attr.to_string()));
    }
    out.insert(attr.to_string(), constraint);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Eq,
    In,
    And,
    Or,
    Not,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if c == '[' {
            tokens.push(Token::LBracket);
            i += 1;
        } else if c == ']' {
            tokens.push(Token::RBracket);
            i += 1;
        } else if c == ',' {
            tokens.push(Token::Comma);
            i += 1;
        } else if c == '=' && chars.get(i + 1) == Some(&'=') {
            tokens.push(Token::Eq);
            i += 2;
        } else if c == '"' || c == '\'' {
            let quote = c;
            let mut s = String::new();
            i += 1;
            while i < chars.len() && chars[i] != quote {
                s.push(chars[i]);
                i += 1;
            }
            if i >= chars.len() {
                return Err("unterminated string literal".to_string());
            }
            i += 1;
            tokens.push(Token::Str(s));
        } else if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.' || chars[i] == '-')
            {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(match word.as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "in" => Token::In,
                _ => Token::Ident(word),
            });
        } else {
            return Err(format!("unexpected character '{c}'"));
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Result<Predicate, String> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Predicate::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Predicate, String> {
        let mut lhs = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Predicate::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Predicate, String> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Predicate, String> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("expected closing ')'".to_string()),
                }
            }
            Some(Token::Ident(attr)) => {
                let attr = attr.clone();
                match self.advance() {
                    Some(Token::Eq) => {
                        let val = self.parse_literal()?;
                        Ok(Predicate::Eq(attr, val))
                    }
                    Some(Token::In) => {
                        let vals = self.parse_list()?;
                        Ok(Predicate::In(attr, vals))
                    }
                    _ => Err(format!("expected '==' or 'in' after '{attr}'")),
                }
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }

    fn parse_literal(&mut self) -> Result<String, String> {
        match self.advance() {
            Some(Token::Ident(s)) => Ok(s.clone()),
            Some(Token::Str(s)) => Ok(s.clone()),
            other => Err(format!("expected literal, found {other:?}")),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<String>, String> {
        match self.advance() {
            Some(Token::LBracket) => {}
            other => return Err(format!("expected '[', found {other:?}")),
        }
        let mut out = Vec::new();
        if matches!(self.peek(), Some(Token::RBracket)) {
            self.advance();
            return Ok(out);
        }
        loop {
            out.push(self.parse_literal()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                other => return Err(format!("expected ',' or ']', found {other:?}")),
            }
        }
        Ok(out)
    }
}
