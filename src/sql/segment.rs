//! Statement segmentation
//!
//! Splits a token stream on top-level `UNION` into statements, then splits
//! each statement into clause segments on clause keywords. Unsupported
//! clauses and operators are rejected here, before any clause is parsed.

use super::token::{render, Token, TokenType};
use crate::error::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Clause {
    Select,
    InsertInto,
    Update,
    Delete,
    Reset,
    From,
    Set,
    Values,
    Where,
    GroupBy,
    OrderBy,
    Limit,
    Offset,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Clause::Select => "SELECT",
            Clause::InsertInto => "INSERT INTO",
            Clause::Update => "UPDATE",
            Clause::Delete => "DELETE",
            Clause::Reset => "RESET",
            Clause::From => "FROM",
            Clause::Set => "SET",
            Clause::Values => "VALUES",
            Clause::Where => "WHERE",
            Clause::GroupBy => "GROUP BY",
            Clause::OrderBy => "ORDER BY",
            Clause::Limit => "LIMIT",
            Clause::Offset => "OFFSET",
        };
        f.write_str(s)
    }
}

/// One clause keyword and the tokens up to the next clause keyword
#[derive(Debug, Clone)]
pub struct Segment {
    pub clause: Clause,
    pub tokens: Vec<Token>,
    pub line: usize,
    pub column: usize,
}

impl Segment {
    pub fn text(&self) -> String {
        if self.tokens.is_empty() {
            self.clause.to_string()
        } else {
            format!("{} {}", self.clause, render(&self.tokens))
        }
    }
}

pub type Statement = Vec<Segment>;

/// Reject unsupported clauses/operators, then split into statements
pub fn split_statements(tokens: &[Token]) -> Result<Vec<Statement>> {
    reject_unsupported(tokens)?;

    let mut body: &[Token] = tokens;
    if let Some((last, rest)) = body.split_last() {
        if last.token_type == TokenType::Eof {
            body = rest;
        }
    }
    if let Some((last, rest)) = body.split_last() {
        if last.token_type == TokenType::Semicolon {
            body = rest;
        }
    }
    if body.is_empty() {
        return Err(Error::Syntax("Empty statement.".into()));
    }

    let mut statements = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, token) in body.iter().enumerate() {
        match token.token_type {
            TokenType::LParen | TokenType::LBracket => depth += 1,
            TokenType::RParen | TokenType::RBracket => depth -= 1,
            TokenType::Union if depth == 0 => {
                statements.push(segment_statement(&body[start..i])?);
                start = i + 1;
            }
            TokenType::Semicolon => {
                return Err(Error::Syntax(format!(
                    "Multiple statements must be joined with UNION (line {} column {})",
                    token.line, token.column
                )))
            }
            _ => {}
        }
    }
    statements.push(segment_statement(&body[start..])?);
    Ok(statements)
}

fn reject_unsupported(tokens: &[Token]) -> Result<()> {
    for token in tokens {
        let message = match token.token_type {
            TokenType::Having => "HAVING clause is not currently supported.",
            TokenType::Join => "JOIN clause is not currently supported.",
            ref t if t.is_arithmetic() => "Arithmetic operators are not currently supported.",
            ref t if t.is_bitwise() => "Bitwise operators are not currently supported.",
            _ => continue,
        };
        return Err(Error::Syntax(message.to_string()));
    }
    Ok(())
}

fn segment_statement(tokens: &[Token]) -> Result<Statement> {
    if tokens.is_empty() {
        return Err(Error::Syntax("Empty statement around UNION.".into()));
    }

    let mut segments: Vec<Segment> = Vec::new();
    let mut depth = 0i32;
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        let next = tokens.get(i + 1).map(|t| &t.token_type);
        let clause = if depth == 0 {
            match token.token_type {
                TokenType::Select => Some((Clause::Select, 1)),
                TokenType::From => Some((Clause::From, 1)),
                TokenType::Where => Some((Clause::Where, 1)),
                TokenType::Set => Some((Clause::Set, 1)),
                TokenType::Values => Some((Clause::Values, 1)),
                TokenType::Limit => Some((Clause::Limit, 1)),
                TokenType::Offset => Some((Clause::Offset, 1)),
                TokenType::Update => Some((Clause::Update, 1)),
                TokenType::Delete => Some((Clause::Delete, 1)),
                TokenType::Reset => Some((Clause::Reset, 1)),
                TokenType::Insert => match next {
                    Some(TokenType::Into) => Some((Clause::InsertInto, 2)),
                    _ => return Err(syntax_at("Expected INTO after INSERT", token)),
                },
                TokenType::Order => match next {
                    Some(TokenType::By) => Some((Clause::OrderBy, 2)),
                    _ => return Err(syntax_at("Expected BY after ORDER", token)),
                },
                TokenType::Group => match next {
                    Some(TokenType::By) => Some((Clause::GroupBy, 2)),
                    _ => return Err(syntax_at("Expected BY after GROUP", token)),
                },
                _ => None,
            }
        } else {
            None
        };

        match token.token_type {
            TokenType::LParen | TokenType::LBracket => depth += 1,
            TokenType::RParen | TokenType::RBracket => depth -= 1,
            _ => {}
        }

        match clause {
            Some((clause, width)) => {
                if segments.iter().any(|s| s.clause == clause) {
                    return Err(Error::Syntax(format!("Duplicate {} clause.", clause)));
                }
                segments.push(Segment {
                    clause,
                    tokens: Vec::new(),
                    line: token.line,
                    column: token.column,
                });
                i += width;
            }
            None => {
                match segments.last_mut() {
                    Some(segment) => segment.tokens.push(token.clone()),
                    None => return Err(Error::Syntax(format!("Invalid syntax at: {}", render(tokens)))),
                }
                i += 1;
            }
        }
    }
    Ok(segments)
}

fn syntax_at(message: &str, token: &Token) -> Error {
    Error::Syntax(format!("{} at line {} column {}", message, token.line, token.column))
}
