//! Parameter binding
//!
//! `$name` placeholders resolve against the caller's parameter map. `NOW()`
//! calls are rewritten into generated parameters bound to one instant per
//! parse, so every `NOW()` in a statement sees the same time.

use super::format::render_timestamp;
use super::token::{Token, TokenType};
use crate::error::{Error, Result};
use crate::types::Value;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub type Params = BTreeMap<String, Value>;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub struct Binder<'a> {
    params: &'a Params,
    generated: Params,
    now: DateTime<Utc>,
}

impl<'a> Binder<'a> {
    pub fn new(params: &'a Params, now: DateTime<Utc>) -> Self {
        Self {
            params,
            generated: Params::new(),
            now,
        }
    }

    pub fn resolve(&self, name: &str) -> Result<&Value> {
        self.generated
            .get(name)
            .or_else(|| self.params.get(name))
            .ok_or_else(|| Error::Parameter(format!("Missing key: {}", name)))
    }

    /// Resolve a parameter that must hold text (table, column, alias names)
    pub fn resolve_name(&self, name: &str) -> Result<String> {
        match self.resolve(name)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(Error::Parameter(format!(
                "Expected text for ${}, got {}",
                name,
                other.type_name()
            ))),
        }
    }

    /// Replace every `NOW([format])` call with a generated parameter.
    ///
    /// Generated names contain `#`, which the lexer never produces, so they
    /// cannot collide with caller parameters.
    pub fn rewrite_now(&mut self, tokens: Vec<Token>) -> Result<Vec<Token>> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            let is_now = matches!(&token.token_type, TokenType::Identifier(name) if name.eq_ignore_ascii_case("now"))
                && matches!(tokens.get(i + 1).map(|t| &t.token_type), Some(TokenType::LParen));
            if !is_now {
                out.push(token.clone());
                i += 1;
                continue;
            }

            let (format, consumed) = match tokens.get(i + 2).map(|t| &t.token_type) {
                Some(TokenType::RParen) => (None, 3),
                Some(TokenType::String(s)) | Some(TokenType::Identifier(s))
                    if matches!(tokens.get(i + 3).map(|t| &t.token_type), Some(TokenType::RParen)) =>
                {
                    (Some(s.clone()), 4)
                }
                _ => {
                    return Err(Error::Syntax(format!(
                        "Invalid NOW() call at line {} column {}",
                        token.line, token.column
                    )))
                }
            };

            let name = format!("now#{}", self.generated.len());
            self.generated
                .insert(name.clone(), render_timestamp(&self.now, format.as_deref()));
            out.push(Token::new(TokenType::Param(name), token.line, token.column));
            i += consumed;
        }
        Ok(out)
    }
}
