//! WHERE clause normalization
//!
//! A WHERE clause becomes a list of conditions joined by OR. Each condition
//! is either a conjunction of checks or a disjunction of checks and
//! AND-groups. One level of parentheses is supported; an AND of
//! parenthesized OR-groups is distributed into a disjunction of AND-groups.

use super::parser::{parse_list, parse_operand, parse_value, Cursor};
use super::params::Binder;
use super::query::{Check, CheckItem, Condition, Operator};
use super::segment::Segment;
use super::token::{render, Token, TokenType};
use crate::error::{Error, Result};

const NESTING_ERROR: &str = "Nested parentheses are not currently supported in WHERE clauses.";

pub(crate) fn build(
    tokens: &[Token],
    segment: &Segment,
    binder: &Binder,
    max_terms: usize,
) -> Result<Vec<Condition>> {
    if tokens.is_empty() {
        return Err(Error::Syntax("Invalid syntax at: WHERE".into()));
    }
    let builder = WhereBuilder {
        segment,
        binder,
        max_terms,
    };
    split_top(tokens, &TokenType::Or)
        .into_iter()
        .map(|branch| {
            let inner = strip_group(branch).unwrap_or(branch);
            builder.condition(inner)
        })
        .collect()
}

struct WhereBuilder<'a, 'b> {
    segment: &'a Segment,
    binder: &'a Binder<'b>,
    max_terms: usize,
}

impl WhereBuilder<'_, '_> {
    fn condition(&self, tokens: &[Token]) -> Result<Condition> {
        if tokens.is_empty() {
            return Err(self.invalid());
        }

        // `(a OR b AND c)` after stripping the outer group
        if contains_top(tokens, &TokenType::Or) {
            let items = split_top(tokens, &TokenType::Or)
                .into_iter()
                .map(|part| {
                    let part = match strip_group(part) {
                        Some(inner) if !contains_top(inner, &TokenType::Or) => inner,
                        _ => part,
                    };
                    if has_group(part) {
                        return Err(Error::Syntax(NESTING_ERROR.into()));
                    }
                    self.conjunction(part).map(into_item)
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(Condition::any(items));
        }

        // Each AND factor is a list of alternatives, each an AND of checks
        let mut factors: Vec<Vec<Vec<Check>>> = Vec::new();
        for factor in split_top(tokens, &TokenType::And) {
            match strip_group(factor) {
                Some(inner) => {
                    if has_group(inner) {
                        return Err(Error::Syntax(NESTING_ERROR.into()));
                    }
                    let alternatives = split_top(inner, &TokenType::Or)
                        .into_iter()
                        .map(|term| self.conjunction(term))
                        .collect::<Result<Vec<_>>>()?;
                    factors.push(alternatives);
                }
                None => {
                    if has_group(factor) {
                        return Err(self.invalid());
                    }
                    factors.push(vec![vec![self.check(factor)?]]);
                }
            }
        }

        if factors.iter().all(|alternatives| alternatives.len() == 1) {
            let checks = factors.into_iter().flatten().flatten().collect();
            return Ok(Condition::all(checks));
        }

        let total = factors
            .iter()
            .try_fold(1usize, |acc, alternatives| acc.checked_mul(alternatives.len()))
            .filter(|total| *total <= self.max_terms);
        if total.is_none() {
            return Err(Error::Syntax(format!(
                "WHERE clause expands to more than {} terms.",
                self.max_terms
            )));
        }

        let mut terms: Vec<Vec<Check>> = vec![Vec::new()];
        for alternatives in factors {
            let mut next = Vec::with_capacity(terms.len() * alternatives.len());
            for term in &terms {
                for alternative in &alternatives {
                    let mut combined = term.clone();
                    combined.extend(alternative.iter().cloned());
                    next.push(combined);
                }
            }
            terms = next;
        }
        Ok(Condition::any(terms.into_iter().map(into_item).collect()))
    }

    fn conjunction(&self, tokens: &[Token]) -> Result<Vec<Check>> {
        split_top(tokens, &TokenType::And)
            .into_iter()
            .map(|leaf| self.check(leaf))
            .collect()
    }

    /// `operand operator value`
    fn check(&self, tokens: &[Token]) -> Result<Check> {
        if tokens.is_empty() {
            return Err(self.invalid());
        }
        let mut cursor = Cursor::new(tokens, self.segment);
        let (column, format) = parse_operand(&mut cursor, self.binder)?;
        let operator = match cursor.current().token_type {
            TokenType::Eq => Operator::Eq,
            TokenType::StrictEq => Operator::StrictEq,
            TokenType::Ne => Operator::Ne,
            TokenType::StrictNe => Operator::StrictNe,
            TokenType::Gt => Operator::Gt,
            TokenType::Lt => Operator::Lt,
            TokenType::Ge => Operator::Ge,
            TokenType::Le => Operator::Le,
            TokenType::NotGt => Operator::NotGt,
            TokenType::NotLt => Operator::NotLt,
            TokenType::NotGe => Operator::NotGe,
            TokenType::NotLe => Operator::NotLe,
            TokenType::Like => Operator::Like,
            TokenType::Includes => Operator::Includes,
            TokenType::Excludes => Operator::Excludes,
            TokenType::In => Operator::In,
            TokenType::NotIn => Operator::NotIn,
            _ => return Err(cursor.error("Expected comparison operator")),
        };
        cursor.advance();
        let value = if operator.expects_list() {
            parse_list(&mut cursor, self.binder)?
        } else {
            parse_value(&mut cursor, self.binder)?
        };
        if !cursor.is_eof() {
            return Err(Error::Syntax(format!("Invalid syntax at: {}", render(tokens))));
        }
        Ok(Check {
            column,
            operator,
            value,
            format,
        })
    }

    fn invalid(&self) -> Error {
        Error::Syntax(format!("Invalid syntax at: {}", self.segment.text()))
    }
}

fn into_item(mut checks: Vec<Check>) -> CheckItem {
    if checks.len() == 1 {
        CheckItem::Single(checks.remove(0))
    } else {
        CheckItem::Group(checks)
    }
}

/// A `(` that groups rather than calls a function or opens an IN list
fn is_group_open(tokens: &[Token], i: usize) -> bool {
    if tokens[i].token_type != TokenType::LParen {
        return false;
    }
    match i.checked_sub(1).map(|p| &tokens[p].token_type) {
        Some(TokenType::Identifier(_)) | Some(TokenType::In) | Some(TokenType::NotIn) => false,
        _ => true,
    }
}

fn has_group(tokens: &[Token]) -> bool {
    (0..tokens.len()).any(|i| is_group_open(tokens, i))
}

/// Inner tokens when the whole run is one parenthesized group
fn strip_group(tokens: &[Token]) -> Option<&[Token]> {
    if tokens.len() < 2 || !is_group_open(tokens, 0) {
        return None;
    }
    let mut depth = 0i32;
    for (i, token) in tokens.iter().enumerate() {
        match token.token_type {
            TokenType::LParen | TokenType::LBracket => depth += 1,
            TokenType::RParen | TokenType::RBracket => {
                depth -= 1;
                if depth == 0 {
                    return (i == tokens.len() - 1).then(|| &tokens[1..i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top<'t>(tokens: &'t [Token], separator: &TokenType) -> Vec<&'t [Token]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match &token.token_type {
            TokenType::LParen | TokenType::LBracket => depth += 1,
            TokenType::RParen | TokenType::RBracket => depth -= 1,
            t if depth == 0 && t == separator => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

fn contains_top(tokens: &[Token], separator: &TokenType) -> bool {
    split_top(tokens, separator).len() > 1
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::sql::parser::parse;
    use crate::sql::params::Params;
    use crate::sql::query::{CheckItem, Condition, FormatKind, Operator};
    use crate::types::Value;

    fn conditions(sql: &str) -> Vec<Condition> {
        let queries = parse(&format!("SELECT * FROM t WHERE {}", sql), &Params::new()).unwrap();
        queries[0].where_clause.clone().unwrap()
    }

    fn group_len(item: &CheckItem) -> usize {
        item.checks().len()
    }

    #[test]
    fn test_flat_and() {
        let where_clause = conditions("a = 1 AND b != 'x' AND c LIKE 'jo%'");
        assert_eq!(where_clause.len(), 1);
        assert!(where_clause[0].require_all);
        assert_eq!(where_clause[0].checks.len(), 3);
        assert_eq!(where_clause[0].checks[2].checks()[0].operator, Operator::Like);
    }

    #[test]
    fn test_top_level_or_branches() {
        let where_clause = conditions("a = 1 OR b = 2 AND c = 3");
        assert_eq!(where_clause.len(), 2);
        assert_eq!(where_clause[1].checks.len(), 2);
        assert!(where_clause.iter().all(|c| c.require_all));
    }

    #[test]
    fn test_distribution() {
        // (a OR b) AND c  =>  (a AND c) OR (b AND c)
        let where_clause = conditions("(a = 1 OR b = 2) AND c = 3");
        assert_eq!(where_clause.len(), 1);
        let condition = &where_clause[0];
        assert!(!condition.require_all);
        assert_eq!(condition.checks.len(), 2);
        assert!(condition.checks.iter().all(|item| group_len(item) == 2));

        let where_clause = conditions("(a = 1 OR b = 2) AND (c = 3 OR d = 4 AND e = 5)");
        let lens: Vec<usize> = where_clause[0].checks.iter().map(group_len).collect();
        assert_eq!(lens, vec![2, 3, 2, 3]);
    }

    #[test]
    fn test_wrapped_or_group() {
        let where_clause = conditions("(a = 1 OR (b = 2 AND c = 3))");
        assert_eq!(where_clause.len(), 1);
        assert!(!where_clause[0].require_all);
        assert!(matches!(where_clause[0].checks[0], CheckItem::Single(_)));
        assert!(matches!(&where_clause[0].checks[1], CheckItem::Group(g) if g.len() == 2));
    }

    #[test]
    fn test_nesting_and_expansion_limits() {
        let err = parse("SELECT * FROM t WHERE ((a = 1 OR b = 2) OR c = 3) AND d = 4", &Params::new())
            .unwrap_err();
        assert!(matches!(err, Error::Syntax(ref m) if m.contains("Nested parentheses")));

        let params = Params::new();
        let err = crate::sql::parser::Parser::new(&params, chrono::Utc::now())
            .with_max_where_terms(4)
            .parse("SELECT * FROM t WHERE (a = 1 OR a = 2) AND (b = 1 OR b = 2) AND (c = 1 OR c = 2)")
            .unwrap_err();
        assert!(err.to_string().contains("more than 4 terms"));
    }

    #[test]
    fn test_leaf_forms() {
        let where_clause = conditions("DATE(created, 'YYYY') = '2024' AND tags INCLUDES 'rust' AND id !IN (1, 2)");
        let checks: Vec<_> = where_clause[0].checks.iter().flat_map(|i| i.checks()).collect();
        assert_eq!(checks[0].format.as_ref().unwrap().kind, FormatKind::Date);
        assert_eq!(checks[1].operator, Operator::Includes);
        assert_eq!(checks[2].value, Value::from(vec![Value::Integer(1), Value::Integer(2)]));
        assert!(parse("SELECT * FROM t WHERE a", &Params::new()).is_err());
        assert!(parse("SELECT * FROM t WHERE a = 1 2", &Params::new()).is_err());
    }
}
