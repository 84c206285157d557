/// SQL Parser - turns a statement plus parameters into `Query` values

use super::lexer::Lexer;
use super::params::{Binder, Params};
use super::query::{
    AggregateFunction, AggregateSpec, ColumnAlias, Format, FormatKind, Order, Query, SortDirection,
    StatementType,
};
use super::segment::{split_statements, Clause, Segment, Statement};
use super::token::{Token, TokenType};
use super::where_builder;
use crate::error::{Error, Result};
use crate::types::{Row, Value};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

const DEFAULT_MAX_WHERE_TERMS: usize = 64;
const ARITHMETIC_ERROR: &str = "Arithmetic operators are not currently supported.";

/// Parse with the current time bound to `NOW()`
pub fn parse(sql: &str, params: &Params) -> Result<Vec<Query>> {
    Parser::new(params, Utc::now()).parse(sql)
}

pub struct Parser<'a> {
    binder: Binder<'a>,
    max_where_terms: usize,
}

impl<'a> Parser<'a> {
    pub fn new(params: &'a Params, now: DateTime<Utc>) -> Self {
        Self {
            binder: Binder::new(params, now),
            max_where_terms: DEFAULT_MAX_WHERE_TERMS,
        }
    }

    pub fn with_max_where_terms(mut self, max_where_terms: usize) -> Self {
        self.max_where_terms = max_where_terms;
        self
    }

    /// Parse one or more `UNION`-joined statements
    pub fn parse(mut self, sql: &str) -> Result<Vec<Query>> {
        let tokens = Lexer::new(sql).tokenize()?;
        let tokens = self.binder.rewrite_now(tokens)?;
        let statements = split_statements(&tokens)?;
        statements.iter().map(|statement| self.build_query(statement)).collect()
    }

    fn build_query(&self, statement: &Statement) -> Result<Query> {
        let head = statement
            .first()
            .ok_or_else(|| Error::Syntax("Empty statement.".into()))?;
        let statement_type = match head.clause {
            Clause::Select => StatementType::Select,
            Clause::InsertInto => StatementType::Insert,
            Clause::Update => StatementType::Update,
            Clause::Delete => StatementType::Delete,
            Clause::Reset => StatementType::Reset,
            _ => {
                return Err(Error::Syntax(
                    "Missing SELECT, UPDATE, INSERT INTO, or DELETE statement.".into(),
                ))
            }
        };

        let mut query = Query::new(statement_type, "");
        self.parse_head(head, &mut query)?;

        for segment in &statement[1..] {
            if !clause_allowed(statement_type, segment.clause) {
                return Err(Error::Syntax(format!(
                    "{} is not valid in a {} statement.",
                    segment.clause, statement_type
                )));
            }
            let mut cursor = Cursor::new(&segment.tokens, segment);
            match segment.clause {
                Clause::From => {
                    query.table = parse_name(&mut cursor, &self.binder, "table name")?;
                    cursor.expect_end(segment)?;
                }
                Clause::Where => {
                    query.where_clause = Some(where_builder::build(
                        &segment.tokens,
                        segment,
                        &self.binder,
                        self.max_where_terms,
                    )?);
                }
                Clause::Set => self.parse_set(&mut cursor, segment, &mut query)?,
                Clause::Values => self.parse_values(&mut cursor, segment, &mut query)?,
                Clause::OrderBy => self.parse_order(&mut cursor, &mut query)?,
                Clause::GroupBy => {
                    query.group = Some(parse_name(&mut cursor, &self.binder, "column")?);
                    if cursor.check(&TokenType::Comma) {
                        return Err(Error::Syntax(
                            "GROUP BY only currently supports single column grouping.".into(),
                        ));
                    }
                    cursor.expect_end(segment)?;
                }
                Clause::Limit => query.limit = Some(self.parse_count(&mut cursor, segment, "LIMIT")?),
                Clause::Offset => query.offset = self.parse_count(&mut cursor, segment, "OFFSET")?,
                _ => {
                    return Err(Error::Syntax(
                        "Multiple statement types in one statement.".into(),
                    ))
                }
            }
        }

        query.validate()?;
        Ok(query)
    }

    fn parse_head(&self, head: &Segment, query: &mut Query) -> Result<()> {
        let mut cursor = Cursor::new(&head.tokens, head);
        match head.clause {
            Clause::Select => return self.parse_select(&mut cursor, head, query),
            Clause::InsertInto => {
                query.table = parse_name(&mut cursor, &self.binder, "table name")?;
                if !cursor.is_eof() {
                    return Err(Error::Syntax(
                        "Only 'INSERT INTO table_name' queries are currently supported.".into(),
                    ));
                }
            }
            Clause::Update => {
                query.table = parse_name(&mut cursor, &self.binder, "table name")?;
                cursor.expect_end(head)?;
            }
            Clause::Reset => {
                query.table = if cursor.match_token(TokenType::Star) {
                    "*".to_string()
                } else {
                    parse_name(&mut cursor, &self.binder, "table name")?
                };
                cursor.expect_end(head)?;
            }
            _ => cursor.expect_end(head)?,
        }
        Ok(())
    }

    fn parse_select(&self, cursor: &mut Cursor, segment: &Segment, query: &mut Query) -> Result<()> {
        if cursor.match_token(TokenType::Distinct) || cursor.match_token(TokenType::Unique) {
            query.unique_only = true;
        }
        if cursor.is_eof() {
            return Err(Error::Syntax("Invalid SELECT statement syntax.".into()));
        }

        let mut items = 0;
        let mut wildcard = false;
        loop {
            items += 1;
            let target = if cursor.match_token(TokenType::Star) {
                if query.unique_only {
                    return Err(Error::Syntax(
                        "DISTINCT or UNIQUE does not currently support the wildcard (*) character.".into(),
                    ));
                }
                wildcard = true;
                query.columns.push("*".to_string());
                None
            } else if let Some(function) = cursor.aggregate_call() {
                cursor.advance();
                cursor.expect(TokenType::LParen, "Expected '(' after aggregate function")?;
                let column = if cursor.match_token(TokenType::Star) {
                    "*".to_string()
                } else {
                    parse_name(cursor, &self.binder, "column")?
                };
                cursor.expect(TokenType::RParen, "Expected ')' after aggregate column")?;
                let spec = AggregateSpec::new(function, column);
                let key = spec.key.clone();
                query.functions.push(spec);
                Some(key)
            } else {
                let (column, format) = parse_operand(cursor, &self.binder)?;
                if let Some(format) = format {
                    query.column_formats.insert(column.clone(), format);
                }
                query.columns.push(column.clone());
                Some(column)
            };

            if cursor.match_token(TokenType::As) {
                let alias = parse_name(cursor, &self.binder, "alias")?;
                match target {
                    Some(column) => query.column_alias.push(ColumnAlias { column, alias }),
                    None => return Err(cursor.error("The wildcard (*) cannot be aliased")),
                }
            }

            if !cursor.match_token(TokenType::Comma) {
                break;
            }
        }
        cursor.expect_end(segment)?;

        if wildcard && items > 1 {
            return Err(Error::Syntax(
                "The wildcard (*) cannot be combined with other columns.".into(),
            ));
        }
        Ok(())
    }

    fn parse_set(&self, cursor: &mut Cursor, segment: &Segment, query: &mut Query) -> Result<()> {
        let mut set = BTreeMap::new();
        loop {
            if cursor.check(&TokenType::Star) {
                return Err(Error::Syntax(format!("Invalid syntax at: {}", segment.text())));
            }
            let assigns = matches!(
                cursor.peek(1).token_type,
                TokenType::Eq | TokenType::StrictEq
            );
            if assigns {
                let column = parse_name(cursor, &self.binder, "column")?;
                cursor.advance();
                let value = parse_value(cursor, &self.binder)?;
                set.insert(column, value);
            } else {
                // Whole-row replacement
                let value = parse_value(cursor, &self.binder)?;
                if !matches!(value, Value::Object(_)) {
                    return Err(Error::Parameter(format!(
                        "SET without a column expects an object, got {}",
                        value.type_name()
                    )));
                }
                set.insert("*".to_string(), value);
            }
            if !cursor.match_token(TokenType::Comma) {
                break;
            }
        }
        cursor.expect_end(segment)?;
        query.set = Some(set);
        Ok(())
    }

    fn parse_values(&self, cursor: &mut Cursor, segment: &Segment, query: &mut Query) -> Result<()> {
        if cursor.is_eof() {
            return Err(Error::Syntax(format!("Invalid syntax at: {}", segment.text())));
        }
        loop {
            if cursor.match_token(TokenType::LParen) {
                loop {
                    let value = parse_value(cursor, &self.binder)?;
                    query.values.extend(rows_from_value(value)?);
                    if !cursor.match_token(TokenType::Comma) {
                        break;
                    }
                }
                cursor.expect(TokenType::RParen, "Expected ')' to close VALUES")?;
            } else {
                let value = parse_value(cursor, &self.binder)?;
                query.values.extend(rows_from_value(value)?);
            }
            if !cursor.match_token(TokenType::Comma) {
                break;
            }
        }
        cursor.expect_end(segment)
    }

    fn parse_order(&self, cursor: &mut Cursor, query: &mut Query) -> Result<()> {
        let column = parse_name(cursor, &self.binder, "column")?;
        let direction = if cursor.match_token(TokenType::Desc) {
            SortDirection::Desc
        } else {
            cursor.match_token(TokenType::Asc);
            SortDirection::Asc
        };
        if cursor.check(&TokenType::Comma) {
            return Err(Error::Syntax(
                "ORDER BY only currently supports single column sorting.".into(),
            ));
        }
        if !cursor.is_eof() {
            return Err(Error::Syntax(
                "ORDER BY only currently supports ASC or DESC sorting.".into(),
            ));
        }
        query.order = Some(Order { column, direction });
        Ok(())
    }

    fn parse_count(&self, cursor: &mut Cursor, segment: &Segment, clause: &str) -> Result<usize> {
        let count = match cursor.current().token_type.clone() {
            TokenType::Number(raw) => {
                cursor.advance();
                raw.parse::<usize>()
                    .map_err(|_| Error::Syntax(format!("{} is not a number.", clause)))?
            }
            TokenType::Param(name) => {
                cursor.advance();
                let value = self.binder.resolve(&name)?;
                let n = match value {
                    Value::Text(s) => s.trim().parse::<i64>().ok(),
                    other => other.as_i64(),
                };
                match n {
                    Some(n) if n >= 0 => n as usize,
                    _ => {
                        return Err(Error::Parameter(format!(
                            "{} expects a non-negative integer for ${}",
                            clause, name
                        )))
                    }
                }
            }
            _ => return Err(Error::Syntax(format!("{} is not a number.", clause))),
        };
        cursor.expect_end(segment)?;
        Ok(count)
    }
}

fn clause_allowed(statement: StatementType, clause: Clause) -> bool {
    use Clause::*;
    match statement {
        StatementType::Select => matches!(clause, From | Where | GroupBy | OrderBy | Limit | Offset),
        StatementType::Delete => matches!(clause, From | Where | GroupBy | OrderBy | Limit | Offset),
        StatementType::Update => matches!(clause, Set | Where | GroupBy | OrderBy | Limit | Offset),
        StatementType::Insert => matches!(clause, Values | GroupBy),
        StatementType::Reset => false,
    }
}

/// Rows carried by a VALUES item: an object, an array of objects, or JSON text
fn rows_from_value(value: Value) -> Result<Vec<Row>> {
    match value {
        Value::Object(row) => Ok(vec![row]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(Error::Parameter(format!(
                    "VALUES expects objects, got {}",
                    other.type_name()
                ))),
            })
            .collect(),
        Value::Text(text) => match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json) if json.is_object() || json.is_array() => rows_from_value(Value::from(json)),
            _ => Err(Error::Parameter(format!("VALUES expects objects, got text '{}'", text))),
        },
        other => Err(Error::Parameter(format!(
            "VALUES expects objects, got {}",
            other.type_name()
        ))),
    }
}

/// Token cursor over one clause segment
pub(crate) struct Cursor<'t> {
    tokens: &'t [Token],
    position: usize,
    eof: Token,
}

impl<'t> Cursor<'t> {
    pub(crate) fn new(tokens: &'t [Token], segment: &Segment) -> Self {
        let (line, column) = tokens
            .last()
            .map(|t| (t.line, t.column + 1))
            .unwrap_or((segment.line, segment.column));
        Self {
            tokens,
            position: 0,
            eof: Token::new(TokenType::Eof, line, column),
        }
    }

    pub(crate) fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&self.eof)
    }

    pub(crate) fn peek(&self, offset: usize) -> &Token {
        self.tokens.get(self.position + offset).unwrap_or(&self.eof)
    }

    pub(crate) fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.position >= self.tokens.len()
    }

    pub(crate) fn check(&self, token_type: &TokenType) -> bool {
        std::mem::discriminant(&self.current().token_type) == std::mem::discriminant(token_type)
    }

    pub(crate) fn match_token(&mut self, token_type: TokenType) -> bool {
        if self.check(&token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, token_type: TokenType, message: &str) -> Result<()> {
        if self.match_token(token_type) {
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    pub(crate) fn expect_end(&self, segment: &Segment) -> Result<()> {
        if self.is_eof() {
            Ok(())
        } else {
            Err(self.error(&format!("Invalid syntax at: {}", segment.text())))
        }
    }

    pub(crate) fn error(&self, msg: &str) -> Error {
        let token = self.current();
        Error::Syntax(format!(
            "{} at line {} column {}",
            msg, token.line, token.column
        ))
    }

    /// Current token names a function and is followed by `(`
    fn function_name(&self) -> Option<&str> {
        match (&self.current().token_type, &self.peek(1).token_type) {
            (TokenType::Identifier(name), TokenType::LParen) => Some(name),
            _ => None,
        }
    }

    fn aggregate_call(&self) -> Option<AggregateFunction> {
        self.function_name().and_then(AggregateFunction::from_name)
    }

    fn format_call(&self) -> Option<FormatKind> {
        self.function_name().and_then(FormatKind::from_name)
    }
}

/// Table, column or alias name: identifier, string or text parameter
pub(crate) fn parse_name(cursor: &mut Cursor, binder: &Binder, what: &str) -> Result<String> {
    let name = match &cursor.current().token_type {
        TokenType::Identifier(s) | TokenType::String(s) => s.clone(),
        TokenType::Param(p) => binder.resolve_name(p)?,
        _ => return Err(cursor.error(&format!("Expected {}", what))),
    };
    cursor.advance();
    Ok(name)
}

/// Column reference, optionally wrapped in a format call: `DATE(created, 'YYYY')`
pub(crate) fn parse_operand(cursor: &mut Cursor, binder: &Binder) -> Result<(String, Option<Format>)> {
    let Some(kind) = cursor.format_call() else {
        return Ok((parse_name(cursor, binder, "column")?, None));
    };
    cursor.advance();
    cursor.advance();
    let column = parse_name(cursor, binder, "column")?;
    let mut format = Format::new(kind);
    if cursor.match_token(TokenType::Comma) {
        if kind != FormatKind::Date {
            return Err(cursor.error("Only DATE() accepts a format argument"));
        }
        let args = match &cursor.current().token_type {
            TokenType::String(s) | TokenType::Identifier(s) => s.clone(),
            TokenType::Param(p) => binder.resolve_name(p)?,
            _ => return Err(cursor.error("Invalid DATE function syntax. Expected a format string")),
        };
        cursor.advance();
        format.args = Some(args);
    }
    cursor.expect(TokenType::RParen, "Expected ')' to close format function")?;
    Ok((column, Some(format)))
}

/// Literal, bare word, list or parameter value
pub(crate) fn parse_value(cursor: &mut Cursor, binder: &Binder) -> Result<Value> {
    let value = match cursor.current().token_type.clone() {
        TokenType::Number(raw) => number_value(&raw, cursor)?,
        TokenType::Minus => {
            cursor.advance();
            match cursor.current().token_type.clone() {
                TokenType::Number(raw) => match number_value(&raw, cursor)? {
                    Value::Integer(i) => Value::Integer(-i),
                    Value::Float(f) => Value::Float(-f),
                    other => other,
                },
                _ => return Err(Error::Syntax(ARITHMETIC_ERROR.into())),
            }
        }
        TokenType::String(s) | TokenType::Identifier(s) => Value::Text(s),
        TokenType::True => Value::Bool(true),
        TokenType::False => Value::Bool(false),
        TokenType::Null => Value::Null,
        TokenType::Param(name) => binder.resolve(&name)?.clone(),
        TokenType::LBracket => return parse_list(cursor, binder),
        _ => return Err(cursor.error("Expected a value")),
    };
    cursor.advance();
    // `5 - 3`: the lexer leaves binary minus to the parser
    if cursor.check(&TokenType::Minus) {
        return Err(Error::Syntax(ARITHMETIC_ERROR.into()));
    }
    Ok(value)
}

/// Value list for IN: `(a, b)`, `[a, b]`, or an array parameter
pub(crate) fn parse_list(cursor: &mut Cursor, binder: &Binder) -> Result<Value> {
    let close = match cursor.current().token_type {
        TokenType::LParen => TokenType::RParen,
        TokenType::LBracket => TokenType::RBracket,
        TokenType::Param(ref name) => {
            let name = name.clone();
            let value = binder.resolve(&name)?.clone();
            cursor.advance();
            return match value {
                Value::Array(_) => Ok(value),
                other => Err(Error::Parameter(format!(
                    "IN expects an array for ${}, got {}",
                    name,
                    other.type_name()
                ))),
            };
        }
        _ => return Err(cursor.error("Expected a value list")),
    };
    cursor.advance();

    let mut items = Vec::new();
    if !cursor.check(&close) {
        loop {
            items.push(parse_value(cursor, binder)?);
            if !cursor.match_token(TokenType::Comma) {
                break;
            }
        }
    }
    cursor.expect(close, "Expected end of value list")?;

    // `IN ($ids)` with an array parameter
    if let [Value::Array(inner)] = items.as_slice() {
        return Ok(Value::Array(inner.clone()));
    }
    Ok(Value::Array(items))
}

fn number_value(raw: &str, cursor: &Cursor) -> Result<Value> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::Integer(i));
    }
    raw.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| cursor.error(&format!("Invalid number: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::query::{CheckItem, Operator};
    use chrono::TimeZone;
    use serde_json::json;

    fn params(json: serde_json::Value) -> Params {
        match Value::from(json) {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    fn parse_one(sql: &str, p: &Params) -> Query {
        let mut queries = parse(sql, p).unwrap();
        assert_eq!(queries.len(), 1);
        queries.remove(0)
    }

    #[test]
    fn test_parse_select_basic() {
        let query = parse_one(
            "SELECT name, age AS years FROM users WHERE age >= 30 ORDER BY name DESC LIMIT 10 OFFSET 5",
            &Params::new(),
        );
        assert_eq!(query.statement_type, StatementType::Select);
        assert_eq!(query.table, "users");
        assert_eq!(query.columns, vec!["name", "age"]);
        assert_eq!(query.column_alias[0].alias, "years");
        assert_eq!(query.order.as_ref().unwrap().direction, SortDirection::Desc);
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, 5);
        let check = query.single_check().unwrap();
        assert_eq!(check.operator, Operator::Ge);
        assert_eq!(check.value, Value::Integer(30));
    }

    #[test]
    fn test_parse_aggregates() {
        let query = parse_one("SELECT COUNT(*), avg(age) AS mean FROM users", &Params::new());
        assert_eq!(query.functions.len(), 2);
        assert_eq!(query.functions[0].key, "COUNT(*)");
        assert_eq!(query.functions[1].function, AggregateFunction::Avg);
        assert_eq!(query.column_alias[0].column, "AVG(age)");

        let err = parse("SELECT COUNT(*), name FROM users", &Params::new()).unwrap_err();
        assert!(err.to_string().contains("both aggregated and non-aggregated"));
        assert!(parse("SELECT SUM(*) FROM users", &Params::new()).is_err());
    }

    #[test]
    fn test_parse_formats_and_distinct() {
        let query = parse_one(
            "SELECT DATE(created, 'YYYY-MM-DD') AS day, BOOL(active) FROM events",
            &Params::new(),
        );
        assert_eq!(query.columns, vec!["created", "active"]);
        assert_eq!(
            query.column_formats["created"],
            Format::with_args(FormatKind::Date, "YYYY-MM-DD")
        );
        assert_eq!(query.column_formats["active"].kind, FormatKind::Bool);

        let query = parse_one("SELECT UNIQUE tags FROM posts", &Params::new());
        assert!(query.unique_only);
        assert!(parse("SELECT DISTINCT * FROM posts", &Params::new()).is_err());
        assert!(parse("SELECT DISTINCT a, b FROM posts", &Params::new()).is_err());
        assert!(parse("SELECT DISTINCT a FROM posts GROUP BY a", &Params::new()).is_err());
    }

    #[test]
    fn test_parse_params() {
        let p = params(json!({"table": "users", "min": 18, "row": {"name": "Ann"}, "ids": [1, 2], "n": "3"}));
        let query = parse_one("SELECT * FROM $table WHERE age > $min AND id IN $ids LIMIT $n", &p);
        assert_eq!(query.table, "users");
        assert_eq!(query.limit, Some(3));
        let checks = query.where_clause.as_ref().unwrap()[0].checks.clone();
        assert!(matches!(&checks[1], CheckItem::Single(c) if c.value == Value::from(vec![Value::Integer(1), Value::Integer(2)])));

        let err = parse("SELECT * FROM users WHERE age > $missing", &p).unwrap_err();
        assert!(matches!(err, Error::Parameter(ref m) if m == "Missing key: missing"));

        let err = parse("SELECT * FROM users WHERE id IN $min", &p).unwrap_err();
        assert!(matches!(err, Error::Parameter(_)));
    }

    #[test]
    fn test_parse_insert_update_delete_reset() {
        let p = params(json!({"row": {"name": "Ann", "age": 30}, "rows": [{"name": "A"}, {"name": "B"}]}));
        let insert = parse_one("INSERT INTO users VALUES ($row)", &p);
        assert_eq!(insert.statement_type, StatementType::Insert);
        assert_eq!(insert.values.len(), 1);
        let insert = parse_one("INSERT INTO users VALUES ($rows), ('{\"name\": \"C\"}')", &p);
        assert_eq!(insert.values.len(), 3);
        assert!(parse("INSERT INTO users VALUES (1)", &p).is_err());

        let update = parse_one("UPDATE users SET age = 31, active = true WHERE name = 'Ann'", &p);
        let set = update.set.as_ref().unwrap();
        assert_eq!(set["age"], Value::Integer(31));
        assert_eq!(set["active"], Value::Bool(true));
        let replace = parse_one("UPDATE users SET $row WHERE id = 1", &p);
        assert!(replace.set.as_ref().unwrap().contains_key("*"));
        let err = parse("UPDATE users SET age = 1", &p).unwrap_err();
        assert_eq!(err.to_string(), "Invalid syntax: Missing WHERE.");

        let delete = parse_one("DELETE FROM users WHERE age < -1", &p);
        assert_eq!(delete.single_check().unwrap().value, Value::Integer(-1));
        assert_eq!(parse_one("RESET *", &p).table, "*");
        assert_eq!(parse_one("RESET users", &p).statement_type, StatementType::Reset);
    }

    #[test]
    fn test_parse_shape_errors() {
        let p = Params::new();
        assert_eq!(
            parse("SELECT name", &p).unwrap_err().to_string(),
            "Invalid syntax: Missing FROM."
        );
        assert_eq!(
            parse("INSERT INTO users", &p).unwrap_err().to_string(),
            "Invalid syntax: Missing VALUES."
        );
        assert!(parse("SELECT * FROM users LIMIT ten", &p).is_err());
        assert!(parse("SELECT * FROM users ORDER BY a, b", &p).is_err());
        assert!(parse("SELECT * FROM users SET a = 1", &p).is_err());
        assert!(parse("FROM users", &p).is_err());

        for sql in [
            "SELECT * FROM users WHERE a = 5 - 3",
            "UPDATE users SET age = 31 - 1 WHERE id = 1",
            "SELECT * FROM users WHERE a = 5 + 3",
        ] {
            let err = parse(sql, &p).unwrap_err();
            assert_eq!(err.to_string(), "Invalid syntax: Arithmetic operators are not currently supported.");
        }
    }

    #[test]
    fn test_parse_union_and_now() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let p = Params::new();
        let queries = Parser::new(&p, now)
            .parse("SELECT * FROM a WHERE ts < NOW() UNION SELECT * FROM b WHERE day = NOW('YYYY-MM-DD')")
            .unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].single_check().unwrap().value, Value::Integer(now.timestamp_millis()));
        assert_eq!(queries[1].single_check().unwrap().value, Value::from("2024-01-01"));
    }
}
