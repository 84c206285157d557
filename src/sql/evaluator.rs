/// WHERE evaluation - checks and conditions against rows
use super::format;
use super::query::{Check, CheckItem, Condition, Operator};
use crate::error::{Error, Result};
use crate::types::{resolve_path, Row, TableDescriptor, Value};
use std::cmp::{min, Ordering};

/// Resolve a column on a row.
///
/// A plain column that is declared (or is the key field) but absent from
/// the row reads as `Null`. Undeclared columns and dot-paths with a missing
/// segment are unknown.
pub fn resolve_column(table: &TableDescriptor, row: &Row, column: &str) -> Result<Value> {
    match resolve_path(row, column) {
        Some(value) => Ok(value.clone()),
        None if !column.contains('.') && table.has_column(column) => Ok(Value::Null),
        None => Err(Error::unknown_column(column)),
    }
}

pub struct Evaluator<'a> {
    table: &'a TableDescriptor,
    like_threshold: f64,
}

impl<'a> Evaluator<'a> {
    pub fn new(table: &'a TableDescriptor, like_threshold: f64) -> Self {
        Self {
            table,
            like_threshold,
        }
    }

    /// OR across conditions. A missing WHERE matches every row.
    pub fn matches_where(&self, where_clause: Option<&[Condition]>, row: &Row) -> Result<bool> {
        let Some(conditions) = where_clause else {
            return Ok(true);
        };
        for condition in conditions {
            if self.condition(condition, row)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn condition(&self, condition: &Condition, row: &Row) -> Result<bool> {
        if condition.require_all {
            for item in &condition.checks {
                if !self.item(item, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        } else {
            for item in &condition.checks {
                if self.item(item, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }

    /// A group passes only when every check in it passes
    fn item(&self, item: &CheckItem, row: &Row) -> Result<bool> {
        for check in item.checks() {
            if !self.check(check, row)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn check(&self, check: &Check, row: &Row) -> Result<bool> {
        let mut actual = resolve_column(self.table, row, &check.column)?;
        if let Some(fmt) = &check.format {
            actual = format::apply(fmt, &actual);
        }
        let expected = &check.value;

        let result = match check.operator {
            Operator::Eq => actual.loose_eq(expected),
            Operator::StrictEq => actual.strict_eq(expected),
            Operator::Ne => !actual.loose_eq(expected),
            Operator::StrictNe => !actual.strict_eq(expected),
            Operator::Gt => compare(&actual, expected) == Some(Ordering::Greater),
            Operator::Lt => compare(&actual, expected) == Some(Ordering::Less),
            Operator::Ge => matches!(compare(&actual, expected), Some(Ordering::Greater | Ordering::Equal)),
            Operator::Le => matches!(compare(&actual, expected), Some(Ordering::Less | Ordering::Equal)),
            Operator::NotGt => compare(&actual, expected) != Some(Ordering::Greater),
            Operator::NotLt => compare(&actual, expected) != Some(Ordering::Less),
            Operator::NotGe => !matches!(compare(&actual, expected), Some(Ordering::Greater | Ordering::Equal)),
            Operator::NotLe => !matches!(compare(&actual, expected), Some(Ordering::Less | Ordering::Equal)),
            Operator::Like => self.like(&actual, expected),
            Operator::Includes => includes(&actual, expected),
            Operator::Excludes => !includes(&actual, expected),
            Operator::In => member_of(&actual, expected),
            Operator::NotIn => !member_of(&actual, expected),
        };
        Ok(result)
    }

    fn like(&self, actual: &Value, pattern: &Value) -> bool {
        if actual.is_null() {
            return false;
        }
        let needle = pattern.to_key_string();
        let needle = needle.trim_matches('%').to_lowercase();
        let haystack = actual.to_key_string().to_lowercase();
        let allowed = (needle.chars().count() as f64 * self.like_threshold).floor() as usize;
        approximate_contains(&haystack, &needle, allowed)
    }
}

/// Text compares lexicographically, everything else numerically.
/// `None` when the values are not comparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Null, _) | (_, Value::Null) => None,
        _ => a.to_f64()?.partial_cmp(&b.to_f64()?),
    }
}

fn includes(actual: &Value, needle: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| item.strict_eq(needle)),
        Value::Text(s) => s.contains(needle.to_key_string().as_str()),
        _ => false,
    }
}

fn member_of(actual: &Value, list: &Value) -> bool {
    list.as_array()
        .map_or(false, |items| items.iter().any(|item| item.strict_eq(actual)))
}

/// Whether `needle` occurs in `haystack` with at most `max_edits` edits.
///
/// Levenshtein distance where the match may start anywhere in the haystack
/// (free leading and trailing characters).
fn approximate_contains(haystack: &str, needle: &str, max_edits: usize) -> bool {
    if max_edits == 0 {
        return haystack.contains(needle);
    }
    let pattern: Vec<char> = needle.chars().collect();
    if pattern.len() <= max_edits {
        return true;
    }

    // Column-wise over the pattern; row 0 is free so a match may start anywhere
    let mut prev: Vec<usize> = (0..=pattern.len()).collect();
    let mut curr = vec![0; pattern.len() + 1];
    for ch in haystack.chars() {
        curr[0] = 0;
        for i in 1..=pattern.len() {
            let cost = if pattern[i - 1] == ch { 0 } else { 1 };
            curr[i] = min(min(prev[i] + 1, curr[i - 1] + 1), prev[i - 1] + cost);
        }
        if curr[pattern.len()] <= max_edits {
            return true;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::query::{Format, FormatKind};
    use crate::types::ColumnDef;
    use serde_json::json;

    fn table() -> TableDescriptor {
        TableDescriptor::new("users", "id", true)
            .with_column(ColumnDef::new("name"))
            .with_column(ColumnDef::new("age"))
            .with_column(ColumnDef::new("tags"))
            .with_column(ColumnDef::new("profile"))
    }

    fn row(json: serde_json::Value) -> Row {
        match Value::from(json) {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    fn eval(check: Check, r: &Row) -> bool {
        let t = table();
        Evaluator::new(&t, 0.0).check(&check, r).unwrap()
    }

    #[test]
    fn test_equality_operators() {
        let r = row(json!({"id": 1, "name": "Ann", "age": 30}));
        assert!(eval(Check::new("age", Operator::Eq, "30"), &r));
        assert!(!eval(Check::new("age", Operator::StrictEq, "30"), &r));
        assert!(eval(Check::new("age", Operator::StrictEq, 30.0), &r));
        assert!(eval(Check::new("name", Operator::StrictNe, "Bob"), &r));
    }

    #[test]
    fn test_comparisons() {
        let r = row(json!({"name": "Ann", "age": 30}));
        assert!(eval(Check::new("age", Operator::Ge, 30), &r));
        assert!(eval(Check::new("age", Operator::NotGt, 30), &r));
        assert!(!eval(Check::new("age", Operator::NotLe, 30), &r));
        assert!(eval(Check::new("name", Operator::Lt, "Bob"), &r));
        assert!(eval(Check::new("age", Operator::Gt, "29.5"), &r));
        // Missing declared column reads as null, which never orders
        assert!(!eval(Check::new("tags", Operator::Gt, 0), &r));
        assert!(eval(Check::new("tags", Operator::NotGt, 0), &r));
    }

    #[test]
    fn test_like_includes_in() {
        let r = row(json!({"name": "Johnny", "tags": ["rust", "sql"]}));
        assert!(eval(Check::new("name", Operator::Like, "%john%"), &r));
        assert!(!eval(Check::new("name", Operator::Like, "jhon"), &r));
        assert!(eval(Check::new("tags", Operator::Includes, "rust"), &r));
        assert!(eval(Check::new("tags", Operator::Excludes, "go"), &r));
        assert!(eval(Check::new("name", Operator::Includes, "ohn"), &r));
        let list = Value::from(vec![Value::from("Ann"), Value::from("Johnny")]);
        assert!(eval(Check::new("name", Operator::In, list.clone()), &r));
        assert!(!eval(Check::new("name", Operator::NotIn, list), &r));
    }

    #[test]
    fn test_fuzzy_like() {
        let t = table();
        let r = row(json!({"name": "Jonathan"}));
        let fuzzy = Evaluator::new(&t, 0.25);
        assert!(fuzzy.check(&Check::new("name", Operator::Like, "jonatan"), &r).unwrap());
        assert!(!fuzzy.check(&Check::new("name", Operator::Like, "margaret"), &r).unwrap());
        assert!(approximate_contains("kitten", "sitten", 1));
        assert!(!approximate_contains("kitten", "sitting", 1));
    }

    #[test]
    fn test_dot_path_and_unknown_columns() {
        let t = table();
        let evaluator = Evaluator::new(&t, 0.0);
        let r = row(json!({"profile": {"city": "Oslo"}}));
        assert!(evaluator
            .check(&Check::new("profile.city", Operator::Eq, "Oslo"), &r)
            .unwrap());
        let err = evaluator
            .check(&Check::new("profile.zip", Operator::Eq, "1"), &r)
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert!(evaluator.check(&Check::new("height", Operator::Eq, 1), &r).is_err());
    }

    #[test]
    fn test_condition_semantics() {
        let t = table();
        let evaluator = Evaluator::new(&t, 0.0);
        let ann = row(json!({"name": "Ann", "age": 30}));
        let bob = row(json!({"name": "Bob", "age": 40}));
        let condition = Condition::any(vec![
            CheckItem::Group(vec![
                Check::new("age", Operator::Eq, 30),
                Check::new("name", Operator::Eq, "Ann"),
            ]),
            CheckItem::Group(vec![
                Check::new("age", Operator::Eq, 40),
                Check::new("name", Operator::Eq, "Ann"),
            ]),
        ]);
        assert!(evaluator.condition(&condition, &ann).unwrap());
        assert!(!evaluator.condition(&condition, &bob).unwrap());

        let all = Condition::all(vec![Check::new("age", Operator::Gt, 20), Check::new("name", Operator::Eq, "Bob")]);
        assert!(!evaluator.condition(&all, &ann).unwrap());
        assert!(evaluator.condition(&all, &bob).unwrap());
        assert!(evaluator.matches_where(None, &ann).unwrap());
    }

    #[test]
    fn test_formatted_check() {
        let t = table();
        let r = row(json!({"name": "1"}));
        let mut check = Check::new("name", Operator::StrictEq, true);
        check.format = Some(Format::new(FormatKind::Bool));
        assert!(Evaluator::new(&t, 0.0).check(&check, &r).unwrap());
    }
}
