//! Parsed statement representation
//!
//! A `Query` is what the parser produces and what the executor consumes. It
//! is also the wire shape of pre-built queries sent by a host, so every type
//! here round-trips through serde (camelCase keys).

use crate::error::{Error, Result};
use crate::types::{Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementType {
    Select,
    Update,
    Delete,
    Insert,
    Reset,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatementType::Select => "SELECT",
            StatementType::Update => "UPDATE",
            StatementType::Delete => "DELETE",
            StatementType::Insert => "INSERT",
            StatementType::Reset => "RESET",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    Count,
    Min,
    Max,
    Avg,
    Sum,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(Self::Count),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            "AVG" => Some(Self::Avg),
            "SUM" => Some(Self::Sum),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Avg => "AVG",
            Self::Sum => "SUM",
        }
    }
}

/// One aggregate in a SELECT list, e.g. `AVG(age)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub function: AggregateFunction,
    /// Source column, `*` for `COUNT(*)`
    pub column: String,
    /// Output key, e.g. `AVG(age)`
    pub key: String,
}

impl AggregateSpec {
    pub fn new(function: AggregateFunction, column: impl Into<String>) -> Self {
        let column = column.into();
        let key = format!("{}({})", function.name(), column);
        Self { function, column, key }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormatKind {
    Date,
    Json,
    Int,
    Bool,
    Float,
}

impl FormatKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "DATE" => Some(Self::Date),
            "JSON" => Some(Self::Json),
            "INT" => Some(Self::Int),
            "BOOL" => Some(Self::Bool),
            "FLOAT" => Some(Self::Float),
            _ => None,
        }
    }
}

/// Type coercion applied to a column value before output or comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Format {
    #[serde(rename = "type")]
    pub kind: FormatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
}

impl Format {
    pub fn new(kind: FormatKind) -> Self {
        Self { kind, args: None }
    }

    pub fn with_args(kind: FormatKind, args: impl Into<String>) -> Self {
        Self {
            kind,
            args: Some(args.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "==")]
    StrictEq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "!==")]
    StrictNe,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "!>")]
    NotGt,
    #[serde(rename = "!<")]
    NotLt,
    #[serde(rename = "!>=")]
    NotGe,
    #[serde(rename = "!<=")]
    NotLe,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "INCLUDES")]
    Includes,
    #[serde(rename = "EXCLUDES")]
    Excludes,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "!IN")]
    NotIn,
}

impl Operator {
    pub fn is_equality(&self) -> bool {
        matches!(self, Operator::Eq | Operator::StrictEq)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Operator::StrictEq | Operator::StrictNe)
    }

    pub fn expects_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

/// One leaf comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    /// Column name, dot-paths allowed
    pub column: String,
    #[serde(rename = "type")]
    pub operator: Operator,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
}

impl Check {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
            format: None,
        }
    }
}

/// Either a single check or an AND-subgroup counted as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckItem {
    Single(Check),
    Group(Vec<Check>),
}

impl CheckItem {
    pub fn checks(&self) -> &[Check] {
        match self {
            CheckItem::Single(check) => std::slice::from_ref(check),
            CheckItem::Group(checks) => checks,
        }
    }
}

/// One OR-branch of a WHERE clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// AND across `checks` when true, OR when false
    pub require_all: bool,
    pub checks: Vec<CheckItem>,
}

impl Condition {
    pub fn all(checks: Vec<Check>) -> Self {
        Self {
            require_all: true,
            checks: checks.into_iter().map(CheckItem::Single).collect(),
        }
    }

    pub fn any(checks: Vec<CheckItem>) -> Self {
        Self {
            require_all: false,
            checks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    #[serde(rename = "by")]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnAlias {
    pub column: String,
    pub alias: String,
}

/// One parsed statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(rename = "type")]
    pub statement_type: StatementType,
    pub table: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub functions: Vec<AggregateSpec>,
    /// OR across conditions; `None` when the statement has no WHERE
    #[serde(default, rename = "where")]
    pub where_clause: Option<Vec<Condition>>,
    #[serde(default)]
    pub order: Option<Order>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub values: Vec<Row>,
    /// `"*"` replaces the whole row
    #[serde(default)]
    pub set: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub unique_only: bool,
    #[serde(default)]
    pub column_formats: BTreeMap<String, Format>,
    #[serde(default)]
    pub column_alias: Vec<ColumnAlias>,
}

impl Query {
    pub fn new(statement_type: StatementType, table: impl Into<String>) -> Self {
        Self {
            statement_type,
            table: table.into(),
            columns: Vec::new(),
            functions: Vec::new(),
            where_clause: None,
            order: None,
            group: None,
            limit: None,
            offset: 0,
            values: Vec::new(),
            set: None,
            unique_only: false,
            column_formats: BTreeMap::new(),
            column_alias: Vec::new(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.columns.len() == 1 && self.columns[0] == "*"
    }

    /// Statement-shape invariants shared by parsed and host-built queries
    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(Error::Syntax("Missing FROM.".into()));
        }
        match self.statement_type {
            StatementType::Select => {
                if self.columns.is_empty() && self.functions.is_empty() {
                    return Err(Error::Syntax("Missing columns.".into()));
                }
                if !self.columns.is_empty() && !self.functions.is_empty() {
                    return Err(Error::Syntax(
                        "SELECT list contains both aggregated and non-aggregated data.".into(),
                    ));
                }
                if self.unique_only {
                    if self.is_wildcard() {
                        return Err(Error::Syntax(
                            "DISTINCT or UNIQUE does not currently support the wildcard (*) character.".into(),
                        ));
                    }
                    if self.columns.len() != 1 {
                        return Err(Error::Syntax(
                            "DISTINCT or UNIQUE only supports a single column.".into(),
                        ));
                    }
                    if self.group.is_some() {
                        return Err(Error::Syntax(
                            "GROUP BY can not be used with UNIQUE or DISTINCT statements.".into(),
                        ));
                    }
                }
                if let Some(f) = self
                    .functions
                    .iter()
                    .find(|f| f.column == "*" && f.function != AggregateFunction::Count)
                {
                    return Err(Error::Syntax(format!(
                        "Only the COUNT function can be used with the wildcard (*) character, found {}.",
                        f.key
                    )));
                }
            }
            StatementType::Insert => {
                if self.values.is_empty() {
                    return Err(Error::Syntax("Missing VALUES.".into()));
                }
            }
            StatementType::Update => {
                if self.set.as_ref().map_or(true, |s| s.is_empty()) {
                    return Err(Error::Syntax("Missing SET.".into()));
                }
                if self.where_clause.is_none() {
                    return Err(Error::Syntax("Missing WHERE.".into()));
                }
                if let Some(row) = self.set.as_ref().and_then(|s| s.get("*")) {
                    if !matches!(row, Value::Object(_)) {
                        return Err(Error::Syntax(format!(
                            "SET without a column expects an object, got {}.",
                            row.type_name()
                        )));
                    }
                }
            }
            StatementType::Delete | StatementType::Reset => {}
        }
        if let Some(conditions) = &self.where_clause {
            for check in conditions.iter().flat_map(|c| c.checks.iter()).flat_map(|i| i.checks()) {
                if check.operator.expects_list() && !matches!(check.value, Value::Array(_)) {
                    return Err(Error::Parameter(format!(
                        "IN expects an array value for column '{}'",
                        check.column
                    )));
                }
            }
        }
        Ok(())
    }

    /// The single equality check of a one-condition, one-check WHERE
    pub fn single_check(&self) -> Option<&Check> {
        match self.where_clause.as_deref() {
            Some([condition]) => match condition.checks.as_slice() {
                [CheckItem::Single(check)] => Some(check),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_wire_format() {
        let json = json!({
            "type": "SELECT",
            "table": "users",
            "columns": ["name"],
            "where": [{
                "requireAll": false,
                "checks": [
                    [{"column": "age", "type": "=", "value": 30}, {"column": "name", "type": "=", "value": "Ann"}],
                    {"column": "age", "type": "!IN", "value": [1, 2]}
                ]
            }],
            "order": {"column": "name", "by": "DESC"},
            "uniqueOnly": false
        });
        let query: Query = serde_json::from_value(json).unwrap();
        assert_eq!(query.statement_type, StatementType::Select);
        let condition = &query.where_clause.as_ref().unwrap()[0];
        assert!(!condition.require_all);
        assert!(matches!(&condition.checks[0], CheckItem::Group(g) if g.len() == 2));
        assert!(matches!(&condition.checks[1], CheckItem::Single(c) if c.operator == Operator::NotIn));
        assert_eq!(query.order.as_ref().unwrap().direction, SortDirection::Desc);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_validate_shapes() {
        let select = Query::new(StatementType::Select, "users");
        assert!(matches!(select.validate(), Err(Error::Syntax(m)) if m == "Missing columns."));

        let mut update = Query::new(StatementType::Update, "users");
        update.set = Some(BTreeMap::from([("age".to_string(), Value::Integer(1))]));
        assert!(matches!(update.validate(), Err(Error::Syntax(m)) if m == "Missing WHERE."));

        let mut select = Query::new(StatementType::Select, "users");
        select.functions.push(AggregateSpec::new(AggregateFunction::Sum, "*"));
        assert!(select.validate().is_err());
    }

    #[test]
    fn test_validate_whole_row_set() {
        let json = json!({
            "type": "UPDATE",
            "table": "users",
            "set": {"*": 5},
            "where": [{"requireAll": true, "checks": [{"column": "name", "type": "==", "value": "Ann"}]}]
        });
        let mut update: Query = serde_json::from_value(json).unwrap();
        assert!(matches!(update.validate(), Err(Error::Syntax(m)) if m.contains("expects an object")));

        update.set = Some(BTreeMap::from([("*".to_string(), Value::Object(Row::new()))]));
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_aggregate_key() {
        assert_eq!(AggregateSpec::new(AggregateFunction::Count, "*").key, "COUNT(*)");
        assert_eq!(AggregateSpec::new(AggregateFunction::Avg, "age").key, "AVG(age)");
    }
}
