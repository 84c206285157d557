/// Query executor - runs parsed queries against a `TableStore`
use super::evaluator::{compare, resolve_column, Evaluator};
use super::format;
use super::optimizer::{self, AccessPath, QueryPlan};
use super::query::{AggregateFunction, AggregateSpec, Query, SortDirection, StatementType};
use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticSink, Warning};
use crate::error::{Error, Result, StorageError};
use crate::storage::TableStore;
use crate::types::{resolve_path, Row, TableDescriptor, Value};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Result of executing one or more queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Rows(Vec<Value>),
    /// GROUP BY result: group key to rows
    Groups(BTreeMap<String, Vec<Value>>),
}

impl QueryOutput {
    pub fn rows(&self) -> Option<&[Value]> {
        match self {
            QueryOutput::Rows(rows) => Some(rows),
            QueryOutput::Groups(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            QueryOutput::Rows(rows) => rows.len(),
            QueryOutput::Groups(groups) => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_json(self) -> serde_json::Value {
        match self {
            QueryOutput::Rows(rows) => serde_json::Value::Array(rows.into_iter().map(Into::into).collect()),
            QueryOutput::Groups(groups) => serde_json::Value::Object(
                groups
                    .into_iter()
                    .map(|(k, rows)| {
                        let rows = rows.into_iter().map(Into::into).collect();
                        (k, serde_json::Value::Array(rows))
                    })
                    .collect(),
            ),
        }
    }

    fn into_value(self) -> Value {
        match self {
            QueryOutput::Rows(rows) => Value::Array(rows),
            QueryOutput::Groups(groups) => Value::Object(
                groups
                    .into_iter()
                    .map(|(k, rows)| (k, Value::Array(rows)))
                    .collect(),
            ),
        }
    }
}

/// An output row and the stored row it came from
struct Shaped {
    output: Value,
    source: Option<Row>,
}

impl Shaped {
    fn from_row(row: Row) -> Self {
        Self {
            output: Value::Object(row.clone()),
            source: Some(row),
        }
    }
}

pub struct Executor<'a> {
    store: &'a dyn TableStore,
    tables: &'a BTreeMap<String, TableDescriptor>,
    config: &'a EngineConfig,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> Executor<'a> {
    pub fn new(
        store: &'a dyn TableStore,
        tables: &'a BTreeMap<String, TableDescriptor>,
        config: &'a EngineConfig,
        sink: &'a dyn DiagnosticSink,
    ) -> Self {
        Self {
            store,
            tables,
            config,
            sink,
        }
    }

    /// Run queries in order and concatenate their rows.
    ///
    /// A single grouped query returns its group map; inside a multi-query
    /// call each group map becomes one object row. Earlier statements are not
    /// rolled back when a later one fails.
    pub async fn execute(&self, queries: &[Query]) -> Result<QueryOutput> {
        if let [query] = queries {
            return self.execute_one(query).await;
        }
        let mut rows = Vec::new();
        for query in queries {
            match self.execute_one(query).await? {
                QueryOutput::Rows(out) => rows.extend(out),
                groups => rows.push(groups.into_value()),
            }
        }
        Ok(QueryOutput::Rows(rows))
    }

    pub async fn execute_one(&self, query: &Query) -> Result<QueryOutput> {
        if query.statement_type == StatementType::Reset {
            self.reset(&query.table).await?;
            return Ok(QueryOutput::Rows(Vec::new()));
        }

        let table = self.table(&query.table)?;
        let shaped = match query.statement_type {
            StatementType::Select => self.select(query, table).await?,
            StatementType::Update => self.update(query, table).await?,
            StatementType::Delete => self.delete(query, table).await?,
            StatementType::Insert => self.insert(query, table).await?,
            StatementType::Reset => Vec::new(),
        };
        debug!(
            table = %query.table,
            statement = %query.statement_type,
            rows = shaped.len(),
            "statement complete"
        );

        match &query.group {
            Some(column) if !query.unique_only => {
                Ok(QueryOutput::Groups(group_rows(table, shaped, column)?))
            }
            _ => Ok(QueryOutput::Rows(shaped.into_iter().map(|s| s.output).collect())),
        }
    }

    fn table(&self, name: &str) -> Result<&'a TableDescriptor> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::Schema(format!("Unknown table '{}'", name)))
    }

    async fn reset(&self, name: &str) -> Result<()> {
        let targets: Vec<&TableDescriptor> = if name == "*" {
            self.tables.values().collect()
        } else {
            vec![self.table(name)?]
        };
        for table in targets {
            self.store.clear(&table.name).await?;
            if let Some(cache) = table.cache() {
                cache.clear();
            }
            debug!(table = %table.name, "table reset");
        }
        Ok(())
    }

    /// Full table snapshot, from the cache when it is warm
    pub(crate) async fn snapshot(&self, table: &TableDescriptor) -> Result<Vec<Row>> {
        let Some(cache) = table.cache() else {
            return Ok(self.store.get_all(&table.name).await?);
        };
        if let Some(rows) = cache.snapshot() {
            return Ok(rows);
        }
        let rows = self.store.get_all(&table.name).await?;
        cache.load(rows.iter().filter_map(|row| table.key_of(row).map(|key| (key, row.clone()))));
        Ok(rows)
    }

    /// Rows passing WHERE, through the planned access path
    async fn fetch(&self, query: &Query, table: &TableDescriptor, plan: &QueryPlan) -> Result<Vec<Row>> {
        let rows = match &plan.access {
            AccessPath::IndexLookup { column, value } => {
                self.store.get_all_by_index(&table.name, column, value).await?
            }
            _ => self.snapshot(table).await?,
        };
        if plan.where_satisfied || query.where_clause.is_none() {
            return Ok(rows);
        }

        let evaluator = Evaluator::new(table, self.config.like_threshold);
        let where_clause = query.where_clause.as_deref();
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if evaluator.matches_where(where_clause, &row)? {
                kept.push(row);
            }
        }
        Ok(kept)
    }

    async fn count(&self, table: &TableDescriptor, access: &AccessPath) -> Result<usize> {
        let count = match access {
            AccessPath::CountAll => self.store.count(&table.name).await?,
            AccessPath::CountColumn { column } => self.store.count_column(&table.name, column).await?,
            AccessPath::CountByIndex { column, value } => {
                self.store.count_by_index(&table.name, column, value).await?
            }
            AccessPath::IndexLookup { .. } | AccessPath::FullScan => 0,
        };
        Ok(count)
    }

    async fn select(&self, query: &Query, table: &TableDescriptor) -> Result<Vec<Shaped>> {
        for spec in query.functions.iter().filter(|spec| spec.column != "*") {
            check_declared(table, &spec.column)?;
        }
        let plan = optimizer::plan(query, table, self.config);
        debug!(table = %table.name, access = ?plan.access, "select plan");

        let mut shaped = if plan.is_count() {
            let count = self.count(table, &plan.access).await?;
            let mut row = Row::new();
            for spec in &query.functions {
                row.insert(spec.key.clone(), Value::from(count));
            }
            vec![Shaped {
                output: Value::Object(row),
                source: None,
            }]
        } else {
            let rows = self.fetch(query, table, &plan).await?;
            if query.unique_only {
                return self.distinct(query, table, rows);
            }
            if !query.functions.is_empty() {
                self.aggregate(query, table, rows)?
            } else {
                rows.into_iter()
                    .map(|row| self.project(query, table, row))
                    .collect::<Result<Vec<_>>>()?
            }
        };

        apply_aliases(query, &mut shaped)?;
        if !query.functions.is_empty() && query.group.is_none() {
            // One aggregate row: ordering only has to name a real column
            if let Some(order) = &query.order {
                check_declared(table, &order.column)?;
            }
        } else {
            sort_shaped(query, table, &mut shaped)?;
        }
        Ok(paginate(query, shaped))
    }

    /// UNIQUE/DISTINCT: distinct scalar values of the first column
    fn distinct(&self, query: &Query, table: &TableDescriptor, rows: Vec<Row>) -> Result<Vec<Shaped>> {
        let column = query
            .columns
            .first()
            .ok_or_else(|| Error::Syntax("Missing columns.".into()))?;
        let format = query.column_formats.get(column);

        let mut values: Vec<Value> = Vec::new();
        for row in &rows {
            let mut value = resolve_column(table, row, column)?;
            if let Some(format) = format {
                value = format::apply(format, &value);
            }
            let items = match value {
                Value::Array(items) => items,
                scalar => vec![scalar],
            };
            for item in items {
                if !values.iter().any(|v| v.strict_eq(&item)) {
                    values.push(item);
                }
            }
        }

        if let Some(order) = &query.order {
            values.sort_by(|a, b| directed(order_values(a, b), order.direction));
        }
        let shaped = values
            .into_iter()
            .map(|value| Shaped {
                output: value,
                source: None,
            })
            .collect();
        Ok(paginate(query, shaped))
    }

    fn project(&self, query: &Query, table: &TableDescriptor, row: Row) -> Result<Shaped> {
        if query.is_wildcard() {
            return Ok(Shaped::from_row(row));
        }
        let mut output = Row::new();
        for column in &query.columns {
            let mut value = resolve_column(table, &row, column)?;
            if let Some(format) = query.column_formats.get(column) {
                value = format::apply(format, &value);
            }
            output.insert(column.clone(), value);
        }
        Ok(Shaped {
            output: Value::Object(output),
            source: Some(row),
        })
    }

    /// One aggregate row, or one per group
    fn aggregate(&self, query: &Query, table: &TableDescriptor, rows: Vec<Row>) -> Result<Vec<Shaped>> {
        let Some(group) = &query.group else {
            return Ok(vec![Shaped {
                output: Value::Object(aggregate_row(&query.functions, &rows)),
                source: None,
            }]);
        };

        let mut groups: BTreeMap<String, Vec<Row>> = BTreeMap::new();
        for row in rows {
            let key = resolve_column(table, &row, group)?.to_key_string();
            groups.entry(key).or_default().push(row);
        }
        Ok(groups
            .into_values()
            .map(|rows| Shaped {
                output: Value::Object(aggregate_row(&query.functions, &rows)),
                source: rows.into_iter().next(),
            })
            .collect())
    }

    /// Rows an UPDATE/DELETE touches: WHERE, then ORDER BY, then OFFSET/LIMIT
    async fn affected_rows(&self, query: &Query, table: &TableDescriptor) -> Result<Vec<Row>> {
        let plan = optimizer::plan(query, table, self.config);
        debug!(table = %table.name, access = ?plan.access, statement = %query.statement_type, "mutation plan");
        let rows = self.fetch(query, table, &plan).await?;
        let mut shaped: Vec<Shaped> = rows.into_iter().map(Shaped::from_row).collect();
        sort_shaped(query, table, &mut shaped)?;
        Ok(paginate(query, shaped)
            .into_iter()
            .filter_map(|s| s.source)
            .collect())
    }

    async fn update(&self, query: &Query, table: &TableDescriptor) -> Result<Vec<Shaped>> {
        let Some(set) = &query.set else {
            return Err(Error::Syntax("Missing SET.".into()));
        };
        let rows = self.affected_rows(query, table).await?;

        let mut undeclared = BTreeSet::new();
        let mut updated = Vec::with_capacity(rows.len());
        for row in rows {
            let mut next = row.clone();
            for (column, value) in set {
                if column == "*" {
                    if let Value::Object(replacement) = value {
                        next = replacement.clone();
                        if !next.contains_key(&table.key_field) {
                            if let Some(key) = row.get(&table.key_field) {
                                next.insert(table.key_field.clone(), key.clone());
                            }
                        }
                        undeclared.extend(replacement.keys().filter(|k| !table.has_column(k)).cloned());
                    }
                } else {
                    if !table.has_column(column) {
                        undeclared.insert(column.clone());
                    }
                    next.insert(column.clone(), value.clone());
                }
            }
            updated.push(next);
        }
        self.warn_undeclared(table, &undeclared, "UPDATE");

        let store = self.store;
        let name = table.name.as_str();
        let cache = table.cache();
        let updated = try_join_all(updated.into_iter().map(move |row| async move {
            let key = store.update(name, row.clone()).await?;
            if let Some(cache) = cache {
                cache.upsert(key, row.clone());
            }
            Ok::<_, StorageError>(row)
        }))
        .await?;
        Ok(updated.into_iter().map(Shaped::from_row).collect())
    }

    async fn delete(&self, query: &Query, table: &TableDescriptor) -> Result<Vec<Shaped>> {
        let rows = self.affected_rows(query, table).await?;

        let store = self.store;
        let name = table.name.as_str();
        let cache = table.cache();
        let deleted = try_join_all(rows.into_iter().map(move |row| async move {
            let key = table.key_of(&row).ok_or_else(|| StorageError::MissingKey {
                table: name.to_string(),
                key_field: table.key_field.clone(),
            })?;
            store.delete(name, &key).await?;
            if let Some(cache) = cache {
                cache.remove(&key);
            }
            Ok::<_, StorageError>(row)
        }))
        .await?;
        Ok(deleted.into_iter().map(Shaped::from_row).collect())
    }

    /// Rows are merged over declared defaults and written one at a time
    async fn insert(&self, query: &Query, table: &TableDescriptor) -> Result<Vec<Shaped>> {
        let mut undeclared = BTreeSet::new();
        let mut inserted = Vec::with_capacity(query.values.len());
        for values in &query.values {
            undeclared.extend(values.keys().filter(|k| !table.has_column(k)).cloned());

            let mut row = table.defaults();
            row.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));

            let key = if table.key_is_generated {
                let key = self.store.add(&table.name, row.clone()).await?;
                row.insert(table.key_field.clone(), key.to_value());
                key
            } else {
                self.store.update(&table.name, row.clone()).await?
            };
            if let Some(cache) = table.cache() {
                cache.upsert(key, row.clone());
            }
            inserted.push(Shaped::from_row(row));
        }
        self.warn_undeclared(table, &undeclared, "INSERT");
        Ok(inserted)
    }

    fn warn_undeclared(&self, table: &TableDescriptor, columns: &BTreeSet<String>, statement: &str) {
        for column in columns {
            self.sink.warn(Warning::UnknownColumn {
                table: table.name.clone(),
                column: column.clone(),
                statement: statement.to_string(),
            });
        }
    }
}

/// Declared column, or a dot-path rooted at one
fn check_declared(table: &TableDescriptor, column: &str) -> Result<()> {
    let root = column.split('.').next().unwrap_or(column);
    if table.has_column(root) {
        Ok(())
    } else {
        Err(Error::unknown_column(column))
    }
}

/// Aggregate values read missing paths as null
fn aggregate_row(functions: &[AggregateSpec], rows: &[Row]) -> Row {
    let source = |row: &Row, column: &str| resolve_path(row, column).cloned().unwrap_or_default();

    let mut out = Row::new();
    for spec in functions {
        let value = match spec.function {
            AggregateFunction::Count if spec.column == "*" => Value::from(rows.len()),
            AggregateFunction::Count => {
                Value::from(rows.iter().filter(|row| !source(row, &spec.column).is_null()).count())
            }
            AggregateFunction::Min | AggregateFunction::Max => {
                let wanted = if spec.function == AggregateFunction::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                // Falsy values (0, "", null, false) never win
                let mut best: Option<Value> = None;
                for row in rows {
                    let value = source(row, &spec.column);
                    if value.is_falsy() {
                        continue;
                    }
                    best = match best {
                        Some(current) if compare(&value, &current) != Some(wanted) => Some(current),
                        _ => Some(value),
                    };
                }
                best.unwrap_or_default()
            }
            AggregateFunction::Sum | AggregateFunction::Avg => {
                let total: f64 = rows
                    .iter()
                    .map(|row| {
                        source(row, &spec.column)
                            .to_f64()
                            .filter(|f| f.is_finite())
                            .unwrap_or(0.0)
                    })
                    .sum();
                match spec.function {
                    AggregateFunction::Sum => number(total),
                    _ if rows.is_empty() => Value::Null,
                    _ => number(total / rows.len() as f64),
                }
            }
        };
        out.insert(spec.key.clone(), value);
    }
    out
}

fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::Integer(f as i64)
    } else {
        Value::Float(f)
    }
}

/// Copy each aliased value to its alias key. The original key is dropped
/// unless something other than its aliases still selects it.
fn apply_aliases(query: &Query, shaped: &mut [Shaped]) -> Result<()> {
    if query.column_alias.is_empty() {
        return Ok(());
    }
    let dropped: BTreeSet<&str> = query
        .column_alias
        .iter()
        .map(|alias| alias.column.as_str())
        .filter(|column| {
            let selected = query.columns.iter().filter(|c| c == column).count()
                + query.functions.iter().filter(|f| f.key == *column).count();
            let aliased = query.column_alias.iter().filter(|a| a.column == *column).count();
            selected <= aliased && !query.column_alias.iter().any(|a| a.alias == *column)
        })
        .collect();

    for item in shaped.iter_mut() {
        let Value::Object(output) = &mut item.output else {
            continue;
        };
        for alias in &query.column_alias {
            let value = output
                .get(&alias.column)
                .cloned()
                .ok_or_else(|| Error::unknown_column(&alias.column))?;
            output.insert(alias.alias.clone(), value);
        }
        for column in &dropped {
            output.remove(*column);
        }
    }
    Ok(())
}

/// ORDER BY column: output row first, then the stored row
fn sort_key(table: &TableDescriptor, item: &Shaped, column: &str) -> Result<Value> {
    if let Value::Object(output) = &item.output {
        if let Some(value) = resolve_path(output, column) {
            return Ok(value.clone());
        }
    }
    match &item.source {
        Some(source) => resolve_column(table, source, column),
        None => Err(Error::unknown_column(column)),
    }
}

fn sort_shaped(query: &Query, table: &TableDescriptor, shaped: &mut Vec<Shaped>) -> Result<()> {
    let Some(order) = &query.order else {
        return Ok(());
    };
    let keys = shaped
        .iter()
        .map(|item| sort_key(table, item, &order.column))
        .collect::<Result<Vec<_>>>()?;
    let mut keyed: Vec<(Value, Shaped)> = keys.into_iter().zip(shaped.drain(..)).collect();
    keyed.sort_by(|(a, _), (b, _)| directed(order_values(a, b), order.direction));
    shaped.extend(keyed.into_iter().map(|(_, item)| item));
    Ok(())
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Integer(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order for sorting: by type first, then by value
fn order_values(a: &Value, b: &Value) -> Ordering {
    match type_rank(a).cmp(&type_rank(b)) {
        Ordering::Equal => match (a, b) {
            (Value::Text(x), Value::Text(y)) => x.cmp(y),
            _ => match (a.to_f64(), b.to_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.to_string().cmp(&b.to_string()),
            },
        },
        other => other,
    }
}

fn paginate(query: &Query, shaped: Vec<Shaped>) -> Vec<Shaped> {
    let rows = shaped.into_iter().skip(query.offset);
    match query.limit {
        Some(limit) => rows.take(limit).collect(),
        None => rows.collect(),
    }
}

fn group_rows(table: &TableDescriptor, shaped: Vec<Shaped>, column: &str) -> Result<BTreeMap<String, Vec<Value>>> {
    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for item in shaped {
        let key = sort_key(table, &item, column)?.to_key_string();
        groups.entry(key).or_default().push(item.output);
    }
    Ok(groups)
}
