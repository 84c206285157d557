/// Query Optimizer - access path selection
///
/// # Architecture
/// ```ignore
/// SELECT COUNT(*) FROM users                 → CountAll
/// SELECT COUNT(*) FROM users WHERE city = 'Oslo' → CountByIndex
/// SELECT * FROM users WHERE id == 7          → IndexLookup (WHERE satisfied)
/// SELECT * FROM users WHERE age > 30         → FullScan
/// ```
///
/// A shortcut is only chosen when the store can answer it with exactly the
/// rows the general WHERE pass would keep. Index lookups compare strictly,
/// so a loose `=` qualifies only for values with no loose aliases
/// (non-numeric text).

use super::query::{AggregateFunction, Check, Query, StatementType};
use crate::config::EngineConfig;
use crate::types::{TableDescriptor, Value};

/// How rows (or counts) are fetched from the store
#[derive(Debug, Clone, PartialEq)]
pub enum AccessPath {
    /// `store.count(table)`
    CountAll,
    /// `store.count_column(table, column)`
    CountColumn { column: String },
    /// `store.count_by_index(table, column, value)`
    CountByIndex { column: String, value: Value },
    /// `store.get_all_by_index(table, column, value)`
    IndexLookup { column: String, value: Value },
    /// Table snapshot (cache or store) plus the general WHERE pass
    FullScan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub access: AccessPath,
    /// The access path already applied the WHERE clause
    pub where_satisfied: bool,
}

impl QueryPlan {
    fn full_scan() -> Self {
        Self {
            access: AccessPath::FullScan,
            where_satisfied: false,
        }
    }

    pub fn is_count(&self) -> bool {
        matches!(
            self.access,
            AccessPath::CountAll | AccessPath::CountColumn { .. } | AccessPath::CountByIndex { .. }
        )
    }
}

/// Pick the access path for one query
pub fn plan(query: &Query, table: &TableDescriptor, config: &EngineConfig) -> QueryPlan {
    if !config.enable_shortcuts {
        return QueryPlan::full_scan();
    }

    match query.statement_type {
        StatementType::Select => plan_select(query, table),
        StatementType::Update | StatementType::Delete => index_lookup(query, table),
        StatementType::Insert | StatementType::Reset => QueryPlan::full_scan(),
    }
}

fn plan_select(query: &Query, table: &TableDescriptor) -> QueryPlan {
    if query.unique_only || query.group.is_some() {
        return QueryPlan::full_scan();
    }

    if let [function] = query.functions.as_slice() {
        if function.function != AggregateFunction::Count {
            return QueryPlan::full_scan();
        }

        // Shortcut 1: bare COUNT
        if query.where_clause.is_none() {
            let access = if function.column == "*" {
                AccessPath::CountAll
            } else if !function.column.contains('.') {
                AccessPath::CountColumn {
                    column: function.column.clone(),
                }
            } else {
                return QueryPlan::full_scan();
            };
            return QueryPlan {
                access,
                where_satisfied: true,
            };
        }

        // Shortcut 2: COUNT over one indexed equality
        if let Some(check) = indexable_check(query, table) {
            if function.column == "*" || function.column == check.column {
                return QueryPlan {
                    access: AccessPath::CountByIndex {
                        column: check.column.clone(),
                        value: check.value.clone(),
                    },
                    where_satisfied: true,
                };
            }
        }
        return QueryPlan::full_scan();
    }

    if !query.functions.is_empty() {
        return QueryPlan::full_scan();
    }

    // Shortcut 3: plain SELECT over one indexed equality
    index_lookup(query, table)
}

fn index_lookup(query: &Query, table: &TableDescriptor) -> QueryPlan {
    match indexable_check(query, table) {
        Some(check) => QueryPlan {
            access: AccessPath::IndexLookup {
                column: check.column.clone(),
                value: check.value.clone(),
            },
            where_satisfied: true,
        },
        None => QueryPlan::full_scan(),
    }
}

/// The WHERE clause's only check, when an index can answer it exactly
fn indexable_check<'q>(query: &'q Query, table: &TableDescriptor) -> Option<&'q Check> {
    let check = query.single_check()?;
    let eligible = check.operator.is_equality()
        && check.format.is_none()
        && !check.column.contains('.')
        && table.is_indexed(&check.column)
        && check.value.is_scalar()
        && !check.value.is_null()
        && (check.operator.is_strict() || !check.value.has_loose_aliases());
    eligible.then_some(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::params::Params;
    use crate::sql::parser::parse;
    use crate::types::ColumnDef;

    fn users() -> TableDescriptor {
        TableDescriptor::new("users", "id", true)
            .with_column(ColumnDef::new("name"))
            .with_column(ColumnDef::new("age"))
            .with_column(ColumnDef::new("bio").not_indexed())
    }

    fn plan_for(sql: &str) -> QueryPlan {
        let query = parse(sql, &Params::new()).unwrap().remove(0);
        plan(&query, &users(), &EngineConfig::default())
    }

    #[test]
    fn test_count_shortcuts() {
        assert_eq!(plan_for("SELECT COUNT(*) FROM users").access, AccessPath::CountAll);
        assert_eq!(
            plan_for("SELECT COUNT(age) FROM users").access,
            AccessPath::CountColumn { column: "age".into() }
        );
        assert_eq!(
            plan_for("SELECT COUNT(*) FROM users WHERE name = 'Ann'").access,
            AccessPath::CountByIndex {
                column: "name".into(),
                value: Value::from("Ann")
            }
        );
        assert_eq!(plan_for("SELECT COUNT(age) FROM users WHERE name = 'Ann'").access, AccessPath::FullScan);
        assert_eq!(plan_for("SELECT SUM(age) FROM users").access, AccessPath::FullScan);
        assert_eq!(plan_for("SELECT COUNT(*), MAX(age) FROM users").access, AccessPath::FullScan);
    }

    #[test]
    fn test_index_lookup() {
        let p = plan_for("SELECT * FROM users WHERE name = 'Ann'");
        assert!(p.where_satisfied);
        assert!(matches!(p.access, AccessPath::IndexLookup { .. }));
        assert!(matches!(plan_for("DELETE FROM users WHERE id == 3").access, AccessPath::IndexLookup { .. }));
    }

    #[test]
    fn test_ineligible_shapes_fall_through() {
        // loose `=` on a number also matches numeric text
        assert_eq!(plan_for("SELECT * FROM users WHERE age = 30").access, AccessPath::FullScan);
        assert_eq!(plan_for("SELECT * FROM users WHERE name = '30'").access, AccessPath::FullScan);
        assert_eq!(plan_for("SELECT * FROM users WHERE bio == 'x'").access, AccessPath::FullScan);
        assert_eq!(plan_for("SELECT * FROM users WHERE name.first == 'x'").access, AccessPath::FullScan);
        assert_eq!(plan_for("SELECT * FROM users WHERE age > 30").access, AccessPath::FullScan);
        assert_eq!(plan_for("SELECT * FROM users WHERE name == NULL").access, AccessPath::FullScan);
        assert_eq!(
            plan_for("SELECT * FROM users WHERE name == 'a' AND age == 3").access,
            AccessPath::FullScan
        );
        assert_eq!(plan_for("SELECT UNIQUE name FROM users WHERE name == 'a'").access, AccessPath::FullScan);
    }

    #[test]
    fn test_shortcuts_disabled() {
        let query = parse("SELECT COUNT(*) FROM users", &Params::new()).unwrap().remove(0);
        assert_eq!(plan(&query, &users(), &EngineConfig::strict()).access, AccessPath::FullScan);
    }
}
