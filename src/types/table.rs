/// Table metadata the engine consults while optimizing and executing
use crate::cache::TableCache;
use crate::error::{Error, Result};
use crate::storage::StoreKey;
use crate::types::{Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Value merged into inserted rows that omit this column
    pub default: Value,
    pub indexed: bool,
    pub unique: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Value::Null,
            indexed: true,
            unique: false,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self.indexed = true;
        self
    }

    pub fn not_indexed(mut self) -> Self {
        self.indexed = false;
        self.unique = false;
        self
    }
}

/// Table descriptor
///
/// Loaded once at engine start. The optional cache is owned here and kept in
/// sync with the store by the executor.
#[derive(Debug)]
pub struct TableDescriptor {
    pub name: String,
    pub key_field: String,
    pub key_is_generated: bool,
    /// Survives schema version upgrades
    pub persist: bool,
    columns: Vec<ColumnDef>,
    cache: Option<TableCache>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, key_field: impl Into<String>, key_is_generated: bool) -> Self {
        Self {
            name: name.into(),
            key_field: key_field.into(),
            key_is_generated,
            persist: false,
            columns: Vec::new(),
            cache: None,
        }
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.retain(|c| c.name != column.name);
        self.columns.push(column);
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persist = true;
        self
    }

    /// Attach a row cache. Tables with engine-generated keys cannot be cached.
    pub fn with_cache(mut self) -> Result<Self> {
        if self.key_is_generated {
            return Err(Error::Schema(format!(
                "Table '{}' uses generated keys and cannot be cached",
                self.name
            )));
        }
        self.cache = Some(TableCache::new());
        Ok(self)
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Declared column or the key field
    pub fn has_column(&self, name: &str) -> bool {
        name == self.key_field || self.column(name).is_some()
    }

    /// Columns an index lookup can be served from, the key field included
    pub fn indexed_columns(&self) -> BTreeSet<&str> {
        std::iter::once(self.key_field.as_str())
            .chain(self.columns.iter().filter(|c| c.indexed).map(|c| c.name.as_str()))
            .collect()
    }

    pub fn is_indexed(&self, column: &str) -> bool {
        column == self.key_field || self.column(column).map_or(false, |c| c.indexed)
    }

    pub fn unique_columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().filter(|c| c.unique).map(|c| c.name.as_str())
    }

    /// Declared defaults as a row, the key field excluded
    pub fn defaults(&self) -> Row {
        self.columns
            .iter()
            .filter(|c| c.name != self.key_field)
            .map(|c| (c.name.clone(), c.default.clone()))
            .collect()
    }

    pub fn cache(&self) -> Option<&TableCache> {
        self.cache.as_ref()
    }

    /// Primary key of a stored row
    pub fn key_of(&self, row: &Row) -> Option<StoreKey> {
        row.get(&self.key_field).and_then(|v| StoreKey::from_value(v).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDescriptor {
        TableDescriptor::new("users", "id", true)
            .with_column(ColumnDef::new("name"))
            .with_column(ColumnDef::new("age").with_default(0))
            .with_column(ColumnDef::new("bio").not_indexed())
    }

    #[test]
    fn test_descriptor_columns() {
        let table = users();
        assert!(table.has_column("id"));
        assert!(table.has_column("age"));
        assert!(!table.has_column("email"));
        assert!(table.is_indexed("id"));
        assert!(table.is_indexed("name"));
        assert!(!table.is_indexed("bio"));
        assert_eq!(table.defaults().get("age"), Some(&Value::Integer(0)));
        assert!(!table.defaults().contains_key("id"));
    }

    #[test]
    fn test_cache_rejected_for_generated_keys() {
        assert!(users().with_cache().is_err());
        let cached = TableDescriptor::new("settings", "key", false).with_cache().unwrap();
        assert!(cached.cache().is_some());
    }
}
