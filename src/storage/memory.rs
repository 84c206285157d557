//! In-memory `TableStore`
//!
//! Rows live in a key-ordered map per table. Indexed and unique columns get
//! a secondary index from a strict scalar key to the set of primary keys.

use super::{StorageResult, StoreKey, TableStore};
use crate::error::StorageError;
use crate::types::{resolve_path, Row, TableDescriptor, Value};
use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Scalar value as seen by a secondary index (strict equality)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IndexKey {
    Bool(bool),
    Number(u64),
    Text(String),
}

impl IndexKey {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Integer(i) => Some(Self::number(*i as f64)),
            Value::Float(f) if !f.is_nan() => Some(Self::number(*f)),
            Value::Text(s) => Some(IndexKey::Text(s.clone())),
            _ => None,
        }
    }

    fn number(f: f64) -> Self {
        // -0.0 and 0.0 share a slot
        IndexKey::Number(if f == 0.0 { 0.0f64.to_bits() } else { f.to_bits() })
    }
}

#[derive(Debug)]
struct MemoryTable {
    key_field: String,
    generated: bool,
    next_key: i64,
    rows: BTreeMap<StoreKey, Row>,
    indexes: AHashMap<String, AHashMap<IndexKey, BTreeSet<StoreKey>>>,
    unique: AHashSet<String>,
}

impl MemoryTable {
    fn new(descriptor: &TableDescriptor) -> Self {
        let indexes = descriptor
            .columns()
            .iter()
            .filter(|c| (c.indexed || c.unique) && c.name != descriptor.key_field)
            .map(|c| (c.name.clone(), AHashMap::new()))
            .collect();
        Self {
            key_field: descriptor.key_field.clone(),
            generated: descriptor.key_is_generated,
            next_key: 1,
            rows: BTreeMap::new(),
            indexes,
            unique: descriptor.unique_columns().map(str::to_string).collect(),
        }
    }

    fn key_of(&self, row: &Row) -> Option<StorageResult<StoreKey>> {
        match row.get(&self.key_field) {
            None | Some(Value::Null) => None,
            Some(value) => Some(StoreKey::from_value(value)),
        }
    }

    fn assign_key(&mut self, table: &str, row: &mut Row) -> StorageResult<StoreKey> {
        match self.key_of(row) {
            Some(key) => {
                let key = key?;
                if let StoreKey::Int(i) = key {
                    if self.generated && i >= self.next_key {
                        self.next_key = i + 1;
                    }
                }
                Ok(key)
            }
            None if self.generated => {
                let key = self.next_key;
                self.next_key += 1;
                row.insert(self.key_field.clone(), Value::Integer(key));
                Ok(StoreKey::Int(key))
            }
            None => Err(StorageError::MissingKey {
                table: table.to_string(),
                key_field: self.key_field.clone(),
            }),
        }
    }

    fn check_unique(&self, table: &str, key: &StoreKey, row: &Row) -> StorageResult<()> {
        for column in &self.unique {
            let Some(value) = row.get(column) else { continue };
            let Some(index_key) = IndexKey::from_value(value) else { continue };
            let taken = self
                .indexes
                .get(column)
                .and_then(|index| index.get(&index_key))
                .map_or(false, |keys| keys.iter().any(|k| k != key));
            if taken {
                return Err(StorageError::UniqueViolation {
                    table: table.to_string(),
                    column: column.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn unindex(&mut self, key: &StoreKey) {
        let Some(row) = self.rows.get(key) else { return };
        for (column, index) in self.indexes.iter_mut() {
            if let Some(index_key) = row.get(column).and_then(IndexKey::from_value) {
                if let Some(keys) = index.get_mut(&index_key) {
                    keys.remove(key);
                    if keys.is_empty() {
                        index.remove(&index_key);
                    }
                }
            }
        }
    }

    fn put(&mut self, key: StoreKey, row: Row) {
        self.unindex(&key);
        for (column, index) in self.indexes.iter_mut() {
            if let Some(index_key) = row.get(column).and_then(IndexKey::from_value) {
                index.entry(index_key).or_default().insert(key.clone());
            }
        }
        self.rows.insert(key, row);
    }

    fn remove(&mut self, key: &StoreKey) {
        self.unindex(key);
        self.rows.remove(key);
    }

    fn lookup(&self, column: &str, value: &Value) -> Vec<&Row> {
        if column == self.key_field {
            return StoreKey::from_value(value)
                .ok()
                .and_then(|key| self.rows.get(&key))
                .into_iter()
                .collect();
        }
        match (self.indexes.get(column), IndexKey::from_value(value)) {
            (Some(index), Some(index_key)) => index
                .get(&index_key)
                .map(|keys| keys.iter().filter_map(|k| self.rows.get(k)).collect())
                .unwrap_or_default(),
            (Some(_), None) => Vec::new(),
            // Unindexed column: strict scan
            (None, _) => self
                .rows
                .values()
                .filter(|row| resolve_path(row, column).map_or(false, |v| v.strict_eq(value)))
                .collect(),
        }
    }
}

/// `TableStore` keeping every table in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<String, MemoryTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn read<T>(&self, table: &str, f: impl FnOnce(&MemoryTable) -> T) -> StorageResult<T> {
        self.tables
            .get(table)
            .map(|t| f(&t))
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))
    }

    fn write<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut MemoryTable) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut entry = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        f(&mut entry)
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn create_table(&self, descriptor: &TableDescriptor) -> StorageResult<()> {
        trace!(table = %descriptor.name, "create table");
        self.tables
            .entry(descriptor.name.clone())
            .or_insert_with(|| MemoryTable::new(descriptor));
        Ok(())
    }

    async fn get_all(&self, table: &str) -> StorageResult<Vec<Row>> {
        trace!(table, "get_all");
        self.read(table, |t| t.rows.values().cloned().collect())
    }

    async fn get_all_by_index(&self, table: &str, column: &str, value: &Value) -> StorageResult<Vec<Row>> {
        trace!(table, column, %value, "get_all_by_index");
        self.read(table, |t| t.lookup(column, value).into_iter().cloned().collect())
    }

    async fn get_by_index(&self, table: &str, column: &str, value: &Value) -> StorageResult<Option<Row>> {
        trace!(table, column, %value, "get_by_index");
        self.read(table, |t| t.lookup(column, value).into_iter().next().cloned())
    }

    async fn count(&self, table: &str) -> StorageResult<usize> {
        self.read(table, |t| t.rows.len())
    }

    async fn count_by_index(&self, table: &str, column: &str, value: &Value) -> StorageResult<usize> {
        trace!(table, column, %value, "count_by_index");
        self.read(table, |t| t.lookup(column, value).len())
    }

    async fn count_column(&self, table: &str, column: &str) -> StorageResult<usize> {
        self.read(table, |t| {
            t.rows
                .values()
                .filter(|row| resolve_path(row, column).map_or(false, |v| !v.is_null()))
                .count()
        })
    }

    async fn add(&self, table: &str, mut row: Row) -> StorageResult<StoreKey> {
        self.write(table, |t| {
            let key = t.assign_key(table, &mut row)?;
            if t.rows.contains_key(&key) {
                return Err(StorageError::KeyConflict {
                    table: table.to_string(),
                    key: key.to_string(),
                });
            }
            t.check_unique(table, &key, &row)?;
            trace!(table, %key, "add");
            t.put(key.clone(), row);
            Ok(key)
        })
    }

    async fn update(&self, table: &str, mut row: Row) -> StorageResult<StoreKey> {
        self.write(table, |t| {
            let key = t.assign_key(table, &mut row)?;
            t.check_unique(table, &key, &row)?;
            trace!(table, %key, "update");
            t.put(key.clone(), row);
            Ok(key)
        })
    }

    async fn delete(&self, table: &str, key: &StoreKey) -> StorageResult<()> {
        self.write(table, |t| {
            trace!(table, %key, "delete");
            t.remove(key);
            Ok(())
        })
    }

    async fn clear(&self, table: &str) -> StorageResult<()> {
        self.write(table, |t| {
            trace!(table, "clear");
            t.rows.clear();
            t.indexes.values_mut().for_each(|index| index.clear());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnDef;
    use futures::executor::block_on;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        let users = TableDescriptor::new("users", "id", true)
            .with_column(ColumnDef::new("name"))
            .with_column(ColumnDef::new("email").unique())
            .with_column(ColumnDef::new("bio").not_indexed());
        block_on(store.create_table(&users)).unwrap();
        store
    }

    #[test]
    fn test_autoincrement_and_lookup() {
        let store = store();
        block_on(async {
            let k1 = store.add("users", row(&[("name", "Ann".into())])).await.unwrap();
            let k2 = store.add("users", row(&[("name", "Bob".into())])).await.unwrap();
            assert_eq!(k1, StoreKey::Int(1));
            assert_eq!(k2, StoreKey::Int(2));

            let found = store.get_all_by_index("users", "name", &"Bob".into()).await.unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].get("id"), Some(&Value::Integer(2)));

            let by_key = store.get_by_index("users", "id", &Value::Float(1.0)).await.unwrap();
            assert_eq!(by_key.unwrap().get("name"), Some(&Value::from("Ann")));
            assert_eq!(store.count("users").await.unwrap(), 2);
        });
    }

    #[test]
    fn test_index_lookup_is_strict() {
        let store = store();
        block_on(async {
            store.add("users", row(&[("name", Value::Integer(30))])).await.unwrap();
            assert_eq!(store.count_by_index("users", "name", &Value::Float(30.0)).await.unwrap(), 1);
            assert_eq!(store.count_by_index("users", "name", &"30".into()).await.unwrap(), 0);
            assert_eq!(store.count_by_index("users", "bio", &Value::Null).await.unwrap(), 0);
        });
    }

    #[test]
    fn test_add_conflict_and_update_upsert() {
        let store = store();
        block_on(async {
            store.add("users", row(&[("id", 5.into()), ("name", "Ann".into())])).await.unwrap();
            let err = store.add("users", row(&[("id", 5.into())])).await.unwrap_err();
            assert!(matches!(err, StorageError::KeyConflict { .. }));

            store.update("users", row(&[("id", 5.into()), ("name", "Eve".into())])).await.unwrap();
            let rows = store.get_all("users").await.unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].get("name"), Some(&Value::from("Eve")));
            assert!(store.get_all_by_index("users", "name", &"Ann".into()).await.unwrap().is_empty());

            // Generated keys continue after the highest explicit key
            let next = store.add("users", row(&[("name", "Zed".into())])).await.unwrap();
            assert_eq!(next, StoreKey::Int(6));
        });
    }

    #[test]
    fn test_unique_violation() {
        let store = store();
        block_on(async {
            store.add("users", row(&[("email", "a@x".into())])).await.unwrap();
            let err = store.add("users", row(&[("email", "a@x".into())])).await.unwrap_err();
            assert!(matches!(err, StorageError::UniqueViolation { .. }));
            // Re-saving the owner of the value is fine
            store.update("users", row(&[("id", 1.into()), ("email", "a@x".into())])).await.unwrap();
        });
    }

    #[test]
    fn test_delete_clear_and_missing_table() {
        let store = store();
        block_on(async {
            let key = store.add("users", row(&[("name", "Ann".into())])).await.unwrap();
            store.add("users", row(&[("name", "Bob".into())])).await.unwrap();
            store.delete("users", &key).await.unwrap();
            assert_eq!(store.count("users").await.unwrap(), 1);
            assert_eq!(store.count_column("users", "name").await.unwrap(), 1);
            store.clear("users").await.unwrap();
            assert_eq!(store.count("users").await.unwrap(), 0);
            assert!(matches!(
                store.get_all("ghosts").await.unwrap_err(),
                StorageError::TableNotFound(_)
            ));
        });
    }

    #[test]
    fn test_missing_key_on_keyed_table() {
        let store = MemoryStore::new();
        let settings = TableDescriptor::new("settings", "key", false);
        block_on(async {
            store.create_table(&settings).await.unwrap();
            let err = store.update("settings", row(&[("value", 1.into())])).await.unwrap_err();
            assert!(matches!(err, StorageError::MissingKey { .. }));
        });
    }
}
