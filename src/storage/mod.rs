//! Storage layer interface
//!
//! The engine never touches persistence directly. Every read and write goes
//! through [`TableStore`], an async key/value interface with one logical
//! store per table and optional secondary indexes.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::StorageError;
use crate::types::{resolve_path, Row, TableDescriptor, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Primary key of a stored row. Integers order before strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreKey {
    Int(i64),
    Text(String),
}

impl StoreKey {
    /// Integral numbers and strings are valid keys
    pub fn from_value(value: &Value) -> StorageResult<Self> {
        match value {
            Value::Text(s) => Ok(StoreKey::Text(s.clone())),
            other => other
                .as_i64()
                .map(StoreKey::Int)
                .ok_or_else(|| StorageError::InvalidKey(other.to_string())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            StoreKey::Int(i) => Value::Integer(*i),
            StoreKey::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKey::Int(i) => write!(f, "{}", i),
            StoreKey::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for StoreKey {
    fn from(i: i64) -> Self {
        StoreKey::Int(i)
    }
}

impl From<&str> for StoreKey {
    fn from(s: &str) -> Self {
        StoreKey::Text(s.to_string())
    }
}

/// Abstract table store
///
/// Index lookups compare with strict equality on scalar values (integer and
/// float unified). Errors are propagated by the executor unmodified.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Register a table before any other call touches it
    async fn create_table(&self, _descriptor: &TableDescriptor) -> StorageResult<()> {
        Ok(())
    }

    async fn get_all(&self, table: &str) -> StorageResult<Vec<Row>>;

    async fn get_all_by_index(&self, table: &str, column: &str, value: &Value) -> StorageResult<Vec<Row>>;

    async fn get_by_index(&self, table: &str, column: &str, value: &Value) -> StorageResult<Option<Row>>;

    async fn count(&self, table: &str) -> StorageResult<usize>;

    async fn count_by_index(&self, table: &str, column: &str, value: &Value) -> StorageResult<usize>;

    /// Number of rows whose `column` holds a non-null value
    async fn count_column(&self, table: &str, column: &str) -> StorageResult<usize> {
        let rows = self.get_all(table).await?;
        Ok(rows
            .iter()
            .filter(|row| resolve_path(row, column).map_or(false, |v| !v.is_null()))
            .count())
    }

    /// Insert a new row; fails if the key is taken
    async fn add(&self, table: &str, row: Row) -> StorageResult<StoreKey>;

    /// Insert or replace the row under its key
    async fn update(&self, table: &str, row: Row) -> StorageResult<StoreKey>;

    async fn delete(&self, table: &str, key: &StoreKey) -> StorageResult<()>;

    async fn clear(&self, table: &str) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key_from_value() {
        assert_eq!(StoreKey::from_value(&Value::Integer(3)).unwrap(), StoreKey::Int(3));
        assert_eq!(StoreKey::from_value(&Value::Float(3.0)).unwrap(), StoreKey::Int(3));
        assert_eq!(StoreKey::from_value(&Value::from("a")).unwrap(), StoreKey::from("a"));
        assert!(StoreKey::from_value(&Value::Float(1.5)).is_err());
        assert!(StoreKey::from_value(&Value::Null).is_err());
    }

    #[test]
    fn test_store_key_order() {
        let mut keys = vec![StoreKey::from("b"), StoreKey::Int(10), StoreKey::from("a"), StoreKey::Int(2)];
        keys.sort();
        assert_eq!(
            keys,
            vec![StoreKey::Int(2), StoreKey::Int(10), StoreKey::from("a"), StoreKey::from("b")]
        );
    }
}
