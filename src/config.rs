//! Engine configuration and schema description
//!
//! `EngineConfig` tunes the query engine. `SchemaConfig` is the schema JSON a
//! host supplies at startup; it is turned into one `TableDescriptor` per table.

use crate::error::{Error, Result};
use crate::types::{ColumnDef, TableDescriptor, Value};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Query engine knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Allow the optimizer to answer COUNT and equality lookups from the
    /// store's indexes instead of scanning
    ///
    /// Turning this off forces every statement through the full scan path,
    /// which is useful to compare results of both paths.
    pub enable_shortcuts: bool,

    /// Fraction of a LIKE pattern's length allowed as edit errors
    ///
    /// - 0.0: exact (case-insensitive) substring match (default)
    /// - 0.2: one typo per five pattern characters
    pub like_threshold: f64,

    /// Upper bound on AND-subgroups produced when a parenthesized OR group is
    /// distributed over the rest of its branch
    pub max_where_terms: usize,

    /// Load table caches while the engine starts instead of on first read
    pub warm_caches: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_shortcuts: true,
            like_threshold: 0.0,
            max_where_terms: 64,
            warm_caches: true,
        }
    }
}

impl EngineConfig {
    /// Every statement takes the general scan path
    pub fn strict() -> Self {
        Self {
            enable_shortcuts: false,
            ..Default::default()
        }
    }

    /// Small limits and lazy caches for unit tests
    pub fn for_testing() -> Self {
        Self {
            max_where_terms: 16,
            warm_caches: false,
            ..Default::default()
        }
    }

    /// Like matching that tolerates a typo per five characters
    pub fn for_fuzzy_search() -> Self {
        Self {
            like_threshold: 0.2,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.like_threshold) {
            return Err(Error::Config(format!(
                "like_threshold must be in [0, 1), got {}",
                self.like_threshold
            )));
        }
        if self.max_where_terms == 0 {
            return Err(Error::Config("max_where_terms must be positive".into()));
        }
        Ok(())
    }
}

/// Schema document: `{ name, version, tables: [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub name: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
    #[serde(default)]
    pub auto_increment: bool,
    /// Keep rows across schema version changes
    #[serde(default)]
    pub persist: bool,
    #[serde(default)]
    pub cache: bool,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
}

fn default_key_path() -> String {
    "id".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub key: String,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default: Value,
    #[serde(default = "default_indexed")]
    pub indexed: bool,
}

fn default_indexed() -> bool {
    true
}

impl SchemaConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: SchemaConfig = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for table in &self.tables {
            if table.name.is_empty() || table.name == "*" {
                return Err(Error::Config(format!("Invalid table name '{}'", table.name)));
            }
            if !seen.insert(table.name.as_str()) {
                return Err(Error::Config(format!("Duplicate table '{}'", table.name)));
            }
            if table.cache && table.auto_increment {
                return Err(Error::Config(format!(
                    "Table '{}' uses autoIncrement and cannot be cached",
                    table.name
                )));
            }
        }
        Ok(())
    }

    pub fn descriptors(&self) -> Result<Vec<TableDescriptor>> {
        self.tables.iter().map(TableConfig::descriptor).collect()
    }
}

impl TableConfig {
    pub fn descriptor(&self) -> Result<TableDescriptor> {
        let mut table = TableDescriptor::new(&self.name, &self.key_path, self.auto_increment);
        for column in &self.columns {
            let mut def = ColumnDef::new(&column.key).with_default(column.default.clone());
            if column.unique {
                def = def.unique();
            } else if !column.indexed {
                def = def.not_indexed();
            }
            table = table.with_column(def);
        }
        if self.persist {
            table = table.persistent();
        }
        if self.cache {
            table = table.with_cache()?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "name": "app",
        "version": 2,
        "tables": [
            {
                "name": "users",
                "autoIncrement": true,
                "columns": [
                    {"key": "name"},
                    {"key": "email", "unique": true},
                    {"key": "age", "default": 0},
                    {"key": "bio", "indexed": false}
                ]
            },
            {"name": "settings", "keyPath": "key", "cache": true, "persist": true}
        ]
    }"#;

    #[test]
    fn test_engine_config_presets() {
        assert!(EngineConfig::default().enable_shortcuts);
        assert!(!EngineConfig::strict().enable_shortcuts);
        assert!(!EngineConfig::for_testing().warm_caches);
        assert!(EngineConfig::for_fuzzy_search().validate().is_ok());

        let bad = EngineConfig {
            like_threshold: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_schema_descriptors() {
        let schema = SchemaConfig::from_json(SCHEMA).unwrap();
        assert_eq!(schema.version, 2);

        let tables = schema.descriptors().unwrap();
        let users = &tables[0];
        assert_eq!(users.key_field, "id");
        assert!(users.key_is_generated);
        assert!(users.cache().is_none());
        assert_eq!(users.column("age").unwrap().default, Value::Integer(0));
        assert!(users.column("email").unwrap().unique);
        assert!(!users.is_indexed("bio"));

        let settings = &tables[1];
        assert_eq!(settings.key_field, "key");
        assert!(settings.persist);
        assert!(settings.cache().is_some());
    }

    #[test]
    fn test_schema_rejects_cached_autoincrement() {
        let json = r#"{"name": "app", "tables": [{"name": "logs", "autoIncrement": true, "cache": true}]}"#;
        assert!(matches!(SchemaConfig::from_json(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_schema_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, SCHEMA).unwrap();
        let schema = SchemaConfig::from_file(&path).unwrap();
        assert_eq!(schema.tables.len(), 2);

        let missing = SchemaConfig::from_file(dir.path().join("missing.json")).unwrap_err();
        assert_eq!(missing.kind(), "io");
    }

    #[test]
    fn test_engine_config_from_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"enable_shortcuts": false}"#).unwrap();
        assert!(!config.enable_shortcuts);
        assert_eq!(config.max_where_terms, 64);
    }
}
