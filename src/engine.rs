//! Engine context
//!
//! Owns the table descriptors, the store handle, the engine configuration,
//! the diagnostics sink and the clock used by `NOW()`. Built once at startup
//! and borrowed by every parse/execute call.

use crate::config::{EngineConfig, SchemaConfig};
use crate::diagnostics::{DiagnosticSink, TracingSink, Warning};
use crate::error::{Error, Result};
use crate::sql::executor::{Executor, QueryOutput};
use crate::sql::params::{Clock, Params, SystemClock};
use crate::sql::parser::Parser;
use crate::sql::query::{Query, StatementType};
use crate::storage::TableStore;
use crate::types::{Row, TableDescriptor, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, info};

/// Rows per INSERT when ingesting
const INGEST_BATCH: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestFormat {
    /// One JSON array of objects (or a single object)
    Json,
    /// One JSON object per line
    Ndjson,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub skipped: usize,
}

pub struct Engine {
    store: Arc<dyn TableStore>,
    tables: BTreeMap<String, TableDescriptor>,
    config: EngineConfig,
    sink: Arc<dyn DiagnosticSink>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    /// Register every schema table with the store and warm caches
    pub async fn open(schema: &SchemaConfig, store: Arc<dyn TableStore>, config: EngineConfig) -> Result<Self> {
        schema.validate()?;
        info!(schema = %schema.name, version = schema.version, "opening engine");
        Self::from_descriptors(schema.descriptors()?, store, config).await
    }

    pub async fn from_descriptors(
        descriptors: Vec<TableDescriptor>,
        store: Arc<dyn TableStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut tables = BTreeMap::new();
        for descriptor in descriptors {
            if tables.contains_key(&descriptor.name) {
                return Err(Error::Config(format!("Duplicate table '{}'", descriptor.name)));
            }
            store.create_table(&descriptor).await?;
            tables.insert(descriptor.name.clone(), descriptor);
        }

        let engine = Self {
            store,
            tables,
            config,
            sink: Arc::new(TracingSink),
            clock: Arc::new(SystemClock),
        };
        if engine.config.warm_caches {
            engine.warm_caches().await?;
        }
        info!(tables = engine.tables.len(), "engine ready");
        Ok(engine)
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TableStore> {
        &self.store
    }

    pub fn descriptor(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.values()
    }

    /// Parse without executing
    pub fn parse(&self, sql: &str, params: &Params) -> Result<Vec<Query>> {
        let queries = Parser::new(params, self.clock.now())
            .with_max_where_terms(self.config.max_where_terms)
            .parse(sql)?;
        debug!(statements = queries.len(), ?queries, "parsed");
        Ok(queries)
    }

    pub async fn query(&self, sql: &str, params: &Params) -> Result<QueryOutput> {
        let queries = self.parse(sql, params)?;
        self.execute(&queries).await
    }

    /// Execute pre-built queries (validated first)
    pub async fn execute(&self, queries: &[Query]) -> Result<QueryOutput> {
        for query in queries {
            query.validate()?;
        }
        Executor::new(self.store.as_ref(), &self.tables, &self.config, self.sink.as_ref())
            .execute(queries)
            .await
    }

    /// Reload every table cache from the store
    pub async fn warm_caches(&self) -> Result<()> {
        for table in self.tables.values() {
            let Some(cache) = table.cache() else { continue };
            let rows = self.store.get_all(&table.name).await?;
            cache.load(rows.into_iter().filter_map(|row| table.key_of(&row).map(|key| (key, row))));
            debug!(table = %table.name, rows = cache.stats().size, "cache warmed");
        }
        Ok(())
    }

    /// Stream records into `table` through the INSERT pipeline.
    ///
    /// Records that are not JSON objects are skipped and reported as
    /// `MalformedRecord` warnings; blank NDJSON lines are ignored.
    pub async fn ingest<R: BufRead>(&self, reader: R, table: &str, format: IngestFormat) -> Result<IngestReport> {
        if self.descriptor(table).is_none() {
            return Err(Error::Schema(format!("Unknown table '{}'", table)));
        }

        let mut report = IngestReport::default();
        let mut batch = Vec::with_capacity(INGEST_BATCH);
        match format {
            IngestFormat::Json => {
                let records = match serde_json::from_reader::<_, serde_json::Value>(reader)? {
                    serde_json::Value::Array(items) => items,
                    single => vec![single],
                };
                for (i, record) in records.into_iter().enumerate() {
                    self.collect(table, i + 1, Ok(Value::from(record)), &mut batch, &mut report);
                    if batch.len() >= INGEST_BATCH {
                        report.inserted += self.insert_batch(table, &mut batch).await?;
                    }
                }
            }
            IngestFormat::Ndjson => {
                for (i, line) in reader.lines().enumerate() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record = serde_json::from_str::<serde_json::Value>(&line).map(Value::from);
                    self.collect(table, i + 1, record, &mut batch, &mut report);
                    if batch.len() >= INGEST_BATCH {
                        report.inserted += self.insert_batch(table, &mut batch).await?;
                    }
                }
            }
        }
        report.inserted += self.insert_batch(table, &mut batch).await?;

        info!(table, inserted = report.inserted, skipped = report.skipped, "ingest complete");
        Ok(report)
    }

    fn collect(
        &self,
        table: &str,
        line: usize,
        record: std::result::Result<Value, serde_json::Error>,
        batch: &mut Vec<Row>,
        report: &mut IngestReport,
    ) {
        let message = match record {
            Ok(Value::Object(row)) => {
                batch.push(row);
                return;
            }
            Ok(other) => format!("expected an object, got {}", other.type_name()),
            Err(e) => e.to_string(),
        };
        report.skipped += 1;
        self.sink.warn(Warning::MalformedRecord {
            table: table.to_string(),
            line,
            message,
        });
    }

    async fn insert_batch(&self, table: &str, batch: &mut Vec<Row>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let mut query = Query::new(StatementType::Insert, table);
        query.values = std::mem::take(batch);
        let count = query.values.len();
        self.execute(std::slice::from_ref(&query)).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::sql::params::FixedClock;
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};
    use futures::executor::block_on;
    use serde_json::json;
    use std::io::Cursor;

    const SCHEMA: &str = r#"{
        "name": "app",
        "version": 2,
        "tables": [
            {"name": "users", "autoIncrement": true, "columns": [
                {"key": "name"}, {"key": "age"}, {"key": "email", "unique": true}
            ]},
            {"name": "events", "keyPath": "slug", "cache": true, "columns": [
                {"key": "at"}, {"key": "note", "indexed": false}
            ]}
        ]
    }"#;

    fn engine(config: EngineConfig) -> Engine {
        let schema = SchemaConfig::from_json(SCHEMA).unwrap();
        block_on(Engine::open(&schema, Arc::new(MemoryStore::new()), config)).unwrap()
    }

    fn params(value: serde_json::Value) -> Params {
        match Value::from(value) {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    #[test]
    fn test_open_registers_tables() {
        let engine = engine(EngineConfig::default());
        let names: Vec<&str> = engine.tables().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["events", "users"]);
        assert!(engine.descriptor("events").unwrap().cache().unwrap().is_loaded());
        assert!(engine.descriptor("users").unwrap().key_is_generated);
    }

    #[test]
    fn test_now_uses_engine_clock() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let engine = engine(EngineConfig::for_testing()).with_clock(Arc::new(FixedClock(instant)));
        let out = block_on(engine.query(
            "INSERT INTO events VALUES ($e)",
            &params(json!({"e": {"slug": "launch", "at": instant.timestamp_millis()}})),
        ))
        .unwrap();
        assert_eq!(out.len(), 1);

        let out = block_on(engine.query(
            "SELECT slug FROM events WHERE DATE(at, 'YYYY-MM-DD') = NOW('YYYY-MM-DD')",
            &Params::new(),
        ))
        .unwrap();
        assert_eq!(out.into_json(), json!([{"slug": "launch"}]));
    }

    #[test]
    fn test_ingest_ndjson_skips_bad_lines() {
        let sink = Arc::new(CollectingSink::new());
        let engine = engine(EngineConfig::for_testing()).with_sink(sink.clone());
        let input = "{\"name\": \"Ann\"}\n\n not json\n[1]\n{\"name\": \"Bob\"}\n";
        let report = block_on(engine.ingest(Cursor::new(input), "users", IngestFormat::Ndjson)).unwrap();
        assert_eq!(report, IngestReport { inserted: 2, skipped: 2 });

        let warnings = sink.take();
        assert_eq!(warnings.len(), 2);
        assert!(matches!(&warnings[0], Warning::MalformedRecord { line: 3, .. }));

        let out = block_on(engine.query("SELECT COUNT(*) FROM users", &Params::new())).unwrap();
        assert_eq!(out.into_json(), json!([{"COUNT(*)": 2}]));
    }

    #[test]
    fn test_ingest_json_array() {
        let engine = engine(EngineConfig::for_testing());
        let input = r#"[{"slug": "a", "at": 1}, {"slug": "b", "at": 2}]"#;
        let report = block_on(engine.ingest(Cursor::new(input), "events", IngestFormat::Json)).unwrap();
        assert_eq!(report.inserted, 2);
        assert!(block_on(engine.ingest(Cursor::new(input), "nope", IngestFormat::Json)).is_err());
    }

    #[test]
    fn test_execute_validates_host_queries() {
        let engine = engine(EngineConfig::for_testing());
        let query = Query::new(StatementType::Update, "users");
        let err = block_on(engine.execute(&[query])).unwrap_err();
        assert_eq!(err.kind(), "syntax");
    }

    #[test]
    fn test_unique_violation_is_storage_error() {
        let engine = engine(EngineConfig::for_testing());
        let p = params(json!({"a": {"email": "x@y"}, "b": {"email": "x@y"}}));
        block_on(engine.query("INSERT INTO users VALUES ($a)", &p)).unwrap();
        let err = block_on(engine.query("INSERT INTO users VALUES ($b)", &p)).unwrap_err();
        assert_eq!(err.kind(), "storage");
    }
}
