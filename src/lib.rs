//! jsql - embedded SQL-dialect query engine
//!
//! Parses a small SQL dialect into `Query` values, picks an access path and
//! runs the query against an abstract asynchronous key/value `TableStore`.
//!
//! ## Architecture
//! - SQL layer: Lexer → Binder → Segmenter → Parser → Optimizer → Executor
//! - Storage layer: `TableStore` trait + in-memory reference store
//! - Cache layer: optional per-table row snapshot kept in sync with the store
//! - Engine: schema descriptors, configuration, diagnostics and clock
//!
//! ```ignore
//! let schema = SchemaConfig::from_file("schema.json")?;
//! let engine = Engine::open(&schema, Arc::new(MemoryStore::new()), EngineConfig::default()).await?;
//! let rows = engine.query("SELECT name FROM users WHERE age >= $min", &params).await?;
//! ```

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod sql;
pub mod storage;
pub mod transport;
pub mod types;

mod error;

pub use config::{ColumnConfig, EngineConfig, SchemaConfig, TableConfig};
pub use diagnostics::{CollectingSink, DiagnosticSink, TracingSink, Warning};
pub use engine::{Engine, IngestFormat, IngestReport};
pub use error::{Error, Result, StorageError};
pub use sql::{parse, Params, Query, QueryOutput};
pub use storage::{MemoryStore, StoreKey, TableStore};
pub use types::{ColumnDef, Row, TableDescriptor, Value};
