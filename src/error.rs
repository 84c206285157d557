//! Error types for the jsql query engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a `TableStore` implementation.
///
/// The executor propagates these unmodified.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Key already exists in '{table}': {key}")]
    KeyConflict { table: String, key: String },

    #[error("Row for '{table}' is missing key field '{key_field}'")]
    MissingKey { table: String, key_field: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Unique constraint violated on {table}.{column}: {value}")]
    UniqueViolation {
        table: String,
        column: String,
        value: String,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum Error {
    /// Unsupported keyword/operator, malformed clause or missing mandatory clause
    #[error("Invalid syntax: {0}")]
    Syntax(String),

    /// Missing `$name` binding or a bound value of the wrong shape
    #[error("Invalid params: {0}")]
    Parameter(String),

    /// Unknown column or table
    #[error("Schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable error category, used by the host transport payload
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Syntax(_) => "syntax",
            Error::Parameter(_) => "parameter",
            Error::Schema(_) => "schema",
            Error::Storage(_) => "storage",
            Error::Config(_) => "config",
            Error::Json(_) => "json",
            Error::Io(_) => "io",
        }
    }

    pub(crate) fn unknown_column(column: &str) -> Self {
        Error::Schema(format!("Unknown column '{}'", column))
    }
}
