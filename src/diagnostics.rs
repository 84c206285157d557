//! Non-fatal warnings reported beside query results
//!
//! Warnings travel through a [`DiagnosticSink`] and never change what a
//! statement returns.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    /// INSERT/UPDATE wrote a column the table does not declare
    UnknownColumn {
        table: String,
        column: String,
        statement: String,
    },
    /// Ingestion skipped a record it could not decode
    MalformedRecord {
        table: String,
        line: usize,
        message: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnknownColumn { table, column, statement } => write!(
                f,
                "{} on '{}' writes undeclared column '{}'",
                statement, table, column
            ),
            Warning::MalformedRecord { table, line, message } => {
                write!(f, "skipped record {} for '{}': {}", line, table, message)
            }
        }
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn warn(&self, warning: Warning);
}

/// Forwards warnings to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warn(&self, warning: Warning) {
        tracing::warn!(%warning, "jsql warning");
    }
}

/// Keeps warnings in memory until taken
#[derive(Debug, Default)]
pub struct CollectingSink {
    warnings: Mutex<Vec<Warning>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().clone()
    }

    pub fn take(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.warnings.lock())
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for CollectingSink {
    fn warn(&self, warning: Warning) {
        tracing::debug!(%warning, "collected warning");
        self.warnings.lock().push(warning);
    }
}
