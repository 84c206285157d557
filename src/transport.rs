//! Host request/response envelope
//!
//! Wire shape (JSON):
//!
//! ```text
//! {"uid": "42", "type": "sql",   "data": {"sql": "SELECT ...", "params": {...}, "debug": false}}
//! {"uid": "43", "type": "query", "data": {"type": "SELECT", "table": "users", ...}}
//! {"uid": "42", "type": "response", "data": [...rows]}
//! {"uid": "43", "type": "error",    "data": {"kind": "syntax", "message": "..."}}
//! ```
//!
//! Requests are handled one at a time, in arrival order.

use crate::engine::Engine;
use crate::error::Error;
use crate::sql::executor::QueryOutput;
use crate::sql::params::Params;
use crate::sql::query::Query;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id echoed in the response
    pub uid: String,
    #[serde(flatten)]
    pub kind: RequestKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum RequestKind {
    Sql(SqlRequest),
    Query(QueryPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlRequest {
    pub sql: String,
    #[serde(default)]
    pub params: Params,
    /// Log the parsed queries
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryPayload {
    Many(Vec<Query>),
    One(Box<Query>),
}

impl QueryPayload {
    pub fn into_vec(self) -> Vec<Query> {
        match self {
            QueryPayload::Many(queries) => queries,
            QueryPayload::One(query) => vec![*query],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub uid: String,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ResponsePayload {
    #[serde(rename = "response")]
    Success(QueryOutput),
    Error(ErrorPayload),
}

impl Response {
    pub fn success(uid: String, output: QueryOutput) -> Self {
        Self {
            uid,
            payload: ResponsePayload::Success(output),
        }
    }

    pub fn error(uid: String, error: &Error) -> Self {
        Self {
            uid,
            payload: ResponsePayload::Error(ErrorPayload {
                kind: error.kind().to_string(),
                message: error.to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.payload, ResponsePayload::Success(_))
    }
}

/// Handle one request; failures become error responses
pub async fn handle(engine: &Engine, request: Request) -> Response {
    let Request { uid, kind } = request;
    let result = match kind {
        RequestKind::Sql(request) => match engine.parse(&request.sql, &request.params) {
            Ok(queries) => {
                if request.debug {
                    info!(%uid, ?queries, "parsed queries");
                }
                engine.execute(&queries).await
            }
            Err(e) => Err(e),
        },
        RequestKind::Query(payload) => engine.execute(&payload.into_vec()).await,
    };
    match result {
        Ok(output) => Response::success(uid, output),
        Err(e) => {
            warn!(%uid, kind = e.kind(), error = %e, "request failed");
            Response::error(uid, &e)
        }
    }
}

/// FIFO request queue
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: Mutex<VecDeque<Request>>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: Request) {
        self.pending.lock().push_back(request);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Handle the oldest pending request
    pub async fn process_next(&self, engine: &Engine) -> Option<Response> {
        let request = self.pending.lock().pop_front()?;
        Some(handle(engine, request).await)
    }

    /// Handle every pending request in order
    pub async fn drain(&self, engine: &Engine) -> Vec<Response> {
        let mut responses = Vec::new();
        while let Some(response) = self.process_next(engine).await {
            responses.push(response);
        }
        responses
    }
}
