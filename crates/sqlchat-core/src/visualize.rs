//! Visualization branch: connector + analytics collaborator contract

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::database::SqlDatabase;
use crate::error::{DatabaseError, LlmError};
use crate::types::ConnectionParams;

/// Reply when the predicted table is not in the database
pub const TABLE_NOT_FOUND_REPLY: &str =
    "I'm sorry, but I couldn't find the information you're looking for in the database.";

/// Reply when the analytics engine fails outright
pub const CHART_FAILED_REPLY: &str = "I'm sorry, I couldn't create a chart for that request.";

/// Binds the analytics engine to one verified table of the session's database
#[derive(Clone)]
pub struct TableConnector {
    table: String,
    params: ConnectionParams,
    database: Arc<dyn SqlDatabase>,
}

impl TableConnector {
    pub fn new(
        table: impl Into<String>,
        params: ConnectionParams,
        database: Arc<dyn SqlDatabase>,
    ) -> Self {
        Self {
            table: table.into(),
            params,
            database,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn database(&self) -> &dyn SqlDatabase {
        self.database.as_ref()
    }

    /// Schema text for the bound table only
    pub fn table_info(&self) -> Result<String, DatabaseError> {
        self.database.table_info(Some(std::slice::from_ref(&self.table)))
    }
}

impl fmt::Debug for TableConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableConnector")
            .field("table", &self.table)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A rendered chart, written to a path unique to one session and turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartArtifact {
    pub path: PathBuf,
    pub png: Vec<u8>,
}

/// What the analytics engine produced for one utterance
#[derive(Debug, Clone)]
pub struct ChartOutcome {
    pub answer: String,
    /// `None` when the engine decided no chart fits the request
    pub chart: Option<ChartArtifact>,
}

#[derive(Debug, Clone, Error)]
pub enum VisualizationError {
    #[error("chart planning failed: {0}")]
    Planning(String),

    #[error("chart query failed: {0}")]
    Query(#[from] DatabaseError),

    #[error("chart rendering failed: {0}")]
    Render(String),

    #[error("chart output failed: {0}")]
    Output(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Answers a chart request against one table
#[async_trait]
pub trait AnalyticsEngine: Send + Sync {
    async fn analyze(
        &self,
        utterance: &str,
        connector: &TableConnector,
        session_id: Uuid,
    ) -> Result<ChartOutcome, VisualizationError>;
}
