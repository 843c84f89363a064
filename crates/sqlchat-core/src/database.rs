//! Database seam: schema introspection and query execution

use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// Rows beyond this are dropped from prompt text
const PROMPT_ROW_LIMIT: usize = 100;

/// Tabular result of one statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as a pipe-separated table for the answer-synthesis prompt
    pub fn to_prompt_text(&self) -> String {
        let mut out = self.columns.join(" | ");
        for row in self.rows.iter().take(PROMPT_ROW_LIMIT) {
            out.push('\n');
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            out.push_str(&cells.join(" | "));
        }
        if self.rows.len() > PROMPT_ROW_LIMIT {
            out.push_str(&format!(
                "\n... ({} more rows)",
                self.rows.len() - PROMPT_ROW_LIMIT
            ));
        }
        out
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A live relational connection shared by the turns of one session
pub trait SqlDatabase: Send + Sync {
    /// SQL dialect named in prompts (e.g. "MySQL")
    fn dialect(&self) -> &str;

    /// Names of all user tables
    fn table_names(&self) -> Result<Vec<String>, DatabaseError>;

    /// Schema text for the given tables, or all tables when `None`
    fn table_info(&self, tables: Option<&[String]>) -> Result<String, DatabaseError>;

    /// Execute a statement and collect its rows
    fn run(&self, sql: &str) -> Result<QueryResult, DatabaseError>;
}
