//! Table prediction for the visualization branch

use std::sync::Arc;

use crate::error::{DatabaseError, LlmError};
use crate::llm::ChatModel;
use crate::prompts::{render, TABLE_TEMPLATE};

pub struct TableResolver {
    llm: Arc<dyn ChatModel>,
}

impl TableResolver {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    /// Ask the model which table answers the question
    ///
    /// The answer is only trimmed; callers check it with [`table_exists`].
    pub async fn resolve(
        &self,
        schema: &str,
        chat_history: &str,
        utterance: &str,
    ) -> Result<String, LlmError> {
        let prompt = render(
            TABLE_TEMPLATE,
            &[
                ("schema", schema),
                ("chat_history", chat_history),
                ("question", utterance),
            ],
        );
        let raw = self.llm.complete(&prompt).await?;
        let table = raw.trim().to_string();
        tracing::debug!(table = %table, "table resolved");
        Ok(table)
    }
}

/// Exact, case-sensitive membership against the live table list
pub fn table_exists(table_names: &[String], table: &str) -> bool {
    table_names.iter().any(|name| name == table)
}

/// Why the resolver's guess could not be used
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveFailure {
    #[error("table resolution call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("could not list tables: {0}")]
    Database(#[from] DatabaseError),

    #[error("table '{0}' is not in the database")]
    UnknownTable(String),
}
