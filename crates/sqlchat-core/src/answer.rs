//! SQL answering chain: generate → execute → synthesize

use std::sync::Arc;

use thiserror::Error;

use crate::database::{QueryResult, SqlDatabase};
use crate::error::{DatabaseError, LlmError};
use crate::llm::ChatModel;
use crate::prompts::{render, ANSWER_TEMPLATE, SQL_TEMPLATE};

/// User-facing copy for every SQL chain failure
pub const SQL_APOLOGY: &str =
    "Sorry, I couldn't find any data related to your question. Please try asking something else.";

/// Leading keywords accepted on a read-only session
const READ_ONLY_KEYWORDS: &[&str] = &["SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN"];

/// Stage at which the chain stopped
#[derive(Debug, Clone, Error)]
pub enum SqlFailure {
    #[error("SQL generation failed: {0}")]
    Generation(String),

    #[error("SQL execution failed: {0}")]
    Execution(#[from] DatabaseError),

    #[error("query returned no rows")]
    EmptyResult,

    #[error("answer synthesis failed: {0}")]
    Synthesis(LlmError),
}

/// Successful run of the chain
#[derive(Debug, Clone)]
pub struct SqlAnswer {
    pub sql: String,
    pub result: QueryResult,
    pub answer: String,
}

pub struct SqlAnswerer {
    llm: Arc<dyn ChatModel>,
}

impl SqlAnswerer {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    pub async fn answer(
        &self,
        database: &dyn SqlDatabase,
        chat_history: &str,
        utterance: &str,
        read_only: bool,
    ) -> Result<SqlAnswer, SqlFailure> {
        let schema = database
            .table_info(None)
            .map_err(|e| SqlFailure::Generation(e.to_string()))?;

        // 1. Generate
        let prompt = render(
            SQL_TEMPLATE,
            &[
                ("dialect", database.dialect()),
                ("schema", &schema),
                ("chat_history", chat_history),
                ("question", utterance),
            ],
        );
        let raw = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| SqlFailure::Generation(e.to_string()))?;
        let sql = strip_sql_fences(&raw);
        if sql.is_empty() {
            return Err(SqlFailure::Generation("model returned empty SQL".to_string()));
        }
        if read_only {
            ensure_read_only(&sql)?;
        }
        tracing::info!(sql = %sql, "generated SQL");

        // 2. Execute
        let result = database.run(&sql)?;
        tracing::info!(rows = result.row_count, "SQL executed");
        if result.is_empty() {
            return Err(SqlFailure::EmptyResult);
        }

        // 3. Synthesize
        let response = result.to_prompt_text();
        let prompt = render(
            ANSWER_TEMPLATE,
            &[
                ("schema", &schema),
                ("chat_history", chat_history),
                ("query", &sql),
                ("question", utterance),
                ("response", &response),
            ],
        );
        let answer = self
            .llm
            .complete(&prompt)
            .await
            .map_err(SqlFailure::Synthesis)?
            .trim()
            .to_string();
        if answer.is_empty() {
            return Err(SqlFailure::Synthesis(LlmError::EmptyResponse));
        }

        Ok(SqlAnswer { sql, result, answer })
    }
}

/// Remove a surrounding markdown fence and `SQL Query:` echo, once each
pub fn strip_sql_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = if let Some(s) = trimmed.strip_prefix("```sql") {
        s
    } else if let Some(s) = trimmed.strip_prefix("```") {
        s
    } else {
        trimmed
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner).trim();
    inner
        .strip_prefix("SQL Query:")
        .unwrap_or(inner)
        .trim()
        .to_string()
}

/// True when `sql` holds at most one statement
///
/// A trailing `;` is allowed. Semicolons inside string literals, quoted
/// identifiers and comments do not count.
pub fn is_single_statement(sql: &str) -> bool {
    let mut chars = sql.chars().peekable();
    let mut terminated = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                if terminated {
                    return false;
                }
                for q in chars.by_ref() {
                    if q == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            ';' => terminated = true,
            c if c.is_whitespace() => {}
            _ if terminated => return false,
            _ => {}
        }
    }
    true
}

fn ensure_read_only(sql: &str) -> Result<(), SqlFailure> {
    if !is_single_statement(sql) {
        return Err(SqlFailure::Generation(format!(
            "refusing multiple statements on read-only session: {}",
            sql.chars().take(60).collect::<String>()
        )));
    }

    let first = sql
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_start_matches('(')
        .to_uppercase();

    if READ_ONLY_KEYWORDS.contains(&first.as_str()) {
        Ok(())
    } else {
        Err(SqlFailure::Generation(format!(
            "refusing non-query statement on read-only session: {}",
            sql.chars().take(60).collect::<String>()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_sql_fences() {
        assert_eq!(strip_sql_fences("SELECT 1;"), "SELECT 1;");
        assert_eq!(strip_sql_fences("```sql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(strip_sql_fences("```\nSELECT 1\n```\n"), "SELECT 1");
        assert_eq!(strip_sql_fences(" SQL Query: SELECT 1"), "SELECT 1");
        assert_eq!(strip_sql_fences("   "), "");
    }

    #[test]
    fn test_read_only_guard() {
        assert!(ensure_read_only("SELECT * FROM Track").is_ok());
        assert!(ensure_read_only("select count(*) from Employee").is_ok());
        assert!(ensure_read_only("WITH t AS (SELECT 1) SELECT * FROM t").is_ok());
        assert!(ensure_read_only("(SELECT 1) UNION (SELECT 2)").is_ok());

        let err = ensure_read_only("DROP TABLE Employee").unwrap_err();
        assert!(matches!(err, SqlFailure::Generation(_)));
        assert!(ensure_read_only("DELETE FROM Track").is_err());
    }

    #[test]
    fn test_read_only_guard_rejects_stacked_statements() {
        let err = ensure_read_only("SELECT 1; DROP TABLE Employee").unwrap_err();
        assert!(err.to_string().contains("multiple statements"));
        assert!(ensure_read_only("SELECT 1;\nDELETE FROM Track;").is_err());

        assert!(ensure_read_only("SELECT 1;").is_ok());
        assert!(ensure_read_only("SELECT 1;  \n").is_ok());
        assert!(ensure_read_only("SELECT 1; -- done").is_ok());
    }

    #[test]
    fn test_single_statement_ignores_quoted_semicolons() {
        assert!(is_single_statement("SELECT * FROM Track WHERE Name = 'a; b'"));
        assert!(is_single_statement("SELECT \"odd;col\" FROM t"));
        assert!(is_single_statement("SELECT 1 /* ; DROP */"));
        assert!(!is_single_statement("SELECT 'x'; SELECT 'y'"));
    }
}
