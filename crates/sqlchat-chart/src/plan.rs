//! Chart plans requested from the LLM

use serde::{Deserialize, Serialize};
use sqlchat_core::is_single_statement;

use crate::scope::check_scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    /// No chart fits; answer in text only
    None,
}

/// What to query and how to draw it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPlan {
    pub kind: ChartKind,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub title: String,
    pub answer: String,
}

impl ChartPlan {
    /// Parse a model reply, tolerating a markdown fence or prose around the object
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let body = match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if end > start => &trimmed[start..=end],
            _ => return Err("response contains no JSON object".to_string()),
        };
        let plan: ChartPlan =
            serde_json::from_str(body).map_err(|e| format!("invalid chart plan JSON: {}", e))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check the plan is runnable before touching the database
    pub fn validate(&self) -> Result<(), String> {
        if self.answer.trim().is_empty() {
            return Err("\"answer\" must be a non-empty sentence".to_string());
        }
        if self.kind == ChartKind::None {
            return Ok(());
        }

        let sql = self
            .sql
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("\"sql\" is required for a {:?} chart", self.kind))?;

        let first = sql
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_uppercase();
        if first != "SELECT" && first != "WITH" {
            return Err(format!(
                "\"sql\" must be a single SELECT query, got: {}",
                sql.chars().take(60).collect::<String>()
            ));
        }
        if !is_single_statement(sql) {
            return Err("\"sql\" must hold exactly one statement".to_string());
        }
        check_scope(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let plan = ChartPlan::parse(
            r#"{"kind": "bar", "sql": "SELECT Country, COUNT(*) FROM data GROUP BY Country", "title": "Employees by country", "answer": "Canada has the most employees."}"#,
        )
        .unwrap();
        assert_eq!(plan.kind, ChartKind::Bar);
        assert_eq!(plan.title, "Employees by country");
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"kind\": \"line\", \"sql\": \"SELECT d, v FROM data\", \"answer\": \"Trend.\"}\n```";
        let plan = ChartPlan::parse(raw).unwrap();
        assert_eq!(plan.kind, ChartKind::Line);
        assert_eq!(plan.title, "");
    }

    #[test]
    fn test_none_needs_no_sql() {
        let raw = r#"{"kind": "none", "sql": null, "answer": "Nothing to plot."}"#;
        let plan = ChartPlan::parse(raw).unwrap();
        assert_eq!(plan.kind, ChartKind::None);
        assert!(plan.sql.is_none());
    }

    #[test]
    fn test_rejects_missing_sql_and_writes() {
        let err = ChartPlan::parse(r#"{"kind": "bar", "answer": "x"}"#).unwrap_err();
        assert!(err.contains("sql"));

        let err = ChartPlan::parse(r#"{"kind": "bar", "sql": "DELETE FROM t", "answer": "x"}"#)
            .unwrap_err();
        assert!(err.contains("SELECT"));
    }

    #[test]
    fn test_rejects_stacked_statements() {
        let raw = r#"{"kind": "bar", "sql": "SELECT a, b FROM data; DROP TABLE Employee", "answer": "x"}"#;
        let err = ChartPlan::parse(raw).unwrap_err();
        assert!(err.contains("one statement"));

        let raw = r#"{"kind": "bar", "sql": "SELECT a, b FROM data;", "answer": "x"}"#;
        assert!(ChartPlan::parse(raw).is_ok());
    }

    #[test]
    fn test_rejects_tables_other_than_data() {
        let raw = r#"{"kind": "bar", "sql": "SELECT Name, Salary FROM Secret", "answer": "x"}"#;
        let err = ChartPlan::parse(raw).unwrap_err();
        assert!(err.contains("\"data\""));
        assert!(err.contains("Secret"));
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(ChartPlan::parse("I would draw a bar chart").is_err());
        assert!(ChartPlan::parse(r#"{"kind": "pie", "answer": "x"}"#).is_err());
    }
}
