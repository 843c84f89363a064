//! LLM-driven chart analyst

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sqlchat_core::{
    AnalyticsEngine, ChartArtifact, ChartOutcome, ChatMessage, ChatModel, TableConnector,
    VisualizationError,
};
use uuid::Uuid;

use crate::error::ChartError;
use crate::plan::{ChartKind, ChartPlan};
use crate::render::{render_png, Series};
use crate::scope::{scoped_query, DATA_RELATION};

pub const DEFAULT_MAX_RETRIES: usize = 3;

const PLAN_PROMPT: &str = r#"You are a data analyst who answers questions about a single {dialect} table with a chart.

Schema and sample rows of the table "{table}":
{schema}

Reply with ONLY a JSON object, no markdown and no other text:
{"kind": "bar" | "line" | "scatter" | "none", "sql": "<one {dialect} SELECT query>", "title": "<short chart title>", "answer": "<one sentence answering the question>"}

Rules:
1. Query only the relation "{data}", which holds every row of "{table}". Do not name "{table}" or any other table.
2. The first selected column is the label (x axis), the second is the numeric value (y axis).
3. Use "bar" for comparisons between categories, "line" for trends over time, "scatter" for two numeric columns.
4. Order line charts by the label column and limit bar charts to at most 25 rows.
5. If the question cannot be answered with a chart, use "none" and set "sql" to null."#;

/// Plans a chart with the LLM, runs its query on the bound table, and
/// renders the result to `<output_dir>/<session_id>/<uuid>.png`.
pub struct ChartAnalyst {
    llm: Arc<dyn ChatModel>,
    output_dir: PathBuf,
    max_retries: usize,
}

impl ChartAnalyst {
    pub fn new(llm: Arc<dyn ChatModel>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            llm,
            output_dir: output_dir.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    fn system_prompt(connector: &TableConnector, schema: &str) -> String {
        PLAN_PROMPT
            .replace("{dialect}", connector.database().dialect())
            .replace("{data}", DATA_RELATION)
            .replace("{table}", connector.table())
            .replace("{schema}", schema)
    }

    fn write_chart(&self, session_id: Uuid, png: Vec<u8>) -> Result<ChartArtifact, ChartError> {
        let dir = self.output_dir.join(session_id.to_string());
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.png", Uuid::new_v4()));
        std::fs::write(&path, &png)?;
        Ok(ChartArtifact { path, png })
    }
}

/// Why one planning attempt did not produce a chart
enum AttemptError {
    Plan(String),
    Query(sqlchat_core::DatabaseError),
    Data(ChartError),
}

impl AttemptError {
    fn feedback(&self) -> String {
        match self {
            AttemptError::Plan(msg) => format!(
                "Error: {}. Return ONLY the JSON object described above, no markdown.",
                msg
            ),
            AttemptError::Query(err) => format!(
                "Error: the SQL query failed: {}. Please fix the query and return the corrected JSON.",
                err
            ),
            AttemptError::Data(err) => format!(
                "Error: {}. Select a label column first and a numeric value column second.",
                err
            ),
        }
    }
}

impl From<AttemptError> for VisualizationError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::Plan(msg) => VisualizationError::Planning(msg),
            AttemptError::Query(e) => VisualizationError::Query(e),
            AttemptError::Data(e) => e.into(),
        }
    }
}

#[async_trait]
impl AnalyticsEngine for ChartAnalyst {
    async fn analyze(
        &self,
        utterance: &str,
        connector: &TableConnector,
        session_id: Uuid,
    ) -> Result<ChartOutcome, VisualizationError> {
        let schema = connector.table_info()?;
        tracing::info!(
            database = %connector.params().database,
            table = connector.table(),
            model = self.llm.model_name(),
            "planning chart"
        );
        let mut messages = vec![
            ChatMessage::system(Self::system_prompt(connector, &schema)),
            ChatMessage::user(utterance),
        ];

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            let content = self.llm.chat(&messages).await?;
            tracing::info!(
                attempt = attempt + 1,
                table = connector.table(),
                "chart plan: {}",
                content
            );

            let error = match ChartPlan::parse(&content) {
                Err(msg) => AttemptError::Plan(msg),
                Ok(plan) if plan.kind == ChartKind::None => {
                    tracing::info!("no chart fits the request");
                    return Ok(ChartOutcome {
                        answer: plan.answer,
                        chart: None,
                    });
                }
                Ok(plan) => {
                    let plan_sql = plan.sql.as_deref().unwrap_or_default();
                    let sql = scoped_query(connector.table(), plan_sql);
                    match connector.database().run(&sql) {
                        Err(e) => AttemptError::Query(e),
                        Ok(result) if result.is_empty() => {
                            tracing::info!(sql = %sql, "chart query returned no rows");
                            return Ok(ChartOutcome {
                                answer: plan.answer,
                                chart: None,
                            });
                        }
                        Ok(result) => match Series::from_result(&result) {
                            Err(e) => AttemptError::Data(e),
                            Ok(series) => {
                                let png = render_png(plan.kind, &series)?;
                                let chart = self.write_chart(session_id, png)?;
                                tracing::info!(
                                    path = %chart.path.display(),
                                    kind = ?plan.kind,
                                    title = %plan.title,
                                    points = series.len(),
                                    "chart written"
                                );
                                return Ok(ChartOutcome {
                                    answer: plan.answer,
                                    chart: Some(chart),
                                });
                            }
                        },
                    }
                }
            };

            let feedback = error.feedback();
            tracing::warn!(attempt = attempt + 1, "chart attempt failed: {}", feedback);
            messages.push(ChatMessage::assistant(content));
            messages.push(ChatMessage::user(feedback));
            last_error = Some(error);
        }

        Err(last_error
            .map(VisualizationError::from)
            .unwrap_or_else(|| VisualizationError::Planning("no attempts made".to_string())))
    }
}
