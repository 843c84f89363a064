//! Chat controller: routes one user turn through classification, then either
//! the SQL answering chain or the visualization branch.
//!
//! Every accepted turn appends exactly one human and one AI entry to the
//! session history, whichever branch runs and however it ends.

use std::sync::Arc;

use crate::answer::{SqlAnswerer, SqlFailure, SQL_APOLOGY};
use crate::classify::{Classification, IntentClassifier};
use crate::database::SqlDatabase;
use crate::error::ChatError;
use crate::llm::ChatModel;
use crate::resolve::{table_exists, ResolveFailure, TableResolver};
use crate::session::ChatSession;
use crate::visualize::{
    AnalyticsEngine, ChartArtifact, TableConnector, VisualizationError, CHART_FAILED_REPLY,
    TABLE_NOT_FOUND_REPLY,
};

/// Maximum utterance length in characters
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Branch a turn was routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    DataLookup,
    Visualization,
}

/// Typed reason behind an apology reply
#[derive(Debug, Clone)]
pub enum TurnFailure {
    Sql(SqlFailure),
    Table(ResolveFailure),
    Chart(VisualizationError),
}

/// Result of one chat turn
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub text: String,
    pub route: Route,
    pub classification: Classification,
    pub sql: Option<String>,
    pub chart: Option<ChartArtifact>,
    pub failure: Option<TurnFailure>,
}

impl TurnReply {
    fn new(text: impl Into<String>, route: Route, classification: Classification) -> Self {
        Self {
            text: text.into(),
            route,
            classification,
            sql: None,
            chart: None,
            failure: None,
        }
    }
}

pub struct ChatController {
    classifier: IntentClassifier,
    resolver: TableResolver,
    answerer: SqlAnswerer,
    analytics: Arc<dyn AnalyticsEngine>,
}

impl ChatController {
    pub fn new(llm: Arc<dyn ChatModel>, analytics: Arc<dyn AnalyticsEngine>) -> Self {
        Self {
            classifier: IntentClassifier::new(llm.clone()),
            resolver: TableResolver::new(llm.clone()),
            answerer: SqlAnswerer::new(llm),
            analytics,
        }
    }

    /// Handle one user utterance against a session
    ///
    /// Validation errors are returned before the history is touched. The
    /// history records the utterance exactly as sent; prompts use it trimmed.
    pub async fn handle_turn(
        &self,
        session: &mut ChatSession,
        raw: &str,
    ) -> Result<TurnReply, ChatError> {
        let utterance = raw.trim();
        if utterance.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if utterance.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
        }
        let database = session.database().ok_or(ChatError::NotConnected)?;

        session.history_mut().push_human(raw);
        tracing::info!(session = %session.id(), utterance = %utterance, "chat turn started");

        let classification = self.classifier.classify(utterance).await;
        let reply = if classification.wants_chart() {
            self.visualize(session, database, utterance, classification)
                .await
        } else {
            self.lookup(session, database.as_ref(), utterance, classification)
                .await
        };

        session.history_mut().push_ai(reply.text.clone());
        tracing::info!(
            session = %session.id(),
            route = ?reply.route,
            failed = reply.failure.is_some(),
            has_chart = reply.chart.is_some(),
            "chat turn finished"
        );

        Ok(reply)
    }

    async fn lookup(
        &self,
        session: &ChatSession,
        database: &dyn SqlDatabase,
        utterance: &str,
        classification: Classification,
    ) -> TurnReply {
        let chat_history = session.history().transcript();

        match self
            .answerer
            .answer(database, &chat_history, utterance, session.read_only())
            .await
        {
            Ok(answer) => {
                let mut reply = TurnReply::new(answer.answer, Route::DataLookup, classification);
                reply.sql = Some(answer.sql);
                reply
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "SQL answering failed");
                let mut reply = TurnReply::new(SQL_APOLOGY, Route::DataLookup, classification);
                reply.failure = Some(TurnFailure::Sql(failure));
                reply
            }
        }
    }

    async fn visualize(
        &self,
        session: &ChatSession,
        database: Arc<dyn SqlDatabase>,
        utterance: &str,
        classification: Classification,
    ) -> TurnReply {
        let table = match self.resolve_table(session, database.as_ref(), utterance).await {
            Ok(table) => table,
            Err(failure) => {
                tracing::warn!(error = %failure, "no usable table for chart request");
                let mut reply =
                    TurnReply::new(TABLE_NOT_FOUND_REPLY, Route::Visualization, classification);
                reply.failure = Some(TurnFailure::Table(failure));
                return reply;
            }
        };

        let connector = TableConnector::new(table, session.params().clone(), database);
        match self
            .analytics
            .analyze(utterance, &connector, session.id())
            .await
        {
            Ok(outcome) => {
                let mut reply =
                    TurnReply::new(outcome.answer, Route::Visualization, classification);
                reply.chart = outcome.chart;
                reply
            }
            Err(e) => {
                tracing::warn!(error = %e, table = %connector.table(), "chart generation failed");
                let mut reply =
                    TurnReply::new(CHART_FAILED_REPLY, Route::Visualization, classification);
                reply.failure = Some(TurnFailure::Chart(e));
                reply
            }
        }
    }

    async fn resolve_table(
        &self,
        session: &ChatSession,
        database: &dyn SqlDatabase,
        utterance: &str,
    ) -> Result<String, ResolveFailure> {
        let schema = database.table_info(None)?;
        let table = self
            .resolver
            .resolve(&schema, &session.history().transcript(), utterance)
            .await?;
        let names = database.table_names()?;

        if table_exists(&names, &table) {
            Ok(table)
        } else {
            Err(ResolveFailure::UnknownTable(table))
        }
    }
}
