//! sqlchat core - natural-language chat over a relational database
//!
//! Turns a user utterance into either a natural-language answer (via
//! generated SQL) or a chart (via an analytics engine bound to one table).
//! The LLM, the database, and the analytics engine sit behind traits.

pub mod answer;
pub mod classify;
pub mod controller;
pub mod database;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod resolve;
pub mod session;
pub mod types;
pub mod visualize;

pub use answer::{is_single_statement, SqlAnswer, SqlAnswerer, SqlFailure, SQL_APOLOGY};
pub use classify::{Classification, IntentClassifier};
pub use controller::{ChatController, Route, TurnFailure, TurnReply, MAX_MESSAGE_LENGTH};
pub use database::{QueryResult, SqlDatabase};
pub use error::{ChatError, DatabaseError, LlmError};
pub use llm::{ChatMessage, ChatModel, MessageRole};
pub use resolve::{table_exists, ResolveFailure, TableResolver};
pub use session::ChatSession;
pub use types::{ConnectionParams, ConversationHistory, Role, Turn, GREETING};
pub use visualize::{
    AnalyticsEngine, ChartArtifact, ChartOutcome, TableConnector, VisualizationError,
    CHART_FAILED_REPLY, TABLE_NOT_FOUND_REPLY,
};
