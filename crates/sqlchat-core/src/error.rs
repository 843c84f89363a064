//! Error types shared across the chat pipeline

use thiserror::Error;

/// Errors raised by a chat-completion backend
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM returned no content")]
    EmptyResponse,
}

/// Errors raised by a database handle
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Schema introspection failed: {0}")]
    Schema(String),
}

/// Errors returned by a chat turn before any history is touched
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),

    #[error("no database connected; connect before chatting")]
    NotConnected,
}
