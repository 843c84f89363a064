//! Conversation and connection data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Greeting that opens every new conversation
pub const GREETING: &str = "Hello 👋! How can I assist you?";

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "AI")]
    Ai,
    Human,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Ai => "AI",
            Role::Human => "Human",
        }
    }
}

/// One entry in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Append-only ordered list of turns
///
/// Turns can be read but never edited or removed once pushed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    /// Empty history
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// History seeded with the assistant greeting
    pub fn with_greeting() -> Self {
        let mut history = Self::new();
        history.push_ai(GREETING);
        history
    }

    pub fn push_human(&mut self, text: impl Into<String>) {
        self.push(Role::Human, text.into());
    }

    pub fn push_ai(&mut self, text: impl Into<String>) {
        self.push(Role::Ai, text.into());
    }

    fn push(&mut self, role: Role, text: String) {
        self.turns.push(Turn {
            role,
            text,
            at: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Render as `Role: text` lines for prompt grounding
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role.label(), t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Credentials for the relational source
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 3306,
            database: "Chinook".to_string(),
        }
    }
}

// Keeps the password out of logs
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_starts_with_greeting() {
        let history = ConversationHistory::with_greeting();
        assert_eq!(history.len(), 1);
        assert_eq!(history.turns()[0].role, Role::Ai);
        assert_eq!(history.turns()[0].text, GREETING);
    }

    #[test]
    fn test_history_preserves_order() {
        let mut history = ConversationHistory::new();
        history.push_human("first");
        history.push_ai("second");
        history.push_human("third");

        let texts: Vec<&str> = history.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(history.transcript(), "Human: first\nAI: second\nHuman: third");
    }

    #[test]
    fn test_params_debug_hides_password() {
        let params = ConnectionParams {
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let dbg = format!("{:?}", params);
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("localhost"));
    }

    #[test]
    fn test_params_serialize_skips_password() {
        let params = ConnectionParams {
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"port\":3306"));
    }
}
