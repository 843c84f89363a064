//! Per-session context passed into every chat operation

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::database::SqlDatabase;
use crate::types::{ConnectionParams, ConversationHistory};

/// Conversation, credentials, and live connection for one user session
pub struct ChatSession {
    id: Uuid,
    params: ConnectionParams,
    history: ConversationHistory,
    database: Option<Arc<dyn SqlDatabase>>,
    read_only: bool,
}

impl ChatSession {
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            params,
            history: ConversationHistory::with_greeting(),
            database: None,
            read_only: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Replace credentials and connection together
    pub fn connect(&mut self, params: ConnectionParams, database: Arc<dyn SqlDatabase>) {
        tracing::info!(session = %self.id, params = ?params, "session connected");
        self.params = params;
        self.database = Some(database);
    }

    pub fn database(&self) -> Option<Arc<dyn SqlDatabase>> {
        self.database.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.database.is_some()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut ConversationHistory {
        &mut self.history
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("params", &self.params)
            .field("turns", &self.history.len())
            .field("connected", &self.is_connected())
            .field("read_only", &self.read_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::QueryResult;
    use crate::error::DatabaseError;

    struct NoTables;

    impl SqlDatabase for NoTables {
        fn dialect(&self) -> &str {
            "MySQL"
        }
        fn table_names(&self) -> Result<Vec<String>, DatabaseError> {
            Ok(vec![])
        }
        fn table_info(&self, _tables: Option<&[String]>) -> Result<String, DatabaseError> {
            Ok(String::new())
        }
        fn run(&self, _sql: &str) -> Result<QueryResult, DatabaseError> {
            Ok(QueryResult::default())
        }
    }

    #[test]
    fn test_new_session_is_greeted_and_disconnected() {
        let session = ChatSession::new(ConnectionParams::default());
        assert_eq!(session.history().len(), 1);
        assert!(!session.is_connected());
        assert!(session.read_only());
    }

    #[test]
    fn test_connect_replaces_params() {
        let mut session = ChatSession::new(ConnectionParams::default());
        let params = ConnectionParams {
            host: "db.internal".to_string(),
            ..ConnectionParams::default()
        };
        session.connect(params, Arc::new(NoTables));
        assert!(session.is_connected());
        assert_eq!(session.params().host, "db.internal");
        assert_eq!(session.history().len(), 1);
    }
}
