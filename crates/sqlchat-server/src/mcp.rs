//! MCP (Model Context Protocol) server implementation

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use rust_mcp_schema::{
    schema_utils::CallToolError, CallToolRequest, CallToolResult, ContentBlock, ImageContent,
    Implementation, InitializeResult, ListToolsRequest, ListToolsResult, RpcError,
    ServerCapabilities, ServerCapabilitiesTools, TextContent, Tool, ToolInputSchema,
    LATEST_PROTOCOL_VERSION,
};
use rust_mcp_sdk::{mcp_server::ServerHandler, McpServer};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlchat_core::{AnalyticsEngine, ChatController, ChatModel, ChatSession, SqlDatabase};
use sqlchat_duck::{DataSource, DuckDatabase};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::sessions::{SessionStore, SharedSession};

#[derive(Debug, Default, Deserialize)]
struct ConnectArgs {
    user: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    /// DuckDB file to open instead of a MySQL server
    path: Option<PathBuf>,
    /// Reconnect an existing session instead of creating one
    session_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct ChatArgs {
    session_id: Uuid,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SessionArgs {
    session_id: Uuid,
}

fn parse_args<T: DeserializeOwned>(
    arguments: Option<Map<String, Value>>,
) -> Result<T, CallToolError> {
    let value = Value::Object(arguments.unwrap_or_default());
    serde_json::from_value(value)
        .map_err(|e| CallToolError::from_message(format!("Invalid arguments: {}", e)))
}

fn text_block(text: impl Into<String>) -> ContentBlock {
    ContentBlock::TextContent(TextContent::new(text.into(), None, None))
}

fn tool_result(content: Vec<ContentBlock>) -> CallToolResult {
    CallToolResult {
        content,
        is_error: None,
        meta: None,
        structured_content: None,
    }
}

fn property(kind: &str, description: &str) -> Map<String, Value> {
    let mut prop = Map::new();
    prop.insert("type".to_string(), Value::String(kind.to_string()));
    prop.insert("description".to_string(), Value::String(description.to_string()));
    prop
}

fn tool(
    name: &str,
    description: &str,
    required: &[&str],
    properties: HashMap<String, Map<String, Value>>,
) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: ToolInputSchema::new(
            required.iter().map(|r| r.to_string()).collect(),
            Some(properties),
        ),
        title: None,
        annotations: None,
        meta: None,
        output_schema: None,
    }
}

/// sqlchat MCP server handler
pub struct SqlChatServerHandler {
    controller: ChatController,
    sessions: SessionStore,
    defaults: DatabaseConfig,
}

impl SqlChatServerHandler {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        analytics: Arc<dyn AnalyticsEngine>,
        defaults: DatabaseConfig,
    ) -> Self {
        Self {
            controller: ChatController::new(llm, analytics),
            sessions: SessionStore::new(),
            defaults,
        }
    }

    pub fn server_info() -> InitializeResult {
        InitializeResult {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ServerCapabilitiesTools { list_changed: None }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "sqlchat-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("sqlchat: chat with your database".to_string()),
            },
            instructions: Some(
                "Call 'connect' first to open a database and get a session_id, \
                 then send questions with 'chat'. Requests to plot or chart data \
                 return a PNG image."
                    .to_string(),
            ),
            meta: None,
        }
    }

    fn tools() -> Vec<Tool> {
        let mut connect = HashMap::new();
        connect.insert("user".to_string(), property("string", "MySQL user (default: root)"));
        connect.insert(
            "password".to_string(),
            property("string", "MySQL password (default: DB_PASSWORD)"),
        );
        connect.insert("host".to_string(), property("string", "MySQL host (default: localhost)"));
        connect.insert("port".to_string(), property("integer", "MySQL port (default: 3306)"));
        connect.insert(
            "database".to_string(),
            property("string", "Database name (default: Chinook)"),
        );
        connect.insert(
            "path".to_string(),
            property("string", "Path to a DuckDB file, used instead of MySQL"),
        );
        connect.insert(
            "session_id".to_string(),
            property("string", "Existing session to reconnect"),
        );

        let mut chat = HashMap::new();
        chat.insert("session_id".to_string(), property("string", "Session returned by 'connect'"));
        chat.insert(
            "message".to_string(),
            property("string", "Question about the data, e.g. 'How many employees are there?'"),
        );

        let mut session_only = HashMap::new();
        session_only.insert(
            "session_id".to_string(),
            property("string", "Session returned by 'connect'"),
        );

        vec![
            tool(
                "connect",
                "Connect to a database and start (or update) a chat session. \
                 Returns the session_id and the list of tables.",
                &[],
                connect,
            ),
            tool(
                "chat",
                "Ask a question in natural language. Returns a text answer, or a chart \
                 image when the question asks for a plot.",
                &["session_id", "message"],
                chat,
            ),
            tool(
                "history",
                "Return the conversation of a session as JSON, oldest turn first.",
                &["session_id"],
                session_only.clone(),
            ),
            tool(
                "catalog",
                "Return the schema (CREATE TABLE statements with sample rows) of the \
                 session's database.",
                &["session_id"],
                session_only,
            ),
        ]
    }

    async fn session(&self, id: &Uuid) -> Result<SharedSession, CallToolError> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(|| CallToolError::from_message(format!("Unknown session: {}", id)))
    }

    async fn handle_connect_tool(
        &self,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, CallToolError> {
        let args: ConnectArgs = parse_args(arguments)?;

        let mut params = self.defaults.connection_params();
        if let Some(user) = args.user {
            params.user = user;
        }
        if let Some(password) = args.password {
            params.password = password;
        }
        if let Some(host) = args.host {
            params.host = host;
        }
        if let Some(port) = args.port {
            params.port = port;
        }
        if let Some(database) = args.database {
            params.database = database;
        }

        let source = match args.path {
            Some(path) => DataSource::File(path),
            None => DataSource::MySql(params.clone()),
        };
        let read_only = self.defaults.read_only;
        info!(source = ?source, read_only, "connecting");

        let database = tokio::task::spawn_blocking(move || DuckDatabase::open(&source, read_only))
            .await
            .map_err(|e| CallToolError::from_message(format!("Connection task failed: {}", e)))?
            .map_err(|e| {
                error!("Failed to connect: {}", e);
                CallToolError::from_message(format!("Failed to connect: {}", e))
            })?;

        let tables = database.table_names().map_err(|e| {
            error!("Failed to list tables: {}", e);
            CallToolError::from_message(format!("Failed to list tables: {}", e))
        })?;
        let database: Arc<dyn SqlDatabase> = Arc::new(database);

        let session_id = match args.session_id {
            Some(id) => {
                let shared = self.session(&id).await?;
                let mut session = shared.lock().await;
                session.set_read_only(read_only);
                session.connect(params, database);
                id
            }
            None => {
                let mut session = ChatSession::new(params.clone());
                session.set_read_only(read_only);
                session.connect(params, database);
                self.sessions.insert(session).await.0
            }
        };

        let active_sessions = self.sessions.len().await;
        crate::log_event!(
            level: tracing::Level::INFO,
            event: "session_connected",
            session: session_id,
            tables: tables.len(),
            active_sessions: active_sessions
        );

        Ok(tool_result(vec![text_block(format!(
            "Connected.\n\nsession_id: {}\n\nTables: {}",
            session_id,
            tables.join(", ")
        ))]))
    }

    async fn handle_chat_tool(
        &self,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, CallToolError> {
        let args: ChatArgs = parse_args(arguments)?;
        let shared = self.session(&args.session_id).await?;
        let mut session = shared.lock().await;

        let reply = self
            .controller
            .handle_turn(&mut session, &args.message)
            .await
            .map_err(|e| CallToolError::from_message(e.to_string()))?;

        crate::log_event!(
            level: tracing::Level::INFO,
            event: "turn_completed",
            session: args.session_id,
            route: reply.route,
            classification: reply.classification,
            chart: reply.chart.is_some(),
            failure: reply.failure
        );

        let mut content = vec![text_block(reply.text)];
        if let Some(chart) = reply.chart {
            content.push(ContentBlock::ImageContent(ImageContent::new(
                base64::engine::general_purpose::STANDARD.encode(&chart.png),
                "image/png".to_string(),
                None,
                None,
            )));
            content.push(text_block(format!("Chart saved to {}", chart.path.display())));
        }
        Ok(tool_result(content))
    }

    async fn handle_history_tool(
        &self,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, CallToolError> {
        let args: SessionArgs = parse_args(arguments)?;
        let shared = self.session(&args.session_id).await?;
        let session = shared.lock().await;

        let json = serde_json::to_string_pretty(session.history().turns()).map_err(|e| {
            CallToolError::from_message(format!("Failed to serialize history: {}", e))
        })?;
        Ok(tool_result(vec![text_block(json)]))
    }

    async fn handle_catalog_tool(
        &self,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, CallToolError> {
        let args: SessionArgs = parse_args(arguments)?;
        let database = self
            .session(&args.session_id)
            .await?
            .lock()
            .await
            .database()
            .ok_or_else(|| CallToolError::from_message("Session has no database connected"))?;

        let schema = database.table_info(None).map_err(|e| {
            error!("Failed to read catalog: {}", e);
            CallToolError::from_message(format!("Failed to read catalog: {}", e))
        })?;
        Ok(tool_result(vec![text_block(schema)]))
    }
}

#[async_trait]
impl ServerHandler for SqlChatServerHandler {
    async fn handle_list_tools_request(
        &self,
        _request: ListToolsRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> std::result::Result<ListToolsResult, RpcError> {
        Ok(ListToolsResult {
            tools: Self::tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn handle_call_tool_request(
        &self,
        request: CallToolRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> std::result::Result<CallToolResult, CallToolError> {
        info!("Tool called: {}", request.params.name);
        let arguments = request.params.arguments;

        match request.params.name.as_str() {
            "connect" => self.handle_connect_tool(arguments).await,
            "chat" => self.handle_chat_tool(arguments).await,
            "history" => self.handle_history_tool(arguments).await,
            "catalog" => self.handle_catalog_tool(arguments).await,
            _ => Err(CallToolError::unknown_tool(request.params.name.clone())),
        }
    }
}
