use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlchat_chart::ChartAnalyst;
use sqlchat_core::{
    AnalyticsEngine, ChatMessage, ChatModel, ConnectionParams, LlmError, MessageRole,
    TableConnector, VisualizationError,
};
use sqlchat_duck::DuckDatabase;
use uuid::Uuid;

/// Replies from a fixed queue and records every request
struct QueuedLlm {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl QueuedLlm {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for QueuedLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        "queued"
    }
}

fn employee_connector() -> TableConnector {
    let db = DuckDatabase::open_in_memory().unwrap();
    db.execute_batch(
        "CREATE TABLE Employee (EmployeeId INTEGER, LastName VARCHAR, Country VARCHAR);
         INSERT INTO Employee VALUES (1, 'Adams', 'Canada'), (2, 'Edwards', 'Canada'),
                                     (3, 'Peacock', 'Canada'), (4, 'Park', 'USA');
         CREATE TABLE Secret (Name VARCHAR, Salary INTEGER);
         INSERT INTO Secret VALUES ('Adams', 250000);",
    )
    .unwrap();
    TableConnector::new("Employee", ConnectionParams::default(), Arc::new(db))
}

const BAR_PLAN: &str = r#"{"kind": "bar", "sql": "SELECT Country, COUNT(*) AS n FROM data GROUP BY Country ORDER BY Country", "title": "Employees by country", "answer": "Canada has three employees and the USA has one."}"#;

#[tokio::test]
async fn test_bar_chart_written_under_session_dir() {
    let dir = tempfile::tempdir().unwrap();
    let llm = QueuedLlm::new(&[BAR_PLAN]);
    let analyst = ChartAnalyst::new(llm.clone(), dir.path());
    let session = Uuid::new_v4();

    let outcome = analyst
        .analyze("plot employees by country", &employee_connector(), session)
        .await
        .unwrap();

    assert_eq!(outcome.answer, "Canada has three employees and the USA has one.");
    let chart = outcome.chart.expect("chart rendered");
    assert!(chart.path.starts_with(dir.path().join(session.to_string())));
    assert_eq!(chart.path.extension().unwrap(), "png");
    assert_eq!(std::fs::read(&chart.path).unwrap(), chart.png);
    assert_eq!(&chart.png[..4], b"\x89PNG");
    assert_eq!(llm.calls(), 1);

    let first = &llm.requests.lock().unwrap()[0];
    assert_eq!(first[0].role, MessageRole::System);
    assert!(first[0].content.contains("CREATE TABLE \"Employee\""));
    assert!(first[0].content.contains("Query only the relation \"data\""));
    assert!(!first[0].content.contains("Secret"));
    assert_eq!(first[1].content, "plot employees by country");
}

#[tokio::test]
async fn test_sessions_get_separate_directories() {
    let dir = tempfile::tempdir().unwrap();
    let analyst = ChartAnalyst::new(QueuedLlm::new(&[BAR_PLAN, BAR_PLAN]), dir.path());
    let connector = employee_connector();

    let a = analyst.analyze("q", &connector, Uuid::new_v4()).await.unwrap();
    let b = analyst.analyze("q", &connector, Uuid::new_v4()).await.unwrap();

    let a = a.chart.unwrap().path;
    let b = b.chart.unwrap().path;
    assert_ne!(a.parent(), b.parent());
    assert!(a.exists() && b.exists());
}

#[tokio::test]
async fn test_none_plan_answers_without_chart() {
    let dir = tempfile::tempdir().unwrap();
    let analyst = ChartAnalyst::new(
        QueuedLlm::new(&[r#"{"kind": "none", "sql": null, "answer": "There is nothing to plot."}"#]),
        dir.path(),
    );

    let outcome = analyst
        .analyze("draw a unicorn", &employee_connector(), Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(outcome.answer, "There is nothing to plot.");
    assert!(outcome.chart.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_bad_json_is_fed_back_and_retried() {
    let dir = tempfile::tempdir().unwrap();
    let llm = QueuedLlm::new(&["Sure! Here is a bar chart.", BAR_PLAN]);
    let analyst = ChartAnalyst::new(llm.clone(), dir.path());

    let outcome = analyst
        .analyze("plot employees by country", &employee_connector(), Uuid::new_v4())
        .await
        .unwrap();

    assert!(outcome.chart.is_some());
    assert_eq!(llm.calls(), 2);

    let retry = &llm.requests.lock().unwrap()[1];
    assert_eq!(retry.len(), 4);
    assert_eq!(retry[2].role, MessageRole::Assistant);
    assert_eq!(retry[2].content, "Sure! Here is a bar chart.");
    assert!(retry[3].content.starts_with("Error:"));
}

#[tokio::test]
async fn test_failing_query_is_fed_back() {
    let dir = tempfile::tempdir().unwrap();
    let bad = r#"{"kind": "bar", "sql": "SELECT Nation, COUNT(*) FROM data GROUP BY Nation", "answer": "x"}"#;
    let llm = QueuedLlm::new(&[bad, BAR_PLAN]);
    let analyst = ChartAnalyst::new(llm.clone(), dir.path());

    let outcome = analyst
        .analyze("plot employees by country", &employee_connector(), Uuid::new_v4())
        .await
        .unwrap();

    assert!(outcome.chart.is_some());
    let retry = &llm.requests.lock().unwrap()[1];
    assert!(retry[3].content.contains("SQL query failed"));
}

const SECRET_PLAN: &str =
    r#"{"kind": "bar", "sql": "SELECT Name, Salary FROM Secret", "answer": "Adams earns the most."}"#;

#[tokio::test]
async fn test_other_table_is_rejected_and_fed_back() {
    let dir = tempfile::tempdir().unwrap();
    let llm = QueuedLlm::new(&[SECRET_PLAN, BAR_PLAN]);
    let analyst = ChartAnalyst::new(llm.clone(), dir.path());

    let outcome = analyst
        .analyze("plot salaries", &employee_connector(), Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(outcome.answer, "Canada has three employees and the USA has one.");
    assert!(outcome.chart.is_some());
    assert_eq!(llm.calls(), 2);

    let retry = &llm.requests.lock().unwrap()[1];
    assert!(retry[3].content.starts_with("Error:"));
    assert!(retry[3].content.contains("\"Secret\""));
}

#[tokio::test]
async fn test_other_table_never_reaches_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let stacked =
        r#"{"kind": "bar", "sql": "SELECT Country, 1 FROM data; DROP TABLE Secret", "answer": "x"}"#;
    let llm = QueuedLlm::new(&[SECRET_PLAN, stacked, SECRET_PLAN]);
    let analyst = ChartAnalyst::new(llm.clone(), dir.path());
    let connector = employee_connector();

    let err = analyst
        .analyze("plot salaries", &connector, Uuid::new_v4())
        .await
        .unwrap_err();

    assert!(matches!(err, VisualizationError::Planning(ref msg) if msg.contains("Secret")));
    assert_eq!(llm.calls(), 3);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let still_there = connector.database().run("SELECT COUNT(*) FROM Secret").unwrap();
    assert_eq!(still_there.rows[0][0], serde_json::json!(1));
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let dir = tempfile::tempdir().unwrap();
    let llm = QueuedLlm::new(&["nope", "still nope", "no JSON here", BAR_PLAN]);
    let analyst = ChartAnalyst::new(llm.clone(), dir.path());

    let err = analyst
        .analyze("plot employees by country", &employee_connector(), Uuid::new_v4())
        .await
        .unwrap_err();

    assert!(matches!(err, VisualizationError::Planning(_)));
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn test_llm_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let analyst = ChartAnalyst::new(QueuedLlm::new(&[]), dir.path());

    let err = analyst
        .analyze("plot", &employee_connector(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, VisualizationError::Llm(LlmError::EmptyResponse)));
}

#[tokio::test]
async fn test_empty_result_answers_without_chart() {
    let dir = tempfile::tempdir().unwrap();
    let plan = r#"{"kind": "bar", "sql": "SELECT Country, COUNT(*) FROM data WHERE Country = 'Peru' GROUP BY Country", "answer": "No employees are in Peru."}"#;
    let analyst = ChartAnalyst::new(QueuedLlm::new(&[plan]), dir.path());

    let outcome = analyst
        .analyze("plot Peru", &employee_connector(), Uuid::new_v4())
        .await
        .unwrap();
    assert!(outcome.chart.is_none());
    assert_eq!(outcome.answer, "No employees are in Peru.");
}
