//! DuckDB-backed database handle for sqlchat
//!
//! A MySQL source is attached through DuckDB's `mysql` extension; a DuckDB
//! file or an in-memory database can be used directly.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use duckdb::Connection;
use sqlchat_core::{ConnectionParams, DatabaseError, QueryResult, SqlDatabase};
use thiserror::Error;

mod catalog;
mod value;

/// Catalog alias used for an attached MySQL database
const ATTACH_ALIAS: &str = "src";

#[derive(Debug, Error)]
pub enum DuckError {
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Failed to attach MySQL database '{database}': {message}")]
    Attach { database: String, message: String },

    #[error("Connection lock poisoned")]
    Poisoned,
}

impl From<DuckError> for DatabaseError {
    fn from(err: DuckError) -> Self {
        match err {
            DuckError::Attach { .. } | DuckError::Poisoned => {
                DatabaseError::Connection(err.to_string())
            }
            DuckError::Database(e) => DatabaseError::Query(e.to_string()),
        }
    }
}

/// Where the session's data lives
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Remote MySQL server attached through the `mysql` extension
    MySql(ConnectionParams),
    /// Local DuckDB database file
    File(PathBuf),
    InMemory,
}

pub struct DuckDatabase {
    conn: Mutex<Connection>,
    dialect: String,
}

impl DuckDatabase {
    /// Open a connection for the given source
    pub fn open(source: &DataSource, read_only: bool) -> Result<Self, DuckError> {
        match source {
            DataSource::MySql(params) => Self::open_mysql(params, read_only),
            DataSource::File(path) => {
                let conn = if read_only {
                    let config = duckdb::Config::default()
                        .access_mode(duckdb::AccessMode::ReadOnly)?;
                    Connection::open_with_flags(path, config)?
                } else {
                    Connection::open(path)?
                };
                tracing::info!(path = %path.display(), read_only, "opened DuckDB file");
                Ok(Self::from_connection(conn, "DuckDB"))
            }
            DataSource::InMemory => Ok(Self::from_connection(
                Connection::open_in_memory()?,
                "DuckDB",
            )),
        }
    }

    /// Attach a MySQL database and make it the default catalog
    pub fn open_mysql(params: &ConnectionParams, read_only: bool) -> Result<Self, DuckError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("INSTALL mysql; LOAD mysql;")
            .map_err(|e| DuckError::Attach {
                database: params.database.clone(),
                message: format!("mysql extension unavailable: {}", e),
            })?;

        let options = if read_only { "TYPE mysql, READ_ONLY" } else { "TYPE mysql" };
        let attach = format!(
            "ATTACH '{}' AS {} ({}); USE {};",
            mysql_connection_string(params).replace('\'', "''"),
            ATTACH_ALIAS,
            options,
            ATTACH_ALIAS
        );
        conn.execute_batch(&attach).map_err(|e| DuckError::Attach {
            database: params.database.clone(),
            message: e.to_string(),
        })?;

        tracing::info!(
            host = %params.host,
            port = params.port,
            database = %params.database,
            read_only,
            "attached MySQL database"
        );
        Ok(Self::from_connection(conn, "MySQL"))
    }

    pub fn open_in_memory() -> Result<Self, DuckError> {
        Self::open(&DataSource::InMemory, false)
    }

    pub fn from_connection(conn: Connection, dialect: impl Into<String>) -> Self {
        Self {
            conn: Mutex::new(conn),
            dialect: dialect.into(),
        }
    }

    /// Run setup statements (DDL, inserts) directly
    pub fn execute_batch(&self, sql: &str) -> Result<(), DuckError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    /// Execute a statement and collect every row as JSON cells
    pub fn query(&self, sql: &str) -> Result<QueryResult, DuckError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;

        let columns: Vec<String> = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();
        let mut result_rows = Vec::new();
        while let Some(row) = rows.next()? {
            let mut json_row = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                json_row.push(value::value_to_json(row.get_ref(i)?));
            }
            result_rows.push(json_row);
        }

        Ok(QueryResult {
            columns,
            row_count: result_rows.len(),
            rows: result_rows,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DuckError> {
        self.conn.lock().map_err(|_| DuckError::Poisoned)
    }
}

impl SqlDatabase for DuckDatabase {
    fn dialect(&self) -> &str {
        &self.dialect
    }

    fn table_names(&self) -> Result<Vec<String>, DatabaseError> {
        let conn = self.lock()?;
        catalog::table_names(&conn).map_err(|e| DatabaseError::Schema(e.to_string()))
    }

    fn table_info(&self, tables: Option<&[String]>) -> Result<String, DatabaseError> {
        let conn = self.lock()?;
        let names = match tables {
            Some(names) => names.to_vec(),
            None => catalog::table_names(&conn).map_err(|e| DatabaseError::Schema(e.to_string()))?,
        };

        let mut blocks = Vec::with_capacity(names.len());
        for name in &names {
            let block = catalog::table_info(&conn, name)
                .map_err(|e| DatabaseError::Schema(format!("{}: {}", name, e)))?;
            blocks.push(block);
        }
        Ok(blocks.join("\n\n"))
    }

    fn run(&self, sql: &str) -> Result<QueryResult, DatabaseError> {
        Ok(self.query(sql)?)
    }
}

/// libmysql-style `key=value` connection string
pub fn mysql_connection_string(params: &ConnectionParams) -> String {
    let mut parts = vec![
        format!("host={}", params.host),
        format!("port={}", params.port),
        format!("user={}", params.user),
        format!("database={}", params.database),
    ];
    if !params.password.is_empty() {
        parts.push(format!("password={}", params.password));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chinook() -> DuckDatabase {
        let db = DuckDatabase::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE Employee (EmployeeId INTEGER NOT NULL, LastName VARCHAR, Country VARCHAR);
             INSERT INTO Employee VALUES (1, 'Adams', 'Canada'), (2, 'Edwards', 'Canada'),
                                         (3, 'Peacock', 'Canada'), (4, 'Park', 'USA');
             CREATE TABLE Track (TrackId INTEGER, Name VARCHAR, UnitPrice DECIMAL(10,2));
             INSERT INTO Track VALUES (1, 'For Those About To Rock', 0.99);",
        )
        .unwrap();
        db
    }

    #[test]
    fn test_table_names() {
        let db = chinook();
        assert_eq!(db.table_names().unwrap(), vec!["Employee", "Track"]);
    }

    #[test]
    fn test_table_info_has_ddl_and_samples() {
        let db = chinook();
        let info = db.table_info(Some(&["Employee".to_string()])).unwrap();

        assert!(info.starts_with("CREATE TABLE \"Employee\" ("));
        assert!(info.contains("\"EmployeeId\" INTEGER NOT NULL"));
        assert!(info.contains("\"LastName\" VARCHAR,"));
        assert!(info.contains("3 rows from Employee table:"));
        assert!(info.contains("1\tAdams\tCanada"));
        assert!(!info.contains("Park"), "only three sample rows");
        assert!(!info.contains("Track"));
    }

    #[test]
    fn test_table_info_all_tables() {
        let info = chinook().table_info(None).unwrap();
        assert!(info.contains("CREATE TABLE \"Employee\""));
        assert!(info.contains("CREATE TABLE \"Track\""));
    }

    #[test]
    fn test_run_query() {
        let db = chinook();
        let result = db
            .run("SELECT Country, COUNT(*) AS n FROM Employee GROUP BY Country ORDER BY n DESC")
            .unwrap();

        assert_eq!(result.columns, vec!["Country", "n"]);
        assert_eq!(result.row_count, 2);
        assert_eq!(result.rows[0][0], serde_json::json!("Canada"));
        assert_eq!(result.rows[0][1], serde_json::json!(3));
    }

    #[test]
    fn test_decimal_becomes_number() {
        let result = chinook().run("SELECT UnitPrice FROM Track").unwrap();
        assert_eq!(result.rows[0][0], serde_json::json!(0.99));
    }

    #[test]
    fn test_empty_result_keeps_columns() {
        let result = chinook()
            .run("SELECT LastName FROM Employee WHERE Country = 'Peru'")
            .unwrap();
        assert_eq!(result.columns, vec!["LastName"]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_hugeint_beyond_i64_becomes_string() {
        let db = chinook();
        db.execute_batch(
            "CREATE TABLE Big (v BIGINT);
             INSERT INTO Big VALUES (9223372036854775807), (9223372036854775807),
                                    (9223372036854775807);",
        )
        .unwrap();

        let result = db.run("SELECT SUM(v) AS total FROM Big").unwrap();
        assert_eq!(result.rows[0][0], serde_json::json!("27670116110564327421"));

        // small HUGEINT sums stay numeric
        let result = db.run("SELECT SUM(EmployeeId) FROM Employee").unwrap();
        assert_eq!(result.rows[0][0], serde_json::json!(10));

        // connection is still usable afterwards
        let result = db.run("SELECT 1 AS one").unwrap();
        assert_eq!(result.rows[0][0], serde_json::json!(1));
    }

    #[test]
    fn test_bad_sql_is_query_error() {
        let err = chinook().run("SELEC nonsense").unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[test]
    fn test_mysql_connection_string() {
        let params = ConnectionParams {
            user: "root".to_string(),
            password: "root123".to_string(),
            host: "localhost".to_string(),
            port: 3306,
            database: "Chinook".to_string(),
        };
        assert_eq!(
            mysql_connection_string(&params),
            "host=localhost port=3306 user=root database=Chinook password=root123"
        );

        let no_password = ConnectionParams::default();
        assert!(!mysql_connection_string(&no_password).contains("password"));
    }
}
