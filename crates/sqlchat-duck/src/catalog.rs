//! Schema introspection and prompt-ready schema text

use duckdb::{Connection, Result as DuckResult};

use crate::value::value_to_json;

/// Sample rows appended under each table definition
const SAMPLE_ROWS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

/// Base tables of the current catalog, in name order
pub(crate) fn table_names(conn: &Connection) -> DuckResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_catalog = current_database() \
           AND table_schema NOT IN ('information_schema', 'pg_catalog') \
           AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<DuckResult<Vec<_>>>()?;
    Ok(names)
}

pub(crate) fn columns(conn: &Connection, table_name: &str) -> DuckResult<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(
        "SELECT column_name, data_type, is_nullable \
         FROM information_schema.columns \
         WHERE table_catalog = current_database() AND table_name = ? \
         ORDER BY ordinal_position",
    )?;
    let columns = stmt
        .query_map([table_name], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                data_type: row.get(1)?,
                is_nullable: row.get::<_, String>(2)? == "YES",
            })
        })?
        .collect::<DuckResult<Vec<_>>>()?;
    Ok(columns)
}

/// `CREATE TABLE` block plus a commented sample of rows
pub(crate) fn table_info(conn: &Connection, table_name: &str) -> DuckResult<String> {
    let columns = columns(conn, table_name)?;

    let mut text = format!("CREATE TABLE {} (\n", quote_ident(table_name));
    let defs: Vec<String> = columns
        .iter()
        .map(|c| {
            let null = if c.is_nullable { "" } else { " NOT NULL" };
            format!("\t{} {}{}", quote_ident(&c.name), c.data_type, null)
        })
        .collect();
    text.push_str(&defs.join(",\n"));
    text.push_str("\n)\n\n/*\n");

    let sample_sql = format!(
        "SELECT * FROM {} LIMIT {}",
        quote_ident(table_name),
        SAMPLE_ROWS
    );
    let mut stmt = conn.prepare(&sample_sql)?;
    let mut rows = stmt.query([])?;
    let mut sample = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            cells.push(match value_to_json(row.get_ref(idx)?) {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => "None".to_string(),
                other => other.to_string(),
            });
        }
        sample.push(cells.join("\t"));
    }

    text.push_str(&format!(
        "{} rows from {} table:\n",
        SAMPLE_ROWS, table_name
    ));
    let header: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    text.push_str(&header.join("\t"));
    for line in sample {
        text.push('\n');
        text.push_str(&line);
    }
    text.push_str("\n*/");

    Ok(text)
}

/// Double-quote an identifier, escaping embedded quotes
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Employee"), "\"Employee\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }
}
