//! Prompt templates for the four pipeline calls
//!
//! Placeholders are `{name}` tokens filled by [`render`] in a single pass, so
//! braces inside substituted values (schema text, SQL) are never re-expanded.

/// Plotting check. Sees only the current question.
pub const CLASSIFY_TEMPLATE: &str = r#"You are a data visualization expert at a company. You are interacting with a user who is asking you questions about the company's database.
Decide whether the user's question asks for a plot or chart.

Write only the Boolean Response and nothing else. Do not wrap the Boolean Response in any other text, not even backticks or space.

For example:
Question: Plot a histogram of countries showing GDP, using different colors for each bar.
Boolean Response:True
Question: Create a line chart of sales over time?
Boolean Response:True
Question: How many employees are there?
Boolean Response:False

Your turn:

Question: {question}
Boolean Response:"#;

/// Table prediction for the visualization branch
pub const TABLE_TEMPLATE: &str = r#"You are a data analyst at a company. You are interacting with a user who is asking you questions about the company's database.
Based on the table schema below, extract the table name that would answer the user's question. Take the conversation history into account.

<SCHEMA>{schema}</SCHEMA>

Conversation History: {chat_history}

Write only the table name and nothing else. Do not wrap the table name in any other text, not even backticks or space.

For example:
Question: which 3 artists have the most tracks?
Table Name:Track
Question: Name 10 artists
Table Name:Artist

Your turn:

Question: {question}
Table Name:"#;

/// SQL generation
pub const SQL_TEMPLATE: &str = r#"You are a data analyst at a company. You are interacting with a user who is asking you questions about the company's database.
Based on the table schema below, write a {dialect} query that would answer the user's question. Take the conversation history into account.

<SCHEMA>{schema}</SCHEMA>

Conversation History: {chat_history}

Write only the SQL query and nothing else. Do not wrap the SQL query in any other text, not even backticks.

For example:
Question: which 3 artists have the most tracks?
SQL Query: SELECT ArtistId, COUNT(*) as track_count FROM Track GROUP BY ArtistId ORDER BY track_count DESC LIMIT 3;
Question: Name 10 artists
SQL Query: SELECT Name FROM Artist LIMIT 10;

Your turn:

Question: {question}
SQL Query:"#;

/// Natural-language answer from the SQL result
pub const ANSWER_TEMPLATE: &str = r#"You are a data analyst at a company. You are interacting with a user who is asking you questions about the company's database.
Based on the table schema below, question, sql query, and sql response, write a natural language response.
<SCHEMA>{schema}</SCHEMA>

Conversation History: {chat_history}
SQL Query: <SQL>{query}</SQL>
User question: {question}
SQL Response: {response}"#;

/// Fill `{name}` placeholders from `vars`
///
/// Unknown placeholders are left as-is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
