//! Keeps chart queries on the bound table
//!
//! Plans read from a single relation, [`DATA_RELATION`], which the analyst
//! defines as a CTE over the connector's table. Any other relation a plan
//! names (a base table, a schema-qualified name, a table function) is
//! rejected before the query runs.

/// Relation every chart query reads from
pub const DATA_RELATION: &str = "data";

/// Words that end a relation in a FROM list instead of aliasing it
const CLAUSE_KEYWORDS: &[&str] = &[
    "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "FETCH", "WINDOW", "QUALIFY",
    "UNION", "EXCEPT", "INTERSECT", "JOIN", "LEFT", "RIGHT", "INNER", "OUTER", "FULL",
    "CROSS", "NATURAL", "POSITIONAL", "ASOF", "ANTI", "SEMI", "ON", "USING", "SAMPLE",
    "TABLESAMPLE", "PIVOT", "UNPIVOT",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Punct(char),
    Literal,
}

impl Token {
    fn ident(&self) -> Option<&str> {
        match self {
            Token::Word(w) | Token::Quoted(w) => Some(w),
            _ => None,
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    fn is_alias(&self) -> bool {
        match self {
            Token::Quoted(_) => true,
            Token::Word(w) => !CLAUSE_KEYWORDS.iter().any(|k| w.eq_ignore_ascii_case(k)),
            _ => false,
        }
    }
}

fn tokenize(sql: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '\'' => {
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                }
                tokens.push(Token::Literal);
            }
            '"' => {
                let mut name = String::new();
                while let Some(q) = chars.next() {
                    if q == '"' {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            name.push('"');
                            continue;
                        }
                        break;
                    }
                    name.push(q);
                }
                tokens.push(Token::Quoted(name));
            }
            '-' if chars.peek() == Some(&'-') => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            '(' | ')' | ',' | '.' | ';' => tokens.push(Token::Punct(c)),
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' || n == '$' {
                        word.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if c.is_ascii_digit() {
                    tokens.push(Token::Literal);
                } else {
                    tokens.push(Token::Word(word));
                }
            }
            _ => tokens.push(Token::Literal),
        }
    }
    tokens
}

/// Index just past the parenthesis group opening at `open`
fn skip_group(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::Punct('(') => depth += 1,
            Token::Punct(')') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

/// Index of the `(` matching the `)` at `close`
fn group_start(tokens: &[Token], close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        match tokens[i] {
            Token::Punct(')') => depth += 1,
            Token::Punct('(') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// A CTE the query defines, visible to references after its body
struct Cte {
    name: String,
    body_end: usize,
}

fn ctes(tokens: &[Token]) -> Vec<Cte> {
    let mut found = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if !token.is_keyword("AS") || i == 0 {
            continue;
        }
        let mut k = i + 1;
        while tokens.get(k).is_some_and(|t| t.is_keyword("NOT") || t.is_keyword("MATERIALIZED")) {
            k += 1;
        }
        if tokens.get(k) != Some(&Token::Punct('(')) {
            continue;
        }

        let name_at = match tokens[i - 1] {
            Token::Punct(')') => group_start(tokens, i - 1).and_then(|open| open.checked_sub(1)),
            _ => Some(i - 1),
        };
        if let Some(name) = name_at.and_then(|at| tokens[at].ident()) {
            found.push(Cte {
                name: name.to_string(),
                body_end: skip_group(tokens, k),
            });
        }
    }
    found
}

/// Relations named after FROM, JOIN or TABLE, with their token positions
fn relations(tokens: &[Token]) -> Vec<(String, usize)> {
    let mut found = Vec::new();
    // one entry per open parenthesis: does it hold a query?
    let mut frames: Vec<bool> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Punct('(') => {
                let query = tokens.get(i + 1).is_some_and(|t| {
                    t.is_keyword("SELECT") || t.is_keyword("WITH") || t.is_keyword("FROM")
                });
                frames.push(query);
            }
            Token::Punct(')') => {
                frames.pop();
            }
            t if t.is_keyword("FROM") || t.is_keyword("JOIN") || t.is_keyword("TABLE") => {
                if frames.last().copied().unwrap_or(true) {
                    relation_list(tokens, i + 1, &mut found);
                }
            }
            _ => {}
        }
    }
    found
}

fn relation_list(tokens: &[Token], start: usize, found: &mut Vec<(String, usize)>) {
    let mut j = start;
    loop {
        if tokens.get(j).is_some_and(|t| t.is_keyword("LATERAL")) {
            j += 1;
        }
        let Some(first) = tokens.get(j).and_then(Token::ident) else {
            return;
        };
        let at = j;
        let mut name = first.to_string();
        j += 1;
        while tokens.get(j) == Some(&Token::Punct('.')) {
            match tokens.get(j + 1).and_then(Token::ident) {
                Some(part) => {
                    name.push('.');
                    name.push_str(part);
                    j += 2;
                }
                None => break,
            }
        }
        found.push((name, at));

        // table function arguments
        if tokens.get(j) == Some(&Token::Punct('(')) {
            j = skip_group(tokens, j);
        }
        if tokens.get(j).is_some_and(|t| t.is_keyword("AS")) {
            j += 2;
        } else if tokens.get(j).is_some_and(Token::is_alias) {
            j += 1;
        }
        // column aliases
        if tokens.get(j) == Some(&Token::Punct('(')) {
            j = skip_group(tokens, j);
        }
        if tokens.get(j) != Some(&Token::Punct(',')) {
            return;
        }
        j += 1;
    }
}

/// Reject queries that read anything other than [`DATA_RELATION`] or
/// their own CTEs
pub(crate) fn check_scope(sql: &str) -> Result<(), String> {
    let tokens = tokenize(sql);
    let defined = ctes(&tokens);

    if let Some(cte) = defined
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(DATA_RELATION))
    {
        return Err(format!("\"sql\" must not define its own \"{}\" CTE", cte.name));
    }

    for (name, at) in relations(&tokens) {
        let visible = name.eq_ignore_ascii_case(DATA_RELATION)
            || defined
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&name) && c.body_end <= at);
        if !visible {
            return Err(format!(
                "\"sql\" may only read the relation \"{}\", found \"{}\"",
                DATA_RELATION, name
            ));
        }
    }
    Ok(())
}

/// Prefix `sql` with the CTE that binds [`DATA_RELATION`] to `table`
pub(crate) fn scoped_query(table: &str, sql: &str) -> String {
    let binding = format!(
        "{} AS (SELECT * FROM \"{}\")",
        DATA_RELATION,
        table.replace('"', "\"\"")
    );
    let sql = sql.trim();

    let mut words = sql.splitn(3, char::is_whitespace);
    let first = words.next().unwrap_or("");
    if !first.eq_ignore_ascii_case("WITH") {
        return format!("WITH {} {}", binding, sql);
    }

    let rest = sql[first.len()..].trim_start();
    match words.next() {
        Some(second) if second.eq_ignore_ascii_case("RECURSIVE") => {
            let rest = rest[second.len()..].trim_start();
            format!("WITH RECURSIVE {}, {}", binding, rest)
        }
        _ => format!("WITH {}, {}", binding, rest),
    }
}
