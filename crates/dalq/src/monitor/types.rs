use std::collections::BTreeMap;

/// The type of SQL statement being handed to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    /// DDL, transaction control, anything else.
    Other,
}

impl QueryType {
    /// Classify a statement by its leading keyword.
    ///
    /// Whitespace, comments and opening parentheses before the keyword are
    /// ignored. A `WITH` statement is classified by the first top-level
    /// keyword after its common table expressions.
    pub fn from_sql(sql: &str) -> Self {
        let body = skip_noise(sql);
        let word = leading_word(body);
        if word.eq_ignore_ascii_case("WITH") {
            return Self::after_ctes(&body[word.len()..]);
        }
        Self::keyword(word).unwrap_or(QueryType::Other)
    }

    fn keyword(word: &str) -> Option<Self> {
        [
            ("SELECT", QueryType::Select),
            ("INSERT", QueryType::Insert),
            ("UPDATE", QueryType::Update),
            ("DELETE", QueryType::Delete),
        ]
        .into_iter()
        .find(|(keyword, _)| word.eq_ignore_ascii_case(keyword))
        .map(|(_, kind)| kind)
    }

    fn after_ctes(sql: &str) -> Self {
        let mut depth = 0usize;
        let mut quoted = false;
        let mut word = String::new();

        for c in sql.chars().chain(std::iter::once(' ')) {
            if c == '\'' {
                quoted = !quoted;
            }
            if depth == 0 && !quoted && is_word_char(c) {
                word.push(c);
                continue;
            }
            if let Some(kind) = Self::keyword(&word) {
                return kind;
            }
            word.clear();
            match c {
                '(' if !quoted => depth += 1,
                ')' if !quoted => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        QueryType::Select
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn skip_noise(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return sql;
        }
    }
}

fn leading_word(sql: &str) -> &str {
    let end = sql.find(|c: char| !is_word_char(c)).unwrap_or(sql.len());
    &sql[..end]
}

/// Which connection entry point received the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Prepare,
    Query,
}

/// What a hook learns about one statement.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// Id of the connection the statement was handed to.
    pub connection: String,
    pub operation: Operation,
    pub sql: String,
    pub query_type: QueryType,
    /// Optional structured fields (low-cardinality).
    pub fields: BTreeMap<String, String>,
}

impl QueryContext {
    pub fn new(connection: &str, operation: Operation, sql: &str) -> Self {
        Self {
            connection: connection.to_string(),
            operation,
            sql: sql.to_string(),
            query_type: QueryType::from_sql(sql),
            fields: BTreeMap::new(),
        }
    }

    /// Add a structured field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Observer called before each statement reaches the driver.
pub trait SqlHook: Send + Sync {
    fn before_statement(&self, ctx: &QueryContext);
}
