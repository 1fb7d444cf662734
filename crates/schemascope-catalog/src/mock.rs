//! Scripted warehouse connection for testing
//!
//! [`MockConnection`] answers queries from a list of rules instead of talking
//! to a warehouse. A rule matches when the query text contains its pattern;
//! the most recently added matching rule wins, and unmatched queries return an
//! empty result. Every default query template carries a
//! `/* schemascope:<name> */` marker, so rules are usually keyed by
//! [`TemplateName`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! let conn = MockConnection::new();
//! conn.on(
//!     TemplateName::TableNames,
//!     RowSet::new(["TABLE_NAME"]).with_row(vec!["ORDERS".into()]),
//! );
//! conn.fail_on(
//!     TemplateName::SchemaColumns,
//!     QueryError::with_code(90030, "Information schema query returned too much data"),
//! );
//!
//! let introspector = SnowflakeIntrospector::new(Arc::new(conn.clone()));
//! ```
//!
//! ## Simulating Failures
//!
//! ```rust,ignore
//! // Every query fails
//! let conn = MockConnection::builder().connection_failure().build();
//!
//! // 100ms delay per query
//! let conn = MockConnection::builder().latency_ms(100).build();
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::adapter::{QueryError, RowSet, WarehouseConnection};
use crate::queries::TemplateName;

#[derive(Debug, Clone)]
enum Reply {
    Rows(RowSet),
    Error(QueryError),
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    reply: Reply,
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<Rule>,
    log: Vec<String>,
}

/// Scripted warehouse connection
///
/// Clones share rules and the query log.
#[derive(Clone)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    identity: String,
    latency: Option<Duration>,
    fail_connection: bool,
}

impl MockConnection {
    /// Create a connection with no rules
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            identity: "mock".to_string(),
            latency: None,
            fail_connection: false,
        }
    }

    pub fn builder() -> MockConnectionBuilder {
        MockConnectionBuilder::default()
    }

    /// Answer queries generated from a template
    pub fn on(&self, template: TemplateName, rows: RowSet) {
        self.add_rule(template.marker(), Reply::Rows(rows));
    }

    /// Fail queries generated from a template
    pub fn fail_on(&self, template: TemplateName, error: QueryError) {
        self.add_rule(template.marker(), Reply::Error(error));
    }

    /// Answer queries containing `pattern`
    pub fn on_pattern(&self, pattern: impl Into<String>, rows: RowSet) {
        self.add_rule(pattern.into(), Reply::Rows(rows));
    }

    /// Fail queries containing `pattern`
    pub fn fail_on_pattern(&self, pattern: impl Into<String>, error: QueryError) {
        self.add_rule(pattern.into(), Reply::Error(error));
    }

    /// Drop all rules and the query log
    pub fn reset(&self) {
        let mut state = self.lock();
        state.rules.clear();
        state.log.clear();
    }

    /// Every query received, in order
    pub fn query_log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    /// Total number of queries received
    pub fn query_count(&self) -> usize {
        self.lock().log.len()
    }

    /// Number of queries generated from a template
    pub fn queries_matching(&self, template: TemplateName) -> usize {
        self.queries_containing(&template.marker())
    }

    /// Number of queries containing `pattern`
    pub fn queries_containing(&self, pattern: &str) -> usize {
        self.lock().log.iter().filter(|sql| sql.contains(pattern)).count()
    }

    fn add_rule(&self, pattern: String, reply: Reply) {
        self.lock().rules.push(Rule { pattern, reply });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reply_for(&self, sql: &str) -> Reply {
        let mut state = self.lock();
        state.log.push(sql.to_string());
        state
            .rules
            .iter()
            .rev()
            .find(|rule| sql.contains(&rule.pattern))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| Reply::Rows(RowSet::default()))
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WarehouseConnection for MockConnection {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn query(&self, sql: &str) -> Result<RowSet, QueryError> {
        let reply = self.reply_for(sql);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.fail_connection {
            return Err(QueryError::new("Mock connection failure"));
        }

        match reply {
            Reply::Rows(rows) => Ok(rows),
            Reply::Error(err) => Err(err),
        }
    }
}

/// Fluent construction of a [`MockConnection`]
#[derive(Debug, Default)]
pub struct MockConnectionBuilder {
    identity: Option<String>,
    latency: Option<Duration>,
    fail_connection: bool,
    rules: Vec<Rule>,
}

impl MockConnectionBuilder {
    /// Connection identity (cache scope); defaults to `mock`
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Delay every query
    pub fn latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency = Some(Duration::from_millis(latency_ms));
        self
    }

    /// Fail every query
    pub fn connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    pub fn on(mut self, template: TemplateName, rows: RowSet) -> Self {
        self.rules.push(Rule {
            pattern: template.marker(),
            reply: Reply::Rows(rows),
        });
        self
    }

    pub fn fail_on(mut self, template: TemplateName, error: QueryError) -> Self {
        self.rules.push(Rule {
            pattern: template.marker(),
            reply: Reply::Error(error),
        });
        self
    }

    pub fn build(self) -> MockConnection {
        MockConnection {
            state: Arc::new(Mutex::new(MockState {
                rules: self.rules,
                log: Vec::new(),
            })),
            identity: self.identity.unwrap_or_else(|| "mock".to_string()),
            latency: self.latency,
            fail_connection: self.fail_connection,
        }
    }
}
