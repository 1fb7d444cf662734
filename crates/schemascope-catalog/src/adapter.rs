//! Connection seam, error taxonomy, and the introspector trait

use schemascope_core::{
    ident, Diagnostic, ForeignKeyInfo, ForeignKeyMap, IntrospectionSettings, KeyInfo,
    PrimaryKeyMap, SchemaLocation, TableColumns, UniqueConstraintMap,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::queries::TemplateName;

/// A single value in a query result
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text form of any non-null value
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }

    /// Integer form; numbers reported as text or integral floats are accepted
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::Float(_) => None,
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                })
            }
        }
    }

    /// Flag form; accepts `YES/NO`, `Y/N`, `TRUE/FALSE` and `1/0`
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Float(f) => Some(*f != 0.0),
            Self::Text(s) => match s.trim().to_uppercase().as_str() {
                "YES" | "Y" | "TRUE" | "T" | "1" => Some(true),
                "NO" | "N" | "FALSE" | "F" | "0" => Some(false),
                _ => None,
            },
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Tabular result of one query
///
/// Rows shorter than the column list read as NULL in the missing positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Create an empty result with the given column names
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row (builder style)
    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    /// Append a row
    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Iterate over rows in result order
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            set: self,
            values: values.as_slice(),
        })
    }
}

/// Borrowed view of one result row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    set: &'a RowSet,
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Value of a named column
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.set.column_index(name).and_then(|idx| self.values.get(idx))
    }

    /// Value at a position
    pub fn at(&self, idx: usize) -> Option<&'a Value> {
        self.values.get(idx)
    }

    /// Required, non-null text column
    pub fn text(&self, name: &str) -> Result<String, IntrospectError> {
        self.opt_text(name).ok_or_else(|| {
            IntrospectError::InvalidResponse(format!("Missing value for column '{}'", name))
        })
    }

    pub fn opt_text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(Value::as_text)
    }

    pub fn text_at(&self, idx: usize) -> Option<String> {
        self.at(idx).and_then(Value::as_text)
    }

    pub fn opt_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn opt_u32(&self, name: &str) -> Option<u32> {
        self.opt_i64(name).and_then(|v| u32::try_from(v).ok())
    }

    /// Flag column; NULL or unrecognized text reads as false
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_flag).unwrap_or(false)
    }
}

/// Error reported by a warehouse connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    /// Vendor error number, e.g. 90030
    pub code: Option<i64>,

    /// SQLSTATE
    pub sql_state: Option<String>,

    /// Driver message
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            sql_state: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            sql_state: None,
            message: message.into(),
        }
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.sql_state) {
            (Some(code), Some(state)) => write!(f, "{:06} ({}): {}", code, state, self.message),
            (Some(code), None) => write!(f, "{:06}: {}", code, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for QueryError {}

/// Errors surfaced by introspection
#[derive(Debug, Clone, thiserror::Error)]
pub enum IntrospectError {
    #[error("No such table: {0}")]
    NoSuchTable(String),

    #[error("Query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),
}

/// How a failed query is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorClass {
    /// The result exceeded the warehouse budget; switch to per-table fetching
    OversizedResult,

    /// Anything else; propagate unchanged
    Fatal,
}

/// Classify a query failure by its vendor error code
pub fn classify_query_error(err: &QueryError, settings: &IntrospectionSettings) -> QueryErrorClass {
    match err.code {
        Some(code) if settings.is_oversized_code(code) => QueryErrorClass::OversizedResult,
        _ => QueryErrorClass::Fatal,
    }
}

/// An open, authenticated warehouse connection
///
/// Connection lifecycle, credentials and retries belong to the caller.
#[async_trait::async_trait]
pub trait WarehouseConnection: Send + Sync {
    /// Stable identity used to scope cache entries (e.g. account/user/role)
    fn identity(&self) -> &str;

    /// Execute one statement and return all rows
    async fn query(&self, sql: &str) -> Result<RowSet, QueryError>;
}

/// Options for listing tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TableNameOptions {
    /// Include transient tables
    pub include_transient_tables: bool,

    /// List external tables instead of ordinary ones (wins over transient)
    pub external_tables: bool,
}

impl TableNameOptions {
    pub fn transient() -> Self {
        Self {
            include_transient_tables: true,
            external_tables: false,
        }
    }

    pub fn external() -> Self {
        Self {
            include_transient_tables: false,
            external_tables: true,
        }
    }

    /// The single query template these options select
    pub fn template(&self) -> TemplateName {
        if self.external_tables {
            TemplateName::ExternalTableNames
        } else if self.include_transient_tables {
            TemplateName::TransientTableNames
        } else {
            TemplateName::TableNames
        }
    }
}

/// Options for listing views
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ViewNameOptions {
    /// List materialized views instead of ordinary ones
    pub materialized_views: bool,
}

impl ViewNameOptions {
    pub fn materialized() -> Self {
        Self { materialized_views: true }
    }

    pub fn template(&self) -> TemplateName {
        if self.materialized_views {
            TemplateName::MaterializedViewNames
        } else {
            TemplateName::ViewNames
        }
    }
}

/// Result of the schema-wide column fetch
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaColumns {
    /// Columns of every table, keyed by normalized table name
    Fetched(BTreeMap<String, TableColumns>),

    /// The warehouse refused the bulk query as too large
    TooLarge,
}

impl SchemaColumns {
    pub fn is_too_large(&self) -> bool {
        matches!(self, Self::TooLarge)
    }

    /// Columns of one table, if fetched
    pub fn table(&self, table: &str) -> Option<&TableColumns> {
        match self {
            Self::Fetched(tables) => tables.get(&ident::normalize(table)),
            Self::TooLarge => None,
        }
    }
}

/// A view's definition text, or why it could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewDefinition {
    Available(String),
    Unavailable { reason: String },
}

impl ViewDefinition {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Available(text) => Some(text),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Available(text) => Some(text),
            Self::Unavailable { .. } => None,
        }
    }
}

/// The session's current database and schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Normalized current database
    pub database: String,

    /// Normalized current schema, if one is selected
    pub schema: Option<String>,
}

/// Catalog introspection for one warehouse dialect
///
/// All table and view names are accepted in any case and normalized before use.
#[async_trait::async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Dialect name (e.g. "Snowflake")
    fn dialect(&self) -> &'static str;

    /// Current database and schema of the connection
    async fn session_context(&self) -> Result<SessionContext, IntrospectError>;

    /// Resolve an optional schema name against the session's database
    async fn resolve_location(&self, schema: Option<&str>) -> Result<SchemaLocation, IntrospectError> {
        let context = self.session_context().await?;
        let schema = match schema {
            Some(schema) => schema.to_string(),
            None => context.schema.ok_or_else(|| {
                IntrospectError::ConfigError(
                    "No schema given and the session has no current schema".to_string(),
                )
            })?,
        };
        Ok(SchemaLocation::new(&context.database, &schema))
    }

    /// The session's current schema
    async fn current_location(&self) -> Result<SchemaLocation, IntrospectError> {
        self.resolve_location(None).await
    }

    async fn table_names(
        &self,
        location: &SchemaLocation,
        options: TableNameOptions,
    ) -> Result<Vec<String>, IntrospectError>;

    async fn view_names(
        &self,
        location: &SchemaLocation,
        options: ViewNameOptions,
    ) -> Result<Vec<String>, IntrospectError>;

    async fn view_definition(
        &self,
        location: &SchemaLocation,
        view: &str,
    ) -> Result<ViewDefinition, IntrospectError>;

    async fn table_comment(
        &self,
        location: &SchemaLocation,
        table: &str,
    ) -> Result<Option<String>, IntrospectError>;

    async fn primary_keys(&self, location: &SchemaLocation) -> Result<Arc<PrimaryKeyMap>, IntrospectError>;

    async fn foreign_keys(&self, location: &SchemaLocation) -> Result<Arc<ForeignKeyMap>, IntrospectError>;

    async fn unique_constraints(
        &self,
        location: &SchemaLocation,
    ) -> Result<Arc<UniqueConstraintMap>, IntrospectError>;

    /// Primary key of one table; empty when the table has none
    async fn pk_constraint(&self, location: &SchemaLocation, table: &str) -> Result<KeyInfo, IntrospectError> {
        let keys = self.primary_keys(location).await?;
        Ok(keys.get(&ident::normalize(table)).cloned().unwrap_or_default())
    }

    async fn foreign_keys_for(
        &self,
        location: &SchemaLocation,
        table: &str,
    ) -> Result<Vec<ForeignKeyInfo>, IntrospectError> {
        let keys = self.foreign_keys(location).await?;
        Ok(keys.get(&ident::normalize(table)).cloned().unwrap_or_default())
    }

    async fn unique_constraints_for(
        &self,
        location: &SchemaLocation,
        table: &str,
    ) -> Result<Vec<KeyInfo>, IntrospectError> {
        let keys = self.unique_constraints(location).await?;
        Ok(keys.get(&ident::normalize(table)).cloned().unwrap_or_default())
    }

    /// Columns of every table in a schema, or `TooLarge`
    async fn columns_for_schema(&self, location: &SchemaLocation) -> Result<Arc<SchemaColumns>, IntrospectError>;

    /// Columns of one table via the per-table query
    async fn columns_for_table(
        &self,
        location: &SchemaLocation,
        table: &str,
    ) -> Result<TableColumns, IntrospectError>;

    /// Columns of one table
    ///
    /// Uses the schema-wide fetch and falls back to the per-table query when
    /// the warehouse rejects the schema-wide result as too large.
    async fn columns(&self, location: &SchemaLocation, table: &str) -> Result<TableColumns, IntrospectError> {
        let table = ident::normalize(table);
        match self.columns_for_schema(location).await?.as_ref() {
            SchemaColumns::TooLarge => self.columns_for_table(location, &table).await,
            SchemaColumns::Fetched(tables) => tables
                .get(&table)
                .cloned()
                .ok_or_else(|| IntrospectError::NoSuchTable(format!("{}.{}", location, table))),
        }
    }

    /// Diagnostics recorded so far
    fn diagnostics(&self) -> Vec<Diagnostic>;

    /// Drain recorded diagnostics
    fn take_diagnostics(&self) -> Vec<Diagnostic>;

    /// Drop every cached result (start a new introspection session)
    fn reset_cache(&self);
}
