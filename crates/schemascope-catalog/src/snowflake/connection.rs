//! Live Snowflake connection over `snowflake-api`
//!
//! Authenticates with a password or a key pair and decodes Arrow record
//! batches into [`RowSet`]s. Requires the `snowflake` feature; without it the
//! builder returns a configuration error.
//!
//! Required privileges:
//! - USAGE on the database and schema
//! - SELECT on INFORMATION_SCHEMA views
//!
//! ## Usage
//!
//! ```rust,ignore
//! let conn = SnowflakeConnection::with_password("xy12345.us-east-1", "ANALYST", "password")
//!     .with_warehouse("COMPUTE_WH")
//!     .with_role("ANALYST")
//!     .with_database("ANALYTICS")
//!     .build()?;
//! ```
//!
//! Reference: https://docs.snowflake.com/en/sql-reference/info-schema

use crate::adapter::{IntrospectError, QueryError, RowSet, WarehouseConnection};

#[cfg(feature = "snowflake")]
use crate::adapter::Value;

#[cfg(feature = "snowflake")]
use snowflake_api::SnowflakeApi;

/// Snowflake authentication credentials
#[derive(Clone)]
pub enum SnowflakeCredentials {
    /// Password-based authentication
    Password(String),
    /// Key-pair authentication (PEM format private key)
    PrivateKey(String),
}

impl std::fmt::Debug for SnowflakeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(***)"),
            Self::PrivateKey(_) => f.write_str("PrivateKey(***)"),
        }
    }
}

/// Builder for [`SnowflakeConnection`]
#[derive(Debug, Clone)]
pub struct SnowflakeConnectionBuilder {
    account: String,
    username: String,
    credentials: SnowflakeCredentials,
    warehouse: Option<String>,
    role: Option<String>,
    database: Option<String>,
    schema: Option<String>,
}

impl SnowflakeConnectionBuilder {
    /// Create new builder with password authentication
    pub fn with_password(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(account, username, SnowflakeCredentials::Password(password.into()))
    }

    /// Create new builder with key-pair authentication
    pub fn with_key_pair(
        account: impl Into<String>,
        username: impl Into<String>,
        private_key_pem: impl Into<String>,
    ) -> Self {
        Self::new(account, username, SnowflakeCredentials::PrivateKey(private_key_pem.into()))
    }

    fn new(account: impl Into<String>, username: impl Into<String>, credentials: SnowflakeCredentials) -> Self {
        Self {
            account: account.into(),
            username: username.into(),
            credentials,
            warehouse: None,
            role: None,
            database: None,
            schema: None,
        }
    }

    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// `account/user/role`, the cache scope of the connection
    fn identity(&self) -> String {
        format!(
            "{}/{}/{}",
            self.account.to_lowercase(),
            self.username.to_lowercase(),
            self.role.as_deref().unwrap_or("default").to_lowercase()
        )
    }

    /// Authenticate and build the connection
    #[cfg(feature = "snowflake")]
    pub fn build(self) -> Result<SnowflakeConnection, IntrospectError> {
        let api = match &self.credentials {
            SnowflakeCredentials::Password(password) => SnowflakeApi::with_password_auth(
                &self.account,
                self.warehouse.as_deref(),
                self.database.as_deref(),
                self.schema.as_deref(),
                &self.username,
                self.role.as_deref(),
                password,
            )
            .map_err(|e| {
                IntrospectError::AuthenticationError(format!(
                    "Failed to authenticate with Snowflake: {}",
                    e
                ))
            })?,
            SnowflakeCredentials::PrivateKey(private_key_pem) => SnowflakeApi::with_certificate_auth(
                &self.account,
                self.warehouse.as_deref(),
                self.database.as_deref(),
                self.schema.as_deref(),
                &self.username,
                self.role.as_deref(),
                private_key_pem,
            )
            .map_err(|e| {
                IntrospectError::AuthenticationError(format!(
                    "Failed to authenticate with key-pair: {}",
                    e
                ))
            })?,
        };

        Ok(SnowflakeConnection {
            identity: self.identity(),
            api,
        })
    }

    /// Build without snowflake feature
    #[cfg(not(feature = "snowflake"))]
    pub fn build(self) -> Result<SnowflakeConnection, IntrospectError> {
        Err(IntrospectError::ConfigError(
            "Snowflake support not compiled. Rebuild with: cargo build --features snowflake".to_string(),
        ))
    }
}

/// An authenticated Snowflake session
pub struct SnowflakeConnection {
    identity: String,

    #[cfg(feature = "snowflake")]
    api: SnowflakeApi,
}

impl SnowflakeConnection {
    /// Password authentication (returns builder)
    pub fn with_password(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> SnowflakeConnectionBuilder {
        SnowflakeConnectionBuilder::with_password(account, username, password)
    }

    /// Key-pair authentication (returns builder)
    pub fn with_key_pair(
        account: impl Into<String>,
        username: impl Into<String>,
        private_key_pem: impl Into<String>,
    ) -> SnowflakeConnectionBuilder {
        SnowflakeConnectionBuilder::with_key_pair(account, username, private_key_pem)
    }
}

#[async_trait::async_trait]
impl WarehouseConnection for SnowflakeConnection {
    fn identity(&self) -> &str {
        &self.identity
    }

    #[cfg(feature = "snowflake")]
    async fn query(&self, sql: &str) -> Result<RowSet, QueryError> {
        use snowflake_api::QueryResult;

        let result = self
            .api
            .exec(sql)
            .await
            .map_err(|e| parse_driver_error(&e.to_string()))?;

        match result {
            QueryResult::Arrow(batches) => {
                let mut rows: Option<RowSet> = None;
                for batch in &batches {
                    let set = rows.get_or_insert_with(|| {
                        RowSet::new(batch.schema().fields().iter().map(|f| f.name().clone()))
                    });
                    append_batch(set, batch);
                }
                Ok(rows.unwrap_or_default())
            }
            QueryResult::Json(_) => Err(QueryError::new("Unexpected JSON result format")),
            QueryResult::Empty => Ok(RowSet::default()),
        }
    }

    #[cfg(not(feature = "snowflake"))]
    async fn query(&self, _sql: &str) -> Result<RowSet, QueryError> {
        Err(QueryError::new(
            "Snowflake support not compiled. Rebuild with: cargo build --features snowflake",
        ))
    }
}

#[cfg(feature = "snowflake")]
fn append_batch(set: &mut RowSet, batch: &arrow_array::RecordBatch) {
    for row in 0..batch.num_rows() {
        let values = batch
            .columns()
            .iter()
            .map(|column| arrow_value(column.as_ref(), row))
            .collect();
        set.push_row(values);
    }
}

/// Decode one Arrow cell; unsupported types read as NULL
#[cfg(feature = "snowflake")]
fn arrow_value(array: &dyn arrow_array::Array, row: usize) -> Value {
    use arrow_array::cast::AsArray;
    use arrow_array::types::{
        Decimal128Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    };
    use arrow_schema::DataType;

    if array.is_null(row) {
        return Value::Null;
    }

    match array.data_type() {
        DataType::Utf8 => Value::Text(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::Text(array.as_string::<i64>().value(row).to_string()),
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),
        DataType::Int8 => Value::Int(i64::from(array.as_primitive::<Int8Type>().value(row))),
        DataType::Int16 => Value::Int(i64::from(array.as_primitive::<Int16Type>().value(row))),
        DataType::Int32 => Value::Int(i64::from(array.as_primitive::<Int32Type>().value(row))),
        DataType::Int64 => Value::Int(array.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => Value::Float(f64::from(array.as_primitive::<Float32Type>().value(row))),
        DataType::Float64 => Value::Float(array.as_primitive::<Float64Type>().value(row)),
        DataType::Decimal128(_, scale) => {
            let raw = array.as_primitive::<Decimal128Type>().value(row);
            if *scale == 0 {
                i64::try_from(raw).map(Value::Int).unwrap_or(Value::Float(raw as f64))
            } else {
                Value::Float(raw as f64 / 10f64.powi(i32::from(*scale)))
            }
        }
        other => {
            tracing::debug!(data_type = %other, "Unsupported Arrow type in catalog result");
            Value::Null
        }
    }
}

/// Extract the vendor error number and SQLSTATE from a driver message
///
/// Understands both `Code: \`90030\`` and `090030 (22000): ...` forms.
pub fn parse_driver_error(message: &str) -> QueryError {
    let code = code_after_label(message).or_else(|| leading_code(message));
    let sql_state = sql_state(message);

    QueryError {
        code,
        sql_state,
        message: message.to_string(),
    }
}

fn digits(s: &str) -> Option<i64> {
    let run: String = s.chars().take_while(char::is_ascii_digit).collect();
    if run.len() >= 5 {
        run.parse().ok()
    } else {
        None
    }
}

fn code_after_label(message: &str) -> Option<i64> {
    let start = message.find("Code: ")? + "Code: ".len();
    digits(message[start..].trim_start_matches('`'))
}

fn leading_code(message: &str) -> Option<i64> {
    digits(message.trim_start())
}

fn sql_state(message: &str) -> Option<String> {
    message.match_indices('(').find_map(|(idx, _)| {
        let candidate = message.get(idx + 1..idx + 6)?;
        let closed = message[idx + 6..].starts_with(')');
        (closed && candidate.chars().all(|c| c.is_ascii_alphanumeric())).then(|| candidate.to_string())
    })
}
