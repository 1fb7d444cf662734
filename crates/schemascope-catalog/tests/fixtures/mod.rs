//! Synthetic warehouse results for integration tests
//!
//! Rows mirror what Snowflake returns from `INFORMATION_SCHEMA.COLUMNS` and the
//! `SHOW ... KEYS` commands for a small e-commerce schema:
//! - `ORDERS` (primary key `ID`, identity column, clustered)
//! - `CUSTOMERS` (primary key `ID`)
//! - `ORDER_LINES` (composite primary key)

#![allow(dead_code)]

use schemascope_catalog::{MockConnection, RowSet, TemplateName, Value};

pub const COLUMN_FIELDS: [&str; 12] = [
    "TABLE_NAME",
    "COLUMN_NAME",
    "DATA_TYPE",
    "CHARACTER_MAXIMUM_LENGTH",
    "NUMERIC_PRECISION",
    "NUMERIC_SCALE",
    "IS_NULLABLE",
    "COLUMN_DEFAULT",
    "IS_IDENTITY",
    "COMMENT",
    "IDENTITY_START",
    "IDENTITY_INCREMENT",
];

/// One `INFORMATION_SCHEMA.COLUMNS` row
#[derive(Debug, Clone)]
pub struct ColumnFixture {
    pub table: &'static str,
    pub column: &'static str,
    pub data_type: &'static str,
    pub char_length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    pub nullable: bool,
    pub default: Option<&'static str>,
    pub identity: Option<(i64, i64)>,
    pub comment: Option<&'static str>,
}

impl ColumnFixture {
    pub fn new(table: &'static str, column: &'static str, data_type: &'static str) -> Self {
        Self {
            table,
            column,
            data_type,
            char_length: None,
            precision: None,
            scale: None,
            nullable: true,
            default: None,
            identity: None,
            comment: None,
        }
    }

    pub fn numeric(mut self, precision: i64, scale: i64) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn length(mut self, length: i64) -> Self {
        self.char_length = Some(length);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn identity(mut self, start: i64, increment: i64) -> Self {
        self.identity = Some((start, increment));
        self
    }

    pub fn comment(mut self, comment: &'static str) -> Self {
        self.comment = Some(comment);
        self
    }

    pub fn to_row(&self) -> Vec<Value> {
        let flag = |b: bool| Value::from(if b { "YES" } else { "NO" });
        vec![
            self.table.into(),
            self.column.into(),
            self.data_type.into(),
            self.char_length.into(),
            self.precision.into(),
            self.scale.into(),
            flag(self.nullable),
            self.default.into(),
            flag(self.identity.is_some()),
            self.comment.into(),
            self.identity.map(|(start, _)| start).into(),
            self.identity.map(|(_, increment)| increment).into(),
        ]
    }
}

/// A column listing result from fixtures
pub fn column_rows<'a>(columns: impl IntoIterator<Item = &'a ColumnFixture>) -> RowSet {
    columns
        .into_iter()
        .fold(RowSet::new(COLUMN_FIELDS), |set, column| set.with_row(column.to_row()))
}

pub fn orders_columns() -> Vec<ColumnFixture> {
    vec![
        ColumnFixture::new("ORDERS", "ID", "NUMBER")
            .numeric(38, 0)
            .not_null()
            .identity(1, 1)
            .comment("Surrogate key"),
        ColumnFixture::new("ORDERS", "CUSTOMER_ID", "NUMBER").numeric(38, 0).not_null(),
        ColumnFixture::new("ORDERS", "SYS_CLUSTERING_COLUMN_0", "VARCHAR").length(16),
        ColumnFixture::new("ORDERS", "TOTAL_AMOUNT", "NUMBER").numeric(10, 2),
        ColumnFixture::new("ORDERS", "STATUS", "TEXT").length(32),
        ColumnFixture::new("ORDERS", "DISCOUNT_RATE", "FLOAT").numeric(38, 6),
        ColumnFixture::new("ORDERS", "PLACED_AT", "TIMESTAMP_NTZ").not_null(),
    ]
}

pub fn customers_columns() -> Vec<ColumnFixture> {
    vec![
        ColumnFixture::new("CUSTOMERS", "ID", "NUMBER").numeric(38, 0).not_null(),
        ColumnFixture::new("CUSTOMERS", "EMAIL", "TEXT").length(256).not_null(),
        ColumnFixture::new("CUSTOMERS", "PROFILE", "VARIANT"),
    ]
}

pub fn order_lines_columns() -> Vec<ColumnFixture> {
    vec![
        ColumnFixture::new("ORDER_LINES", "ORDER_ID", "NUMBER").numeric(38, 0).not_null(),
        ColumnFixture::new("ORDER_LINES", "LINE_NO", "NUMBER").numeric(38, 0).not_null(),
        ColumnFixture::new("ORDER_LINES", "SKU", "TEXT").length(64),
    ]
}

pub fn all_columns() -> Vec<ColumnFixture> {
    let mut columns = orders_columns();
    columns.extend(customers_columns());
    columns.extend(order_lines_columns());
    columns
}

pub fn primary_key_rows() -> RowSet {
    RowSet::new(["table_name", "column_name", "key_sequence", "constraint_name"])
        .with_row(vec!["ORDERS".into(), "ID".into(), 1i64.into(), "PK_ORDERS".into()])
        .with_row(vec!["CUSTOMERS".into(), "ID".into(), 1i64.into(), "PK_CUSTOMERS".into()])
        .with_row(vec!["ORDER_LINES".into(), "LINE_NO".into(), 2i64.into(), "PK_ORDER_LINES".into()])
        .with_row(vec!["ORDER_LINES".into(), "ORDER_ID".into(), 1i64.into(), "PK_ORDER_LINES".into()])
}

pub fn table_name_rows() -> RowSet {
    RowSet::new(["TABLE_NAME"])
        .with_row(vec!["CUSTOMERS".into()])
        .with_row(vec!["ORDER_LINES".into()])
        .with_row(vec!["ORDERS".into()])
}

pub fn context_rows() -> RowSet {
    RowSet::new(["DATABASE_NAME", "SCHEMA_NAME"]).with_row(vec!["ANALYTICS".into(), "PUBLIC".into()])
}

/// A connection serving the whole fixture schema through the bulk path
pub fn ecommerce_connection() -> MockConnection {
    let conn = MockConnection::new();
    conn.on(TemplateName::CurrentContext, context_rows());
    conn.on(TemplateName::TableNames, table_name_rows());
    conn.on(TemplateName::TransientTableNames, table_name_rows());
    conn.on(TemplateName::PrimaryKeys, primary_key_rows());
    conn.on(TemplateName::SchemaColumns, column_rows(&all_columns()));
    conn
}

/// Serve the per-table query for one table
pub fn serve_table_columns(conn: &MockConnection, table: &str, columns: &[ColumnFixture]) {
    let pattern = format!("ic.table_name = '{}'", table);
    conn.on_pattern(pattern, column_rows(columns));
}
