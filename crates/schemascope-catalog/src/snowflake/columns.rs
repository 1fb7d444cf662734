//! Column fetching: schema-wide bulk path and single-table fallback
//!
//! Both paths read the same result shape and feed every row through one
//! [`ColumnBuilder`], so a table fetched either way yields identical
//! descriptors.

use schemascope_core::{
    ident, ColumnDescriptor, Diagnostic, DiagnosticCode, Identity, IntrospectionSettings,
    ObjectRef, PrimaryKeyMap, SchemaLocation, Severity, TableColumns,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::adapter::{
    classify_query_error, IntrospectError, QueryErrorClass, Row, RowSet, SchemaColumns,
    WarehouseConnection,
};
use crate::queries::{Bindings, QueryTemplates, TemplateName};

use super::run_template;
use super::types::{self, TypeMetadata};

/// One row of the column listing, with names normalized
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRow {
    pub table: String,
    pub column: String,
    pub vendor_type: String,
    pub metadata: TypeMetadata,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub is_identity: bool,
    pub comment: Option<String>,
    pub identity_start: Option<i64>,
    pub identity_increment: Option<i64>,
}

impl ColumnRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self, IntrospectError> {
        Ok(Self {
            table: ident::normalize_stored(&row.text("table_name")?),
            column: ident::normalize_stored(&row.text("column_name")?),
            vendor_type: row.text("data_type")?,
            metadata: TypeMetadata {
                char_length: row.opt_u32("character_maximum_length"),
                precision: row.opt_u32("numeric_precision"),
                scale: row.opt_u32("numeric_scale"),
            },
            nullable: row.flag("is_nullable"),
            default_value: row.opt_text("column_default"),
            is_identity: row.flag("is_identity"),
            comment: row.opt_text("comment"),
            identity_start: row.opt_i64("identity_start"),
            identity_increment: row.opt_i64("identity_increment"),
        })
    }
}

/// Turns column rows into descriptors, collecting diagnostics on the way
pub struct ColumnBuilder<'a> {
    location: &'a SchemaLocation,
    settings: &'a IntrospectionSettings,
    primary_keys: &'a PrimaryKeyMap,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ColumnBuilder<'a> {
    pub fn new(
        location: &'a SchemaLocation,
        settings: &'a IntrospectionSettings,
        primary_keys: &'a PrimaryKeyMap,
    ) -> Self {
        Self {
            location,
            settings,
            primary_keys,
            diagnostics: Vec::new(),
        }
    }

    /// Build a descriptor; `None` for clustering pseudo-columns
    pub fn build(&mut self, row: ColumnRow) -> Option<ColumnDescriptor> {
        if self.settings.is_clustering_column(&row.column) {
            debug!(table = %row.table, column = %row.column, "Skipping clustering column");
            return None;
        }

        let resolution = types::resolve(&row.vendor_type, row.metadata);
        if !resolution.is_recognized() {
            warn!(
                vendor_type = %row.vendor_type,
                column = %row.column,
                table = %row.table,
                "Unrecognized vendor type, using opaque type"
            );
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::UnrecognizedVendorType,
                    Severity::Warn,
                    format!(
                        "Did not recognize type '{}' of column '{}'",
                        row.vendor_type, row.column
                    ),
                )
                .with_object(ObjectRef::column(
                    self.location.to_string(),
                    row.table.as_str(),
                    row.column.as_str(),
                ))
                .with_vendor_type(row.vendor_type.as_str()),
            );
        }

        let is_primary_key = self
            .primary_keys
            .get(&row.table)
            .map(|pk| pk.constrained_columns.contains(&row.column))
            .unwrap_or(false);

        let identity = row.is_identity.then(|| Identity {
            start: row.identity_start.unwrap_or(1),
            increment: row.identity_increment.unwrap_or(1),
        });

        Some(ColumnDescriptor {
            display_type: types::display_type(&row.vendor_type, row.metadata),
            canonical_type: resolution.into_type(),
            name: row.column,
            nullable: row.nullable,
            default_value: row.default_value,
            is_autoincrement: row.is_identity,
            identity,
            comment: row.comment,
            is_primary_key,
        })
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Group a column listing into per-table sequences, preserving row order
///
/// A table whose only rows are clustering pseudo-columns still gets an
/// (empty) entry.
fn group_columns(
    rows: &RowSet,
    builder: &mut ColumnBuilder<'_>,
) -> Result<BTreeMap<String, TableColumns>, IntrospectError> {
    let mut tables: BTreeMap<String, TableColumns> = BTreeMap::new();

    for row in rows.rows() {
        let row = ColumnRow::from_row(&row)?;
        let columns = tables.entry(row.table.clone()).or_default();
        if let Some(column) = builder.build(row) {
            columns.columns.push(column);
        }
    }

    Ok(tables)
}

/// Columns of every table in a schema
///
/// Returns [`SchemaColumns::TooLarge`] when the warehouse rejects the bulk
/// query with an oversized-result error; every other failure propagates.
pub async fn fetch_schema_columns(
    conn: &dyn WarehouseConnection,
    templates: &QueryTemplates,
    settings: &IntrospectionSettings,
    location: &SchemaLocation,
    primary_keys: &PrimaryKeyMap,
) -> Result<(SchemaColumns, Vec<Diagnostic>), IntrospectError> {
    let rows = match run_template(conn, templates, TemplateName::SchemaColumns, &Bindings::schema(location)).await {
        Ok(rows) => rows,
        Err(IntrospectError::Query(err))
            if classify_query_error(&err, settings) == QueryErrorClass::OversizedResult =>
        {
            info!(
                schema = %location,
                error = %err,
                "Schema column listing too large, falling back to per-table queries"
            );
            let diagnostic = Diagnostic::new(
                DiagnosticCode::OversizedSchemaResult,
                Severity::Info,
                format!("Schema-wide column query for {} was too large: {}", location, err),
            )
            .with_object(ObjectRef::schema(location.to_string()));
            return Ok((SchemaColumns::TooLarge, vec![diagnostic]));
        }
        Err(err) => return Err(err),
    };

    let mut builder = ColumnBuilder::new(location, settings, primary_keys);
    let tables = group_columns(&rows, &mut builder)?;
    debug!(schema = %location, tables = tables.len(), "Fetched schema columns");

    Ok((SchemaColumns::Fetched(tables), builder.into_diagnostics()))
}

/// Columns of one table via the per-table query
pub async fn fetch_table_columns(
    conn: &dyn WarehouseConnection,
    templates: &QueryTemplates,
    settings: &IntrospectionSettings,
    location: &SchemaLocation,
    table: &str,
    primary_keys: &PrimaryKeyMap,
) -> Result<(TableColumns, Vec<Diagnostic>), IntrospectError> {
    let rows = run_template(
        conn,
        templates,
        TemplateName::TableColumns,
        &Bindings::table(location, table),
    )
    .await?;

    if rows.is_empty() {
        return Err(IntrospectError::NoSuchTable(format!("{}.{}", location, table)));
    }

    let mut builder = ColumnBuilder::new(location, settings, primary_keys);
    let mut columns = TableColumns::new();
    for row in rows.rows() {
        if let Some(column) = builder.build(ColumnRow::from_row(&row)?) {
            columns.columns.push(column);
        }
    }

    Ok((columns, builder.into_diagnostics()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{QueryError, Value};
    use crate::mock::MockConnection;
    use schemascope_core::{BaseType, CanonicalType, KeyInfo};

    const COLUMNS: [&str; 12] = [
        "table_name",
        "column_name",
        "data_type",
        "character_maximum_length",
        "numeric_precision",
        "numeric_scale",
        "is_nullable",
        "column_default",
        "is_identity",
        "comment",
        "identity_start",
        "identity_increment",
    ];

    fn row(table: &str, column: &str, data_type: &str) -> Vec<Value> {
        vec![
            table.into(),
            column.into(),
            data_type.into(),
            Value::Null,
            Value::Null,
            Value::Null,
            "YES".into(),
            Value::Null,
            "NO".into(),
            Value::Null,
            Value::Null,
            Value::Null,
        ]
    }

    fn location() -> SchemaLocation {
        SchemaLocation::new("ANALYTICS", "PUBLIC")
    }

    fn orders_pk() -> PrimaryKeyMap {
        let mut keys = PrimaryKeyMap::new();
        keys.insert(
            "orders".to_string(),
            KeyInfo {
                constrained_columns: vec!["id".to_string()],
                name: Some("pk_orders".to_string()),
            },
        );
        keys
    }

    #[test]
    fn test_identity_columns() {
        let rows = RowSet::new(COLUMNS).with_row(vec![
            "ORDERS".into(),
            "ID".into(),
            "NUMBER".into(),
            Value::Null,
            38i64.into(),
            0i64.into(),
            "NO".into(),
            "IDENTITY START 100 INCREMENT 5".into(),
            "YES".into(),
            "surrogate key".into(),
            100i64.into(),
            5i64.into(),
        ]);
        let settings = IntrospectionSettings::default();
        let location = location();
        let keys = orders_pk();
        let mut builder = ColumnBuilder::new(&location, &settings, &keys);

        let row = rows.rows().next().unwrap();
        let column = builder.build(ColumnRow::from_row(&row).unwrap()).unwrap();

        assert_eq!(column.name, "id");
        assert!(!column.nullable);
        assert!(column.is_autoincrement);
        assert!(column.is_primary_key);
        assert_eq!(column.identity, Some(Identity { start: 100, increment: 5 }));
        assert_eq!(column.display_type, "NUMBER(38,0)");
        assert_eq!(column.comment.as_deref(), Some("surrogate key"));
        assert!(builder.into_diagnostics().is_empty());
    }

    #[test]
    fn test_unrecognized_type_records_diagnostic() {
        let rows = RowSet::new(COLUMNS).with_row(row("EVENTS", "PAYLOAD", "HYPERLOGLOG"));
        let settings = IntrospectionSettings::default();
        let location = location();
        let keys = PrimaryKeyMap::new();
        let mut builder = ColumnBuilder::new(&location, &settings, &keys);

        let row = rows.rows().next().unwrap();
        let column = builder.build(ColumnRow::from_row(&row).unwrap()).unwrap();
        assert!(column.canonical_type.is_opaque());
        assert!(!column.is_primary_key);

        let diagnostics = builder.into_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::UnrecognizedVendorType);
        assert_eq!(diagnostics[0].vendor_type.as_deref(), Some("HYPERLOGLOG"));
        let object = diagnostics[0].object.as_ref().unwrap();
        assert_eq!(object.column.as_deref(), Some("payload"));
        assert!(diagnostics[0].message.contains("HYPERLOGLOG"));
        assert!(diagnostics[0].message.contains("payload"));
    }

    #[tokio::test]
    async fn test_schema_columns_grouped_in_row_order() {
        let conn = MockConnection::new();
        conn.on(
            TemplateName::SchemaColumns,
            RowSet::new(COLUMNS)
                .with_row(row("ORDERS", "ID", "NUMBER"))
                .with_row(row("ORDERS", "SYS_CLUSTERING_COLUMN_0", "VARCHAR"))
                .with_row(row("ORDERS", "PLACED_AT", "TIMESTAMP_NTZ"))
                .with_row(row("ONLY_CLUSTERED", "SYS_CLUSTERING_COLUMN_0", "VARCHAR"))
                .with_row(row("CUSTOMERS", "NAME", "TEXT")),
        );

        let (columns, diagnostics) = fetch_schema_columns(
            &conn,
            &QueryTemplates::snowflake(),
            &IntrospectionSettings::default(),
            &location(),
            &orders_pk(),
        )
        .await
        .unwrap();

        assert!(diagnostics.is_empty());
        let orders = columns.table("orders").unwrap();
        assert_eq!(orders.column_names(), vec!["id", "placed_at"]);
        assert!(orders.columns[0].is_primary_key);
        assert!(!orders.columns[1].is_primary_key);
        assert!(columns.table("only_clustered").unwrap().is_empty());
        assert_eq!(
            columns.table("customers").unwrap().columns[0].canonical_type,
            CanonicalType::CharacterOrBinary {
                base: BaseType::Varchar,
                length: None,
            }
        );
    }

    #[tokio::test]
    async fn test_oversized_result_is_sentinel() {
        let conn = MockConnection::new();
        conn.fail_on(
            TemplateName::SchemaColumns,
            QueryError::with_code(90030, "Information schema query returned too much data"),
        );

        let (columns, diagnostics) = fetch_schema_columns(
            &conn,
            &QueryTemplates::snowflake(),
            &IntrospectionSettings::default(),
            &location(),
            &PrimaryKeyMap::new(),
        )
        .await
        .unwrap();

        assert!(columns.is_too_large());
        assert_eq!(diagnostics[0].code, DiagnosticCode::OversizedSchemaResult);
    }

    #[tokio::test]
    async fn test_other_errors_propagate() {
        let conn = MockConnection::new();
        conn.fail_on(
            TemplateName::SchemaColumns,
            QueryError::with_code(3001, "Insufficient privileges"),
        );

        let result = fetch_schema_columns(
            &conn,
            &QueryTemplates::snowflake(),
            &IntrospectionSettings::default(),
            &location(),
            &PrimaryKeyMap::new(),
        )
        .await;

        match result {
            Err(IntrospectError::Query(err)) => assert_eq!(err.code, Some(3001)),
            other => panic!("expected query error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_table_missing_is_no_such_table() {
        let conn = MockConnection::new();
        conn.on(TemplateName::TableColumns, RowSet::new(COLUMNS));

        let result = fetch_table_columns(
            &conn,
            &QueryTemplates::snowflake(),
            &IntrospectionSettings::default(),
            &location(),
            "ghost",
            &PrimaryKeyMap::new(),
        )
        .await;

        assert!(matches!(result, Err(IntrospectError::NoSuchTable(name)) if name == "analytics.public.ghost"));
    }
}
