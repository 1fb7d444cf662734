//! Integration tests for schema introspection
//!
//! These tests drive [`SnowflakeIntrospector`] through a scripted
//! [`MockConnection`]. Tests requiring a live warehouse are marked with
//! `#[ignore]` and can be run with `cargo test -- --ignored`.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all non-ignored tests (no credentials required)
//! cargo test -p schemascope-catalog --test integration_tests
//!
//! # Run Snowflake integration tests
//! SNOWFLAKE_ACCOUNT=xy12345 \
//! SNOWFLAKE_USER=user \
//! SNOWFLAKE_PASSWORD=pass \
//! SNOWFLAKE_DATABASE=ANALYTICS \
//! SNOWFLAKE_SCHEMA=PUBLIC \
//! cargo test -p schemascope-catalog --features snowflake --test integration_tests -- --ignored
//! ```

mod fixtures;

use fixtures::*;
use pretty_assertions::assert_eq;
use schemascope_catalog::{
    IntrospectError, MockConnection, QueryError, RowSet, SchemaIntrospector, SnowflakeIntrospector,
    TableNameOptions, TemplateName,
};
use schemascope_core::{BaseType, CanonicalType, SchemaLocation};
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

fn introspector(conn: &MockConnection) -> SnowflakeIntrospector {
    SnowflakeIntrospector::new(Arc::new(conn.clone()))
}

fn location() -> SchemaLocation {
    SchemaLocation::new("ANALYTICS", "PUBLIC")
}

fn oversized() -> QueryError {
    QueryError::with_code(90030, "Information schema query returned too much data")
        .with_sql_state("22000")
}

/// Check if Snowflake credentials are available
#[cfg(feature = "snowflake")]
fn has_snowflake_credentials() -> bool {
    std::env::var("SNOWFLAKE_ACCOUNT").is_ok()
}

// =============================================================================
// Bulk Column Fetch
// =============================================================================

#[tokio::test]
async fn test_every_listed_table_has_columns_in_ordinal_order() {
    let conn = ecommerce_connection();
    let introspector = introspector(&conn);
    let location = introspector.current_location().await.unwrap();

    let tables = introspector
        .table_names(&location, TableNameOptions::default())
        .await
        .unwrap();
    assert_eq!(tables, vec!["customers", "order_lines", "orders"]);

    for table in &tables {
        let columns = introspector.columns(&location, table).await.unwrap();
        assert!(!columns.is_empty(), "{table} has no columns");
    }

    let orders = introspector.columns(&location, "orders").await.unwrap();
    assert_eq!(
        orders.column_names(),
        vec!["id", "customer_id", "total_amount", "status", "discount_rate", "placed_at"]
    );

    // one bulk query serves every table
    assert_eq!(conn.queries_matching(TemplateName::SchemaColumns), 1);
    assert_eq!(conn.queries_matching(TemplateName::TableColumns), 0);
}

#[tokio::test]
async fn test_number_with_precision_and_scale_is_numeric() {
    let conn = ecommerce_connection();
    let introspector = introspector(&conn);

    let orders = introspector.columns(&location(), "ORDERS").await.unwrap();
    let amount = orders.find_column("total_amount").unwrap();

    assert_eq!(
        amount.canonical_type,
        CanonicalType::Numeric {
            base: BaseType::Decimal,
            precision: Some(10),
            scale: Some(2),
        }
    );
    assert_eq!(amount.display_type, "NUMBER(10,2)");

    let rate = orders.find_column("discount_rate").unwrap();
    assert_eq!(
        rate.canonical_type,
        CanonicalType::Float {
            base: BaseType::Float,
            precision: Some(38),
            decimal_return_scale: Some(6),
        }
    );
}

#[tokio::test]
async fn test_primary_key_membership() {
    let conn = ecommerce_connection();
    let introspector = introspector(&conn);

    let orders = introspector.columns(&location(), "orders").await.unwrap();
    assert!(orders.find_column("id").unwrap().is_primary_key);
    assert!(!orders.find_column("customer_id").unwrap().is_primary_key);

    let lines = introspector.columns(&location(), "order_lines").await.unwrap();
    assert_eq!(lines.primary_key_columns(), vec!["order_id", "line_no"]);

    let pk = introspector.pk_constraint(&location(), "ORDER_LINES").await.unwrap();
    assert_eq!(pk.constrained_columns, vec!["order_id", "line_no"]);
    assert_eq!(pk.name.as_deref(), Some("pk_order_lines"));
}

#[tokio::test]
async fn test_identity_columns_carry_sequence() {
    let conn = ecommerce_connection();
    let introspector = introspector(&conn);

    let orders = introspector.columns(&location(), "orders").await.unwrap();
    let id = orders.find_column("id").unwrap();
    assert!(id.is_autoincrement);
    assert_eq!(id.identity.map(|i| (i.start, i.increment)), Some((1, 1)));
    assert_eq!(id.comment.as_deref(), Some("Surrogate key"));

    let customer_id = orders.find_column("customer_id").unwrap();
    assert!(!customer_id.is_autoincrement);
    assert_eq!(customer_id.identity, None);
}

#[tokio::test]
async fn test_clustering_columns_are_excluded() {
    let conn = ecommerce_connection();
    let introspector = introspector(&conn);

    let orders = introspector.columns(&location(), "orders").await.unwrap();
    assert!(orders
        .iter()
        .all(|c| !c.name.starts_with("sys_clustering_column")));
}

#[tokio::test]
async fn test_missing_table_is_no_such_table() {
    let conn = ecommerce_connection();
    let introspector = introspector(&conn);

    let result = introspector.columns(&location(), "ghost").await;
    match result {
        Err(IntrospectError::NoSuchTable(name)) => assert_eq!(name, "analytics.public.ghost"),
        other => panic!("expected NoSuchTable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tables_without_keys_get_defaults() {
    let conn = ecommerce_connection();
    let introspector = introspector(&conn);

    let pk = introspector.pk_constraint(&location(), "no_keys").await.unwrap();
    assert!(pk.constrained_columns.is_empty());
    assert_eq!(pk.name, None);
    assert!(introspector.foreign_keys_for(&location(), "orders").await.unwrap().is_empty());
    assert!(introspector
        .unique_constraints_for(&location(), "orders")
        .await
        .unwrap()
        .is_empty());
}

// =============================================================================
// Oversized Results and Fallback
// =============================================================================

#[tokio::test]
async fn test_oversized_result_returns_sentinel() {
    let conn = ecommerce_connection();
    conn.fail_on(TemplateName::SchemaColumns, oversized());
    let introspector = introspector(&conn);

    let columns = introspector.columns_for_schema(&location()).await.unwrap();
    assert!(columns.is_too_large());
}

#[tokio::test]
async fn test_other_query_errors_are_fatal() {
    let conn = ecommerce_connection();
    conn.fail_on(
        TemplateName::SchemaColumns,
        QueryError::with_code(3001, "Insufficient privileges to operate on schema 'PUBLIC'"),
    );
    let introspector = introspector(&conn);

    let result = introspector.columns(&location(), "orders").await;
    match result {
        Err(IntrospectError::Query(err)) => {
            assert_eq!(err.code, Some(3001));
            assert!(err.message.contains("Insufficient privileges"));
        }
        other => panic!("expected query error, got {:?}", other),
    }
    assert_eq!(conn.queries_matching(TemplateName::TableColumns), 0);
}

#[tokio::test]
async fn test_fallback_matches_bulk_output() {
    let bulk_conn = ecommerce_connection();
    let bulk = introspector(&bulk_conn)
        .columns(&location(), "orders")
        .await
        .unwrap();

    let fallback_conn = ecommerce_connection();
    fallback_conn.fail_on(TemplateName::SchemaColumns, oversized());
    serve_table_columns(&fallback_conn, "ORDERS", &orders_columns());
    let fallback_introspector = introspector(&fallback_conn);
    let fallback = fallback_introspector
        .columns(&location(), "orders")
        .await
        .unwrap();

    assert_eq!(bulk, fallback);
    assert_eq!(fallback_conn.queries_matching(TemplateName::TableColumns), 1);

    // the sentinel is cached: a second table does not retry the bulk query
    serve_table_columns(&fallback_conn, "CUSTOMERS", &customers_columns());
    fallback_introspector.columns(&location(), "customers").await.unwrap();
    assert_eq!(fallback_conn.queries_matching(TemplateName::SchemaColumns), 1);

    let diagnostics = fallback_introspector.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code.as_str(), "OVERSIZED_SCHEMA_RESULT");
}

#[tokio::test]
async fn test_fallback_missing_table_is_no_such_table() {
    let conn = ecommerce_connection();
    conn.fail_on(TemplateName::SchemaColumns, oversized());
    let introspector = introspector(&conn);

    let result = introspector.columns(&location(), "ghost").await;
    assert!(matches!(result, Err(IntrospectError::NoSuchTable(_))));
}

#[tokio::test]
async fn test_fallback_table_query_errors_are_fatal() {
    let conn = ecommerce_connection();
    conn.fail_on(TemplateName::SchemaColumns, oversized());
    conn.fail_on_pattern(
        "ic.table_name = 'CUSTOMERS'",
        QueryError::with_code(2003, "Object 'CUSTOMERS' does not exist or not authorized"),
    );
    serve_table_columns(&conn, "ORDERS", &orders_columns());
    let introspector = introspector(&conn);

    assert!(introspector.columns(&location(), "orders").await.is_ok());
    let result = introspector.columns(&location(), "customers").await;
    assert!(matches!(result, Err(IntrospectError::Query(err)) if err.code == Some(2003)));
}

#[tokio::test]
async fn test_lowercase_table_resolves_on_fallback_path() {
    let conn = MockConnection::new();
    conn.on(
        TemplateName::TableNames,
        RowSet::new(["TABLE_NAME"])
            .with_row(vec!["events".into()])
            .with_row(vec!["EVENTS".into()]),
    );
    conn.fail_on(TemplateName::SchemaColumns, oversized());
    serve_table_columns(&conn, "events", &[ColumnFixture::new("events", "payload", "VARIANT")]);
    serve_table_columns(
        &conn,
        "EVENTS",
        &[ColumnFixture::new("EVENTS", "ID", "NUMBER").numeric(38, 0)],
    );
    let introspector = introspector(&conn);

    let tables = introspector
        .table_names(&location(), TableNameOptions::default())
        .await
        .unwrap();
    assert_eq!(tables, vec!["\"events\"", "events"]);

    let quoted = introspector.columns(&location(), &tables[0]).await.unwrap();
    assert_eq!(quoted.column_names(), vec!["\"payload\""]);
    let folded = introspector.columns(&location(), &tables[1]).await.unwrap();
    assert_eq!(folded.column_names(), vec!["id"]);

    assert_eq!(conn.queries_containing("ic.table_name = 'events'"), 1);
    assert_eq!(conn.queries_containing("ic.table_name = 'EVENTS'"), 1);
}

#[tokio::test]
async fn test_bulk_path_keeps_case_sensitive_tables_apart() {
    let conn = MockConnection::new();
    conn.on(
        TemplateName::SchemaColumns,
        column_rows(&[
            ColumnFixture::new("ORDERS", "ID", "NUMBER").numeric(38, 0),
            ColumnFixture::new("orders", "legacy_id", "TEXT").length(16),
        ]),
    );
    let introspector = introspector(&conn);

    let folded = introspector.columns(&location(), "orders").await.unwrap();
    assert_eq!(folded.column_names(), vec!["id"]);

    let quoted = introspector.columns(&location(), "\"orders\"").await.unwrap();
    assert_eq!(quoted.column_names(), vec!["\"legacy_id\""]);

    // A quoted spelling of a folded name is the same table
    let same = introspector.columns(&location(), "\"ORDERS\"").await.unwrap();
    assert_eq!(same, folded);
}

// =============================================================================
// Cache
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_issue_one_query() {
    let conn = MockConnection::builder().latency_ms(50).build();
    conn.on(TemplateName::PrimaryKeys, primary_key_rows());
    conn.on(TemplateName::SchemaColumns, column_rows(&all_columns()));
    let introspector = Arc::new(introspector(&conn));

    let mut handles = Vec::new();
    for table in ["orders", "customers", "order_lines", "orders"] {
        let introspector = Arc::clone(&introspector);
        handles.push(tokio::spawn(async move {
            introspector.columns(&location(), table).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(conn.queries_matching(TemplateName::SchemaColumns), 1);
    assert_eq!(conn.queries_matching(TemplateName::PrimaryKeys), 1);

    let stats = introspector.cache().stats();
    assert!(stats.hits() >= 3);
}

#[tokio::test]
async fn test_cache_is_scoped_by_schema() {
    let conn = ecommerce_connection();
    let introspector = introspector(&conn);
    let staging = SchemaLocation::new("ANALYTICS", "STAGING");

    introspector.primary_keys(&location()).await.unwrap();
    introspector.primary_keys(&staging).await.unwrap();
    introspector.primary_keys(&location()).await.unwrap();
    assert_eq!(conn.queries_matching(TemplateName::PrimaryKeys), 2);

    introspector.invalidate_schema(&location());
    introspector.primary_keys(&location()).await.unwrap();
    introspector.primary_keys(&staging).await.unwrap();
    assert_eq!(conn.queries_matching(TemplateName::PrimaryKeys), 3);
}

#[tokio::test]
async fn test_shared_cache_across_introspectors() {
    let conn = ecommerce_connection();
    let first = introspector(&conn);
    let second = introspector(&conn).with_cache(Arc::clone(first.cache()));

    first.columns(&location(), "orders").await.unwrap();
    second.columns(&location(), "customers").await.unwrap();

    assert_eq!(conn.queries_matching(TemplateName::SchemaColumns), 1);
}

// =============================================================================
// Live Snowflake (requires credentials)
// =============================================================================

#[tokio::test]
#[ignore]
#[cfg(feature = "snowflake")]
async fn test_snowflake_live_introspection() {
    use schemascope_catalog::SnowflakeConnection;

    if !has_snowflake_credentials() {
        eprintln!("Skipping: SNOWFLAKE_ACCOUNT not set");
        return;
    }

    let env = |name: &str| std::env::var(name).unwrap_or_default();
    let mut builder =
        SnowflakeConnection::with_password(env("SNOWFLAKE_ACCOUNT"), env("SNOWFLAKE_USER"), env("SNOWFLAKE_PASSWORD"));
    if let Ok(database) = std::env::var("SNOWFLAKE_DATABASE") {
        builder = builder.with_database(database);
    }
    if let Ok(warehouse) = std::env::var("SNOWFLAKE_WAREHOUSE") {
        builder = builder.with_warehouse(warehouse);
    }

    let conn = builder.build().expect("authenticate");
    let introspector = SnowflakeIntrospector::new(Arc::new(conn));
    let schema = std::env::var("SNOWFLAKE_SCHEMA").ok();
    let location = introspector.resolve_location(schema.as_deref()).await.unwrap();

    let tables = introspector
        .table_names(&location, TableNameOptions::default())
        .await
        .unwrap();
    for table in tables.iter().take(5) {
        let columns = introspector.columns(&location, table).await.unwrap();
        println!("{}: {} columns", table, columns.len());
    }
}
