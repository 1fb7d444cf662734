//! Warehouse catalog introspection
//!
//! Discovers tables, views, columns and key constraints of a warehouse schema
//! and resolves them into the canonical model of `schemascope-core`.
//!
//! ## Features
//!
//! Enable warehouse support via Cargo features:
//! - `snowflake` - live Snowflake connection
//!
//! Without it, introspection still runs against any [`WarehouseConnection`]
//! (for example [`MockConnection`]).
//!
//! ## Example
//!
//! ```rust,ignore
//! use schemascope_catalog::{SchemaIntrospector, SnowflakeConnection, SnowflakeIntrospector};
//!
//! let conn = SnowflakeConnection::with_password("xy12345", "ANALYST", password).build()?;
//! let introspector = SnowflakeIntrospector::new(Arc::new(conn));
//! let location = introspector.current_location().await?;
//! for table in introspector.table_names(&location, Default::default()).await? {
//!     let columns = introspector.columns(&location, &table).await?;
//! }
//! ```

pub mod adapter;
pub mod cache;
pub mod mock;
pub mod queries;
pub mod snapshot;
pub mod snowflake;

pub use adapter::{
    classify_query_error, IntrospectError, QueryError, QueryErrorClass, Row, RowSet,
    SchemaColumns, SchemaIntrospector, SessionContext, TableNameOptions, Value, ViewDefinition,
    ViewNameOptions, WarehouseConnection,
};
pub use cache::{CacheStats, CatalogCache, SingleFlight};
pub use mock::{MockConnection, MockConnectionBuilder};
pub use queries::{Bindings, QueryTemplates, TemplateName};
pub use snapshot::snapshot_schema;
pub use snowflake::{
    SnowflakeConnection, SnowflakeConnectionBuilder, SnowflakeCredentials, SnowflakeIntrospector,
};
