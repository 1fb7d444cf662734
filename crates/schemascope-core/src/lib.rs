//! SchemaScope Core
//!
//! Core domain model for warehouse schema introspection.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod ident;
pub mod schema;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, ObjectRef};
pub use schema::{
    BaseType, TypeFamily, CanonicalType, Identity, ColumnDescriptor, TableColumns,
    KeyInfo, ForeignKeyInfo, SchemaLocation, PrimaryKeyMap, ForeignKeyMap, UniqueConstraintMap,
};
pub use report::{CatalogSnapshot, TableSnapshot, ViewSnapshot, SnapshotSummary, ReportVersion};
pub use config::{Config, ConfigError, IntrospectionSettings, WarehouseConfig};
