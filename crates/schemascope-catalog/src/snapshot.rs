//! Full schema walk into a [`CatalogSnapshot`]

use schemascope_core::{CatalogSnapshot, SchemaLocation, TableSnapshot, ViewSnapshot};
use tracing::info;

use crate::adapter::{IntrospectError, SchemaIntrospector, TableNameOptions, ViewNameOptions};

/// Introspect every table and view of a schema
///
/// Tables include transient ones; views include materialized ones. Columns go
/// through [`SchemaIntrospector::columns`], so an oversized schema degrades to
/// per-table queries. Diagnostics recorded by the introspector during the walk
/// are moved into the snapshot.
pub async fn snapshot_schema(
    introspector: &dyn SchemaIntrospector,
    location: &SchemaLocation,
) -> Result<CatalogSnapshot, IntrospectError> {
    let mut snapshot = CatalogSnapshot::new(location.clone());

    let tables = introspector
        .table_names(location, TableNameOptions::transient())
        .await?;

    for name in tables {
        let columns = introspector.columns(location, &name).await?;
        let table = TableSnapshot {
            comment: introspector.table_comment(location, &name).await?,
            primary_key: introspector.pk_constraint(location, &name).await?,
            foreign_keys: introspector.foreign_keys_for(location, &name).await?,
            unique_constraints: introspector.unique_constraints_for(location, &name).await?,
            fingerprint: columns.fingerprint(),
            columns: columns.columns,
            name,
        };
        snapshot.add_table(table);
    }

    for options in [ViewNameOptions::default(), ViewNameOptions::materialized()] {
        for name in introspector.view_names(location, options).await? {
            let definition = introspector.view_definition(location, &name).await?;
            snapshot.add_view(ViewSnapshot {
                name,
                materialized: options.materialized_views,
                definition: definition.into_text(),
            });
        }
    }

    for diagnostic in introspector.take_diagnostics() {
        snapshot.add_diagnostic(diagnostic);
    }

    info!(
        schema = %location,
        tables = snapshot.summary.tables,
        views = snapshot.summary.views,
        warnings = snapshot.summary.warnings,
        "Schema snapshot complete"
    );

    Ok(snapshot)
}
