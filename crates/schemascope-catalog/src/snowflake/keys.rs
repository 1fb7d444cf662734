//! Primary key, foreign key and unique constraint resolution
//!
//! Each fetch is one `SHOW ... KEYS IN SCHEMA` query whose rows are grouped by
//! table (and by constraint for multi-constraint results). Constrained columns
//! are ordered by `key_sequence`.

use schemascope_core::{
    ident, ForeignKeyInfo, ForeignKeyMap, KeyInfo, PrimaryKeyMap, SchemaLocation,
    UniqueConstraintMap,
};
use std::collections::BTreeMap;

use crate::adapter::{IntrospectError, Row, WarehouseConnection};
use crate::queries::{Bindings, QueryTemplates, TemplateName};

use super::run_template;

/// Columns of one constraint before ordering
#[derive(Default)]
struct PendingKey {
    name: Option<String>,
    columns: Vec<(i64, String)>,
}

impl PendingKey {
    fn push(&mut self, row: &Row<'_>, column: &str) -> Result<(), IntrospectError> {
        let sequence = row.opt_i64("key_sequence").unwrap_or(i64::MAX);
        self.columns.push((sequence, ident::normalize_stored(&row.text(column)?)));
        Ok(())
    }

    fn into_columns(mut self) -> Vec<String> {
        self.columns.sort_by_key(|(sequence, _)| *sequence);
        self.columns.into_iter().map(|(_, column)| column).collect()
    }

    fn into_key_info(self) -> KeyInfo {
        let name = self.name.clone();
        KeyInfo {
            constrained_columns: self.into_columns(),
            name,
        }
    }
}

fn constraint_name(row: &Row<'_>, column: &str) -> Option<String> {
    row.opt_text(column).map(|name| ident::normalize_stored(&name))
}

/// Primary keys of every table in a schema
pub async fn fetch_primary_keys(
    conn: &dyn WarehouseConnection,
    templates: &QueryTemplates,
    location: &SchemaLocation,
) -> Result<PrimaryKeyMap, IntrospectError> {
    let rows = run_template(conn, templates, TemplateName::PrimaryKeys, &Bindings::schema(location)).await?;

    let mut pending: BTreeMap<String, PendingKey> = BTreeMap::new();
    for row in rows.rows() {
        let table = ident::normalize_stored(&row.text("table_name")?);
        let key = pending.entry(table).or_default();
        if key.name.is_none() {
            key.name = constraint_name(&row, "constraint_name");
        }
        key.push(&row, "column_name")?;
    }

    Ok(pending
        .into_iter()
        .map(|(table, key)| (table, key.into_key_info()))
        .collect())
}

/// Unique constraints of every table in a schema
pub async fn fetch_unique_constraints(
    conn: &dyn WarehouseConnection,
    templates: &QueryTemplates,
    location: &SchemaLocation,
) -> Result<UniqueConstraintMap, IntrospectError> {
    let rows = run_template(
        conn,
        templates,
        TemplateName::UniqueConstraints,
        &Bindings::schema(location),
    )
    .await?;

    let mut pending: BTreeMap<String, Vec<PendingKey>> = BTreeMap::new();
    for row in rows.rows() {
        let table = ident::normalize_stored(&row.text("table_name")?);
        let name = constraint_name(&row, "constraint_name");

        let constraints = pending.entry(table).or_default();
        let idx = match constraints.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                constraints.push(PendingKey {
                    name,
                    columns: Vec::new(),
                });
                constraints.len() - 1
            }
        };
        constraints[idx].push(&row, "column_name")?;
    }

    Ok(pending
        .into_iter()
        .map(|(table, keys)| (table, keys.into_iter().map(PendingKey::into_key_info).collect()))
        .collect())
}

/// Foreign keys of every table in a schema, keyed by the referencing table
///
/// `referred_schema` is only set when the referenced table lives in another schema.
pub async fn fetch_foreign_keys(
    conn: &dyn WarehouseConnection,
    templates: &QueryTemplates,
    location: &SchemaLocation,
) -> Result<ForeignKeyMap, IntrospectError> {
    let rows = run_template(conn, templates, TemplateName::ForeignKeys, &Bindings::schema(location)).await?;

    struct PendingForeignKey {
        name: Option<String>,
        referred_schema: Option<String>,
        referred_table: String,
        constrained: PendingKey,
        referred: PendingKey,
    }

    let mut pending: BTreeMap<String, Vec<PendingForeignKey>> = BTreeMap::new();
    for row in rows.rows() {
        let table = ident::normalize_stored(&row.text("fk_table_name")?);
        let name = constraint_name(&row, "fk_name");
        let referred_table = ident::normalize_stored(&row.text("pk_table_name")?);
        let referred_schema = row
            .opt_text("pk_schema_name")
            .map(|schema| ident::normalize_stored(&schema))
            .filter(|schema| *schema != location.schema);

        let keys = pending.entry(table).or_default();
        let idx = match keys
            .iter()
            .position(|k| k.name == name && k.referred_table == referred_table)
        {
            Some(idx) => idx,
            None => {
                keys.push(PendingForeignKey {
                    name,
                    referred_schema,
                    referred_table,
                    constrained: PendingKey::default(),
                    referred: PendingKey::default(),
                });
                keys.len() - 1
            }
        };
        keys[idx].constrained.push(&row, "fk_column_name")?;
        keys[idx].referred.push(&row, "pk_column_name")?;
    }

    Ok(pending
        .into_iter()
        .map(|(table, keys)| {
            let keys = keys
                .into_iter()
                .map(|key| ForeignKeyInfo {
                    name: key.name,
                    constrained_columns: key.constrained.into_columns(),
                    referred_schema: key.referred_schema,
                    referred_table: key.referred_table,
                    referred_columns: key.referred.into_columns(),
                })
                .collect();
            (table, keys)
        })
        .collect())
}
