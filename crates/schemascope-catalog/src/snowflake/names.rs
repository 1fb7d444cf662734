//! Session context, object listings, view definitions and table comments

use schemascope_core::{ident, Diagnostic, DiagnosticCode, ObjectRef, SchemaLocation, Severity};
use tracing::warn;

use crate::adapter::{
    IntrospectError, RowSet, SessionContext, TableNameOptions, ViewDefinition, ViewNameOptions,
    WarehouseConnection,
};
use crate::queries::{Bindings, QueryTemplates, TemplateName};

use super::run_template;

/// Current database and schema of the session
pub async fn fetch_session_context(
    conn: &dyn WarehouseConnection,
    templates: &QueryTemplates,
) -> Result<SessionContext, IntrospectError> {
    let rows = run_template(conn, templates, TemplateName::CurrentContext, &Bindings::default()).await?;

    let row = rows.rows().next().ok_or_else(|| {
        IntrospectError::InvalidResponse("Current database query returned no rows".to_string())
    })?;

    let database = row
        .opt_text("database_name")
        .or_else(|| row.text_at(0))
        .ok_or_else(|| {
            IntrospectError::InvalidResponse("Session has no current database".to_string())
        })?;
    let schema = row.opt_text("schema_name").or_else(|| row.text_at(1));

    Ok(SessionContext {
        database: ident::normalize_stored(&database),
        schema: schema.map(|s| ident::normalize_stored(&s)),
    })
}

/// First column of every row, normalized
fn first_column_names(rows: &RowSet) -> Vec<String> {
    rows.rows()
        .filter_map(|row| row.text_at(0))
        .map(|name| ident::normalize_stored(&name))
        .collect()
}

pub async fn fetch_table_names(
    conn: &dyn WarehouseConnection,
    templates: &QueryTemplates,
    location: &SchemaLocation,
    options: TableNameOptions,
) -> Result<Vec<String>, IntrospectError> {
    let rows = run_template(conn, templates, options.template(), &Bindings::schema(location)).await?;
    Ok(first_column_names(&rows))
}

pub async fn fetch_view_names(
    conn: &dyn WarehouseConnection,
    templates: &QueryTemplates,
    location: &SchemaLocation,
    options: ViewNameOptions,
) -> Result<Vec<String>, IntrospectError> {
    let rows = run_template(conn, templates, options.template(), &Bindings::schema(location)).await?;
    Ok(first_column_names(&rows))
}

/// Definition text of a view
///
/// Query failures propagate. A view that is not listed, or whose text is
/// hidden (NULL), yields [`ViewDefinition::Unavailable`] with a diagnostic.
pub async fn fetch_view_definition(
    conn: &dyn WarehouseConnection,
    templates: &QueryTemplates,
    location: &SchemaLocation,
    view: &str,
) -> Result<(ViewDefinition, Option<Diagnostic>), IntrospectError> {
    let rows = run_template(
        conn,
        templates,
        TemplateName::ViewDefinition,
        &Bindings::table(location, view),
    )
    .await?;

    // LIKE treats `_` as a wildcard; only an exact name match counts
    let view = ident::normalize(view);
    let row = rows.rows().find(|row| {
        row.opt_text("name")
            .is_some_and(|name| ident::normalize_stored(&name) == view)
    });

    let reason = match row {
        None => "view not found".to_string(),
        Some(row) => match row.opt_text("text") {
            Some(text) => return Ok((ViewDefinition::Available(text), None)),
            None => "definition text is not visible to this role".to_string(),
        },
    };

    warn!(schema = %location, view = %view, reason = %reason, "View definition unavailable");
    let diagnostic = Diagnostic::new(
        DiagnosticCode::ViewDefinitionUnavailable,
        Severity::Warn,
        format!("Definition of view '{}' is unavailable: {}", view, reason),
    )
    .with_object(ObjectRef::table(location.to_string(), view));

    Ok((ViewDefinition::Unavailable { reason }, Some(diagnostic)))
}

/// Comment on a table; `None` when there is no comment or no such table
pub async fn fetch_table_comment(
    conn: &dyn WarehouseConnection,
    templates: &QueryTemplates,
    location: &SchemaLocation,
    table: &str,
) -> Result<Option<String>, IntrospectError> {
    let rows = run_template(
        conn,
        templates,
        TemplateName::TableComment,
        &Bindings::table(location, table),
    )
    .await?;

    // Overrides may select the comment positionally, but a NULL `comment`
    // column means no comment
    let comment = match rows.column_index("comment") {
        Some(idx) => rows.rows().next().and_then(|row| row.text_at(idx)),
        None => rows.rows().next().and_then(|row| row.text_at(0)),
    };
    Ok(comment)
}
