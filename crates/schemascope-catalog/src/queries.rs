//! Named query templates and safe placeholder rendering
//!
//! Templates are opaque SQL text with placeholders:
//!
//! | placeholder          | rendered as                                   |
//! |----------------------|-----------------------------------------------|
//! | `{database}`         | quoted identifier, e.g. `"ANALYTICS"`         |
//! | `{schema}`           | quoted identifier                             |
//! | `{table}`            | quoted identifier                             |
//! | `{database_literal}` | string literal, e.g. `'ANALYTICS'`            |
//! | `{schema_literal}`   | string literal                                |
//! | `{table_literal}`    | string literal                                |
//!
//! `{{` and `}}` produce literal braces. Names are denormalized (folded back
//! to warehouse case) before quoting, so templates always compare against the
//! stored form of an identifier.

use schemascope_core::{ident, SchemaLocation};
use std::collections::{BTreeMap, HashMap};

use crate::adapter::IntrospectError;

/// Names of the templates the introspector uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemplateName {
    CurrentContext,
    TableNames,
    TransientTableNames,
    ExternalTableNames,
    ViewNames,
    MaterializedViewNames,
    ViewDefinition,
    TableComment,
    PrimaryKeys,
    ForeignKeys,
    UniqueConstraints,
    SchemaColumns,
    TableColumns,
}

impl TemplateName {
    pub const ALL: [TemplateName; 13] = [
        Self::CurrentContext,
        Self::TableNames,
        Self::TransientTableNames,
        Self::ExternalTableNames,
        Self::ViewNames,
        Self::MaterializedViewNames,
        Self::ViewDefinition,
        Self::TableComment,
        Self::PrimaryKeys,
        Self::ForeignKeys,
        Self::UniqueConstraints,
        Self::SchemaColumns,
        Self::TableColumns,
    ];

    /// Stable name used in `[queries]` config overrides
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentContext => "current_context",
            Self::TableNames => "table_names",
            Self::TransientTableNames => "transient_table_names",
            Self::ExternalTableNames => "external_table_names",
            Self::ViewNames => "view_names",
            Self::MaterializedViewNames => "materialized_view_names",
            Self::ViewDefinition => "view_definition",
            Self::TableComment => "table_comment",
            Self::PrimaryKeys => "primary_keys",
            Self::ForeignKeys => "foreign_keys",
            Self::UniqueConstraints => "unique_constraints",
            Self::SchemaColumns => "schema_columns",
            Self::TableColumns => "table_columns",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    /// Comment embedded in every default template, e.g. `/* schemascope:table_names */`
    pub fn marker(&self) -> String {
        format!("/* schemascope:{} */", self.as_str())
    }
}

impl std::fmt::Display for TemplateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values bound into a template; all names are in normalized form
#[derive(Debug, Clone, Copy, Default)]
pub struct Bindings<'a> {
    database: Option<&'a str>,
    schema: Option<&'a str>,
    table: Option<&'a str>,
}

impl<'a> Bindings<'a> {
    /// Bind database and schema
    pub fn schema(location: &'a SchemaLocation) -> Self {
        Self {
            database: Some(&location.database),
            schema: Some(&location.schema),
            table: None,
        }
    }

    /// Bind database, schema and table (or view)
    pub fn table(location: &'a SchemaLocation, table: &'a str) -> Self {
        Self {
            table: Some(table),
            ..Self::schema(location)
        }
    }

    fn resolve(&self, placeholder: &str) -> Result<String, IntrospectError> {
        let (value, literal) = match placeholder {
            "database" => (self.database, false),
            "schema" => (self.schema, false),
            "table" => (self.table, false),
            "database_literal" => (self.database, true),
            "schema_literal" => (self.schema, true),
            "table_literal" => (self.table, true),
            other => {
                return Err(IntrospectError::Template(format!(
                    "Unknown placeholder '{{{}}}'",
                    other
                )))
            }
        };

        let value = value.ok_or_else(|| {
            IntrospectError::Template(format!("Placeholder '{{{}}}' has no value", placeholder))
        })?;

        Ok(if literal {
            ident::quote_literal(&ident::denormalize(value))
        } else {
            ident::quote_normalized(value)
        })
    }
}

/// Substitute placeholders in a template
pub fn render(template: &str, bindings: &Bindings<'_>) -> Result<String, IntrospectError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(IntrospectError::Template(format!(
                                "Unterminated placeholder '{{{}'",
                                name
                            )))
                        }
                    }
                }
                out.push_str(&bindings.resolve(name.trim())?);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(IntrospectError::Template(
                    "Unmatched '}' in template".to_string(),
                ))
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

/// The full set of templates for one dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplates {
    templates: HashMap<TemplateName, String>,
}

impl QueryTemplates {
    /// Default Snowflake templates
    pub fn snowflake() -> Self {
        let templates = TemplateName::ALL
            .iter()
            .map(|name| (*name, snowflake_default(*name).to_string()))
            .collect();
        Self { templates }
    }

    /// Apply `[queries]` overrides from config
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Result<Self, IntrospectError> {
        for (name, sql) in overrides {
            let template = TemplateName::parse(name).ok_or_else(|| {
                IntrospectError::ConfigError(format!("Unknown query template '{}'", name))
            })?;
            self.set(template, sql.clone());
        }
        Ok(self)
    }

    /// Replace one template
    pub fn set(&mut self, name: TemplateName, sql: impl Into<String>) {
        self.templates.insert(name, sql.into());
    }

    /// Raw template text
    pub fn get(&self, name: TemplateName) -> &str {
        self.templates.get(&name).map(String::as_str).unwrap_or_default()
    }

    /// Render a template with bindings
    pub fn render(&self, name: TemplateName, bindings: &Bindings<'_>) -> Result<String, IntrospectError> {
        render(self.get(name), bindings)
    }
}

impl Default for QueryTemplates {
    fn default() -> Self {
        Self::snowflake()
    }
}

fn snowflake_default(name: TemplateName) -> &'static str {
    match name {
        TemplateName::CurrentContext => {
            "select /* schemascope:current_context */ \
             current_database() as database_name, current_schema() as schema_name"
        }
        TemplateName::TableNames => {
            "select /* schemascope:table_names */ table_name \
             from {database}.information_schema.tables \
             where table_schema = {schema_literal} \
             and table_type = 'BASE TABLE' and is_transient = 'NO' \
             order by table_name"
        }
        TemplateName::TransientTableNames => {
            "select /* schemascope:transient_table_names */ table_name \
             from {database}.information_schema.tables \
             where table_schema = {schema_literal} \
             and table_type = 'BASE TABLE' \
             order by table_name"
        }
        TemplateName::ExternalTableNames => {
            "select /* schemascope:external_table_names */ table_name \
             from {database}.information_schema.tables \
             where table_schema = {schema_literal} \
             and table_type = 'EXTERNAL TABLE' \
             order by table_name"
        }
        TemplateName::ViewNames => {
            "select /* schemascope:view_names */ table_name \
             from {database}.information_schema.tables \
             where table_schema = {schema_literal} \
             and table_type = 'VIEW' \
             order by table_name"
        }
        TemplateName::MaterializedViewNames => {
            "select /* schemascope:materialized_view_names */ table_name \
             from {database}.information_schema.tables \
             where table_schema = {schema_literal} \
             and table_type = 'MATERIALIZED VIEW' \
             order by table_name"
        }
        TemplateName::ViewDefinition => {
            "show /* schemascope:view_definition */ views like {table_literal} \
             in schema {database}.{schema}"
        }
        TemplateName::TableComment => {
            "select /* schemascope:table_comment */ comment \
             from {database}.information_schema.tables \
             where table_schema = {schema_literal} and table_name = {table_literal}"
        }
        TemplateName::PrimaryKeys => {
            "show /* schemascope:primary_keys */ primary keys in schema {database}.{schema}"
        }
        TemplateName::ForeignKeys => {
            "show /* schemascope:foreign_keys */ imported keys in schema {database}.{schema}"
        }
        TemplateName::UniqueConstraints => {
            "show /* schemascope:unique_constraints */ unique keys in schema {database}.{schema}"
        }
        TemplateName::SchemaColumns => {
            "select /* schemascope:schema_columns */ \
             ic.table_name, ic.column_name, ic.data_type, ic.character_maximum_length, \
             ic.numeric_precision, ic.numeric_scale, ic.is_nullable, ic.column_default, \
             ic.is_identity, ic.comment, ic.identity_start, ic.identity_increment \
             from {database}.information_schema.columns ic \
             where ic.table_schema = {schema_literal} \
             order by ic.table_name, ic.ordinal_position"
        }
        TemplateName::TableColumns => {
            "select /* schemascope:table_columns */ \
             ic.table_name, ic.column_name, ic.data_type, ic.character_maximum_length, \
             ic.numeric_precision, ic.numeric_scale, ic.is_nullable, ic.column_default, \
             ic.is_identity, ic.comment, ic.identity_start, ic.identity_increment \
             from {database}.information_schema.columns ic \
             where ic.table_schema = {schema_literal} and ic.table_name = {table_literal} \
             order by ic.ordinal_position"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_default_template_carries_its_marker() {
        let templates = QueryTemplates::snowflake();
        for name in TemplateName::ALL {
            assert!(
                templates.get(name).contains(&name.marker()),
                "template {name} lacks its marker"
            );
        }
    }

    #[test]
    fn render_quotes_identifiers_and_literals() {
        let location = SchemaLocation::new("ANALYTICS", "PUBLIC");
        let sql = render(
            "from {database}.{schema}.{table} where t = {table_literal}",
            &Bindings::table(&location, "MyTable"),
        )
        .unwrap();

        assert_eq!(
            sql,
            "from \"ANALYTICS\".\"PUBLIC\".\"MyTable\" where t = 'MyTable'"
        );
    }

    #[test]
    fn render_keeps_case_sensitive_lowercase_names() {
        let location = SchemaLocation::new("ANALYTICS", "PUBLIC");
        let sql = render(
            "from {database}.{schema}.{table} where t = {table_literal}",
            &Bindings::table(&location, "\"events\""),
        )
        .unwrap();

        assert_eq!(sql, "from \"ANALYTICS\".\"PUBLIC\".\"events\" where t = 'events'");
    }

    #[test]
    fn render_escapes_hostile_names() {
        let location = SchemaLocation::new("DB", "PUBLIC");
        let sql = render(
            "where table_name = {table_literal}",
            &Bindings::table(&location, "x' or '1'='1"),
        )
        .unwrap();

        assert_eq!(sql, "where table_name = 'x'' or ''1''=''1'");
    }

    #[test]
    fn render_handles_brace_escapes() {
        let sql = render("select '{{}}' as braces", &Bindings::default()).unwrap();
        assert_eq!(sql, "select '{}' as braces");
    }

    #[test]
    fn render_rejects_bad_placeholders() {
        let location = SchemaLocation::new("DB", "PUBLIC");
        assert!(matches!(
            render("{nope}", &Bindings::schema(&location)),
            Err(IntrospectError::Template(_))
        ));
        assert!(matches!(
            render("{table}", &Bindings::schema(&location)),
            Err(IntrospectError::Template(_))
        ));
        assert!(matches!(
            render("{schema", &Bindings::schema(&location)),
            Err(IntrospectError::Template(_))
        ));
        assert!(matches!(
            render("oops }", &Bindings::schema(&location)),
            Err(IntrospectError::Template(_))
        ));
    }

    #[test]
    fn overrides_replace_known_templates_only() {
        let mut overrides = BTreeMap::new();
        overrides.insert("view_names".to_string(), "select 1".to_string());
        let templates = QueryTemplates::snowflake().with_overrides(&overrides).unwrap();
        assert_eq!(templates.get(TemplateName::ViewNames), "select 1");

        overrides.insert("bogus".to_string(), "select 2".to_string());
        assert!(matches!(
            QueryTemplates::snowflake().with_overrides(&overrides),
            Err(IntrospectError::ConfigError(_))
        ));
    }

    #[test]
    fn default_schema_columns_query_renders() {
        let location = SchemaLocation::new("ANALYTICS", "PUBLIC");
        let sql = QueryTemplates::snowflake()
            .render(TemplateName::SchemaColumns, &Bindings::schema(&location))
            .unwrap();
        assert!(sql.contains("from \"ANALYTICS\".information_schema.columns"));
        assert!(sql.contains("ic.table_schema = 'PUBLIC'"));
    }
}
