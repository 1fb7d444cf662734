//! Snowflake introspection
//!
//! [`SnowflakeIntrospector`] implements [`SchemaIntrospector`] over any
//! [`WarehouseConnection`]. Every operation goes through the injected
//! [`CatalogCache`], so one introspection session issues each catalog query
//! at most once per schema.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let conn = SnowflakeConnection::with_password("xy12345.us-east-1", "ANALYST", password)
//!     .with_warehouse("COMPUTE_WH")
//!     .build()?;
//!
//! let introspector = SnowflakeIntrospector::new(Arc::new(conn));
//! let location = introspector.resolve_location(Some("PUBLIC")).await?;
//! let columns = introspector.columns(&location, "ORDERS").await?;
//! ```

pub mod columns;
pub mod connection;
pub mod keys;
pub mod names;
pub mod types;

use schemascope_core::{
    ident, Config, Diagnostic, ForeignKeyMap, IntrospectionSettings, PrimaryKeyMap,
    SchemaLocation, TableColumns, UniqueConstraintMap,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::adapter::{
    IntrospectError, RowSet, SchemaColumns, SchemaIntrospector, SessionContext, TableNameOptions,
    ViewDefinition, ViewNameOptions, WarehouseConnection,
};
use crate::cache::{CatalogCache, ObjectKey, SchemaKey};
use crate::queries::{Bindings, QueryTemplates, TemplateName};

pub use connection::{SnowflakeConnection, SnowflakeConnectionBuilder, SnowflakeCredentials};

/// Render a template and run it
pub(crate) async fn run_template(
    conn: &dyn WarehouseConnection,
    templates: &QueryTemplates,
    name: TemplateName,
    bindings: &Bindings<'_>,
) -> Result<RowSet, IntrospectError> {
    let sql = templates.render(name, bindings)?;
    debug!(template = %name, sql = %sql, "Running catalog query");

    let rows = conn.query(&sql).await?;
    debug!(template = %name, rows = rows.len(), "Catalog query returned");
    Ok(rows)
}

/// Snowflake implementation of [`SchemaIntrospector`]
pub struct SnowflakeIntrospector {
    conn: Arc<dyn WarehouseConnection>,
    templates: QueryTemplates,
    settings: IntrospectionSettings,
    cache: Arc<CatalogCache>,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl SnowflakeIntrospector {
    /// Create an introspector with default templates, settings and a fresh cache
    pub fn new(conn: Arc<dyn WarehouseConnection>) -> Self {
        Self {
            conn,
            templates: QueryTemplates::snowflake(),
            settings: IntrospectionSettings::default(),
            cache: Arc::new(CatalogCache::new()),
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    /// Create an introspector using `[introspection]` and `[queries]` from config
    pub fn from_config(conn: Arc<dyn WarehouseConnection>, config: &Config) -> Result<Self, IntrospectError> {
        let templates = QueryTemplates::snowflake().with_overrides(&config.queries)?;
        Ok(Self::new(conn)
            .with_templates(templates)
            .with_settings(config.introspection.clone()))
    }

    /// Share a cache with other introspectors
    pub fn with_cache(mut self, cache: Arc<CatalogCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_templates(mut self, templates: QueryTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_settings(mut self, settings: IntrospectionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    pub fn templates(&self) -> &QueryTemplates {
        &self.templates
    }

    pub fn settings(&self) -> &IntrospectionSettings {
        &self.settings
    }

    /// Identity of the underlying connection (the cache scope)
    pub fn connection_identity(&self) -> &str {
        self.conn.identity()
    }

    /// Drop cached results for one schema
    pub fn invalidate_schema(&self, location: &SchemaLocation) {
        self.cache.invalidate_schema(self.conn.identity(), location);
    }

    fn schema_key(&self, location: &SchemaLocation) -> SchemaKey {
        SchemaKey {
            connection: self.conn.identity().to_string(),
            location: location.clone(),
        }
    }

    fn object_key(&self, location: &SchemaLocation, name: &str) -> ObjectKey {
        ObjectKey {
            schema: self.schema_key(location),
            name: ident::normalize(name),
        }
    }

    fn record(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(diagnostics);
    }
}

#[async_trait::async_trait]
impl SchemaIntrospector for SnowflakeIntrospector {
    fn dialect(&self) -> &'static str {
        "Snowflake"
    }

    async fn session_context(&self) -> Result<SessionContext, IntrospectError> {
        let conn = self.conn.as_ref();
        self.cache
            .context
            .get_or_try_init(conn.identity().to_string(), || async move {
                names::fetch_session_context(conn, &self.templates).await
            })
            .await
    }

    async fn table_names(
        &self,
        location: &SchemaLocation,
        options: TableNameOptions,
    ) -> Result<Vec<String>, IntrospectError> {
        let conn = self.conn.as_ref();
        let names = self
            .cache
            .table_names
            .get_or_try_init((self.schema_key(location), options), || async move {
                names::fetch_table_names(conn, &self.templates, location, options)
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(names.as_ref().clone())
    }

    async fn view_names(
        &self,
        location: &SchemaLocation,
        options: ViewNameOptions,
    ) -> Result<Vec<String>, IntrospectError> {
        let conn = self.conn.as_ref();
        let names = self
            .cache
            .view_names
            .get_or_try_init((self.schema_key(location), options), || async move {
                names::fetch_view_names(conn, &self.templates, location, options)
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(names.as_ref().clone())
    }

    async fn view_definition(
        &self,
        location: &SchemaLocation,
        view: &str,
    ) -> Result<ViewDefinition, IntrospectError> {
        let conn = self.conn.as_ref();
        let key = self.object_key(location, view);
        let view = key.name.clone();
        self.cache
            .view_definitions
            .get_or_try_init(key, || async move {
                let (definition, diagnostic) =
                    names::fetch_view_definition(conn, &self.templates, location, &view).await?;
                self.record(diagnostic);
                Ok(definition)
            })
            .await
    }

    async fn table_comment(
        &self,
        location: &SchemaLocation,
        table: &str,
    ) -> Result<Option<String>, IntrospectError> {
        let conn = self.conn.as_ref();
        let key = self.object_key(location, table);
        let table = key.name.clone();
        self.cache
            .table_comments
            .get_or_try_init(key, || async move {
                names::fetch_table_comment(conn, &self.templates, location, &table).await
            })
            .await
    }

    async fn primary_keys(&self, location: &SchemaLocation) -> Result<Arc<PrimaryKeyMap>, IntrospectError> {
        let conn = self.conn.as_ref();
        self.cache
            .primary_keys
            .get_or_try_init(self.schema_key(location), || async move {
                keys::fetch_primary_keys(conn, &self.templates, location)
                    .await
                    .map(Arc::new)
            })
            .await
    }

    async fn foreign_keys(&self, location: &SchemaLocation) -> Result<Arc<ForeignKeyMap>, IntrospectError> {
        let conn = self.conn.as_ref();
        self.cache
            .foreign_keys
            .get_or_try_init(self.schema_key(location), || async move {
                keys::fetch_foreign_keys(conn, &self.templates, location)
                    .await
                    .map(Arc::new)
            })
            .await
    }

    async fn unique_constraints(
        &self,
        location: &SchemaLocation,
    ) -> Result<Arc<UniqueConstraintMap>, IntrospectError> {
        let conn = self.conn.as_ref();
        self.cache
            .unique_constraints
            .get_or_try_init(self.schema_key(location), || async move {
                keys::fetch_unique_constraints(conn, &self.templates, location)
                    .await
                    .map(Arc::new)
            })
            .await
    }

    async fn columns_for_schema(&self, location: &SchemaLocation) -> Result<Arc<SchemaColumns>, IntrospectError> {
        let conn = self.conn.as_ref();
        self.cache
            .schema_columns
            .get_or_try_init(self.schema_key(location), || async move {
                let primary_keys = self.primary_keys(location).await?;
                let (columns, diagnostics) = columns::fetch_schema_columns(
                    conn,
                    &self.templates,
                    &self.settings,
                    location,
                    &primary_keys,
                )
                .await?;
                self.record(diagnostics);
                Ok(Arc::new(columns))
            })
            .await
    }

    async fn columns_for_table(
        &self,
        location: &SchemaLocation,
        table: &str,
    ) -> Result<TableColumns, IntrospectError> {
        let conn = self.conn.as_ref();
        let key = self.object_key(location, table);
        let table = key.name.clone();
        let columns = self
            .cache
            .table_columns
            .get_or_try_init(key, || async move {
                let primary_keys = self.primary_keys(location).await?;
                let (columns, diagnostics) = columns::fetch_table_columns(
                    conn,
                    &self.templates,
                    &self.settings,
                    location,
                    &table,
                    &primary_keys,
                )
                .await?;
                self.record(diagnostics);
                Ok::<_, IntrospectError>(Arc::new(columns))
            })
            .await?;
        Ok(columns.as_ref().clone())
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn reset_cache(&self) {
        debug!("Resetting catalog cache");
        self.cache.clear();
    }
}
