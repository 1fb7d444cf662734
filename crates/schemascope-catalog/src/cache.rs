//! Single-flight catalog cache
//!
//! Memoizes introspection results per `(connection, schema, operation[, object | options])`
//! for the lifetime of one introspection session. Concurrent callers asking
//! for the same key share one warehouse round-trip: the first caller runs the
//! fetch while the others await its result. A failed fetch leaves the entry
//! empty so a later caller retries it.
//!
//! Invalidation is whole-schema ([`CatalogCache::invalidate_schema`]) or
//! whole-session ([`CatalogCache::clear`]); individual entries are never evicted.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let cache = Arc::new(CatalogCache::new());
//! let introspector = SnowflakeIntrospector::new(conn).with_cache(Arc::clone(&cache));
//!
//! introspector.columns(&location, "orders").await?;
//! introspector.columns(&location, "customers").await?; // no new schema-wide query
//!
//! cache.invalidate_schema(conn_identity, &location);
//! ```

use schemascope_core::{
    ForeignKeyMap, PrimaryKeyMap, SchemaLocation, TableColumns, UniqueConstraintMap,
};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::OnceCell;

use crate::adapter::{
    SchemaColumns, SessionContext, TableNameOptions, ViewDefinition, ViewNameOptions,
};

/// Lookup and fetch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls that asked the cache for a value
    pub lookups: u64,

    /// Calls that actually ran a fetch
    pub fetches: u64,
}

impl CacheStats {
    /// Lookups answered without running a fetch
    pub fn hits(&self) -> u64 {
        self.lookups.saturating_sub(self.fetches)
    }
}

impl std::ops::Add for CacheStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            lookups: self.lookups + other.lookups,
            fetches: self.fetches + other.fetches,
        }
    }
}

/// Per-key memoization with single-flight initialisation
pub struct SingleFlight<K, V> {
    cells: RwLock<HashMap<K, Arc<OnceCell<V>>>>,
    lookups: AtomicU64,
    fetches: AtomicU64,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
            lookups: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, running `init` if no value exists yet
    ///
    /// Only one `init` runs per key at a time; concurrent callers wait for it.
    pub async fn get_or_try_init<F, Fut, E>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let cell = self.cell(key);

        let value = cell
            .get_or_try_init(|| async move {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                init().await
            })
            .await?;

        Ok(value.clone())
    }

    /// Cached value, without fetching
    pub fn get(&self, key: &K) -> Option<V> {
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        cells.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Keep only entries whose key passes `keep`
    pub fn retain(&self, mut keep: impl FnMut(&K) -> bool) {
        let mut cells = self.cells.write().unwrap_or_else(PoisonError::into_inner);
        cells.retain(|key, _| keep(key));
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.cells.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Number of populated entries
    pub fn len(&self) -> usize {
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        cells.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
        }
    }

    fn cell(&self, key: K) -> Arc<OnceCell<V>> {
        if let Some(cell) = self.cells.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Arc::clone(cell);
        }

        let mut cells = self.cells.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cells.entry(key).or_insert_with(|| Arc::new(OnceCell::new())))
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Cache key for schema-scoped results
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    /// Connection identity
    pub connection: String,

    /// Schema the result belongs to
    pub location: SchemaLocation,
}

/// Cache key for results about one table or view
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub schema: SchemaKey,

    /// Normalized object name
    pub name: String,
}

/// Memoized catalog results for one introspection session
#[derive(Default)]
pub struct CatalogCache {
    pub(crate) context: SingleFlight<String, SessionContext>,
    pub(crate) primary_keys: SingleFlight<SchemaKey, Arc<PrimaryKeyMap>>,
    pub(crate) foreign_keys: SingleFlight<SchemaKey, Arc<ForeignKeyMap>>,
    pub(crate) unique_constraints: SingleFlight<SchemaKey, Arc<UniqueConstraintMap>>,
    pub(crate) schema_columns: SingleFlight<SchemaKey, Arc<SchemaColumns>>,
    pub(crate) table_columns: SingleFlight<ObjectKey, Arc<TableColumns>>,
    pub(crate) table_names: SingleFlight<(SchemaKey, TableNameOptions), Arc<Vec<String>>>,
    pub(crate) view_names: SingleFlight<(SchemaKey, ViewNameOptions), Arc<Vec<String>>>,
    pub(crate) view_definitions: SingleFlight<ObjectKey, ViewDefinition>,
    pub(crate) table_comments: SingleFlight<ObjectKey, Option<String>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached result for one schema of one connection
    pub fn invalidate_schema(&self, connection: &str, location: &SchemaLocation) {
        let matches = |key: &SchemaKey| key.connection == connection && &key.location == location;

        self.primary_keys.retain(|key| !matches(key));
        self.foreign_keys.retain(|key| !matches(key));
        self.unique_constraints.retain(|key| !matches(key));
        self.schema_columns.retain(|key| !matches(key));
        self.table_columns.retain(|key| !matches(&key.schema));
        self.table_names.retain(|(key, _)| !matches(key));
        self.view_names.retain(|(key, _)| !matches(key));
        self.view_definitions.retain(|key| !matches(&key.schema));
        self.table_comments.retain(|key| !matches(&key.schema));
    }

    /// Drop everything (start a new session)
    pub fn clear(&self) {
        self.context.clear();
        self.primary_keys.clear();
        self.foreign_keys.clear();
        self.unique_constraints.clear();
        self.schema_columns.clear();
        self.table_columns.clear();
        self.table_names.clear();
        self.view_names.clear();
        self.view_definitions.clear();
        self.table_comments.clear();
    }

    /// Number of populated entries across all operations
    pub fn len(&self) -> usize {
        self.context.len()
            + self.primary_keys.len()
            + self.foreign_keys.len()
            + self.unique_constraints.len()
            + self.schema_columns.len()
            + self.table_columns.len()
            + self.table_names.len()
            + self.view_names.len()
            + self.view_definitions.len()
            + self.table_comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookup and fetch counts across all operations
    pub fn stats(&self) -> CacheStats {
        self.context.stats()
            + self.primary_keys.stats()
            + self.foreign_keys.stats()
            + self.unique_constraints.stats()
            + self.schema_columns.stats()
            + self.table_columns.stats()
            + self.table_names.stats()
            + self.view_names.stats()
            + self.view_definitions.stats()
            + self.table_comments.stats()
    }
}
