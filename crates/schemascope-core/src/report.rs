//! Catalog snapshot (schemascope snapshot output)

use serde::{Deserialize, Serialize};
use crate::diagnostic::{Diagnostic, Severity};
use crate::schema::{ColumnDescriptor, ForeignKeyInfo, KeyInfo, SchemaLocation};

/// Snapshot format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    pub major: u32,
    pub minor: u32,
}

impl ReportVersion {
    /// Current snapshot format version
    pub const CURRENT: Self = Self { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// One table in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: KeyInfo,
    pub foreign_keys: Vec<ForeignKeyInfo>,
    pub unique_constraints: Vec<KeyInfo>,

    /// Column fingerprint (SHA-256)
    pub fingerprint: String,
}

/// One view in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub name: String,
    pub materialized: bool,

    /// Definition text; `None` when the warehouse did not expose it
    pub definition: Option<String>,
}

/// Snapshot summary counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub tables: usize,
    pub views: usize,
    pub columns: usize,
    pub warnings: usize,
}

/// Everything schemascope learned about one schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub version: ReportVersion,

    /// RFC 3339 creation time
    pub timestamp: String,

    pub location: SchemaLocation,
    pub summary: SnapshotSummary,
    pub tables: Vec<TableSnapshot>,
    pub views: Vec<ViewSnapshot>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CatalogSnapshot {
    /// Create an empty snapshot for a schema
    pub fn new(location: SchemaLocation) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            location,
            summary: SnapshotSummary::default(),
            tables: Vec::new(),
            views: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Add a table
    pub fn add_table(&mut self, table: TableSnapshot) {
        self.summary.tables += 1;
        self.summary.columns += table.columns.len();
        self.tables.push(table);
    }

    /// Add a view
    pub fn add_view(&mut self, view: ViewSnapshot) {
        self.summary.views += 1;
        self.views.push(view);
    }

    /// Add a diagnostic
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity >= Severity::Warn {
            self.summary.warnings += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Find a table by normalized name
    pub fn find_table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}
