//! Diagnostic codes for recoverable introspection conditions
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    /// A column's vendor type has no mapping; an opaque type was used
    UnrecognizedVendorType,

    /// The schema-wide column query exceeded the warehouse result budget
    OversizedSchemaResult,

    /// A view definition could not be read (view not listed or text hidden)
    ViewDefinitionUnavailable,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnrecognizedVendorType => "UNRECOGNIZED_VENDOR_TYPE",
            Self::OversizedSchemaResult => "OVERSIZED_SCHEMA_RESULT",
            Self::ViewDefinitionUnavailable => "VIEW_DEFINITION_UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - metadata was degraded but the fetch continued
    Warn,

    /// Error
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The catalog object a diagnostic refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Schema (`database.schema`)
    pub schema: String,

    /// Table or view name
    pub table: Option<String>,

    /// Column name
    pub column: Option<String>,
}

impl ObjectRef {
    /// Reference a whole schema
    pub fn schema(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: None,
            column: None,
        }
    }

    /// Reference a table or view
    pub fn table(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: Some(table.into()),
            column: None,
        }
    }

    /// Reference a column
    pub fn column(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: Some(table.into()),
            column: Some(column.into()),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.schema)?;
        if let Some(table) = &self.table {
            write!(f, ".{}", table)?;
        }
        if let Some(column) = &self.column {
            write!(f, ".{}", column)?;
        }
        Ok(())
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Affected catalog object
    pub object: Option<ObjectRef>,

    /// Offending vendor type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_type: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            object: None,
            vendor_type: None,
        }
    }

    /// Set the affected object
    pub fn with_object(mut self, object: ObjectRef) -> Self {
        self.object = Some(object);
        self
    }

    /// Set the offending vendor type
    pub fn with_vendor_type(mut self, vendor_type: impl Into<String>) -> Self {
        self.vendor_type = Some(vendor_type.into());
        self
    }
}
