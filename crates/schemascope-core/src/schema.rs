//! Catalog types and canonical type system

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::ident;

/// A warehouse namespace (database + schema)
///
/// Both parts are stored normalized (see [`crate::ident`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaLocation {
    /// Database name
    pub database: String,

    /// Schema name
    pub schema: String,
}

impl SchemaLocation {
    /// Create a new location, normalizing both parts
    pub fn new(database: impl AsRef<str>, schema: impl AsRef<str>) -> Self {
        Self {
            database: ident::normalize(database.as_ref()),
            schema: ident::normalize(schema.as_ref()),
        }
    }

    /// Quoted `"DATABASE"."SCHEMA"` path for query text
    pub fn qualified(&self) -> String {
        ident::qualify(&[&self.database, &self.schema])
    }
}

impl std::fmt::Display for SchemaLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.schema)
    }
}

/// Which metadata fields are meaningful for a base type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    /// Floating point: precision plus a decimal return scale
    Float,

    /// Fixed point: precision and scale
    Numeric,

    /// Character or binary: length
    CharacterOrBinary,

    /// No size metadata
    Other,
}

/// Warehouse base types the vendor type mapping resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaseType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Float,
    Double,
    Real,
    Char,
    Varchar,
    Text,
    Binary,
    Varbinary,
    Date,
    Time,
    DateTime,
    Timestamp,
    TimestampTz,
    TimestampLtz,
    TimestampNtz,
    Variant,
    Object,
    Array,
    Geography,
    Geometry,
    Vector,

    /// Untyped placeholder for vendor types with no mapping
    Null,
}

impl BaseType {
    /// The metadata family of this base type
    pub fn family(&self) -> TypeFamily {
        match self {
            Self::Float | Self::Double | Self::Real => TypeFamily::Float,
            Self::Decimal => TypeFamily::Numeric,
            Self::Char | Self::Varchar | Self::Text | Self::Binary | Self::Varbinary => {
                TypeFamily::CharacterOrBinary
            }
            _ => TypeFamily::Other,
        }
    }

    /// Stable upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Decimal => "DECIMAL",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Real => "REAL",
            Self::Char => "CHAR",
            Self::Varchar => "VARCHAR",
            Self::Text => "TEXT",
            Self::Binary => "BINARY",
            Self::Varbinary => "VARBINARY",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::DateTime => "DATETIME",
            Self::Timestamp => "TIMESTAMP",
            Self::TimestampTz => "TIMESTAMP_TZ",
            Self::TimestampLtz => "TIMESTAMP_LTZ",
            Self::TimestampNtz => "TIMESTAMP_NTZ",
            Self::Variant => "VARIANT",
            Self::Object => "OBJECT",
            Self::Array => "ARRAY",
            Self::Geography => "GEOGRAPHY",
            Self::Geometry => "GEOMETRY",
            Self::Vector => "VECTOR",
            Self::Null => "NULL",
        }
    }
}

impl std::fmt::Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor-neutral column type
///
/// Floating types keep a `decimal_return_scale` instead of a scale: they
/// round results differently from fixed-point types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalType {
    Float {
        base: BaseType,
        precision: Option<u32>,
        decimal_return_scale: Option<u32>,
    },

    Numeric {
        base: BaseType,
        precision: Option<u32>,
        scale: Option<u32>,
    },

    CharacterOrBinary {
        base: BaseType,
        length: Option<u32>,
    },

    Other {
        base: BaseType,
    },
}

impl CanonicalType {
    /// Untyped fallback for unrecognized vendor types
    pub fn opaque() -> Self {
        Self::Other { base: BaseType::Null }
    }

    /// Whether this is the untyped fallback
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Other { base: BaseType::Null })
    }

    /// The underlying base type
    pub fn base(&self) -> BaseType {
        match self {
            Self::Float { base, .. }
            | Self::Numeric { base, .. }
            | Self::CharacterOrBinary { base, .. }
            | Self::Other { base } => *base,
        }
    }
}

impl std::fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float { base, precision: Some(p), .. } => write!(f, "{}({})", base, p),
            Self::Numeric { base, precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => write!(f, "{}({}, {})", base, p, s),
                (Some(p), None) => write!(f, "{}({})", base, p),
                _ => write!(f, "{}", base),
            },
            Self::CharacterOrBinary { base, length: Some(l) } => write!(f, "{}({})", base, l),
            other => write!(f, "{}", other.base()),
        }
    }
}

/// Identity (auto-increment) sequence settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub start: i64,
    pub increment: i64,
}

/// A column as reported by the warehouse
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Normalized column name
    pub name: String,

    /// Canonical type
    pub canonical_type: CanonicalType,

    /// Whether NULLs are allowed
    pub nullable: bool,

    /// Default expression text
    pub default_value: Option<String>,

    /// Whether the column is an identity column
    pub is_autoincrement: bool,

    /// Identity settings (only for identity columns)
    pub identity: Option<Identity>,

    /// Vendor type as displayed to users, e.g. `NUMBER(10,2)`
    pub display_type: String,

    /// Column comment
    pub comment: Option<String>,

    /// Whether the column belongs to the table's primary key
    pub is_primary_key: bool,
}

/// Ordered columns of one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumns {
    /// Columns in warehouse ordinal order
    pub columns: Vec<ColumnDescriptor>,
}

impl TableColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Find a column by normalized name
    pub fn find_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Names of primary key columns, in column order
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// SHA-256 of the serialized columns, hex encoded
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(&self.columns).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

impl std::ops::Deref for TableColumns {
    type Target = [ColumnDescriptor];

    fn deref(&self) -> &Self::Target {
        &self.columns
    }
}

/// Primary key or unique constraint
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Constrained columns in key order
    pub constrained_columns: Vec<String>,

    /// Constraint name
    pub name: Option<String>,
}

/// Foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    /// Constraint name
    pub name: Option<String>,

    /// Referencing columns in key order
    pub constrained_columns: Vec<String>,

    /// Schema of the referred table, when it differs from the constrained table's
    pub referred_schema: Option<String>,

    /// Referred table
    pub referred_table: String,

    /// Referred columns, aligned with `constrained_columns`
    pub referred_columns: Vec<String>,
}

/// Primary keys by normalized table name
pub type PrimaryKeyMap = BTreeMap<String, KeyInfo>;

/// Foreign keys by normalized table name
pub type ForeignKeyMap = BTreeMap<String, Vec<ForeignKeyInfo>>;

/// Unique constraints by normalized table name
pub type UniqueConstraintMap = BTreeMap<String, Vec<KeyInfo>>;
