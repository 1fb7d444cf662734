//! Snowflake type resolution
//!
//! Maps the `data_type` reported by `INFORMATION_SCHEMA.COLUMNS` plus the
//! length/precision/scale columns into a [`CanonicalType`]. Unknown vendor
//! types never fail a fetch: they resolve to [`CanonicalType::opaque`] and the
//! caller records a diagnostic.

use schemascope_core::{BaseType, CanonicalType, TypeFamily};

/// Size metadata reported alongside a vendor type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeMetadata {
    pub char_length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

/// Outcome of resolving a vendor type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Known(CanonicalType),

    /// No mapping exists; the opaque fallback should be used
    Unrecognized,
}

impl Resolution {
    /// The canonical type, falling back to the opaque type
    pub fn into_type(self) -> CanonicalType {
        match self {
            Self::Known(canonical) => canonical,
            Self::Unrecognized => CanonicalType::opaque(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

/// Look up the base type of a Snowflake type name
///
/// Accepts any case and ignores a parenthesised size suffix (`NUMBER(38,0)`).
pub fn base_type(vendor_type: &str) -> Option<BaseType> {
    let name = vendor_type
        .split('(')
        .next()
        .unwrap_or(vendor_type)
        .trim()
        .to_uppercase();

    let base = match name.as_str() {
        "BOOLEAN" => BaseType::Boolean,

        "NUMBER" | "DECIMAL" | "DEC" | "NUMERIC" | "FIXED" => BaseType::Decimal,
        "INT" | "INTEGER" => BaseType::Integer,
        "BIGINT" => BaseType::BigInt,
        "SMALLINT" | "BYTEINT" => BaseType::SmallInt,
        "TINYINT" => BaseType::TinyInt,

        "FLOAT" | "FLOAT4" | "FLOAT8" => BaseType::Float,
        "DOUBLE" | "DOUBLE PRECISION" => BaseType::Double,
        "REAL" => BaseType::Real,

        "VARCHAR" | "STRING" | "TEXT" | "NVARCHAR" | "NVARCHAR2" | "CHAR VARYING"
        | "NCHAR VARYING" => BaseType::Varchar,
        "CHAR" | "CHARACTER" | "NCHAR" => BaseType::Char,
        "BINARY" | "VARBINARY" => BaseType::Binary,

        "DATE" => BaseType::Date,
        "TIME" => BaseType::Time,
        "DATETIME" => BaseType::DateTime,
        "TIMESTAMP" => BaseType::Timestamp,
        "TIMESTAMP_TZ" => BaseType::TimestampTz,
        "TIMESTAMP_LTZ" => BaseType::TimestampLtz,
        "TIMESTAMP_NTZ" => BaseType::TimestampNtz,

        "VARIANT" => BaseType::Variant,
        "OBJECT" => BaseType::Object,
        "ARRAY" => BaseType::Array,
        "GEOGRAPHY" => BaseType::Geography,
        "GEOMETRY" => BaseType::Geometry,
        "VECTOR" => BaseType::Vector,

        _ => return None,
    };

    Some(base)
}

/// Attach the metadata fields that are meaningful for a base type
pub fn canonical(base: BaseType, meta: TypeMetadata) -> CanonicalType {
    match base.family() {
        TypeFamily::Float => CanonicalType::Float {
            base,
            precision: meta.precision,
            decimal_return_scale: meta.scale,
        },
        TypeFamily::Numeric => CanonicalType::Numeric {
            base,
            precision: meta.precision,
            scale: meta.scale,
        },
        TypeFamily::CharacterOrBinary => CanonicalType::CharacterOrBinary {
            base,
            length: meta.char_length,
        },
        TypeFamily::Other => CanonicalType::Other { base },
    }
}

/// Resolve a vendor type name and its metadata
pub fn resolve(vendor_type: &str, meta: TypeMetadata) -> Resolution {
    match base_type(vendor_type) {
        Some(base) => Resolution::Known(canonical(base, meta)),
        None => Resolution::Unrecognized,
    }
}

/// Human-readable vendor type, e.g. `VARCHAR(16)` or `NUMBER(10,2)`
pub fn display_type(vendor_type: &str, meta: TypeMetadata) -> String {
    let char_length = meta.char_length.filter(|len| *len > 0);

    match (char_length, meta.precision, meta.scale) {
        (Some(len), _, _) => format!("{}({})", vendor_type, len),
        (None, Some(p), None) => format!("{}({})", vendor_type, p),
        (None, Some(p), Some(s)) => format!("{}({},{})", vendor_type, p, s),
        _ => vendor_type.to_string(),
    }
}
