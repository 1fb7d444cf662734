//! Identifier normalization and quoting
//!
//! The warehouse folds unquoted identifiers to UPPERCASE and treats quoted
//! identifiers as case-sensitive. Inside schemascope every identifier is kept
//! in its *normalized* form:
//!
//! - case-insensitive identifiers are lowercase (`ORDERS` -> `orders`)
//! - case-sensitive or special identifiers stay double-quoted (`"MyTable"`,
//!   and `"events"` for a table created as `"events"`)
//!
//! Names read back from the warehouse go through [`normalize_stored`]; names
//! supplied by callers go through [`normalize`], where an unquoted `orders`
//! still means the case-insensitive `ORDERS`. [`denormalize`] reverses the
//! folding right before a name is bound into query text, and [`quote`] /
//! [`quote_literal`] are the only ways a name may enter query text at all.

use regex::Regex;
use std::sync::OnceLock;

fn simple_identifier() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier pattern is valid")
    })
}

/// Check if a name is a plain identifier that needs no quoting in any case
fn is_simple(name: &str) -> bool {
    simple_identifier().is_match(name)
}

/// Check if a name is wrapped in double quotes
pub fn is_quoted(name: &str) -> bool {
    name.len() >= 2 && name.starts_with('"') && name.ends_with('"')
}

/// Check if a normalized name must be quoted to keep its meaning
pub fn requires_quotes(name: &str) -> bool {
    !is_simple(name) || name != name.to_lowercase()
}

/// Convert a name exactly as the warehouse stores it to its normalized form
///
/// Only all-uppercase simple names were created case-insensitively; every
/// other stored name (including all-lowercase ones) is case-sensitive and
/// comes back quoted. `denormalize(normalize_stored(x)) == x` for any `x`.
pub fn normalize_stored(name: &str) -> String {
    if is_folded(name) {
        return name.to_lowercase();
    }
    escape(name)
}

/// Normalize a caller-supplied name
///
/// Unquoted simple names are case-insensitive (`orders` and `ORDERS` both
/// mean the same object); mixed-case names stay case-sensitive. Quoted names
/// that spell a folded identifier (`"ORDERS"`) collapse to the
/// case-insensitive form. Idempotent, and the output of [`normalize_stored`]
/// is already normalized.
pub fn normalize(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    if is_quoted(name) {
        let stored = unquote(name);
        return normalize_stored(&stored);
    }

    if is_simple(name) && (name == name.to_uppercase() || name == name.to_lowercase()) {
        return name.to_lowercase();
    }

    escape(name)
}

/// Convert a normalized name back to the form the warehouse stores
pub fn denormalize(name: &str) -> String {
    if is_quoted(name) {
        return unquote(name);
    }

    if is_simple(name) && name == name.to_lowercase() {
        return name.to_uppercase();
    }

    name.to_string()
}

/// Simple identifier already in the warehouse's folded (uppercase) form
fn is_folded(name: &str) -> bool {
    is_simple(name) && name == name.to_uppercase()
}

fn escape(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Wrap a name in double quotes exactly once
pub fn quote(name: &str) -> String {
    if is_quoted(name) {
        return name.to_string();
    }
    escape(name)
}

/// Strip one level of double quotes, collapsing escaped quotes
pub fn unquote(name: &str) -> String {
    if is_quoted(name) {
        name[1..name.len() - 1].replace("\"\"", "\"")
    } else {
        name.to_string()
    }
}

/// Render a value as a single-quoted string literal
///
/// Backslashes are escape characters inside warehouse string literals, so
/// they are doubled along with single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Render a normalized name as a quoted identifier in its stored form
pub fn quote_normalized(name: &str) -> String {
    escape(&denormalize(name))
}

/// Join normalized name parts into a quoted, dot-separated path
pub fn qualify(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| quote_normalized(part))
        .collect::<Vec<_>>()
        .join(".")
}
