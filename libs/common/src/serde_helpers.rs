//! Shared Serde deserializers
//!
//! The registry backend is loose about scalar types. These helpers accept
//! the variants seen on the wire:
//! - `null` or `""` → None
//! - numbers where strings are expected (`1` → `"1"`)
//! - booleans as `true`/`false`, `0`/`1` or strings

use serde::{Deserialize, Deserializer};

// ============================================================================
// Default Value Functions (for serde #[serde(default = "...")] attributes)
// ============================================================================

/// Default value: true
pub fn bool_true() -> bool {
    true
}

/// Default value: false
pub fn bool_false() -> bool {
    false
}

// ============================================================================
// Custom Deserializers
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(i) => i.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }
    }
}

/// Custom deserializer for boolean fields that supports multiple input formats
///
/// Supports native JSON booleans, integers, and string values:
/// - JSON boolean: true, false
/// - JSON integer: 0 (false), 1 (true)
/// - string: "1"/"0", "true"/"false", "yes"/"no" (case-insensitive)
/// - null: false
pub fn deserialize_bool_flexible<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrStringOrInt {
        Bool(bool),
        Int(i64),
        String(String),
    }

    match Option::<BoolOrStringOrInt>::deserialize(deserializer)? {
        None => Ok(false),
        Some(BoolOrStringOrInt::Bool(b)) => Ok(b),
        Some(BoolOrStringOrInt::Int(i)) => match i {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(D::Error::custom(format!(
                "Invalid integer value {}, expected 0 or 1",
                i
            ))),
        },
        Some(BoolOrStringOrInt::String(s)) => {
            let t = s.trim();
            if t == "1" || t.eq_ignore_ascii_case("true") || t.eq_ignore_ascii_case("yes") {
                Ok(true)
            } else if t.is_empty()
                || t == "0"
                || t.eq_ignore_ascii_case("false")
                || t.eq_ignore_ascii_case("no")
            {
                Ok(false)
            } else {
                Err(D::Error::custom(format!(
                    "Invalid boolean value '{}', expected: 1/0, true/false, yes/no, or boolean",
                    s
                )))
            }
        },
    }
}

/// String field that may arrive as a number; `null` becomes an empty string
pub fn deserialize_string_lenient<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?
        .map(StringOrNumber::into_string)
        .unwrap_or_default())
}

/// Optional string where `null`, `""` and whitespace-only all mean None
pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?
        .map(StringOrNumber::into_string)
        .filter(|s| !s.trim().is_empty()))
}
