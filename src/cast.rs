//! Target types and the casting algorithms behind them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Tokens (lowercased) that the boolean cast treats as true.
pub const TRUTHY_STRINGS: [&str; 6] = ["true", "on", "ok", "y", "yes", "1"];

/// A caller-supplied conversion from raw string to [`Value`].
///
/// The error string becomes the message of an
/// [`EnvError::Cast`](crate::EnvError::Cast).
pub type CustomCast = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;

/// Target type for casting a raw environment string.
#[derive(Clone)]
pub enum Cast {
    /// Identity: the raw string as [`Value::Str`].
    Str,
    /// Membership in [`TRUTHY_STRINGS`], case-insensitive. Never fails.
    Bool,
    /// Decimal integer, surrounding whitespace tolerated.
    Int,
    /// Locale-tolerant float: `1,234.56` and `1.234,56` both parse.
    Float,
    /// Comma-separated sequence, elements trimmed, empty segments dropped.
    List,
    /// Same parse as [`Cast::List`]; kept as a distinct target name.
    Tuple,
    /// Like [`Cast::List`] but deduplicated, first occurrence wins.
    Set,
    /// Comma-separated `key=value` pairs.
    Dict,
    /// Any JSON document, via `serde_json`.
    Json,
    /// Absolute URL, via the `url` crate.
    Url,
    /// Arbitrary caller-supplied conversion.
    Custom(CustomCast),
}

impl Cast {
    /// Look up a built-in cast by name, as used by
    /// [`Env::cast_named`](crate::Env::cast_named).
    pub fn from_name(name: &str) -> Option<Cast> {
        match name {
            "str" | "string" => Some(Cast::Str),
            "bool" => Some(Cast::Bool),
            "int" => Some(Cast::Int),
            "float" => Some(Cast::Float),
            "list" => Some(Cast::List),
            "tuple" => Some(Cast::Tuple),
            "set" => Some(Cast::Set),
            "dict" => Some(Cast::Dict),
            "json" => Some(Cast::Json),
            "url" => Some(Cast::Url),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Cast::Str => "str",
            Cast::Bool => "bool",
            Cast::Int => "int",
            Cast::Float => "float",
            Cast::List => "list",
            Cast::Tuple => "tuple",
            Cast::Set => "set",
            Cast::Dict => "dict",
            Cast::Json => "json",
            Cast::Url => "url",
            Cast::Custom(_) => "custom",
        }
    }

    /// Convert a raw string. `subcast` applies to elements of structured
    /// targets and is ignored by scalar ones.
    pub(crate) fn apply(&self, raw: &str, subcast: Option<&Cast>) -> Result<Value, String> {
        match self {
            Cast::Str => Ok(Value::Str(raw.to_string())),
            Cast::Bool => Ok(Value::Bool(cast_bool(raw))),
            Cast::Int => cast_int(raw).map(Value::Int),
            Cast::Float => cast_float(raw).map(Value::Float),
            Cast::List | Cast::Tuple => cast_sequence(raw, subcast).map(Value::List),
            Cast::Set => cast_sequence(raw, subcast)
                .map(dedup_preserving_order)
                .map(Value::Set),
            Cast::Dict => cast_dict(raw, subcast).map(Value::Dict),
            Cast::Json => serde_json::from_str(raw)
                .map(Value::Json)
                .map_err(|e| format!("invalid json: {e}")),
            Cast::Url => url::Url::parse(raw)
                .map(Value::Url)
                .map_err(|e| format!("invalid url '{raw}': {e}")),
            Cast::Custom(convert) => convert(raw),
        }
    }
}

impl fmt::Debug for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cast::Custom(_) => f.write_str("Custom(..)"),
            other => f.write_str(other.name()),
        }
    }
}

impl fmt::Display for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn cast_bool(raw: &str) -> bool {
    let lowered = raw.to_lowercase();
    TRUTHY_STRINGS.contains(&lowered.as_str())
}

fn cast_int(raw: &str) -> Result<i64, String> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .map_err(|e| format!("invalid integer '{trimmed}': {e}"))
}

/// Parse a float out of human-formatted input.
///
/// Everything except digits, commas, and dots is discarded, then the last
/// `,`/`.` group is taken as the fraction and all earlier groups as the
/// integer part. `1,234.56`, `1.234,56`, and `$ 1,234.56` all come out as
/// 1234.56. Signs are discarded along with the other symbols, so the
/// result is always non-negative, and a lone thousands separator reads as
/// a decimal point (`1,000` is 1.0).
fn cast_float(raw: &str) -> Result<f64, String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.'))
        .collect();
    let parts: Vec<&str> = cleaned.split([',', '.']).collect();
    let normalized = match parts.as_slice() {
        [single] => (*single).to_string(),
        [groups @ .., fraction] => format!("{}.{}", groups.concat(), fraction),
        // split never yields zero parts
        [] => String::new(),
    };
    normalized
        .parse::<f64>()
        .map_err(|e| format!("invalid float '{raw}': {e}"))
}

/// Split on commas, drop segments that are empty before trimming, trim the
/// rest, subcast each element.
fn cast_sequence(raw: &str, subcast: Option<&Cast>) -> Result<Vec<Value>, String> {
    raw.split(',')
        .filter(|segment| !segment.is_empty())
        .map(|segment| cast_element(segment.trim(), subcast))
        .collect()
}

fn cast_element(trimmed: &str, subcast: Option<&Cast>) -> Result<Value, String> {
    match subcast {
        Some(cast) => cast.apply(trimmed, None),
        None => Ok(Value::Str(trimmed.to_string())),
    }
}

fn dedup_preserving_order(items: Vec<Value>) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

/// Split on commas, then each entry on its first `=`. Keys and values are
/// trimmed, values subcast, duplicate keys resolved last-wins. A wholly
/// empty string is an empty dict, but an entry without `=` is an error.
fn cast_dict(raw: &str, subcast: Option<&Cast>) -> Result<BTreeMap<String, Value>, String> {
    let mut entries = BTreeMap::new();
    if raw.is_empty() {
        return Ok(entries);
    }
    for segment in raw.split(',') {
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| format!("invalid dict entry '{}': missing '='", segment.trim()))?;
        entries.insert(
            key.trim().to_string(),
            cast_element(value.trim(), subcast)?,
        );
    }
    Ok(entries)
}
