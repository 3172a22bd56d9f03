//! Value normalization and coercion helpers.
//!
//! Stored values are plain strings; these helpers implement the write-side
//! normalization (empty rows are never stored) and the coercions the filter
//! engine applies when a property's declared type demands it.

/// Normalize an incoming value set to storable rows.
///
/// Empty elements are filtered out individually. An empty result means
/// "unset": the caller must not store the key at all.
pub fn normalize_values(values: &[String]) -> Vec<String> {
    values.iter().filter(|v| !v.is_empty()).cloned().collect()
}

/// Boolean coercion for `YesNo` values and filter strings.
///
/// Standard truthy forms ("1", "true", "yes", "y", "on", case-insensitive)
/// are true; everything else, the empty string included, is false.
pub fn coerce_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// Lenient numeric parse for `Number`/`Rating` values and filter operands.
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse().ok()
}
