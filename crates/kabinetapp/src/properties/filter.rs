//! Type-aware filter predicates.
//!
//! A filter is a property name paired with an expression string; how the
//! expression is interpreted depends on the property's declared type:
//!
//! - `YesNo`: both sides are boolean-coerced and compared.
//! - `Number` / `Rating`: prefix syntax, tested in this order:
//!   `>n` (stored ≥ n), `<n` (stored ≤ n), `min<max` (closed interval),
//!   otherwise exact numeric equality.
//! - everything else: case-insensitive exact string equality.
//!
//! An item passes a filter iff at least one of its stored values for the
//! property matches; an item lacking the property entirely never passes.

use super::spec::PropertyType;
use super::value::{coerce_bool, parse_number};

/// Whether one stored value satisfies a filter expression under the given
/// property type.
pub fn value_matches(kind: PropertyType, stored: &str, expr: &str) -> bool {
    match kind {
        PropertyType::YesNo => coerce_bool(stored) == coerce_bool(expr),
        PropertyType::Number | PropertyType::Rating => number_matches(stored, expr),
        _ => stored.to_lowercase() == expr.to_lowercase(),
    }
}

/// Whether any of an item's stored values satisfies the expression.
pub fn matches_any(kind: PropertyType, values: &[String], expr: &str) -> bool {
    values.iter().any(|v| value_matches(kind, v, expr))
}

fn number_matches(stored: &str, expr: &str) -> bool {
    let Some(value) = parse_number(stored) else {
        return false;
    };

    // `>` and `<` prefixes are inclusive bounds.
    if let Some(rest) = expr.strip_prefix('>') {
        return parse_number(rest).is_some_and(|min| value >= min);
    }
    if let Some(rest) = expr.strip_prefix('<') {
        return parse_number(rest).is_some_and(|max| value <= max);
    }
    // `min<max`: closed interval.
    if let Some((lo, hi)) = expr.split_once('<') {
        return match (parse_number(lo), parse_number(hi)) {
            (Some(lo), Some(hi)) => value >= lo && value <= hi,
            _ => false,
        };
    }
    parse_number(expr).is_some_and(|want| value == want)
}
