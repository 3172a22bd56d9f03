//! Property schema: the dynamic, per-collection type system.
//!
//! A collection's schema is an ordered list of [`Property`] definitions. The
//! schema drives three things:
//! - storage of heterogeneous item values (typed, multi-valued),
//! - type-aware filtering and sorting ([`filter`]),
//! - the import pipeline's auto-creation of unknown fields
//!   ([`guess_config_from_name`]).

pub mod filter;
pub mod spec;
pub mod value;

pub use filter::{matches_any, value_matches};
pub use spec::{guess_config_from_name, Property, PropertyParams, PropertyPatch, PropertyType};
pub use value::{coerce_bool, normalize_values, parse_number};
