//! # Domain Model: Collections, Items, Loans, Users
//!
//! This module defines the core entities of kabinet. A [`Collection`] groups
//! [`Item`]s and carries the property schema that describes what an item in
//! that collection may hold. Items store their property values as plain
//! string rows; the schema (see [`crate::properties`]) gives those rows their
//! type and display semantics.
//!
//! ## Ownership
//!
//! - A `Collection` strictly owns its properties and items.
//! - An `Item` strictly owns its values and its [`Loan`]s.
//! - A [`User`] owns zero or more collections.
//!
//! ## Value Storage
//!
//! Item values are kept as `BTreeMap<String, Vec<String>>`: one entry per
//! property, one element per stored value row. Multiplicity is represented by
//! row count — zero rows means "unset", and the key is absent. There is no
//! empty-value row; empty strings are filtered before insertion (see
//! [`crate::properties::value::normalize_values`]).
//!
//! ## Visibility
//!
//! [`Visibility`] levels form a total order. A caller's effective access level
//! is their own rights, promoted to `Owner` when they own the resource (see
//! [`crate::access`]). `Hidden` exceeds even `Owner` and is never served by
//! normal reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::properties::Property;

/// Localized text: a map from locale code (e.g. `"en"`) to a string.
pub type Localized = BTreeMap<String, String>;

/// Build a [`Localized`] value holding a single translation.
pub fn localized(locale: &str, text: &str) -> Localized {
    let mut map = BTreeMap::new();
    map.insert(locale.to_string(), text.to_string());
    map
}

/// Pick the best available translation: the requested locale, then `"en"`,
/// then any entry at all.
pub fn localized_text<'a>(text: &'a Localized, locale: &str) -> Option<&'a str> {
    text.get(locale)
        .or_else(|| text.get("en"))
        .or_else(|| text.values().next())
        .map(String::as_str)
}

/// Read-access level gating collections, items, and properties.
///
/// The derived `Ord` follows declaration order, which is the access scale:
/// `Public=0 < Authenticated=1 < Shared=2 < Owner=3 < Hidden=4`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Authenticated,
    Shared,
    Owner,
    Hidden,
}

impl Visibility {
    /// The numeric access level (0–4).
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Map a numeric level back onto the scale. Out-of-range input clamps
    /// to `Hidden`.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Visibility::Public,
            1 => Visibility::Authenticated,
            2 => Visibility::Shared,
            3 => Visibility::Owner,
            _ => Visibility::Hidden,
        }
    }
}

/// A user-owned grouping of items sharing one property schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub name: Localized,
    #[serde(default)]
    pub description: Localized,
    /// Free-form type tag ("books", "games", ...).
    pub kind: String,
    /// Opaque `media://` reference to the collection cover, if any.
    #[serde(default)]
    pub cover: Option<String>,
    pub owner: Uuid,
    #[serde(default)]
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Ordered property schema. Order is the display order.
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Collection {
    pub fn new(name: Localized, kind: impl Into<String>, owner: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description: Localized::new(),
            kind: kind.into(),
            cover: None,
            owner,
            visibility: Visibility::Public,
            created_at: now,
            updated_at: now,
            properties: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    /// The property flagged `is_title`, if any. Source of an item's
    /// denormalized display name and the default sort key.
    pub fn title_property(&self) -> Option<&Property> {
        self.properties.iter().find(|p| p.is_title)
    }

    /// The property flagged `is_cover`, if any.
    pub fn cover_property(&self) -> Option<&Property> {
        self.properties.iter().find(|p| p.is_cover)
    }
}

/// A single catalogued entry within a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub collection_id: Uuid,
    /// Denormalized display name, derived from the title property's value.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Property name → stored value rows. Every key must correspond to a
    /// property defined on the owning collection.
    #[serde(default)]
    pub values: BTreeMap<String, Vec<String>>,
}

impl Item {
    pub fn new(collection_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            collection_id,
            name: String::new(),
            visibility: Visibility::Public,
            created_at: now,
            updated_at: now,
            values: BTreeMap::new(),
        }
    }

    /// First stored value for a property, if any.
    pub fn first_value(&self, property: &str) -> Option<&str> {
        self.values
            .get(property)
            .and_then(|vs| vs.first())
            .map(String::as_str)
    }
}

/// Lifecycle of a loan. The enum is linear but transition order is not
/// enforced beyond what the store operations set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanState {
    Asked,
    Rejected,
    Accepted,
    Lent,
    Returned,
}

/// A borrow record attached to an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: Uuid,
    pub item_id: Uuid,
    pub state: LoanState,
    #[serde(default)]
    pub lent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub returned_at: Option<DateTime<Utc>>,
    /// Free-form borrower reference (name, email, user id...).
    pub borrower: String,
    #[serde(default)]
    pub notes: String,
    pub requested_at: DateTime<Utc>,
}

impl Loan {
    pub fn new(item_id: Uuid, borrower: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            state: LoanState::Asked,
            lent_at: None,
            returned_at: None,
            borrower: borrower.into(),
            notes: String::new(),
            requested_at: Utc::now(),
        }
    }

    /// Whether the item is currently out with the borrower.
    pub fn is_active(&self) -> bool {
        self.state == LoanState::Lent && self.returned_at.is_none()
    }
}

/// An account that may own collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Unique, immutable identity key.
    pub username: String,
    #[serde(default)]
    pub password_hash: String,
    #[serde(default)]
    pub email: String,
    /// Opaque `media://` reference to the avatar, if any.
    #[serde(default)]
    pub avatar: Option<String>,
    pub enabled: bool,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: String::new(),
            email: String::new(),
            avatar: None,
            enabled: true,
        }
    }
}
