//! Property definitions and the name-guessing table.
//!
//! A [`Property`] describes one named field of a collection schema: its type,
//! multiplicity, visibility, and display flags. Properties are created
//! explicitly through the schema API or implicitly by the import pipeline,
//! which calls [`guess_config_from_name`] for fields it has never seen.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::model::{localized, Localized, Visibility};

/// The value type of a property.
///
/// The type determines how filter expressions are evaluated (see
/// [`super::filter`]) and how values are rendered; storage itself is
/// untyped string rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    Text,
    LongText,
    Number,
    Date,
    DateTime,
    Rating,
    YesNo,
    Url,
    Image,
    File,
    Color,
}

/// A named, typed field definition scoped to a collection.
///
/// `name` is the immutable identity key within the collection; everything
/// else may be updated. At most one property per collection carries each of
/// the unique flags (`is_id`, `is_title`, `is_sub_title`, `is_cover`) — the
/// store clears rivals as part of any write that sets one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub kind: PropertyType,
    #[serde(default)]
    pub label: Localized,
    #[serde(default)]
    pub description: Localized,
    #[serde(default)]
    pub default_value: Option<String>,
    /// Whether the property may hold more than one value per item.
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub hide_label: bool,
    #[serde(default)]
    pub is_title: bool,
    #[serde(default)]
    pub is_sub_title: bool,
    #[serde(default)]
    pub is_cover: bool,
    #[serde(default)]
    pub is_id: bool,
    /// Shown in reduced item projections alongside title and cover.
    #[serde(default)]
    pub preview: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub hidden: bool,
    /// Display order within the collection.
    #[serde(default)]
    pub order: u32,
}

impl Property {
    /// Materialize a property from creation params. Omitted params take
    /// type-specific defaults; the default type is `Text`.
    pub fn from_params(name: &str, params: PropertyParams, order: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: params.kind.unwrap_or_default(),
            label: params.label.unwrap_or_default(),
            description: params.description.unwrap_or_default(),
            default_value: params.default_value,
            multiple: params.multiple,
            visibility: params.visibility.unwrap_or_default(),
            required: params.required,
            hide_label: params.hide_label,
            is_title: params.is_title,
            is_sub_title: params.is_sub_title,
            is_cover: params.is_cover,
            is_id: params.is_id,
            preview: params.preview,
            filterable: params.filterable,
            sortable: params.sortable,
            searchable: params.searchable,
            hidden: params.hidden,
            order,
        }
    }
}

/// Creation parameters for a property. Every field is optional; omitted
/// fields fall back to defaults when the property is materialized.
#[derive(Debug, Clone, Default)]
pub struct PropertyParams {
    pub kind: Option<PropertyType>,
    pub label: Option<Localized>,
    pub description: Option<Localized>,
    pub default_value: Option<String>,
    pub multiple: bool,
    pub visibility: Option<Visibility>,
    pub required: bool,
    pub hide_label: bool,
    pub is_title: bool,
    pub is_sub_title: bool,
    pub is_cover: bool,
    pub is_id: bool,
    pub preview: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub searchable: bool,
    pub hidden: bool,
}

impl PropertyParams {
    pub fn kind(mut self, kind: PropertyType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn titled(mut self) -> Self {
        self.is_title = true;
        self
    }

    pub fn cover(mut self) -> Self {
        self.is_cover = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// Partial update for a property.
///
/// Identity fields (name, owning collection) are deliberately absent: the
/// patch type is the whitelist, so identity can never be overwritten no
/// matter what the caller sends.
#[derive(Debug, Clone, Default)]
pub struct PropertyPatch {
    pub kind: Option<PropertyType>,
    pub label: Option<Localized>,
    pub description: Option<Localized>,
    /// `Some(None)` clears the default value.
    pub default_value: Option<Option<String>>,
    pub multiple: Option<bool>,
    pub visibility: Option<Visibility>,
    pub required: Option<bool>,
    pub hide_label: Option<bool>,
    pub is_title: Option<bool>,
    pub is_sub_title: Option<bool>,
    pub is_cover: Option<bool>,
    pub is_id: Option<bool>,
    pub preview: Option<bool>,
    pub filterable: Option<bool>,
    pub sortable: Option<bool>,
    pub searchable: Option<bool>,
    pub hidden: Option<bool>,
    pub order: Option<u32>,
}

impl PropertyPatch {
    /// Apply this patch to a property in place.
    pub fn apply(&self, prop: &mut Property) {
        if let Some(kind) = self.kind {
            prop.kind = kind;
        }
        if let Some(label) = &self.label {
            prop.label = label.clone();
        }
        if let Some(description) = &self.description {
            prop.description = description.clone();
        }
        if let Some(default_value) = &self.default_value {
            prop.default_value = default_value.clone();
        }
        if let Some(multiple) = self.multiple {
            prop.multiple = multiple;
        }
        if let Some(visibility) = self.visibility {
            prop.visibility = visibility;
        }
        if let Some(required) = self.required {
            prop.required = required;
        }
        if let Some(hide_label) = self.hide_label {
            prop.hide_label = hide_label;
        }
        if let Some(is_title) = self.is_title {
            prop.is_title = is_title;
        }
        if let Some(is_sub_title) = self.is_sub_title {
            prop.is_sub_title = is_sub_title;
        }
        if let Some(is_cover) = self.is_cover {
            prop.is_cover = is_cover;
        }
        if let Some(is_id) = self.is_id {
            prop.is_id = is_id;
        }
        if let Some(preview) = self.preview {
            prop.preview = preview;
        }
        if let Some(filterable) = self.filterable {
            prop.filterable = filterable;
        }
        if let Some(sortable) = self.sortable {
            prop.sortable = sortable;
        }
        if let Some(searchable) = self.searchable {
            prop.searchable = searchable;
        }
        if let Some(hidden) = self.hidden {
            prop.hidden = hidden;
        }
        if let Some(order) = self.order {
            prop.order = order;
        }
    }
}

/// Field-name roots with a known best-guess configuration. Matching is
/// case-sensitive.
static GUESS_TABLE: Lazy<BTreeMap<&'static str, fn() -> PropertyParams>> = Lazy::new(|| {
    let mut table: BTreeMap<&'static str, fn() -> PropertyParams> = BTreeMap::new();
    table.insert("title", || PropertyParams::default().titled());
    for root in ["cover", "image", "poster", "picture"] {
        table.insert(root, || {
            PropertyParams::default().kind(PropertyType::Image).cover()
        });
    }
    table.insert("rating", || {
        PropertyParams::default()
            .kind(PropertyType::Rating)
            .sortable()
    });
    table.insert("year", || PropertyParams::default().sortable());
    for root in ["author", "editor", "genre", "format", "tag", "language"] {
        table.insert(root, || PropertyParams::default().filterable());
    }
    for root in ["color", "colour"] {
        table.insert(root, || PropertyParams::default().kind(PropertyType::Color));
    }
    table
});

/// Best-guess property configuration for a bare field name.
///
/// Used exclusively by the import pipeline when auto-creating properties for
/// unrecognized fields. Matching is case-sensitive on a fixed table of known
/// roots; a trailing `s` is stripped when the remainder is a known root, and
/// pluralized names additionally become multi-valued (a pluralized cover
/// root also loses its cover flag: a gallery is not one cover). Unrecognized
/// names yield the default configuration (type `Text`, no flags).
/// Never fails.
pub fn guess_config_from_name(name: &str) -> PropertyParams {
    let (root, plural) = match name.strip_suffix('s') {
        Some(stripped) if GUESS_TABLE.contains_key(stripped) => (stripped, true),
        _ => (name, false),
    };

    let mut params = GUESS_TABLE
        .get(root)
        .map(|build| build())
        .unwrap_or_default();
    if plural {
        params.multiple = true;
        params.is_cover = false;
    }
    params.label = Some(localized("en", &capitalize(name)));
    params
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
