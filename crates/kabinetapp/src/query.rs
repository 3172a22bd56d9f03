//! # Item Queries
//!
//! One read path serves every item listing: filter, sort, paginate, project.
//!
//! ## Pipeline
//!
//! 1. Visibility: items the caller may not see are dropped before anything
//!    else and never count toward totals.
//! 2. Filters: each entry pairs a property name with an expression; the
//!    property's declared type picks the predicate (see
//!    [`crate::properties::filter`]). All filters must pass.
//! 3. Sort: multiple keys applied as tie-breakers, first key outermost.
//!    An item lacking a sort key's value compares greater than one that has
//!    it, so it lands last ascending and first descending.
//! 4. Pagination: `limit == 0` disables it and `offset` is ignored. The
//!    reported `total` always counts every filter-passing item, not just
//!    the returned page.
//! 5. Projection: results are reduced to [`ItemCard`]s carrying the display
//!    name, the cover reference with its thumbnail set, the loan status and
//!    the title-, cover- and preview-flagged values.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::access::AccessContext;
use crate::error::Result;
use crate::media::MediaStorage;
use crate::model::{Collection, Item, Loan, Visibility};
use crate::properties::{matches_any, parse_number, PropertyType};
use crate::store::{CatalogStore, StorageBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One sort criterion: a property name and a direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortKey {
    pub property: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Query parameters for an item listing.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    /// Property name → filter expression. All entries must match.
    pub filters: BTreeMap<String, String>,
    /// Sort keys, first key outermost. Empty falls back to the title
    /// property (when defined) ascending.
    pub sort: Vec<SortKey>,
    /// Page size. `0` returns everything.
    pub limit: usize,
    pub offset: usize,
}

/// Reduced item projection for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCard {
    pub id: Uuid,
    pub name: String,
    pub visibility: Visibility,
    /// First value of the cover property, if any.
    pub cover: Option<String>,
    /// Size tag → media reference for the cover, resolved by the media
    /// collaborator.
    #[serde(default)]
    pub thumbnails: BTreeMap<String, String>,
    /// Whether the item is currently out on an active loan.
    pub lent: bool,
    /// Values of title-, cover- and preview-flagged properties.
    pub values: BTreeMap<String, Vec<String>>,
}

/// One page of query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<ItemCard>,
    /// Count of all filter-passing items, independent of pagination.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl<B: StorageBackend> CatalogStore<B> {
    /// Run an item query against one collection.
    pub fn dump_items(
        &self,
        ctx: &AccessContext,
        collection: Uuid,
        query: &ItemQuery,
        media: &dyn MediaStorage,
    ) -> Result<ItemPage> {
        let coll = self.get_collection(ctx, collection)?;
        let items = self.backend().load_items(&collection)?;
        let loans = self.backend().load_loans(&collection)?;

        let mut passing: Vec<Item> = items
            .into_values()
            .filter(|i| ctx.can_view(coll.owner, i.visibility))
            .filter(|i| passes_filters(&coll, i, &query.filters))
            .collect();
        let total = passing.len();

        // Deterministic base order before the stable tie-breaker sort.
        passing.sort_by_key(|i| (i.created_at, i.id));
        let keys = effective_sort(&coll, &query.sort);
        if !keys.is_empty() {
            passing.sort_by(|a, b| compare_items(&coll, a, b, &keys));
        }

        let page: Vec<ItemCard> = if query.limit == 0 {
            passing
                .iter()
                .map(|i| project(&coll, i, &loans, media))
                .collect()
        } else {
            passing
                .iter()
                .skip(query.offset)
                .take(query.limit)
                .map(|i| project(&coll, i, &loans, media))
                .collect()
        };

        Ok(ItemPage {
            items: page,
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }
}

fn passes_filters(coll: &Collection, item: &Item, filters: &BTreeMap<String, String>) -> bool {
    filters.iter().all(|(name, expr)| {
        let Some(prop) = coll.property(name) else {
            // Undefined filter properties are ignored rather than failing
            // the whole query.
            warn!(collection = %coll.id, property = %name, "filter on undefined property");
            return true;
        };
        let Some(values) = item.values.get(name) else {
            return false;
        };
        matches_any(prop.kind, values, expr)
    })
}

fn effective_sort(coll: &Collection, requested: &[SortKey]) -> Vec<SortKey> {
    if !requested.is_empty() {
        return requested.to_vec();
    }
    coll.title_property()
        .map(|p| vec![SortKey::asc(&p.name)])
        .unwrap_or_default()
}

fn compare_items(coll: &Collection, a: &Item, b: &Item, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let kind = coll
            .property(&key.property)
            .map(|p| p.kind)
            .unwrap_or_default();
        let ord = compare_values(
            kind,
            a.first_value(&key.property),
            b.first_value(&key.property),
        );
        let ord = match key.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Type-aware value comparison. A missing value compares as `Greater` so it
/// orders after present values.
fn compare_values(kind: PropertyType, a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match kind {
            PropertyType::Number | PropertyType::Rating => {
                match (parse_number(a), parse_number(b)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                    (None, None) => a.to_lowercase().cmp(&b.to_lowercase()),
                    (None, Some(_)) => Ordering::Greater,
                    (Some(_), None) => Ordering::Less,
                }
            }
            _ => a.to_lowercase().cmp(&b.to_lowercase()),
        },
    }
}

fn project(coll: &Collection, item: &Item, loans: &[Loan], media: &dyn MediaStorage) -> ItemCard {
    let cover = coll
        .cover_property()
        .and_then(|p| item.first_value(&p.name))
        .map(str::to_string);
    let thumbnails = cover
        .as_deref()
        .map(|reference| media.thumbnails(reference))
        .unwrap_or_default();
    let values: BTreeMap<String, Vec<String>> = coll
        .properties
        .iter()
        .filter(|p| p.is_title || p.is_cover || p.preview)
        .filter_map(|p| item.values.get(&p.name).map(|vs| (p.name.clone(), vs.clone())))
        .collect();

    ItemCard {
        id: item.id,
        name: item.name.clone(),
        visibility: item.visibility,
        cover,
        thumbnails,
        lent: loans.iter().any(|l| l.item_id == item.id && l.is_active()),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::NullMedia;
    use crate::model::localized;
    use crate::properties::{PropertyParams, PropertyPatch};
    use crate::store::{ItemDraft, MemBackend};

    fn store() -> CatalogStore<MemBackend> {
        CatalogStore::new(MemBackend::new())
    }

    fn library(store: &CatalogStore<MemBackend>) -> (Collection, AccessContext) {
        let coll = store
            .create_collection(localized("en", "Books"), "books", Uuid::new_v4())
            .unwrap();
        store
            .define_property(coll.id, "title", PropertyParams::default().titled())
            .unwrap();
        store
            .define_property(
                coll.id,
                "rating",
                PropertyParams::default()
                    .kind(PropertyType::Rating)
                    .sortable(),
            )
            .unwrap();
        store
            .define_property(
                coll.id,
                "genre",
                PropertyParams::default().filterable().multiple(),
            )
            .unwrap();
        let ctx = AccessContext::authenticated(coll.owner);
        (coll, ctx)
    }

    fn add(
        store: &CatalogStore<MemBackend>,
        coll: Uuid,
        title: &str,
        rating: &str,
        genres: &[&str],
    ) -> Item {
        let mut draft = ItemDraft::default();
        draft.properties.insert("title".into(), vec![title.into()]);
        draft
            .properties
            .insert("rating".into(), vec![rating.into()]);
        draft.properties.insert(
            "genre".into(),
            genres.iter().map(|g| g.to_string()).collect(),
        );
        store.create_item(coll, draft).unwrap()
    }

    fn seed(store: &CatalogStore<MemBackend>, coll: Uuid) {
        add(store, coll, "Dune", "5", &["sf"]);
        add(store, coll, "Emma", "3", &["classic"]);
        add(store, coll, "Foundation", "4", &["sf", "classic"]);
        add(store, coll, "Hyperion", "5", &["sf"]);
    }

    fn names(page: &ItemPage) -> Vec<&str> {
        page.items.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn default_sort_is_title_ascending() {
        let store = store();
        let (coll, ctx) = library(&store);
        seed(&store, coll.id);

        let page = store
            .dump_items(&ctx, coll.id, &ItemQuery::default(), &NullMedia)
            .unwrap();
        assert_eq!(names(&page), vec!["Dune", "Emma", "Foundation", "Hyperion"]);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn numeric_filter_uses_prefix_syntax() {
        let store = store();
        let (coll, ctx) = library(&store);
        seed(&store, coll.id);

        let mut query = ItemQuery::default();
        query.filters.insert("rating".into(), ">4".into());
        let page = store.dump_items(&ctx, coll.id, &query, &NullMedia).unwrap();
        assert_eq!(names(&page), vec!["Dune", "Foundation", "Hyperion"]);
    }

    #[test]
    fn multi_value_filter_matches_any_row() {
        let store = store();
        let (coll, ctx) = library(&store);
        seed(&store, coll.id);

        let mut query = ItemQuery::default();
        query.filters.insert("genre".into(), "Classic".into());
        let page = store.dump_items(&ctx, coll.id, &query, &NullMedia).unwrap();
        assert_eq!(names(&page), vec!["Emma", "Foundation"]);
    }

    #[test]
    fn filters_combine_with_and() {
        let store = store();
        let (coll, ctx) = library(&store);
        seed(&store, coll.id);

        let mut query = ItemQuery::default();
        query.filters.insert("genre".into(), "sf".into());
        query.filters.insert("rating".into(), "5".into());
        let page = store.dump_items(&ctx, coll.id, &query, &NullMedia).unwrap();
        assert_eq!(names(&page), vec!["Dune", "Hyperion"]);
    }

    #[test]
    fn sort_keys_break_ties_in_order() {
        let store = store();
        let (coll, ctx) = library(&store);
        seed(&store, coll.id);

        let query = ItemQuery {
            sort: vec![SortKey::desc("rating"), SortKey::asc("title")],
            ..Default::default()
        };
        let page = store.dump_items(&ctx, coll.id, &query, &NullMedia).unwrap();
        assert_eq!(names(&page), vec!["Dune", "Hyperion", "Foundation", "Emma"]);
    }

    #[test]
    fn rating_sorts_numerically_not_lexically() {
        let store = store();
        let (coll, ctx) = library(&store);
        add(&store, coll.id, "Nine", "9", &[]);
        add(&store, coll.id, "Ten", "10", &[]);

        let query = ItemQuery {
            sort: vec![SortKey::asc("rating")],
            ..Default::default()
        };
        let page = store.dump_items(&ctx, coll.id, &query, &NullMedia).unwrap();
        assert_eq!(names(&page), vec!["Nine", "Ten"]);
    }

    #[test]
    fn items_without_sort_value_order_last() {
        let store = store();
        let (coll, ctx) = library(&store);
        seed(&store, coll.id);
        let mut draft = ItemDraft::default();
        draft
            .properties
            .insert("title".into(), vec!["Unrated".into()]);
        store.create_item(coll.id, draft).unwrap();

        let query = ItemQuery {
            sort: vec![SortKey::asc("rating")],
            ..Default::default()
        };
        let page = store.dump_items(&ctx, coll.id, &query, &NullMedia).unwrap();
        assert_eq!(names(&page).last(), Some(&"Unrated"));
    }

    #[test]
    fn pagination_windows_but_total_counts_all() {
        let store = store();
        let (coll, ctx) = library(&store);
        seed(&store, coll.id);

        let query = ItemQuery {
            limit: 2,
            offset: 1,
            ..Default::default()
        };
        let page = store.dump_items(&ctx, coll.id, &query, &NullMedia).unwrap();
        assert_eq!(names(&page), vec!["Emma", "Foundation"]);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn zero_limit_returns_everything() {
        let store = store();
        let (coll, ctx) = library(&store);
        seed(&store, coll.id);

        let query = ItemQuery {
            limit: 0,
            offset: 99,
            ..Default::default()
        };
        let page = store.dump_items(&ctx, coll.id, &query, &NullMedia).unwrap();
        assert_eq!(page.items.len(), 4);
    }

    #[test]
    fn offset_past_end_yields_empty_page() {
        let store = store();
        let (coll, ctx) = library(&store);
        seed(&store, coll.id);

        let query = ItemQuery {
            limit: 10,
            offset: 10,
            ..Default::default()
        };
        let page = store.dump_items(&ctx, coll.id, &query, &NullMedia).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 4);
    }

    #[test]
    fn hidden_items_never_counted_for_strangers() {
        let store = store();
        let (coll, ctx) = library(&store);
        seed(&store, coll.id);
        store
            .create_item(
                coll.id,
                ItemDraft {
                    visibility: Some(Visibility::Hidden),
                    ..Default::default()
                },
            )
            .unwrap();

        let anon = AccessContext::anonymous();
        let page = store
            .dump_items(&anon, coll.id, &ItemQuery::default(), &NullMedia)
            .unwrap();
        assert_eq!(page.total, 4);
        // The owner sees the hidden item.
        let page = store
            .dump_items(&ctx, coll.id, &ItemQuery::default(), &NullMedia)
            .unwrap();
        assert_eq!(page.total, 5);
    }

    #[test]
    fn projection_carries_cover_and_preview_values() {
        let store = store();
        let (coll, ctx) = library(&store);
        store
            .define_property(
                coll.id,
                "cover",
                PropertyParams::default()
                    .kind(PropertyType::Image)
                    .cover(),
            )
            .unwrap();
        store
            .update_property(
                coll.id,
                "rating",
                PropertyPatch {
                    preview: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        let mut draft = ItemDraft::default();
        draft.properties.insert("title".into(), vec!["Dune".into()]);
        draft.properties.insert("rating".into(), vec!["5".into()]);
        draft
            .properties
            .insert("cover".into(), vec!["media://abc".into()]);
        draft
            .properties
            .insert("genre".into(), vec!["sf".into()]);
        store.create_item(coll.id, draft).unwrap();

        let page = store
            .dump_items(&ctx, coll.id, &ItemQuery::default(), &NullMedia)
            .unwrap();
        let card = &page.items[0];
        assert_eq!(card.name, "Dune");
        assert_eq!(card.cover.as_deref(), Some("media://abc"));
        assert_eq!(card.values["rating"], vec!["5"]);
        assert_eq!(card.values["title"], vec!["Dune"]);
        // genre has no title/cover/preview flag
        assert!(!card.values.contains_key("genre"));
        // NullMedia resolves no renditions
        assert!(card.thumbnails.is_empty());
    }

    #[test]
    fn lent_flag_reflects_active_loans() {
        let store = store();
        let (coll, ctx) = library(&store);
        let item = add(&store, coll.id, "Dune", "5", &[]);

        let loan = store.request_loan(coll.id, item.id, "alice").unwrap();
        let page = store
            .dump_items(&ctx, coll.id, &ItemQuery::default(), &NullMedia)
            .unwrap();
        assert!(!page.items[0].lent);

        store
            .advance_loan(coll.id, loan.id, crate::model::LoanState::Lent)
            .unwrap();
        let page = store
            .dump_items(&ctx, coll.id, &ItemQuery::default(), &NullMedia)
            .unwrap();
        assert!(page.items[0].lent);
    }

    #[test]
    fn filter_on_undefined_property_is_ignored() {
        let store = store();
        let (coll, ctx) = library(&store);
        seed(&store, coll.id);

        let mut query = ItemQuery::default();
        query.filters.insert("nope".into(), "x".into());
        let page = store.dump_items(&ctx, coll.id, &query, &NullMedia).unwrap();
        assert_eq!(page.total, 4);
    }
}
