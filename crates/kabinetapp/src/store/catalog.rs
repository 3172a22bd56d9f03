//! Business-logic store on top of a [`StorageBackend`].
//!
//! The catalog enforces everything the raw backend does not know about:
//!
//! - schema writes keep the unique display flags (`is_id`, `is_title`,
//!   `is_sub_title`, `is_cover`) unique within a collection,
//! - value writes are delete-then-insert and respect multiplicity,
//! - deletes cascade child documents before the parent row,
//! - reads are gated by the caller's [`AccessContext`].
//!
//! Every operation loads the documents it needs, mutates them in memory and
//! saves them back. There are no cross-document transactions; the cascade
//! order (values, loans, item, collection) bounds what a crash can leave
//! behind to orphan-free prefixes.

use std::collections::BTreeMap;

use tracing::{debug, error, warn};
use uuid::Uuid;

use super::backend::StorageBackend;
use crate::access::AccessContext;
use crate::error::{KabinetError, Result};
use crate::model::{Collection, Item, Loan, LoanState, Localized, User, Visibility};
use crate::properties::{normalize_values, Property, PropertyParams, PropertyPatch};

/// Partial update for a collection. `id`, `owner` and the property schema are
/// deliberately absent; the schema has its own operations.
#[derive(Debug, Clone, Default)]
pub struct CollectionPatch {
    pub name: Option<Localized>,
    pub description: Option<Localized>,
    pub kind: Option<String>,
    /// `Some(None)` clears the cover reference.
    pub cover: Option<Option<String>>,
    pub visibility: Option<Visibility>,
}

/// Creation parameters for an item.
#[derive(Debug, Clone, Default)]
pub struct ItemDraft {
    pub visibility: Option<Visibility>,
    /// Initial property values, keyed by property name. Keys that do not
    /// match a defined property are logged and skipped, never fatal.
    pub properties: BTreeMap<String, Vec<String>>,
}

/// Partial update for an item.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub visibility: Option<Visibility>,
    /// Property values to overwrite. Each key is replaced wholesale
    /// (delete-then-insert); keys not listed keep their rows. Keys that do
    /// not match a defined property are logged and skipped, never fatal.
    pub properties: BTreeMap<String, Vec<String>>,
}

/// The catalog store, generic over the storage backend.
pub struct CatalogStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> CatalogStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // --- Collections ---

    pub fn create_collection(
        &self,
        name: Localized,
        kind: impl Into<String>,
        owner: Uuid,
    ) -> Result<Collection> {
        let mut collections = self.backend.load_collections()?;
        let coll = Collection::new(name, kind, owner);
        debug!(collection = %coll.id, kind = %coll.kind, "creating collection");
        collections.insert(coll.id, coll.clone());
        self.backend.save_collections(&collections)?;
        Ok(coll)
    }

    /// Fetch a collection the caller is allowed to see. A collection that
    /// exists but is not visible reads as not found.
    pub fn get_collection(&self, ctx: &AccessContext, id: Uuid) -> Result<Collection> {
        let collections = self.backend.load_collections()?;
        collections
            .get(&id)
            .filter(|c| ctx.can_view(c.owner, c.visibility))
            .cloned()
            .ok_or(KabinetError::CollectionNotFound(id))
    }

    /// All collections visible to the caller, ordered by creation time.
    pub fn list_collections(&self, ctx: &AccessContext) -> Result<Vec<Collection>> {
        let collections = self.backend.load_collections()?;
        let mut visible: Vec<Collection> = collections
            .into_values()
            .filter(|c| ctx.can_view(c.owner, c.visibility))
            .collect();
        visible.sort_by_key(|c| (c.created_at, c.id));
        Ok(visible)
    }

    pub fn update_collection(&self, id: Uuid, patch: CollectionPatch) -> Result<Collection> {
        let mut collections = self.backend.load_collections()?;
        let coll = collections
            .get_mut(&id)
            .ok_or(KabinetError::CollectionNotFound(id))?;

        if let Some(name) = patch.name {
            coll.name = name;
        }
        if let Some(description) = patch.description {
            coll.description = description;
        }
        if let Some(kind) = patch.kind {
            coll.kind = kind;
        }
        if let Some(cover) = patch.cover {
            coll.cover = cover;
        }
        if let Some(visibility) = patch.visibility {
            coll.visibility = visibility;
        }
        coll.updated_at = chrono::Utc::now();

        let updated = coll.clone();
        self.backend.save_collections(&collections)?;
        Ok(updated)
    }

    /// Delete a collection and everything it owns. Child documents go first
    /// so a failure mid-way never leaves items pointing at a missing parent.
    pub fn delete_collection(&self, id: Uuid) -> Result<()> {
        let mut collections = self.backend.load_collections()?;
        if !collections.contains_key(&id) {
            return Err(KabinetError::CollectionNotFound(id));
        }
        self.backend.drop_collection(&id)?;
        collections.remove(&id);
        self.backend.save_collections(&collections)
    }

    // --- Property schema ---

    /// Define a property on a collection. Defining an already-existing name
    /// is a no-op returning the existing definition.
    pub fn define_property(
        &self,
        collection: Uuid,
        name: &str,
        params: PropertyParams,
    ) -> Result<Property> {
        if name.is_empty() {
            return Err(KabinetError::Validation(
                "property name must not be empty".to_string(),
            ));
        }
        let mut collections = self.backend.load_collections()?;
        let coll = collections
            .get_mut(&collection)
            .ok_or(KabinetError::CollectionNotFound(collection))?;

        if let Some(existing) = coll.property(name) {
            debug!(collection = %collection, property = name, "property already defined");
            return Ok(existing.clone());
        }

        let order = coll.properties.len() as u32;
        let prop = Property::from_params(name, params, order);
        coll.properties.push(prop.clone());
        reset_unique_flags(coll, name);
        coll.updated_at = chrono::Utc::now();

        let defined = coll
            .property(name)
            .cloned()
            .unwrap_or(prop);
        self.backend.save_collections(&collections)?;
        Ok(defined)
    }

    pub fn update_property(
        &self,
        collection: Uuid,
        name: &str,
        patch: PropertyPatch,
    ) -> Result<Property> {
        let mut collections = self.backend.load_collections()?;
        let coll = collections
            .get_mut(&collection)
            .ok_or(KabinetError::CollectionNotFound(collection))?;
        let prop = coll
            .property_mut(name)
            .ok_or_else(|| KabinetError::PropertyNotFound(name.to_string()))?;

        patch.apply(prop);
        reset_unique_flags(coll, name);
        coll.updated_at = chrono::Utc::now();

        let updated = coll
            .property(name)
            .cloned()
            .ok_or_else(|| KabinetError::PropertyNotFound(name.to_string()))?;
        self.backend.save_collections(&collections)?;
        Ok(updated)
    }

    /// Remove a property from the schema, cascading its value rows out of
    /// every item first.
    pub fn delete_property(&self, collection: Uuid, name: &str) -> Result<()> {
        let mut collections = self.backend.load_collections()?;
        let coll = collections
            .get_mut(&collection)
            .ok_or(KabinetError::CollectionNotFound(collection))?;
        if coll.property(name).is_none() {
            return Err(KabinetError::PropertyNotFound(name.to_string()));
        }

        let mut items = self.backend.load_items(&collection)?;
        let mut touched = false;
        for item in items.values_mut() {
            if item.values.remove(name).is_some() {
                item.updated_at = chrono::Utc::now();
                touched = true;
            }
        }
        if touched {
            self.backend.save_items(&collection, &items)?;
        }

        coll.properties.retain(|p| p.name != name);
        coll.updated_at = chrono::Utc::now();
        self.backend.save_collections(&collections)
    }

    // --- Items ---

    pub fn create_item(&self, collection: Uuid, draft: ItemDraft) -> Result<Item> {
        let collections = self.backend.load_collections()?;
        let coll = collections
            .get(&collection)
            .ok_or(KabinetError::CollectionNotFound(collection))?;

        let mut item = Item::new(collection);
        if let Some(visibility) = draft.visibility {
            item.visibility = visibility;
        }
        for (name, values) in &draft.properties {
            // Unknown keys are skipped, not fatal: a draft assembled by an
            // importer may carry fields the schema never adopted.
            if let Err(err) = write_values(coll, &mut item, name, values) {
                warn!(item = %item.id, property = %name, %err, "skipping value");
            }
        }
        derive_name(coll, &mut item);

        let mut items = self.backend.load_items(&collection)?;
        items.insert(item.id, item.clone());
        self.backend.save_items(&collection, &items)?;
        Ok(item)
    }

    /// Fetch an item the caller is allowed to see. Both the collection and
    /// the item itself must pass the visibility gate.
    pub fn get_item(&self, ctx: &AccessContext, collection: Uuid, id: Uuid) -> Result<Item> {
        let coll = self.get_collection(ctx, collection)?;
        let items = self.backend.load_items(&collection)?;
        items
            .get(&id)
            .filter(|i| ctx.can_view(coll.owner, i.visibility))
            .cloned()
            .ok_or(KabinetError::ItemNotFound(id))
    }

    /// Look an item up by an exact stored value of one property. Returns the
    /// lowest item id on ties so repeated lookups are deterministic.
    pub fn get_item_by_property(
        &self,
        ctx: &AccessContext,
        collection: Uuid,
        property: &str,
        value: &str,
    ) -> Result<Option<Item>> {
        if property.is_empty() || value.is_empty() {
            error!(collection = %collection, "item lookup with empty property or value");
            return Ok(None);
        }
        let coll = self.get_collection(ctx, collection)?;
        let items = self.backend.load_items(&collection)?;
        Ok(items
            .into_values()
            .filter(|i| ctx.can_view(coll.owner, i.visibility))
            .filter(|i| {
                i.values
                    .get(property)
                    .is_some_and(|vs| vs.iter().any(|v| v == value))
            })
            .min_by_key(|i| i.id))
    }

    /// Overwrite one property's value rows on an item. The write is
    /// delete-then-insert: existing rows for the property are dropped and the
    /// normalized new values take their place.
    pub fn set_property_value(
        &self,
        collection: Uuid,
        item: Uuid,
        property: &str,
        values: &[String],
    ) -> Result<Item> {
        let collections = self.backend.load_collections()?;
        let coll = collections
            .get(&collection)
            .ok_or(KabinetError::CollectionNotFound(collection))?;

        let mut items = self.backend.load_items(&collection)?;
        let entry = items.get_mut(&item).ok_or(KabinetError::ItemNotFound(item))?;

        write_values(coll, entry, property, values)?;
        derive_name(coll, entry);
        entry.updated_at = chrono::Utc::now();

        let updated = entry.clone();
        self.backend.save_items(&collection, &items)?;
        Ok(updated)
    }

    pub fn update_item(&self, collection: Uuid, id: Uuid, patch: ItemPatch) -> Result<Item> {
        let collections = self.backend.load_collections()?;
        let coll = collections
            .get(&collection)
            .ok_or(KabinetError::CollectionNotFound(collection))?;

        let mut items = self.backend.load_items(&collection)?;
        let item = items.get_mut(&id).ok_or(KabinetError::ItemNotFound(id))?;

        if let Some(visibility) = patch.visibility {
            item.visibility = visibility;
        }
        for (name, values) in &patch.properties {
            // Same tolerance as item creation: one bad key never drops the
            // rest of the patch.
            if let Err(err) = write_values(coll, item, name, values) {
                warn!(item = %item.id, property = %name, %err, "skipping value");
            }
        }
        derive_name(coll, item);
        item.updated_at = chrono::Utc::now();

        let updated = item.clone();
        self.backend.save_items(&collection, &items)?;
        Ok(updated)
    }

    /// Delete an item, cascading its loans first.
    pub fn delete_item(&self, collection: Uuid, id: Uuid) -> Result<()> {
        let mut items = self.backend.load_items(&collection)?;
        if !items.contains_key(&id) {
            return Err(KabinetError::ItemNotFound(id));
        }

        let mut loans = self.backend.load_loans(&collection)?;
        let before = loans.len();
        loans.retain(|l| l.item_id != id);
        if loans.len() != before {
            self.backend.save_loans(&collection, &loans)?;
        }

        items.remove(&id);
        self.backend.save_items(&collection, &items)
    }

    // --- Loans ---

    pub fn request_loan(
        &self,
        collection: Uuid,
        item: Uuid,
        borrower: impl Into<String>,
    ) -> Result<Loan> {
        let items = self.backend.load_items(&collection)?;
        if !items.contains_key(&item) {
            return Err(KabinetError::ItemNotFound(item));
        }
        let mut loans = self.backend.load_loans(&collection)?;
        let loan = Loan::new(item, borrower);
        loans.push(loan.clone());
        self.backend.save_loans(&collection, &loans)?;
        Ok(loan)
    }

    /// Move a loan to a new state. Entering `Lent` stamps `lent_at`,
    /// entering `Returned` stamps `returned_at`.
    pub fn advance_loan(&self, collection: Uuid, loan: Uuid, state: LoanState) -> Result<Loan> {
        let mut loans = self.backend.load_loans(&collection)?;
        let entry = loans
            .iter_mut()
            .find(|l| l.id == loan)
            .ok_or_else(|| KabinetError::Store(format!("loan not found: {loan}")))?;

        entry.state = state;
        match state {
            LoanState::Lent if entry.lent_at.is_none() => {
                entry.lent_at = Some(chrono::Utc::now());
            }
            LoanState::Returned if entry.returned_at.is_none() => {
                entry.returned_at = Some(chrono::Utc::now());
            }
            _ => {}
        }

        let updated = entry.clone();
        self.backend.save_loans(&collection, &loans)?;
        Ok(updated)
    }

    pub fn list_loans(&self, collection: Uuid) -> Result<Vec<Loan>> {
        self.backend.load_loans(&collection)
    }

    pub fn loans_for_item(&self, collection: Uuid, item: Uuid) -> Result<Vec<Loan>> {
        Ok(self
            .backend
            .load_loans(&collection)?
            .into_iter()
            .filter(|l| l.item_id == item)
            .collect())
    }

    pub fn delete_loan(&self, collection: Uuid, loan: Uuid) -> Result<()> {
        let mut loans = self.backend.load_loans(&collection)?;
        let before = loans.len();
        loans.retain(|l| l.id != loan);
        if loans.len() == before {
            return Err(KabinetError::Store(format!("loan not found: {loan}")));
        }
        self.backend.save_loans(&collection, &loans)
    }

    /// Whether the item is currently out on an active loan.
    pub fn is_lent(&self, collection: Uuid, item: Uuid) -> Result<bool> {
        Ok(self
            .backend
            .load_loans(&collection)?
            .iter()
            .any(|l| l.item_id == item && l.is_active()))
    }

    // --- Users ---

    pub fn create_user(&self, username: &str) -> Result<User> {
        if username.is_empty() {
            return Err(KabinetError::Validation(
                "username must not be empty".to_string(),
            ));
        }
        let mut users = self.backend.load_users()?;
        if users.values().any(|u| u.username == username) {
            return Err(KabinetError::Validation(format!(
                "username already taken: {username}"
            )));
        }
        let user = User::new(username);
        users.insert(user.id, user.clone());
        self.backend.save_users(&users)?;
        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        let users = self.backend.load_users()?;
        users
            .get(&id)
            .cloned()
            .ok_or_else(|| KabinetError::UserNotFound(id.to_string()))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        let users = self.backend.load_users()?;
        users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| KabinetError::UserNotFound(username.to_string()))
    }

    pub fn set_user_enabled(&self, id: Uuid, enabled: bool) -> Result<User> {
        let mut users = self.backend.load_users()?;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| KabinetError::UserNotFound(id.to_string()))?;
        user.enabled = enabled;
        let updated = user.clone();
        self.backend.save_users(&users)?;
        Ok(updated)
    }

    pub fn delete_user(&self, id: Uuid) -> Result<()> {
        let mut users = self.backend.load_users()?;
        if users.remove(&id).is_none() {
            return Err(KabinetError::UserNotFound(id.to_string()));
        }
        self.backend.save_users(&users)
    }
}

/// Clear each unique flag the named property holds from every other property
/// of the collection. Last write wins.
fn reset_unique_flags(coll: &mut Collection, winner: &str) {
    let Some(flags) = coll
        .property(winner)
        .map(|p| (p.is_id, p.is_title, p.is_sub_title, p.is_cover))
    else {
        return;
    };
    let (is_id, is_title, is_sub_title, is_cover) = flags;

    for prop in coll.properties.iter_mut().filter(|p| p.name != winner) {
        if is_id {
            prop.is_id = false;
        }
        if is_title {
            prop.is_title = false;
        }
        if is_sub_title {
            prop.is_sub_title = false;
        }
        if is_cover {
            prop.is_cover = false;
        }
    }
}

/// Delete-then-insert write of one property's value rows, enforcing that the
/// property is defined and respecting its multiplicity.
fn write_values(coll: &Collection, item: &mut Item, property: &str, values: &[String]) -> Result<()> {
    let prop = coll
        .property(property)
        .ok_or_else(|| KabinetError::PropertyNotFound(property.to_string()))?;

    let mut rows = normalize_values(values);
    if !prop.multiple && rows.len() > 1 {
        warn!(
            item = %item.id,
            property = %property,
            "single-valued property given multiple values, keeping the first"
        );
        rows.truncate(1);
    }

    item.values.remove(property);
    if !rows.is_empty() {
        item.values.insert(property.to_string(), rows);
    }
    Ok(())
}

/// Keep the item's denormalized display name in sync with the title property.
fn derive_name(coll: &Collection, item: &mut Item) {
    if let Some(title) = coll.title_property() {
        item.name = item.first_value(&title.name).unwrap_or_default().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::localized;
    use crate::properties::PropertyType;
    use crate::store::MemBackend;

    fn store() -> CatalogStore<MemBackend> {
        CatalogStore::new(MemBackend::new())
    }

    fn books(store: &CatalogStore<MemBackend>) -> Collection {
        let coll = store
            .create_collection(localized("en", "Books"), "books", Uuid::new_v4())
            .unwrap();
        store
            .define_property(coll.id, "title", PropertyParams::default().titled())
            .unwrap();
        store
            .define_property(coll.id, "tags", PropertyParams::default().multiple())
            .unwrap();
        coll
    }

    fn owner_ctx(coll: &Collection) -> AccessContext {
        AccessContext::authenticated(coll.owner)
    }

    #[test]
    fn define_property_is_idempotent() {
        let store = store();
        let coll = books(&store);

        let again = store
            .define_property(
                coll.id,
                "title",
                PropertyParams::default().kind(PropertyType::Number),
            )
            .unwrap();
        // Existing definition wins
        assert_eq!(again.kind, PropertyType::Text);
        assert!(again.is_title);

        let ctx = owner_ctx(&coll);
        let loaded = store.get_collection(&ctx, coll.id).unwrap();
        assert_eq!(loaded.properties.len(), 2);
    }

    #[test]
    fn unique_flags_move_to_last_writer() {
        let store = store();
        let coll = books(&store);
        store
            .define_property(coll.id, "subtitle", PropertyParams::default())
            .unwrap();

        store
            .update_property(
                coll.id,
                "subtitle",
                PropertyPatch {
                    is_title: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        let ctx = owner_ctx(&coll);
        let loaded = store.get_collection(&ctx, coll.id).unwrap();
        assert!(!loaded.property("title").unwrap().is_title);
        assert!(loaded.property("subtitle").unwrap().is_title);
    }

    #[test]
    fn set_property_value_replaces_rows() {
        let store = store();
        let coll = books(&store);
        let item = store.create_item(coll.id, ItemDraft::default()).unwrap();

        store
            .set_property_value(coll.id, item.id, "tags", &["a".into(), "b".into()])
            .unwrap();
        let updated = store
            .set_property_value(coll.id, item.id, "tags", &["c".into()])
            .unwrap();
        assert_eq!(updated.values["tags"], vec!["c"]);
    }

    #[test]
    fn single_valued_property_keeps_first_row() {
        let store = store();
        let coll = books(&store);
        let item = store.create_item(coll.id, ItemDraft::default()).unwrap();

        let updated = store
            .set_property_value(coll.id, item.id, "title", &["A".into(), "B".into()])
            .unwrap();
        assert_eq!(updated.values["title"], vec!["A"]);
        assert_eq!(updated.name, "A");
    }

    #[test]
    fn empty_values_unset_the_key() {
        let store = store();
        let coll = books(&store);
        let item = store.create_item(coll.id, ItemDraft::default()).unwrap();

        store
            .set_property_value(coll.id, item.id, "tags", &["a".into()])
            .unwrap();
        let updated = store
            .set_property_value(coll.id, item.id, "tags", &[])
            .unwrap();
        assert!(!updated.values.contains_key("tags"));
    }

    #[test]
    fn undefined_property_write_fails() {
        let store = store();
        let coll = books(&store);
        let item = store.create_item(coll.id, ItemDraft::default()).unwrap();

        let err = store
            .set_property_value(coll.id, item.id, "isbn", &["x".into()])
            .unwrap_err();
        assert!(matches!(err, KabinetError::PropertyNotFound(_)));
    }

    #[test]
    fn create_item_skips_unknown_draft_keys() {
        let store = store();
        let coll = books(&store);

        let mut draft = ItemDraft::default();
        draft.properties.insert("title".into(), vec!["Dune".into()]);
        draft.properties.insert("bogus".into(), vec!["x".into()]);

        let item = store.create_item(coll.id, draft).unwrap();
        assert_eq!(item.name, "Dune");
        assert!(!item.values.contains_key("bogus"));
    }

    #[test]
    fn update_item_skips_unknown_properties() {
        let store = store();
        let coll = books(&store);
        let item = store.create_item(coll.id, ItemDraft::default()).unwrap();

        let mut patch = ItemPatch::default();
        patch.properties.insert("title".into(), vec!["Dune".into()]);
        patch.properties.insert("bogus".into(), vec!["x".into()]);

        let updated = store.update_item(coll.id, item.id, patch).unwrap();
        assert_eq!(updated.values["title"], vec!["Dune"]);
        assert_eq!(updated.name, "Dune");
        assert!(!updated.values.contains_key("bogus"));
    }

    #[test]
    fn delete_property_cascades_values() {
        let store = store();
        let coll = books(&store);
        let mut draft = ItemDraft::default();
        draft.properties.insert("tags".into(), vec!["sf".into()]);
        let item = store.create_item(coll.id, draft).unwrap();

        store.delete_property(coll.id, "tags").unwrap();

        let ctx = owner_ctx(&coll);
        let loaded = store.get_item(&ctx, coll.id, item.id).unwrap();
        assert!(!loaded.values.contains_key("tags"));
        let coll = store.get_collection(&ctx, coll.id).unwrap();
        assert!(coll.property("tags").is_none());
    }

    #[test]
    fn delete_item_cascades_loans() {
        let store = store();
        let coll = books(&store);
        let item = store.create_item(coll.id, ItemDraft::default()).unwrap();
        store.request_loan(coll.id, item.id, "alice").unwrap();

        store.delete_item(coll.id, item.id).unwrap();
        assert!(store.list_loans(coll.id).unwrap().is_empty());
    }

    #[test]
    fn delete_collection_drops_children() {
        let store = store();
        let coll = books(&store);
        let item = store.create_item(coll.id, ItemDraft::default()).unwrap();
        store.request_loan(coll.id, item.id, "alice").unwrap();

        store.delete_collection(coll.id).unwrap();

        let ctx = owner_ctx(&coll);
        assert!(matches!(
            store.get_collection(&ctx, coll.id),
            Err(KabinetError::CollectionNotFound(_))
        ));
        assert!(store.backend().load_items(&coll.id).unwrap().is_empty());
        assert!(store.backend().load_loans(&coll.id).unwrap().is_empty());
    }

    #[test]
    fn hidden_item_invisible_except_to_owner() {
        let store = store();
        let coll = books(&store);
        let item = store
            .create_item(
                coll.id,
                ItemDraft {
                    visibility: Some(Visibility::Hidden),
                    ..Default::default()
                },
            )
            .unwrap();

        let anon = AccessContext::anonymous();
        assert!(matches!(
            store.get_item(&anon, coll.id, item.id),
            Err(KabinetError::ItemNotFound(_))
        ));

        let owner = owner_ctx(&coll);
        assert!(store.get_item(&owner, coll.id, item.id).is_ok());
    }

    #[test]
    fn private_collection_reads_as_not_found() {
        let store = store();
        let coll = books(&store);
        store
            .update_collection(
                coll.id,
                CollectionPatch {
                    visibility: Some(Visibility::Owner),
                    ..Default::default()
                },
            )
            .unwrap();

        let stranger = AccessContext::authenticated(Uuid::new_v4());
        assert!(matches!(
            store.get_collection(&stranger, coll.id),
            Err(KabinetError::CollectionNotFound(_))
        ));
        assert!(store.list_collections(&stranger).unwrap().is_empty());
        assert_eq!(store.list_collections(&owner_ctx(&coll)).unwrap().len(), 1);
    }

    #[test]
    fn lookup_by_property_is_deterministic() {
        let store = store();
        let coll = books(&store);
        let ctx = owner_ctx(&coll);

        let mut draft = ItemDraft::default();
        draft.properties.insert("title".into(), vec!["Dune".into()]);
        let a = store.create_item(coll.id, draft.clone()).unwrap();
        let b = store.create_item(coll.id, draft).unwrap();

        let found = store
            .get_item_by_property(&ctx, coll.id, "title", "Dune")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, a.id.min(b.id));
    }

    #[test]
    fn lookup_with_empty_inputs_finds_nothing() {
        let store = store();
        let coll = books(&store);
        let ctx = owner_ctx(&coll);

        assert!(store
            .get_item_by_property(&ctx, coll.id, "", "Dune")
            .unwrap()
            .is_none());
        assert!(store
            .get_item_by_property(&ctx, coll.id, "title", "")
            .unwrap()
            .is_none());
    }

    #[test]
    fn loan_lifecycle_stamps_dates() {
        let store = store();
        let coll = books(&store);
        let item = store.create_item(coll.id, ItemDraft::default()).unwrap();

        let loan = store.request_loan(coll.id, item.id, "alice").unwrap();
        assert_eq!(loan.state, LoanState::Asked);
        assert!(!store.is_lent(coll.id, item.id).unwrap());

        let loan = store
            .advance_loan(coll.id, loan.id, LoanState::Lent)
            .unwrap();
        assert!(loan.lent_at.is_some());
        assert!(store.is_lent(coll.id, item.id).unwrap());

        let loan = store
            .advance_loan(coll.id, loan.id, LoanState::Returned)
            .unwrap();
        assert!(loan.returned_at.is_some());
        assert!(!store.is_lent(coll.id, item.id).unwrap());
    }

    #[test]
    fn usernames_are_unique() {
        let store = store();
        store.create_user("alice").unwrap();
        assert!(matches!(
            store.create_user("alice"),
            Err(KabinetError::Validation(_))
        ));
        assert_eq!(
            store.get_user_by_username("alice").unwrap().username,
            "alice"
        );
    }

    #[test]
    fn write_errors_surface() {
        let store = store();
        let coll = books(&store);
        store.backend().set_simulate_write_error(true);
        assert!(matches!(
            store.create_item(coll.id, ItemDraft::default()),
            Err(KabinetError::Store(_))
        ));
    }
}
