use std::collections::HashMap;

use uuid::Uuid;

use crate::error::Result;
use crate::model::{Collection, Item, Loan, User};

/// Abstract interface for raw storage I/O.
///
/// This trait handles the "how" of storage (filesystem vs memory), while
/// [`super::catalog::CatalogStore`] handles the "what" (schema enforcement,
/// cascades, visibility). Each load/save pair moves one whole document;
/// atomicity is per document only.
pub trait StorageBackend {
    // --- Collection index ---

    /// Load the collection index (schemas included).
    fn load_collections(&self) -> Result<HashMap<Uuid, Collection>>;

    /// Save the collection index.
    fn save_collections(&self, collections: &HashMap<Uuid, Collection>) -> Result<()>;

    // --- Per-collection documents ---

    /// Load all items of a collection. A collection with no stored items
    /// yields an empty map, not an error.
    fn load_items(&self, collection: &Uuid) -> Result<HashMap<Uuid, Item>>;

    /// Save all items of a collection.
    fn save_items(&self, collection: &Uuid, items: &HashMap<Uuid, Item>) -> Result<()>;

    /// Load all loans of a collection.
    fn load_loans(&self, collection: &Uuid) -> Result<Vec<Loan>>;

    /// Save all loans of a collection.
    fn save_loans(&self, collection: &Uuid, loans: &[Loan]) -> Result<()>;

    /// Remove every stored document belonging to a collection (items and
    /// loans). The collection index entry itself is the caller's problem.
    fn drop_collection(&self, collection: &Uuid) -> Result<()>;

    // --- User registry ---

    /// Load the user registry.
    fn load_users(&self) -> Result<HashMap<Uuid, User>>;

    /// Save the user registry.
    fn save_users(&self, users: &HashMap<Uuid, User>) -> Result<()>;
}
