use std::cell::RefCell;
use std::collections::HashMap;

use uuid::Uuid;

use super::backend::StorageBackend;
use crate::error::{KabinetError, Result};
use crate::model::{Collection, Item, Loan, User};

/// In-memory storage backend for testing.
///
/// Uses `RefCell` for interior mutability since kabinet is request-scoped
/// and single-threaded. This avoids the overhead of `RwLock` while still
/// allowing the `StorageBackend` trait to use `&self` for all methods.
#[derive(Default)]
pub struct MemBackend {
    collections: RefCell<HashMap<Uuid, Collection>>,
    items: RefCell<HashMap<Uuid, HashMap<Uuid, Item>>>,
    loans: RefCell<HashMap<Uuid, Vec<Loan>>>,
    users: RefCell<HashMap<Uuid, User>>,
    simulate_write_error: RefCell<bool>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *self.simulate_write_error.borrow_mut() = simulate;
    }

    fn check_write(&self) -> Result<()> {
        if *self.simulate_write_error.borrow() {
            Err(KabinetError::Store("Simulated write error".to_string()))
        } else {
            Ok(())
        }
    }
}

impl StorageBackend for MemBackend {
    fn load_collections(&self) -> Result<HashMap<Uuid, Collection>> {
        Ok(self.collections.borrow().clone())
    }

    fn save_collections(&self, collections: &HashMap<Uuid, Collection>) -> Result<()> {
        self.check_write()?;
        *self.collections.borrow_mut() = collections.clone();
        Ok(())
    }

    fn load_items(&self, collection: &Uuid) -> Result<HashMap<Uuid, Item>> {
        Ok(self
            .items
            .borrow()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    fn save_items(&self, collection: &Uuid, items: &HashMap<Uuid, Item>) -> Result<()> {
        self.check_write()?;
        self.items.borrow_mut().insert(*collection, items.clone());
        Ok(())
    }

    fn load_loans(&self, collection: &Uuid) -> Result<Vec<Loan>> {
        Ok(self
            .loans
            .borrow()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    fn save_loans(&self, collection: &Uuid, loans: &[Loan]) -> Result<()> {
        self.check_write()?;
        self.loans.borrow_mut().insert(*collection, loans.to_vec());
        Ok(())
    }

    fn drop_collection(&self, collection: &Uuid) -> Result<()> {
        self.check_write()?;
        self.items.borrow_mut().remove(collection);
        self.loans.borrow_mut().remove(collection);
        Ok(())
    }

    fn load_users(&self) -> Result<HashMap<Uuid, User>> {
        Ok(self.users.borrow().clone())
    }

    fn save_users(&self, users: &HashMap<Uuid, User>) -> Result<()> {
        self.check_write()?;
        *self.users.borrow_mut() = users.clone();
        Ok(())
    }
}
