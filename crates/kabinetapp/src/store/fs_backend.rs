use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::backend::StorageBackend;
use crate::error::{KabinetError, Result};
use crate::model::{Collection, Item, Loan, User};

/// Filesystem storage backend: one JSON document per logical table, written
/// atomically (tmp file then rename).
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn items_file(&self, collection: &Uuid) -> PathBuf {
        self.root.join(format!("items-{}.json", collection))
    }

    fn loans_file(&self, collection: &Uuid) -> PathBuf {
        self.root.join(format!("loans-{}.json", collection))
    }

    fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(KabinetError::Io)?;
        }
        Ok(())
    }

    fn read_document<T: serde::de::DeserializeOwned + Default>(&self, path: &Path) -> Result<T> {
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(path).map_err(KabinetError::Io)?;
        serde_json::from_str(&content).map_err(KabinetError::Serialization)
    }

    fn write_document<T: serde::Serialize>(&self, path: &Path, document: &T) -> Result<()> {
        self.ensure_root()?;
        let content = serde_json::to_string_pretty(document).map_err(KabinetError::Serialization)?;

        // Atomic write: tmp file in the same directory, then rename.
        let tmp_file = self.root.join(format!(".doc-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(KabinetError::Io)?;
        fs::rename(&tmp_file, path).map_err(KabinetError::Io)?;
        Ok(())
    }
}

impl StorageBackend for FsBackend {
    fn load_collections(&self) -> Result<HashMap<Uuid, Collection>> {
        self.read_document(&self.root.join("collections.json"))
    }

    fn save_collections(&self, collections: &HashMap<Uuid, Collection>) -> Result<()> {
        self.write_document(&self.root.join("collections.json"), collections)
    }

    fn load_items(&self, collection: &Uuid) -> Result<HashMap<Uuid, Item>> {
        self.read_document(&self.items_file(collection))
    }

    fn save_items(&self, collection: &Uuid, items: &HashMap<Uuid, Item>) -> Result<()> {
        self.write_document(&self.items_file(collection), items)
    }

    fn load_loans(&self, collection: &Uuid) -> Result<Vec<Loan>> {
        self.read_document(&self.loans_file(collection))
    }

    fn save_loans(&self, collection: &Uuid, loans: &[Loan]) -> Result<()> {
        self.write_document(&self.loans_file(collection), &loans.to_vec())
    }

    fn drop_collection(&self, collection: &Uuid) -> Result<()> {
        for path in [self.items_file(collection), self.loans_file(collection)] {
            if path.exists() {
                fs::remove_file(&path).map_err(KabinetError::Io)?;
            }
        }
        Ok(())
    }

    fn load_users(&self) -> Result<HashMap<Uuid, User>> {
        self.read_document(&self.root.join("users.json"))
    }

    fn save_users(&self, users: &HashMap<Uuid, User>) -> Result<()> {
        self.write_document(&self.root.join("users.json"), users)
    }
}
