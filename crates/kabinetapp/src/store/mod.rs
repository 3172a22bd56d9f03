//! # Storage Layer
//!
//! Two layers, split the same way throughout the crate:
//!
//! 1. [`backend::StorageBackend`] handles the raw I/O — *how* documents are
//!    read and written (filesystem vs. memory).
//! 2. [`catalog::CatalogStore`] holds the business logic — *what* the
//!    operations mean: schema writes with unique-flag enforcement,
//!    delete-then-insert value writes, cascading deletes, visibility gating.
//!
//! ## Persistence Model
//!
//! The backend stores JSON documents with per-document atomicity only (no
//! multi-document transactions):
//!
//! ```text
//! <root>/
//! ├── collections.json        # Uuid -> Collection (schema included)
//! ├── users.json              # Uuid -> User
//! ├── items-{uuid}.json       # per collection: Uuid -> Item
//! └── loans-{uuid}.json       # per collection: Vec<Loan>
//! ```
//!
//! Item value rows live inside the item document, so the "values then row"
//! stages of a cascading delete collapse into a single write; the loan stage
//! is a separate document and keeps its own failure point.
//!
//! ## Implementations
//!
//! - [`fs_backend::FsBackend`]: production backend, atomic tmp-then-rename
//!   writes.
//! - [`mem_backend::MemBackend`]: for testing logic without filesystem I/O,
//!   with simulated write failures.

pub mod backend;
pub mod catalog;
pub mod fs_backend;
pub mod mem_backend;

pub use backend::StorageBackend;
pub use catalog::{CatalogStore, CollectionPatch, ItemDraft, ItemPatch};
pub use fs_backend::FsBackend;
pub use mem_backend::MemBackend;
