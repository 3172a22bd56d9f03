//! # kabinetapp
//!
//! Library crate behind the `kabinet` personal-collection catalogue: dynamic
//! per-collection schemas, typed filter and sort queries, loans, visibility
//! policy and a pluggable import pipeline.
//!
//! ## Architecture
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | Core entities: collections, items, loans, users |
//! | [`properties`] | Property schema, name guessing, filter predicates |
//! | [`store`] | Storage backends and the business-logic catalog store |
//! | [`query`] | Item listing: filter, sort, paginate, project |
//! | [`access`] | Visibility policy and the per-request access context |
//! | [`import`] | Bulk ingestion, merging, archives |
//! | [`media`] | Blob storage behind `media://` references |
//! | [`config`] | Layered TOML/env configuration |
//!
//! Everything is synchronous and request-scoped; the catalog store loads,
//! mutates and saves whole JSON documents through a [`store::StorageBackend`].

pub mod access;
pub mod config;
pub mod error;
pub mod import;
pub mod media;
pub mod model;
pub mod properties;
pub mod query;
pub mod store;

pub use access::AccessContext;
pub use config::KabinetConfig;
pub use error::{KabinetError, Result};
pub use model::{Collection, Item, Loan, LoanState, Localized, User, Visibility};
pub use query::{ItemCard, ItemPage, ItemQuery, SortDirection, SortKey};
pub use store::{CatalogStore, CollectionPatch, FsBackend, ItemDraft, ItemPatch, MemBackend};
