//! # Import Pipeline
//!
//! Pluggable bulk ingestion of external item data.
//!
//! ## Flow
//!
//! ```text
//! file ──load──▶ Vec<RawRecord> ──mapping──▶ renamed/transformed records
//!                                   │
//!                             merge (id dedup)
//!                                   │
//!                          auto-create properties
//!                                   │
//!                     create or update items via CatalogWriter
//! ```
//!
//! An [`Importer`] turns one file format into [`RawRecord`]s; everything
//! after that is shared by [`run_import`]. A source parse failure aborts the
//! whole run; a failure on one record is logged, reported and skipped.
//!
//! ## Merging
//!
//! When an id field is known (explicitly via [`ImportOptions::id_property`]
//! or implicitly via the schema's `is_id` property), records sharing an id
//! value are merged into one before writing, and records whose id matches an
//! existing item update that item instead of creating a duplicate. See
//! [`merge`] for the in-batch rules.

pub mod archive;
pub mod csv;
pub mod json;
pub mod merge;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::access::AccessContext;
use crate::error::{KabinetError, Result};
use crate::media::MediaStorage;
use crate::model::{Collection, Item};
use crate::properties::{guess_config_from_name, Property, PropertyParams};
use crate::store::{CatalogStore, ItemDraft, StorageBackend};

pub use archive::{export_collection, ArchiveImporter};
pub use csv::CsvImporter;
pub use json::JsonImporter;
pub use merge::{apply_mapping, merge_records, FieldMapping, ValueTransform};

/// One source record: field name → value rows, untyped.
pub type RawRecord = BTreeMap<String, Vec<String>>;

/// Options steering one import run.
pub struct ImportOptions<'a> {
    pub collection: Uuid,
    /// Field renames and per-field transforms, applied before merging.
    pub mapping: FieldMapping,
    /// Dedup key. Falls back to the schema's `is_id` property; with neither,
    /// every record creates a fresh item.
    pub id_property: Option<String>,
    /// Auto-create schema properties for unknown fields using the
    /// name-guessing table. When off, unknown fields are dropped.
    pub auto_create: bool,
    pub media: &'a dyn MediaStorage,
}

/// Outcome counters of one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub properties_created: usize,
    /// Per-record failure messages, one per skipped record.
    pub errors: Vec<String>,
}

/// Catalog mutations an import run needs, object-safe so importers can be
/// trait objects over any store backend.
pub trait CatalogWriter {
    fn collection_schema(&self, collection: Uuid) -> Result<Collection>;
    fn define_property(
        &mut self,
        collection: Uuid,
        name: &str,
        params: PropertyParams,
    ) -> Result<Property>;
    fn create_item(&mut self, collection: Uuid, draft: ItemDraft) -> Result<Item>;
    fn find_item_by_value(
        &self,
        collection: Uuid,
        property: &str,
        value: &str,
    ) -> Result<Option<Item>>;
    fn set_values(
        &mut self,
        collection: Uuid,
        item: Uuid,
        property: &str,
        values: &[String],
    ) -> Result<Item>;
}

impl<B: StorageBackend> CatalogWriter for CatalogStore<B> {
    fn collection_schema(&self, collection: Uuid) -> Result<Collection> {
        // Imports run on behalf of the collection owner.
        let owner_ctx = |owner| AccessContext::authenticated(owner);
        let collections = self.backend().load_collections()?;
        collections
            .get(&collection)
            .filter(|c| owner_ctx(c.owner).can_view(c.owner, c.visibility))
            .cloned()
            .ok_or(KabinetError::CollectionNotFound(collection))
    }

    fn define_property(
        &mut self,
        collection: Uuid,
        name: &str,
        params: PropertyParams,
    ) -> Result<Property> {
        CatalogStore::define_property(self, collection, name, params)
    }

    fn create_item(&mut self, collection: Uuid, draft: ItemDraft) -> Result<Item> {
        CatalogStore::create_item(self, collection, draft)
    }

    fn find_item_by_value(
        &self,
        collection: Uuid,
        property: &str,
        value: &str,
    ) -> Result<Option<Item>> {
        let schema = self.collection_schema(collection)?;
        let ctx = AccessContext::authenticated(schema.owner);
        self.get_item_by_property(&ctx, collection, property, value)
    }

    fn set_values(
        &mut self,
        collection: Uuid,
        item: Uuid,
        property: &str,
        values: &[String],
    ) -> Result<Item> {
        self.set_property_value(collection, item, property, values)
    }
}

/// A file-format reader feeding the import pipeline.
pub trait Importer {
    /// Short format tag ("json", "csv", ...).
    fn format(&self) -> &'static str;

    /// Parse a source file into records. A malformed source is fatal here;
    /// per-record problems are deferred to the write phase.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// The records read by the last [`load`](Importer::load).
    fn records(&self) -> &[RawRecord];

    /// Outcome of the most recent [`import`](Importer::import) run. All
    /// counters are zero before the first run.
    fn report(&self) -> &ImportReport;

    /// Retain a finished run's outcome for [`report`](Importer::report).
    fn set_report(&mut self, report: ImportReport);

    /// Load a source and return its first record's raw fields, unmapped and
    /// unmerged. Backs single-record "fetch details" flows that never touch
    /// the catalog.
    fn get_data(&mut self, path: &Path) -> Result<RawRecord> {
        self.load(path)?;
        self.records()
            .first()
            .cloned()
            .ok_or_else(|| KabinetError::Import("source holds no records".to_string()))
    }

    /// Distinct field names across all loaded records, in first-appearance
    /// order. Used for mapping dry-runs before a real import.
    fn scan_fields(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for record in self.records() {
            for field in record.keys() {
                if !seen.iter().any(|f| f == field) {
                    seen.push(field.clone());
                }
            }
        }
        seen
    }

    /// Run the shared pipeline over the loaded records.
    fn import(&mut self, writer: &mut dyn CatalogWriter, opts: &ImportOptions) -> Result<ImportReport> {
        let report = run_import(self.records().to_vec(), writer, opts)?;
        self.set_report(report.clone());
        Ok(report)
    }
}

/// The shared write phase: map, merge, auto-create, then create or update.
pub fn run_import(
    records: Vec<RawRecord>,
    writer: &mut dyn CatalogWriter,
    opts: &ImportOptions,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    let mapped: Vec<RawRecord> = records
        .into_iter()
        .map(|r| apply_mapping(r, &opts.mapping, opts.media))
        .collect();

    let schema = writer.collection_schema(opts.collection)?;
    let id_property = opts
        .id_property
        .clone()
        .or_else(|| schema.properties.iter().find(|p| p.is_id).map(|p| p.name.clone()));

    let merged = merge_records(mapped, id_property.as_deref());
    debug!(
        collection = %opts.collection,
        records = merged.len(),
        id_property = id_property.as_deref().unwrap_or("<none>"),
        "starting import write phase"
    );

    if opts.auto_create {
        let mut known: Vec<String> = schema.properties.iter().map(|p| p.name.clone()).collect();
        for record in &merged {
            for field in record.keys() {
                if !known.iter().any(|k| k == field) {
                    writer.define_property(
                        opts.collection,
                        field,
                        guess_config_from_name(field),
                    )?;
                    known.push(field.clone());
                    report.properties_created += 1;
                }
            }
        }
    }

    for record in merged {
        match write_record(writer, opts, id_property.as_deref(), record) {
            Ok(true) => report.updated += 1,
            Ok(false) => report.created += 1,
            Err(err) => {
                error!(collection = %opts.collection, %err, "skipping record");
                report.errors.push(err.to_string());
                report.skipped += 1;
            }
        }
    }

    info!(
        collection = %opts.collection,
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        properties = report.properties_created,
        "import finished"
    );
    Ok(report)
}

/// Write one record. Returns `true` when an existing item was updated.
fn write_record(
    writer: &mut dyn CatalogWriter,
    opts: &ImportOptions,
    id_property: Option<&str>,
    record: RawRecord,
) -> Result<bool> {
    let existing = match id_property {
        Some(id) => match record.get(id).and_then(|vs| vs.first()) {
            Some(value) => writer.find_item_by_value(opts.collection, id, value)?,
            None => None,
        },
        None => None,
    };

    match existing {
        Some(item) => {
            // A field the schema rejects leaves the rest of the record
            // applied; the update counts even when partial.
            for (field, values) in &record {
                if let Err(err) = writer.set_values(opts.collection, item.id, field, values) {
                    warn!(item = %item.id, field = %field, %err, "skipping field");
                }
            }
            Ok(true)
        }
        None => {
            writer.create_item(
                opts.collection,
                ItemDraft {
                    visibility: None,
                    properties: record,
                },
            )?;
            Ok(false)
        }
    }
}

/// Registry mapping file extensions to importer constructors.
pub struct ImporterRegistry {
    factories: Vec<(&'static str, fn() -> Box<dyn Importer>)>,
}

impl ImporterRegistry {
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Registry with the built-in formats.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("json", || Box::new(JsonImporter::new()));
        registry.register("csv", || Box::new(CsvImporter::new()));
        registry.register("kab", || Box::new(ArchiveImporter::new()));
        registry
    }

    /// Register a constructor for a file extension. Later registrations for
    /// the same extension win.
    pub fn register(&mut self, extension: &'static str, factory: fn() -> Box<dyn Importer>) {
        self.factories.retain(|(ext, _)| *ext != extension);
        self.factories.push((extension, factory));
    }

    /// Importer matching a path's extension, if any.
    pub fn for_path(&self, path: &Path) -> Option<Box<dyn Importer>> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.factories
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, factory)| factory())
    }

    pub fn extensions(&self) -> Vec<&'static str> {
        self.factories.iter().map(|(ext, _)| *ext).collect()
    }
}

impl Default for ImporterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
