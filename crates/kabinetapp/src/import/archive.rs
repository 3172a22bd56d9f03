//! Collection archives: gzipped tarballs bundling schema, items, loans and
//! the referenced media blobs.
//!
//! Layout inside the tarball:
//!
//! ```text
//! collection.json     # Collection, schema included
//! items.json          # Vec<Item>
//! loans.json          # Vec<Loan>
//! media/<key>         # one file per referenced media blob
//! ```
//!
//! Export and import are symmetric: importing an archive recreates the
//! schema with its original types and flags (the name-guessing table is not
//! involved), re-stores the bundled blobs and rewrites the media references
//! to their new keys.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder, Header};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{run_import, CatalogWriter, ImportOptions, ImportReport, Importer, RawRecord};
use crate::access::AccessContext;
use crate::error::{KabinetError, Result};
use crate::media::{MediaStorage, MEDIA_SCHEME};
use crate::model::{Collection, Item, Loan};
use crate::properties::{Property, PropertyParams, PropertyType};
use crate::store::{CatalogStore, StorageBackend};

/// Export one collection into a `.kab` archive at `path`.
pub fn export_collection<B: StorageBackend>(
    store: &CatalogStore<B>,
    ctx: &AccessContext,
    collection: Uuid,
    path: &Path,
    media: &dyn MediaStorage,
) -> Result<()> {
    let coll = store.get_collection(ctx, collection)?;
    let items: Vec<Item> = {
        let mut items: Vec<Item> = store
            .backend()
            .load_items(&collection)?
            .into_values()
            .filter(|i| ctx.can_view(coll.owner, i.visibility))
            .collect();
        items.sort_by_key(|i| i.id);
        items
    };
    let loans: Vec<Loan> = store.list_loans(collection)?;

    let file = File::create(path).map_err(KabinetError::Io)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    append_json(&mut builder, "collection.json", &coll)?;
    append_json(&mut builder, "items.json", &items)?;
    append_json(&mut builder, "loans.json", &loans)?;

    for reference in media_references(&coll, &items) {
        match media.load(&reference) {
            Ok(bytes) => {
                let key = reference.trim_start_matches(MEDIA_SCHEME);
                append_bytes(&mut builder, &format!("media/{key}"), &bytes)?;
            }
            Err(err) => warn!(%reference, %err, "leaving blob out of the archive"),
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(KabinetError::Io)?;
    encoder.finish().map_err(KabinetError::Io)?;
    debug!(collection = %collection, path = %path.display(), "archive written");
    Ok(())
}

fn append_json<W: Write, T: serde::Serialize>(
    builder: &mut Builder<W>,
    name: &str,
    value: &T,
) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(KabinetError::Serialization)?;
    append_bytes(builder, name, &json)
}

fn append_bytes<W: Write>(builder: &mut Builder<W>, name: &str, bytes: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, name, Cursor::new(bytes))
        .map_err(KabinetError::Io)
}

/// Every distinct `media://` reference held by the collection cover or an
/// image/file-typed property value.
fn media_references(coll: &Collection, items: &[Item]) -> Vec<String> {
    let mut refs = Vec::new();
    let mut push = |value: &str| {
        if value.starts_with(MEDIA_SCHEME) && !refs.iter().any(|r| r == value) {
            refs.push(value.to_string());
        }
    };

    if let Some(cover) = &coll.cover {
        push(cover);
    }
    let blob_props: Vec<&str> = coll
        .properties
        .iter()
        .filter(|p| matches!(p.kind, PropertyType::Image | PropertyType::File))
        .map(|p| p.name.as_str())
        .collect();
    for item in items {
        for prop in &blob_props {
            if let Some(values) = item.values.get(*prop) {
                for value in values {
                    push(value);
                }
            }
        }
    }
    refs
}

#[derive(Default)]
pub struct ArchiveImporter {
    schema: Option<Collection>,
    records: Vec<RawRecord>,
    blobs: Vec<(String, Vec<u8>)>,
    report: ImportReport,
}

impl ArchiveImporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Importer for ArchiveImporter {
    fn format(&self) -> &'static str {
        "archive"
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(KabinetError::Io)?;
        let mut archive = Archive::new(GzDecoder::new(file));

        let mut schema: Option<Collection> = None;
        let mut items: Vec<Item> = Vec::new();
        let mut blobs = Vec::new();

        for entry in archive.entries().map_err(KabinetError::Io)? {
            let mut entry = entry.map_err(KabinetError::Io)?;
            let name = entry
                .path()
                .map_err(KabinetError::Io)?
                .to_string_lossy()
                .into_owned();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(KabinetError::Io)?;

            match name.as_str() {
                "collection.json" => {
                    schema =
                        Some(serde_json::from_slice(&bytes).map_err(KabinetError::Serialization)?)
                }
                "items.json" => {
                    items = serde_json::from_slice(&bytes).map_err(KabinetError::Serialization)?
                }
                "loans.json" => {}
                other => match other.strip_prefix("media/") {
                    Some(key) if !key.is_empty() => blobs.push((key.to_string(), bytes)),
                    _ => warn!(entry = %name, "ignoring unknown archive entry"),
                },
            }
        }

        let schema = schema
            .ok_or_else(|| KabinetError::Import("archive has no collection.json".to_string()))?;
        self.records = items.into_iter().map(|i| i.values).collect();
        self.schema = Some(schema);
        self.blobs = blobs;
        Ok(())
    }

    fn records(&self) -> &[RawRecord] {
        &self.records
    }

    fn report(&self) -> &ImportReport {
        &self.report
    }

    fn set_report(&mut self, report: ImportReport) {
        self.report = report;
    }

    fn import(
        &mut self,
        writer: &mut dyn CatalogWriter,
        opts: &ImportOptions,
    ) -> Result<ImportReport> {
        let schema = self
            .schema
            .as_ref()
            .ok_or_else(|| KabinetError::Import("no archive loaded".to_string()))?;

        // The archive carries the real schema; recreate it before the
        // generic pipeline runs so nothing falls back to name guessing.
        for prop in &schema.properties {
            writer.define_property(opts.collection, &prop.name, params_from(prop))?;
        }

        // Re-store bundled blobs and rewrite references to their new keys.
        let mut relocated: BTreeMap<String, String> = BTreeMap::new();
        for (key, bytes) in &self.blobs {
            let ext = Path::new(key).extension().and_then(|e| e.to_str());
            match opts.media.store(bytes, ext) {
                Ok(reference) => {
                    relocated.insert(format!("{MEDIA_SCHEME}{key}"), reference);
                }
                Err(err) => warn!(%key, %err, "keeping original media reference"),
            }
        }
        let records: Vec<RawRecord> = self
            .records
            .iter()
            .cloned()
            .map(|mut record| {
                for values in record.values_mut() {
                    for value in values.iter_mut() {
                        if let Some(new_ref) = relocated.get(value) {
                            *value = new_ref.clone();
                        }
                    }
                }
                record
            })
            .collect();

        let report = run_import(records, writer, opts)?;
        self.report = report.clone();
        Ok(report)
    }
}

fn params_from(prop: &Property) -> PropertyParams {
    PropertyParams {
        kind: Some(prop.kind),
        label: Some(prop.label.clone()),
        description: Some(prop.description.clone()),
        default_value: prop.default_value.clone(),
        multiple: prop.multiple,
        visibility: Some(prop.visibility),
        required: prop.required,
        hide_label: prop.hide_label,
        is_title: prop.is_title,
        is_sub_title: prop.is_sub_title,
        is_cover: prop.is_cover,
        is_id: prop.is_id,
        preview: prop.preview,
        filterable: prop.filterable,
        sortable: prop.sortable,
        searchable: prop.searchable,
        hidden: prop.hidden,
    }
}
