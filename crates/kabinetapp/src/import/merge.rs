//! Field mapping and in-batch record merging.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::warn;

use super::RawRecord;
use crate::media::MediaStorage;

/// Per-field value transform, applied after renaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTransform {
    /// Drop the field entirely.
    Delete,
    /// Treat each value as a local file path and move it into media storage.
    /// Values that cannot be fetched keep their original form.
    Download,
    /// Collapse multiple rows into a single comma-joined value, dropping
    /// empty elements first.
    ToString,
}

/// Declarative field mapping for an import run.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    /// Source field → target field. Mapping to the empty string discards
    /// the field; unmapped fields keep their name.
    pub rename: BTreeMap<String, String>,
    /// Transforms keyed by the post-rename field name.
    pub transforms: BTreeMap<String, ValueTransform>,
}

impl FieldMapping {
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.insert(from.into(), to.into());
        self
    }

    pub fn discard(self, field: impl Into<String>) -> Self {
        self.rename(field, "")
    }

    pub fn transform(mut self, field: impl Into<String>, transform: ValueTransform) -> Self {
        self.transforms.insert(field.into(), transform);
        self
    }
}

/// Apply renames and transforms to one record.
pub fn apply_mapping(
    record: RawRecord,
    mapping: &FieldMapping,
    media: &dyn MediaStorage,
) -> RawRecord {
    let mut out = RawRecord::new();
    for (field, values) in record {
        let target = match mapping.rename.get(&field) {
            Some(renamed) if renamed.is_empty() => continue,
            Some(renamed) => renamed.clone(),
            None => field,
        };

        let values = match mapping.transforms.get(&target) {
            Some(ValueTransform::Delete) => continue,
            Some(ValueTransform::Download) => values
                .into_iter()
                .map(|v| download_value(&target, v, media))
                .collect(),
            Some(ValueTransform::ToString) => {
                let rows: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
                vec![rows.join(", ")]
            }
            _ => values,
        };

        // A rename may target an already-populated field; rows accumulate.
        out.entry(target).or_default().extend(values);
    }
    out
}

fn download_value(field: &str, value: String, media: &dyn MediaStorage) -> String {
    let path = Path::new(value.strip_prefix("file://").unwrap_or(&value));
    match media.import_path(path) {
        Ok(reference) => reference,
        Err(err) => {
            warn!(field = %field, value = %value, %err, "keeping original value");
            value
        }
    }
}

/// Merge records sharing an id value into one, preserving first-appearance
/// order. With no id field, or for records missing it, nothing is merged.
///
/// Merging unions value rows per field: a later record's rows are appended
/// to the first record's, skipping exact duplicates.
pub fn merge_records(records: Vec<RawRecord>, id_field: Option<&str>) -> Vec<RawRecord> {
    let Some(id_field) = id_field else {
        return records;
    };

    let mut merged: Vec<RawRecord> = Vec::new();
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();

    for record in records {
        let id = record.get(id_field).and_then(|vs| vs.first()).cloned();
        let Some(id) = id else {
            merged.push(record);
            continue;
        };

        match seen.get(&id) {
            Some(&index) => merge_into(&mut merged[index], record),
            None => {
                seen.insert(id, merged.len());
                merged.push(record);
            }
        }
    }
    merged
}

fn merge_into(target: &mut RawRecord, source: RawRecord) {
    for (field, values) in source {
        let rows = target.entry(field).or_default();
        for value in values {
            if !rows.contains(&value) {
                rows.push(value);
            }
        }
    }
}
