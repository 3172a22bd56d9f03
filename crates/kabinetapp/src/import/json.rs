//! JSON importer.
//!
//! Accepts either a top-level array of objects or an object with an `items`
//! array. Scalar values become one row, arrays become one row per scalar
//! element; `null` fields are skipped. Nested objects are not flattened and
//! skip the field with a warning.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use super::{ImportReport, Importer, RawRecord};
use crate::error::{KabinetError, Result};

#[derive(Default)]
pub struct JsonImporter {
    records: Vec<RawRecord>,
    report: ImportReport,
}

impl JsonImporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Importer for JsonImporter {
    fn format(&self) -> &'static str {
        "json"
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path).map_err(KabinetError::Io)?;
        let root: Value = serde_json::from_str(&content).map_err(KabinetError::Serialization)?;

        let entries = match &root {
            Value::Array(entries) => entries.as_slice(),
            Value::Object(map) => match map.get("items") {
                Some(Value::Array(entries)) => entries.as_slice(),
                _ => {
                    return Err(KabinetError::Import(
                        "expected a top-level array or an object with an `items` array"
                            .to_string(),
                    ))
                }
            },
            _ => {
                return Err(KabinetError::Import(
                    "expected a top-level array or an object with an `items` array".to_string(),
                ))
            }
        };

        self.records = entries
            .iter()
            .filter_map(|entry| match entry {
                Value::Object(fields) => Some(object_to_record(fields)),
                other => {
                    warn!(kind = json_kind(other), "skipping non-object entry");
                    None
                }
            })
            .collect();
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
}

fn object_to_record(fields: &serde_json::Map<String, Value>) -> RawRecord {
    let mut record = RawRecord::new();
    for (name, value) in fields {
        let rows = match value {
            Value::Null => continue,
            Value::Array(elements) => elements
                .iter()
                .filter_map(|e| match scalar_to_string(e) {
                    Some(s) => Some(s),
                    None => {
                        warn!(field = %name, "skipping non-scalar array element");
                        None
                    }
                })
                .collect(),
            other => match scalar_to_string(other) {
                Some(s) => vec![s],
                None => {
                    warn!(field = %name, "skipping nested object field");
                    continue;
                }
            },
        };
        record.insert(name.clone(), rows);
    }
    record
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
