//! CSV importer.
//!
//! The first row is the header and names the fields. One cell is one value
//! row; empty cells leave the field unset. The cell delimiter defaults to a
//! comma and can be overridden for semicolon or tab exports.

use std::path::Path;

use csv::ReaderBuilder;

use super::{ImportReport, Importer, RawRecord};
use crate::error::{KabinetError, Result};

pub struct CsvImporter {
    delimiter: u8,
    records: Vec<RawRecord>,
    report: ImportReport,
}

impl CsvImporter {
    pub fn new() -> Self {
        Self::with_delimiter(b',')
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            records: Vec::new(),
            report: ImportReport::default(),
        }
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Importer for CsvImporter {
    fn format(&self) -> &'static str {
        "csv"
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_path(path)
            .map_err(|e| KabinetError::Import(format!("cannot read csv: {e}")))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| KabinetError::Import(format!("cannot read csv header: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        self.records.clear();
        for row in reader.records() {
            let row = row.map_err(|e| KabinetError::Import(format!("malformed csv row: {e}")))?;
            let mut record = RawRecord::new();
            for (header, cell) in headers.iter().zip(row.iter()) {
                if header.is_empty() || cell.is_empty() {
                    continue;
                }
                record.insert(header.clone(), vec![cell.to_string()]);
            }
            if !record.is_empty() {
                self.records.push(record);
            }
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn load_str(content: &str, delimiter: u8) -> Result<CsvImporter> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, content).unwrap();
        let mut importer = CsvImporter::with_delimiter(delimiter);
        importer.load(&path)?;
        Ok(importer)
    }

    #[test]
    fn header_names_the_fields() {
        let importer = load_str("title,year,genre\nDune,1965,sf\nEmma,1815,classic\n", b',').unwrap();
        let records = importer.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["title"], vec!["Dune"]);
        assert_eq!(records[1]["year"], vec!["1815"]);
    }

    #[test]
    fn empty_cells_leave_fields_unset() {
        let importer = load_str("title,year\nDune,\n", b',').unwrap();
        assert!(!importer.records()[0].contains_key("year"));
    }

    #[test]
    fn quoted_cells_keep_the_delimiter() {
        let importer = load_str("title,notes\nDune,\"dense, slow start\"\n", b',').unwrap();
        assert_eq!(importer.records()[0]["notes"], vec!["dense, slow start"]);
    }

    #[test]
    fn semicolon_delimiter() {
        let importer = load_str("title;year\nDune;1965\n", b';').unwrap();
        assert_eq!(importer.records()[0]["year"], vec!["1965"]);
    }

    #[test]
    fn short_rows_are_tolerated() {
        let importer = load_str("title,year,genre\nDune,1965\n", b',').unwrap();
        let record = &importer.records()[0];
        assert_eq!(record["title"], vec!["Dune"]);
        assert!(!record.contains_key("genre"));
    }
}
