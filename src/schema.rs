//! Canonical sample table schema and the column aliases accepted on input.
//!
//! Columns are always resolved by header name. Unknown columns are ignored.

use std::collections::HashMap;

use csv::StringRecord;

/// Version of the canonical table layout written by [`crate::table`].
pub const SCHEMA_VERSION: u32 = 2;

/// Column order of the canonical sample table.
pub const CANONICAL_COLUMNS: [&str; 9] = [
    "sample_id",
    "platform",
    "ont_reads",
    "illumina_r1",
    "illumina_r2",
    "biosample",
    "srrs",
    "barcode",
    "note",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SampleId,
    Platform,
    OntReads,
    IlluminaR1,
    IlluminaR2,
    Biosample,
    Srrs,
    Barcode,
    Note,
    DemuxDir,
}

impl Field {
    /// Accepted header names, in priority order. The first alias with a
    /// non-empty value in a row wins.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::SampleId => &["sample_id"],
            Field::Platform => &["platform"],
            Field::OntReads => &["ont_reads", "read_path", "fastq_path", "fastq_guess"],
            Field::IlluminaR1 => &["illumina_r1", "read_path_r1", "fastq_r1", "r1"],
            Field::IlluminaR2 => &["illumina_r2", "read_path_r2", "fastq_r2", "r2"],
            Field::Biosample => &["biosample_accession", "biosample"],
            Field::Srrs => &["srrs", "resolved_srrs", "run_accessions"],
            Field::Barcode => &["barcode_id", "barcode"],
            Field::Note => &["note"],
            Field::DemuxDir => &["demux_output_path", "fastq_output_path"],
        }
    }
}

/// Maps trimmed header names to their column positions.
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(headers: &StringRecord) -> Self {
        let names = headers
            .iter()
            .map(|name| name.trim().trim_start_matches('\u{feff}').to_string())
            .collect::<Vec<_>>();
        let mut positions = HashMap::new();
        for (idx, name) in names.iter().enumerate() {
            positions.entry(name.clone()).or_insert(idx);
        }
        Self { names, positions }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn has_field(&self, field: Field) -> bool {
        field.aliases().iter().any(|alias| self.has_column(alias))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the trimmed value of the first alias of `field` that is present
    /// and non-empty in `row`. Short rows read as empty trailing fields.
    pub fn get<'r>(&self, row: &'r StringRecord, field: Field) -> Option<&'r str> {
        field.aliases().iter().find_map(|alias| {
            let idx = *self.positions.get(*alias)?;
            let value = row.get(idx)?.trim();
            (!value.is_empty()).then_some(value)
        })
    }
}

/// True when every cell of the row is empty after trimming.
pub fn is_blank(row: &StringRecord) -> bool {
    row.iter().all(|value| value.trim().is_empty())
}
