use std::collections::HashSet;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

use crate::domain::{Platform, SamplePlatform, join_run_list, parse_run_list};
use crate::error::ReadprepError;
use crate::fs_util;
use crate::sample::{SampleRecord, is_safe_sample_id};
use crate::schema::{CANONICAL_COLUMNS, Field, HeaderIndex, is_blank};

/// Reads a tab-delimited sample table.
///
/// `sample_id` and `platform` are required. Legacy column names are accepted
/// through the schema aliases and unknown columns are ignored. Duplicate
/// sample ids keep their first row. Ids that cannot name a file under the
/// output directory are skipped.
pub fn read_table(path: &Path, default_platform: Platform) -> Result<Vec<SampleRecord>, ReadprepError> {
    let table_err = |message: String| ReadprepError::SampleTable {
        path: path.to_path_buf(),
        message,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .map_err(|err| table_err(err.to_string()))?;
    let index = HeaderIndex::new(reader.headers().map_err(|err| table_err(err.to_string()))?);
    for required in [Field::SampleId, Field::Platform] {
        if !index.has_field(required) {
            return Err(ReadprepError::TableMissingColumn {
                path: path.to_path_buf(),
                column: required.aliases()[0].to_string(),
            });
        }
    }

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| table_err(err.to_string()))?;
        if is_blank(&row) {
            continue;
        }
        let Some(sample_id) = index.get(&row, Field::SampleId) else {
            debug!("skipping row without sample_id in {}", path.display());
            continue;
        };
        if !is_safe_sample_id(sample_id) {
            warn!("skipping sample id {sample_id:?} in {}: not usable as a file name", path.display());
            continue;
        }
        if !seen.insert(sample_id.to_string()) {
            debug!("dropping duplicate sample {sample_id}");
            continue;
        }

        let platform =
            SamplePlatform::declared(index.get(&row, Field::Platform).unwrap_or(""), default_platform);
        let mut record = SampleRecord::new(sample_id, platform);
        record.ont_reads = index.get(&row, Field::OntReads).map(Utf8PathBuf::from);
        record.illumina_r1 = index.get(&row, Field::IlluminaR1).map(Utf8PathBuf::from);
        record.illumina_r2 = index.get(&row, Field::IlluminaR2).map(Utf8PathBuf::from);
        record.biosample = index.get(&row, Field::Biosample).map(str::to_string);
        record.barcode = index.get(&row, Field::Barcode).map(str::to_string);
        record.note = index.get(&row, Field::Note).unwrap_or("").to_string();
        if let Some(raw) = index.get(&row, Field::Srrs) {
            let (runs, invalid) = parse_run_list(raw);
            if !invalid.is_empty() {
                warn!("{sample_id}: ignoring invalid run accessions {invalid:?}");
            }
            record.srrs = runs;
        }
        records.push(record);
    }
    Ok(records)
}

/// Serializes records in canonical column order.
pub fn render_table(records: &[SampleRecord]) -> Result<Vec<u8>, ReadprepError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());
    writer
        .write_record(CANONICAL_COLUMNS)
        .map_err(|err| ReadprepError::Filesystem(err.to_string()))?;
    for record in records {
        let srrs = join_run_list(&record.srrs);
        let row: [&str; 9] = [
            record.sample_id.as_str(),
            record.platform.as_str(),
            path_cell(record.ont_reads.as_deref()),
            path_cell(record.illumina_r1.as_deref()),
            path_cell(record.illumina_r2.as_deref()),
            record.biosample.as_deref().unwrap_or(""),
            srrs.as_str(),
            record.barcode.as_deref().unwrap_or(""),
            record.note.as_str(),
        ];
        writer
            .write_record(row)
            .map_err(|err| ReadprepError::Filesystem(err.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|err| ReadprepError::Filesystem(err.to_string()))
}

/// Writes the canonical table atomically; readers never see a partial table.
pub fn write_table(path: &Utf8Path, records: &[SampleRecord]) -> Result<(), ReadprepError> {
    let content = render_table(records)?;
    fs_util::write_bytes_atomic(path, &content)
}

fn path_cell(path: Option<&Utf8Path>) -> &str {
    path.map(Utf8Path::as_str).unwrap_or("")
}
