//! Normalizes run manifests into canonical sample records.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::demux::{self, ONT_CANDIDATES};
use crate::domain::{Platform, SamplePlatform, parse_run_list};
use crate::error::ReadprepError;
use crate::sample::{SampleRecord, is_safe_sample_id};
use crate::schema::{Field, HeaderIndex, is_blank};

const SNIFF_BYTES: usize = 4096;
const DELIMITERS: [u8; 3] = [b'\t', b',', b';'];

/// Picks the field delimiter of a manifest.
///
/// Delimiters inside double-quoted fields are not counted. For each
/// candidate the modal per-line count is taken; a candidate qualifies when
/// the header contains it and at least half of the sampled lines match its
/// mode. The candidate matching the most lines wins, then the one with the
/// larger mode. A remaining tie, or no qualifying candidate, means tab.
pub fn sniff_delimiter(content: &str) -> u8 {
    let mut end = content.len().min(SNIFF_BYTES);
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    let mut lines = content[..end]
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>();
    // the last line may have been cut short by the sample window
    if end < content.len() && lines.len() > 1 {
        lines.pop();
    }
    if lines.is_empty() {
        return b'\t';
    }

    let mut scored = DELIMITERS
        .iter()
        .filter_map(|&delim| {
            let counts = lines
                .iter()
                .map(|line| unquoted_count(line, delim))
                .collect::<Vec<_>>();
            let (mode, matching) = modal_count(&counts);
            let qualifies = mode > 0 && counts[0] > 0 && matching * 2 >= counts.len();
            qualifies.then_some((delim, (matching, mode)))
        })
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    match scored.as_slice() {
        [] => b'\t',
        [(delim, _)] => *delim,
        [(delim, best), (_, next), ..] if best > next => *delim,
        _ => b'\t',
    }
}

fn unquoted_count(line: &str, delim: u8) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            quoted = !quoted;
        } else if byte == delim && !quoted {
            count += 1;
        }
    }
    count
}

/// Most frequent value and how many lines have it; ties go to the larger
/// value.
fn modal_count(counts: &[usize]) -> (usize, usize) {
    let mut frequency: HashMap<usize, usize> = HashMap::new();
    for &count in counts {
        *frequency.entry(count).or_default() += 1;
    }
    frequency
        .into_iter()
        .max_by_key(|&(count, lines)| (lines, count))
        .unwrap_or((0, 0))
}

/// Rows of one manifest file, blank rows removed.
#[derive(Debug)]
pub struct Manifest {
    pub path: PathBuf,
    pub index: HeaderIndex,
    pub rows: Vec<StringRecord>,
}

pub fn read_manifest(path: &Path) -> Result<Manifest, ReadprepError> {
    let read_err = |message: String| ReadprepError::ManifestRead {
        path: path.to_path_buf(),
        message,
    };
    let content = fs::read_to_string(path).map_err(|err| read_err(err.to_string()))?;
    let content = content.trim_start_matches('\u{feff}');
    let delimiter = sniff_delimiter(content);
    debug!(
        "{}: delimiter {:?}",
        path.display(),
        char::from(delimiter)
    );

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());
    let index = HeaderIndex::new(reader.headers().map_err(|err| read_err(err.to_string()))?);
    if !index.has_field(Field::SampleId) {
        return Err(ReadprepError::ManifestMissingColumn {
            path: path.to_path_buf(),
            column: "sample_id".to_string(),
            found: index.names().join(", "),
        });
    }

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| read_err(err.to_string()))?;
        if !is_blank(&row) {
            rows.push(row);
        }
    }
    Ok(Manifest {
        path: path.to_path_buf(),
        index,
        rows,
    })
}

/// Sorted list of files matching `pattern`.
pub fn find_manifests(pattern: &str) -> Result<Vec<PathBuf>, ReadprepError> {
    let paths = glob::glob(pattern).map_err(|err| ReadprepError::InvalidGlob {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })?;
    let mut files = paths
        .flatten()
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

/// Converts one manifest row. Returns `None` for rows without a usable
/// sample id.
pub fn normalize_row(
    index: &HeaderIndex,
    row: &StringRecord,
    default_platform: Platform,
) -> Option<SampleRecord> {
    let sample_id = index.get(row, Field::SampleId)?;
    if !is_safe_sample_id(sample_id) {
        warn!("skipping sample id {sample_id:?}: not usable as a file name");
        return None;
    }
    let platform =
        SamplePlatform::declared(index.get(row, Field::Platform).unwrap_or(""), default_platform);
    let mut record = SampleRecord::new(sample_id, platform);
    record.biosample = index.get(row, Field::Biosample).map(str::to_string);
    record.barcode = index.get(row, Field::Barcode).map(str::to_string);
    record.illumina_r1 = index.get(row, Field::IlluminaR1).map(Utf8PathBuf::from);
    record.illumina_r2 = index.get(row, Field::IlluminaR2).map(Utf8PathBuf::from);
    record.ont_reads = index.get(row, Field::OntReads).map(Utf8PathBuf::from);

    if record.ont_reads.is_none() && platform == SamplePlatform::Ont {
        if let (Some(demux_dir), Some(barcode)) =
            (index.get(row, Field::DemuxDir), record.barcode.as_deref())
        {
            record.ont_reads = demux::infer_fastq(Path::new(demux_dir), barcode, ONT_CANDIDATES)
                .and_then(|path| Utf8PathBuf::from_path_buf(path).ok());
            if record.ont_reads.is_none() {
                debug!("{sample_id}: no FASTQ found for barcode {barcode} under {demux_dir}");
            }
        }
    }

    if let Some(raw) = index.get(row, Field::Srrs) {
        let (runs, invalid) = parse_run_list(raw);
        if !invalid.is_empty() {
            warn!("{sample_id}: ignoring invalid run accessions {invalid:?}");
        }
        record.srrs = runs;
    }
    Some(record)
}

/// Reads every manifest matching `pattern` and returns one record per sample
/// id, first occurrence winning, in file-then-row order.
pub fn normalize_manifests(
    pattern: &str,
    default_platform: Platform,
) -> Result<Vec<SampleRecord>, ReadprepError> {
    let paths = find_manifests(pattern)?;
    if paths.is_empty() {
        return Err(ReadprepError::NoManifests(pattern.to_string()));
    }

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for path in &paths {
        let manifest = read_manifest(path)?;
        let mut kept = 0usize;
        for row in &manifest.rows {
            let Some(record) = normalize_row(&manifest.index, row, default_platform) else {
                continue;
            };
            if seen.insert(record.sample_id.clone()) {
                records.push(record);
                kept += 1;
            }
        }
        info!(
            "{}: {} rows, {kept} new samples",
            manifest.path.display(),
            manifest.rows.len()
        );
    }

    if records.is_empty() {
        return Err(ReadprepError::EmptyManifests(pattern.to_string()));
    }
    Ok(records)
}
