//! Locates a per-barcode FASTQ inside demultiplexing output.
//!
//! Candidates are an ordered list of named glob templates rooted at the
//! demultiplexing directory. `{barcode}` expands to `barcodeNN`. When several
//! files match, [`score`] picks one deterministically.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatePattern {
    pub name: &'static str,
    pub vendor: &'static str,
    pub template: &'static str,
}

/// Dorado and Guppy layouts, most specific first.
pub const ONT_CANDIDATES: &[CandidatePattern] = &[
    CandidatePattern {
        name: "barcode_dir",
        vendor: "ont",
        template: "{barcode}/*.fastq.gz",
    },
    CandidatePattern {
        name: "barcode_fastq_pass",
        vendor: "ont",
        template: "{barcode}/fastq_pass/*.fastq.gz",
    },
    CandidatePattern {
        name: "fastq_pass_barcode",
        vendor: "ont",
        template: "fastq_pass/{barcode}/*.fastq.gz",
    },
    CandidatePattern {
        name: "flat_file",
        vendor: "ont",
        template: "{barcode}.fastq.gz",
    },
    CandidatePattern {
        name: "flat_prefixed",
        vendor: "ont",
        template: "{barcode}_*.fastq.gz",
    },
    CandidatePattern {
        name: "barcode_reads",
        vendor: "ont",
        template: "{barcode}/reads.fastq.gz",
    },
];

static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)$").expect("valid barcode regex"));

/// `barcode07`, `BC7` and `7` all become `barcode07`. Returns `None` when the
/// identifier has no digits.
pub fn barcode_dir_name(barcode: &str) -> Option<String> {
    let barcode = barcode.trim();
    let digits = match TRAILING_DIGITS.captures(barcode) {
        Some(caps) => caps[1].to_string(),
        None => barcode.chars().filter(|ch| ch.is_ascii_digit()).collect(),
    };
    if digits.is_empty() {
        return None;
    }
    Some(format!("barcode{digits:0>2}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    path: PathBuf,
    pattern_rank: usize,
    size: u64,
}

/// Ranking key, larger is better: a `fastq_pass` path component first, then
/// file size, then the earliest pattern, then the lexicographically smallest
/// path.
fn score(candidate: &Candidate) -> (bool, u64, Reverse<usize>, Reverse<PathBuf>) {
    (
        under_fastq_pass(&candidate.path),
        candidate.size,
        Reverse(candidate.pattern_rank),
        Reverse(candidate.path.clone()),
    )
}

fn under_fastq_pass(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => name
            .to_str()
            .map(|name| name.eq_ignore_ascii_case("fastq_pass"))
            .unwrap_or(false),
        _ => false,
    })
}

/// Best matching FASTQ for `barcode` under `demux_dir`, using `patterns` in
/// order.
pub fn infer_fastq(
    demux_dir: &Path,
    barcode: &str,
    patterns: &[CandidatePattern],
) -> Option<PathBuf> {
    let root = std::path::absolute(demux_dir).ok()?;
    if !root.is_dir() {
        return None;
    }
    let barcode_name = barcode_dir_name(barcode)?;
    let escaped_root = glob::Pattern::escape(root.to_str()?);

    let mut found: BTreeMap<PathBuf, Candidate> = BTreeMap::new();
    for (rank, pattern) in patterns.iter().enumerate() {
        let relative = pattern.template.replace("{barcode}", &barcode_name);
        let full = format!("{escaped_root}/{relative}");
        let Ok(paths) = glob::glob(&full) else {
            continue;
        };
        for path in paths.flatten() {
            let Ok(meta) = fs::metadata(&path) else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            found.entry(path.clone()).or_insert(Candidate {
                path,
                pattern_rank: rank,
                size: meta.len(),
            });
        }
    }

    let best = found.into_values().max_by_key(score)?;
    debug!(
        "demux inference for {barcode_name}: {} via {}",
        best.path.display(),
        patterns[best.pattern_rank].name
    );
    Some(best.path)
}
