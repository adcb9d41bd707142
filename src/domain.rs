use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ReadprepError;

/// Sequencing direction a sample can be resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ont,
    Illumina,
}

impl Platform {
    /// Maps a free-text platform descriptor to a platform, falling back to
    /// `default` when the descriptor is empty or unrecognized.
    pub fn classify(raw: &str, default: Platform) -> Platform {
        Self::recognize(raw).unwrap_or(default)
    }

    fn recognize(raw: &str) -> Option<Platform> {
        match raw.trim().to_lowercase().as_str() {
            "ont" | "oxford_nanopore" | "oxford-nanopore" | "nanopore" => Some(Platform::Ont),
            "illumina" | "hiseq" | "miseq" | "nextseq" | "novaseq" => Some(Platform::Illumina),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ont => "ont",
            Platform::Illumina => "illumina",
        }
    }

    /// Exact `instrument_platform` value reported by ENA.
    pub fn ena_code(&self) -> &'static str {
        match self {
            Platform::Ont => "OXFORD_NANOPORE",
            Platform::Illumina => "ILLUMINA",
        }
    }

    /// Substrings accepted by loose instrument matching.
    pub fn loose_tokens(&self) -> &'static [&'static str] {
        match self {
            Platform::Ont => &["NANOPORE", "OXFORD"],
            Platform::Illumina => &["ILLUMINA"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Platform::Ont => "ONT",
            Platform::Illumina => "Illumina",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ReadprepError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::recognize(value).ok_or_else(|| ReadprepError::InvalidPlatform(value.to_string()))
    }
}

/// Platform label of a sample record.
///
/// On input it is the declared intent; after resolution it is derived from
/// the read files verified on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplePlatform {
    Ont,
    Illumina,
    Hybrid,
    None,
}

impl SamplePlatform {
    /// Parses a declared platform column. `hybrid` is kept as is, everything
    /// else goes through [`Platform::classify`].
    pub fn declared(raw: &str, default: Platform) -> SamplePlatform {
        if raw.trim().eq_ignore_ascii_case("hybrid") {
            return SamplePlatform::Hybrid;
        }
        Platform::classify(raw, default).into()
    }

    pub fn from_verified(has_ont: bool, has_illumina: bool) -> SamplePlatform {
        match (has_ont, has_illumina) {
            (true, true) => SamplePlatform::Hybrid,
            (true, false) => SamplePlatform::Ont,
            (false, true) => SamplePlatform::Illumina,
            (false, false) => SamplePlatform::None,
        }
    }

    /// Directions that have to be resolved for this declaration.
    pub fn directions(&self) -> &'static [Platform] {
        match self {
            SamplePlatform::Ont => &[Platform::Ont],
            SamplePlatform::Illumina => &[Platform::Illumina],
            SamplePlatform::Hybrid => &[Platform::Ont, Platform::Illumina],
            SamplePlatform::None => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SamplePlatform::Ont => "ont",
            SamplePlatform::Illumina => "illumina",
            SamplePlatform::Hybrid => "hybrid",
            SamplePlatform::None => "none",
        }
    }
}

impl From<Platform> for SamplePlatform {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Ont => SamplePlatform::Ont,
            Platform::Illumina => SamplePlatform::Illumina,
        }
    }
}

impl fmt::Display for SamplePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SRA/ENA/DDBJ run (or experiment) accession.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunAccession(String);

impl RunAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunAccession {
    type Err = ReadprepError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let prefix_len = normalized
            .char_indices()
            .take_while(|(idx, ch)| *idx < 3 && ch.is_ascii_alphabetic())
            .count();
        let digits = &normalized[prefix_len..];
        let is_valid = prefix_len == 3
            && !digits.is_empty()
            && digits.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(ReadprepError::InvalidRunAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

static RUN_LIST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,]\s*|\s+").expect("valid run list separator"));

/// Splits a run list cell into accessions, dropping duplicates while keeping
/// first-seen order. Tokens that are not accessions are returned separately.
pub fn parse_run_list(raw: &str) -> (Vec<RunAccession>, Vec<String>) {
    let mut runs: Vec<RunAccession> = Vec::new();
    let mut invalid = Vec::new();
    for token in RUN_LIST_SEPARATOR.split(raw.trim()) {
        if token.is_empty() {
            continue;
        }
        match token.parse::<RunAccession>() {
            Ok(run) => {
                if !runs.contains(&run) {
                    runs.push(run);
                }
            }
            Err(_) => invalid.push(token.to_string()),
        }
    }
    (runs, invalid)
}

pub fn join_run_list(runs: &[RunAccession]) -> String {
    runs.iter()
        .map(RunAccession::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryLayout {
    Paired,
    Single,
    Unknown,
}

impl LibraryLayout {
    pub fn parse(raw: &str) -> LibraryLayout {
        match raw.trim().to_uppercase().as_str() {
            "PAIRED" => LibraryLayout::Paired,
            "SINGLE" => LibraryLayout::Single,
            _ => LibraryLayout::Unknown,
        }
    }
}

/// One row of the run metadata report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDescriptor {
    pub accession: String,
    pub instrument_platform: String,
    pub library_layout: LibraryLayout,
}

impl RunDescriptor {
    pub fn matches(&self, platform: Platform, strict: bool) -> bool {
        let instrument = self.instrument_platform.trim().to_uppercase();
        if strict {
            return instrument == platform.ena_code();
        }
        platform
            .loose_tokens()
            .iter()
            .any(|token| instrument.contains(token))
    }
}
