use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{Platform, RunAccession, SamplePlatform};
use crate::fs_util;

/// One row of the canonical sample table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub sample_id: String,
    pub platform: SamplePlatform,
    pub ont_reads: Option<Utf8PathBuf>,
    pub illumina_r1: Option<Utf8PathBuf>,
    pub illumina_r2: Option<Utf8PathBuf>,
    pub biosample: Option<String>,
    pub srrs: Vec<RunAccession>,
    pub barcode: Option<String>,
    pub note: String,
}

impl SampleRecord {
    pub fn new(sample_id: impl Into<String>, platform: SamplePlatform) -> Self {
        Self {
            sample_id: sample_id.into(),
            platform,
            ont_reads: None,
            illumina_r1: None,
            illumina_r2: None,
            biosample: None,
            srrs: Vec::new(),
            barcode: None,
            note: String::new(),
        }
    }

    /// Appends a diagnostic, separated from earlier ones by `; `.
    pub fn push_note(&mut self, note: impl AsRef<str>) {
        let note = note.as_ref();
        if note.is_empty() {
            return;
        }
        if !self.note.is_empty() {
            self.note.push_str("; ");
        }
        self.note.push_str(note);
    }

    /// Whether the paths already recorded for `platform` point at non-empty
    /// files. An illumina R2 path is optional but must verify when set.
    pub fn has_existing_reads(&self, platform: Platform) -> bool {
        match platform {
            Platform::Ont => verified(self.ont_reads.as_deref()),
            Platform::Illumina => {
                verified(self.illumina_r1.as_deref())
                    && self
                        .illumina_r2
                        .as_deref()
                        .map(fs_util::is_non_empty_file)
                        .unwrap_or(true)
            }
        }
    }

    /// Platform label derived from the files present on disk right now.
    pub fn verified_platform(&self) -> SamplePlatform {
        SamplePlatform::from_verified(
            verified(self.ont_reads.as_deref()),
            verified(self.illumina_r1.as_deref()),
        )
    }
}

/// Whether `id` can name files under the output directory: no path
/// separators, no `.` or `..`, no control characters.
pub fn is_safe_sample_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.chars().any(|c| c == '/' || c == '\\' || c.is_control())
}

fn verified(path: Option<&Utf8Path>) -> bool {
    path.map(fs_util::is_non_empty_file).unwrap_or(false)
}
