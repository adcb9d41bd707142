//! Downloads runs and merges them into canonical per-sample FASTQ targets.
//!
//! Every direction gets a fresh scratch directory that is removed when the
//! call returns. Merged channels are compressed into temporary files next to
//! their targets and only renamed into place once all channels of the
//! direction succeeded, so a target is either absent, the previous file, or a
//! complete new file.

use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::compress::Compressor;
use crate::domain::{Platform, RunAccession, join_run_list};
use crate::fs_util;
use crate::sample::is_safe_sample_id;
use crate::srr::SrrClient;

#[derive(Debug, Error)]
pub enum AcquisitionFailure {
    #[error("sample id {0:?} cannot name a file under the output directory")]
    UnsafeSampleId(String),

    #[error("could not prepare scratch directory: {0}")]
    Scratch(String),

    #[error("no reads produced for {runs}")]
    NoReads { runs: String },

    #[error("failed to write {target}: {message}")]
    Compress { target: Utf8PathBuf, message: String },
}

impl AcquisitionFailure {
    pub fn stage(&self) -> &'static str {
        match self {
            AcquisitionFailure::UnsafeSampleId(_) | AcquisitionFailure::Scratch(_) => "scratch",
            AcquisitionFailure::NoReads { .. } => "download",
            AcquisitionFailure::Compress { .. } => "compress",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutput {
    Ont(Utf8PathBuf),
    Illumina {
        r1: Utf8PathBuf,
        r2: Option<Utf8PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredReads {
    pub output: ReadOutput,
    /// Accessions that contributed reads, in processing order.
    pub runs: Vec<RunAccession>,
}

#[derive(Debug, Default)]
struct Channels {
    r1: Vec<PathBuf>,
    r2: Vec<PathBuf>,
    /// Unsuffixed illumina files folded into R1.
    single: usize,
}

#[derive(Clone)]
pub struct Acquirer<S: SrrClient> {
    srr: S,
    compressor: Compressor,
    outdir: Utf8PathBuf,
    scratch_root: Utf8PathBuf,
    threads: usize,
}

impl<S: SrrClient> Acquirer<S> {
    pub fn new(
        srr: S,
        compressor: Compressor,
        outdir: Utf8PathBuf,
        scratch_root: Utf8PathBuf,
        threads: usize,
    ) -> Self {
        Self {
            srr,
            compressor,
            outdir,
            scratch_root,
            threads: threads.max(1),
        }
    }

    pub fn outdir(&self) -> &Utf8Path {
        &self.outdir
    }

    pub fn ont_target(&self, sample_id: &str) -> Utf8PathBuf {
        self.outdir.join(format!("{sample_id}.ont.fastq.gz"))
    }

    pub fn illumina_targets(&self, sample_id: &str) -> (Utf8PathBuf, Utf8PathBuf) {
        (
            self.outdir.join(format!("{sample_id}.illumina.R1.fastq.gz")),
            self.outdir.join(format!("{sample_id}.illumina.R2.fastq.gz")),
        )
    }

    /// Canonical targets of a previous run, if they are present and non-empty.
    pub fn existing_output(&self, sample_id: &str, platform: Platform) -> Option<ReadOutput> {
        if !is_safe_sample_id(sample_id) {
            return None;
        }
        match platform {
            Platform::Ont => {
                let target = self.ont_target(sample_id);
                fs_util::is_non_empty_file(&target).then_some(ReadOutput::Ont(target))
            }
            Platform::Illumina => {
                let (r1, r2) = self.illumina_targets(sample_id);
                if !fs_util::is_non_empty_file(&r1) {
                    return None;
                }
                let r2 = fs_util::is_non_empty_file(&r2).then_some(r2);
                Some(ReadOutput::Illumina { r1, r2 })
            }
        }
    }

    /// Downloads `runs` for one direction and merges them into the sample's
    /// canonical target(s), replacing previous targets.
    pub fn acquire(
        &self,
        sample_id: &str,
        runs: &[RunAccession],
        platform: Platform,
    ) -> Result<AcquiredReads, AcquisitionFailure> {
        if !is_safe_sample_id(sample_id) {
            return Err(AcquisitionFailure::UnsafeSampleId(sample_id.to_string()));
        }
        fs_util::ensure_dir(&self.scratch_root)
            .and_then(|_| fs_util::ensure_dir(&self.outdir))
            .map_err(|err| AcquisitionFailure::Scratch(err.to_string()))?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{sample_id}_{platform}_"))
            .tempdir_in(self.scratch_root.as_std_path())
            .map_err(|err| AcquisitionFailure::Scratch(err.to_string()))?;

        let split = platform == Platform::Illumina;
        let mut channels = Channels::default();
        let mut used = Vec::new();
        for run in runs {
            let files = match self.srr.dump_run(run, split, self.threads, scratch.path()) {
                Ok(files) => files,
                Err(err) => {
                    warn!("{sample_id}: {run} extraction failed: {err}");
                    continue;
                }
            };
            let files = files
                .into_iter()
                .filter(|path| {
                    Utf8Path::from_path(path)
                        .map(fs_util::is_non_empty_file)
                        .unwrap_or(false)
                })
                .collect::<Vec<_>>();
            if files.is_empty() {
                warn!("{sample_id}: no files produced by fasterq-dump for {run}");
                continue;
            }
            for file in files {
                channels.classify(run, file, platform);
            }
            used.push(run.clone());
        }

        if channels.r1.is_empty() && channels.r2.is_empty() {
            return Err(AcquisitionFailure::NoReads {
                runs: join_run_list(runs),
            });
        }
        if channels.is_mixed() {
            warn!(
                "{sample_id}: {} single-end file(s) merged into R1 next to paired runs; R1 and R2 will not pair up",
                channels.single
            );
        }

        let output = match platform {
            Platform::Ont => {
                let target = self.ont_target(sample_id);
                let staged = self.stage(&channels.r1, &target)?;
                self.commit(staged, &target)?;
                ReadOutput::Ont(target)
            }
            Platform::Illumina => {
                let (r1_target, r2_target) = self.illumina_targets(sample_id);
                if channels.r1.is_empty() {
                    return Err(AcquisitionFailure::NoReads {
                        runs: join_run_list(runs),
                    });
                }
                let staged_r1 = self.stage(&channels.r1, &r1_target)?;
                let staged_r2 = if channels.r2.is_empty() {
                    None
                } else {
                    Some(self.stage(&channels.r2, &r2_target)?)
                };
                self.commit(staged_r1, &r1_target)?;
                let r2 = match staged_r2 {
                    Some(staged) => {
                        self.commit(staged, &r2_target)?;
                        Some(r2_target)
                    }
                    None => {
                        fs_util::remove_if_exists(&r2_target).map_err(|err| {
                            AcquisitionFailure::Compress {
                                target: r2_target.clone(),
                                message: err.to_string(),
                            }
                        })?;
                        None
                    }
                };
                ReadOutput::Illumina { r1: r1_target, r2 }
            }
        };

        info!(
            "{sample_id}: merged {} {} run(s) with {}",
            used.len(),
            platform.label(),
            self.compressor.name()
        );
        Ok(AcquiredReads { output, runs: used })
    }

    fn stage(
        &self,
        sources: &[PathBuf],
        target: &Utf8Path,
    ) -> Result<NamedTempFile, AcquisitionFailure> {
        let file_name = target.file_name().unwrap_or("reads.fastq.gz");
        self.compressor
            .concat_to_temp(
                sources,
                self.outdir.as_std_path(),
                &format!(".{file_name}."),
                self.threads,
            )
            .map_err(|err| AcquisitionFailure::Compress {
                target: target.to_path_buf(),
                message: err.to_string(),
            })
    }

    fn commit(&self, staged: NamedTempFile, target: &Utf8Path) -> Result<(), AcquisitionFailure> {
        staged
            .persist(target.as_std_path())
            .map(|_| ())
            .map_err(|err| AcquisitionFailure::Compress {
                target: target.to_path_buf(),
                message: err.error.to_string(),
            })
    }
}

impl Channels {
    /// `{run}_1` goes to R1, `{run}_2` to R2 and unsuffixed files to R1. ONT
    /// keeps every file in its single channel.
    fn classify(&mut self, run: &RunAccession, file: PathBuf, platform: Platform) {
        if platform == Platform::Ont {
            self.r1.push(file);
            return;
        }
        let stem = file
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(".fastq"))
            .unwrap_or("")
            .to_string();
        if stem == format!("{run}_2") {
            self.r2.push(file);
        } else {
            if stem == run.as_str() {
                self.single += 1;
            }
            self.r1.push(file);
        }
    }

    /// Single-end and paired files ended up in the same direction, so R1 and
    /// R2 no longer hold the same reads.
    fn is_mixed(&self) -> bool {
        self.single > 0 && !self.r2.is_empty()
    }
}
