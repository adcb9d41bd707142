use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::acquire::{Acquirer, ReadOutput};
use crate::domain::{Platform, RunAccession, SamplePlatform, join_run_list};
use crate::ena::{self, RunMetadataClient};
use crate::error::ReadprepError;
use crate::fs_util;
use crate::sample::SampleRecord;
use crate::srr::SrrClient;

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Re-download even when reads are already present.
    pub force: bool,
    /// Keep read paths from the input that already point at non-empty files.
    pub skip_existing: bool,
    /// Require exact instrument platform codes when resolving runs.
    pub strict_platform: bool,
    /// Samples processed concurrently.
    pub jobs: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            force: false,
            skip_existing: true,
            strict_platform: true,
            jobs: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Unresolved,
    KeptExisting,
    Fetching,
    Fetched,
    Failed,
}

impl ResolutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolutionState::KeptExisting | ResolutionState::Fetched | ResolutionState::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionOutcome {
    pub platform: Platform,
    pub state: ResolutionState,
    pub note: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleOutcome {
    pub sample_id: String,
    pub declared: SamplePlatform,
    pub platform: SamplePlatform,
    pub directions: Vec<DirectionOutcome>,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct ResolveResult {
    pub records: Vec<SampleRecord>,
    pub outcomes: Vec<SampleOutcome>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct App<M: RunMetadataClient, S: SrrClient> {
    metadata: M,
    acquirer: Acquirer<S>,
}

impl<M: RunMetadataClient, S: SrrClient> App<M, S> {
    pub fn new(metadata: M, acquirer: Acquirer<S>) -> Self {
        Self { metadata, acquirer }
    }

    pub fn acquirer(&self) -> &Acquirer<S> {
        &self.acquirer
    }

    /// Resolves every record independently and returns them in input order
    /// with platforms recomputed from the files on disk.
    pub fn resolve(
        &self,
        records: Vec<SampleRecord>,
        options: &ResolveOptions,
        sink: &dyn ProgressSink,
    ) -> Result<ResolveResult, ReadprepError> {
        fs_util::ensure_dir(self.acquirer.outdir())?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs.max(1))
            .thread_name(|idx| format!("readprep-{idx}"))
            .build()
            .map_err(|err| ReadprepError::WorkerPool(err.to_string()))?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; {} samples, {} job(s)",
                records.len(),
                options.jobs.max(1)
            ),
            elapsed: None,
        });
        let start = Instant::now();

        let mut tagged = pool.install(|| {
            records
                .into_par_iter()
                .enumerate()
                .map(|(idx, record)| (idx, self.resolve_sample(record, options, sink)))
                .collect::<Vec<_>>()
        });
        tagged.sort_by_key(|(idx, _)| *idx);

        let (records, outcomes) = tagged
            .into_iter()
            .map(|(_, (record, directions, declared))| finalize(record, directions, declared))
            .unzip();

        sink.event(ProgressEvent {
            message: "phase=Verify; platforms recomputed from disk".to_string(),
            elapsed: Some(start.elapsed()),
        });
        Ok(ResolveResult { records, outcomes })
    }

    fn resolve_sample(
        &self,
        mut record: SampleRecord,
        options: &ResolveOptions,
        sink: &dyn ProgressSink,
    ) -> (SampleRecord, Vec<DirectionOutcome>, SamplePlatform) {
        let declared = record.platform;
        let prior_note = std::mem::take(&mut record.note);
        let requested = std::mem::take(&mut record.srrs);
        let mut used: Vec<RunAccession> = Vec::new();
        let mut outcomes = Vec::new();
        for &platform in declared.directions() {
            let outcome =
                self.resolve_direction(&mut record, platform, &requested, &mut used, options, sink);
            debug_assert!(outcome.state.is_terminal());
            outcomes.push(outcome);
        }

        let has_state =
            |state: ResolutionState| outcomes.iter().any(|outcome| outcome.state == state);
        let any_fetched = has_state(ResolutionState::Fetched);
        let any_kept = has_state(ResolutionState::KeptExisting);
        let all_kept = !outcomes.is_empty()
            && outcomes
                .iter()
                .all(|outcome| outcome.state == ResolutionState::KeptExisting);

        if all_kept && !prior_note.is_empty() {
            record.note = prior_note;
        } else {
            for outcome in &outcomes {
                record.push_note(&outcome.note);
            }
        }

        // runs that produced nothing are only named in the note
        record.srrs = if any_fetched {
            used
        } else if any_kept {
            requested
        } else {
            if !requested.is_empty() {
                record.push_note(format!("requested {}", join_run_list(&requested)));
            }
            Vec::new()
        };
        (record, outcomes, declared)
    }

    fn resolve_direction(
        &self,
        record: &mut SampleRecord,
        platform: Platform,
        requested: &[RunAccession],
        used: &mut Vec<RunAccession>,
        options: &ResolveOptions,
        sink: &dyn ProgressSink,
    ) -> DirectionOutcome {
        let sample_id = record.sample_id.clone();
        let label = platform.label();
        let outcome = |state: ResolutionState, note: String| DirectionOutcome {
            platform,
            state,
            note,
        };

        if options.skip_existing && !options.force && record.has_existing_reads(platform) {
            debug!("{sample_id}: keeping existing {label} reads");
            return outcome(
                ResolutionState::KeptExisting,
                format!("kept existing {label} reads"),
            );
        }

        if !options.force {
            if let Some(existing) = self.acquirer.existing_output(&sample_id, platform) {
                apply_output(record, existing);
                return outcome(
                    ResolutionState::KeptExisting,
                    format!("reused merged {label} reads"),
                );
            }
        }

        let runs: Vec<RunAccession> = if !requested.is_empty() {
            requested.to_vec()
        } else {
            let Some(biosample) = record.biosample.clone() else {
                return outcome(
                    ResolutionState::Failed,
                    format!("{label}: no biosample and no run accessions"),
                );
            };
            sink.event(ProgressEvent {
                message: format!("ena.request {sample_id} {biosample} platform={platform}"),
                elapsed: None,
            });
            let runs = ena::resolve(&self.metadata, &biosample, platform, options.strict_platform);
            if runs.is_empty() {
                return outcome(
                    ResolutionState::Failed,
                    format!("{label}: no runs found for biosample {biosample}"),
                );
            }
            runs
        };

        sink.event(ProgressEvent {
            message: format!(
                "phase=Fetch; {sample_id} {label} runs={}",
                join_run_list(&runs)
            ),
            elapsed: None,
        });
        debug!("{sample_id}: {:?} {label}", ResolutionState::Fetching);
        let start = Instant::now();
        match self.acquirer.acquire(&sample_id, &runs, platform) {
            Ok(acquired) => {
                apply_output(record, acquired.output);
                for run in &acquired.runs {
                    if !used.contains(run) {
                        used.push(run.clone());
                    }
                }
                sink.event(ProgressEvent {
                    message: format!("phase=Store; {sample_id} {label} merged"),
                    elapsed: Some(start.elapsed()),
                });
                outcome(
                    ResolutionState::Fetched,
                    format!("{label} merged from {} run(s)", acquired.runs.len()),
                )
            }
            Err(err) => outcome(
                ResolutionState::Failed,
                format!("{label} {} failed: {err}", err.stage()),
            ),
        }
    }
}

fn apply_output(record: &mut SampleRecord, output: ReadOutput) {
    match output {
        ReadOutput::Ont(path) => record.ont_reads = Some(path),
        ReadOutput::Illumina { r1, r2 } => {
            record.illumina_r1 = Some(r1);
            record.illumina_r2 = r2;
        }
    }
}

/// Derives the final platform from verified files.
fn finalize(
    mut record: SampleRecord,
    directions: Vec<DirectionOutcome>,
    declared: SamplePlatform,
) -> (SampleRecord, SampleOutcome) {
    if let Some(r2) = record.illumina_r2.clone() {
        if !fs_util::is_non_empty_file(&r2) {
            record.illumina_r2 = None;
            record.push_note(format!("dropped missing illumina_r2 {r2}"));
        }
    }
    record.platform = record.verified_platform();
    if record.platform == SamplePlatform::None {
        record.push_note("no verified read files on disk");
    }
    info!(
        "{} ({declared}) -> {} | {}",
        record.sample_id, record.platform, record.note
    );
    let outcome = SampleOutcome {
        sample_id: record.sample_id.clone(),
        declared,
        platform: record.platform,
        directions,
        note: record.note.clone(),
    };
    (record, outcome)
}
