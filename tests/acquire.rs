use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::MultiGzDecoder;

use readprep::acquire::{AcquisitionFailure, Acquirer, ReadOutput};
use readprep::compress::Compressor;
use readprep::domain::{Platform, RunAccession};
use readprep::error::ReadprepError;
use readprep::srr::SrrClient;

/// Writes canned FASTQ files for each known run; unknown runs fail.
#[derive(Default)]
struct MockSrr {
    files: HashMap<String, Vec<(&'static str, String)>>,
    calls: Arc<Mutex<Vec<(String, bool, PathBuf)>>>,
}

impl MockSrr {
    fn with_run(mut self, run: &str, files: &[(&'static str, &str)]) -> Self {
        self.files.insert(
            run.to_string(),
            files
                .iter()
                .map(|(suffix, content)| (*suffix, content.to_string()))
                .collect(),
        );
        self
    }
}

impl SrrClient for MockSrr {
    fn dump_run(
        &self,
        run: &RunAccession,
        split: bool,
        _threads: usize,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ReadprepError> {
        self.calls
            .lock()
            .unwrap()
            .push((run.to_string(), split, out_dir.to_path_buf()));
        let Some(files) = self.files.get(run.as_str()) else {
            return Err(ReadprepError::SrrConversion(format!("{run} not found")));
        };
        let mut written = Vec::new();
        for (suffix, content) in files {
            let path = out_dir.join(format!("{run}{suffix}.fastq"));
            fs::write(&path, content).unwrap();
            written.push(path);
        }
        Ok(written)
    }
}

fn utf8(path: &Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

fn runs(ids: &[&str]) -> Vec<RunAccession> {
    ids.iter().map(|id| id.parse().unwrap()).collect()
}

fn gunzip(path: &Utf8Path) -> String {
    let mut decoder = MultiGzDecoder::new(fs::File::open(path).unwrap());
    let mut content = String::new();
    decoder.read_to_string(&mut content).unwrap();
    content
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    names.sort();
    names
}

const READ_A: &str = "@a1\nACGT\n+\nIIII\n";
const READ_B: &str = "@b1\nTTGA\n+\nIIII\n";

#[test]
fn ont_runs_merge_in_accession_order() {
    let out = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let srr = MockSrr::default()
        .with_run("SRR1", &[("", READ_A)])
        .with_run("SRR2", &[("", READ_B)]);
    let acquirer = Acquirer::new(
        srr,
        Compressor::Builtin,
        utf8(out.path()),
        utf8(scratch.path()),
        2,
    );

    let acquired = acquirer
        .acquire("s1", &runs(&["SRR1", "SRR2"]), Platform::Ont)
        .unwrap();
    let target = acquirer.ont_target("s1");
    assert_eq!(acquired.output, ReadOutput::Ont(target.clone()));
    assert_eq!(acquired.runs, runs(&["SRR1", "SRR2"]));
    assert_eq!(gunzip(&target), format!("{READ_A}{READ_B}"));
    assert_eq!(entries(out.path()), vec!["s1.ont.fastq.gz"]);
    assert!(entries(scratch.path()).is_empty());
}

#[test]
fn extraction_splits_only_for_illumina_in_private_scratch() {
    let out = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let srr = MockSrr::default()
        .with_run("SRR1", &[("", READ_A)])
        .with_run("SRR2", &[("_1", READ_B)]);
    let calls = Arc::clone(&srr.calls);
    let acquirer = Acquirer::new(
        srr,
        Compressor::Builtin,
        utf8(out.path()),
        utf8(scratch.path()),
        1,
    );
    acquirer.acquire("s1", &runs(&["SRR1"]), Platform::Ont).unwrap();
    acquirer
        .acquire("s1", &runs(&["SRR2"]), Platform::Illumina)
        .unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].1);
    assert!(calls[1].1);
    for (_, _, dir) in calls.iter() {
        assert_eq!(dir.parent(), Some(scratch.path()));
        let name = dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("s1_"), "{name}");
    }
    assert_ne!(calls[0].2, calls[1].2);
    assert!(entries(scratch.path()).is_empty());
}

#[test]
fn illumina_paired_runs_fill_both_channels() {
    let out = tempfile::tempdir().unwrap();
    let srr = MockSrr::default()
        .with_run("SRR1", &[("_1", "@a/1\n"), ("_2", "@a/2\n")])
        .with_run("SRR2", &[("_1", "@b/1\n"), ("_2", "@b/2\n")]);
    let acquirer = Acquirer::new(
        srr,
        Compressor::Builtin,
        utf8(out.path()),
        utf8(out.path()),
        1,
    );

    let acquired = acquirer
        .acquire("s2", &runs(&["SRR1", "SRR2"]), Platform::Illumina)
        .unwrap();
    let (r1, r2) = acquirer.illumina_targets("s2");
    assert_eq!(
        acquired.output,
        ReadOutput::Illumina {
            r1: r1.clone(),
            r2: Some(r2.clone())
        }
    );
    assert_eq!(gunzip(&r1), "@a/1\n@b/1\n");
    assert_eq!(gunzip(&r2), "@a/2\n@b/2\n");
    assert_eq!(
        entries(out.path()),
        vec!["s2.illumina.R1.fastq.gz", "s2.illumina.R2.fastq.gz"]
    );
}

#[test]
fn single_end_illumina_drops_stale_r2() {
    let out = tempfile::tempdir().unwrap();
    let srr = MockSrr::default().with_run("SRR3", &[("", "@c\n")]);
    let acquirer = Acquirer::new(
        srr,
        Compressor::Builtin,
        utf8(out.path()),
        utf8(out.path()),
        1,
    );
    let (r1, r2) = acquirer.illumina_targets("s3");
    fs::write(&r2, b"stale").unwrap();

    let acquired = acquirer
        .acquire("s3", &runs(&["SRR3"]), Platform::Illumina)
        .unwrap();
    assert_eq!(
        acquired.output,
        ReadOutput::Illumina {
            r1: r1.clone(),
            r2: None
        }
    );
    assert_eq!(gunzip(&r1), "@c\n");
    assert!(!r2.exists());
}

#[test]
fn failed_and_empty_runs_are_left_out() {
    let out = tempfile::tempdir().unwrap();
    let srr = MockSrr::default()
        .with_run("SRR1", &[("", READ_A)])
        .with_run("SRR2", &[("", "")]);
    let acquirer = Acquirer::new(
        srr,
        Compressor::Builtin,
        utf8(out.path()),
        utf8(out.path()),
        1,
    );

    let acquired = acquirer
        .acquire("s4", &runs(&["SRR9", "SRR2", "SRR1"]), Platform::Ont)
        .unwrap();
    assert_eq!(acquired.runs, runs(&["SRR1"]));
    assert_eq!(gunzip(&acquirer.ont_target("s4")), READ_A);
}

#[test]
fn no_reads_leaves_no_target() {
    let out = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let acquirer = Acquirer::new(
        MockSrr::default(),
        Compressor::Builtin,
        utf8(out.path()),
        utf8(scratch.path()),
        1,
    );

    let err = acquirer
        .acquire("s5", &runs(&["SRR404"]), Platform::Ont)
        .unwrap_err();
    assert_matches!(&err, AcquisitionFailure::NoReads { runs } if runs == "SRR404");
    assert_eq!(err.stage(), "download");
    assert!(entries(out.path()).is_empty());
    assert!(entries(scratch.path()).is_empty());
}

#[test]
fn compression_failure_keeps_previous_target() {
    let out = tempfile::tempdir().unwrap();
    let srr = MockSrr::default().with_run("SRR1", &[("", READ_A)]);
    let acquirer = Acquirer::new(
        srr,
        Compressor::Gzip(PathBuf::from("/nonexistent/bin/gzip")),
        utf8(out.path()),
        utf8(out.path()),
        1,
    );
    let target = acquirer.ont_target("s6");
    fs::write(&target, b"previous").unwrap();

    let err = acquirer
        .acquire("s6", &runs(&["SRR1"]), Platform::Ont)
        .unwrap_err();
    assert_matches!(err, AcquisitionFailure::Compress { .. });
    assert_eq!(fs::read(&target).unwrap(), b"previous");
    assert_eq!(entries(out.path()), vec!["s6.ont.fastq.gz"]);
}

#[test]
fn existing_output_requires_non_empty_targets() {
    let out = tempfile::tempdir().unwrap();
    let acquirer = Acquirer::new(
        MockSrr::default(),
        Compressor::Builtin,
        utf8(out.path()),
        utf8(out.path()),
        1,
    );
    assert_eq!(acquirer.existing_output("s7", Platform::Ont), None);

    fs::write(acquirer.ont_target("s7"), b"").unwrap();
    assert_eq!(acquirer.existing_output("s7", Platform::Ont), None);

    let (r1, r2) = acquirer.illumina_targets("s7");
    fs::write(&r1, b"reads").unwrap();
    fs::write(&r2, b"").unwrap();
    assert_eq!(
        acquirer.existing_output("s7", Platform::Illumina),
        Some(ReadOutput::Illumina { r1, r2: None })
    );
}

#[test]
fn unsafe_sample_ids_are_refused_before_extraction() {
    let out = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let srr = MockSrr::default().with_run("SRR1", &[("", READ_A)]);
    let calls = Arc::clone(&srr.calls);
    let acquirer = Acquirer::new(
        srr,
        Compressor::Builtin,
        utf8(&out.path().join("raw")),
        utf8(scratch.path()),
        1,
    );

    for id in ["../evil", "a/b", ".."] {
        let err = acquirer
            .acquire(id, &runs(&["SRR1"]), Platform::Ont)
            .unwrap_err();
        assert_matches!(&err, AcquisitionFailure::UnsafeSampleId(refused) if refused == id);
        assert_eq!(err.stage(), "scratch");
        assert_eq!(acquirer.existing_output(id, Platform::Ont), None);
    }
    assert!(calls.lock().unwrap().is_empty());
    assert!(entries(out.path()).is_empty());
    assert!(entries(scratch.path()).is_empty());
}
