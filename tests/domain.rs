use std::str::FromStr;

use assert_matches::assert_matches;

use readprep::domain::{Platform, RunAccession, SamplePlatform, join_run_list, parse_run_list};
use readprep::error::ReadprepError;

#[test]
fn classify_platform_synonyms() {
    for raw in ["ont", "ONT", " Oxford_Nanopore ", "oxford-nanopore", "nanopore"] {
        assert_eq!(Platform::classify(raw, Platform::Illumina), Platform::Ont, "{raw}");
    }
    for raw in ["illumina", "Illumina", "hiseq", "MiSeq", "nextseq", "novaseq"] {
        assert_eq!(Platform::classify(raw, Platform::Ont), Platform::Illumina, "{raw}");
    }
}

#[test]
fn classify_falls_back_to_default() {
    assert_eq!(Platform::classify("", Platform::Ont), Platform::Ont);
    assert_eq!(Platform::classify("pacbio", Platform::Illumina), Platform::Illumina);
    assert_eq!(Platform::classify("none", Platform::Ont), Platform::Ont);
}

#[test]
fn strict_parse_rejects_unknown_platform() {
    assert_eq!(Platform::from_str("MinION-nanopore").ok(), None);
    assert_eq!(Platform::from_str("novaseq").unwrap(), Platform::Illumina);
    assert_matches!(
        Platform::from_str("pacbio"),
        Err(ReadprepError::InvalidPlatform(value)) if value == "pacbio"
    );
}

#[test]
fn declared_platform_accepts_hybrid() {
    assert_eq!(SamplePlatform::declared("Hybrid", Platform::Ont), SamplePlatform::Hybrid);
    assert_eq!(SamplePlatform::declared("none", Platform::Illumina), SamplePlatform::Illumina);
    assert_eq!(
        SamplePlatform::Hybrid.directions(),
        &[Platform::Ont, Platform::Illumina]
    );
    assert!(SamplePlatform::None.directions().is_empty());
}

#[test]
fn verified_platform_labels() {
    assert_eq!(SamplePlatform::from_verified(true, true), SamplePlatform::Hybrid);
    assert_eq!(SamplePlatform::from_verified(true, false), SamplePlatform::Ont);
    assert_eq!(SamplePlatform::from_verified(false, true), SamplePlatform::Illumina);
    assert_eq!(SamplePlatform::from_verified(false, false), SamplePlatform::None);
}

#[test]
fn run_accessions_are_normalized() {
    let run = RunAccession::from_str(" srr0123 ").unwrap();
    assert_eq!(run.as_str(), "SRR0123");
    assert!(RunAccession::from_str("ERR42").is_ok());
    assert_matches!(
        RunAccession::from_str("SRR12a"),
        Err(ReadprepError::InvalidRunAccession(_))
    );
    assert!(RunAccession::from_str("ÄÄ1").is_err());
}

#[test]
fn run_list_splits_dedups_and_reports_invalid() {
    let (runs, invalid) = parse_run_list("SRR1, err2;SRR1  DRR3 bogus");
    assert_eq!(join_run_list(&runs), "SRR1,ERR2,DRR3");
    assert_eq!(invalid, vec!["bogus".to_string()]);

    let (runs, invalid) = parse_run_list("   ");
    assert!(runs.is_empty());
    assert!(invalid.is_empty());
}
