use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use readprep::config::{Config, ConfigLoader, ConfigOverrides, PlatformFilter};
use readprep::domain::Platform;
use readprep::error::ReadprepError;

#[test]
fn parse_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("readprep.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "outdir": "reads",
            "threads": 8,
            "jobs": 3,
            "platform_filter": "loose",
            "default_platform": "illumina",
            "skip_existing": false,
            "ena": { "base_url": "http://localhost:9/filereport", "timeout_secs": 5 }
        }"#,
    )
    .unwrap();

    let resolved =
        ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap();
    assert_eq!(resolved.outdir, Utf8PathBuf::from("reads"));
    assert_eq!(resolved.scratch_dir, Utf8PathBuf::from("reads"));
    assert_eq!(resolved.threads, 8);
    assert_eq!(resolved.jobs, 3);
    assert_eq!(resolved.platform_filter, PlatformFilter::Loose);
    assert_eq!(resolved.default_platform, Platform::Illumina);
    assert!(!resolved.skip_existing);
    assert_eq!(resolved.ena_base_url, "http://localhost:9/filereport");
    assert_eq!(resolved.ena_timeout, Duration::from_secs(5));
}

#[test]
fn overrides_take_precedence() {
    let config: Config = serde_json::from_str(r#"{ "outdir": "reads", "threads": 2 }"#).unwrap();
    let overrides = ConfigOverrides {
        outdir: Some("elsewhere".to_string()),
        scratch_dir: Some("/scratch".to_string()),
        jobs: Some(4),
        skip_existing: Some(false),
        ..ConfigOverrides::default()
    };

    let resolved = ConfigLoader::resolve_config(config, overrides).unwrap();
    assert_eq!(resolved.outdir, Utf8PathBuf::from("elsewhere"));
    assert_eq!(resolved.scratch_dir, Utf8PathBuf::from("/scratch"));
    assert_eq!(resolved.threads, 2);
    assert_eq!(resolved.jobs, 4);
    assert!(!resolved.skip_existing);
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()),
        Err(ReadprepError::ConfigRead(missing)) if missing == path
    );
}

#[test]
fn malformed_json_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("readprep.json");
    fs::write(&path, "{ \"threads\": ").unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()),
        Err(ReadprepError::ConfigParse(_))
    );
}

#[test]
fn rejects_invalid_values() {
    let zero_jobs = ConfigOverrides {
        jobs: Some(0),
        ..ConfigOverrides::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(Config::default(), zero_jobs),
        Err(ReadprepError::InvalidConfig(_))
    );

    let config: Config = serde_json::from_str(r#"{ "threads": 0 }"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve_config(config, ConfigOverrides::default()),
        Err(ReadprepError::InvalidConfig(_))
    );

    let config: Config = serde_json::from_str(r#"{ "schema_version": 7 }"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve_config(config, ConfigOverrides::default()),
        Err(ReadprepError::InvalidConfig(message)) if message.contains("schema_version 7")
    );
}
