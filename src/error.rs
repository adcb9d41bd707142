use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReadprepError {
    #[error("invalid run accession: {0}")]
    InvalidRunAccession(String),

    #[error("invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("no manifest files matched: {0}")]
    NoManifests(String),

    #[error("invalid manifest glob {pattern}: {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("{path} missing required column {column}; found: {found}")]
    #[diagnostic(help("manifests need at least a sample_id column"))]
    ManifestMissingColumn {
        path: PathBuf,
        column: String,
        found: String,
    },

    #[error("failed to read manifest {path}: {message}")]
    ManifestRead { path: PathBuf, message: String },

    #[error("no valid sample rows (sample_id missing) in manifests matching {0}")]
    EmptyManifests(String),

    #[error("sample table {path} missing required column {column}")]
    TableMissingColumn { path: PathBuf, column: String },

    #[error("failed to read sample table {path}: {message}")]
    SampleTable { path: PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("required tool not found: {0}")]
    #[diagnostic(help("install SRA Toolkit and make sure fasterq-dump is on PATH"))]
    MissingTool(String),

    #[error("ENA request failed: {0}")]
    EnaHttp(String),

    #[error("ENA returned status {status}: {message}")]
    EnaStatus { status: u16, message: String },

    #[error("sra conversion failed: {0}")]
    SrrConversion(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}
