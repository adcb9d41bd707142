use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::Platform;
use crate::ena::ENA_FILEREPORT_URL;
use crate::error::ReadprepError;

pub const DEFAULT_CONFIG_FILE: &str = "readprep.json";
const SUPPORTED_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFilter {
    Strict,
    Loose,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub outdir: Option<String>,
    #[serde(default)]
    pub scratch_dir: Option<String>,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub platform_filter: Option<PlatformFilter>,
    #[serde(default)]
    pub default_platform: Option<Platform>,
    #[serde(default)]
    pub skip_existing: Option<bool>,
    #[serde(default)]
    pub ena: Option<EnaConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EnaConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub outdir: Utf8PathBuf,
    pub scratch_dir: Utf8PathBuf,
    pub threads: usize,
    pub jobs: usize,
    pub platform_filter: PlatformFilter,
    pub default_platform: Platform,
    pub skip_existing: bool,
    pub ena_base_url: String,
    pub ena_timeout: Duration,
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub outdir: Option<String>,
    pub scratch_dir: Option<String>,
    pub threads: Option<usize>,
    pub jobs: Option<usize>,
    pub platform_filter: Option<PlatformFilter>,
    pub default_platform: Option<Platform>,
    pub skip_existing: Option<bool>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `readprep.json` from the working directory when it
    /// exists, and applies `overrides`. Without any file the defaults apply.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, ReadprepError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| ReadprepError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| ReadprepError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, ReadprepError> {
        let schema_version = config.schema_version.unwrap_or(SUPPORTED_SCHEMA_VERSION);
        if schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(ReadprepError::InvalidConfig(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let outdir = Utf8PathBuf::from(
            overrides
                .outdir
                .or(config.outdir)
                .unwrap_or_else(|| "data/raw".to_string()),
        );
        let scratch_dir = overrides
            .scratch_dir
            .or(config.scratch_dir)
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|| outdir.clone());

        let threads = overrides.threads.or(config.threads).unwrap_or(4);
        if threads == 0 {
            return Err(ReadprepError::InvalidConfig("threads must be at least 1".to_string()));
        }
        let jobs = overrides.jobs.or(config.jobs).unwrap_or(1);
        if jobs == 0 {
            return Err(ReadprepError::InvalidConfig("jobs must be at least 1".to_string()));
        }

        let ena = config.ena.unwrap_or_default();
        let timeout_secs = ena.timeout_secs.unwrap_or(30);
        if timeout_secs == 0 {
            return Err(ReadprepError::InvalidConfig(
                "ena.timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version,
            outdir,
            scratch_dir,
            threads,
            jobs,
            platform_filter: overrides
                .platform_filter
                .or(config.platform_filter)
                .unwrap_or(PlatformFilter::Strict),
            default_platform: overrides
                .default_platform
                .or(config.default_platform)
                .unwrap_or(Platform::Ont),
            skip_existing: overrides
                .skip_existing
                .or(config.skip_existing)
                .unwrap_or(true),
            ena_base_url: ena
                .base_url
                .unwrap_or_else(|| ENA_FILEREPORT_URL.to_string()),
            ena_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
