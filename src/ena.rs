use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::domain::{LibraryLayout, Platform, RunAccession, RunDescriptor};
use crate::error::ReadprepError;

pub const ENA_FILEREPORT_URL: &str = "https://www.ebi.ac.uk/ena/portal/api/filereport";
pub const READ_RUN_FIELDS: [&str; 3] = ["run_accession", "instrument_platform", "library_layout"];
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub trait RunMetadataClient: Send + Sync {
    /// All read runs registered under `biosample`.
    fn query_runs(&self, biosample: &str) -> Result<Vec<RunDescriptor>, ReadprepError>;
}

#[derive(Clone)]
pub struct EnaHttpClient {
    client: Client,
    base_url: String,
}

impl EnaHttpClient {
    pub fn new() -> Result<Self, ReadprepError> {
        Self::with_settings(ENA_FILEREPORT_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_settings(base_url: &str, timeout: Duration) -> Result<Self, ReadprepError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("readprep/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ReadprepError::EnaHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| ReadprepError::EnaHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn query_params(biosample: &str) -> Vec<(&'static str, String)> {
        vec![
            ("accession", biosample.to_string()),
            ("result", "read_run".to_string()),
            ("fields", READ_RUN_FIELDS.join(",")),
            ("download", "true".to_string()),
        ]
    }
}

impl RunMetadataClient for EnaHttpClient {
    fn query_runs(&self, biosample: &str) -> Result<Vec<RunDescriptor>, ReadprepError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&Self::query_params(biosample))
            .send()
            .map_err(|err| ReadprepError::EnaHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .map(|body| body.chars().take(200).collect())
                .unwrap_or_else(|_| "ENA request failed".to_string());
            return Err(ReadprepError::EnaStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| ReadprepError::EnaHttp(err.to_string()))?;
        Ok(parse_filereport(&body))
    }
}

/// Parses a tab-delimited filereport body. Columns are matched by header
/// name; short rows read as empty trailing fields.
pub fn parse_filereport(body: &str) -> Vec<RunDescriptor> {
    let mut lines = body.lines().filter(|line| !line.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let header = header.split('\t').map(str::trim).collect::<Vec<_>>();

    lines
        .map(|line| {
            let parts = line.split('\t').collect::<Vec<_>>();
            let row = header
                .iter()
                .enumerate()
                .map(|(idx, name)| (*name, parts.get(idx).copied().unwrap_or("").trim()))
                .collect::<HashMap<_, _>>();
            let field = |name: &str| row.get(name).copied().unwrap_or("").to_string();
            RunDescriptor {
                accession: field("run_accession"),
                instrument_platform: field("instrument_platform"),
                library_layout: LibraryLayout::parse(&field("library_layout")),
            }
        })
        .collect()
}

/// Accessions of `runs` matching `platform`, deduplicated in first-seen
/// order. Invalid accessions are skipped.
pub fn select_runs(runs: &[RunDescriptor], platform: Platform, strict: bool) -> Vec<RunAccession> {
    let mut selected: Vec<RunAccession> = Vec::new();
    for run in runs.iter().filter(|run| run.matches(platform, strict)) {
        if run.accession.is_empty() {
            continue;
        }
        match run.accession.parse::<RunAccession>() {
            Ok(accession) if !selected.contains(&accession) => selected.push(accession),
            Ok(_) => {}
            Err(err) => warn!("skipping run: {err}"),
        }
    }
    selected
}

/// Run accessions for `biosample` on `platform`. Never fails: transport and
/// service errors are logged and yield no runs.
pub fn resolve<C: RunMetadataClient + ?Sized>(
    client: &C,
    biosample: &str,
    platform: Platform,
    strict: bool,
) -> Vec<RunAccession> {
    let biosample = biosample.trim();
    if biosample.is_empty() {
        return Vec::new();
    }
    let runs = match client.query_runs(biosample) {
        Ok(runs) => runs,
        Err(err) => {
            warn!("ENA query failed for {biosample}: {err}");
            return Vec::new();
        }
    };
    let selected = select_runs(&runs, platform, strict);
    let paired = runs
        .iter()
        .filter(|run| run.matches(platform, strict))
        .filter(|run| run.library_layout == LibraryLayout::Paired)
        .count();
    debug!(
        "{biosample}: {} of {} runs match {platform} ({paired} paired)",
        selected.len(),
        runs.len()
    );
    selected
}
