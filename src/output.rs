use std::io::{self, Write};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::app::{ProgressEvent, ProgressSink, ResolveResult, SampleOutcome};
use crate::domain::SamplePlatform;
use crate::schema::SCHEMA_VERSION;
use crate::srr::ToolInfo;

#[derive(Debug, Clone, Serialize)]
pub struct ResolveSummary {
    pub generated_at: String,
    pub schema_version: u32,
    pub table: String,
    pub total: usize,
    pub ont: usize,
    pub illumina: usize,
    pub hybrid: usize,
    pub none: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolInfo>,
    pub samples: Vec<SampleOutcome>,
}

impl ResolveSummary {
    pub fn new(result: &ResolveResult, table: &str, tools: Option<ToolInfo>) -> Self {
        let count = |platform: SamplePlatform| {
            result
                .outcomes
                .iter()
                .filter(|outcome| outcome.platform == platform)
                .count()
        };
        Self {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            schema_version: SCHEMA_VERSION,
            table: table.to_string(),
            total: result.outcomes.len(),
            ont: count(SamplePlatform::Ont),
            illumina: count(SamplePlatform::Illumina),
            hybrid: count(SamplePlatform::Hybrid),
            none: count(SamplePlatform::None),
            tools,
            samples: result.outcomes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestSummary {
    pub generated_at: String,
    pub table: String,
    pub samples: usize,
}

impl ManifestSummary {
    pub fn new(table: &str, samples: usize) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            table: table.to_string(),
            samples,
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_resolve(summary: &ResolveSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_manifest(summary: &ManifestSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress events to the tracing subscriber.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!("{} ({} ms)", event.message, elapsed.as_millis()),
            None => info!("{}", event.message),
        }
    }
}
