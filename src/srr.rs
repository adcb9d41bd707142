use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::debug;

use crate::compress::Compressor;
use crate::domain::RunAccession;
use crate::error::ReadprepError;

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub sra_toolkit: Option<String>,
    pub compressor: String,
}

/// Extracts the reads of a single run into a directory.
pub trait SrrClient: Send + Sync {
    /// Returns the FASTQ files produced for `run`, in `{run}.fastq`,
    /// `{run}_1.fastq`, `{run}_2.fastq` order.
    fn dump_run(
        &self,
        run: &RunAccession,
        split: bool,
        threads: usize,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ReadprepError>;
}

/// External programs located once at startup.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub fasterq_dump: PathBuf,
    pub compressor: Compressor,
}

impl Toolchain {
    /// Looks up `fasterq-dump` and the best gzip implementation on `PATH`.
    pub fn discover() -> Result<Self, ReadprepError> {
        let fasterq_dump = find_in_path("fasterq-dump")
            .ok_or_else(|| ReadprepError::MissingTool("fasterq-dump".to_string()))?;
        Ok(Self {
            fasterq_dump,
            compressor: discover_compressor(),
        })
    }

    pub fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            sra_toolkit: tool_version(&self.fasterq_dump, &["--version"]),
            compressor: self.compressor.name().to_string(),
        }
    }
}

pub fn discover_compressor() -> Compressor {
    if let Some(pigz) = find_in_path("pigz") {
        return Compressor::Pigz(pigz);
    }
    if let Some(gzip) = find_in_path("gzip") {
        return Compressor::Gzip(gzip);
    }
    Compressor::Builtin
}

#[derive(Clone)]
pub struct SystemSrrClient {
    fasterq_dump: PathBuf,
}

impl SystemSrrClient {
    pub fn new(toolchain: &Toolchain) -> Self {
        Self {
            fasterq_dump: toolchain.fasterq_dump.clone(),
        }
    }

    fn run_cmd(&self, program: &Path, args: &[String]) -> Result<(), ReadprepError> {
        debug!("[cmd] {} {}", program.display(), args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| ReadprepError::SrrConversion(err.to_string()))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {}", program.display())
        } else {
            stderr
        };
        Err(ReadprepError::SrrConversion(message))
    }
}

impl SrrClient for SystemSrrClient {
    fn dump_run(
        &self,
        run: &RunAccession,
        split: bool,
        threads: usize,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ReadprepError> {
        fs::create_dir_all(out_dir).map_err(|err| ReadprepError::Filesystem(err.to_string()))?;
        let dir = out_dir.to_string_lossy().to_string();
        let mut args = vec![
            run.as_str().to_string(),
            "--outdir".to_string(),
            dir.clone(),
            "--threads".to_string(),
            threads.max(1).to_string(),
            "--temp".to_string(),
            dir,
        ];
        if split {
            args.push("--split-files".to_string());
        }
        self.run_cmd(&self.fasterq_dump, &args)?;
        Ok(expected_outputs(run, out_dir))
    }
}

/// Output files `fasterq-dump` may have written for `run` that exist.
pub fn expected_outputs(run: &RunAccession, out_dir: &Path) -> Vec<PathBuf> {
    ["", "_1", "_2"]
        .iter()
        .map(|suffix| out_dir.join(format!("{run}{suffix}.fastq")))
        .filter(|path| path.is_file())
        .collect()
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.is_file() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}

fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        None
    } else {
        Some(stdout)
    }
}
