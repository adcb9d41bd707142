use std::path::Path;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use readprep::acquire::Acquirer;
use readprep::app::{App, ProgressSink, ResolutionState, ResolveOptions, ResolveResult};
use readprep::config::{ConfigLoader, ConfigOverrides, PlatformFilter};
use readprep::domain::{Platform, SamplePlatform};
use readprep::ena::EnaHttpClient;
use readprep::error::ReadprepError;
use readprep::manifest;
use readprep::output::{JsonOutput, LogSink, ManifestSummary, ResolveSummary};
use readprep::srr::{SystemSrrClient, Toolchain};
use readprep::table;

#[derive(Parser)]
#[command(name = "readprep")]
#[command(about = "Normalize run manifests and resolve per-sample sequencing reads")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Normalize raw manifests into a canonical sample table")]
    Manifest(ManifestArgs),
    #[command(about = "Resolve read files for every sample of a table")]
    Resolve(ResolveArgs),
}

#[derive(Args)]
struct ManifestArgs {
    #[arg(long)]
    manifests_glob: String,

    #[arg(long)]
    out: String,

    #[arg(long)]
    default_platform: Option<Platform>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ResolveArgs {
    #[arg(long)]
    samples: String,

    #[arg(long)]
    out: String,

    #[arg(long)]
    outdir: Option<String>,

    #[arg(long)]
    scratch_dir: Option<String>,

    #[arg(long)]
    threads: Option<usize>,

    #[arg(long)]
    jobs: Option<usize>,

    #[arg(long)]
    force: bool,

    #[arg(long)]
    no_skip_existing: bool,

    #[arg(long)]
    platform_filter: Option<PlatformFilter>,

    #[arg(long)]
    default_platform: Option<Platform>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ReadprepError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ReadprepError) -> u8 {
    match error {
        ReadprepError::NoManifests(_)
        | ReadprepError::InvalidGlob { .. }
        | ReadprepError::ManifestMissingColumn { .. }
        | ReadprepError::ManifestRead { .. }
        | ReadprepError::EmptyManifests(_)
        | ReadprepError::TableMissingColumn { .. }
        | ReadprepError::SampleTable { .. }
        | ReadprepError::InvalidPlatform(_)
        | ReadprepError::InvalidRunAccession(_) => 2,
        ReadprepError::MissingTool(_)
        | ReadprepError::EnaHttp(_)
        | ReadprepError::EnaStatus { .. }
        | ReadprepError::SrrConversion(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Manifest(args) => run_manifest(args),
        Commands::Resolve(args) => run_resolve(args),
    }
}

fn run_manifest(args: ManifestArgs) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve(
        args.config.as_deref(),
        ConfigOverrides {
            default_platform: args.default_platform,
            ..ConfigOverrides::default()
        },
    )?;

    let records = manifest::normalize_manifests(&args.manifests_glob, resolved.default_platform)?;
    let out = Utf8PathBuf::from(args.out);
    table::write_table(&out, &records)?;
    info!("wrote {} samples to {out}", records.len());

    if args.json {
        JsonOutput::print_manifest(&ManifestSummary::new(out.as_str(), records.len()))
            .into_diagnostic()?;
    } else {
        println!("\x1b[36m📦 readprep manifest\x1b[0m");
        println!("\x1b[32m✅ {} samples -> {out}\x1b[0m", records.len());
    }
    Ok(())
}

fn run_resolve(args: ResolveArgs) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve(
        args.config.as_deref(),
        ConfigOverrides {
            outdir: args.outdir,
            scratch_dir: args.scratch_dir,
            threads: args.threads,
            jobs: args.jobs,
            platform_filter: args.platform_filter,
            default_platform: args.default_platform,
            skip_existing: args.no_skip_existing.then_some(false),
        },
    )?;

    let records = table::read_table(Path::new(&args.samples), resolved.default_platform)?;
    let toolchain = Toolchain::discover()?;
    let tools = toolchain.tool_info();
    info!(
        "fasterq-dump {}, compressor {}",
        tools.sra_toolkit.as_deref().unwrap_or("unknown version"),
        tools.compressor
    );

    let metadata = EnaHttpClient::with_settings(&resolved.ena_base_url, resolved.ena_timeout)?;
    let acquirer = Acquirer::new(
        SystemSrrClient::new(&toolchain),
        toolchain.compressor.clone(),
        resolved.outdir.clone(),
        resolved.scratch_dir.clone(),
        resolved.threads,
    );
    let app = App::new(metadata, acquirer);
    let options = ResolveOptions {
        force: args.force,
        skip_existing: resolved.skip_existing,
        strict_platform: resolved.platform_filter == PlatformFilter::Strict,
        jobs: resolved.jobs,
    };

    let sink: &dyn ProgressSink = if args.json { &JsonOutput } else { &LogSink };
    let result = app.resolve(records, &options, sink)?;
    let out = Utf8PathBuf::from(args.out);
    table::write_table(&out, &result.records)?;

    if args.json {
        let summary = ResolveSummary::new(&result, out.as_str(), Some(tools));
        JsonOutput::print_resolve(&summary).into_diagnostic()?;
    } else {
        print_resolve_summary(&result, out.as_str());
    }
    Ok(())
}

fn print_resolve_summary(result: &ResolveResult, table: &str) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    let unresolved = result
        .outcomes
        .iter()
        .filter(|outcome| outcome.platform == SamplePlatform::None)
        .count();
    println!("{cyan}📦 readprep summary -> {table}{reset}");
    println!(
        "{green}✅ Resolved samples: {}{reset}",
        result.outcomes.len() - unresolved
    );
    println!("{yellow}⚠️ Unresolved samples: {unresolved}{reset}");

    for outcome in &result.outcomes {
        let fetched = outcome
            .directions
            .iter()
            .any(|direction| direction.state == ResolutionState::Fetched);
        let (icon, color) = if outcome.platform == SamplePlatform::None {
            ("✖", red)
        } else if fetched {
            ("⬇️", cyan)
        } else {
            ("♻️", green)
        };
        println!(
            "{color}{icon} {} {} -> {}{reset}",
            outcome.sample_id, outcome.declared, outcome.platform
        );
        if !outcome.note.is_empty() {
            println!("{color}   📝 {}{reset}", outcome.note);
        }
    }
}
