//! Gleaner CLI.
//!
//! Runs extraction jobs described by job files: one target URL, one selector
//! plan, and the output sinks to write.
//!
//! Usage examples:
//!   Live run against a headless browser:
//!     $ cargo run --bin gleaner -- run --job plans/book_listing.json
//!   Offline run against a saved page:
//!     $ cargo run --bin gleaner -- run --job plans/book_listing.json --snapshot page.html
//!   Validate a job file without launching anything:
//!     $ cargo run --bin gleaner -- check --job plans/owasp_top_ten.json

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use gleaner::config::{GleanerConfig, GleanerConfigOverrides, Verbosity};
use gleaner::logging::{LogCallback, LogLevel, LogRecord};
use gleaner::plan::JobSpec;
use gleaner::runner::{Gleaner, RunReport};
use gleaner::session::SnapshotSession;

#[derive(Parser)]
#[command(
    name = "gleaner",
    author,
    version,
    about = "Plan-driven structured extraction from web pages"
)]
struct Cli {
    /// Increase log verbosity (pass multiple times for DEBUG).
    #[arg(long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a job: navigate, extract, and write the configured sinks.
    Run(RunArgs),
    /// Compile a job file and report plan problems without running it.
    Check(CheckArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path to the job file (URL, plan, sinks).
    #[arg(long)]
    job: PathBuf,

    /// Override the job's target URL.
    #[arg(long)]
    url: Option<String>,

    /// Run the plan against a saved HTML snapshot instead of a live browser.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Show the browser window instead of running headless.
    #[arg(long)]
    show_browser: bool,

    /// Path to the Chrome/Chromium executable.
    #[arg(long)]
    chrome_bin: Option<PathBuf>,
}

#[derive(Args)]
struct CheckArgs {
    /// Path to the job file to validate.
    #[arg(long)]
    job: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_env_logger();

    let cli = Cli::parse();
    let verbosity = verbosity_from_count(cli.verbose);

    let outcome = match cli.command {
        Command::Run(args) => run_job(args, verbosity).await,
        Command::Check(args) => check_job(args),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_job(args: RunArgs, verbosity: Verbosity) -> Result<ExitCode> {
    let mut job = JobSpec::from_path(&args.job)
        .with_context(|| format!("failed to load job file {}", args.job.display()))?;
    if let Some(ref url) = args.url {
        job.url = url.clone();
    }

    let config = build_config(&args, verbosity)?;
    let gleaner = Gleaner::new(config);

    let result = match &args.snapshot {
        Some(path) => {
            let session = SnapshotSession::from_path(path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?;
            gleaner.run_with(session, &job).await
        }
        None => gleaner.run(&job).await,
    };

    match result {
        Ok(report) => {
            summarize(&job, &report);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            // One diagnostic line naming the failure kind and message; the
            // nonzero status is what calling automation keys off.
            log::error!("extraction run failed ({}): {err}", stage_of(&err));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn check_job(args: CheckArgs) -> Result<ExitCode> {
    let job = JobSpec::from_path(&args.job)
        .with_context(|| format!("failed to load job file {}", args.job.display()))?;
    match job.compile() {
        Ok(plan) => {
            info!(
                "job ok: {} field(s) [{}], {} sink(s), target {}",
                plan.fields.len(),
                plan.field_names().join(", "),
                job.sinks.len(),
                job.url
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            log::error!("job file {} is invalid: {err}", args.job.display());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn build_config(args: &RunArgs, verbosity: Verbosity) -> Result<GleanerConfig> {
    let base = GleanerConfig::from_env().context("invalid GLEANER_* environment settings")?;

    let mut overrides = GleanerConfigOverrides::default().verbose(verbosity);
    overrides.logger = Some(Some(make_logger_callback()));
    if args.show_browser {
        overrides = overrides.headless(false);
    }
    if let Some(path) = &args.chrome_bin {
        overrides = overrides.chrome_executable(Some(path.clone()));
    }

    Ok(base.with_overrides(overrides))
}

fn make_logger_callback() -> LogCallback {
    std::sync::Arc::new(|record: &LogRecord| {
        let line = match &record.category {
            Some(category) => format!("[{category}] {}", record.message),
            None => record.message.clone(),
        };
        match record.level {
            LogLevel::Error => log::error!("{line}"),
            LogLevel::Info => log::info!("{line}"),
            LogLevel::Debug => log::debug!("{line}"),
        }
    })
}

fn summarize(job: &JobSpec, report: &RunReport) {
    info!(
        "run complete: {} record(s) in {} ms (navigate {} ms, extract {} ms)",
        report.records.len(),
        report.metrics.navigate_ms + report.metrics.extract_ms,
        report.metrics.navigate_ms,
        report.metrics.extract_ms
    );
    if report.records.is_empty() {
        warn!("no records extracted from {}", job.url);
    }
    if report.metrics.items_skipped > 0 {
        info!(
            "{} item(s) skipped for missing required fields",
            report.metrics.items_skipped
        );
    }
}

fn stage_of(err: &gleaner::runner::RunError) -> &'static str {
    use gleaner::runner::RunError;
    match err {
        RunError::Plan(_) => "plan",
        RunError::Session(_) => "session",
        RunError::Normalize(_) => "normalize",
        RunError::Serialize(_) => "serialize",
    }
}

fn verbosity_from_count(count: u8) -> Verbosity {
    match count {
        0 => Verbosity::Medium,
        _ => Verbosity::Detailed,
    }
}

fn init_env_logger() {
    if env::var("RUST_LOG").is_err() {
        unsafe {
            env::set_var("RUST_LOG", "info");
        }
    }

    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp_secs()
        .try_init();
}
