//! Command definitions for the clinidoc CLI.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use clinidoc::prelude::*;
use clinidoc::utils::{dir_timestamp, now_utc, sanitize_file_stem};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default root directory for batch runs.
const DEFAULT_BATCH_ROOT: &str = "batch_output";

/// Requesting this kind expands to every registered kind.
const ALL_KINDS: &str = "all";

/// Exit code after a forced interrupt (128 + SIGINT).
const EXIT_INTERRUPTED: i32 = 130;

/// What a Ctrl-C during a batch does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Stop scheduling inputs; the current one finishes.
    Cancel,
    /// Exit immediately.
    Abort,
}

fn interrupt_action(received: usize) -> Interrupt {
    if received <= 1 {
        Interrupt::Cancel
    } else {
        Interrupt::Abort
    }
}

/// Clinical-trial document pipeline.
#[derive(Parser, Debug)]
#[command(name = "clinidoc")]
#[command(about = "Generate clinical-trial documents from a study protocol")]
#[command(version)]
#[command(
    long_about = "clinidoc extracts study fields from a protocol once and generates the requested documents from them.\n\nExample usage:\n  clinidoc run --input protocol.txt --generate crf dvp\n  clinidoc batch a.txt b.txt --output-root ./batch_output"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a single protocol document.
    Run(RunArgs),

    /// Process several protocol documents, one output directory each.
    Batch(BatchArgs),
}

/// Options shared by `run` and `batch`.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Document kinds to generate, or `all`.
    #[arg(short, long, num_args = 1.., default_value = ALL_KINDS)]
    pub generate: Vec<String>,

    /// JSON configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only read the first N pages of each input.
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Per-stage timeout in seconds.
    #[arg(long)]
    pub stage_timeout: Option<f64>,

    /// Run generation stages one after another.
    #[arg(long)]
    pub sequential: bool,

    /// Print the structured report as JSON instead of the narrative.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `clinidoc run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Protocol document to process.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory. Defaults to `output_<stem>_<timestamp>`.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Arguments for `clinidoc batch`.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Protocol documents to process, in order.
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Root directory holding one output directory per input.
    #[arg(long, default_value = DEFAULT_BATCH_ROOT)]
    pub output_root: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Runs the parsed command and returns the process exit code.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Run(args) => run_single_command(args).await,
        Commands::Batch(args) => run_batch_command(args).await,
    }
}

async fn run_single_command(args: RunArgs) -> anyhow::Result<i32> {
    let pipeline = build_pipeline(&args.pipeline)?;
    let kinds = requested_kinds(&pipeline, &args.pipeline.generate);
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| default_output_dir(&args.input));

    info!(input = %args.input.display(), output = %output_dir.display(), "Starting run");
    let report = pipeline
        .run_single(&args.input, &output_dir, &kinds)
        .await
        .context("run rejected")?;

    if args.pipeline.json {
        println!("{}", serde_json::to_string_pretty(&report.to_structured())?);
    } else {
        println!("{}", report.to_narrative());
    }
    Ok(Pipeline::exit_code_for_run(&report))
}

async fn run_batch_command(args: BatchArgs) -> anyhow::Result<i32> {
    let pipeline = build_pipeline(&args.pipeline)?;
    let kinds = requested_kinds(&pipeline, &args.pipeline.generate);

    let cancel = Arc::new(CancellationToken::new());
    let signal = cancel.clone();
    tokio::spawn(async move {
        let mut received = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            received += 1;
            match interrupt_action(received) {
                Interrupt::Cancel => {
                    warn!("Interrupt received, finishing the current input (press Ctrl-C again to abort)");
                    signal.cancel("interrupted by user");
                }
                Interrupt::Abort => {
                    error!("Second interrupt received, aborting");
                    std::process::exit(EXIT_INTERRUPTED);
                }
            }
        }
    });

    let report = pipeline
        .run_batch_with_cancel(&args.inputs, &args.output_root, &kinds, &cancel)
        .await
        .context("batch rejected")?;

    if args.pipeline.json {
        println!("{}", serde_json::to_string_pretty(&report.to_structured())?);
    } else {
        println!("{}", report.to_narrative());
    }
    Ok(Pipeline::exit_code_for_batch(&report))
}

fn build_pipeline(args: &PipelineArgs) -> anyhow::Result<Pipeline> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(pages) = args.max_pages {
        config = config.with_max_pages(pages);
    }
    if let Some(seconds) = args.stage_timeout {
        let timeout = Duration::try_from_secs_f64(seconds)
            .ok()
            .filter(|d| !d.is_zero())
            .with_context(|| format!("--stage-timeout must be a positive number of seconds, got {seconds}"))?;
        config = config.with_stage_timeout(timeout);
    }
    if args.sequential {
        config = config.sequential();
    }
    Ok(Pipeline::standard(config)?)
}

/// Expands `all` to every registered kind; otherwise passes names through.
fn requested_kinds(pipeline: &Pipeline, generate: &[String]) -> Vec<String> {
    if generate.iter().any(|k| k.eq_ignore_ascii_case(ALL_KINDS)) {
        pipeline.known_kinds()
    } else {
        generate.to_vec()
    }
}

fn default_output_dir(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    PathBuf::from(format!(
        "output_{}_{}",
        sanitize_file_stem(&stem, "input"),
        dir_timestamp(&now_utc())
    ))
}
