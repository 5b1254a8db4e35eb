//! Command line surface
//!
//! Parses arguments, merges them with the settings file, prints the run
//! configuration, drives the benchmark on a blocking task while a progress
//! bar follows along, then prints and optionally saves the result.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use chrono::Local;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::SmallRng, SeedableRng};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use crate::bench::{BenchmarkOrchestrator, BenchmarkPlan, Phase, ProgressUpdate, TrialCount};
use crate::config::persistence::save_result_json;
use crate::config::{
    calculate_parameters, validate_row_len_override, HarnessSettings, PirType, TestConfig,
};
use crate::gateway::{LoopbackClient, LoopbackDriver};
use crate::models::BenchmarkResult;
use crate::util::units::{format_bytes, parse_size};
use crate::{BenchError, Result, MAX_IN_MEMORY_SIZE, MAX_NUM_QUERIES};

/// Extra usage text printed after argument errors
pub const USAGE_EXAMPLES: &str = "Usage: benchmark <size> [options]
Example: benchmark 1GB --queries 100

Size formats: 1GB, 500MB, 100MB, 10KB, or raw bytes
Run `benchmark --help` for all options.";

/// Benchmark the offline and online phases of a PIR client/server pair
#[derive(Parser, Debug, Clone)]
#[command(name = "benchmark", version, about, long_about = None)]
pub struct Args {
    /// Target database size (1GB, 500MB, 100KB, or raw bytes)
    pub size: String,

    /// Override automatic row length selection (0 = automatic)
    #[arg(long = "rowLen", default_value_t = 0)]
    pub row_len: usize,

    /// Number of online queries to benchmark
    #[arg(long)]
    pub queries: Option<usize>,

    /// Run even if the database exceeds the recommended in-memory size
    #[arg(long)]
    pub force: bool,

    /// PIR type to use (TreePIR, NonPrivate, Matrix, Punc, DPF)
    #[arg(long = "pirType")]
    pub pir_type: Option<String>,

    /// Save results to a JSON file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Benchmark the updatable client (reads by key)
    #[arg(long)]
    pub updatable: bool,

    /// Seed for query index selection and the loopback database
    #[arg(long)]
    pub seed: Option<u64>,

    /// Target wall time of one adaptive offline batch (e.g. 500ms, 2s)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub benchtime: Option<Duration>,

    /// Run exactly this many offline trials instead of adapting
    #[arg(long = "offlineTrials")]
    pub offline_trials: Option<u64>,

    /// Abort the run if it takes longer than this (e.g. 10m)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Settings file (default: <config dir>/pirbench/pirbench.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print debug logs to stderr
    #[arg(long, short)]
    pub verbose: bool,
}

/// Everything a run needs, after merging flags with settings
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Size the user asked for
    pub target_size: u64,
    pub num_rows: usize,
    pub row_len: usize,
    pub num_queries: usize,
    pub pir_type: PirType,
    pub updatable: bool,
    pub measure_bandwidth: bool,
    pub seed: u64,
    pub trials: TrialCount,
    pub timeout: Option<Duration>,
    pub output: Option<PathBuf>,
}

impl RunSettings {
    /// Database size actually benchmarked
    pub fn actual_size(&self) -> u64 {
        self.num_rows as u64 * self.row_len as u64
    }

    pub fn exceeds_memory_limit(&self) -> bool {
        self.actual_size() > MAX_IN_MEMORY_SIZE
    }

    pub fn plan(&self) -> BenchmarkPlan {
        let test_config = TestConfig::new(self.num_rows, self.row_len)
            .with_updatable(self.updatable)
            .with_measure_bandwidth(self.measure_bandwidth);
        BenchmarkPlan::new(test_config, self.pir_type, self.num_queries)
    }
}

impl Args {
    /// Validate the flags and merge them over `settings`
    pub fn resolve(&self, settings: &HarnessSettings) -> Result<RunSettings> {
        let target_size = parse_size(&self.size)
            .map_err(|e| e.context(&format!("size '{}'", self.size)))?;

        let pir_type = match &self.pir_type {
            Some(name) => name.parse()?,
            None => settings.pir_type()?,
        };

        let num_queries = self.queries.unwrap_or(settings.queries);
        if num_queries == 0 {
            return Err(BenchError::InputError(
                "--queries must be at least 1".to_string(),
            ));
        }
        if num_queries > MAX_NUM_QUERIES {
            return Err(BenchError::InputError(format!(
                "--queries must be at most {} (got {})",
                MAX_NUM_QUERIES, num_queries
            )));
        }

        validate_row_len_override(target_size, self.row_len)?;
        let (num_rows, row_len) = calculate_parameters(target_size, self.row_len);

        let trials = match self.offline_trials {
            Some(0) => {
                return Err(BenchError::InputError(
                    "--offlineTrials must be at least 1".to_string(),
                ))
            }
            Some(n) => TrialCount::Fixed(n),
            None => TrialCount::Adaptive {
                target: match self.benchtime {
                    Some(target) => target,
                    None => settings.offline_benchtime()?,
                },
                max_trials: settings.max_offline_trials,
            },
        };

        let timeout = match self.timeout {
            Some(limit) => Some(limit),
            None => settings.timeout()?,
        };

        let run = RunSettings {
            target_size,
            num_rows,
            row_len,
            num_queries,
            pir_type,
            updatable: self.updatable,
            measure_bandwidth: settings.measure_bandwidth,
            seed: self.seed.or(settings.seed).unwrap_or_else(rand::random),
            trials,
            timeout,
            output: self.output.clone(),
        };

        if run.exceeds_memory_limit() && !self.force {
            return Err(BenchError::InputError(format!(
                "Database size too large for in-memory benchmark ({}). Maximum recommended size is 8GB.\n\
                 For larger databases, you can:\n\
                 \x20 - Use --force to bypass this check (may cause out-of-memory errors)\n\
                 \x20 - Benchmark smaller databases (1GB, 2GB, 4GB)\n\
                 \x20 - Use a smaller row length with --rowLen (the total size stays the same)",
                format_bytes(run.actual_size())
            )));
        }

        Ok(run)
    }
}

/// Install the stderr log subscriber; `RUST_LOG` wins unless `verbose`
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Full command: settings, banner, benchmark, report, optional JSON output
pub async fn run(args: Args) -> Result<()> {
    let settings = match &args.config {
        Some(path) => HarnessSettings::load_from(path)?,
        None => HarnessSettings::load()?,
    };
    let run = args.resolve(&settings)?;

    if run.exceeds_memory_limit() {
        warn!(size = run.actual_size(), "database exceeds recommended in-memory size");
        println!(
            "\nWARNING: Database size ({}) exceeds recommended limit. This may cause memory errors.\n",
            format_bytes(run.actual_size())
        );
    }

    print!("{}", render_configuration(&args.size, &run));

    let result = execute(&run).await?;
    tracing::info!("{}", result.summary());
    print!("{}", result.render_report());

    if let Some(path) = &run.output {
        save_result_json(&result, path)?;
        println!("\nResults saved to: {}", path.display());
    }

    Ok(())
}

/// Banner printed before the run starts
pub fn render_configuration(size_arg: &str, run: &RunSettings) -> String {
    let rule = "=".repeat(80);
    let mut lines = vec![
        String::new(),
        rule.clone(),
        "PIR Benchmark Configuration".to_string(),
        rule.clone(),
        format!("  Target Size:        {} ({} bytes)", size_arg, run.target_size),
        format!(
            "  Actual Size:        {} ({} bytes)",
            format_bytes(run.actual_size()),
            run.actual_size()
        ),
        format!("  Num Rows:           {}", run.num_rows),
        format!("  Row Length:         {} bytes", run.row_len),
        format!("  PIR Type:           {}", run.pir_type),
        format!("  Queries:            {}", run.num_queries),
        format!("  Updatable:          {}", run.updatable),
        format!("  Seed:               {}", run.seed),
        format!("  Started:            {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
    ];
    if let Some(limit) = run.timeout {
        lines.push(format!("  Timeout:            {}", humantime::format_duration(limit)));
    }
    lines.push(rule);
    lines.push(String::new());
    lines.join("\n")
}

/// How long a cancelled run may take to reach its next cancellation point
/// before it is abandoned
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Run the benchmark against the in-process driver, streaming progress
/// into a progress bar and enforcing the optional deadline.
///
/// When the deadline passes the run is cancelled and given
/// [`CANCEL_GRACE`] to stop. A gateway call that is still stuck after that
/// keeps its blocking thread; `main` shuts the runtime down without
/// waiting for it.
pub async fn execute(run: &RunSettings) -> Result<BenchmarkResult> {
    let plan = run.plan();
    let seed = run.seed;
    let trials = run.trials;
    let cancel = Arc::new(AtomicBool::new(false));
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressUpdate>();

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let progress = tokio::spawn(async move {
        let mut phase = None;
        while let Some(update) = progress_rx.recv().await {
            if phase != Some(update.phase) {
                phase = Some(update.phase);
                bar.set_message(match update.phase {
                    Phase::Offline => "offline trials",
                    Phase::Online => "online queries",
                });
            }
            bar.set_length(update.total);
            bar.set_position(update.completed);
        }
        bar.finish_and_clear();
    });

    let run_cancel = Arc::clone(&cancel);
    let mut handle = tokio::task::spawn_blocking(move || {
        let driver = LoopbackDriver::new(seed);
        let mut factory = || -> Result<LoopbackClient> { Ok(driver.client()) };
        let mut orchestrator = BenchmarkOrchestrator::new(&*driver, SmallRng::seed_from_u64(seed))
            .with_trials(trials)
            .with_progress(progress_tx)
            .with_cancel(run_cancel);
        orchestrator.run(&plan, &mut factory)
    });

    let joined = match run.timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                progress.abort();
                match tokio::time::timeout(CANCEL_GRACE, handle).await {
                    Ok(_) => debug!("cancelled run stopped"),
                    Err(_) => warn!(
                        grace = %humantime::format_duration(CANCEL_GRACE),
                        "cancelled run did not stop; abandoning it"
                    ),
                }
                return Err(BenchError::GatewayError(format!(
                    "run exceeded the {} deadline",
                    humantime::format_duration(limit)
                )));
            }
        },
        None => handle.await,
    };

    let result = joined
        .map_err(|e| BenchError::GatewayError(format!("benchmark task failed: {}", e)))?;
    let _ = progress.await;
    result
}
