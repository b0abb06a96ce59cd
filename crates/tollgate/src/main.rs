//! tollgate CLI
//!
//! Drives the token bucket from the command line: sequential and concurrent
//! load simulations, a run through the admission gate, and config checking.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, ensure};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use tollgate_core::config::Config;
use tollgate_core::gate::GateStats;
use tollgate_core::logging::{LogFormat, LogLevel, init_logging};
use tollgate_core::{
    Admission, AdmissionGate, BucketConfig, BucketError, BucketStats, ConfigError, GateError,
};

#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about = "Token bucket rate limiting toolkit")]
struct Cli {
    /// Path to a tollgate.toml config file
    #[arg(long, global = true, env = "TOLLGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format (pretty, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send sequential requests through a bucket on the real clock
    Simulate {
        #[command(flatten)]
        bucket: BucketArgs,

        /// Number of requests to send
        #[arg(long, default_value_t = 15)]
        requests: u32,

        /// Delay between requests in milliseconds
        #[arg(long, default_value_t = 200)]
        delay_ms: u64,

        /// Tokens requested per request
        #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
        cost: f64,

        /// Print a JSON summary instead of one line per request
        #[arg(long)]
        json: bool,
    },

    /// Hammer one shared bucket from several concurrent workers
    Burst {
        #[command(flatten)]
        bucket: BucketArgs,

        /// Number of concurrent workers
        #[arg(long, default_value_t = 3)]
        workers: usize,

        /// Requests sent by each worker
        #[arg(long, default_value_t = 8)]
        per_worker: u32,

        /// Print a JSON summary
        #[arg(long)]
        json: bool,
    },

    /// Route requests through the admission gate over the configured backends
    Gate {
        #[command(flatten)]
        bucket: BucketArgs,

        /// Number of requests to route
        #[arg(long, default_value_t = 10)]
        requests: u32,

        /// Backend address; repeat to add more. Replaces `gate.backends`.
        #[arg(long = "backend")]
        backends: Vec<String>,

        /// Print decisions and counters as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load and validate a config file, then print the resolved settings
    CheckConfig {
        /// Config file to check
        path: PathBuf,

        /// Print the resolved config as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Bucket overrides; anything left unset comes from the config file.
#[derive(Args, Debug, Clone, Default)]
struct BucketArgs {
    /// Maximum tokens
    #[arg(long, allow_negative_numbers = true)]
    capacity: Option<f64>,

    /// Tokens added per refill interval
    #[arg(long, allow_negative_numbers = true)]
    rate: Option<f64>,

    /// Refill interval in seconds
    #[arg(long, allow_negative_numbers = true)]
    interval: Option<f64>,
}

impl BucketArgs {
    fn resolve(&self, base: &BucketConfig) -> BucketConfig {
        BucketConfig {
            capacity: self.capacity.unwrap_or(base.capacity),
            refill_rate: self.rate.unwrap_or(base.refill_rate),
            refill_interval_secs: self.interval.unwrap_or(base.refill_interval_secs),
        }
    }
}

#[derive(Serialize)]
struct RunSummary {
    allowed: u64,
    denied: u64,
    bucket: BucketStats,
}

#[derive(Serialize)]
struct GateDecision<'a> {
    request: u32,
    backend: Option<&'a str>,
}

#[derive(Serialize)]
struct GateSummary<'a> {
    decisions: Vec<GateDecision<'a>>,
    gate: GateStats,
    bucket: BucketStats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if let Some(hint) = remediation(&err) {
                eprintln!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level.to_string();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    init_logging(&config.logging).context("failed to initialize logging")?;
    debug!(config_path = ?cli.config, "configuration loaded");

    match cli.command {
        Commands::Simulate {
            bucket,
            requests,
            delay_ms,
            cost,
            json,
        } => simulate(&bucket.resolve(&config.bucket), requests, delay_ms, cost, json).await,
        Commands::Burst {
            bucket,
            workers,
            per_worker,
            json,
        } => burst(&bucket.resolve(&config.bucket), workers, per_worker, json).await,
        Commands::Gate {
            bucket,
            requests,
            backends,
            json,
        } => {
            let backends = if backends.is_empty() {
                config.gate.backends.clone()
            } else {
                backends
            };
            gate(&bucket.resolve(&config.bucket), backends, requests, json)
        }
        Commands::CheckConfig { path, json } => check_config(&path, json),
    }
}

async fn simulate(
    settings: &BucketConfig,
    requests: u32,
    delay_ms: u64,
    cost: f64,
    json: bool,
) -> anyhow::Result<()> {
    let bucket = settings.build()?;
    info!(%bucket, requests, delay_ms, cost, "starting simulation");
    if !json {
        println!("{bucket}");
    }

    let (mut allowed, mut denied) = (0u64, 0u64);
    for i in 1..=requests {
        let ok = bucket.consume(cost)?;
        if ok {
            allowed += 1;
        } else {
            denied += 1;
        }
        if !json {
            let verdict = if ok { "ALLOWED" } else { "RATE LIMITED" };
            println!(
                "Request {i:>3}: {verdict:<12} (tokens: {:.1})",
                bucket.get_available_tokens()
            );
        }
        if i < requests && delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    let summary = RunSummary {
        allowed,
        denied,
        bucket: bucket.stats(),
    };
    print_summary(&summary, json)
}

async fn burst(
    settings: &BucketConfig,
    workers: usize,
    per_worker: u32,
    json: bool,
) -> anyhow::Result<()> {
    ensure!(workers > 0, "--workers must be at least 1");
    let bucket = Arc::new(settings.build()?);
    info!(%bucket, workers, per_worker, "starting burst");

    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let bucket = Arc::clone(&bucket);
            tokio::task::spawn_blocking(move || {
                let mut allowed = 0u64;
                for _ in 0..per_worker {
                    if bucket.try_acquire_one() {
                        allowed += 1;
                    }
                }
                debug!(worker, allowed, "burst worker finished");
                (allowed, u64::from(per_worker) - allowed)
            })
        })
        .collect();

    let (mut allowed, mut denied) = (0u64, 0u64);
    for handle in handles {
        let (a, d) = handle.await.context("burst worker panicked")?;
        allowed += a;
        denied += d;
    }

    let summary = RunSummary {
        allowed,
        denied,
        bucket: bucket.stats(),
    };
    print_summary(&summary, json)
}

fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!(
            "Summary: {} allowed, {} rate limited, {:.2} tokens remaining",
            summary.allowed, summary.denied, summary.bucket.current_tokens
        );
    }
    Ok(())
}

fn gate(
    settings: &BucketConfig,
    backends: Vec<String>,
    requests: u32,
    json: bool,
) -> anyhow::Result<()> {
    let bucket = Arc::new(settings.build()?);
    let gate = AdmissionGate::new(bucket, backends)?;
    info!(backends = gate.backends().len(), requests, "routing through admission gate");

    let mut decisions = Vec::with_capacity(requests as usize);
    for request in 1..=requests {
        let backend = match gate.admit() {
            Admission::Forward(backend) => Some(backend.as_str()),
            Admission::RateLimited => None,
        };
        if !json {
            match backend {
                Some(addr) => println!("Request {request:>3}: -> {addr}"),
                None => println!("Request {request:>3}: rate limited"),
            }
        }
        decisions.push(GateDecision { request, backend });
    }

    let stats = gate.stats();
    if json {
        let summary = GateSummary {
            decisions,
            gate: stats,
            bucket: gate.bucket().stats(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Summary: {} forwarded, {} rate limited",
            stats.forwarded, stats.rate_limited
        );
    }
    Ok(())
}

fn check_config(path: &std::path::Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load_from(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("config OK: {}", path.display());
    println!("  bucket.capacity             = {}", config.bucket.capacity);
    println!("  bucket.refill_rate          = {}", config.bucket.refill_rate);
    println!(
        "  bucket.refill_interval_secs = {}",
        config.bucket.refill_interval_secs
    );
    println!("  logging.level               = {}", config.logging.level);
    println!("  logging.format              = {}", config.logging.format);
    println!("  gate.backends               = {}", config.gate.backends.len());
    Ok(())
}

/// Find a remediation hint anywhere in the error chain.
fn remediation(err: &anyhow::Error) -> Option<String> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<tollgate_core::Error>() {
            Some(e.remediation())
        } else if let Some(e) = cause.downcast_ref::<BucketError>() {
            Some(e.remediation())
        } else if let Some(e) = cause.downcast_ref::<ConfigError>() {
            Some(e.remediation())
        } else {
            cause
                .downcast_ref::<GateError>()
                .map(|e| tollgate_core::Error::from(e.clone()).remediation())
        }
    })
}
