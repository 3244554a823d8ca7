use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::profiles::Profile;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}': {err} (expected e.g. 10s, 250ms, 1m)"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Live progress on stderr, text summary on stdout.
    Human,
    /// Emit JSON progress lines (NDJSON) and a final summary line to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "stampede",
    author,
    version,
    about = "Load tests for the e-commerce API",
    long_about = "stampede drives virtual users against an e-commerce HTTP API, records k6-style metrics and checks, and evaluates pass/fail thresholds.\n\nEach built-in scenario comes with a default load profile; `--profile`, `--config` and the `--vus`/`--duration`/`--iterations` flags reshape it (flags win over the config file, which wins over the profile).",
    after_help = "Examples:\n  stampede list\n  stampede run smoke\n  stampede run coupon-issue --base-url http://localhost:8080\n  stampede run order-create --profile stress --output json\n  stampede run product-list --vus 20 --duration 30s --summary-export out/summary.json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a built-in scenario
    #[command(
        long_about = "Run a built-in scenario against the target API.\n\nExit status: 0 when every threshold passes, 11 when a threshold fails, 30 on invalid input, 40 on runtime errors."
    )]
    Run(RunArgs),

    /// List built-in scenarios and their default profiles
    List,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Scenario name (see `stampede list`)
    pub scenario: String,

    /// Load profile to use instead of the scenario's default
    #[arg(long, value_enum)]
    pub profile: Option<Profile>,

    /// YAML file with executor parameters and threshold overrides
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Target API base URL
    #[arg(long, env = "BASE_URL", default_value = stampede_core::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Number of virtual users
    #[arg(long)]
    pub vus: Option<u64>,

    /// Test duration (e.g. 10s, 250ms, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Shared iteration budget (switches the executor to shared-iterations)
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    /// Also write the JSON summary to this path
    #[arg(long, value_name = "PATH")]
    pub summary_export: Option<PathBuf>,

    /// Log filter (e.g. debug, stampede=trace); defaults to RUST_LOG, then `warn`
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl RunArgs {
    pub fn run_config(&self) -> stampede_core::RunConfig {
        stampede_core::RunConfig {
            vus: self.vus,
            duration: self.duration,
            iterations: self.iterations,
        }
    }
}
