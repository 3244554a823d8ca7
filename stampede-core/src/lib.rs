mod checks;
mod config;
mod context;
mod error;
mod gate;
mod iteration;
mod progress;
pub mod random;
mod run;
mod schedule;
mod signal;
mod summary;
mod thresholds;

pub use checks::{Check, CheckSummary, Checks, Predicate};
pub use config::{
    DEFAULT_GRACEFUL_RAMP_DOWN, DEFAULT_GRACEFUL_STOP, RunConfig, ScenarioConfig,
    ScenarioExecutor, ScenarioExecutorKind, Stage,
};
pub use context::{BuiltinMetrics, DEFAULT_BASE_URL, RunContext};
pub use error::{Error, Result};
pub use gate::IterationGate;
pub use iteration::{Iteration, IterationError, IterationResult, ScenarioFn, scenario_fn};
pub use progress::{
    LiveMetrics, ProgressFn, ProgressUpdate, ScenarioProgress, ScenarioProgressEntry,
    StageProgress,
};
pub use run::{Scenario, run_scenarios};
pub use schedule::{RampingSchedule, StageSnapshot};
pub use signal::StartSignal;
pub use summary::{MetricReport, RunSummary, ScenarioReport};
pub use thresholds::{
    ThresholdAgg, ThresholdExpr, ThresholdOp, ThresholdResult, ThresholdSet, evaluate_thresholds,
    parse_threshold_expr,
};

pub use stampede_http as http;
pub use stampede_metrics as metrics;
