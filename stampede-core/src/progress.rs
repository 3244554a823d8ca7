use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct LiveMetrics {
    /// Requests/sec observed during the last progress interval.
    pub rps_now: f64,

    /// Total requests observed so far.
    pub requests_total: u64,

    /// Total failed requests (unexpected status or transport error) so far.
    pub failed_requests_total: u64,

    pub bytes_received_total: u64,
    pub bytes_sent_total: u64,

    /// Total failed checks so far.
    pub checks_failed_total: u64,

    pub iterations_total: u64,
    pub iterations_per_sec_now: f64,
    pub iterations_failed_total: u64,

    /// VUs currently running iterations, across all scenarios.
    pub active_vus: u64,
}

#[derive(Debug, Clone)]
pub struct StageProgress {
    /// 1-based stage index.
    pub stage: usize,
    pub stages: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

#[derive(Debug, Clone)]
pub enum ScenarioProgress {
    ConstantVus {
        vus: u64,
        duration: Duration,
    },
    RampingVus {
        total_duration: Duration,
        stage: Option<StageProgress>,
    },
    SharedIterations {
        vus: u64,
        iterations: u64,
        claimed: u64,
        max_duration: Duration,
    },
}

#[derive(Debug, Clone)]
pub struct ScenarioProgressEntry {
    pub name: String,
    pub progress: ScenarioProgress,
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based).
    pub tick: u64,
    pub elapsed: Duration,
    pub metrics: LiveMetrics,
    pub scenarios: Vec<ScenarioProgressEntry>,
}

pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
