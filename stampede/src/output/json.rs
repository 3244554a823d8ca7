use serde::Serialize;
use std::io::Write as _;
use std::sync::Arc;

use stampede_core::{ProgressUpdate, RunSummary, ScenarioProgress};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _base_url: &str, _scenarios: &[stampede_core::ScenarioConfig]) {}

    fn progress(&self) -> Option<stampede_core::ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        emit_json_line(&JsonSummaryLine {
            kind: "summary",
            summary,
        });
        Ok(())
    }

    fn print_report(&self, _report: &str) {}
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub active_vus: u64,

    pub requests_per_sec: f64,
    pub iterations_per_sec: f64,

    pub total_requests: u64,
    pub failed_requests_total: u64,
    pub total_bytes_received: u64,
    pub total_bytes_sent: u64,
    pub checks_failed_total: u64,
    pub iterations_total: u64,
    pub iterations_failed_total: u64,

    pub scenarios: Vec<JsonScenarioProgress>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonScenarioProgress {
    pub name: String,
    pub executor: &'static str,
    /// Planned VUs right now: fixed for constant/shared, the interpolated target when ramping.
    pub target_vus: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations_claimed: Option<u64>,
}

fn scenario_line(name: &str, progress: &ScenarioProgress) -> JsonScenarioProgress {
    let (executor, target_vus, stage, iterations_claimed) = match progress {
        ScenarioProgress::ConstantVus { vus, .. } => ("constant-vus", *vus, None, None),
        ScenarioProgress::RampingVus { stage, .. } => (
            "ramping-vus",
            stage.as_ref().map_or(0, |s| s.current_target),
            stage.as_ref().map(|s| s.stage),
            None,
        ),
        ScenarioProgress::SharedIterations { vus, claimed, .. } => {
            ("shared-iterations", *vus, None, Some(*claimed))
        }
    };

    JsonScenarioProgress {
        name: name.to_string(),
        executor,
        target_vus,
        stage,
        iterations_claimed,
    }
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine {
    let m = &u.metrics;

    JsonProgressLine {
        kind: "progress",
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs_f64(),
        active_vus: m.active_vus,

        requests_per_sec: m.rps_now,
        iterations_per_sec: m.iterations_per_sec_now,

        total_requests: m.requests_total,
        failed_requests_total: m.failed_requests_total,
        total_bytes_received: m.bytes_received_total,
        total_bytes_sent: m.bytes_sent_total,
        checks_failed_total: m.checks_failed_total,
        iterations_total: m.iterations_total,
        iterations_failed_total: m.iterations_failed_total,

        scenarios: u
            .scenarios
            .iter()
            .map(|s| scenario_line(&s.name, &s.progress))
            .collect(),
    }
}

#[derive(Debug, Serialize)]
struct JsonSummaryLine<'a> {
    kind: &'static str,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
