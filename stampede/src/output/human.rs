use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::{format_bytes, format_duration, format_rate};
use progress::{BarPosition, HumanProgress};
use stampede_core::{LiveMetrics, ProgressUpdate, ScenarioProgress};
use summary::render;

use super::OutputFormatter;

pub(crate) struct HumanOutput {
    progress: Arc<HumanProgress>,
}

impl HumanOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanOutput {
    fn print_header(&self, base_url: &str, scenarios: &[stampede_core::ScenarioConfig]) {
        println!("target: {base_url}");
        for s in scenarios {
            println!(
                "scenario: {} executor={} vus_max={} duration={} graceful_stop={}",
                s.name,
                s.executor.kind(),
                s.executor.max_vus(),
                format_duration(s.executor.duration()),
                format_duration(s.graceful_stop)
            );
        }
        if !scenarios.is_empty() {
            println!();
        }
    }

    fn progress(&self) -> Option<stampede_core::ProgressFn> {
        let progress = self.progress.clone();

        Some(Arc::new(move |u: ProgressUpdate| {
            let rates = rates_message(&u.metrics);
            for s in &u.scenarios {
                let (position, detail) = scenario_message(&s.progress, &u);
                progress.update(&s.name, position, format!("{detail}{rates}"));
            }
        }))
    }

    fn print_summary(&self, summary: &stampede_core::RunSummary) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(summary));

        let failed: Vec<_> = summary.failed_thresholds().collect();
        if !failed.is_empty() {
            eprintln!("thresholds failed:");
            for t in failed {
                match t.observed {
                    Some(obs) => eprintln!("  {}: {} (observed {obs})", t.metric, t.expression),
                    None => eprintln!("  {}: {} (no data)", t.metric, t.expression),
                }
            }
        }

        Ok(())
    }

    fn print_report(&self, report: &str) {
        print!("{report}");
    }
}

fn rates_message(m: &LiveMetrics) -> String {
    format!(
        " active={} iters/s={} rps={} recv={} failed={} checks_failed={}",
        m.active_vus,
        format_rate(m.iterations_per_sec_now),
        format_rate(m.rps_now),
        format_bytes(m.bytes_received_total),
        m.failed_requests_total,
        m.checks_failed_total
    )
}

fn scenario_message(progress: &ScenarioProgress, u: &ProgressUpdate) -> (BarPosition, String) {
    let elapsed = format_duration(u.elapsed);

    match progress {
        ScenarioProgress::ConstantVus { vus, duration } => (
            BarPosition::Time {
                elapsed: u.elapsed,
                total: *duration,
            },
            format!("vus={vus} elapsed={elapsed}"),
        ),
        ScenarioProgress::RampingVus {
            total_duration,
            stage,
        } => {
            let msg = match stage {
                Some(stage) => format!(
                    "stage={}/{} target={} elapsed={elapsed} stage_remaining={}",
                    stage.stage,
                    stage.stages,
                    stage.current_target,
                    format_duration(stage.stage_remaining)
                ),
                None => format!("elapsed={elapsed}"),
            };
            (
                BarPosition::Time {
                    elapsed: u.elapsed,
                    total: *total_duration,
                },
                msg,
            )
        }
        ScenarioProgress::SharedIterations {
            vus,
            iterations,
            claimed,
            ..
        } => (
            BarPosition::Count {
                done: *claimed,
                total: *iterations,
            },
            format!("vus={vus} iterations={claimed}/{iterations} elapsed={elapsed}"),
        ),
    }
}
