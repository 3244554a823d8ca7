use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use stampede_core::metrics::{Counter, Trend};
use stampede_core::{
    DEFAULT_GRACEFUL_RAMP_DOWN, Iteration, IterationResult, RunContext, RunSummary,
    ScenarioExecutor, ScenarioFn, Stage, scenario_fn,
};

use super::{LatencyTier, Workload, banner, count, get, send, success_rate_pct};
use crate::profiles::Profile;

pub(crate) struct QuickLoad;

struct Metrics {
    api_duration: Trend,
    successful: Counter,
    failed: Counter,
}

impl Workload for QuickLoad {
    fn name(&self) -> &'static str {
        "quick-load"
    }

    fn about(&self) -> &'static str {
        "two-minute ramp to 100 VUs on the product list"
    }

    fn profile(&self) -> Option<Profile> {
        None
    }

    fn default_executor(&self) -> ScenarioExecutor {
        ScenarioExecutor::RampingVus {
            start_vus: 0,
            stages: vec![
                Stage::new(Duration::from_secs(30), 50),
                Stage::new(Duration::from_secs(60), 100),
                Stage::new(Duration::from_secs(30), 0),
            ],
            graceful_ramp_down: DEFAULT_GRACEFUL_RAMP_DOWN,
        }
    }

    fn thresholds(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        vec![
            ("http_req_duration", vec![LatencyTier::Slow.expression()]),
            ("http_req_failed", vec!["rate<0.01"]),
            ("checks", vec!["rate>0.95"]),
        ]
    }

    fn build(&self, ctx: &RunContext) -> stampede_core::Result<ScenarioFn> {
        let m = Arc::new(Metrics {
            api_duration: ctx.trend("api_duration")?,
            successful: ctx.counter("successful_requests")?,
            failed: ctx.counter("failed_requests")?,
        });
        Ok(scenario_fn(move |it| iteration(it, m.clone())))
    }

    fn report(&self, summary: &RunSummary) -> String {
        let ok = count(summary, "successful_requests");
        let failed = count(summary, "failed_requests");

        let mut out = String::new();
        banner(&mut out, "Quick load test");
        writeln!(out, "succeeded: {ok}").ok();
        writeln!(out, "failed: {failed}").ok();
        writeln!(out, "success rate: {:.2}%", success_rate_pct(ok, failed)).ok();
        writeln!(out, "avg: {:.0}ms", summary.value_or_zero("api_duration", "avg")).ok();
        writeln!(out, "p95: {:.0}ms", summary.value_or_zero("api_duration", "p(95)")).ok();
        writeln!(out, "max: {:.0}ms", summary.value_or_zero("api_duration", "max")).ok();
        out
    }
}

async fn iteration(it: Iteration, m: Arc<Metrics>) -> IterationResult {
    let reply = send(
        &it,
        get(&it, "/api/products").query("page", 0).query("size", 20),
    )
    .await;
    m.api_duration.add(reply.elapsed_ms());

    it.check(&reply)
        .that("product list ok", |r| r.is(200))
        .that("response time < 1s", |r| r.elapsed < Duration::from_secs(1))
        .passed();

    if reply.is(200) {
        m.successful.increment();
    } else {
        m.failed.increment();
    }

    it.sleep(Duration::from_secs(1)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::test_support::{add_count, add_samples, summary};

    #[test]
    fn ramps_to_100_over_two_minutes() {
        let exec = QuickLoad.default_executor();
        assert_eq!(exec.max_vus(), 100);
        assert_eq!(exec.duration(), Duration::from_secs(120));
    }

    #[test]
    fn report_shows_rate_and_latency() {
        let s = summary(120, |reg| {
            add_count(reg, "successful_requests", 95);
            add_count(reg, "failed_requests", 5);
            add_samples(reg, "api_duration", &[10.0, 20.0, 30.0]);
        });
        let report = QuickLoad.report(&s);
        assert!(report.contains("success rate: 95.00%"), "{report}");
        assert!(report.contains("avg: 20ms"), "{report}");
        assert!(report.contains("max: 30ms"), "{report}");
    }
}
