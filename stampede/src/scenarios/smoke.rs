use std::fmt::Write as _;
use std::time::Duration;

use stampede_core::{Iteration, IterationResult, RunContext, RunSummary, ScenarioFn, scenario_fn};

use super::{LatencyTier, Workload, banner, common_thresholds, get, send};
use crate::profiles::Profile;

/// Check pass rate at or above which the API is ready for heavier runs.
const PASS_RATE: f64 = 0.99;

pub(crate) struct Smoke;

impl Workload for Smoke {
    fn name(&self) -> &'static str {
        "smoke"
    }

    fn about(&self) -> &'static str {
        "health, product list, coupons and realtime popular products respond"
    }

    fn profile(&self) -> Option<Profile> {
        Some(Profile::Smoke)
    }

    fn thresholds(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        common_thresholds(LatencyTier::Normal)
    }

    fn build(&self, _ctx: &RunContext) -> stampede_core::Result<ScenarioFn> {
        Ok(scenario_fn(iteration))
    }

    fn report(&self, summary: &RunSummary) -> String {
        let rate = summary.value_or_zero("checks", "rate");

        let mut out = String::new();
        banner(&mut out, "Smoke test");
        writeln!(out, "checks passed: {:.2}%", rate * 100.0).ok();
        if rate >= PASS_RATE {
            out.push_str("PASS: smoke test passed, ready for load tests.\n");
        } else {
            out.push_str("FAIL: smoke test failed, check the API and server state.\n");
        }
        out
    }
}

async fn iteration(it: Iteration) -> IterationResult {
    let health = send(&it, get(&it, "/actuator/health")).await;
    it.check(&health)
        .that("[Health] server running", |r| r.is(200))
        .that("[Health] status UP", |r| {
            r.json_if(200).is_some_and(|v| v["status"] == "UP")
        })
        .passed();

    it.sleep(Duration::from_secs(1)).await;

    let products = send(
        &it,
        get(&it, "/api/products").query("page", 0).query("size", 5),
    )
    .await;
    it.check(&products)
        .that("[Products] request ok", |r| r.is(200))
        .that("[Products] has paging info", |r| {
            r.json_if(200).is_some_and(|v| v.get("pageable").is_some())
        })
        .passed();

    it.sleep(Duration::from_secs(1)).await;

    let coupons = send(&it, get(&it, "/api/coupons/available")).await;
    it.check(&coupons)
        .that("[Coupons] request ok", |r| r.is(200))
        .passed();

    it.sleep(Duration::from_secs(1)).await;

    let popular = send(
        &it,
        get(&it, "/api/products/popular/realtime").query("topN", 5),
    )
    .await;
    it.check(&popular)
        .that("[Popular] request ok", |r| r.is(200))
        .passed();

    it.sleep(Duration::from_secs(2)).await;
    Ok(())
}
