//! Built-in e-commerce workloads.
//!
//! Each workload registers its own metrics on the [`RunContext`] before the run starts,
//! hands back the per-iteration body, and renders a short verdict from the final
//! [`RunSummary`].

use std::fmt::Write as _;
use std::time::Duration;

use stampede_core::http::{HttpRequest, HttpResponse};
use stampede_core::{Iteration, RunContext, RunSummary, ScenarioExecutor, ScenarioFn};
use tokio::time::Instant;

use crate::profiles::Profile;

mod coupon_issue;
mod order_create;
mod popular_products;
mod product_list;
mod quick_load;
mod smoke;

pub(crate) trait Workload: Send + Sync {
    fn name(&self) -> &'static str;

    fn about(&self) -> &'static str;

    /// Load profile used when `--profile` is not given. `None` means the workload
    /// carries its own executor.
    fn profile(&self) -> Option<Profile>;

    fn default_executor(&self) -> ScenarioExecutor {
        self.profile().unwrap_or(Profile::Smoke).executor()
    }

    /// Built-in thresholds as `(metric, expressions)`.
    fn thresholds(&self) -> Vec<(&'static str, Vec<&'static str>)>;

    /// Registers the workload's metrics and returns the iteration body.
    fn build(&self, ctx: &RunContext) -> stampede_core::Result<ScenarioFn>;

    /// End-of-run report appended to the human summary.
    fn report(&self, summary: &RunSummary) -> String;
}

static ALL: &[&dyn Workload] = &[
    &smoke::Smoke,
    &quick_load::QuickLoad,
    &coupon_issue::CouponIssue,
    &order_create::OrderCreate,
    &product_list::ProductList,
    &popular_products::PopularProducts,
];

pub(crate) fn all() -> &'static [&'static dyn Workload] {
    ALL
}

pub(crate) fn find(name: &str) -> Option<&'static dyn Workload> {
    ALL.iter().copied().find(|w| w.name() == name)
}

pub(crate) fn names() -> Vec<&'static str> {
    ALL.iter().map(|w| w.name()).collect()
}

const JSON_HEADERS: [(&str, &str); 2] = [
    ("Content-Type", "application/json"),
    ("Accept", "application/json"),
];

fn get(it: &Iteration, path: &str) -> HttpRequest {
    HttpRequest::get(it.url(path)).headers(JSON_HEADERS)
}

fn post(it: &Iteration, path: &str) -> HttpRequest {
    HttpRequest::post(it.url(path)).headers(JSON_HEADERS)
}

/// `http_req_duration` p(95) bands.
#[derive(Debug, Clone, Copy)]
enum LatencyTier {
    Fast,
    Normal,
    Slow,
}

impl LatencyTier {
    fn expression(self) -> &'static str {
        match self {
            Self::Fast => "p(95)<200",
            Self::Normal => "p(95)<500",
            Self::Slow => "p(95)<1000",
        }
    }
}

/// Thresholds shared by the workloads: failed requests, check pass rate and a latency
/// tier.
fn common_thresholds(tier: LatencyTier) -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        ("http_req_failed", vec!["rate<0.01"]),
        ("http_req_duration", vec![tier.expression()]),
        ("checks", vec!["rate>0.99"]),
    ]
}

/// Outcome of one request as the workloads see it. A transport error reads as status 0
/// with no body; it is already counted in `http_req_failed` and `http_req_errors`.
struct Reply {
    res: Option<HttpResponse>,
    elapsed: Duration,
}

async fn send(it: &Iteration, req: HttpRequest) -> Reply {
    let started = Instant::now();
    let res = it.request(req).await.ok();
    Reply {
        res,
        elapsed: started.elapsed(),
    }
}

impl Reply {
    fn status(&self) -> u16 {
        self.res.as_ref().map_or(0, |r| r.status)
    }

    fn is(&self, status: u16) -> bool {
        self.status() == status
    }

    /// Parsed body, for a response with the given status.
    fn json_if(&self, status: u16) -> Option<serde_json::Value> {
        self.res
            .as_ref()
            .filter(|r| r.status == status)
            .and_then(HttpResponse::json_value)
    }

    fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    fn preview(&self, max_chars: usize) -> String {
        self.res
            .as_ref()
            .map(|r| String::from_utf8_lossy(&r.body).chars().take(max_chars).collect())
            .unwrap_or_default()
    }
}

/// `summary` lookups used by the reports; missing values read as 0.
fn count(summary: &RunSummary, metric: &str) -> u64 {
    summary.value_or_zero(metric, "count") as u64
}

fn success_rate_pct(success: u64, failed: u64) -> f64 {
    let total = success + failed;
    if total == 0 {
        0.0
    } else {
        success as f64 / total as f64 * 100.0
    }
}

fn write_latency(out: &mut String, label: &str, summary: &RunSummary, metric: &str) {
    writeln!(out, "[{label}]").ok();
    writeln!(out, "  avg: {:.0}ms", summary.value_or_zero(metric, "avg")).ok();
    writeln!(out, "  p95: {:.0}ms", summary.value_or_zero(metric, "p(95)")).ok();
}

fn banner(out: &mut String, title: &str) {
    writeln!(out, "=== {title} ===").ok();
}
