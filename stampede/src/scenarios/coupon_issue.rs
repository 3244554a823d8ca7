use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use stampede_core::http::ExpectedStatuses;
use stampede_core::metrics::Counter;
use stampede_core::{Iteration, IterationResult, RunContext, RunSummary, ScenarioFn, scenario_fn};

use super::{LatencyTier, Workload, banner, common_thresholds, count, post, send};
use crate::profiles::Profile;

const COUPON_ID: u64 = 1;

/// Coupons the target issues for [`COUPON_ID`].
const COUPON_LIMIT: u64 = 100;

/// VUs whose responses are logged at debug level.
const SAMPLED_VUS: u64 = 5;

pub(crate) struct CouponIssue;

struct Metrics {
    successful: Counter,
    duplicate: Counter,
    sold_out: Counter,
    failed: Counter,
}

impl Workload for CouponIssue {
    fn name(&self) -> &'static str {
        "coupon-issue"
    }

    fn about(&self) -> &'static str {
        "first-come coupon rush: each VU claims coupon 1 once"
    }

    fn profile(&self) -> Option<Profile> {
        Some(Profile::CouponIssue)
    }

    fn thresholds(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        let mut t = common_thresholds(LatencyTier::Normal);
        t.push(("successful_coupon_issues", vec!["count>=1"]));
        t
    }

    fn build(&self, ctx: &RunContext) -> stampede_core::Result<ScenarioFn> {
        let m = Arc::new(Metrics {
            successful: ctx.counter("successful_coupon_issues")?,
            duplicate: ctx.counter("duplicate_issues")?,
            sold_out: ctx.counter("sold_out_responses")?,
            failed: ctx.counter("failed_coupon_issues")?,
        });
        Ok(scenario_fn(move |it| iteration(it, m.clone())))
    }

    fn report(&self, summary: &RunSummary) -> String {
        let issued = count(summary, "successful_coupon_issues");
        let duplicate = count(summary, "duplicate_issues");
        let sold_out = count(summary, "sold_out_responses");
        let failed = count(summary, "failed_coupon_issues");

        let mut out = String::new();
        banner(&mut out, "Coupon issue");
        writeln!(out, "issued: {issued}").ok();
        writeln!(out, "duplicate requests: {duplicate} (user already holds the coupon)").ok();
        writeln!(out, "sold out: {sold_out}").ok();
        writeln!(out, "failed: {failed}").ok();
        writeln!(out, "total requests: {}", issued + duplicate + sold_out + failed).ok();
        out.push_str(&verdict(issued));
        out.push('\n');
        out
    }
}

fn verdict(issued: u64) -> String {
    match issued.cmp(&COUPON_LIMIT) {
        std::cmp::Ordering::Greater => format!(
            "WARNING: {issued} coupons issued, more than the limit of {COUPON_LIMIT}; concurrency control is broken!"
        ),
        std::cmp::Ordering::Equal => format!("OK: exactly {COUPON_LIMIT} coupons issued."),
        std::cmp::Ordering::Less => {
            format!("INFO: {issued} coupons issued (depends on the target's stock and VU count).")
        }
    }
}

async fn iteration(it: Iteration, m: Arc<Metrics>) -> IterationResult {
    let user_id = it.vu();

    let req = post(&it, &format!("/api/coupons/{COUPON_ID}/issue"))
        .json(&serde_json::json!({ "userId": user_id }))?
        .expect(ExpectedStatuses::only(&[200, 409, 410]));
    let reply = send(&it, req).await;

    it.check(&reply)
        .that("valid status (200, 409, 410)", |r| {
            matches!(r.status(), 200 | 409 | 410)
        })
        .that("success has userCouponId", |r| {
            !r.is(200)
                || r.json_if(200)
                    .is_some_and(|v| v.get("userCouponId").is_some())
        })
        .passed();

    match reply.status() {
        200 => m.successful.increment(),
        409 => m.duplicate.increment(),
        410 => m.sold_out.increment(),
        _ => m.failed.increment(),
    }

    if it.vu() <= SAMPLED_VUS {
        tracing::debug!(
            vu = it.vu(),
            user_id,
            status = reply.status(),
            body = %reply.preview(100),
            "coupon issue response"
        );
    }

    it.sleep(Duration::from_millis(100)).await;
    Ok(())
}
