use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use stampede_core::metrics::{Counter, Trend};
use stampede_core::random;
use stampede_core::{Iteration, IterationResult, RunContext, RunSummary, ScenarioFn, scenario_fn};

use super::{
    LatencyTier, Workload, banner, common_thresholds, count, get, post, send, success_rate_pct,
    write_latency,
};
use crate::profiles::Profile;

const USER_POOL: u64 = 1000;

pub(crate) struct OrderCreate;

struct Metrics {
    successful: Counter,
    failed: Counter,
    duration: Trend,
}

impl Workload for OrderCreate {
    fn name(&self) -> &'static str {
        "order-create"
    }

    fn about(&self) -> &'static str {
        "place and pay an order, then read it back"
    }

    fn profile(&self) -> Option<Profile> {
        Some(Profile::Load)
    }

    fn thresholds(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        let mut t = common_thresholds(LatencyTier::Normal);
        t.push(("order_creation_duration", vec!["p(95)<2000"]));
        t
    }

    fn build(&self, ctx: &RunContext) -> stampede_core::Result<ScenarioFn> {
        let m = Arc::new(Metrics {
            successful: ctx.counter("successful_orders")?,
            failed: ctx.counter("failed_orders")?,
            duration: ctx.trend("order_creation_duration")?,
        });
        Ok(scenario_fn(move |it| iteration(it, m.clone())))
    }

    fn report(&self, summary: &RunSummary) -> String {
        let ok = count(summary, "successful_orders");
        let failed = count(summary, "failed_orders");
        let rate = success_rate_pct(ok, failed);
        let p95 = summary.value_or_zero("order_creation_duration", "p(95)");

        let mut out = String::new();
        banner(&mut out, "Order create");
        writeln!(out, "succeeded: {ok}").ok();
        writeln!(out, "failed: {failed}").ok();
        writeln!(out, "success rate: {rate:.2}%").ok();
        write_latency(&mut out, "order creation", summary, "order_creation_duration");

        if rate >= 99.0 && p95 < 2000.0 {
            out.push_str("PASS: target met (success >= 99%, p95 < 2s)\n");
        } else if rate >= 95.0 {
            out.push_str("WARN: success rate or latency needs work\n");
        } else {
            out.push_str("FAIL: below target (success < 95%)\n");
        }
        out
    }
}

fn idempotency_key(it: &Iteration) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    format!("test-{millis}-{}-{}", it.vu(), it.iteration())
}

async fn iteration(it: Iteration, m: Arc<Metrics>) -> IterationResult {
    let user_id = random::one_to(USER_POOL);

    let req = post(&it, "/api/orders").json(&serde_json::json!({
        "userId": user_id,
        "userCouponId": null,
        "idempotencyKey": idempotency_key(&it),
    }))?;
    let reply = send(&it, req).await;
    m.duration.add(reply.elapsed_ms());

    let order = reply.json_if(201);
    it.check(&reply)
        .that("order created (201)", |r| r.is(201))
        .that("order number assigned", |_| {
            order.as_ref().is_some_and(|o| o.get("orderNumber").is_some())
        })
        .that("order status is PAID", |_| {
            order.as_ref().is_some_and(|o| o["status"] == "PAID")
        })
        .that("response time < 3s", |r| r.elapsed < Duration::from_secs(3))
        .passed();

    if reply.is(201) {
        m.successful.increment();
    } else {
        m.failed.increment();
        tracing::debug!(
            vu = it.vu(),
            user_id,
            status = reply.status(),
            body = %reply.preview(200),
            "order creation failed"
        );
    }

    if let Some(order_id) = order.as_ref().and_then(|o| o["id"].as_u64()) {
        it.sleep(random::sleep_between(0.5, 1.0)).await;

        let lookup = send(&it, get(&it, &format!("/api/orders/{order_id}"))).await;
        it.check(&lookup)
            .that("order lookup ok (200)", |r| r.is(200))
            .that("order id matches", |r| {
                r.json_if(200)
                    .is_some_and(|v| v["id"].as_u64() == Some(order_id))
            })
            .passed();
    }

    it.sleep(random::sleep_between(2.0, 5.0)).await;
    Ok(())
}
