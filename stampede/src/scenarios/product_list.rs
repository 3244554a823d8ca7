use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use stampede_core::metrics::{Counter, Trend};
use stampede_core::random;
use stampede_core::{Iteration, IterationResult, RunContext, RunSummary, ScenarioFn, scenario_fn};

use super::{
    LatencyTier, Reply, Workload, banner, common_thresholds, count, get, send, success_rate_pct,
    write_latency,
};
use crate::profiles::Profile;

const PAGE_SIZE: u64 = 20;
const FALLBACK_PRODUCT_ID: u64 = 1;

pub(crate) struct ProductList;

struct Metrics {
    successful: Counter,
    failed: Counter,
    list_duration: Trend,
    detail_duration: Trend,
}

impl Metrics {
    fn tally(&self, reply: &Reply) {
        if reply.is(200) {
            self.successful.increment();
        } else {
            self.failed.increment();
        }
    }
}

impl Workload for ProductList {
    fn name(&self) -> &'static str {
        "product-list"
    }

    fn about(&self) -> &'static str {
        "browse product pages, a product detail and a category"
    }

    fn profile(&self) -> Option<Profile> {
        Some(Profile::Stress)
    }

    fn thresholds(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        let mut t = common_thresholds(LatencyTier::Fast);
        t.push(("product_list_duration", vec!["p(95)<500"]));
        t.push(("product_detail_duration", vec!["p(95)<300"]));
        t
    }

    fn build(&self, ctx: &RunContext) -> stampede_core::Result<ScenarioFn> {
        let m = Arc::new(Metrics {
            successful: ctx.counter("successful_product_requests")?,
            failed: ctx.counter("failed_product_requests")?,
            list_duration: ctx.trend("product_list_duration")?,
            detail_duration: ctx.trend("product_detail_duration")?,
        });
        Ok(scenario_fn(move |it| iteration(it, m.clone())))
    }

    fn report(&self, summary: &RunSummary) -> String {
        let ok = count(summary, "successful_product_requests");
        let failed = count(summary, "failed_product_requests");
        let rate = success_rate_pct(ok, failed);
        let list_p95 = summary.value_or_zero("product_list_duration", "p(95)");
        let detail_p95 = summary.value_or_zero("product_detail_duration", "p(95)");

        let mut out = String::new();
        banner(&mut out, "Product list");
        writeln!(out, "succeeded: {ok}").ok();
        writeln!(out, "failed: {failed}").ok();
        writeln!(out, "success rate: {rate:.2}%").ok();
        write_latency(&mut out, "list", summary, "product_list_duration");
        write_latency(&mut out, "detail", summary, "product_detail_duration");
        writeln!(
            out,
            "throughput: {:.2} req/s",
            summary.value_or_zero("http_reqs", "rate")
        )
        .ok();

        if rate >= 99.0 && list_p95 < 500.0 && detail_p95 < 300.0 {
            out.push_str("PASS: target met (success >= 99%, list p95 < 500ms, detail p95 < 300ms)\n");
        } else if rate >= 95.0 {
            out.push_str("WARN: response times need work\n");
        } else {
            out.push_str("FAIL: below target (success rate or response time)\n");
        }
        out
    }
}

fn listed_ids(page: Option<&serde_json::Value>) -> Vec<u64> {
    page.and_then(|v| v["content"].as_array())
        .map(|items| items.iter().filter_map(|p| p["id"].as_u64()).collect())
        .unwrap_or_default()
}

async fn iteration(it: Iteration, m: Arc<Metrics>) -> IterationResult {
    let page = random::int_in(0..=4);
    let list = send(
        &it,
        get(&it, "/api/products")
            .query("page", page)
            .query("size", PAGE_SIZE),
    )
    .await;
    m.list_duration.add(list.elapsed_ms());

    let list_body = list.json_if(200);
    it.check(&list)
        .that("product list ok (200)", |r| r.is(200))
        .that("products present", |_| {
            list_body
                .as_ref()
                .and_then(|v| v["content"].as_array())
                .is_some_and(|c| !c.is_empty())
        })
        .that("paging info present", |_| {
            list_body
                .as_ref()
                .is_some_and(|v| v.get("totalElements").is_some())
        })
        .that("list response time < 1s", |r| r.elapsed < Duration::from_secs(1))
        .passed();
    m.tally(&list);

    it.sleep(random::sleep_between(0.5, 1.0)).await;

    let ids = listed_ids(list_body.as_ref());
    let product_id = random::pick(&ids)
        .copied()
        .unwrap_or(FALLBACK_PRODUCT_ID);

    let detail = send(&it, get(&it, &format!("/api/products/{product_id}"))).await;
    m.detail_duration.add(detail.elapsed_ms());

    let product = detail.json_if(200);
    it.check(&detail)
        .that("product detail ok (200)", |r| r.is(200))
        .that("product id matches", |_| {
            product
                .as_ref()
                .is_some_and(|p| p["id"].as_u64() == Some(product_id))
        })
        .that("product info complete", |_| {
            product.as_ref().is_some_and(|p| {
                p["name"].as_str().is_some_and(|n| !n.is_empty()) && p.get("price").is_some()
            })
        })
        .that("detail response time < 500ms", |r| {
            r.elapsed < Duration::from_millis(500)
        })
        .passed();
    m.tally(&detail);

    it.sleep(random::sleep_between(0.5, 1.0)).await;

    let category = send(
        &it,
        get(&it, "/api/products")
            .query("categoryId", random::int_in(1..=5))
            .query("page", 0)
            .query("size", PAGE_SIZE),
    )
    .await;
    it.check(&category)
        .that("category list ok (200)", |r| r.is(200))
        .passed();
    m.tally(&category);

    it.sleep(random::sleep_between(1.0, 3.0)).await;
    Ok(())
}
