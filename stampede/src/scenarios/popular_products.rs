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

const TOP_N: usize = 10;

pub(crate) struct PopularProducts;

struct Metrics {
    successful: Counter,
    failed: Counter,
    realtime_duration: Trend,
    stats_duration: Trend,
    db_duration: Trend,
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

impl Workload for PopularProducts {
    fn name(&self) -> &'static str {
        "popular-products"
    }

    fn about(&self) -> &'static str {
        "cached realtime rankings against the database aggregate under a spike"
    }

    fn profile(&self) -> Option<Profile> {
        Some(Profile::Spike)
    }

    fn thresholds(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        let mut t = common_thresholds(LatencyTier::Fast);
        t.push(("redis_popular_duration", vec!["p(95)<100"]));
        t.push(("redis_stats_popular_duration", vec!["p(95)<150"]));
        t.push(("db_popular_duration", vec!["p(95)<500"]));
        t
    }

    fn build(&self, ctx: &RunContext) -> stampede_core::Result<ScenarioFn> {
        let m = Arc::new(Metrics {
            successful: ctx.counter("successful_popular_requests")?,
            failed: ctx.counter("failed_popular_requests")?,
            realtime_duration: ctx.trend("redis_popular_duration")?,
            stats_duration: ctx.trend("redis_stats_popular_duration")?,
            db_duration: ctx.trend("db_popular_duration")?,
        });
        Ok(scenario_fn(move |it| iteration(it, m.clone())))
    }

    fn report(&self, summary: &RunSummary) -> String {
        let ok = count(summary, "successful_popular_requests");
        let failed = count(summary, "failed_popular_requests");
        let rate = success_rate_pct(ok, failed);
        let realtime_p95 = summary.value_or_zero("redis_popular_duration", "p(95)");
        let stats_p95 = summary.value_or_zero("redis_stats_popular_duration", "p(95)");
        let db_p95 = summary.value_or_zero("db_popular_duration", "p(95)");

        let mut out = String::new();
        banner(&mut out, "Popular products");
        writeln!(out, "succeeded: {ok}").ok();
        writeln!(out, "failed: {failed}").ok();
        writeln!(out, "success rate: {rate:.2}%").ok();
        write_latency(&mut out, "realtime (cache)", summary, "redis_popular_duration");
        write_latency(
            &mut out,
            "realtime with stats (cache)",
            summary,
            "redis_stats_popular_duration",
        );
        write_latency(&mut out, "popular (database)", summary, "db_popular_duration");
        writeln!(
            out,
            "throughput: {:.2} req/s",
            summary.value_or_zero("http_reqs", "rate")
        )
        .ok();

        writeln!(
            out,
            "cache is {:.1}x faster than the database (p95)",
            speedup(db_p95, realtime_p95)
        )
        .ok();

        if rate >= 99.0 && realtime_p95 < 100.0 && stats_p95 < 150.0 {
            out.push_str("PASS: cache latency excellent (p95 < 100ms)\n");
        } else if realtime_p95 < 200.0 {
            out.push_str("WARN: cache latency acceptable (p95 < 200ms)\n");
        } else {
            out.push_str("FAIL: cache latency needs work\n");
        }

        if db_p95 < 500.0 {
            out.push_str("PASS: database aggregate excellent (p95 < 500ms)\n");
        } else if db_p95 < 1000.0 {
            out.push_str("WARN: database aggregate acceptable (p95 < 1s)\n");
        } else {
            out.push_str("FAIL: database aggregate needs work\n");
        }
        out
    }
}

/// `db / cache`, or 0 when either side has no samples.
fn speedup(db_p95: f64, cache_p95: f64) -> f64 {
    if db_p95 > 0.0 && cache_p95 > 0.0 {
        db_p95 / cache_p95
    } else {
        0.0
    }
}

fn non_empty_array(v: Option<&serde_json::Value>) -> bool {
    v.and_then(serde_json::Value::as_array)
        .is_some_and(|a| !a.is_empty())
}

async fn iteration(it: Iteration, m: Arc<Metrics>) -> IterationResult {
    let realtime = send(
        &it,
        get(&it, "/api/products/popular/realtime").query("topN", TOP_N),
    )
    .await;
    m.realtime_duration.add(realtime.elapsed_ms());

    let ranked = realtime.json_if(200);
    it.check(&realtime)
        .that("[Redis] request ok (200)", |r| r.is(200))
        .that("[Redis] products present", |_| {
            non_empty_array(ranked.as_ref())
        })
        .that("[Redis] at most topN items", |_| {
            ranked
                .as_ref()
                .and_then(serde_json::Value::as_array)
                .is_some_and(|a| a.len() <= TOP_N)
        })
        .that("[Redis] response time < 200ms", |r| {
            r.elapsed < Duration::from_millis(200)
        })
        .passed();
    m.tally(&realtime);

    it.sleep(random::sleep_between(0.3, 0.7)).await;

    let stats = send(
        &it,
        get(&it, "/api/products/popular/realtime/stats").query("topN", TOP_N),
    )
    .await;
    m.stats_duration.add(stats.elapsed_ms());

    let stats_body = stats.json_if(200);
    it.check(&stats)
        .that("[Redis Stats] request ok (200)", |r| r.is(200))
        .that("[Redis Stats] products present", |_| {
            non_empty_array(stats_body.as_ref())
        })
        .that("[Redis Stats] includes statistics", |_| {
            stats_body
                .as_ref()
                .and_then(|v| v.get(0))
                .is_some_and(|first| {
                    ["product", "salesCount", "rank"]
                        .iter()
                        .all(|k| first.get(k).is_some())
                })
        })
        .that("[Redis Stats] response time < 300ms", |r| {
            r.elapsed < Duration::from_millis(300)
        })
        .passed();
    m.tally(&stats);

    it.sleep(random::sleep_between(0.3, 0.7)).await;

    let db = send(&it, get(&it, "/api/products/popular")).await;
    m.db_duration.add(db.elapsed_ms());

    it.check(&db)
        .that("[DB] request ok (200)", |r| r.is(200))
        .that("[DB] products present", |r| {
            r.json_if(200).is_some_and(|v| v.is_array())
        })
        .that("[DB] response time < 1s", |r| r.elapsed < Duration::from_secs(1))
        .passed();
    m.tally(&db);

    it.sleep(random::sleep_between(1.0, 2.0)).await;
    Ok(())
}
