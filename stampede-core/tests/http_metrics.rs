use std::sync::Arc;
use std::time::Duration;

use stampede_core::http::{ExpectedStatuses, HttpClient, HttpRequest};
use stampede_core::{
    Iteration, IterationResult, RunContext, Scenario, ScenarioConfig, ScenarioExecutor,
    run_scenarios, scenario_fn,
};
use stampede_testserver::{TestServer, TestServerOptions};

fn shared(name: &str, vus: u64, iterations: u64) -> ScenarioConfig {
    ScenarioConfig::new(
        name,
        ScenarioExecutor::SharedIterations {
            vus,
            iterations,
            max_duration: Duration::from_secs(30),
        },
    )
}

async fn issue_coupon(it: Iteration) -> IterationResult {
    let req = HttpRequest::post(it.url("/api/coupons/1/issue"))
        .json(&serde_json::json!({ "userId": it.vu() }))?
        .expect(ExpectedStatuses::only(&[200, 409, 410]));
    let res = it.request(req).await?;

    it.check(&res)
        .that("valid status", |r| matches!(r.status, 200 | 409 | 410))
        .passed();
    Ok(())
}

async fn fetch_missing_product(it: Iteration) -> IterationResult {
    let res = it
        .request(HttpRequest::get(it.url("/api/products/999999")))
        .await?;
    if res.status != 404 {
        return Err(format!("expected 404, got {}", res.status).into());
    }
    Ok(())
}

async fn health(it: Iteration) -> IterationResult {
    it.request(HttpRequest::get(it.url("/actuator/health")))
        .await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn requests_feed_the_builtin_http_metrics() {
    let server = TestServer::start_with(TestServerOptions {
        coupon_limit: 10,
        ..TestServerOptions::default()
    })
    .await
    .unwrap_or_else(|e| panic!("start test server: {e}"));

    let ctx = Arc::new(
        RunContext::new(HttpClient::default(), server.base_url())
            .unwrap_or_else(|e| panic!("context: {e}")),
    );

    let summary = run_scenarios(
        ctx.clone(),
        vec![Scenario::new(shared("coupons", 20, 20), scenario_fn(issue_coupon))],
        &[],
        None,
    )
    .await
    .unwrap_or_else(|e| panic!("run: {e}"));

    assert_eq!(summary.metric_value("http_reqs", "count"), Some(20.0));
    // 409/410 are expected here, so nothing counts as failed.
    assert_eq!(summary.metric_value("http_req_failed", "rate"), Some(0.0));
    assert_eq!(summary.metric_value("http_req_duration", "count"), Some(20.0));
    assert!(summary.value_or_zero("data_sent", "count") > 0.0);
    assert!(summary.value_or_zero("data_received", "count") > 0.0);
    assert_eq!(summary.metric_value("checks", "rate"), Some(1.0));
    assert_eq!(server.stats().coupons_issued(), 10);

    server.shutdown().await;
}

#[tokio::test]
async fn unexpected_statuses_count_as_failed_requests() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start test server: {e}"));

    let ctx = Arc::new(
        RunContext::new(HttpClient::default(), server.base_url())
            .unwrap_or_else(|e| panic!("context: {e}")),
    );

    let summary = run_scenarios(
        ctx.clone(),
        vec![Scenario::new(shared("missing", 1, 3), scenario_fn(fetch_missing_product))],
        &[],
        None,
    )
    .await
    .unwrap_or_else(|e| panic!("run: {e}"));

    assert_eq!(summary.metric_value("http_req_failed", "rate"), Some(1.0));
    assert_eq!(summary.metric_value("http_req_errors", "count"), Some(0.0));
    assert_eq!(ctx.metrics().iterations_failed.get(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn transport_errors_are_recorded_and_returned() {
    // Nothing listens on the discard port.
    let ctx = Arc::new(
        RunContext::new(
            HttpClient::new(Some(Duration::from_millis(500))),
            "http://127.0.0.1:9",
        )
        .unwrap_or_else(|e| panic!("context: {e}")),
    );

    let summary = run_scenarios(
        ctx.clone(),
        vec![Scenario::new(shared("down", 1, 2), scenario_fn(health))],
        &[],
        None,
    )
    .await
    .unwrap_or_else(|e| panic!("run: {e}"));

    assert_eq!(summary.metric_value("http_reqs", "count"), Some(2.0));
    assert_eq!(summary.metric_value("http_req_errors", "count"), Some(2.0));
    assert_eq!(summary.metric_value("http_req_failed", "rate"), Some(1.0));
    assert_eq!(ctx.metrics().iterations_failed.get(), 2);
}
