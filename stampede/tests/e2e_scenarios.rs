use std::process::{Command, Output};

use anyhow::Context as _;
use serde_json::Value;
use stampede_testserver::{TestServer, TestServerOptions};

async fn run_stampede(args: Vec<String>) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_stampede");

    tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .args(&args)
            .env_remove("BASE_URL")
            .env_remove("RUST_LOG")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run stampede binary")
}

fn ensure_success(out: &Output) -> anyhow::Result<()> {
    anyhow::ensure!(
        out.status.success(),
        "stampede failed with {:?}\nstdout:\n{}\nstderr:\n{}",
        out.status.code(),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

/// The last NDJSON line of a `--output json` run.
fn summary_line(out: &Output) -> anyhow::Result<Value> {
    let stdout = String::from_utf8_lossy(&out.stdout);
    let last = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .context("empty stdout")?;

    let v: Value = serde_json::from_str(last).with_context(|| format!("parse summary: {last}"))?;
    anyhow::ensure!(
        v.get("kind").and_then(Value::as_str) == Some("summary"),
        "last line is not a summary: {last}"
    );
    Ok(v)
}

fn metric_value(summary: &Value, metric: &str, key: &str) -> Option<f64> {
    summary
        .get("metrics")?
        .get(metric)?
        .get("values")?
        .get(key)?
        .as_f64()
}

fn owned(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn smoke_single_iteration_passes() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let mut args = owned(&["run", "smoke", "--iterations", "1", "--output", "json"]);
    args.extend(["--base-url".to_string(), server.base_url().to_string()]);
    let out = run_stampede(args).await?;

    let requests = server.stats().requests_total();
    server.shutdown().await;

    ensure_success(&out)?;
    let summary = summary_line(&out)?;
    anyhow::ensure!(
        summary.get("passed").and_then(Value::as_bool) == Some(true),
        "summary should pass: {summary}"
    );
    anyhow::ensure!(
        metric_value(&summary, "iterations", "count") == Some(1.0),
        "expected exactly one iteration: {summary}"
    );
    anyhow::ensure!(requests >= 4, "smoke should hit every endpoint, saw {requests}");
    Ok(())
}

#[tokio::test]
async fn coupon_issue_never_exceeds_stock() -> anyhow::Result<()> {
    let server = TestServer::start_with(TestServerOptions {
        coupon_limit: 3,
        ..TestServerOptions::default()
    })
    .await
    .context("start test server")?;

    let mut args = owned(&[
        "run",
        "coupon-issue",
        "--vus",
        "10",
        "--iterations",
        "10",
        "--output",
        "json",
    ]);
    args.extend(["--base-url".to_string(), server.base_url().to_string()]);
    let out = run_stampede(args).await?;

    let issued_by_server = server.stats().coupons_issued();
    server.shutdown().await;

    ensure_success(&out)?;
    let summary = summary_line(&out)?;

    let issued = metric_value(&summary, "successful_coupon_issues", "count").unwrap_or(0.0);
    let duplicate = metric_value(&summary, "duplicate_issues", "count").unwrap_or(0.0);
    let sold_out = metric_value(&summary, "sold_out_responses", "count").unwrap_or(0.0);
    let failed = metric_value(&summary, "failed_coupon_issues", "count").unwrap_or(0.0);

    anyhow::ensure!(issued as u64 == issued_by_server, "{issued} vs {issued_by_server}");
    anyhow::ensure!(issued <= 3.0, "issued {issued} coupons with stock 3");
    anyhow::ensure!(failed == 0.0, "unexpected failures: {summary}");
    anyhow::ensure!(
        issued + duplicate + sold_out == 10.0,
        "every iteration should land in one bucket: {summary}"
    );
    Ok(())
}

#[tokio::test]
async fn order_create_records_creation_latency() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let mut args = owned(&[
        "run",
        "order-create",
        "--vus",
        "2",
        "--iterations",
        "2",
        "--output",
        "json",
    ]);
    args.extend(["--base-url".to_string(), server.base_url().to_string()]);
    let out = run_stampede(args).await?;

    let orders = server.stats().orders_created();
    server.shutdown().await;

    ensure_success(&out)?;
    let summary = summary_line(&out)?;

    anyhow::ensure!(orders == 2, "expected 2 orders on the server, got {orders}");
    anyhow::ensure!(
        metric_value(&summary, "successful_orders", "count") == Some(2.0),
        "summary: {summary}"
    );
    anyhow::ensure!(
        metric_value(&summary, "order_creation_duration", "count") == Some(2.0),
        "summary: {summary}"
    );
    Ok(())
}

#[tokio::test]
async fn human_output_prints_summary_and_report() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let mut args = owned(&["run", "coupon-issue", "--vus", "2", "--iterations", "2"]);
    args.extend(["--base-url".to_string(), server.base_url().to_string()]);
    let out = run_stampede(args).await?;
    server.shutdown().await;

    ensure_success(&out)?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    for needle in [
        "target: http://",
        "scenario: coupon-issue executor=shared-iterations",
        "metrics",
        "thresholds",
        "=== Coupon issue ===",
        "issued: 2",
    ] {
        anyhow::ensure!(stdout.contains(needle), "missing `{needle}` in:\n{stdout}");
    }
    Ok(())
}

#[tokio::test]
async fn summary_export_writes_json_file() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("out").join("summary.json");

    let mut args = owned(&[
        "run",
        "popular-products",
        "--vus",
        "1",
        "--iterations",
        "1",
        "--output",
        "json",
    ]);
    args.extend([
        "--base-url".to_string(),
        server.base_url().to_string(),
        "--summary-export".to_string(),
        path.display().to_string(),
    ]);
    let out = run_stampede(args).await?;
    server.shutdown().await;

    ensure_success(&out)?;
    let raw = std::fs::read_to_string(&path).context("read exported summary")?;
    let exported: Value = serde_json::from_str(&raw).context("parse exported summary")?;

    anyhow::ensure!(
        exported.get("passed").and_then(Value::as_bool) == Some(true),
        "exported: {exported}"
    );
    anyhow::ensure!(
        metric_value(&exported, "db_popular_duration", "count").is_some(),
        "exported: {exported}"
    );
    Ok(())
}

#[tokio::test]
async fn config_file_overrides_executor() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("tempdir")?;
    let config = dir.path().join("tiny.yaml");
    std::fs::write(
        &config,
        "executor: shared-iterations\nvus: 3\niterations: 6\nmaxDuration: 20s\n",
    )
    .context("write config")?;

    let mut args = owned(&["run", "coupon-issue", "--output", "json"]);
    args.extend([
        "--config".to_string(),
        config.display().to_string(),
        "--base-url".to_string(),
        server.base_url().to_string(),
    ]);
    let out = run_stampede(args).await?;
    server.shutdown().await;

    ensure_success(&out)?;
    let summary = summary_line(&out)?;
    anyhow::ensure!(
        metric_value(&summary, "iterations", "count") == Some(6.0),
        "summary: {summary}"
    );

    let scenario = summary
        .get("scenarios")
        .and_then(|s| s.get(0))
        .context("missing scenario report")?;
    anyhow::ensure!(
        scenario.get("vus_max").and_then(Value::as_u64) == Some(3),
        "scenario: {scenario}"
    );
    Ok(())
}

#[test]
fn list_prints_every_scenario() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_stampede"))
        .arg("list")
        .output()
        .context("run stampede binary")?;
    ensure_success(&out)?;

    let stdout = String::from_utf8_lossy(&out.stdout);
    for name in [
        "smoke",
        "quick-load",
        "coupon-issue",
        "order-create",
        "product-list",
        "popular-products",
    ] {
        anyhow::ensure!(stdout.contains(name), "missing `{name}` in:\n{stdout}");
    }
    anyhow::ensure!(stdout.contains("custom"), "quick-load has no profile:\n{stdout}");
    Ok(())
}
