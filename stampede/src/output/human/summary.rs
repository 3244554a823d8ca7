use std::fmt::Write as _;

use stampede_core::metrics::MetricKind;
use stampede_core::{MetricReport, RunSummary};

use super::format::{format_bytes, format_duration, format_ms, format_pct, format_rate};

const TREND_KEYS: [&str; 7] = ["avg", "min", "med", "max", "p(90)", "p(95)", "p(99)"];

pub(crate) fn render(summary: &RunSummary) -> String {
    let mut out = String::new();

    writeln!(out, "summary ({})", format_duration(summary.duration)).ok();
    for s in &summary.scenarios {
        writeln!(
            out,
            "scenario: {} executor={} vus_max={} duration={}",
            s.name,
            s.executor,
            s.vus_max,
            format_duration(s.duration)
        )
        .ok();
    }
    out.push('\n');

    render_checks(summary, &mut out);
    render_metrics(summary, &mut out);
    render_thresholds(summary, &mut out);

    out
}

fn render_checks(summary: &RunSummary, out: &mut String) {
    if summary.checks.is_empty() {
        return;
    }

    let passes: u64 = summary.checks.iter().map(|c| c.passes).sum();
    let fails: u64 = summary.checks.iter().map(|c| c.fails).sum();
    writeln!(
        out,
        "checks: {} ({passes} passed, {fails} failed)",
        format_pct(summary.value_or_zero("checks", "rate"))
    )
    .ok();

    for c in &summary.checks {
        let mark = if c.fails == 0 { "pass" } else { "FAIL" };
        writeln!(
            out,
            "  {mark} {} ({} passed, {} failed)",
            c.name, c.passes, c.fails
        )
        .ok();
    }
    out.push('\n');
}

fn render_metrics(summary: &RunSummary, out: &mut String) {
    out.push_str("metrics\n");

    let width = summary.metrics.keys().map(String::len).max().unwrap_or(0);
    for (name, report) in &summary.metrics {
        writeln!(out, "  {name:<width$}  {}", metric_line(name, report)).ok();
    }
    out.push('\n');
}

fn metric_line(name: &str, report: &MetricReport) -> String {
    let v = |key: &str| report.value(key).unwrap_or(0.0);

    match report.kind {
        MetricKind::Counter if name.starts_with("data_") => format!(
            "{} ({}/s)",
            format_bytes(v("count") as u64),
            format_bytes(v("rate").round() as u64)
        ),
        MetricKind::Counter => format!("{} ({}/s)", v("count"), format_rate(v("rate"))),
        MetricKind::Gauge => format!("value={} max={}", v("value"), v("max")),
        MetricKind::Rate => match report.value("rate") {
            Some(rate) => format!(
                "{} ({} of {})",
                format_pct(rate),
                v("passes"),
                v("passes") + v("fails")
            ),
            None => "n/a".to_string(),
        },
        MetricKind::Trend => {
            if report.value("avg").is_none() {
                return "n/a (no samples)".to_string();
            }
            let stats = TREND_KEYS
                .iter()
                .map(|k| format!("{k}={}", format_ms(v(k))))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{stats} (n={})", v("count"))
        }
    }
}

fn render_thresholds(summary: &RunSummary, out: &mut String) {
    if summary.thresholds.is_empty() {
        return;
    }

    out.push_str("thresholds\n");
    for t in &summary.thresholds {
        let mark = if t.passed { "pass" } else { "FAIL" };
        match t.observed {
            Some(obs) => writeln!(
                out,
                "  {mark} {}: {} (observed {obs:.4})",
                t.metric, t.expression
            ),
            None => writeln!(out, "  {mark} {}: {} (no data)", t.metric, t.expression),
        }
        .ok();
    }
    out.push('\n');
}
