use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use stampede_metrics::{MetricHandle, Registry, TrendSnapshot};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Ne,
}

impl ThresholdOp {
    fn apply(self, left: f64, right: f64) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Lte => left <= right,
            Self::Gt => left > right,
            Self::Gte => left >= right,
            Self::Eq => left == right,
            Self::Ne => left != right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdAgg {
    Count,
    Rate,
    Avg,
    Min,
    Max,
    Med,
    P(f64),
    Value,
}

impl fmt::Display for ThresholdAgg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count => f.write_str("count"),
            Self::Rate => f.write_str("rate"),
            Self::Avg => f.write_str("avg"),
            Self::Min => f.write_str("min"),
            Self::Max => f.write_str("max"),
            Self::Med => f.write_str("med"),
            Self::P(p) => write!(f, "p({p})"),
            Self::Value => f.write_str("value"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    pub agg: ThresholdAgg,
    pub op: ThresholdOp,
    pub bound: f64,
    /// Expression as written.
    pub source: String,
}

/// All threshold expressions for one metric, parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSet {
    pub metric: String,
    pub expressions: Vec<ThresholdExpr>,
}

impl ThresholdSet {
    pub fn parse<S: AsRef<str>>(metric: impl Into<String>, expressions: &[S]) -> Result<Self> {
        let metric = metric.into();
        let expressions = expressions
            .iter()
            .map(|raw| {
                parse_threshold_expr(raw.as_ref()).map_err(|reason| Error::InvalidThreshold {
                    metric: metric.clone(),
                    expression: raw.as_ref().to_string(),
                    reason,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            metric,
            expressions,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

pub fn parse_threshold_expr(raw: &str) -> std::result::Result<ThresholdExpr, String> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err("empty threshold".to_string());
    }

    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("==", ThresholdOp::Eq),
        ("!=", ThresholdOp::Ne),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (op_pos, op_len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| "missing comparison operator".to_string())?;

    let (left, right_with_op) = s.split_at(op_pos);
    let right = &right_with_op[op_len..];
    if left.is_empty() {
        return Err("missing aggregation".to_string());
    }
    if right.is_empty() {
        return Err("missing bound".to_string());
    }

    let agg = match left.to_ascii_lowercase().as_str() {
        "count" => ThresholdAgg::Count,
        "rate" => ThresholdAgg::Rate,
        "avg" => ThresholdAgg::Avg,
        "min" => ThresholdAgg::Min,
        "max" => ThresholdAgg::Max,
        "med" => ThresholdAgg::Med,
        "value" => ThresholdAgg::Value,
        other => {
            let inner = other
                .strip_prefix("p(")
                .and_then(|v| v.strip_suffix(')'))
                .ok_or_else(|| format!("unknown aggregation `{left}`"))?;
            let p: f64 = inner
                .parse()
                .map_err(|_| format!("invalid percentile `{inner}`"))?;
            if !(0.0..=100.0).contains(&p) {
                return Err(format!("percentile `{inner}` out of range 0..=100"));
            }
            ThresholdAgg::P(p)
        }
    };

    let bound: f64 = right
        .parse()
        .map_err(|_| format!("invalid numeric bound `{right}`"))?;
    if !bound.is_finite() {
        return Err(format!("invalid numeric bound `{right}`"));
    }

    Ok(ThresholdExpr {
        agg,
        op,
        bound,
        source: raw.trim().to_string(),
    })
}

/// Evaluates every expression against the registry. A metric that is not registered, or
/// an aggregation that does not apply to the metric's kind, has no observed value and
/// fails.
pub fn evaluate_thresholds(
    thresholds: &[ThresholdSet],
    registry: &Registry,
    elapsed: Duration,
) -> Vec<ThresholdResult> {
    let mut snapshots: HashMap<&str, TrendSnapshot> = HashMap::new();
    let mut out = Vec::new();

    for set in thresholds {
        let handle = registry.lookup(&set.metric);

        for expr in &set.expressions {
            let observed = handle.as_ref().and_then(|h| match h {
                MetricHandle::Trend(t) => {
                    let snap = snapshots
                        .entry(set.metric.as_str())
                        .or_insert_with(|| t.snapshot());
                    trend_value(snap, expr.agg)
                }
                other => scalar_value(other, expr.agg, elapsed),
            });

            let passed = observed.is_some_and(|v| expr.op.apply(v, expr.bound));
            out.push(ThresholdResult {
                metric: set.metric.clone(),
                expression: expr.source.clone(),
                observed,
                passed,
            });
        }
    }

    out
}

fn trend_value(snap: &TrendSnapshot, agg: ThresholdAgg) -> Option<f64> {
    match agg {
        ThresholdAgg::Avg => snap.avg(),
        ThresholdAgg::Min => snap.min(),
        ThresholdAgg::Max => snap.max(),
        ThresholdAgg::Med => snap.med(),
        ThresholdAgg::P(p) => snap.percentile(p),
        ThresholdAgg::Count => Some(snap.count() as f64),
        ThresholdAgg::Rate | ThresholdAgg::Value => None,
    }
}

fn scalar_value(handle: &MetricHandle, agg: ThresholdAgg, elapsed: Duration) -> Option<f64> {
    match (handle, agg) {
        (MetricHandle::Counter(c), ThresholdAgg::Count) => Some(c.get() as f64),
        (MetricHandle::Counter(c), ThresholdAgg::Rate) => per_second(c.get(), elapsed),

        (MetricHandle::Rate(r), ThresholdAgg::Rate) => r.summary().rate,
        (MetricHandle::Rate(r), ThresholdAgg::Count) => Some(r.summary().total as f64),

        (MetricHandle::Gauge(g), ThresholdAgg::Value) => Some(g.get() as f64),
        (MetricHandle::Gauge(g), ThresholdAgg::Max) => Some(g.peak() as f64),

        _ => None,
    }
}

pub(crate) fn per_second(count: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    (secs > 0.0).then(|| count as f64 / secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(metric: &str, expr: &str) -> Vec<ThresholdSet> {
        vec![ThresholdSet::parse(metric, &[expr]).unwrap_or_else(|e| panic!("{e}"))]
    }

    #[test]
    fn parse_trims_whitespace_and_reads_percentiles() {
        let expr = parse_threshold_expr("  p( 95 )  <  200 ").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.agg, ThresholdAgg::P(95.0));
        assert_eq!(expr.op, ThresholdOp::Lt);
        assert_eq!(expr.bound, 200.0);

        let expr = parse_threshold_expr("p(99.9)<=1").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.agg, ThresholdAgg::P(99.9));
        assert_eq!(expr.op, ThresholdOp::Lte);
    }

    #[test]
    fn parse_reads_every_operator() {
        for (raw, op) in [
            ("count<1", ThresholdOp::Lt),
            ("count<=1", ThresholdOp::Lte),
            ("count>1", ThresholdOp::Gt),
            ("count>=1", ThresholdOp::Gte),
            ("count==1", ThresholdOp::Eq),
            ("count!=1", ThresholdOp::Ne),
        ] {
            let expr = parse_threshold_expr(raw).unwrap_or_else(|e| panic!("{raw}: {e}"));
            assert_eq!(expr.op, op, "{raw}");
        }
    }

    #[test]
    fn parse_rejects_malformed_expressions() {
        for raw in [
            "",
            "rate",
            "<0.1",
            "rate<",
            "p(101)<1",
            "p(x)<1",
            "median<1",
            "rate<abc",
        ] {
            assert!(parse_threshold_expr(raw).is_err(), "expected `{raw}` to fail");
        }

        let err = ThresholdSet::parse("checks", &["rate>0.99", "nope"]);
        assert!(matches!(err, Err(Error::InvalidThreshold { .. })));
    }

    #[test]
    fn rate_threshold_passes_and_fails_on_failure_ratio() {
        let reg = Registry::default();
        let failed = reg.rate("http_req_failed").unwrap_or_else(|e| panic!("{e}"));
        for i in 0..1000 {
            failed.add(i < 5);
        }
        let results = evaluate_thresholds(
            &one("http_req_failed", "rate<0.01"),
            &reg,
            Duration::from_secs(1),
        );
        assert!(results[0].passed);
        assert_eq!(results[0].observed, Some(0.005));

        let reg = Registry::default();
        let failed = reg.rate("http_req_failed").unwrap_or_else(|e| panic!("{e}"));
        for i in 0..1000 {
            failed.add(i < 15);
        }
        let results = evaluate_thresholds(
            &one("http_req_failed", "rate<0.01"),
            &reg,
            Duration::from_secs(1),
        );
        assert!(!results[0].passed);
        assert_eq!(results[0].observed, Some(0.015));
    }

    #[test]
    fn missing_metric_is_unmet() {
        let reg = Registry::default();
        let results = evaluate_thresholds(&one("does_not_exist", "count>=0"), &reg, Duration::ZERO);
        assert_eq!(results.len(), 1);
        assert!(!results[0].passed);
        assert_eq!(results[0].observed, None);
    }

    #[test]
    fn inapplicable_aggregation_is_unmet() {
        let reg = Registry::default();
        reg.counter("successful_orders")
            .unwrap_or_else(|e| panic!("{e}"))
            .add(3);
        let results = evaluate_thresholds(
            &one("successful_orders", "p(95)<200"),
            &reg,
            Duration::from_secs(1),
        );
        assert!(!results[0].passed);
        assert_eq!(results[0].observed, None);
    }

    #[test]
    fn trend_and_counter_aggregations() {
        let reg = Registry::default();
        let t = reg.trend("api_duration").unwrap_or_else(|e| panic!("{e}"));
        for v in 1..=100 {
            t.add(f64::from(v));
        }
        let c = reg.counter("http_reqs").unwrap_or_else(|e| panic!("{e}"));
        c.add(50);

        let sets = vec![
            ThresholdSet::parse(
                "api_duration",
                &["avg==50.5", "min>0", "max<=100", "med<51", "p(95)<100"],
            )
            .unwrap_or_else(|e| panic!("{e}")),
            ThresholdSet::parse("http_reqs", &["count>=50", "rate==10"])
                .unwrap_or_else(|e| panic!("{e}")),
        ];

        let results = evaluate_thresholds(&sets, &reg, Duration::from_secs(5));
        for r in &results {
            assert!(r.passed, "expected pass: {r:?}");
        }
    }

    #[test]
    fn gauge_value_and_max() {
        let reg = Registry::default();
        let g = reg.gauge("vus").unwrap_or_else(|e| panic!("{e}"));
        g.set(10);
        g.set(2);
        let sets = vec![
            ThresholdSet::parse("vus", &["value==2", "max==10"]).unwrap_or_else(|e| panic!("{e}")),
        ];
        let results = evaluate_thresholds(&sets, &reg, Duration::from_secs(1));
        assert!(results.iter().all(|r| r.passed), "{results:?}");
    }
}
