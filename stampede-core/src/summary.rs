use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};
use stampede_metrics::{MetricKind, MetricSummary, MetricValue, Registry};

use crate::checks::{CheckSummary, Checks};
use crate::config::{ScenarioConfig, ScenarioExecutorKind};
use crate::thresholds::{ThresholdResult, per_second};

pub(crate) fn serialize_duration_secs<S: Serializer>(
    d: &Duration,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

fn serialize_kind<S: Serializer>(k: &MetricKind, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(k)
}

fn serialize_executor<S: Serializer>(
    k: &ScenarioExecutorKind,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(k)
}

/// One metric's aggregated values, keyed the k6 way (`count`, `rate`, `p(95)`, ...).
#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    #[serde(rename = "type", serialize_with = "serialize_kind")]
    pub kind: MetricKind,
    pub values: BTreeMap<String, f64>,
}

impl MetricReport {
    fn from_summary(summary: &MetricSummary, elapsed: Duration) -> Self {
        let mut values = BTreeMap::new();
        let mut put = |key: &str, v: Option<f64>| {
            if let Some(v) = v {
                values.insert(key.to_string(), v);
            }
        };

        match &summary.value {
            MetricValue::Counter(count) => {
                put("count", Some(*count as f64));
                put("rate", per_second(*count, elapsed));
            }
            MetricValue::Rate(r) => {
                put("rate", r.rate);
                put("passes", Some(r.hits as f64));
                put("fails", Some(r.misses as f64));
            }
            MetricValue::Gauge { value, max } => {
                put("value", Some(*value as f64));
                put("max", Some(*max as f64));
            }
            MetricValue::Trend(t) => {
                put("count", Some(t.count as f64));
                put("avg", t.avg);
                put("min", t.min);
                put("med", t.med);
                put("max", t.max);
                put("p(90)", t.p90);
                put("p(95)", t.p95);
                put("p(99)", t.p99);
            }
        }

        Self {
            kind: summary.kind,
            values,
        }
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    #[serde(serialize_with = "serialize_executor")]
    pub executor: ScenarioExecutorKind,
    pub vus_max: u64,
    #[serde(serialize_with = "serialize_duration_secs")]
    pub duration: Duration,
}

impl From<&ScenarioConfig> for ScenarioReport {
    fn from(cfg: &ScenarioConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            executor: cfg.executor.kind(),
            vus_max: cfg.executor.max_vus(),
            duration: cfg.executor.duration(),
        }
    }
}

/// End-of-run result: every metric, check tally and threshold verdict.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    #[serde(rename = "duration_secs", serialize_with = "serialize_duration_secs")]
    pub duration: Duration,
    pub scenarios: Vec<ScenarioReport>,
    pub metrics: BTreeMap<String, MetricReport>,
    pub checks: Vec<CheckSummary>,
    pub thresholds: Vec<ThresholdResult>,
    pub passed: bool,
}

impl RunSummary {
    pub fn build(
        duration: Duration,
        scenarios: Vec<ScenarioReport>,
        registry: &Registry,
        checks: &Checks,
        thresholds: Vec<ThresholdResult>,
    ) -> Self {
        let metrics = registry
            .summarize()
            .iter()
            .map(|m| (m.name.clone(), MetricReport::from_summary(m, duration)))
            .collect();

        let passed = thresholds.iter().all(|t| t.passed);

        Self {
            duration,
            scenarios,
            metrics,
            checks: checks.summary(),
            thresholds,
            passed,
        }
    }

    /// `metrics[name].values[key]`, if recorded.
    pub fn metric_value(&self, name: &str, key: &str) -> Option<f64> {
        self.metrics.get(name)?.value(key)
    }

    /// Like [`RunSummary::metric_value`] but 0 when missing.
    pub fn value_or_zero(&self, name: &str, key: &str) -> f64 {
        self.metric_value(name, key).unwrap_or(0.0)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.thresholds.iter().filter(|t| !t.passed)
    }
}
