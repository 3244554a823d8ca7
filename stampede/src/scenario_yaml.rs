use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use stampede_core::{
    DEFAULT_GRACEFUL_RAMP_DOWN, ScenarioConfig, ScenarioExecutor, ScenarioExecutorKind, Stage,
};

/// Executor parameters and threshold overrides read from `--config`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ScenarioYaml {
    /// Executor kind: constant-vus | ramping-vus | shared-iterations
    pub executor: Option<String>,

    pub vus: Option<u64>,
    pub iterations: Option<u64>,
    pub duration: Option<YamlDuration>,
    pub max_duration: Option<YamlDuration>,
    pub graceful_stop: Option<YamlDuration>,

    // ramping-vus
    #[serde(rename = "startVUs")]
    pub start_vus: Option<u64>,

    #[serde(default)]
    pub stages: Vec<StageYaml>,

    pub graceful_ramp_down: Option<YamlDuration>,

    /// Per-metric threshold expressions; replaces the scenario's built-in set for that
    /// metric.
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdExprYaml>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct StageYaml {
    pub target: u64,

    #[serde(default)]
    pub duration: YamlDuration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let secs = u64::try_from(v).map_err(|_| E::custom("duration must be positive"))?;
                Ok(YamlDuration(Duration::from_secs(secs)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a positive, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }
        }

        deserializer.deserialize_any(V)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ThresholdExprYaml {
    One(String),
    Many(Vec<String>),
}

impl ThresholdExprYaml {
    pub(crate) fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

pub(crate) async fn load(path: &Path) -> anyhow::Result<ScenarioYaml> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    parse(&bytes).with_context(|| format!("failed to parse YAML: {}", path.display()))
}

pub(crate) fn parse(bytes: &[u8]) -> anyhow::Result<ScenarioYaml> {
    // An empty document means "no overrides".
    let doc: Option<ScenarioYaml> = serde_yaml::from_slice(bytes)?;
    Ok(doc.unwrap_or_default())
}

impl ScenarioYaml {
    fn has_executor_fields(&self) -> bool {
        self.executor.is_some()
            || self.vus.is_some()
            || self.iterations.is_some()
            || self.duration.is_some()
            || self.max_duration.is_some()
            || self.start_vus.is_some()
            || !self.stages.is_empty()
            || self.graceful_ramp_down.is_some()
    }

    /// Layers the file's executor fields over `base`. Fields the file leaves out keep the
    /// base value where the executor kinds agree.
    pub(crate) fn apply(&self, mut base: ScenarioConfig) -> anyhow::Result<ScenarioConfig> {
        if let Some(d) = self.graceful_stop {
            base.graceful_stop = d.into_inner();
        }
        if !self.has_executor_fields() {
            return Ok(base);
        }

        let kind = match self.executor.as_deref() {
            Some(raw) => ScenarioExecutorKind::parse(raw)?,
            None => base.executor.kind(),
        };

        let max_vus = base.executor.max_vus();
        let duration = base.executor.duration();
        let stages: Vec<Stage> = self
            .stages
            .iter()
            .map(|s| Stage::new(s.duration.into_inner(), s.target))
            .collect();

        base.executor = match kind {
            ScenarioExecutorKind::ConstantVus => ScenarioExecutor::ConstantVus {
                vus: self.vus.unwrap_or(max_vus),
                duration: self.duration.map_or(duration, YamlDuration::into_inner),
            },
            ScenarioExecutorKind::RampingVus => {
                let (base_start, base_stages, base_ramp_down) = match &base.executor {
                    ScenarioExecutor::RampingVus {
                        start_vus,
                        stages,
                        graceful_ramp_down,
                    } => (*start_vus, stages.clone(), *graceful_ramp_down),
                    _ => (0, Vec::new(), DEFAULT_GRACEFUL_RAMP_DOWN),
                };
                ScenarioExecutor::RampingVus {
                    start_vus: self.start_vus.unwrap_or(base_start),
                    stages: if stages.is_empty() {
                        base_stages
                    } else {
                        stages
                    },
                    graceful_ramp_down: self
                        .graceful_ramp_down
                        .map_or(base_ramp_down, YamlDuration::into_inner),
                }
            }
            ScenarioExecutorKind::SharedIterations => {
                let base_iterations = match &base.executor {
                    ScenarioExecutor::SharedIterations { iterations, .. } => *iterations,
                    _ => 0,
                };
                ScenarioExecutor::SharedIterations {
                    vus: self.vus.unwrap_or(max_vus),
                    iterations: self.iterations.unwrap_or(base_iterations),
                    max_duration: self
                        .max_duration
                        .or(self.duration)
                        .map_or(duration, YamlDuration::into_inner),
                }
            }
        };

        Ok(base)
    }

    pub(crate) fn threshold_overrides(&self) -> BTreeMap<String, Vec<String>> {
        self.thresholds
            .iter()
            .map(|(metric, exprs)| (metric.clone(), exprs.clone().into_vec()))
            .collect()
    }
}
