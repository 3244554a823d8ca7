use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);
pub const DEFAULT_GRACEFUL_RAMP_DOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// Run-shape overrides from the command line. Set fields win over the scenario's own
/// executor parameters.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub vus: Option<u64>,
    pub duration: Option<Duration>,
    pub iterations: Option<u64>,
}

impl RunConfig {
    pub fn is_empty(&self) -> bool {
        self.vus.is_none() && self.duration.is_none() && self.iterations.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioExecutor {
    /// A fixed number of VUs loop back-to-back until `duration` elapses.
    ConstantVus { vus: u64, duration: Duration },

    /// Ramp the number of active VUs up/down over time.
    RampingVus {
        start_vus: u64,
        stages: Vec<Stage>,
        /// How long a VU above the target may keep running its in-flight iteration.
        graceful_ramp_down: Duration,
    },

    /// A fixed iteration budget shared by up to `vus` workers.
    SharedIterations {
        vus: u64,
        iterations: u64,
        max_duration: Duration,
    },
}

/// Executor kind (the string form used by config files and the CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
pub enum ScenarioExecutorKind {
    #[strum(to_string = "constant-vus", serialize = "constant")]
    ConstantVus,

    #[strum(serialize = "ramping-vus")]
    RampingVus,

    #[strum(serialize = "shared-iterations")]
    SharedIterations,
}

impl ScenarioExecutorKind {
    pub fn parse(raw: &str) -> Result<Self> {
        raw.parse()
            .map_err(|_| Error::InvalidExecutor(raw.to_string()))
    }
}

impl ScenarioExecutor {
    pub fn kind(&self) -> ScenarioExecutorKind {
        match self {
            Self::ConstantVus { .. } => ScenarioExecutorKind::ConstantVus,
            Self::RampingVus { .. } => ScenarioExecutorKind::RampingVus,
            Self::SharedIterations { .. } => ScenarioExecutorKind::SharedIterations,
        }
    }

    /// VUs allocated up front.
    pub fn max_vus(&self) -> u64 {
        match self {
            Self::ConstantVus { vus, .. } | Self::SharedIterations { vus, .. } => *vus,
            Self::RampingVus {
                start_vus, stages, ..
            } => stages
                .iter()
                .map(|s| s.target)
                .max()
                .unwrap_or(0)
                .max(*start_vus),
        }
    }

    /// Time after which no new iteration starts.
    pub fn duration(&self) -> Duration {
        match self {
            Self::ConstantVus { duration, .. } => *duration,
            Self::RampingVus { stages, .. } => stages
                .iter()
                .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration)),
            Self::SharedIterations { max_duration, .. } => *max_duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub name: String,
    pub executor: ScenarioExecutor,
    /// Bound on how long in-flight iterations may run past the scenario deadline.
    pub graceful_stop: Duration,
}

impl ScenarioConfig {
    pub fn new(name: impl Into<String>, executor: ScenarioExecutor) -> Self {
        Self {
            name: name.into(),
            executor,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
        }
    }

    #[must_use]
    pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.graceful_stop = graceful_stop;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let scenario = || self.name.clone();

        match &self.executor {
            ScenarioExecutor::ConstantVus { vus, duration } => {
                if *vus == 0 {
                    return Err(Error::InvalidVus {
                        scenario: scenario(),
                    });
                }
                if duration.is_zero() {
                    return Err(Error::InvalidDuration {
                        scenario: scenario(),
                        field: "duration",
                    });
                }
            }
            ScenarioExecutor::RampingVus { stages, .. } => {
                if stages.is_empty() || stages.iter().any(|s| s.duration.is_zero()) {
                    return Err(Error::InvalidStages {
                        scenario: scenario(),
                    });
                }
                if self.executor.max_vus() == 0 {
                    return Err(Error::InvalidVus {
                        scenario: scenario(),
                    });
                }
            }
            ScenarioExecutor::SharedIterations {
                vus,
                iterations,
                max_duration,
            } => {
                if *vus == 0 {
                    return Err(Error::InvalidVus {
                        scenario: scenario(),
                    });
                }
                if *iterations == 0 {
                    return Err(Error::InvalidIterations {
                        scenario: scenario(),
                    });
                }
                if max_duration.is_zero() {
                    return Err(Error::InvalidDuration {
                        scenario: scenario(),
                        field: "maxDuration",
                    });
                }
            }
        }

        Ok(())
    }

    /// Applies command-line overrides.
    ///
    /// `--iterations` turns any executor into shared-iterations. `--vus`/`--duration`
    /// on a ramping scenario flatten it into constant VUs; the ramp's peak and total
    /// length fill whichever of the two was not given.
    #[must_use]
    pub fn with_overrides(mut self, cfg: &RunConfig) -> Self {
        if cfg.is_empty() {
            return self;
        }

        let max_vus = self.executor.max_vus();
        let duration = self.executor.duration();

        self.executor = match (cfg.iterations, &self.executor) {
            (Some(iterations), _) => ScenarioExecutor::SharedIterations {
                vus: cfg.vus.unwrap_or(max_vus),
                iterations,
                max_duration: cfg.duration.unwrap_or(duration),
            },
            (None, ScenarioExecutor::SharedIterations { iterations, .. }) => {
                ScenarioExecutor::SharedIterations {
                    vus: cfg.vus.unwrap_or(max_vus),
                    iterations: *iterations,
                    max_duration: cfg.duration.unwrap_or(duration),
                }
            }
            (None, _) => ScenarioExecutor::ConstantVus {
                vus: cfg.vus.unwrap_or(max_vus),
                duration: cfg.duration.unwrap_or(duration),
            },
        };

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn ramping() -> ScenarioConfig {
        ScenarioConfig::new(
            "load",
            ScenarioExecutor::RampingVus {
                start_vus: 0,
                stages: vec![
                    Stage::new(secs(60), 50),
                    Stage::new(secs(180), 50),
                    Stage::new(secs(60), 0),
                ],
                graceful_ramp_down: DEFAULT_GRACEFUL_RAMP_DOWN,
            },
        )
    }

    #[test]
    fn executor_kind_parses_known_names() {
        assert_eq!(
            ScenarioExecutorKind::parse("shared-iterations").ok(),
            Some(ScenarioExecutorKind::SharedIterations)
        );
        assert_eq!(
            ScenarioExecutorKind::parse("constant").ok(),
            Some(ScenarioExecutorKind::ConstantVus)
        );
        assert!(matches!(
            ScenarioExecutorKind::parse("per-vu-iterations"),
            Err(Error::InvalidExecutor(_))
        ));
    }

    #[test]
    fn ramping_max_vus_and_duration_come_from_stages() {
        let s = ramping();
        assert_eq!(s.executor.max_vus(), 50);
        assert_eq!(s.executor.duration(), secs(300));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn validation_rejects_degenerate_configs() {
        let bad = [
            ScenarioExecutor::ConstantVus {
                vus: 0,
                duration: secs(1),
            },
            ScenarioExecutor::ConstantVus {
                vus: 1,
                duration: Duration::ZERO,
            },
            ScenarioExecutor::RampingVus {
                start_vus: 1,
                stages: Vec::new(),
                graceful_ramp_down: secs(1),
            },
            ScenarioExecutor::RampingVus {
                start_vus: 1,
                stages: vec![Stage::new(Duration::ZERO, 10)],
                graceful_ramp_down: secs(1),
            },
            ScenarioExecutor::RampingVus {
                start_vus: 0,
                stages: vec![Stage::new(secs(1), 0)],
                graceful_ramp_down: secs(1),
            },
            ScenarioExecutor::SharedIterations {
                vus: 1,
                iterations: 0,
                max_duration: secs(1),
            },
            ScenarioExecutor::SharedIterations {
                vus: 1,
                iterations: 1,
                max_duration: Duration::ZERO,
            },
        ];

        for executor in bad {
            let cfg = ScenarioConfig::new("s", executor.clone());
            assert!(cfg.validate().is_err(), "expected {executor:?} to be rejected");
        }
    }

    #[test]
    fn vus_override_flattens_ramping_into_constant() {
        let cfg = RunConfig {
            vus: Some(5),
            ..RunConfig::default()
        };
        let s = ramping().with_overrides(&cfg);
        assert_eq!(
            s.executor,
            ScenarioExecutor::ConstantVus {
                vus: 5,
                duration: secs(300),
            }
        );
    }

    #[test]
    fn iterations_override_yields_shared_iterations() {
        let cfg = RunConfig {
            iterations: Some(10),
            duration: Some(secs(5)),
            ..RunConfig::default()
        };
        let s = ramping().with_overrides(&cfg);
        assert_eq!(
            s.executor,
            ScenarioExecutor::SharedIterations {
                vus: 50,
                iterations: 10,
                max_duration: secs(5),
            }
        );
    }

    #[test]
    fn shared_iterations_keeps_budget_under_vus_override() {
        let s = ScenarioConfig::new(
            "coupon",
            ScenarioExecutor::SharedIterations {
                vus: 1000,
                iterations: 1000,
                max_duration: secs(30),
            },
        )
        .with_overrides(&RunConfig {
            vus: Some(10),
            ..RunConfig::default()
        });
        assert_eq!(
            s.executor,
            ScenarioExecutor::SharedIterations {
                vus: 10,
                iterations: 1000,
                max_duration: secs(30),
            }
        );
    }

    #[test]
    fn empty_overrides_leave_config_untouched() {
        assert_eq!(ramping().with_overrides(&RunConfig::default()), ramping());
    }
}
