use std::time::Duration;

use stampede_core::{DEFAULT_GRACEFUL_RAMP_DOWN, ScenarioExecutor, Stage};

/// Named load shapes shared by the built-in scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Profile {
    /// 1 VU for 30s.
    Smoke,
    /// 0 -> 50 VUs over 1m, hold 3m, drain 1m.
    Load,
    /// 0 -> 100 -> 200 VUs with long holds.
    Stress,
    /// 10s idle, 0 -> 500 VUs in 10s, hold 3m, drain 10s.
    Spike,
    /// 1000 VUs sharing 1000 iterations, 30s max.
    CouponIssue,
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn mins(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

fn ramping(stages: Vec<Stage>) -> ScenarioExecutor {
    ScenarioExecutor::RampingVus {
        start_vus: 0,
        stages,
        graceful_ramp_down: DEFAULT_GRACEFUL_RAMP_DOWN,
    }
}

impl Profile {
    pub fn executor(self) -> ScenarioExecutor {
        match self {
            Self::Smoke => ScenarioExecutor::ConstantVus {
                vus: 1,
                duration: secs(30),
            },
            Self::Load => ramping(vec![
                Stage::new(mins(1), 50),
                Stage::new(mins(3), 50),
                Stage::new(mins(1), 0),
            ]),
            Self::Stress => ramping(vec![
                Stage::new(mins(2), 100),
                Stage::new(mins(5), 100),
                Stage::new(mins(2), 200),
                Stage::new(mins(5), 200),
                Stage::new(mins(2), 0),
            ]),
            Self::Spike => ramping(vec![
                Stage::new(secs(10), 0),
                Stage::new(secs(10), 500),
                Stage::new(mins(3), 500),
                Stage::new(secs(10), 0),
            ]),
            Self::CouponIssue => ScenarioExecutor::SharedIterations {
                vus: 1000,
                iterations: 1000,
                max_duration: secs(30),
            },
        }
    }
}
