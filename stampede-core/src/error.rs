pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Metrics(#[from] stampede_metrics::Error),

    #[error("no scenarios to run")]
    NoScenarios,

    #[error("duplicate scenario name `{0}`")]
    DuplicateScenario(String),

    #[error("scenario `{scenario}`: `vus` must be a positive integer")]
    InvalidVus { scenario: String },

    #[error("scenario `{scenario}`: `iterations` must be a positive integer")]
    InvalidIterations { scenario: String },

    #[error("scenario `{scenario}`: `{field}` must be a positive duration")]
    InvalidDuration {
        scenario: String,
        field: &'static str,
    },

    #[error(
        "scenario `{scenario}`: `stages` must be a non-empty array of {{ duration, target }} with positive durations"
    )]
    InvalidStages { scenario: String },

    #[error(
        "invalid `executor` `{0}` (expected `constant-vus`, `ramping-vus`, or `shared-iterations`)"
    )]
    InvalidExecutor(String),

    #[error("invalid threshold `{expression}` for metric `{metric}`: {reason}")]
    InvalidThreshold {
        metric: String,
        expression: String,
        reason: String,
    },
}
