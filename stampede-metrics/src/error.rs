use crate::MetricKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid metric name `{0}` (expected [A-Za-z_][A-Za-z0-9_]*, at most 128 chars)")]
    InvalidName(String),

    #[error("metric `{name}` is already registered as {existing}, not {requested}")]
    KindMismatch {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("metric `{0}` cannot be registered after the run has started")]
    Sealed(String),
}
