use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

/// `--log-level` wins, then `RUST_LOG`, then [`DEFAULT_FILTER`].
fn filter(level: Option<&str>) -> anyhow::Result<EnvFilter> {
    match level {
        Some(raw) => EnvFilter::try_new(raw)
            .map_err(|err| anyhow::anyhow!("invalid --log-level `{raw}`: {err}")),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Installs the stderr subscriber. Stdout stays reserved for summaries and NDJSON.
pub(crate) fn init(level: Option<&str>) -> anyhow::Result<()> {
    let filter = filter(level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install log subscriber: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_levels_parse() {
        assert!(filter(Some("debug")).is_ok());
        assert!(filter(Some("stampede=trace,warn")).is_ok());
    }

    #[test]
    fn malformed_level_is_rejected() {
        assert!(filter(Some("stampede=loud")).is_err());
    }
}
