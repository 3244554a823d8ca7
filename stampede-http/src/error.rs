use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Where a request failed. `Build` errors never reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorPhase {
    Build,
    Connect,
    Timeout,
    Exchange,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url `{0}`")]
    InvalidUrl(String),

    #[error("unsupported url scheme in `{0}` (expected http or https)")]
    UnsupportedScheme(String),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("invalid header name: {0}")]
    HeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("json body: {0}")]
    Json(#[source] serde_json::Error),

    #[error("{0}")]
    Send(#[from] hyper_util::client::legacy::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("reading response body: {0}")]
    Body(#[from] hyper::Error),
}

impl Error {
    #[must_use]
    pub fn phase(&self) -> ErrorPhase {
        match self {
            Self::InvalidUrl(_)
            | Self::UnsupportedScheme(_)
            | Self::Request(_)
            | Self::HeaderName(_)
            | Self::HeaderValue(_)
            | Self::Json(_) => ErrorPhase::Build,
            Self::Send(e) if e.is_connect() => ErrorPhase::Connect,
            Self::Timeout(_) => ErrorPhase::Timeout,
            Self::Send(_) | Self::Body(_) => ErrorPhase::Exchange,
        }
    }
}
