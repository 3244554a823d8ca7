pub mod error;
pub mod metrics;
pub mod registry;
pub mod trend;

pub use error::{Error, Result};
pub use metrics::{
    Counter, Gauge, MetricHandle, MetricKind, MetricSummary, MetricValue, Rate, RateSummary,
};
pub use registry::Registry;
pub use trend::{Trend, TrendSnapshot, TrendSummary, percentile};
