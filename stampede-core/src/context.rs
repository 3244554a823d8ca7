use std::sync::Arc;

use stampede_http::HttpClient;
use stampede_metrics::{Counter, Gauge, Rate, Registry, Trend};

use crate::checks::Checks;
use crate::error::Result;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Handles for the metrics every run records.
#[derive(Debug, Clone)]
pub struct BuiltinMetrics {
    pub http_reqs: Counter,
    pub http_req_failed: Rate,
    pub http_req_duration: Trend,
    pub http_req_errors: Counter,
    pub data_sent: Counter,
    pub data_received: Counter,
    pub iterations: Counter,
    pub iteration_duration: Trend,
    pub iterations_failed: Counter,
    pub iterations_interrupted: Counter,
    pub checks: Rate,
    pub vus: Gauge,
    pub vus_max: Gauge,
}

impl BuiltinMetrics {
    fn register(registry: &Registry) -> Result<Self> {
        Ok(Self {
            http_reqs: registry.counter("http_reqs")?,
            http_req_failed: registry.rate("http_req_failed")?,
            http_req_duration: registry.trend("http_req_duration")?,
            http_req_errors: registry.counter("http_req_errors")?,
            data_sent: registry.counter("data_sent")?,
            data_received: registry.counter("data_received")?,
            iterations: registry.counter("iterations")?,
            iteration_duration: registry.trend("iteration_duration")?,
            iterations_failed: registry.counter("iterations_failed")?,
            iterations_interrupted: registry.counter("iterations_interrupted")?,
            checks: registry.rate("checks")?,
            vus: registry.gauge("vus")?,
            vus_max: registry.gauge("vus_max")?,
        })
    }
}

/// Everything a run shares across VUs: metrics, check tallies and the HTTP client.
#[derive(Debug)]
pub struct RunContext {
    registry: Arc<Registry>,
    metrics: BuiltinMetrics,
    checks: Checks,
    client: HttpClient,
    base_url: Arc<str>,
}

impl RunContext {
    pub fn new(client: HttpClient, base_url: impl AsRef<str>) -> Result<Self> {
        let registry = Arc::new(Registry::default());
        let metrics = BuiltinMetrics::register(&registry)?;
        let checks = Checks::new(metrics.checks.clone());

        Ok(Self {
            registry,
            metrics,
            checks,
            client,
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn metrics(&self) -> &BuiltinMetrics {
        &self.metrics
    }

    pub fn checks(&self) -> &Checks {
        &self.checks
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url` joined with an absolute path (`/api/...`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn counter(&self, name: &str) -> Result<Counter> {
        Ok(self.registry.counter(name)?)
    }

    pub fn trend(&self, name: &str) -> Result<Trend> {
        Ok(self.registry.trend(name)?)
    }

    pub fn rate(&self, name: &str) -> Result<Rate> {
        Ok(self.registry.rate(name)?)
    }

    pub fn gauge(&self, name: &str) -> Result<Gauge> {
        Ok(self.registry.gauge(name)?)
    }

    /// Freezes metric registration; called when the run starts.
    pub fn seal(&self) {
        self.registry.seal();
    }
}
