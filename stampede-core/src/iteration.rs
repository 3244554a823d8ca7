use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt as _;
use futures::future::BoxFuture;
use stampede_http::{HttpRequest, HttpResponse};

use crate::checks::Check;
use crate::context::RunContext;

/// Error returned by a scenario body. Any error type works.
pub type IterationError = Box<dyn std::error::Error + Send + Sync>;
pub type IterationResult = std::result::Result<(), IterationError>;

/// A scenario body: invoked once per iteration.
pub type ScenarioFn = Arc<dyn Fn(Iteration) -> BoxFuture<'static, IterationResult> + Send + Sync>;

/// Wraps an async closure as a [`ScenarioFn`].
pub fn scenario_fn<F, Fut>(f: F) -> ScenarioFn
where
    F: Fn(Iteration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = IterationResult> + Send + 'static,
{
    Arc::new(move |it| f(it).boxed())
}

/// Per-iteration view handed to the scenario body.
#[derive(Debug, Clone)]
pub struct Iteration {
    ctx: Arc<RunContext>,
    scenario: Arc<str>,
    vu: u64,
    iteration: u64,
    global_iteration: Option<u64>,
}

impl Iteration {
    pub fn new(
        ctx: Arc<RunContext>,
        scenario: Arc<str>,
        vu: u64,
        iteration: u64,
        global_iteration: Option<u64>,
    ) -> Self {
        Self {
            ctx,
            scenario,
            vu,
            iteration,
            global_iteration,
        }
    }

    pub fn ctx(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// 1-based VU number within the scenario.
    pub fn vu(&self) -> u64 {
        self.vu
    }

    /// 0-based iteration count of this VU.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Index claimed from a shared iteration budget.
    pub fn global_iteration(&self) -> Option<u64> {
        self.global_iteration
    }

    pub fn url(&self, path: &str) -> String {
        self.ctx.url(path)
    }

    /// Sends `req` and records the HTTP metrics for it.
    ///
    /// A response whose status is outside the request's expected set is returned as
    /// `Ok` but counted in `http_req_failed`.
    pub async fn request(&self, req: HttpRequest) -> stampede_http::Result<HttpResponse> {
        let m = self.ctx.metrics();
        let expected = req.expected.clone().unwrap_or_default();

        let res = self.ctx.client().request(req).await;
        m.http_reqs.increment();

        match &res {
            Ok(r) => {
                m.http_req_duration.add_duration_ms(r.elapsed);
                m.http_req_failed.add(!expected.contains(r.status));
                m.data_sent.add(r.bytes_sent);
                m.data_received.add(r.bytes_received);
            }
            Err(err) => {
                m.http_req_failed.add(true);
                m.http_req_errors.increment();
                tracing::debug!(
                    scenario = %self.scenario,
                    vu = self.vu,
                    phase = %err.phase(),
                    error = %err,
                    "http request failed"
                );
            }
        }

        res
    }

    pub fn check<'a, T: ?Sized>(&'a self, subject: &'a T) -> Check<'a, T> {
        self.ctx.checks().check(subject)
    }

    pub async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}
