use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::FutureExt as _;
use stampede_metrics::{Counter, Gauge};
use tokio::sync::Barrier;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::{ScenarioConfig, ScenarioExecutor};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::gate::IterationGate;
use crate::iteration::{Iteration, ScenarioFn};
use crate::progress::{
    LiveMetrics, ProgressFn, ProgressUpdate, ScenarioProgress, ScenarioProgressEntry,
    StageProgress,
};
use crate::schedule::RampingSchedule;
use crate::signal::StartSignal;
use crate::summary::{RunSummary, ScenarioReport};
use crate::thresholds::{ThresholdSet, evaluate_thresholds};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// A scenario ready to run: its executor config plus the body each iteration runs.
#[derive(Clone)]
pub struct Scenario {
    pub config: ScenarioConfig,
    pub exec: ScenarioFn,
}

impl Scenario {
    pub fn new(config: ScenarioConfig, exec: ScenarioFn) -> Self {
        Self { config, exec }
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
enum VuWork {
    /// Constant VUs (no budget) and shared iterations (budget).
    Gated { gate: Arc<IterationGate> },
    Ramping {
        gate: Arc<IterationGate>,
        schedule: Arc<RampingSchedule>,
        graceful_ramp_down: Duration,
    },
}

#[derive(Clone)]
struct VuContext {
    ctx: Arc<RunContext>,
    scenario: Arc<str>,
    scenario_vu: u64,
    exec: ScenarioFn,
    work: VuWork,
    run_started: Arc<OnceLock<Instant>>,
    ready_barrier: Arc<Barrier>,
    start_signal: Arc<StartSignal>,
}

/// Counts the VU as active in the `vus` gauge while alive.
struct ActiveVuGuard(Gauge);

impl ActiveVuGuard {
    fn enter(gauge: &Gauge) -> Self {
        gauge.increment();
        Self(gauge.clone())
    }
}

impl Drop for ActiveVuGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Marks an iteration as in flight; dropping it before `complete` counts an
/// interruption.
struct InFlightGuard {
    interrupted: Counter,
    done: bool,
}

impl InFlightGuard {
    fn new(interrupted: &Counter) -> Self {
        Self {
            interrupted: interrupted.clone(),
            done: false,
        }
    }

    fn complete(mut self) {
        self.done = true;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.done {
            self.interrupted.increment();
        }
    }
}

struct ScenarioRuntime {
    report: ScenarioReport,
    gate: Arc<IterationGate>,
    progress: ScenarioProgressInfo,
    graceful_stop: Duration,
    handles: Vec<JoinHandle<()>>,
}

#[derive(Clone)]
enum ScenarioProgressInfo {
    ConstantVus {
        vus: u64,
        duration: Duration,
    },
    RampingVus {
        schedule: Arc<RampingSchedule>,
    },
    SharedIterations {
        vus: u64,
        iterations: u64,
        max_duration: Duration,
        gate: Arc<IterationGate>,
    },
}

fn validate(scenarios: &[Scenario]) -> Result<()> {
    if scenarios.is_empty() {
        return Err(Error::NoScenarios);
    }

    let mut names = HashSet::new();
    for s in scenarios {
        s.config.validate()?;
        if !names.insert(s.config.name.as_str()) {
            return Err(Error::DuplicateScenario(s.config.name.clone()));
        }
    }

    Ok(())
}

/// Runs every scenario concurrently against `ctx` and returns the run summary.
///
/// Configs are validated before any VU is spawned. The metric registry is sealed once
/// validation passes. Each scenario stops starting iterations at its deadline; in-flight
/// iterations get `graceful_stop` to finish and are abandoned after that.
pub async fn run_scenarios(
    ctx: Arc<RunContext>,
    scenarios: Vec<Scenario>,
    thresholds: &[ThresholdSet],
    progress: Option<ProgressFn>,
) -> Result<RunSummary> {
    validate(&scenarios)?;
    ctx.seal();

    let total_vus: u64 = scenarios.iter().map(|s| s.config.executor.max_vus()).sum();
    ctx.metrics().vus_max.set(total_vus as i64);

    let ready_barrier = Arc::new(Barrier::new(
        usize::try_from(total_vus).unwrap_or(usize::MAX).saturating_add(1),
    ));
    let start_signal = Arc::new(StartSignal::new());
    let run_started: Arc<OnceLock<Instant>> = Arc::new(OnceLock::new());

    let mut runtimes: Vec<ScenarioRuntime> = Vec::with_capacity(scenarios.len());

    for Scenario { config, exec } in scenarios {
        let report = ScenarioReport::from(&config);
        let (work, gate, progress_info) = match &config.executor {
            ScenarioExecutor::ConstantVus { vus, duration } => {
                let gate = Arc::new(IterationGate::new(None, *duration));
                (
                    VuWork::Gated { gate: gate.clone() },
                    gate,
                    ScenarioProgressInfo::ConstantVus {
                        vus: *vus,
                        duration: *duration,
                    },
                )
            }
            ScenarioExecutor::SharedIterations {
                vus,
                iterations,
                max_duration,
            } => {
                let gate = Arc::new(IterationGate::new(Some(*iterations), *max_duration));
                (
                    VuWork::Gated { gate: gate.clone() },
                    gate.clone(),
                    ScenarioProgressInfo::SharedIterations {
                        vus: *vus,
                        iterations: *iterations,
                        max_duration: *max_duration,
                        gate,
                    },
                )
            }
            ScenarioExecutor::RampingVus {
                start_vus,
                stages,
                graceful_ramp_down,
            } => {
                let schedule = Arc::new(RampingSchedule::new(*start_vus, stages.clone()));
                let gate = Arc::new(IterationGate::new(None, schedule.total_duration()));
                (
                    VuWork::Ramping {
                        gate: gate.clone(),
                        schedule: schedule.clone(),
                        graceful_ramp_down: *graceful_ramp_down,
                    },
                    gate,
                    ScenarioProgressInfo::RampingVus { schedule },
                )
            }
        };

        tracing::debug!(
            scenario = %config.name,
            executor = %config.executor.kind(),
            vus = config.executor.max_vus(),
            duration = ?config.executor.duration(),
            "scenario configured"
        );

        let scenario: Arc<str> = Arc::from(config.name.as_str());
        let vus = config.executor.max_vus();
        let mut handles = Vec::with_capacity(usize::try_from(vus).unwrap_or(0));
        for scenario_vu in 1..=vus {
            let vu = VuContext {
                ctx: ctx.clone(),
                scenario: scenario.clone(),
                scenario_vu,
                exec: exec.clone(),
                work: work.clone(),
                run_started: run_started.clone(),
                ready_barrier: ready_barrier.clone(),
                start_signal: start_signal.clone(),
            };
            handles.push(tokio::spawn(run_vu(vu)));
        }

        runtimes.push(ScenarioRuntime {
            report,
            gate,
            progress: progress_info,
            graceful_stop: config.graceful_stop,
            handles,
        });
    }

    // Every VU task is spawned and parked; spawning stays out of measured time.
    ready_barrier.wait().await;

    let started = Instant::now();
    let _ = run_started.set(started);
    for rt in &runtimes {
        rt.gate.start_at(started);
    }
    start_signal.start();

    tracing::info!(
        scenarios = runtimes.len(),
        vus_max = total_vus,
        "run started"
    );

    let progress_handle = progress.map(|progress| {
        let entries: Vec<(String, ScenarioProgressInfo)> = runtimes
            .iter()
            .map(|rt| (rt.report.name.clone(), rt.progress.clone()))
            .collect();
        tokio::spawn(progress_loop(ctx.clone(), started, entries, progress))
    });

    let joined = join_vus(&mut runtimes, started).await;
    if let Some(h) = progress_handle {
        h.abort();
        let _ = h.await;
    }
    let abandoned = joined?;

    if abandoned > 0 {
        tracing::warn!(
            vus = abandoned,
            "abandoned VUs still running after graceful stop"
        );
    }

    let elapsed = started.elapsed();
    let results = evaluate_thresholds(thresholds, ctx.registry(), elapsed);
    let summary = RunSummary::build(
        elapsed,
        runtimes.into_iter().map(|rt| rt.report).collect(),
        ctx.registry(),
        ctx.checks(),
        results,
    );

    tracing::info!(
        elapsed = ?elapsed,
        iterations = ctx.metrics().iterations.get(),
        passed = summary.passed,
        "run finished"
    );

    Ok(summary)
}

async fn run_vu(vu: VuContext) {
    vu.ready_barrier.wait().await;
    vu.start_signal.wait().await;

    let started = vu.run_started.get().copied().unwrap_or_else(Instant::now);
    let vus_gauge = vu.ctx.metrics().vus.clone();

    match &vu.work {
        VuWork::Gated { gate } => {
            let _active = ActiveVuGuard::enter(&vus_gauge);
            let mut n = 0u64;
            while let Some(idx) = gate.next() {
                let global = gate.budget().map(|_| idx);
                run_iteration(&vu, n, global).await;
                n = n.saturating_add(1);
            }
        }
        VuWork::Ramping {
            gate,
            schedule,
            graceful_ramp_down,
        } => {
            let mut active: Option<ActiveVuGuard> = None;
            let mut n = 0u64;

            while gate.is_open() {
                let elapsed = started.elapsed();
                if vu.scenario_vu > schedule.target_at(elapsed) {
                    active = None;
                    let wait = schedule.next_recheck_in(elapsed, vu.scenario_vu);
                    tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
                    continue;
                }

                if active.is_none() {
                    active = Some(ActiveVuGuard::enter(&vus_gauge));
                }

                // Past the ramp-down point the iteration gets `graceful_ramp_down` to finish.
                let retire_at = schedule
                    .drops_below_at(elapsed, vu.scenario_vu)
                    .map(|at| started + at + *graceful_ramp_down);

                let iteration = run_iteration(&vu, n, None);
                match retire_at {
                    Some(at) => {
                        if tokio::time::timeout_at(at, iteration).await.is_err() {
                            tracing::debug!(
                                scenario = %vu.scenario,
                                vu = vu.scenario_vu,
                                "iteration interrupted by ramp-down"
                            );
                        }
                    }
                    None => iteration.await,
                }
                n = n.saturating_add(1);
            }
        }
    }
}

/// Waits for every VU, aborting those still busy after their scenario's graceful stop.
/// Returns how many were abandoned. A VU task that fails to join stops everything.
async fn join_vus(runtimes: &mut [ScenarioRuntime], started: Instant) -> Result<u64> {
    let mut abandoned = 0u64;
    let mut failed = None;

    'join: for rt in runtimes.iter_mut() {
        let hard_stop = rt.gate.deadline().unwrap_or(started) + rt.graceful_stop;

        for handle in &mut rt.handles {
            match tokio::time::timeout_at(hard_stop, &mut *handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failed = Some(err);
                    break 'join;
                }
                Err(_) => {
                    rt.gate.stop();
                    handle.abort();
                    let _ = handle.await;
                    abandoned += 1;
                }
            }
        }
    }

    match failed {
        None => Ok(abandoned),
        Some(err) => {
            for rt in runtimes.iter() {
                rt.gate.stop();
                rt.handles.iter().for_each(JoinHandle::abort);
            }
            Err(err.into())
        }
    }
}

async fn run_iteration(vu: &VuContext, iteration: u64, global_iteration: Option<u64>) {
    let m = vu.ctx.metrics();
    let in_flight = InFlightGuard::new(&m.iterations_interrupted);

    let it = Iteration::new(
        vu.ctx.clone(),
        vu.scenario.clone(),
        vu.scenario_vu,
        iteration,
        global_iteration,
    );

    let iter_started = Instant::now();
    let outcome = AssertUnwindSafe((vu.exec)(it)).catch_unwind().await;
    in_flight.complete();

    m.iteration_duration.add_duration_ms(iter_started.elapsed());
    m.iterations.increment();

    let error = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err.to_string(),
        Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
    };

    m.iterations_failed.increment();
    vu.ctx.checks().record("iteration", false);
    tracing::warn!(
        scenario = %vu.scenario,
        vu = vu.scenario_vu,
        iteration,
        error = %error,
        "iteration failed"
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

async fn progress_loop(
    ctx: Arc<RunContext>,
    started: Instant,
    scenarios: Vec<(String, ScenarioProgressInfo)>,
    progress: ProgressFn,
) {
    let mut interval = tokio::time::interval_at(started + PROGRESS_INTERVAL, PROGRESS_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let m = ctx.metrics().clone();
    let mut tick: u64 = 0;
    let mut last_at = started;
    let mut last_requests = m.http_reqs.get();
    let mut last_iterations = m.iterations.get();

    loop {
        interval.tick().await;

        tick = tick.saturating_add(1);
        let now = Instant::now();
        let dt = now.duration_since(last_at).as_secs_f64().max(1e-9);
        last_at = now;
        let elapsed = now.duration_since(started);

        let requests_total = m.http_reqs.get();
        let iterations_total = m.iterations.get();
        let rps_now = requests_total.saturating_sub(last_requests) as f64 / dt;
        let iterations_per_sec_now = iterations_total.saturating_sub(last_iterations) as f64 / dt;
        last_requests = requests_total;
        last_iterations = iterations_total;

        let metrics = LiveMetrics {
            rps_now,
            requests_total,
            failed_requests_total: m.http_req_failed.summary().hits,
            bytes_received_total: m.data_received.get(),
            bytes_sent_total: m.data_sent.get(),
            checks_failed_total: ctx.checks().failed_total(),
            iterations_total,
            iterations_per_sec_now,
            iterations_failed_total: m.iterations_failed.get(),
            active_vus: u64::try_from(m.vus.get()).unwrap_or(0),
        };

        let scenarios = scenarios
            .iter()
            .map(|(name, info)| ScenarioProgressEntry {
                name: name.clone(),
                progress: scenario_progress(info, elapsed),
            })
            .collect();

        (progress)(ProgressUpdate {
            tick,
            elapsed,
            metrics,
            scenarios,
        });
    }
}

fn scenario_progress(info: &ScenarioProgressInfo, elapsed: Duration) -> ScenarioProgress {
    match info {
        ScenarioProgressInfo::ConstantVus { vus, duration } => ScenarioProgress::ConstantVus {
            vus: *vus,
            duration: *duration,
        },
        ScenarioProgressInfo::RampingVus { schedule } => ScenarioProgress::RampingVus {
            total_duration: schedule.total_duration(),
            stage: schedule.stage_snapshot_at(elapsed).map(|st| StageProgress {
                stage: st.index + 1,
                stages: st.count,
                stage_elapsed: st.stage_elapsed,
                stage_remaining: st.stage_remaining,
                start_target: st.start_target,
                end_target: st.end_target,
                current_target: st.current_target,
            }),
        },
        ScenarioProgressInfo::SharedIterations {
            vus,
            iterations,
            max_duration,
            gate,
        } => ScenarioProgress::SharedIterations {
            vus: *vus,
            iterations: *iterations,
            claimed: gate.claimed(),
            max_duration: *max_duration,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioExecutorKind;

    fn runtime(handles: Vec<JoinHandle<()>>) -> ScenarioRuntime {
        let gate = Arc::new(IterationGate::new(None, Duration::from_secs(60)));
        ScenarioRuntime {
            report: ScenarioReport {
                name: "join".to_string(),
                executor: ScenarioExecutorKind::ConstantVus,
                vus_max: handles.len() as u64,
                duration: Duration::from_secs(60),
            },
            gate,
            progress: ScenarioProgressInfo::ConstantVus {
                vus: handles.len() as u64,
                duration: Duration::from_secs(60),
            },
            graceful_stop: Duration::from_secs(30),
            handles,
        }
    }

    #[tokio::test]
    async fn failed_vu_task_aborts_the_rest() {
        let started = Instant::now();
        let crashed = tokio::spawn(async { panic!("vu task crashed") });
        let busy = tokio::spawn(std::future::pending::<()>());
        let other = tokio::spawn(std::future::pending::<()>());

        let mut runtimes = vec![runtime(vec![crashed, busy]), runtime(vec![other])];
        for rt in &runtimes {
            rt.gate.start_at(started);
        }

        let res = join_vus(&mut runtimes, started).await;
        assert!(matches!(res, Err(Error::Join(_))), "got {res:?}");

        // The crashed handle has already been consumed.
        runtimes[0].handles.remove(0);
        for rt in &mut runtimes {
            assert!(!rt.gate.is_open());
            for handle in &mut rt.handles {
                let joined = handle.await;
                assert!(
                    joined.as_ref().is_err_and(|e| e.is_cancelled()),
                    "got {joined:?}"
                );
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn finished_vus_join_without_abandoning() {
        let started = Instant::now();
        let handles = vec![tokio::spawn(async {}), tokio::spawn(async {})];
        let mut runtimes = vec![runtime(handles)];
        runtimes[0].gate.start_at(started);

        let abandoned = join_vus(&mut runtimes, started)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(abandoned, 0);
    }
}
