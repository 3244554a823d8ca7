use std::time::Duration;

use crate::config::Stage;

const DEFAULT_RECHECK: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct StageSnapshot {
    pub index: usize,
    pub count: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

#[derive(Debug, Clone, Copy)]
struct StageSpan {
    index: usize,
    start: Duration,
    end: Duration,
    start_target: u64,
    end_target: u64,
}

impl StageSpan {
    fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Piecewise-linear VU target over time.
#[derive(Debug, Clone)]
pub struct RampingSchedule {
    start: u64,
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

impl RampingSchedule {
    pub fn new(start: u64, stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            start,
            stages,
            cumulative_ends,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    fn span(&self, idx: usize) -> StageSpan {
        let start = if idx == 0 {
            Duration::ZERO
        } else {
            self.cumulative_ends[idx - 1]
        };
        let start_target = if idx == 0 {
            self.start
        } else {
            self.stages[idx - 1].target
        };
        StageSpan {
            index: idx,
            start,
            end: self.cumulative_ends[idx],
            start_target,
            end_target: self.stages[idx].target,
        }
    }

    /// Stage containing `elapsed`; a boundary belongs to the stage it ends.
    fn locate(&self, elapsed: Duration) -> Option<StageSpan> {
        if self.stages.is_empty() {
            return None;
        }
        let idx = match self
            .cumulative_ends
            .binary_search_by(|end| end.cmp(&elapsed))
        {
            Ok(i) | Err(i) => i.min(self.stages.len() - 1),
        };
        Some(self.span(idx))
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        if elapsed.is_zero() {
            return self.start;
        }
        if elapsed >= self.total_duration() {
            return self.stages.last().map_or(self.start, |s| s.target);
        }

        let Some(span) = self.locate(elapsed) else {
            return self.start;
        };

        let stage_duration = span.duration();
        if stage_duration.is_zero() {
            return span.end_target;
        }

        // Linear interpolation across the stage.
        let start_i = span.start_target as i128;
        let delta = span.end_target as i128 - start_i;
        let num = elapsed.saturating_sub(span.start).as_nanos() as i128;
        let den = stage_duration.as_nanos() as i128;

        let cur = start_i + (delta.saturating_mul(num) / den.max(1));
        cur.clamp(0, u64::MAX as i128) as u64
    }

    pub fn stage_snapshot_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        let clamped = elapsed.min(self.total_duration());
        let span = self.locate(clamped)?;

        let stage_elapsed = clamped.saturating_sub(span.start);
        Some(StageSnapshot {
            index: span.index,
            count: self.stages.len(),
            stage_elapsed,
            stage_remaining: span.duration().saturating_sub(stage_elapsed),
            start_target: span.start_target,
            end_target: span.end_target,
            current_target: self.target_at(clamped),
        })
    }

    /// How long an inactive VU should sleep before checking the target again.
    pub fn next_recheck_in(&self, elapsed: Duration, vu_index: u64) -> Duration {
        if elapsed >= self.total_duration() {
            return Duration::ZERO;
        }
        let Some(span) = self.locate(elapsed) else {
            return DEFAULT_RECHECK;
        };

        if vu_index <= self.target_at(elapsed) {
            return Duration::from_millis(1);
        }

        let until_stage_end = span.end.saturating_sub(elapsed);

        // A non-increasing stage cannot activate this VU before it ends.
        if span.end_target <= span.start_target || vu_index > span.end_target {
            return until_stage_end.min(DEFAULT_RECHECK);
        }

        let start_i = span.start_target as i128;
        let want = vu_index as i128;
        if want <= start_i {
            return Duration::ZERO;
        }

        // Solve start + delta * t / dur >= want for t.
        let delta = span.end_target as i128 - start_i;
        let stage_ns = span.duration().as_nanos() as i128;
        let elapsed_ns = elapsed.saturating_sub(span.start).as_nanos() as i128;

        let needed_ns = ((want - start_i).saturating_mul(stage_ns) / delta).max(0);
        let wait_ns = needed_ns.saturating_sub(elapsed_ns).max(0);
        let wait = Duration::from_nanos(wait_ns.min(u64::MAX as i128) as u64);

        wait.min(DEFAULT_RECHECK)
    }

    /// Earliest point at or after `elapsed` where the target drops below `vu_index`, if
    /// the schedule ever does so.
    pub fn drops_below_at(&self, elapsed: Duration, vu_index: u64) -> Option<Duration> {
        if self.target_at(elapsed) < vu_index {
            return Some(elapsed);
        }
        let first = self.locate(elapsed.min(self.total_duration()))?.index;

        for idx in first..self.stages.len() {
            let span = self.span(idx);
            if span.end_target >= vu_index {
                continue;
            }

            let start_i = span.start_target as i128;
            let want = vu_index as i128;
            if start_i < want {
                return Some(span.start.max(elapsed));
            }

            // cur = start - floor(|delta| * t / dur); cur < want once the floored
            // term reaches start - want + 1.
            let drop = start_i - span.end_target as i128;
            let k = start_i - want + 1;
            let stage_ns = span.duration().as_nanos() as i128;
            let needed_ns = (k.saturating_mul(stage_ns) + drop - 1) / drop;
            let at = span
                .start
                .saturating_add(Duration::from_nanos(needed_ns.min(u64::MAX as i128) as u64));
            return Some(at.max(elapsed));
        }

        None
    }
}
