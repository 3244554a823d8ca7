use std::sync::Arc;

use parking_lot::Mutex;

/// Append-only sample collection. Statistics are computed at read time over every
/// sample recorded so far.
#[derive(Debug, Clone, Default)]
pub struct Trend(Arc<Mutex<Vec<f64>>>);

impl Trend {
    /// Records a sample. Non-finite values are ignored.
    #[inline]
    pub fn add(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.0.lock().push(value);
    }

    pub fn add_duration_ms(&self, d: std::time::Duration) {
        self.add(d.as_secs_f64() * 1000.0);
    }

    pub fn count(&self) -> usize {
        self.0.lock().len()
    }

    /// Copies and sorts the current samples. The lock is held only for the copy.
    pub fn snapshot(&self) -> TrendSnapshot {
        let mut sorted = self.0.lock().clone();
        sorted.sort_unstable_by(f64::total_cmp);
        TrendSnapshot { sorted }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrendSnapshot {
    sorted: Vec<f64>,
}

impl TrendSnapshot {
    pub fn count(&self) -> u64 {
        self.sorted.len() as u64
    }

    pub fn min(&self) -> Option<f64> {
        self.sorted.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.sorted.last().copied()
    }

    pub fn avg(&self) -> Option<f64> {
        if self.sorted.is_empty() {
            return None;
        }
        Some(self.sorted.iter().sum::<f64>() / self.sorted.len() as f64)
    }

    pub fn med(&self) -> Option<f64> {
        self.percentile(50.0)
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        percentile(&self.sorted, p)
    }

    pub fn summary(&self) -> TrendSummary {
        TrendSummary {
            count: self.count(),
            avg: self.avg(),
            min: self.min(),
            med: self.med(),
            max: self.max(),
            p90: self.percentile(90.0),
            p95: self.percentile(95.0),
            p99: self.percentile(99.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrendSummary {
    pub count: u64,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub med: Option<f64>,
    pub max: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

/// Percentile over ascending `sorted` samples using linear interpolation between
/// closest ranks. `p` is clamped to `[0, 100]`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    if p.is_nan() {
        return None;
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    let a = sorted[lo.min(last)];
    let b = sorted[hi.min(last)];
    Some(a + (b - a) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_trend_has_no_stats() {
        let s = Trend::default().snapshot().summary();
        assert_eq!(s.count, 0);
        assert!(s.avg.is_none());
        assert!(s.min.is_none());
        assert!(s.max.is_none());
        assert!(s.p95.is_none());
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let samples = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&samples, 0.0), Some(10.0));
        assert_eq!(percentile(&samples, 100.0), Some(40.0));
        assert_eq!(percentile(&samples, 50.0), Some(25.0));
        // rank = 0.9 * 3 = 2.7 -> 30 + 10 * 0.7
        let p90 = percentile(&samples, 90.0).unwrap_or_default();
        assert!((p90 - 37.0).abs() < 1e-9, "p90={p90}");
    }

    #[test]
    fn single_sample_is_every_percentile() {
        assert_eq!(percentile(&[7.0], 0.0), Some(7.0));
        assert_eq!(percentile(&[7.0], 95.0), Some(7.0));
        assert_eq!(percentile(&[7.0], 100.0), Some(7.0));
    }

    #[test]
    fn trend_ignores_non_finite_samples() {
        let t = Trend::default();
        t.add(1.0);
        t.add(f64::NAN);
        t.add(f64::INFINITY);
        t.add(3.0);
        let s = t.snapshot().summary();
        assert_eq!(s.count, 2);
        assert_eq!(s.avg, Some(2.0));
    }

    #[test]
    fn snapshot_sorts_unordered_samples() {
        let t = Trend::default();
        for v in [5.0, 1.0, 4.0, 2.0, 3.0] {
            t.add(v);
        }
        let snap = t.snapshot();
        assert_eq!(snap.min(), Some(1.0));
        assert_eq!(snap.max(), Some(5.0));
        assert_eq!(snap.med(), Some(3.0));
    }

    #[test]
    fn duration_samples_are_recorded_in_milliseconds() {
        let t = Trend::default();
        t.add_duration_ms(std::time::Duration::from_micros(1500));
        assert_eq!(t.snapshot().max(), Some(1.5));
    }
}
