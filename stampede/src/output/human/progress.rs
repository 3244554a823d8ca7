use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Where a scenario's bar sits: elapsed time against its deadline, or claimed
/// iterations against its budget.
#[derive(Debug, Clone, Copy)]
pub(crate) enum BarPosition {
    Time { elapsed: Duration, total: Duration },
    Count { done: u64, total: u64 },
}

impl BarPosition {
    fn length_and_position(self) -> (u64, u64) {
        match self {
            Self::Time { elapsed, total } => {
                let total_ms = total.as_millis() as u64;
                let elapsed_ms = elapsed.as_millis() as u64;
                (total_ms, elapsed_ms.min(total_ms))
            }
            Self::Count { done, total } => (total, done.min(total)),
        }
    }
}

pub(crate) struct HumanProgress {
    inner: Mutex<Inner>,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        let multi = MultiProgress::new();
        multi.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));

        Self {
            inner: Mutex::new(Inner {
                multi,
                bars: HashMap::new(),
            }),
        }
    }

    pub(crate) fn update(&self, scenario: &str, position: BarPosition, message: String) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let pb = inner.get_or_create_bar(scenario);
        pb.set_message(message);

        let (len, pos) = position.length_and_position();
        pb.set_length(len);
        pb.set_position(pos);
    }

    pub(crate) fn finish(&self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for (_, pb) in inner.bars.drain() {
            pb.finish_and_clear();
        }

        let _ = inner.multi.clear();
    }
}

struct Inner {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl Inner {
    fn get_or_create_bar(&mut self, scenario: &str) -> &ProgressBar {
        let multi = &self.multi;
        self.bars.entry(scenario.to_string()).or_insert_with(|| {
            let pb = multi.add(ProgressBar::new(0));
            pb.set_style(bar_style());
            pb.set_prefix(scenario.to_string());
            pb
        })
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}
