use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// One-shot broadcast used to release every VU at the same instant.
#[derive(Debug, Default)]
pub struct StartSignal {
    started: AtomicBool,
    notify: Notify,
}

impl StartSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub async fn wait(&self) {
        loop {
            // Register interest before checking the flag so a concurrent `start` is
            // never missed.
            let notified = self.notify.notified();
            if self.started.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}
