//! Trailing-edge debouncer.
//!
//! Each `schedule` call cancels the pending job and arms a fresh timer. Timers
//! are child tokens of the owner's shutdown token, so cancelling the owner
//! cancels whatever is still waiting.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

pub struct Debouncer {
    delay: Duration,
    runtime: Handle,
    shutdown: CancellationToken,
    pending: Mutex<Option<CancellationToken>>,
}

impl Debouncer {
    pub fn new(delay: Duration, runtime: Handle, shutdown: CancellationToken) -> Self {
        Self {
            delay,
            runtime,
            shutdown,
            pending: Mutex::new(None),
        }
    }

    /// Run `job` once `delay` passes without another call to `schedule` or `cancel`.
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.shutdown.child_token();
        if let Some(previous) = self.pending.lock().replace(token.clone()) {
            previous.cancel();
        }
        if token.is_cancelled() {
            return;
        }

        let delay = self.delay;
        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        job();
                    }
                }
            }
        });
    }

    /// Drop the pending job, if any
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.cancel();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
