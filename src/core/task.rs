//! Scoped background tasks
//!
//! Heartbeats, reconnect backoff timers and periodic refreshes all run as
//! spawned tokio tasks. Wrapping the `JoinHandle` gives each of them an
//! explicit start/stop pair and guarantees the task is aborted when its owner
//! goes away, so no timer outlives the component that started it.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Shortest period an interval task will run at
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Owned handle to a spawned task; aborts the task on `stop()` or drop
#[derive(Debug, Default)]
pub struct ScopedTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl ScopedTask {
    /// An empty slot with nothing running
    pub fn idle(name: &'static str) -> Self {
        Self { name, handle: None }
    }

    /// Spawn `future`, replacing (and aborting) whatever was running before
    pub fn start<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.stop();
        log::trace!("Starting task '{}'", self.name);
        self.handle = Some(tokio::spawn(future));
    }

    /// Run `tick` every `period`, first tick after one full period.
    /// Periods below [`MIN_INTERVAL`] are raised to it.
    pub fn start_interval<F, Fut>(&mut self, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period < MIN_INTERVAL {
            log::warn!(
                "Task '{}' given a {:?} interval, using {:?}",
                self.name,
                period,
                MIN_INTERVAL
            );
        }
        let period = period.max(MIN_INTERVAL);
        self.start(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick().await;
            }
        });
    }

    /// Run `action` once after `delay`
    pub fn start_after<F>(&mut self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.start(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
    }

    /// Abort the task if one is running. Returns true if something was stopped.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                if was_running {
                    log::trace!("Stopped task '{}'", self.name);
                }
                was_running
            }
            None => false,
        }
    }

    /// Forget the handle without aborting; used by a task that is about to
    /// finish on its own and must not abort itself
    pub fn detach(&mut self) {
        self.handle.take();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.stop();
    }
}
