//! Cancellable scheduled work bound to a screen lifetime.
//!
//! # Responsibility
//! - Run a step function on a fixed period until it stops or is cancelled.
//! - Track fire-and-forget calls so closing the screen aborts them.
//!
//! # Invariants
//! - The first step runs immediately after spawn.
//! - Late steps are delayed, never bursted, so a slow call pushes the next
//!   poll back instead of queueing several.
//! - Drop cancels.

use log::{debug, error};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

/// Returned by each periodic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskControl {
    Continue,
    Stop,
}

/// Handle to a periodic task. Aborts the task when dropped.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawns `step` on `runtime`, invoked every `period`.
    ///
    /// `period` must be non-zero.
    pub fn spawn<F, Fut>(runtime: &Handle, name: &'static str, period: Duration, mut step: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TaskControl> + Send + 'static,
    {
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if step().await == TaskControl::Stop {
                    break;
                }
            }
            debug!("event=task_exit module=runtime status=ok task={name}");
        });
        debug!(
            "event=task_spawn module=runtime status=ok task={name} period_ms={}",
            period.as_millis()
        );
        Self { name, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True once the step returned `Stop` or the task was aborted.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the task. Same as dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            debug!(
                "event=task_cancel module=runtime status=ok task={}",
                self.name
            );
        }
        self.handle.abort();
    }
}

/// Set of fire-and-forget futures owned by one screen.
///
/// Dropping the scope aborts everything still in flight.
pub struct ScreenScope {
    runtime: Handle,
    tasks: JoinSet<()>,
}

impl ScreenScope {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: JoinSet::new(),
        }
    }

    /// Launches `future` without awaiting it.
    pub fn launch<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.reap();
        self.tasks.spawn_on(future, &self.runtime);
    }

    /// Number of launched futures not yet finished.
    pub fn in_flight(&mut self) -> usize {
        self.reap();
        self.tasks.len()
    }

    /// Aborts every in-flight future.
    pub fn cancel_all(&mut self) {
        self.tasks.abort_all();
    }

    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(err) = result {
                if err.is_panic() {
                    error!("event=scope_task_panic module=runtime status=error");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PeriodicTask, ScreenScope, TaskControl};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::runtime::Handle;

    fn counting_task(period_ms: u64, stop_after: Option<usize>) -> (PeriodicTask, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let task = PeriodicTask::spawn(
            &Handle::current(),
            "counter",
            Duration::from_millis(period_ms),
            move || {
                let seen = Arc::clone(&seen);
                async move {
                    let count = seen.fetch_add(1, Ordering::SeqCst) + 1;
                    match stop_after {
                        Some(limit) if count >= limit => TaskControl::Stop,
                        _ => TaskControl::Continue,
                    }
                }
            },
        );
        (task, counter)
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_runs_immediately_then_on_period() {
        let (_task, counter) = counting_task(100, None);
        tokio::time::sleep(Duration::from_millis(350)).await;
        // t=0, 100, 200, 300
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_task() {
        let (task, counter) = counting_task(100, None);
        tokio::time::sleep(Duration::from_millis(150)).await;
        task.cancel();
        let frozen = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn step_can_stop_task() {
        let (task, counter) = counting_task(10, Some(3));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn scope_cancel_aborts_pending_futures() {
        let mut scope = ScreenScope::new(Handle::current());
        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        scope.launch(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.fetch_add(1, Ordering::SeqCst);
        });
        tokio::task::yield_now().await;
        assert_eq!(scope.in_flight(), 1);

        scope.cancel_all();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(scope.in_flight(), 0);
    }
}
