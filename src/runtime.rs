use std::future::Future;

pub use tokio::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

/// Where controller effects run. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Runtime(Handle);

impl Runtime {
    /// The runtime of the calling context. Panics outside of a tokio runtime.
    pub fn current() -> Self {
        Runtime(Handle::current())
    }

    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Runtime)
    }

    pub fn spawn<F: Future<Output = ()> + Send + 'static>(&self, future: F) -> Effect {
        Effect(self.0.spawn(future))
    }

    /// Runs `future` to completion even if whoever awaits the handle goes away.
    pub fn detach<F, T>(&self, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.0.spawn(future)
    }
}

/// A spawned effect. Dropping it aborts the task.
#[derive(Debug)]
pub struct Effect(JoinHandle<()>);

impl Drop for Effect {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Fixed-period ticker whose first tick lands one `period` from now. A late tick
/// pushes the following ones back instead of bursting to catch up.
pub fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn dropping_effect_aborts_task() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let effect = Runtime::current().spawn({
            let ticks = ticks.clone();
            async move {
                let mut ticker = ticker(Duration::from_millis(10));
                loop {
                    ticker.tick().await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        });
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        drop(effect);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn detached_task_outlives_its_handle() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let handle = Runtime::current().detach(async move {
            let _ = rx.await;
            let _ = done_tx.send(());
        });
        drop(handle);
        let _ = tx.send(());
        assert!(done_rx.await.is_ok());
    }

    #[test]
    fn try_current_outside_runtime() {
        assert!(Runtime::try_current().is_none());
    }
}
