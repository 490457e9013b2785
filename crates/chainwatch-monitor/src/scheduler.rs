//! Scheduler: one repeating task per registered monitor.
//!
//! Every task shares the root `CancellationToken`, which is also the
//! context handed to each handler call. Cancelling it stops the timers and
//! aborts in-flight remote calls.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::Registry;

/// Smallest period accepted by [`RepeatingTask`].
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A unit of work repeated at a fixed period until cancelled.
///
/// The first run happens one period after [`RepeatingTask::run`] is
/// called. Work is awaited inline, so runs never overlap; ticks that come
/// due while a run is still going are skipped rather than queued.
#[derive(Debug, Clone)]
pub struct RepeatingTask {
    name: String,
    period: Duration,
}

impl RepeatingTask {
    pub fn new(name: impl Into<String>, period: Duration) -> Self {
        Self {
            name: name.into(),
            period: period.max(MIN_PERIOD),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Drive `work` until `ctx` is cancelled. Errors are logged and the
    /// next tick proceeds as usual.
    pub async fn run<F, Fut>(self, ctx: CancellationToken, mut work: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(monitor = %self.name, period = ?self.period, "repeating task started");

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            match work().await {
                Ok(()) => debug!(
                    monitor = %self.name,
                    elapsed = ?started.elapsed(),
                    "poll complete"
                ),
                Err(e) => warn!(
                    monitor = %self.name,
                    error = %format!("{e:#}"),
                    "poll failed"
                ),
            }
        }

        debug!(monitor = %self.name, "repeating task stopped");
    }
}

/// Owns the background tasks of all registered monitors.
pub struct Scheduler {
    tasks: JoinSet<()>,
}

impl Scheduler {
    /// Spawn one [`RepeatingTask`] per monitor in `registry`.
    pub fn start(registry: &Registry, interval: Duration, ctx: &CancellationToken) -> Self {
        let mut tasks = JoinSet::new();

        for monitor in registry.monitors() {
            let task = RepeatingTask::new(monitor.name(), interval);
            let monitor = monitor.clone();
            let ctx = ctx.clone();

            tasks.spawn(async move {
                let handler_ctx = ctx.clone();
                task.run(ctx, move || {
                    let monitor = monitor.clone();
                    let ctx = handler_ctx.clone();
                    async move { monitor.handler(&ctx).await }
                })
                .await;
            });
        }

        info!(monitors = tasks.len(), interval = ?interval, "scheduler started");
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task to finish. Tasks only finish once the token
    /// passed to [`Scheduler::start`] is cancelled.
    pub async fn join(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "monitor task ended abnormally");
            }
        }
        info!("scheduler stopped");
    }
}
