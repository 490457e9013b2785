//! Bounded concurrent sub-fetches.
//!
//! Used by monitors that need many small remote reads per cycle (one per
//! block height, one per validator). At most `concurrency` fetches run at
//! once. A failed or panicked fetch is logged and dropped; the caller gets
//! whatever succeeded.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run `fetch` over `items` with at most `concurrency` in flight.
///
/// Results come back in input order, minus failures. A concurrency of zero
/// is treated as one. Cancelling `ctx` stops fetches that have not started
/// yet and abandons the ones in flight.
pub async fn fan_out<I, T, F, Fut>(
    ctx: &CancellationToken,
    items: impl IntoIterator<Item = I>,
    concurrency: usize,
    fetch: F,
) -> Vec<T>
where
    I: Debug + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    let fetch = Arc::new(fetch);
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let fetch = Arc::clone(&fetch);
        let permits = Arc::clone(&permits);
        let ctx = ctx.clone();

        set.spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = ctx.cancelled() => return (index, None),
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return (index, None),
                },
            };

            let label = format!("{item:?}");
            let result = tokio::select! {
                biased;
                _ = ctx.cancelled() => return (index, None),
                result = fetch(item) => result,
            };

            match result {
                Ok(value) => (index, Some(value)),
                Err(e) => {
                    warn!(item = %label, error = %e, "sub-fetch failed, dropping");
                    (index, None)
                }
            }
        });
    }

    let mut collected = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, Some(value))) => collected.push((index, value)),
            Ok((_, None)) => {}
            Err(e) => warn!(error = %e, "sub-fetch task aborted"),
        }
    }

    collected.sort_by_key(|(index, _)| *index);
    debug!(succeeded = collected.len(), "fan-out complete");
    collected.into_iter().map(|(_, value)| value).collect()
}
