//! The prune worker: a periodic `tokio` task, not a dedicated OS thread —
//! this crate's HTTP surface is already tokio/axum-based, so staying on
//! one runtime avoids mixing concurrency models for no benefit. Each tick
//! evicts expired or drained-and-unread channels one at a time, yielding
//! between channels so a long sweep never starves a waiting handler for
//! the state lock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::state::State;
use crate::stats::Stats;

pub async fn run(state: Arc<State>, stats: Stats, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        sweep_once(&state, &stats).await;
    }
}

/// One sweep over the channel map, evicting anything expired or drained.
/// Exposed separately from [`run`] so tests can drive a single pass
/// deterministically instead of racing a timer.
pub async fn sweep_once(state: &State, stats: &Stats) {
    let now = Utc::now();
    // Collect names to evict under one short critical section, then evict
    // them one at a time so we never hold the lock for the whole sweep.
    let to_evict = match state.with_state(|s| {
        s.streams
            .iter()
            .filter(|(_, stream)| stream.is_expired(now) || stream.is_drained())
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>()
    }) {
        Ok(names) => names,
        Err(_) => return,
    };

    for name in to_evict {
        let evicted = state
            .with_state(|s| {
                // Re-check under lock: a reader/writer may have mutated
                // the stream between the scan above and this eviction.
                let still_eligible = s
                    .streams
                    .get(&name)
                    .map(|stream| stream.is_expired(now) || stream.is_drained())
                    .unwrap_or(false);
                if still_eligible {
                    s.streams.remove(&name);
                }
                still_eligible
            })
            .unwrap_or(false);

        if evicted {
            stats.record_stream_expired();
            stats.forget_channel(&name);
            tracing::debug!(channel = %name, "pruned channel");
        }

        tokio::task::yield_now().await;
    }
}
