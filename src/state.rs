//! The state container.
//!
//! `UnlockedState` holds the process-wide channel map and is not itself
//! thread safe — access is only ever through [`State::with_state`], which
//! acquires a [`parking_lot::ReentrantMutex`] and hands the closure a
//! `&mut UnlockedState`. Reentrancy matters because prune and HTTP
//! handlers call shared helper functions that themselves call
//! `with_state`; a plain mutex would deadlock a thread against itself.
//!
//! `ReentrantMutex` only ever yields a shared `&T`, so the cell beneath it
//! is a `RefCell` — the standard pairing for "reentrant lock, mutable
//! access" in safe Rust. The closure must never `.await` — every critical
//! section here is synchronous.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use parking_lot::ReentrantMutex;

use crate::stats::Stats;
use crate::stream::Stream;

/// Raised by [`State::with_state`] when the server has already begun
/// shutting down. Fatal to the calling operation, not to the process.
#[derive(Debug, Clone, Copy)]
pub struct ServerShutdown;

impl fmt::Display for ServerShutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server is shutting down")
    }
}

impl std::error::Error for ServerShutdown {}

impl From<ServerShutdown> for crate::error::Error {
    fn from(_: ServerShutdown) -> Self {
        crate::error::Error::ServerShutdown
    }
}

/// The mutable state guarded by [`State`]. Not thread safe on its own.
pub struct UnlockedState {
    pub streams: HashMap<String, Stream>,
    pub shutdown: bool,
    pub stats: Stats,
}

impl UnlockedState {
    fn new(stats: Stats) -> Self {
        Self {
            streams: HashMap::new(),
            shutdown: false,
            stats,
        }
    }
}

/// A thread-safe wrapper around [`UnlockedState`].
pub struct State {
    inner: ReentrantMutex<RefCell<UnlockedState>>,
}

impl State {
    pub fn new(stats: Stats) -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(UnlockedState::new(stats))),
        }
    }

    /// Acquires the lock and hands `f` a mutable handle, releasing on
    /// every exit path including `f` panicking. Fails once the server has
    /// been marked shut down.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut UnlockedState) -> R) -> Result<R, ServerShutdown> {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        if state.shutdown {
            return Err(ServerShutdown);
        }
        Ok(f(&mut state))
    }

    /// Identical to [`State::with_state`] but callable after shutdown —
    /// only the shutdown coordinator should use this, to flip the flag
    /// and take the final snapshot in one critical section.
    pub fn with_state_during_shutdown<R>(&self, f: impl FnOnce(&mut UnlockedState) -> R) -> R {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_after_shutdown() {
        let state = State::new(Stats::new());
        state.with_state_during_shutdown(|s| s.shutdown = true);
        assert!(state.with_state(|_| ()).is_err());
    }

    #[test]
    fn nested_acquisition_does_not_deadlock() {
        let state = State::new(Stats::new());
        state
            .with_state(|s| {
                s.streams.insert("a".into(), dummy_stream());
                // A helper called from within a handler might re-acquire.
                state.with_state(|inner| inner.streams.len()).unwrap()
            })
            .unwrap();
    }

    fn dummy_stream() -> Stream {
        Stream::new(
            semver::Version::new(1, 0, 0),
            false,
            chrono::Utc::now() + chrono::Duration::seconds(60),
            "sid".into(),
        )
    }
}
