//! The shutdown coordinator.
//!
//! Installs both a `SIGTERM`/`SIGINT` listener and, ultimately, the exit
//! path itself: the coordinator flips the shutdown flag exactly once and
//! saves a snapshot. A second invocation observes the flag already set
//! and is rejected rather than saving twice.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Error;
use crate::state::State;

/// Runs the graceful-shutdown sequence: mark the state shut down and, if
/// a state file was configured, persist a snapshot. Idempotent in the
/// sense that a second call observes `shutdown` already set and returns
/// `Err(Error::ServerShutdown)` instead of saving twice.
pub fn shutdown(state: &State, state_file: Option<&PathBuf>) -> Result<(), Error> {
    let already_shut_down = state.with_state_during_shutdown(|s| {
        let was_shutdown = s.shutdown;
        s.shutdown = true;
        was_shutdown
    });

    if already_shut_down {
        return Err(Error::ServerShutdown);
    }

    if let Some(path) = state_file {
        state.with_state_during_shutdown(|s| {
            if let Err(e) = crate::persist::save(s, path) {
                tracing::error!(error = %e, "failed to save snapshot on shutdown");
            } else {
                tracing::info!(channels = s.streams.len(), path = %path.display(), "state saved successfully");
            }
        });
    }

    Ok(())
}

/// Waits for a termination signal (`SIGTERM` or `Ctrl-C`), then runs
/// [`shutdown`] once. Spawned as its own task so the HTTP server future
/// can be raced against it in `main`.
pub async fn wait_and_shutdown(state: Arc<State>, state_file: Option<PathBuf>) {
    let sigterm = async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            term.recv().await;
        }
        #[cfg(not(unix))]
        {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = sigterm => tracing::info!("received SIGTERM"),
        _ = tokio::signal::ctrl_c() => tracing::info!("received ctrl-c"),
    }

    if let Err(e) = shutdown(&state, state_file.as_ref()) {
        tracing::debug!(error = %e, "shutdown already in progress");
    }
}
