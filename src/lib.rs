//! The remote piping relay: bytes written to a named channel are read
//! back elsewhere. This crate is the server side of it.

pub mod admin;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod http;
pub mod persist;
pub mod prune;
pub mod shutdown;
pub mod state;
pub mod stats;
pub mod stream;
pub mod version;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::Notify;

use crate::admin::nonce::NoncePool;
use crate::config::Config;
use crate::http::AppState;
use crate::state::State;
use crate::stats::Stats;
use crate::version::VersionContract;

/// Loads any saved snapshot, wires up the shared state, and runs the
/// HTTP surface, prune worker, and shutdown coordinator together until a
/// termination signal brings the process down cleanly.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let stats = Stats::new();
    let state = Arc::new(State::new(stats.clone()));

    if let Some(path) = &config.state_file {
        let streams = persist::load_or_empty(path);
        state
            .with_state(|s| s.streams = streams)
            .context("state container refused to accept the loaded snapshot")?;
    }

    let admin_public_key = match &config.admin_pubkey {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading admin public key at {}", path.display()))?;
            Some(
                ssh_key::PublicKey::from_openssh(&contents)
                    .context("parsing admin public key")?,
            )
        }
        None => None,
    };

    let app_state = Arc::new(AppState {
        state: state.clone(),
        stats: stats.clone(),
        contract: VersionContract::new(config.min_version.clone(), config.banned_versions.clone()),
        nonce_pool: NoncePool::new(),
        admin_public_key,
        debug: config.debug,
        state_file: config.state_file.clone(),
        pipe_max_bytes: config.pipe_max_bytes,
    });

    let shutdown_complete = Arc::new(Notify::new());
    {
        let state = state.clone();
        let state_file = config.state_file.clone();
        let shutdown_complete = shutdown_complete.clone();
        tokio::spawn(async move {
            shutdown::wait_and_shutdown(state, state_file).await;
            shutdown_complete.notify_one();
        });
    }

    let prune_handle = tokio::spawn(prune::run(
        state.clone(),
        stats.clone(),
        Duration::from_millis(config.prune_interval_ms),
    ));

    let http_result = http::run_http(config.bind_addr, app_state, async move {
        shutdown_complete.notified().await;
    })
    .await;

    prune_handle.abort();
    http_result
}
