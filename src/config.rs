//! Server configuration.
//!
//! A plain value type, built once from parsed CLI flags by
//! `config_from_args` in `main.rs`.

use std::net::SocketAddr;
use std::path::PathBuf;

use semver::Version;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub state_file: Option<PathBuf>,
    pub admin_pubkey: Option<PathBuf>,
    pub debug: bool,
    pub prune_interval_ms: u64,
    pub pipe_max_bytes: usize,
    pub min_version: Version,
    pub banned_versions: Vec<Version>,
}
