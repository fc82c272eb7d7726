//! Process-wide constants shared by the streaming engine.

use once_cell::sync::Lazy;
use semver::Version;

/// Soft cap on the number of bytes a single channel may have queued at once.
///
/// Writes that would push a channel over this limit are rejected with
/// an `UploadEc::Wait` response rather than accepted and buffered.
pub const PIPE_MAX_BYTES: usize = 16 * 1024 * 1024;

/// Oldest snapshot format this server will load. Files stamped with an
/// older version are refused rather than partially interpreted.
pub static MIN_SAVE_STATE_VERSION: Lazy<Version> = Lazy::new(|| Version::new(8, 1, 0));

/// Default tick period for the prune worker.
pub const DEFAULT_PRUNE_INTERVAL_MS: u64 = 500;

/// Default per-request handler timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Soft cap on a single block's size, reported to writers as `max_size`.
/// Distinct from [`PIPE_MAX_BYTES`]: this bounds one chunk, the other
/// bounds the whole queued backlog.
pub const MAX_BLOCK_BYTES: usize = 1024 * 1024;

/// Channel lifetime applied when a `POST` omits `ttl`.
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// How many nonces `GET /admin/uid` mints when the caller omits `count`.
pub const DEFAULT_ADMIN_NONCE_BATCH: usize = 1;
