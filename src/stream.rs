//! The per-channel in-memory record.

use std::collections::VecDeque;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

/// Observable state of a [`Stream`]. `Empty` has no corresponding value —
/// it's the absence of an entry in the channel map — so it only appears
/// on the [`State`](crate::state::State) side of this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Draining,
    Exhausted,
    Locked,
}

/// A live channel. One of these exists for as long as its name is a key
/// in the state container's map.
///
/// `data` is excluded from the snapshot's per-stream JSON metadata (it is
/// written separately as a run of length-prefixed blocks, see
/// [`crate::codec`]) so it is skipped by `serde` here and threaded through
/// [`crate::persist`] by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub version: Version,
    pub encrypted: bool,
    pub expire: DateTime<Utc>,
    pub stream_id: String,
    pub reader_id: Option<String>,
    #[serde(skip)]
    pub data: VecDeque<Bytes>,
    #[serde(rename = "final")]
    pub final_: bool,
    pub locked: bool,
    pub upload_complete: bool,
}

impl Stream {
    pub fn new(version: Version, encrypted: bool, expire: DateTime<Utc>, stream_id: String) -> Self {
        Self {
            version,
            encrypted,
            expire,
            stream_id,
            reader_id: None,
            data: VecDeque::new(),
            final_: false,
            locked: false,
            upload_complete: false,
        }
    }

    /// Total bytes currently queued, for the `PIPE_MAX_BYTES` invariant and
    /// `GET /q/{C}` metadata.
    pub fn queued_bytes(&self) -> usize {
        self.data.iter().map(|b| b.len()).sum()
    }

    pub fn state(&self) -> StreamState {
        if self.locked {
            StreamState::Locked
        } else if !self.final_ {
            StreamState::Open
        } else if !self.data.is_empty() {
            StreamState::Draining
        } else {
            StreamState::Exhausted
        }
    }

    /// True once the stream has no more blocks to give out and the writer
    /// has signalled end-of-stream: eligible for prune sweep eviction.
    pub fn is_drained(&self) -> bool {
        matches!(self.state(), StreamState::Exhausted)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire
    }

    /// Appends a block if `candidate_id` matches this stream's `stream_id`
    /// and the stream isn't already final. Returns the conflict/wait
    /// rejection the caller should translate into a wire response.
    pub fn append(&mut self, candidate_id: &str, block: Bytes, max_bytes: usize) -> Result<(), crate::error::UploadEc> {
        if candidate_id != self.stream_id {
            return Err(crate::error::UploadEc::Conflict);
        }
        if self.final_ {
            return Err(crate::error::UploadEc::Conflict);
        }
        if self.queued_bytes() + block.len() > max_bytes {
            return Err(crate::error::UploadEc::Wait);
        }
        self.data.push_back(block);
        Ok(())
    }

    /// Marks the stream final. Monotonic: calling this twice is a no-op,
    /// never clears the flag.
    pub fn mark_final(&mut self) {
        self.final_ = true;
        self.upload_complete = true;
    }
}
