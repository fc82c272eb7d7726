//! The statistics collector: a cheaply-`Clone`-able handle around an
//! `Arc` of atomic counters, read without locking. Deliberately not
//! persisted, so it carries no load/save methods and no background
//! flush thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// Why a request was rejected, for the per-kind rejection counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Conflict,
    Wait,
    TooBig,
    WrongVersion,
    NoData,
    Locked,
    IllegalVersion,
    AdminDenied,
}

#[derive(Debug, Default, Serialize)]
pub struct ChannelStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

#[derive(Default)]
struct GlobalCounters {
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    streams_created: AtomicU64,
    streams_expired: AtomicU64,
    rejections: Mutex<HashMap<RejectionKind, u64>>,
}

#[derive(Default)]
struct StatsInner {
    global: GlobalCounters,
    channels: Mutex<HashMap<String, ChannelStats>>,
}

#[derive(Clone, Default)]
pub struct Stats {
    inner: Arc<StatsInner>,
}

#[derive(Debug, Serialize)]
pub struct StatsSnapshot {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub streams_created: u64,
    pub streams_expired: u64,
    pub rejections: HashMap<RejectionKind, u64>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_write(&self, channel: &str, n: u64) {
        self.inner.global.bytes_in.fetch_add(n, Ordering::Relaxed);
        let mut channels = self.inner.channels.lock();
        channels.entry(channel.to_string()).or_default().bytes_in += n;
    }

    pub fn record_read(&self, channel: &str, n: u64) {
        self.inner.global.bytes_out.fetch_add(n, Ordering::Relaxed);
        let mut channels = self.inner.channels.lock();
        channels.entry(channel.to_string()).or_default().bytes_out += n;
    }

    pub fn record_stream_created(&self) {
        self.inner.global.streams_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_expired(&self) {
        self.inner.global.streams_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, kind: RejectionKind) {
        *self.inner.global.rejections.lock().entry(kind).or_insert(0) += 1;
    }

    pub fn forget_channel(&self, channel: &str) {
        self.inner.channels.lock().remove(channel);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_in: self.inner.global.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.inner.global.bytes_out.load(Ordering::Relaxed),
            streams_created: self.inner.global.streams_created.load(Ordering::Relaxed),
            streams_expired: self.inner.global.streams_expired.load(Ordering::Relaxed),
            rejections: self.inner.global.rejections.lock().clone(),
        }
    }
}
