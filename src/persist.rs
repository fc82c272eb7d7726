//! The snapshot persistor: length-prefixed framing, restrictive umask,
//! and a version gate on load.
//!
//! A save always goes to a temp file first, which is removed on any
//! error and atomically renamed into place on success, rather than
//! truncating the real snapshot file in place.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::Path;

use bytes::Bytes;
use nix::sys::stat::{umask, Mode};
use semver::Version;

use crate::codec::{read_frame, read_line, write_frame, write_line};
use crate::state::UnlockedState;
use crate::stream::Stream;

/// Scoped umask restriction; restores the previous mask on drop regardless
/// of how the scope is exited.
struct UmaskGuard {
    previous: Mode,
}

impl UmaskGuard {
    fn restrict(mask: Mode) -> Self {
        Self {
            previous: umask(mask),
        }
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        umask(self.previous);
    }
}

/// Saves `state` to `path`. Callers must only invoke this once
/// `state.shutdown` is true; this function asserts it rather than
/// silently honoring a mid-flight snapshot that would race concurrent
/// mutation.
pub fn save(state: &UnlockedState, path: &Path) -> io::Result<()> {
    assert!(state.shutdown, "save() called before the server was shut down");

    let tmp_path = path.with_extension("tmp");
    let _umask = UmaskGuard::restrict(Mode::from_bits_truncate(0o006));

    let result: io::Result<()> = (|| {
        let mut f = File::create(&tmp_path)?;
        write_line(&mut f, crate::version::server_version().to_string().as_bytes())?;
        write_frame(&mut f, state.streams.len().to_string().as_bytes())?;
        for (name, stream) in &state.streams {
            let metadata = serde_json::to_vec(stream)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let mut payload = format!("{} {} ", name, stream.data.len()).into_bytes();
            payload.extend_from_slice(&metadata);
            write_frame(&mut f, &payload)?;
            for block in &stream.data {
                write_frame(&mut f, block)?;
            }
        }
        f.sync_all()
    })();

    match result {
        Ok(()) => fs::rename(&tmp_path, path),
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

/// Loads a snapshot written by [`save`]. Returns an error (never a panic)
/// on any I/O or parse failure, including a too-old format version.
pub fn load(path: &Path) -> io::Result<HashMap<String, Stream>> {
    let mut f = File::open(path)?;

    let version_line = read_line(&mut f)?;
    let version: Version = std::str::from_utf8(&version_line)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unparsable snapshot version"))?;
    if version < *crate::constants::MIN_SAVE_STATE_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("snapshot version {version} is older than the minimum supported"),
        ));
    }

    let count_frame = read_frame(&mut f)?;
    let count: usize = std::str::from_utf8(&count_frame)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad stream count"))?;

    let mut streams = HashMap::with_capacity(count);
    for _ in 0..count {
        let header = read_frame(&mut f)?;
        let header = String::from_utf8(header)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut parts = header.splitn(3, ' ');
        let name = parts
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing channel name"))?;
        let block_count: usize = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing block count"))?;
        let metadata_json = parts
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing stream metadata"))?;

        let mut stream: Stream = serde_json::from_str(metadata_json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        for _ in 0..block_count {
            let block = read_frame(&mut f)?;
            stream.data.push_back(Bytes::from(block));
        }
        streams.insert(name.to_string(), stream);
    }

    Ok(streams)
}

/// Best-effort load used at startup: on any failure (missing file,
/// corruption, stale version) logs and returns an empty map rather than
/// propagating, so a corrupt snapshot starts the server empty instead of
/// refusing to start.
pub fn load_or_empty(path: &Path) -> HashMap<String, Stream> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "state file not found, starting empty");
        return HashMap::new();
    }
    match load(path) {
        Ok(streams) => {
            tracing::info!(channels = streams.len(), "state loaded successfully");
            streams
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load saved state, starting empty");
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Stats;

    fn sample_state() -> UnlockedState {
        let mut stream = Stream::new(
            Version::new(1, 0, 0),
            false,
            chrono::Utc::now() + chrono::Duration::seconds(60),
            "sid".into(),
        );
        stream.data.push_back(Bytes::from_static(b"hello "));
        stream.data.push_back(Bytes::from_static(b"world"));
        stream.mark_final();
        let mut streams = HashMap::new();
        streams.insert("A".into(), stream);
        UnlockedState {
            streams,
            shutdown: true,
            stats: Stats::new(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        let state = sample_state();
        save(&state, &path).unwrap();

        let loaded = load(&path).unwrap();
        let stream = &loaded["A"];
        assert_eq!(stream.version, Version::new(1, 0, 0));
        assert!(!stream.encrypted);
        assert!(stream.final_);
        assert_eq!(
            stream.data.iter().flatten().copied().collect::<Vec<u8>>(),
            b"hello world".to_vec()
        );
    }

    #[test]
    fn load_rejects_too_old_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        let mut f = File::create(&path).unwrap();
        write_line(&mut f, b"0.1.0").unwrap();
        write_frame(&mut f, b"0").unwrap();
        drop(f);
        assert!(load(&path).is_err());
    }

    #[test]
    fn load_or_empty_never_panics_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        assert!(load_or_empty(&path).is_empty());
    }
}
