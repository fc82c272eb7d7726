//! Channel verb handlers: `POST`/`PUT`/`GET`/`DELETE /c/{C}`, `GET /q/{C}`.
//!
//! Each handler follows the same shape: validate the version gate and
//! body size outside the lock, mutate the stream inside one
//! [`crate::state::State::with_state`] call, then translate the result
//! to a wire response. No suspension point ever falls inside that
//! closure.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Duration, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DEFAULT_TTL_SECS, MAX_BLOCK_BYTES};
use crate::error::{DownloadEc, Error, QueryEc, UploadEc};
use crate::stream::{Stream, StreamState};

use super::SharedAppState;

fn check_version_gate(app: &SharedAppState, client: &Version) -> Result<(), Error> {
    if app.contract.check(client) == crate::version::VersionVerdict::Ok {
        Ok(())
    } else {
        Err(Error::IllegalDataVersion {
            min_version: app.contract.min_version.clone(),
        })
    }
}

/// Records the rejection counter for `result`'s error, if any, then
/// returns `result` unchanged so callers can keep using `?`.
fn note_rejection<T>(app: &SharedAppState, result: Result<T, Error>) -> Result<T, Error> {
    if let Err(e) = &result {
        if let Some(kind) = e.rejection_kind() {
            app.stats.record_rejection(kind);
        }
    }
    result
}

#[derive(Debug, Deserialize)]
pub struct CreateQuery {
    pub version: Version,
    #[serde(rename = "final", default)]
    pub final_: bool,
    #[serde(default)]
    pub ttl: Option<i64>,
    #[serde(default)]
    pub encrypted: bool,
}

pub async fn create(
    State(app): State<SharedAppState>,
    Path(channel): Path<String>,
    Query(q): Query<CreateQuery>,
    body: Bytes,
) -> Result<Response, Error> {
    check_version_gate(&app, &q.version)?;
    if body.len() > MAX_BLOCK_BYTES {
        app.stats.record_rejection(crate::stats::RejectionKind::TooBig);
        return Err(Error::Upload(UploadEc::TooBig));
    }

    let stream_id = Uuid::new_v4().to_string();
    let expire = Utc::now() + Duration::seconds(q.ttl.unwrap_or(DEFAULT_TTL_SECS));
    let written = body.len() as u64;

    let result: Result<(), Error> = app.state.with_state(|s| {
        if let Some(existing) = s.streams.get(&channel) {
            if existing.state() != StreamState::Exhausted {
                return Err(Error::Upload(UploadEc::Conflict));
            }
        }

        let mut stream = Stream::new(q.version.clone(), q.encrypted, expire, stream_id.clone());
        if !body.is_empty() {
            stream
                .append(&stream_id, body.clone(), app.pipe_max_bytes)
                .map_err(Error::Upload)?;
        }
        if q.final_ {
            stream.mark_final();
        }
        s.streams.insert(channel.clone(), stream);
        s.stats.record_stream_created();
        s.stats.record_write(&channel, written);
        Ok(())
    })?;
    note_rejection(&app, result)?;

    Ok((
        StatusCode::OK,
        [
            ("stream_id", stream_id),
            ("max_size", MAX_BLOCK_BYTES.to_string()),
        ],
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct AppendQuery {
    pub stream_id: String,
    #[serde(rename = "final", default)]
    pub final_: bool,
    #[serde(default)]
    pub version: Option<Version>,
}

pub async fn append(
    State(app): State<SharedAppState>,
    Path(channel): Path<String>,
    Query(q): Query<AppendQuery>,
    body: Bytes,
) -> Result<Response, Error> {
    if let Some(v) = &q.version {
        check_version_gate(&app, v)?;
    }
    if body.len() > MAX_BLOCK_BYTES {
        app.stats.record_rejection(crate::stats::RejectionKind::TooBig);
        return Err(Error::Upload(UploadEc::TooBig));
    }

    let written = body.len() as u64;
    let now = Utc::now();
    let result: Result<(), Error> = app.state.with_state(|s| {
        let stream = s
            .streams
            .get_mut(&channel)
            .ok_or(Error::Upload(UploadEc::Conflict))?;

        if stream.is_expired(now) {
            return Err(Error::Upload(UploadEc::NoData));
        }

        if let Some(v) = &q.version {
            if *v != stream.version {
                return Err(Error::Upload(UploadEc::WrongVersion));
            }
        }

        stream
            .append(&q.stream_id, body.clone(), app.pipe_max_bytes)
            .map_err(Error::Upload)?;
        if q.final_ {
            stream.mark_final();
        }
        s.stats.record_write(&channel, written);
        Ok(())
    })?;
    note_rejection(&app, result)?;

    Ok(StatusCode::OK.into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadQuery {
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub peek: bool,
    #[serde(default)]
    pub reader_id: Option<String>,
    /// Read anyway despite a version mismatch. Mirrors a client's
    /// `--force` flag for readers that would rather risk a format they
    /// don't fully understand than get nothing back.
    #[serde(rename = "override", default)]
    pub r#override: bool,
}

struct ReadOutcome {
    blocks: Vec<Bytes>,
    final_: bool,
    encrypted: bool,
    reader_id: Option<String>,
}

pub async fn read(
    State(app): State<SharedAppState>,
    Path(channel): Path<String>,
    Query(q): Query<ReadQuery>,
) -> Result<Response, Error> {
    if !q.r#override {
        if let Some(v) = &q.version {
            check_version_gate(&app, v)?;
        }
    }

    let now = Utc::now();
    let result: Result<ReadOutcome, Error> = app.state.with_state(|s| {
        let stream = match s.streams.get_mut(&channel) {
            Some(stream) if !stream.is_expired(now) => stream,
            _ => return Err(Error::Download(DownloadEc::NoData)),
        };

        if q.peek {
            if stream.data.is_empty() {
                return Err(Error::Download(DownloadEc::NoData));
            }
            return Ok(ReadOutcome {
                blocks: stream.data.iter().cloned().collect(),
                final_: stream.final_,
                encrypted: stream.encrypted,
                reader_id: stream.reader_id.clone(),
            });
        }

        if stream.locked {
            return Err(Error::Download(DownloadEc::Locked));
        }
        if let (Some(bound), Some(requested)) = (&stream.reader_id, &q.reader_id) {
            if bound != requested {
                return Err(Error::Download(DownloadEc::Locked));
            }
        }
        if stream.data.is_empty() {
            return Err(Error::Download(DownloadEc::NoData));
        }

        // Transient: nothing can observe this stream between the set and
        // the clear below, since the whole pop happens inside one
        // critical section. It still records who "owns" the read once
        // the popped bytes are handed to the network layer outside the
        // lock, which is what a second concurrent GET checks above.
        stream.locked = true;
        let reader_id = stream
            .reader_id
            .get_or_insert_with(|| {
                q.reader_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string())
            })
            .clone();
        let blocks: Vec<Bytes> = stream.data.drain(..).collect();
        let final_ = stream.final_;
        let encrypted = stream.encrypted;
        stream.locked = false;

        Ok(ReadOutcome {
            blocks,
            final_,
            encrypted,
            reader_id: Some(reader_id),
        })
    })?;
    let outcome = note_rejection(&app, result)?;

    if !q.peek {
        let n: u64 = outcome.blocks.iter().map(|b| b.len() as u64).sum();
        app.stats.record_read(&channel, n);
    }

    let mut body = BytesMut::new();
    for block in &outcome.blocks {
        body.extend_from_slice(block);
    }

    let mut response = (StatusCode::OK, body.freeze()).into_response();
    let headers = response.headers_mut();
    headers.insert(
        "final",
        HeaderValue::from_str(&outcome.final_.to_string()).unwrap(),
    );
    headers.insert(
        "encrypted",
        HeaderValue::from_str(&outcome.encrypted.to_string()).unwrap(),
    );
    if let Some(reader_id) = outcome.reader_id {
        headers.insert("reader_id", HeaderValue::from_str(&reader_id).unwrap());
    }
    Ok(response)
}

pub async fn delete(
    State(app): State<SharedAppState>,
    Path(channel): Path<String>,
) -> Result<Response, Error> {
    app.state.with_state(|s| {
        if s.streams.remove(&channel).is_some() {
            s.stats.forget_channel(&channel);
        }
    })?;
    Ok(StatusCode::OK.into_response())
}

#[derive(Debug, Serialize)]
pub struct ChannelMeta {
    pub version: Version,
    pub encrypted: bool,
    pub expire: DateTime<Utc>,
    pub bytes_queued: usize,
}

pub async fn query(
    State(app): State<SharedAppState>,
    Path(channel): Path<String>,
) -> Result<Json<ChannelMeta>, Error> {
    let now = Utc::now();
    let meta = app.state.with_state(|s| {
        s.streams.get(&channel).filter(|st| !st.is_expired(now)).map(|st| ChannelMeta {
            version: st.version.clone(),
            encrypted: st.encrypted,
            expire: st.expire,
            bytes_queued: st.queued_bytes(),
        })
    })?;

    match meta {
        Some(m) => Ok(Json(m)),
        None => {
            app.stats.record_rejection(crate::stats::RejectionKind::NoData);
            Err(Error::Query(QueryEc::NoData))
        }
    }
}
