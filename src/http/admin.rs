//! Admin envelope routes: `GET /admin/uid`, `POST /admin/{cmd}`.
//!
//! The command table dispatches through an explicit `match` with just
//! enough real handlers — `stats`, `channels` — to exercise the envelope
//! verification end to end; anything else is refused rather than guessed
//! at.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::admin::{verify, AdminEnvelope};
use crate::error::Error;

use super::SharedAppState;

/// A reverse proxy terminating TLS is expected to set this; there is no
/// direct TLS listener in this process.
fn is_tls(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
pub struct NonceQuery {
    #[serde(default)]
    pub count: Option<usize>,
}

pub async fn issue_uid(
    State(app): State<SharedAppState>,
    headers: HeaderMap,
    Query(q): Query<NonceQuery>,
) -> Result<Json<Vec<String>>, Error> {
    crate::admin::enforce_transport(app.debug, is_tls(&headers))?;
    let n = q.count.unwrap_or(crate::constants::DEFAULT_ADMIN_NONCE_BATCH);
    Ok(Json(app.nonce_pool.issue(n)))
}

#[derive(Debug, Deserialize)]
pub struct AdminBody {
    #[serde(default)]
    pub args: BTreeMap<String, String>,
    #[serde(flatten)]
    pub envelope: AdminEnvelope,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AdminResponse {
    Stats(crate::stats::StatsSnapshot),
    Channels(Vec<String>),
}

pub async fn run_command(
    State(app): State<SharedAppState>,
    Path(cmd): Path<String>,
    headers: HeaderMap,
    Json(body): Json<AdminBody>,
) -> Result<Json<AdminResponse>, Error> {
    crate::admin::enforce_transport(app.debug, is_tls(&headers))?;

    let public_key = app.admin_public_key.as_ref().ok_or(Error::AdminAccessDenied)?;
    verify(
        &app.nonce_pool,
        public_key,
        &app.contract,
        &format!("/admin/{cmd}"),
        &body.args,
        &body.envelope,
    )?;

    match cmd.as_str() {
        "stats" => Ok(Json(AdminResponse::Stats(app.stats.snapshot()))),
        "channels" => {
            let names = app.state.with_state(|s| s.streams.keys().cloned().collect())?;
            Ok(Json(AdminResponse::Channels(names)))
        }
        other => Err(Error::AdminUnknownCommand(other.to_string())),
    }
}
