//! `GET /version` and `GET /supported`.
//!
//! `/version` is plain text (the bare running server version, for a
//! client to print as-is); `/supported` is JSON describing the
//! min-version/ban-list contract, so a client can decide up front
//! whether it needs to upgrade before ever touching a channel.

use axum::extract::State;
use axum::Json;

use crate::version::{server_version, SupportedInfo};

use super::SharedAppState;

pub async fn version(State(_app): State<SharedAppState>) -> String {
    server_version().to_string()
}

pub async fn supported(State(app): State<SharedAppState>) -> Json<SupportedInfo> {
    Json(SupportedInfo::new(&app.contract))
}
