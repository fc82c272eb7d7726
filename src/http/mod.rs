//! The HTTP surface: channel verbs, version/supported, admin routes, and
//! the `AppState`/router/middleware assembly.
//!
//! A single typed `axum::Router` carries both the data plane and the
//! admin plane, layered with tracing, compression, and permissive CORS.

pub mod admin;
pub mod channel;
pub mod control;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{BoxError, Router};
use ssh_key::PublicKey;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors, trace::TraceLayer};

use crate::admin::nonce::NoncePool;
use crate::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::state::State;
use crate::stats::Stats;
use crate::version::VersionContract;

/// Maps a `TimeoutLayer` elapse (or any other unhandled tower error) to a
/// wire response. Every fallible layer sits behind this one so the
/// router's outer service type stays infallible, as axum requires.
async fn handle_unhandled_error(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unhandled internal error: {err}"),
        )
    }
}

/// Everything a handler needs, shared behind one `Arc` via axum's `State`
/// extractor.
pub struct AppState {
    pub state: Arc<State>,
    pub stats: Stats,
    pub contract: VersionContract,
    pub nonce_pool: NoncePool,
    pub admin_public_key: Option<PublicKey>,
    pub debug: bool,
    pub state_file: Option<PathBuf>,
    pub pipe_max_bytes: usize,
}

pub type SharedAppState = Arc<AppState>;

pub fn router(app_state: SharedAppState) -> Router {
    Router::new()
        .route(
            "/c/:channel",
            post(channel::create)
                .put(channel::append)
                .get(channel::read)
                .delete(channel::delete),
        )
        .route("/q/:channel", get(channel::query))
        .route("/version", get(control::version))
        .route("/supported", get(control::supported))
        .route("/admin/uid", get(admin::issue_uid))
        .route("/admin/:cmd", post(admin::run_command))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_unhandled_error))
                .layer(TimeoutLayer::new(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    cors::CorsLayer::new()
                        .allow_methods(cors::AllowMethods::any())
                        .allow_headers(cors::Any)
                        .allow_origin(cors::Any),
                ),
        )
        .with_state(app_state)
}

pub async fn run_http(
    addr: SocketAddr,
    app_state: SharedAppState,
    shutdown: impl std::future::Future<Output = ()>,
) -> anyhow::Result<()> {
    tracing::info!("listening for HTTP requests on {addr}");
    let service = router(app_state).into_make_service();
    axum::Server::bind(&addr)
        .serve(service)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
