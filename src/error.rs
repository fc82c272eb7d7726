//! Error taxonomy and the wire-code mapping for the channel protocol.
//!
//! The wire protocol repurposes ordinary HTTP status codes as small
//! integer enums: clients are expected to switch on the numeric code, not
//! parse response text. [`WireCode`] is the single source of truth for
//! that mapping; the per-operation enums below (`UploadEc`, `QueryEc`,
//! `DownloadEc`) just name which subset of codes a given verb can produce.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A wire-level status, named for what happened rather than for the HTTP
/// status code that happens to carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireCode {
    Ok,
    AccessDenied,
    Conflict,
    Locked,
    Wait,
    VersionUpgradeRequired,
    WrongVersion,
    StreamIdIssue,
    TooBig,
    Forbidden,
    NoData,
    ServerGone,
    Internal,
}

impl WireCode {
    pub fn status(self) -> StatusCode {
        match self {
            WireCode::Ok => StatusCode::OK,
            WireCode::AccessDenied => StatusCode::UNAUTHORIZED,
            WireCode::Conflict => StatusCode::CONFLICT,
            WireCode::Locked => StatusCode::LOCKED,
            WireCode::Wait => StatusCode::from_u16(425).unwrap(),
            WireCode::VersionUpgradeRequired => StatusCode::UPGRADE_REQUIRED,
            WireCode::WrongVersion => StatusCode::PRECONDITION_FAILED,
            WireCode::StreamIdIssue => StatusCode::UNPROCESSABLE_ENTITY,
            WireCode::TooBig => StatusCode::PAYLOAD_TOO_LARGE,
            WireCode::Forbidden => StatusCode::FORBIDDEN,
            WireCode::NoData => StatusCode::NO_CONTENT,
            WireCode::ServerGone => StatusCode::SERVICE_UNAVAILABLE,
            WireCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Outcomes of a `PUT` (and the initial `POST`) on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEc {
    /// `stream_id` missing or mismatched, or POST raced another open writer.
    Conflict,
    /// Write would exceed `PIPE_MAX_BYTES`; retry with backoff.
    Wait,
    /// A single block exceeded the server-dictated `max_size`.
    TooBig,
    /// Client's declared version is incompatible with the stream's.
    WrongVersion,
    /// The channel's `expire` has already passed; it's reapable and no
    /// longer accepts writes.
    NoData,
}

impl UploadEc {
    pub fn wire(self) -> WireCode {
        match self {
            UploadEc::Conflict => WireCode::Conflict,
            UploadEc::Wait => WireCode::Wait,
            UploadEc::TooBig => WireCode::TooBig,
            UploadEc::WrongVersion => WireCode::WrongVersion,
            UploadEc::NoData => WireCode::NoData,
        }
    }
}

/// Outcomes of `GET /q/{C}` (metadata query, never consumes data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEc {
    NoData,
    IllegalVersion,
}

impl QueryEc {
    pub fn wire(self) -> WireCode {
        match self {
            QueryEc::NoData => WireCode::NoData,
            QueryEc::IllegalVersion => WireCode::VersionUpgradeRequired,
        }
    }
}

/// Outcomes of `GET /c/{C}` (the consuming/peeking read).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadEc {
    NoData,
    Locked,
    IllegalVersion,
}

impl DownloadEc {
    pub fn wire(self) -> WireCode {
        match self {
            DownloadEc::NoData => WireCode::NoData,
            DownloadEc::Locked => WireCode::Locked,
            DownloadEc::IllegalVersion => WireCode::VersionUpgradeRequired,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("upload rejected: {0:?}")]
    Upload(UploadEc),
    #[error("query rejected: {0:?}")]
    Query(QueryEc),
    #[error("download rejected: {0:?}")]
    Download(DownloadEc),
    #[error("admin access denied")]
    AdminAccessDenied,
    #[error("admin nonce invalid or already consumed")]
    AdminBadNonce,
    #[error("unsupported client version: server requires at least {min_version}")]
    IllegalAdminVersion { min_version: semver::Version },
    #[error("unsupported client version: server requires at least {min_version}")]
    IllegalDataVersion { min_version: semver::Version },
    #[error("unknown admin command: {0}")]
    AdminUnknownCommand(String),
    #[error("server is shutting down")]
    ServerShutdown,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    fn wire(&self) -> WireCode {
        match self {
            Error::Upload(e) => e.wire(),
            Error::Query(e) => e.wire(),
            Error::Download(e) => e.wire(),
            Error::AdminAccessDenied => WireCode::AccessDenied,
            Error::AdminBadNonce => WireCode::AccessDenied,
            Error::IllegalAdminVersion { .. } => WireCode::VersionUpgradeRequired,
            Error::IllegalDataVersion { .. } => WireCode::VersionUpgradeRequired,
            Error::AdminUnknownCommand(_) => WireCode::Forbidden,
            Error::ServerShutdown => WireCode::ServerGone,
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => WireCode::Internal,
        }
    }
}

impl Error {
    /// Which rejection-kind counter, if any, this error should be recorded
    /// under. `None` for errors that aren't a protocol-level rejection
    /// (shutdown, I/O, internal bugs).
    pub fn rejection_kind(&self) -> Option<crate::stats::RejectionKind> {
        use crate::stats::RejectionKind;
        match self {
            Error::Upload(UploadEc::Conflict) => Some(RejectionKind::Conflict),
            Error::Upload(UploadEc::Wait) => Some(RejectionKind::Wait),
            Error::Upload(UploadEc::TooBig) => Some(RejectionKind::TooBig),
            Error::Upload(UploadEc::WrongVersion) => Some(RejectionKind::WrongVersion),
            Error::Upload(UploadEc::NoData) => Some(RejectionKind::NoData),
            Error::Query(QueryEc::NoData) => Some(RejectionKind::NoData),
            Error::Query(QueryEc::IllegalVersion) => Some(RejectionKind::IllegalVersion),
            Error::Download(DownloadEc::NoData) => Some(RejectionKind::NoData),
            Error::Download(DownloadEc::Locked) => Some(RejectionKind::Locked),
            Error::Download(DownloadEc::IllegalVersion) => Some(RejectionKind::IllegalVersion),
            Error::IllegalDataVersion { .. } => Some(RejectionKind::IllegalVersion),
            Error::AdminAccessDenied | Error::AdminBadNonce => Some(RejectionKind::AdminDenied),
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.wire().status();
        match &self {
            // Capacity pushback: the client is expected to retry with
            // backoff, never logged above debug.
            Error::Upload(UploadEc::Wait)
            | Error::Upload(UploadEc::NoData)
            | Error::Query(QueryEc::NoData)
            | Error::Download(DownloadEc::NoData) => {
                tracing::debug!(error = %self, "capacity pushback");
            }
            // Protocol errors: wrong stream_id, version mismatch, too
            // big, locked — never fatal, but worth seeing at info.
            Error::Upload(_) | Error::Query(_) | Error::Download(_) => {
                tracing::info!(error = %self, "protocol error");
            }
            Error::AdminAccessDenied | Error::AdminBadNonce => {
                tracing::error!(error = %self, "admin access denied");
            }
            Error::IllegalAdminVersion { .. } => {
                tracing::error!(error = %self, "admin request used an unsupported version");
            }
            Error::IllegalDataVersion { .. } => {
                tracing::info!(error = %self, "client version too old");
            }
            Error::AdminUnknownCommand(_) => {
                tracing::warn!(error = %self, "rejected unknown admin command");
            }
            Error::ServerShutdown => {
                tracing::info!("request rejected: server is shutting down");
            }
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => {
                tracing::error!(error = %self, "internal server error");
            }
        }
        (status, self.to_string()).into_response()
    }
}
