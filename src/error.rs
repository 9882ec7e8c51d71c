//! Error taxonomy for the receive state machine and its handlers.
//!
//! Each component that can fail gets its own small `thiserror` enum;
//! [`ApiError`] unifies them into the three response shapes the
//! handlers need: `BadRequest`, `ServerError`, `HandlerError`.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::progress::ProgressId;

/// Stable numeric error codes exposed in redirect URLs.
///
/// Design-stable: the web front-end consumes these, so the discriminants
/// must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Filename = 0,
    Exists = 1,
    NotExist = 2,
    Size = 3,
    Quota = 4,
    Recv = 5,
    Internal = 6,
}

impl ErrorCode {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Failure while extracting or applying the multipart boundary.
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    #[error("Content-Type is not multipart/form-data")]
    NotMultipart,
    #[error("missing boundary parameter in Content-Type")]
    MissingBoundary,
    #[error("malformed Content-Disposition header")]
    MalformedDisposition,
    #[error("missing name parameter in Content-Disposition")]
    MissingName,
    #[error("missing filename parameter for file part")]
    MissingFilename,
    #[error("unterminated quoted value")]
    UnterminatedQuote,
}

/// Failure opening or writing the on-disk upload sink.
#[derive(Debug, thiserror::Error)]
pub enum TempSinkError {
    #[error("failed to create temp file under {dir}: {source}")]
    Open { dir: String, source: std::io::Error },
    #[error("failed to write to temp file: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to stat temp file: {0}")]
    Stat(#[source] std::io::Error),
}

/// Failure inside the receive state machine proper.
#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    #[error("expected multipart boundary line")]
    ExpectedBoundary,
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
    #[error(transparent)]
    Sink(#[from] TempSinkError),
    #[error("receive state machine already failed")]
    AlreadyFailed,
}

/// Failures surfaced at request setup, before the body starts.
#[derive(Debug, thiserror::Error)]
pub enum RequestSetupError {
    #[error("missing or unknown access token")]
    UnknownToken,
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
    #[error("missing or invalid Content-Length header")]
    MissingContentLength,
    #[error("missing X-Progress-ID query parameter")]
    MissingProgressId,
    #[error("progress id {0:?} is already in use")]
    DuplicateProgressId(ProgressId),
    #[error("progress registry is at capacity")]
    TooManyProgressEntries,
}

/// Top-level error, unifying every failure mode into the three
/// HTTP-visible shapes the handlers produce.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed request: reply 400, close the connection.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unexpected server-side failure: reply 500, close the connection.
    #[error("internal error: {0}")]
    ServerError(String),

    /// Post-body domain failure: redirect to an error page carrying `code`.
    #[error("handler error {code:?}: redirect to {redirect_to}")]
    HandlerError { code: ErrorCode, redirect_to: String },

    /// Progress id not found: surfaced as a bad request.
    #[error("no progress entry for id {0:?}")]
    ProgressNotFound(ProgressId),
}

impl From<RequestSetupError> for ApiError {
    fn from(err: RequestSetupError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<RecvError> for ApiError {
    fn from(err: RecvError) -> Self {
        match err {
            RecvError::Sink(source) => ApiError::ServerError(source.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                tracing::warn!(error = %msg, "bad request");
                (StatusCode::BAD_REQUEST, msg).into_response()
            }
            ApiError::ServerError(msg) => {
                tracing::error!(error = %msg, "server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
            }
            ApiError::HandlerError { code, redirect_to } => {
                tracing::info!(code = code.as_u8(), redirect_to = %redirect_to, "handler error redirect");
                (StatusCode::FOUND, [(header::LOCATION, redirect_to)]).into_response()
            }
            ApiError::ProgressNotFound(id) => {
                tracing::debug!(progress_id = %id, "progress lookup miss");
                (StatusCode::BAD_REQUEST, "no such progress id").into_response()
            }
        }
    }
}
