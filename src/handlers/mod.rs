//! HTTP handlers: upload, update, and the progress-polling endpoint.
//! [`drive_body`] and [`take_completed_sink`] are the pieces shared
//! between the upload and update handlers.

pub mod progress;
pub mod update;
pub mod upload;

pub use progress::progress;
pub use update::update;
pub use upload::upload;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;

use crate::error::ApiError;
use crate::recv_fsm::RecvFsm;
use crate::tempsink::TempSink;

/// Builds a 302 redirect response to `location`.
///
/// `Redirect::to` is not used here: it sends 303 See Other, while the
/// upload/update success and error redirects must be 302 Found.
pub(crate) fn redirect_302(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Streams an axum request body into `fsm` one frame at a time.
///
/// # Errors
/// Returns [`ApiError::BadRequest`] if the body stream itself errors, or
/// whatever [`ApiError`] a failed [`RecvFsm::feed`] maps to.
pub(crate) async fn drive_body(body: axum::body::Body, fsm: &mut RecvFsm) -> Result<(), ApiError> {
    let mut stream = body.into_data_stream();
    while let Some(frame) = stream.next().await {
        let bytes = frame.map_err(|e| ApiError::BadRequest(e.to_string()))?;
        fsm.feed(&bytes)?;
    }
    Ok(())
}

/// Takes the FSM's sink iff the body ended cleanly and a non-empty file
/// part was received; anything else is `ERROR_RECV`, left to the caller
/// to redirect.
pub(crate) fn take_completed_sink(fsm: &mut RecvFsm) -> Option<TempSink> {
    if !fsm.ended_cleanly() {
        return None;
    }
    match fsm.take_sink() {
        Some(sink) if sink.size().unwrap_or(0) > 0 => Some(sink),
        _ => None,
    }
}
