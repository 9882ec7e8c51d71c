//! Request setup and teardown around the receive state machine.
//!
//! [`setup`] binds a fresh [`RecvFsm`] to an incoming request on header
//! arrival; the returned [`ActiveUpload`] couples it with an RAII guard
//! that unconditionally removes the progress entry when dropped, so a
//! future cancelled mid-body (client disconnect) still releases it,
//! the same guarantee the `TempSink`'s own drop impl gives the file.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap};

use crate::backend::Backend;
use crate::config::Config;
use crate::error::RequestSetupError;
use crate::multipart::extract_boundary;
use crate::progress::{InsertError, Progress, ProgressId, ProgressRegistry};
use crate::recv_fsm::RecvFsm;

/// Removes a [`ProgressRegistry`] entry on drop.
///
/// Exists purely for its `Drop` impl: carrying this alongside a
/// [`RecvFsm`] guarantees the progress entry disappears even when the
/// owning future is cancelled rather than run to completion.
struct ProgressGuard(ProgressId);

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        ProgressRegistry::global().remove(&self.0);
    }
}

/// A [`RecvFsm`] paired with the guard that releases its progress entry.
///
/// Dropping this releases both the FSM's `TempSink` and the progress
/// entry, regardless of which exit path (success, failure, client
/// abort) produced the drop.
pub struct ActiveUpload {
    pub fsm: RecvFsm,
    _progress_guard: ProgressGuard,
}

/// Binds a new [`RecvFsm`] to an incoming upload/update request.
///
/// # Errors
/// Returns [`RequestSetupError`] if the access token is unknown, the
/// `Content-Type` is not valid multipart, `Content-Length` or
/// `X-Progress-ID` is missing, the progress id is already in use, or
/// the progress registry is at capacity.
pub async fn setup(
    config: &Config,
    backend: &dyn Backend,
    token: &str,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Result<ActiveUpload, RequestSetupError> {
    let (repo_id, user) = backend
        .check_access_token(token)
        .await
        .map_err(|_| RequestSetupError::UnknownToken)?;

    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    let boundary = extract_boundary(content_type)?;

    let content_length: u64 = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or(RequestSetupError::MissingContentLength)?;

    let progress_id =
        query.get("X-Progress-ID").cloned().map(ProgressId).ok_or(RequestSetupError::MissingProgressId)?;

    let progress: Arc<Progress> = ProgressRegistry::global()
        .insert(progress_id.clone(), content_length, config.max_progress_entries)
        .map_err(|e| match e {
            InsertError::Duplicate => RequestSetupError::DuplicateProgressId(progress_id.clone()),
            InsertError::Full => RequestSetupError::TooManyProgressEntries,
        })?;

    let fsm = RecvFsm::new(boundary, repo_id, user, progress_id.clone(), progress, config.temp_dir.clone(), config.max_content_line);

    Ok(ActiveUpload { fsm, _progress_guard: ProgressGuard(progress_id) })
}
