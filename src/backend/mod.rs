//! The back-end RPC surface this service consumes, named only by the
//! interface it exposes. The repository/filesystem object model itself
//! is out of scope here.
//!
//! [`Backend`] mirrors the reference stack's pattern of naming an
//! external storage surface as an `async_trait` with narrowly-typed
//! results instead of a generic error type per call.

mod local;

pub use local::LocalBackend;

use async_trait::async_trait;
use std::path::Path;

/// Errors the back-end RPC surface can report back to a handler.
///
/// The string variants carry the literal messages the upload/update
/// handlers pattern-match on (`"Invalid filename"`, `"file already
/// exists"`, `"file does not exist"`); anything else maps to
/// `ERROR_INTERNAL`.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("unknown access token")]
    UnknownToken,
    #[error("quota exceeded")]
    QuotaExceeded,
    #[error("{0}")]
    Rpc(String),
}

/// The four back-end operations the receive pipeline calls, plus the
/// directory-listing accessor `gen_unique_filename` needs.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Resolves an opaque access token to `(repo_id, user)`.
    ///
    /// # Errors
    /// Returns [`BackendError::UnknownToken`] if the token is missing or
    /// invalid.
    async fn check_access_token(&self, token: &str) -> Result<(String, String), BackendError>;

    /// Checks whether `repo_id` has remaining quota for another write.
    ///
    /// # Errors
    /// Returns [`BackendError::QuotaExceeded`] if the repository is over
    /// quota.
    async fn check_quota(&self, repo_id: &str) -> Result<(), BackendError>;

    /// Lists the names of entries directly under `parent_dir` in
    /// `repo_id`, for `gen_unique_filename`'s collision check.
    ///
    /// # Errors
    /// Returns [`BackendError::Rpc`] if `parent_dir` cannot be listed.
    async fn list_dir(&self, repo_id: &str, parent_dir: &str) -> Result<Vec<String>, BackendError>;

    /// Ingests `src_path` into `repo_id` at `parent_dir/name` as a new
    /// object.
    ///
    /// # Errors
    /// Returns [`BackendError::Rpc`] with the back-end's literal message,
    /// mapped to an [`crate::error::ErrorCode`] by the caller.
    async fn post_file(&self, repo_id: &str, src_path: &Path, parent_dir: &str, name: &str, user: &str) -> Result<(), BackendError>;

    /// Replaces the object at `repo_id`'s `parent_dir/name` with the
    /// contents of `src_path`.
    ///
    /// # Errors
    /// Returns [`BackendError::Rpc`] with the back-end's literal message,
    /// mapped to an [`crate::error::ErrorCode`] by the caller.
    async fn put_file(&self, repo_id: &str, src_path: &Path, parent_dir: &str, name: &str, user: &str) -> Result<(), BackendError>;
}
