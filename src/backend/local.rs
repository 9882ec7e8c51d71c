//! A filesystem-backed [`Backend`], grounded directly in the reference
//! stack's own filesystem storage crate: repositories are directories
//! under a root path, objects are files within them.
//!
//! This is the default backend: good enough to exercise the full
//! request lifecycle end-to-end in tests without a real repository
//! service, and a reasonable starting point for a real deployment that
//! doesn't yet have one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{Backend, BackendError};

/// Filesystem-backed repository store.
///
/// `root` holds one directory per `repo_id`; `tokens` maps opaque
/// access tokens to `(repo_id, user)`, standing in for the real
/// authentication service this crate doesn't implement.
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
    tokens: HashMap<String, (String, String)>,
}

impl LocalBackend {
    #[must_use]
    pub fn new(root: PathBuf, tokens: HashMap<String, (String, String)>) -> Self {
        Self { root, tokens }
    }

    fn repo_dir(&self, repo_id: &str) -> PathBuf {
        self.root.join(repo_id)
    }

    /// Resolves `parent_dir` (an in-repo path, always starting with `/`)
    /// to an on-disk directory, refusing to escape `repo_dir`.
    fn resolve_dir(&self, repo_id: &str, parent_dir: &str) -> Result<PathBuf, BackendError> {
        let relative = parent_dir.trim_start_matches('/');
        let dir = self.repo_dir(repo_id).join(relative);
        if !dir.starts_with(self.repo_dir(repo_id)) {
            return Err(BackendError::Rpc("invalid parent_dir".to_owned()));
        }
        Ok(dir)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn check_access_token(&self, token: &str) -> Result<(String, String), BackendError> {
        self.tokens.get(token).cloned().ok_or(BackendError::UnknownToken)
    }

    async fn check_quota(&self, repo_id: &str) -> Result<(), BackendError> {
        if !self.repo_dir(repo_id).exists() {
            return Err(BackendError::Rpc("repo does not exist".to_owned()));
        }
        Ok(())
    }

    async fn list_dir(&self, repo_id: &str, parent_dir: &str) -> Result<Vec<String>, BackendError> {
        let dir = self.resolve_dir(repo_id, parent_dir)?;
        let mut entries = Vec::new();
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(BackendError::Rpc(e.to_string())),
        };
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| BackendError::Rpc(e.to_string()))? {
            if let Some(name) = entry.file_name().to_str() {
                entries.push(name.to_owned());
            }
        }
        Ok(entries)
    }

    async fn post_file(&self, repo_id: &str, src_path: &Path, parent_dir: &str, name: &str, _user: &str) -> Result<(), BackendError> {
        let dir = self.resolve_dir(repo_id, parent_dir)?;
        fs::create_dir_all(&dir).await.map_err(|e| BackendError::Rpc(e.to_string()))?;
        let dest = dir.join(name);
        if dest.exists() {
            return Err(BackendError::Rpc("file already exists".to_owned()));
        }
        fs::copy(src_path, &dest).await.map_err(|e| BackendError::Rpc(e.to_string()))?;
        Ok(())
    }

    async fn put_file(&self, repo_id: &str, src_path: &Path, parent_dir: &str, name: &str, _user: &str) -> Result<(), BackendError> {
        let dir = self.resolve_dir(repo_id, parent_dir)?;
        let dest = dir.join(name);
        if !dest.exists() {
            return Err(BackendError::Rpc("file does not exist".to_owned()));
        }
        fs::copy(src_path, &dest).await.map_err(|e| BackendError::Rpc(e.to_string()))?;
        Ok(())
    }
}
