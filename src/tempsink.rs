//! Unique-named temp file that owns its descriptor and unlinks itself.
//!
//! [`TempSink`] wraps [`tempfile::NamedTempFile`], which already gives
//! us both guarantees needed here: atomic unique naming under a
//! directory, and unconditional close-plus-unlink on drop. There is
//! nothing bespoke to write beyond a narrow API surface (`open`,
//! `write_all`, `path`, `size`) and the 0600 mode requirement.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::TempSinkError;

/// Owns one uploaded file's on-disk scratch copy.
///
/// Exclusively owned by one [`crate::recv_fsm::RecvFsm`]; dropping it
/// closes the file descriptor and unlinks the path. Both steps are
/// best-effort: failures are logged, never propagated.
#[derive(Debug)]
pub struct TempSink {
    file: tempfile::NamedTempFile,
}

impl TempSink {
    /// Creates a file at `<dir>/<prefix>XXXXXX` with a random unique
    /// suffix and mode 0600.
    ///
    /// # Errors
    /// Returns [`TempSinkError::Open`] if `dir` is unwritable or the
    /// random-suffix search is exhausted.
    pub fn open(dir: &Path, prefix: &str) -> Result<Self, TempSinkError> {
        #[cfg(unix)]
        let permissions = {
            use std::os::unix::fs::PermissionsExt;
            std::fs::Permissions::from_mode(0o600)
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix).suffix("");
        #[cfg(unix)]
        builder.permissions(permissions);

        let file = builder.tempfile_in(dir).map_err(|source| TempSinkError::Open {
            dir: dir.display().to_string(),
            source,
        })?;

        Ok(Self { file })
    }

    /// Writes every byte in `bytes`, looping internally over short writes.
    ///
    /// # Errors
    /// Returns [`TempSinkError::Write`] on an unrecoverable I/O error.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), TempSinkError> {
        self.file.write_all(bytes).map_err(TempSinkError::Write)
    }

    /// Absolute path of the temp file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Current on-disk size, via `fstat`.
    ///
    /// # Errors
    /// Returns [`TempSinkError::Stat`] if the underlying `fstat` fails.
    pub fn size(&self) -> Result<u64, TempSinkError> {
        self.file.as_file().metadata().map(|m| m.len()).map_err(TempSinkError::Stat)
    }

    /// Consumes the sink, returning its path without deleting the file.
    ///
    /// Used once the upload/update handler has taken ownership of the
    /// file for the back-end RPC call; the caller becomes responsible for
    /// removing it afterwards.
    #[must_use]
    pub fn into_path(self) -> PathBuf {
        // `keep` detaches the OS-level delete-on-drop behavior.
        match self.file.keep() {
            Ok((_file, path)) => path,
            Err(e) => {
                tracing::error!(error = %e.error, "failed to persist temp file past handler scope");
                e.file.path().to_path_buf()
            }
        }
    }
}
