//! Service configuration.
//!
//! This module centralizes every tunable parameter referenced by the
//! receive state machine, the upload/update handlers, and the process
//! entry point, with sensible defaults for all of them.
//!
//! # Example
//! ```
//! use seafhttp::config::Config;
//!
//! let config = Config::default();
//! assert_eq!(config.max_content_line, 10 * 1024);
//! ```

use std::path::PathBuf;

use clap::Parser;

/// Process configuration.
///
/// Built from CLI flags (with environment variable fallbacks) via [`clap`].
/// Cheap to clone; handlers receive it behind an `Arc`.
#[derive(Debug, Clone, Parser)]
#[command(name = "seafhttp", about = "Streaming multipart upload endpoint")]
pub struct Config {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "SEAFHTTP_BIND_ADDR", default_value = "0.0.0.0:8082")]
    pub bind_addr: String,

    /// Directory under which temporary upload files are created.
    ///
    /// Created with mode 0777 at startup if it does not already exist.
    #[arg(long, env = "SEAFHTTP_TEMP_DIR", default_value = "/tmp/seafhttp")]
    pub temp_dir: PathBuf,

    /// Base URL of the front-end web UI used to build success/error redirects.
    #[arg(long, env = "SEAFHTTP_SERVICE_URL", default_value = "http://127.0.0.1:8000")]
    pub service_url: String,

    /// Maximum accepted size of the uploaded file, in bytes.
    ///
    /// Enforced after the file has been received in full; this bounds
    /// the back-end RPC, not the receive loop itself.
    #[arg(long, env = "SEAFHTTP_MAX_UPLOAD_FILE_SIZE", default_value_t = 100 * 1024 * 1024)]
    pub max_upload_file_size: u64,

    /// Upper bound on the length of a line the receive loop will scan ahead for
    /// before treating the run as boundary-free binary content.
    ///
    /// Must stay safely above the length of any real `--boundary` line.
    #[arg(long, env = "SEAFHTTP_MAX_CONTENT_LINE", default_value_t = 10 * 1024)]
    pub max_content_line: usize,

    /// Maximum number of `gen_unique_filename` collision-suffix attempts.
    #[arg(long, env = "SEAFHTTP_MAX_FILENAME_ATTEMPTS", default_value_t = 16)]
    pub max_filename_attempts: u32,

    /// Maximum number of concurrent progress entries the registry will
    /// hold; further `X-Progress-ID`s are rejected once at capacity.
    #[arg(long, env = "SEAFHTTP_MAX_PROGRESS_ENTRIES", default_value_t = 10_000)]
    pub max_progress_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8082".to_owned(),
            temp_dir: PathBuf::from("/tmp/seafhttp"),
            service_url: "http://127.0.0.1:8000".to_owned(),
            max_upload_file_size: 100 * 1024 * 1024,
            max_content_line: 10 * 1024,
            max_filename_attempts: 16,
            max_progress_entries: 10_000,
        }
    }
}
