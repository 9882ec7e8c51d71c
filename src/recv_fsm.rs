//! The streaming multipart receive state machine.
//!
//! [`RecvFsm`] consumes a request body in whatever chunk sizes the
//! transport hands it, driving [`crate::line_buffer::LineBuffer`],
//! [`crate::multipart::boundary`], [`crate::tempsink::TempSink`], and
//! [`crate::progress::Progress`] without ever buffering the full body.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use memchr::memmem;

use crate::error::{BoundaryError, RecvError};
use crate::multipart::boundary::parse_part_header;
use crate::progress::{Progress, ProgressId};
use crate::tempsink::TempSink;

/// `state ∈ {INIT, HEADERS, CONTENT, ERROR}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Headers,
    Content,
    Error,
}

/// Outcome of one attempt to advance the CONTENT sub-state machine.
enum Step {
    /// A full line (or a forced binary flush) was consumed; try again.
    Continue,
    /// No complete line is queued; wait for the next chunk.
    NeedMoreData,
}

/// One in-flight upload request's receive state.
///
/// Created by [`crate::lifecycle`] on successful header validation,
/// mutated on each body chunk via [`RecvFsm::feed`], and consumed by the
/// upload/update handler once the body ends.
#[derive(Debug)]
pub struct RecvFsm {
    state: State,
    boundary: String,
    pub repo_id: String,
    pub user: String,
    line: crate::line_buffer::LineBuffer,
    pub form_kvs: HashMap<String, String>,
    pub input_name: Option<String>,
    pub file_name: Option<String>,
    sink: Option<TempSink>,
    recved_crlf: bool,
    progress_id: ProgressId,
    progress: Arc<Progress>,
    temp_dir: PathBuf,
    max_content_line: usize,
}

impl RecvFsm {
    /// Constructs a fresh state machine for one request, in state INIT.
    #[must_use]
    pub fn new(
        boundary: String,
        repo_id: String,
        user: String,
        progress_id: ProgressId,
        progress: Arc<Progress>,
        temp_dir: PathBuf,
        max_content_line: usize,
    ) -> Self {
        Self {
            state: State::Init,
            boundary,
            repo_id,
            user,
            line: crate::line_buffer::LineBuffer::new(),
            form_kvs: HashMap::new(),
            input_name: None,
            file_name: None,
            sink: None,
            recved_crlf: false,
            progress_id,
            progress,
            temp_dir,
            max_content_line,
        }
    }

    /// Minimal constructor for unit tests that only exercise header
    /// parsing and don't need a real progress entry or temp directory.
    #[cfg(test)]
    pub(crate) fn for_test(boundary: &str) -> Self {
        Self::new(
            boundary.to_owned(),
            "repo".to_owned(),
            "user".to_owned(),
            ProgressId("test".to_owned()),
            Arc::new(Progress::new(0)),
            std::env::temp_dir(),
            10 * 1024,
        )
    }

    #[must_use]
    pub fn progress_id(&self) -> &ProgressId {
        &self.progress_id
    }

    #[must_use]
    pub fn sink(&self) -> Option<&TempSink> {
        self.sink.as_ref()
    }

    /// Takes the sink out of the FSM, leaving `None` behind.
    ///
    /// Used by the upload/update handler to hand the temp file's path to
    /// the back-end RPC without the sink's `Drop` unlinking it first.
    pub fn take_sink(&mut self) -> Option<TempSink> {
        self.sink.take()
    }

    /// Whether the body ended in the canonical post-file-part state.
    ///
    /// A well-formed request transitions back to HEADERS once the
    /// terminal `--boundary--` line ends the file part; anything else
    /// (body ended mid-part, or no file part was ever seen) is treated
    /// as an empty upload, resolved as `ERROR_RECV` by the caller.
    #[must_use]
    pub fn ended_cleanly(&self) -> bool {
        self.state == State::Headers
    }

    /// Feeds one body chunk into the state machine.
    ///
    /// Bumps the progress counter unconditionally, before parsing,
    /// then, unless the FSM has already failed (subsequent chunks are
    /// silently ignored once in the terminal ERROR state), parses as
    /// many complete lines as the buffer currently holds.
    ///
    /// # Errors
    /// Returns the first [`RecvError`] encountered; the FSM transitions
    /// to ERROR and the caller must not call `feed` again (it will be a
    /// no-op if it does).
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), RecvError> {
        self.progress.add_uploaded(chunk.len() as u64);

        if self.state == State::Error {
            return Ok(());
        }

        self.line.append(chunk);
        self.run()
    }

    fn run(&mut self) -> Result<(), RecvError> {
        loop {
            match self.state {
                State::Error => return Ok(()),
                State::Init => match self.line.read_line() {
                    None => return Ok(()),
                    Some(line) => {
                        if contains_boundary(&line, self.boundary.as_bytes()) {
                            self.state = State::Headers;
                        } else {
                            self.state = State::Error;
                            return Err(RecvError::ExpectedBoundary);
                        }
                    }
                },
                State::Headers => match self.line.read_line() {
                    None => return Ok(()),
                    Some(line) => self.headers_step(&line)?,
                },
                State::Content => match self.content_step()? {
                    Step::Continue => continue,
                    Step::NeedMoreData => return Ok(()),
                },
            }
        }
    }

    fn headers_step(&mut self, line: &[u8]) -> Result<(), RecvError> {
        if line.is_empty() {
            if self.input_name.as_deref() == Some("file") {
                let prefix = self.file_name.clone().unwrap_or_default();
                match TempSink::open(&self.temp_dir, &prefix) {
                    Ok(sink) => self.sink = Some(sink),
                    Err(e) => {
                        self.state = State::Error;
                        return Err(RecvError::Sink(e));
                    }
                }
            }
            self.recved_crlf = false;
            self.state = State::Content;
            return Ok(());
        }

        let Ok(line_str) = std::str::from_utf8(line) else {
            self.state = State::Error;
            return Err(RecvError::Boundary(BoundaryError::MalformedDisposition));
        };

        if let Err(e) = parse_part_header(line_str, self) {
            self.state = State::Error;
            return Err(RecvError::Boundary(e));
        }
        Ok(())
    }

    fn content_step(&mut self) -> Result<Step, RecvError> {
        if self.input_name.as_deref() == Some("file") {
            self.content_file_step()
        } else {
            self.content_field_step()
        }
    }

    /// Small form field sub-behavior of CONTENT.
    fn content_field_step(&mut self) -> Result<Step, RecvError> {
        match self.line.read_line() {
            None => Ok(Step::NeedMoreData),
            Some(line) => {
                if contains_boundary(&line, self.boundary.as_bytes()) {
                    self.input_name = None;
                    self.state = State::Headers;
                } else if let Some(name) = self.input_name.clone() {
                    self.form_kvs.insert(name, String::from_utf8_lossy(&line).into_owned());
                }
                Ok(Step::Continue)
            }
        }
    }

    /// File data sub-behavior of CONTENT: the delicate path.
    ///
    /// Bytes are written out verbatim except that the CRLF immediately
    /// preceding a boundary belongs to the delimiter, not the payload;
    /// `recved_crlf` defers each line's trailing CRLF until we know the
    /// next line isn't a boundary, so that CRLF is naturally dropped.
    fn content_file_step(&mut self) -> Result<Step, RecvError> {
        match self.line.read_line() {
            None => {
                if self.line.len() < self.max_content_line {
                    return Ok(Step::NeedMoreData);
                }
                // No boundary-length run seen yet; this is binary data or
                // a very long line. Flush it verbatim and keep waiting.
                let prefix_crlf = self.recved_crlf;
                self.recved_crlf = false;
                let mut raw = Vec::new();
                self.line.drain_to(&mut raw).expect("writing to a Vec<u8> cannot fail");
                self.write_file_bytes(prefix_crlf, &raw)?;
                Ok(Step::NeedMoreData)
            }
            Some(line) => {
                if contains_boundary(&line, self.boundary.as_bytes()) {
                    self.input_name = None;
                    self.state = State::Headers;
                } else {
                    let prefix_crlf = self.recved_crlf;
                    self.write_file_bytes(prefix_crlf, &line)?;
                    self.recved_crlf = true;
                }
                Ok(Step::Continue)
            }
        }
    }

    fn write_file_bytes(&mut self, prefix_crlf: bool, bytes: &[u8]) -> Result<(), RecvError> {
        let Some(sink) = self.sink.as_mut() else {
            // No file part has opened a sink yet; there is nothing to
            // write to, and nothing downstream depends on it. The
            // finish handler rejects with ERROR_RECV when no sink ever
            // appears.
            return Ok(());
        };
        if prefix_crlf {
            sink.write_all(b"\r\n")?;
        }
        sink.write_all(bytes)?;
        Ok(())
    }
}

/// A "boundary line" is any line whose contents *contain* the boundary
/// string as a substring. This intentionally matches both
/// `--<boundary>` and `--<boundary>--`, and tolerates trailing
/// whitespace variants some clients emit.
fn contains_boundary(line: &[u8], boundary: &[u8]) -> bool {
    memmem::find(line, boundary).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fsm_with_sink(boundary: &str, temp_dir: &std::path::Path) -> RecvFsm {
        RecvFsm::new(
            boundary.to_owned(),
            "repo".to_owned(),
            "user".to_owned(),
            ProgressId("p1".to_owned()),
            Arc::new(Progress::new(0)),
            temp_dir.to_path_buf(),
            10 * 1024,
        )
    }

    fn body(boundary: &str, parts: &[&str], tail: &str) -> Vec<u8> {
        let mut out = format!("--{boundary}\r\n").into_bytes();
        for part in parts {
            out.extend_from_slice(part.as_bytes());
        }
        out.extend_from_slice(tail.as_bytes());
        out
    }

    #[test]
    fn scenario_1_simple_upload() {
        let dir = tempfile::tempdir().unwrap();
        let mut fsm = fsm_with_sink("X", dir.path());

        let b = body(
            "X",
            &[
                "Content-Disposition: form-data; name=\"parent_dir\"\r\n\r\n/docs\r\n--X\r\n",
                "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\r\nhello\r\n--X--\r\n",
            ],
            "",
        );

        fsm.feed(&b).unwrap();

        assert!(fsm.ended_cleanly());
        assert_eq!(fsm.form_kvs.get("parent_dir").map(String::as_str), Some("/docs"));
        assert_eq!(fsm.file_name.as_deref(), Some("a.txt"));
        let contents = std::fs::read(fsm.sink().unwrap().path()).unwrap();
        assert_eq!(contents, b"hello");
    }

    #[test]
    fn chunk_boundary_independence() {
        let dir = tempfile::tempdir().unwrap();
        let b = body(
            "X",
            &[
                "Content-Disposition: form-data; name=\"parent_dir\"\r\n\r\n/docs\r\n--X\r\n",
                "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\r\nhello world\r\n--X--\r\n",
            ],
            "",
        );

        // single-shot
        let mut whole = fsm_with_sink("X", dir.path());
        whole.feed(&b).unwrap();
        let whole_contents = std::fs::read(whole.sink().unwrap().path()).unwrap();

        // byte-wise
        let mut split = fsm_with_sink("X", dir.path());
        for byte in &b {
            split.feed(std::slice::from_ref(byte)).unwrap();
        }
        let split_contents = std::fs::read(split.sink().unwrap().path()).unwrap();

        assert_eq!(whole_contents, split_contents);
        assert_eq!(whole.form_kvs, split.form_kvs);
        assert_eq!(whole_contents, b"hello world");
    }

    #[test]
    fn scenario_4_bad_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let mut fsm = fsm_with_sink("X", dir.path());
        let err = fsm.feed(b"not-a-boundary-line\r\n").unwrap_err();
        assert!(matches!(err, RecvError::ExpectedBoundary));
    }

    #[test]
    fn trailing_cr_in_file_content_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let mut fsm = fsm_with_sink("X", dir.path());
        let b = body(
            "X",
            &[
                "Content-Disposition: form-data; name=\"file\"; filename=\"a.bin\"\r\n\r\nabc\r",
                "\r\n--X--\r\n",
            ],
            "",
        );
        fsm.feed(&b).unwrap();
        let contents = std::fs::read(fsm.sink().unwrap().path()).unwrap();
        // the payload's own trailing \r plus the CRLF that precedes the
        // terminal boundary: only the delimiter's CRLF is dropped.
        assert_eq!(contents, b"abc\r");
    }

    #[test]
    fn embedded_boundary_substring_not_crlf_framed_is_preserved() {
        // The boundary string detector only runs against lines read via
        // LineBuffer (i.e. CRLF-delimited). A binary run long enough to
        // hit MAX_CONTENT_LINE before any CRLF appears is flushed raw,
        // bypassing the substring check entirely, so an embedded
        // boundary byte sequence with no nearby CRLF survives, while one
        // that forms a whole CRLF-delimited line would not.
        let dir = tempfile::tempdir().unwrap();
        let mut fsm = RecvFsm::new(
            "BOUND".to_owned(),
            "repo".to_owned(),
            "user".to_owned(),
            ProgressId("p1".to_owned()),
            Arc::new(Progress::new(0)),
            dir.path().to_path_buf(),
            8, // smaller than the payload below, forces a raw flush
        );

        let mut first = b"--BOUND\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.bin\"\r\n\r\n".to_vec();
        let payload = b"xxBOUNDyy".to_vec(); // contains the boundary, no CRLF nearby
        first.extend_from_slice(&payload);
        fsm.feed(&first).unwrap();

        fsm.feed(b"\r\n--BOUND--\r\n").unwrap();

        assert!(fsm.ended_cleanly());
        let contents = std::fs::read(fsm.sink().unwrap().path()).unwrap();
        assert_eq!(contents, payload);
    }

    #[test]
    fn long_run_without_crlf_flushes_at_max_content_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut fsm = RecvFsm::new(
            "X".to_owned(),
            "repo".to_owned(),
            "user".to_owned(),
            ProgressId("p1".to_owned()),
            Arc::new(Progress::new(0)),
            dir.path().to_path_buf(),
            16, // tiny threshold to exercise the flush path
        );

        // First chunk: headers plus a CRLF-free run already past the
        // threshold, with no terminator yet; must be force-flushed
        // before the next chunk arrives.
        let mut first = b"--X\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.bin\"\r\n\r\n".to_vec();
        let first_run = vec![b'a'; 20];
        first.extend_from_slice(&first_run);
        fsm.feed(&first).unwrap();

        let mut payload = first_run.clone();

        // Second chunk: more data, then the terminator and boundary.
        let second_run = vec![b'a'; 44];
        payload.extend_from_slice(&second_run);
        let mut second = second_run;
        second.extend_from_slice(b"\r\n--X--\r\n");
        fsm.feed(&second).unwrap();

        assert!(fsm.ended_cleanly());
        let contents = std::fs::read(fsm.sink().unwrap().path()).unwrap();
        assert_eq!(contents, payload);
    }

    #[test]
    fn last_file_part_wins_when_file_appears_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut fsm = fsm_with_sink("X", dir.path());
        let b = body(
            "X",
            &[
                "Content-Disposition: form-data; name=\"file\"; filename=\"first.txt\"\r\n\r\nFIRST\r\n--X\r\n",
                "Content-Disposition: form-data; name=\"file\"; filename=\"second.txt\"\r\n\r\nSECOND\r\n--X--\r\n",
            ],
            "",
        );
        fsm.feed(&b).unwrap();
        assert_eq!(fsm.file_name.as_deref(), Some("second.txt"));
        let contents = std::fs::read(fsm.sink().unwrap().path()).unwrap();
        assert_eq!(contents, b"SECOND");
    }

    #[test]
    fn empty_upload_never_opens_a_sink() {
        let dir = tempfile::tempdir().unwrap();
        let mut fsm = fsm_with_sink("X", dir.path());
        let b = body("X", &["Content-Disposition: form-data; name=\"parent_dir\"\r\n\r\n/docs\r\n--X--\r\n"], "");
        fsm.feed(&b).unwrap();
        assert!(fsm.sink().is_none());
    }
}
