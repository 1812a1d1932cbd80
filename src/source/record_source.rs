//! Lazy, forward-only record stream over a line-delimited input
//!
//! Blank and whitespace-only lines are skipped here so nothing downstream
//! ever observes an empty record.

use crate::error::{EngineError, ErrorCode, Result};
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One raw line of input
pub type Record = String;

/// Path value that selects standard input instead of a file
pub const STDIN_PATH: &str = "-";

/// Forward-only iterator of non-blank records
pub struct RecordSource {
    reader: Box<dyn BufRead + Send>,
    origin: PathBuf,
    line: u64,
    buf: Vec<u8>,
    exhausted: bool,
}

impl RecordSource {
    /// Open `path` for reading, failing with `SourceUnavailable` if it cannot be read
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.as_os_str() == STDIN_PATH {
            debug!("Reading records from stdin");
            return Ok(Self::from_reader(BufReader::new(io::stdin()), path));
        }

        let metadata = std::fs::metadata(path).map_err(|e| unavailable(path, e))?;
        if !metadata.is_file() {
            warn!("\"{}\" is not a regular file.", path.display());
            return Err(EngineError::source_unavailable(
                ErrorCode::SOURCE_NOT_A_FILE,
                "not a regular file",
                path.to_path_buf(),
            ));
        }

        let file = File::open(path).map_err(|e| unavailable(path, e))?;
        debug!(
            "Opened \"{}\" ({} bytes) as record source",
            path.display(),
            metadata.len()
        );
        Ok(Self::from_reader(BufReader::new(file), path))
    }

    /// Wrap an already open reader; `origin` is only used for diagnostics
    pub fn from_reader(reader: impl BufRead + Send + 'static, origin: impl AsRef<Path>) -> Self {
        Self {
            reader: Box::new(reader),
            origin: origin.as_ref().to_path_buf(),
            line: 0,
            buf: Vec::new(),
            exhausted: false,
        }
    }

    /// Where the records come from
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Number of physical lines consumed so far, blank ones included
    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

impl Iterator for RecordSource {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.exhausted = true,
                Ok(_) => {
                    self.line += 1;
                    let text = String::from_utf8_lossy(&self.buf);
                    if let Cow::Owned(_) = text {
                        warn!(
                            "Line {} of {} is not valid UTF-8, malformed bytes replaced",
                            self.line,
                            self.origin.display()
                        );
                    }
                    let record = text.trim_end_matches(['\n', '\r']);
                    if record.trim().is_empty() {
                        continue;
                    }
                    return Some(Ok(record.to_string()));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // A failed read leaves the cursor in an unknown position.
                    self.exhausted = true;
                    self.line += 1;
                    return Some(Err(EngineError::source_read(
                        ErrorCode::SOURCE_READ_FAILED,
                        format!("reading {}", self.origin.display()),
                        self.line,
                    )
                    .with_source(e)));
                }
            }
        }
        None
    }
}

fn unavailable(path: &Path, err: io::Error) -> EngineError {
    let (code, message) = match err.kind() {
        ErrorKind::NotFound => (ErrorCode::SOURCE_NOT_FOUND, "does not exist"),
        ErrorKind::PermissionDenied => (ErrorCode::SOURCE_PERMISSION_DENIED, "is read protected"),
        _ => (ErrorCode::SOURCE_GENERIC, "cannot be opened"),
    };
    warn!("\"{}\" {}.", path.display(), message);
    EngineError::source_unavailable(code, message, path.to_path_buf()).with_source(err)
}
