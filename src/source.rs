//! Feed line sources.
//!
//! A trait-based abstraction over where fixed-width feed lines come from, so
//! the [`Engine`](crate::Engine) can replay files, compressed archives, or
//! in-memory fixtures without modification.
//!
//! # Example
//!
//! ```ignore
//! use itch_depth_reconstructor::source::{FileSource, LineSource};
//!
//! let source = FileSource::new("data/S122607-v2.txt.zst")?;
//! println!("session: {:?}", source.metadata().session);
//!
//! for line in source.lines()? {
//!     let line = line?;
//!     // decode...
//! }
//! ```
//!
//! # Implementing Custom Sources
//!
//! ```ignore
//! use itch_depth_reconstructor::source::{LineSource, SourceMetadata};
//! use itch_depth_reconstructor::Result;
//!
//! struct SocketCapture {
//!     lines: Vec<String>,
//!     metadata: SourceMetadata,
//! }
//!
//! impl LineSource for SocketCapture {
//!     type LineIter = std::iter::Map<std::vec::IntoIter<String>, fn(String) -> Result<String>>;
//!
//!     fn lines(self) -> Result<Self::LineIter> {
//!         Ok(self.lines.into_iter().map(Ok as fn(String) -> Result<String>))
//!     }
//!
//!     fn metadata(&self) -> &SourceMetadata {
//!         &self.metadata
//!     }
//! }
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{ReplayError, Result};

/// Read buffer for file sources.
pub const IO_BUFFER_SIZE: usize = 1024 * 1024;

// ============================================================================
// Source Metadata
// ============================================================================

/// Metadata about a feed source, used for logging and naming output files.
#[derive(Debug, Clone, Default)]
pub struct SourceMetadata {
    /// Session label (file stem for file sources)
    pub session: Option<String>,

    /// Date token found in the file name (e.g. "122607")
    pub date: Option<String>,

    /// Original file path (if loaded from file)
    pub file_path: Option<PathBuf>,

    /// Provider name (e.g. "file", "memory")
    pub provider: Option<String>,

    /// Estimated line count (for progress tracking)
    pub estimated_lines: Option<u64>,

    /// File size in bytes (if applicable)
    pub file_size: Option<u64>,
}

impl SourceMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_file_path(mut self, path: impl AsRef<Path>) -> Self {
        self.file_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_estimated_lines(mut self, count: u64) -> Self {
        self.estimated_lines = Some(count);
        self
    }

    /// Label used for output file names: session, else date, else "stream".
    pub fn label(&self) -> &str {
        self.session
            .as_deref()
            .or(self.date.as_deref())
            .unwrap_or("stream")
    }

    /// Extract metadata from a file path.
    ///
    /// The session is the file name without `.zst` and the final extension;
    /// the date is the first run of exactly 6 or 8 digits in it:
    /// - `S122607-v2.txt` → session="S122607-v2", date="122607"
    /// - `itch_20071226.txt.zst` → session="itch_20071226", date="20071226"
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut metadata = Self::new().with_file_path(path);

        if let Ok(meta) = std::fs::metadata(path) {
            metadata.file_size = Some(meta.len());
        }

        if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
            let base = filename.trim_end_matches(".zst");
            let stem = match base.rfind('.') {
                Some(dot) if dot > 0 => &base[..dot],
                _ => base,
            };
            if !stem.is_empty() {
                metadata.session = Some(stem.to_string());
            }
            metadata.date = date_token(stem).map(str::to_string);
        }

        metadata
    }
}

/// First maximal run of ASCII digits with length 6 or 8.
fn date_token(stem: &str) -> Option<&str> {
    let bytes = stem.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if matches!(i - start, 6 | 8) {
                return Some(&stem[start..i]);
            }
        } else {
            i += 1;
        }
    }
    None
}

// ============================================================================
// Line Source Trait
// ============================================================================

/// Trait for feed line sources.
///
/// - `lines()` consumes `self` to allow single-pass iteration
/// - Each item is one raw line without its terminator, or the I/O error that
///   ended the read
/// - Metadata should be populated before calling `lines()`
pub trait LineSource {
    /// The iterator type for lines.
    type LineIter: Iterator<Item = Result<String>>;

    /// Consume the source and return an iterator over raw lines.
    fn lines(self) -> Result<Self::LineIter>;

    /// Metadata about the source.
    fn metadata(&self) -> &SourceMetadata;
}

// ============================================================================
// Vector Source (for testing)
// ============================================================================

/// In-memory source for tests and simulations.
///
/// # Example
///
/// ```
/// use itch_depth_reconstructor::source::{LineSource, SourceMetadata, VecSource};
///
/// let source = VecSource::new(vec![
///     "09300000A000000001B000100AAPL  0000012500Y".to_string(),
///     "09300200X000000001000100".to_string(),
/// ])
/// .with_metadata(SourceMetadata::new().with_session("TEST"));
///
/// assert_eq!(source.lines().unwrap().count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct VecSource {
    lines: Vec<String>,
    metadata: SourceMetadata,
}

impl VecSource {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            metadata: SourceMetadata::new()
                .with_provider("memory")
                .with_estimated_lines(lines.len() as u64),
            lines,
        }
    }

    /// Build from borrowed lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(lines.into_iter().map(Into::into).collect())
    }

    pub fn with_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl LineSource for VecSource {
    type LineIter = std::iter::Map<std::vec::IntoIter<String>, fn(String) -> Result<String>>;

    fn lines(self) -> Result<Self::LineIter> {
        Ok(self.lines.into_iter().map(Ok as fn(String) -> Result<String>))
    }

    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }
}

// ============================================================================
// File Source
// ============================================================================

/// Feed file on disk, optionally zstd-compressed (`.zst`).
pub struct FileSource {
    path: PathBuf,
    metadata: SourceMetadata,
}

impl FileSource {
    /// Open a feed file. Fails if the file does not exist.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReplayError::Io(format!(
                "File not found: {}",
                path.display()
            )));
        }

        let metadata = SourceMetadata::from_path(path).with_provider("file");
        Ok(Self {
            path: path.to_path_buf(),
            metadata,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_compressed(&self) -> bool {
        self.path.extension().and_then(|e| e.to_str()) == Some("zst")
    }

    fn open(&self) -> Result<Box<dyn BufRead + Send>> {
        let file = File::open(&self.path).map_err(|e| {
            ReplayError::Io(format!("Failed to open {}: {e}", self.path.display()))
        })?;

        if self.is_compressed() {
            #[cfg(feature = "zstd")]
            {
                let decoder = zstd::stream::read::Decoder::new(file).map_err(|e| {
                    ReplayError::Io(format!(
                        "Failed to create zstd decoder for {}: {e}",
                        self.path.display()
                    ))
                })?;
                return Ok(Box::new(BufReader::with_capacity(IO_BUFFER_SIZE, decoder)));
            }
            #[cfg(not(feature = "zstd"))]
            {
                return Err(ReplayError::config(format!(
                    "{} is zstd-compressed but the `zstd` feature is disabled",
                    self.path.display()
                )));
            }
        }

        Ok(Box::new(BufReader::with_capacity(IO_BUFFER_SIZE, file)))
    }
}

impl LineSource for FileSource {
    type LineIter = FileLines;

    fn lines(self) -> Result<Self::LineIter> {
        log::debug!("opening {}", self.path.display());
        Ok(FileLines {
            reader: self.open()?,
            buf: Vec::with_capacity(64),
            done: false,
        })
    }

    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }
}

/// Line iterator over a [`FileSource`].
///
/// Lines are split on `\n`; invalid UTF-8 is replaced rather than failing the
/// read, so the decoder reports it as a fault with the line's position.
pub struct FileLines {
    reader: Box<dyn BufRead + Send>,
    buf: Vec<u8>,
    done: bool,
}

impl Iterator for FileLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => {
                self.done = true;
                Some(Err(ReplayError::Io(format!("Read failed: {e}"))))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_source_metadata_builder() {
        let meta = SourceMetadata::new()
            .with_session("S122607-v2")
            .with_date("122607")
            .with_provider("file")
            .with_estimated_lines(1000);

        assert_eq!(meta.session.as_deref(), Some("S122607-v2"));
        assert_eq!(meta.date.as_deref(), Some("122607"));
        assert_eq!(meta.provider.as_deref(), Some("file"));
        assert_eq!(meta.estimated_lines, Some(1000));
        assert_eq!(meta.label(), "S122607-v2");
    }

    #[test]
    fn test_source_metadata_from_path() {
        let meta = SourceMetadata::from_path("/data/S122607-v2.txt");
        assert_eq!(meta.session.as_deref(), Some("S122607-v2"));
        assert_eq!(meta.date.as_deref(), Some("122607"));

        let meta = SourceMetadata::from_path("/data/itch_20071226.txt.zst");
        assert_eq!(meta.session.as_deref(), Some("itch_20071226"));
        assert_eq!(meta.date.as_deref(), Some("20071226"));

        // Runs of other lengths are not dates
        let meta = SourceMetadata::from_path("/data/feed_1234567.log");
        assert_eq!(meta.session.as_deref(), Some("feed_1234567"));
        assert!(meta.date.is_none());
    }

    #[test]
    fn test_label_fallbacks() {
        assert_eq!(SourceMetadata::new().label(), "stream");
        assert_eq!(SourceMetadata::new().with_date("122607").label(), "122607");
    }

    #[test]
    fn test_vec_source() {
        let source = VecSource::from_lines(["a", "b"]);
        assert_eq!(source.metadata().estimated_lines, Some(2));
        assert_eq!(source.metadata().provider.as_deref(), Some("memory"));

        let lines: Vec<String> = source.lines().unwrap().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn test_file_source_missing() {
        assert!(FileSource::new("/nonexistent/S000000.txt").is_err());
    }

    #[test]
    fn test_file_source_reads_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S122607.txt");
        let mut file = File::create(&path).unwrap();
        write!(file, "first\r\nsecond\n\nlast").unwrap();
        drop(file);

        let source = FileSource::new(&path).unwrap();
        assert_eq!(source.metadata().date.as_deref(), Some("122607"));
        let lines: Vec<String> = source.lines().unwrap().map(|l| l.unwrap()).collect();
        // `\r` is left for the decoder's trailing-whitespace trim
        assert_eq!(lines, vec!["first\r", "second", "", "last"]);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_file_source_zstd() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S122607.txt.zst");
        let compressed = zstd::encode_all(&b"one\ntwo\n"[..], 3).unwrap();
        std::fs::write(&path, compressed).unwrap();

        let source = FileSource::new(&path).unwrap();
        assert_eq!(source.metadata().session.as_deref(), Some("S122607"));
        let lines: Vec<String> = source.lines().unwrap().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["one", "two"]);
    }
}
