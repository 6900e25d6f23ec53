//! Audio acquisition: turn a track reference into decodable audio.

pub mod download;
pub mod preview;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::analyzer::decode::{self, DecodeError, MonoAudio};
use crate::sources::TrackRef;

pub use download::Downloader;
pub use preview::PreviewFetcher;

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No preview available")]
    NoPreview,
    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),
    #[error("Could not start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    DownloaderFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },
    #[error("Downloader reported success but produced no file at {0}")]
    MissingOutput(PathBuf),
}

/// Where the decodable audio lives.
#[derive(Debug, Clone)]
pub enum AudioPayload {
    File(PathBuf),
    /// Streamed bytes, with a container hint such as "mp3".
    Bytes { data: Vec<u8>, ext_hint: Option<String> },
}

/// Audio ready for decoding, plus the reference recorded in the output table.
#[derive(Debug, Clone)]
pub struct AcquiredAudio {
    /// File path or URL, as written to the File / Preview_URL column.
    pub reference: String,
    pub payload: AudioPayload,
}

impl AcquiredAudio {
    pub fn decode(self) -> Result<MonoAudio, DecodeError> {
        match self.payload {
            AudioPayload::File(path) => decode::load_file(&path),
            AudioPayload::Bytes { data, ext_hint } => decode::load_bytes(data, ext_hint.as_deref()),
        }
    }
}

/// Which column the reference belongs to in exported tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    File,
    PreviewUrl,
}

impl ReferenceKind {
    pub fn column(&self) -> &'static str {
        match self {
            Self::File => "File",
            Self::PreviewUrl => "Preview_URL",
        }
    }
}

/// Resolves audio for a track. Implementations block; callers process tracks
/// one at a time.
pub trait AudioAcquirer {
    fn acquire(&self, track: &TrackRef) -> Result<AcquiredAudio, AcquireError>;

    fn reference_kind(&self) -> ReferenceKind;
}

static UNSAFE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// File-system safe stem: whitespace runs become `_`, other unsafe characters are dropped.
pub fn cache_stem(text: &str) -> String {
    let underscored = WHITESPACE_RE.replace_all(text.trim(), "_");
    let stem = UNSAFE_CHARS_RE.replace_all(&underscored, "").into_owned();
    if stem.is_empty() { "track".to_string() } else { stem }
}

/// Cached file path for a stem and extension inside `dir`.
pub fn cache_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    dir.join(format!("{stem}.{ext}"))
}
