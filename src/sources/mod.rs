//! Track lists: the tabular input file and the remote playlist APIs that produce it.

pub mod deezer;
pub mod spotify;

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),
    #[error("Track list {path} is missing required column '{column}'")]
    MissingColumn { path: String, column: &'static str },
    #[error("Missing credentials: {0}")]
    Credentials(String),
    #[error("Unexpected API response: {0}")]
    Api(String),
}

/// A track to analyze.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRef {
    pub name: String,
    pub artist: String,
    /// Short preview clip, when the source offers one.
    pub preview_url: Option<String>,
}

impl TrackRef {
    pub fn new(name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
            preview_url: None,
        }
    }

    /// "Name by Artist", for logs.
    pub fn label(&self) -> String {
        format!("{} by {}", self.name, self.artist)
    }
}

#[derive(Debug, Deserialize)]
struct TrackListRow {
    name: Option<String>,
    artist: Option<String>,
    #[serde(default)]
    preview_url: Option<String>,
}

/// Read a track list with at least `name` and `artist` columns.
///
/// Headers match case-insensitively and extra columns are ignored. Rows with
/// an empty name or artist are skipped with a warning.
pub fn read_track_list(path: &Path) -> Result<Vec<TrackRef>, SourceError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = lowercase_headers(&mut rdr)?;

    for column in ["name", "artist"] {
        if !headers.iter().any(|h| h == column) {
            return Err(SourceError::MissingColumn {
                path: path.display().to_string(),
                column,
            });
        }
    }

    let mut tracks = Vec::new();
    for (line, row) in rdr.deserialize::<TrackListRow>().enumerate() {
        let row = row?;
        let name = row.name.unwrap_or_default().trim().to_string();
        let artist = row.artist.unwrap_or_default().trim().to_string();
        if name.is_empty() || artist.is_empty() {
            log::warn!("Skipping row {} of {}: empty name or artist", line + 2, path.display());
            continue;
        }
        tracks.push(TrackRef {
            name,
            artist,
            preview_url: row.preview_url.filter(|u| !u.trim().is_empty()),
        });
    }

    log::info!("Loaded {} tracks from {}", tracks.len(), path.display());
    Ok(tracks)
}

/// Write a plain `name,artist[,preview_url]` track list.
pub fn write_track_list(path: &Path, tracks: &[TrackRef]) -> Result<(), SourceError> {
    let mut wtr = csv::Writer::from_path(path)?;
    let with_preview = tracks.iter().any(|t| t.preview_url.is_some());
    if with_preview {
        wtr.write_record(["name", "artist", "preview_url"])?;
    } else {
        wtr.write_record(["name", "artist"])?;
    }
    for t in tracks {
        if with_preview {
            wtr.write_record([&t.name, &t.artist, t.preview_url.as_deref().unwrap_or("")])?;
        } else {
            wtr.write_record([&t.name, &t.artist])?;
        }
    }
    wtr.flush()?;
    log::info!("Wrote {} tracks to {}", tracks.len(), path.display());
    Ok(())
}

/// Replace the reader's headers with lowercased, trimmed copies and return them.
pub(crate) fn lowercase_headers<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
) -> Result<csv::StringRecord, csv::Error> {
    let lowered: csv::StringRecord = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    rdr.set_headers(lowered.clone());
    Ok(lowered)
}

/// Build an HTTP agent with a global request timeout.
pub(crate) fn http_agent(timeout_secs: u64) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(timeout_secs)))
        .build()
        .into()
}
