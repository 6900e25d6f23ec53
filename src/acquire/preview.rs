use std::path::PathBuf;

use super::{AcquireError, AcquiredAudio, AudioAcquirer, AudioPayload, ReferenceKind, cache_path, cache_stem};
use crate::sources::{TrackRef, http_agent};

/// Previews are ~30 s clips; anything far beyond this is not a preview.
const MAX_PREVIEW_BYTES: u64 = 20 * 1024 * 1024;

/// Streams short preview clips over HTTP.
///
/// With a cache directory, downloaded clips are kept on disk and reused.
pub struct PreviewFetcher {
    agent: ureq::Agent,
    cache_dir: Option<PathBuf>,
}

impl PreviewFetcher {
    pub fn new(timeout_secs: u64, cache_dir: Option<PathBuf>) -> Self {
        Self {
            agent: http_agent(timeout_secs),
            cache_dir,
        }
    }

    fn cached_file(&self, track: &TrackRef) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| {
            cache_path(dir, &cache_stem(&format!("{} {} preview", track.name, track.artist)), "mp3")
        })
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, AcquireError> {
        let data = self
            .agent
            .get(url)
            .call()?
            .body_mut()
            .with_config()
            .limit(MAX_PREVIEW_BYTES)
            .read_to_vec()?;
        log::debug!("Fetched {} bytes from {url}", data.len());
        Ok(data)
    }
}

impl AudioAcquirer for PreviewFetcher {
    fn acquire(&self, track: &TrackRef) -> Result<AcquiredAudio, AcquireError> {
        let url = track.preview_url.as_deref().ok_or(AcquireError::NoPreview)?;
        let cached = self.cached_file(track);

        if let Some(path) = cached.as_ref().filter(|p| p.exists()) {
            log::info!("Using cached preview: {}", path.display());
            return Ok(AcquiredAudio {
                reference: url.to_string(),
                payload: AudioPayload::File(path.clone()),
            });
        }

        log::info!("Streaming preview: {}", track.label());
        let data = self.fetch(url)?;

        if let Some(path) = cached {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &data)?;
        }

        Ok(AcquiredAudio {
            reference: url.to_string(),
            payload: AudioPayload::Bytes {
                data,
                ext_hint: Some("mp3".to_string()),
            },
        })
    }

    fn reference_kind(&self) -> ReferenceKind {
        ReferenceKind::PreviewUrl
    }
}
