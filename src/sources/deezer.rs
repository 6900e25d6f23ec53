//! Deezer public API: playlist tracks with 30-second preview URLs.

use serde::Deserialize;

use super::{SourceError, TrackRef, http_agent};

const API_BASE: &str = "https://api.deezer.com";
const PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct TracksPage {
    #[serde(default)]
    data: Vec<ApiTrack>,
    next: Option<String>,
    /// Present instead of `data` when the request fails.
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    title: String,
    artist: ApiArtist,
    #[serde(default)]
    preview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl From<ApiTrack> for TrackRef {
    fn from(t: ApiTrack) -> Self {
        TrackRef {
            name: t.title,
            artist: t.artist.name,
            preview_url: t.preview.filter(|p| !p.is_empty()),
        }
    }
}

/// Fetch up to `limit` tracks of a playlist, following `next` links.
///
/// Tracks without a preview are kept; acquisition reports them per track.
pub fn playlist_tracks(playlist_id: &str, limit: usize, timeout_secs: u64) -> Result<Vec<TrackRef>, SourceError> {
    let agent = http_agent(timeout_secs);
    let mut tracks: Vec<TrackRef> = Vec::new();
    let mut url = Some(format!(
        "{API_BASE}/playlist/{playlist_id}/tracks?limit={}",
        PAGE_SIZE.min(limit.max(1))
    ));

    while let Some(next) = url.take() {
        let page: TracksPage = agent.get(&next).call()?.body_mut().read_json()?;
        url = absorb_page(page, &mut tracks, limit)?;
    }

    log::info!("Found {} tracks in Deezer playlist {}", tracks.len(), playlist_id);
    Ok(tracks)
}

/// Append a page and return the next URL to follow, if any.
fn absorb_page(page: TracksPage, tracks: &mut Vec<TrackRef>, limit: usize) -> Result<Option<String>, SourceError> {
    if let Some(err) = page.error {
        return Err(SourceError::Api(err.message));
    }
    let remaining = limit.saturating_sub(tracks.len());
    tracks.extend(page.data.into_iter().take(remaining).map(TrackRef::from));
    if tracks.len() >= limit {
        Ok(None)
    } else {
        Ok(page.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(json: &str) -> TracksPage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_absorb_page_follows_next() {
        let mut tracks = Vec::new();
        let next = absorb_page(
            page(r#"{
                "data": [
                    {"id": 1, "title": "Opus", "artist": {"name": "Eric Prydz"}, "preview": "https://cdn/1.mp3"},
                    {"id": 2, "title": "Silent", "artist": {"name": "Nobody"}, "preview": ""}
                ],
                "next": "https://api.deezer.com/playlist/1/tracks?index=2"
            }"#),
            &mut tracks,
            10,
        )
        .unwrap();

        assert_eq!(next.as_deref(), Some("https://api.deezer.com/playlist/1/tracks?index=2"));
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].preview_url.as_deref(), Some("https://cdn/1.mp3"));
        assert_eq!(tracks[1].preview_url, None);
    }

    #[test]
    fn test_absorb_page_stops_at_limit() {
        let mut tracks = Vec::new();
        let next = absorb_page(
            page(r#"{
                "data": [
                    {"title": "A", "artist": {"name": "X"}},
                    {"title": "B", "artist": {"name": "Y"}}
                ],
                "next": "https://api.deezer.com/more"
            }"#),
            &mut tracks,
            1,
        )
        .unwrap();

        assert_eq!(next, None);
        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn test_api_error_surfaces() {
        let mut tracks = Vec::new();
        let err = absorb_page(
            page(r#"{"error": {"type": "DataException", "message": "no data", "code": 800}}"#),
            &mut tracks,
            10,
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Api(msg) if msg == "no data"));
    }
}
