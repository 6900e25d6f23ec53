//! Spotify Web API: client-credentials auth and paginated playlist tracks.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use super::{SourceError, TrackRef, http_agent};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";
/// Maximum page size the playlist endpoint accepts.
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    /// Null for removed or local tracks.
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: Option<String>,
    name: String,
    artists: Vec<ApiArtist>,
    #[serde(default)]
    popularity: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

/// One playlist entry as exported to the track list.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotifyTrack {
    pub name: String,
    pub artist: String,
    pub spotify_id: String,
    pub popularity: Option<u32>,
}

impl From<&SpotifyTrack> for TrackRef {
    fn from(t: &SpotifyTrack) -> Self {
        TrackRef::new(t.name.clone(), t.artist.clone())
    }
}

pub struct SpotifyClient {
    agent: ureq::Agent,
    token: String,
}

impl SpotifyClient {
    /// Request an app token with the client-credentials grant.
    pub fn connect(client_id: &str, client_secret: &str, timeout_secs: u64) -> Result<Self, SourceError> {
        let agent = http_agent(timeout_secs);
        let basic = STANDARD.encode(format!("{client_id}:{client_secret}"));

        let token: TokenResponse = agent
            .post(TOKEN_URL)
            .header("Authorization", &format!("Basic {basic}"))
            .send_form([("grant_type", "client_credentials")])?
            .body_mut()
            .read_json()?;

        log::debug!("Obtained Spotify access token");
        Ok(Self {
            agent,
            token: token.access_token,
        })
    }

    /// Fetch up to `limit` tracks of a playlist, following pagination.
    pub fn playlist_tracks(&self, playlist_id: &str, limit: usize) -> Result<Vec<SpotifyTrack>, SourceError> {
        let mut tracks = Vec::new();
        let mut offset = 0;

        loop {
            let url = format!(
                "{API_BASE}/playlists/{playlist_id}/tracks?offset={offset}&limit={PAGE_SIZE}"
            );
            let page: PlaylistPage = self
                .agent
                .get(&url)
                .header("Authorization", &format!("Bearer {}", self.token))
                .call()?
                .body_mut()
                .read_json()?;

            let page_len = page.items.len();
            tracks.extend(page.items.into_iter().filter_map(convert_item));
            log::debug!("Playlist page at offset {offset}: {page_len} items");

            offset += PAGE_SIZE;
            if page_len < PAGE_SIZE || tracks.len() >= limit {
                break;
            }
        }

        tracks.truncate(limit);
        log::info!("Fetched {} tracks from Spotify playlist {}", tracks.len(), playlist_id);
        Ok(tracks)
    }
}

fn convert_item(item: PlaylistItem) -> Option<SpotifyTrack> {
    let track = item.track?;
    let artist = track.artists.into_iter().next()?.name;
    Some(SpotifyTrack {
        name: track.name,
        artist,
        spotify_id: track.id.unwrap_or_default(),
        popularity: track.popularity,
    })
}

/// Write `name,artist,spotify_id,popularity`. The header is written even for an empty playlist.
pub fn write_tracks_csv(path: &Path, tracks: &[SpotifyTrack]) -> Result<(), SourceError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["name", "artist", "spotify_id", "popularity"])?;
    for t in tracks {
        let popularity = t.popularity.map(|p| p.to_string()).unwrap_or_default();
        wtr.write_record([
            t.name.as_str(),
            t.artist.as_str(),
            t.spotify_id.as_str(),
            popularity.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "items": [
            {"track": {"id": "1", "name": "Opus", "artists": [{"name": "Eric Prydz"}, {"name": "Other"}], "popularity": 71}},
            {"track": null},
            {"track": {"id": null, "name": "Local File", "artists": [{"name": "Me"}]}},
            {"track": {"id": "3", "name": "No Artist", "artists": []}}
        ],
        "next": null
    }"#;

    #[test]
    fn test_page_conversion_skips_null_tracks() {
        let page: PlaylistPage = serde_json::from_str(PAGE).unwrap();
        let tracks: Vec<_> = page.items.into_iter().filter_map(convert_item).collect();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].artist, "Eric Prydz");
        assert_eq!(tracks[0].popularity, Some(71));
        assert_eq!(tracks[1].spotify_id, "");
        assert_eq!(tracks[1].popularity, None);
    }

    #[test]
    fn test_csv_feeds_track_list_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spotify.csv");
        let tracks = vec![SpotifyTrack {
            name: "Opus".into(),
            artist: "Eric Prydz".into(),
            spotify_id: "1".into(),
            popularity: Some(71),
        }];
        write_tracks_csv(&path, &tracks).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("name,artist,spotify_id,popularity"));

        let refs = super::super::read_track_list(&path).unwrap();
        assert_eq!(refs, vec![TrackRef::from(&tracks[0])]);
    }

    #[test]
    fn test_empty_playlist_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_tracks_csv(&path, &[]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "name,artist,spotify_id,popularity\n");
        assert!(super::super::read_track_list(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_popularity_is_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spotify.csv");
        let tracks = vec![SpotifyTrack {
            name: "Local File".into(),
            artist: "Me".into(),
            spotify_id: String::new(),
            popularity: None,
        }];
        write_tracks_csv(&path, &tracks).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("Local File,Me,,\n"));
    }

    #[test]
    fn test_plain_track_list_from_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");
        let tracks = vec![SpotifyTrack {
            name: "Cola".into(),
            artist: "CamelPhat".into(),
            spotify_id: "2".into(),
            popularity: Some(80),
        }];
        let refs: Vec<TrackRef> = tracks.iter().map(Into::into).collect();
        super::super::write_track_list(&path, &refs).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "name,artist\nCola,CamelPhat\n");
    }
}
