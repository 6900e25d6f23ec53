use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::sources::SourceError;

/// Application configuration loaded from TOML config file.
/// All fields have defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Where downloaded audio and preview clips are kept (overrides XDG cache dir).
    pub cache_dir: Option<PathBuf>,
    pub acquisition: AcquisitionConfig,
    pub spotify: SpotifyConfig,
    pub deezer: DeezerConfig,
}

/// Audio download / streaming settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Search-based downloader binary.
    pub downloader: String,
    /// Kill the downloader after this many seconds.
    pub download_timeout_secs: u64,
    /// Global timeout for API calls and preview fetches.
    pub http_timeout_secs: u64,
    /// Skip search results longer than this.
    pub max_duration_secs: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            downloader: "yt-dlp".to_string(),
            download_timeout_secs: 300,
            http_timeout_secs: 30,
            max_duration_secs: 600,
        }
    }
}

/// Spotify client-credentials. `SPOTIFY_CLIENT_ID` / `SPOTIFY_CLIENT_SECRET` take precedence.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl SpotifyConfig {
    /// Resolve (client id, client secret), environment first.
    pub fn credentials(&self) -> Result<(String, String), SourceError> {
        let pick = |var: &str, file: &Option<String>| {
            std::env::var(var)
                .ok()
                .or_else(|| file.clone())
                .filter(|v| !v.trim().is_empty())
        };
        let id = pick("SPOTIFY_CLIENT_ID", &self.client_id);
        let secret = pick("SPOTIFY_CLIENT_SECRET", &self.client_secret);
        match (id, secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(SourceError::Credentials(
                "set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET or [spotify] in config.toml"
                    .to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeezerConfig {
    pub playlist_id: String,
    /// Maximum tracks to pull from the playlist.
    pub limit: usize,
}

impl Default for DeezerConfig {
    fn default() -> Self {
        Self {
            playlist_id: "3155776842".to_string(),
            limit: 100,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/trackmood/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Cache directory: config value, else the XDG cache dir, else `./audio_cache`.
    pub fn resolve_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.cache_dir().join("audio"))
            .unwrap_or_else(|| PathBuf::from("audio_cache"))
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("trackmood.db")
    } else {
        // Fallback: current directory
        PathBuf::from("trackmood.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert!(config.db_path.is_none());
        assert_eq!(config.acquisition.downloader, "yt-dlp");
        assert_eq!(config.acquisition.max_duration_secs, 600);
        assert_eq!(config.deezer.playlist_id, "3155776842");
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::parse(
            r#"
            cache_dir = "/tmp/tm-cache"

            [acquisition]
            download_timeout_secs = 60

            [deezer]
            limit = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.resolve_cache_dir(), PathBuf::from("/tmp/tm-cache"));
        assert_eq!(config.acquisition.download_timeout_secs, 60);
        assert_eq!(config.acquisition.http_timeout_secs, 30);
        assert_eq!(config.deezer.limit, 25);
        assert_eq!(config.deezer.playlist_id, "3155776842");
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(AppConfig::parse("[acquisition\n").is_err());
        assert!(AppConfig::parse("[deezer]\nlimit = \"lots\"\n").is_err());
    }
}
