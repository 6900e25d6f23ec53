use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{AcquireError, AcquiredAudio, AudioAcquirer, AudioPayload, ReferenceKind, cache_path, cache_stem};
use crate::sources::TrackRef;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Search-based downloader backed by an external `yt-dlp`-compatible binary.
///
/// Files are cached by search query; a cached file is reused without spawning
/// the downloader.
pub struct Downloader {
    pub program: String,
    pub cache_dir: PathBuf,
    pub timeout: Duration,
    /// Reject search results longer than this.
    pub max_duration_secs: u32,
}

impl Downloader {
    pub fn new(program: impl Into<String>, cache_dir: PathBuf, timeout: Duration, max_duration_secs: u32) -> Self {
        Self {
            program: program.into(),
            cache_dir,
            timeout,
            max_duration_secs,
        }
    }

    /// Search query for a track.
    pub fn query(track: &TrackRef) -> String {
        format!("{} {} track", track.name, track.artist)
    }

    pub fn cached_file(&self, track: &TrackRef) -> PathBuf {
        cache_path(&self.cache_dir, &cache_stem(&Self::query(track)), "mp3")
    }

    fn download(&self, query: &str, output: &Path) -> Result<(), AcquireError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-x", "--audio-format", "mp3"])
            .arg(format!("ytsearch:{query}"))
            .args(["--match-filter", &format!("duration <= {}", self.max_duration_secs)])
            .arg("-o")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|source| AcquireError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        run_with_timeout(child, &self.program, self.timeout)
    }
}

/// Wait for `child`, killing it once `timeout` elapses.
fn run_with_timeout(mut child: Child, program: &str, timeout: Duration) -> Result<(), AcquireError> {
    // Drain stderr on a helper thread so a chatty child cannot block on a full pipe
    let stderr_reader = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = String::new();
            pipe.read_to_string(&mut buf).ok();
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            child.kill().ok();
            child.wait().ok();
            return Err(AcquireError::Timeout {
                program: program.to_string(),
                secs: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(AcquireError::DownloaderFailed {
            program: program.to_string(),
            status: status.to_string(),
            stderr: stderr.trim().lines().last().unwrap_or("").to_string(),
        })
    }
}

impl AudioAcquirer for Downloader {
    fn acquire(&self, track: &TrackRef) -> Result<AcquiredAudio, AcquireError> {
        let path = self.cached_file(track);

        if path.exists() {
            log::info!("Using cached: {}", path.display());
        } else {
            std::fs::create_dir_all(&self.cache_dir)?;
            let query = Self::query(track);
            log::info!("Downloading: {query}");
            if let Err(e) = self.download(&query, &path) {
                if matches!(e, AcquireError::Timeout { .. } | AcquireError::DownloaderFailed { .. }) {
                    // A partial file would otherwise be reused as a cache hit
                    std::fs::remove_file(&path).ok();
                }
                return Err(e);
            }
            if !path.exists() {
                return Err(AcquireError::MissingOutput(path));
            }
        }

        Ok(AcquiredAudio {
            reference: path.to_string_lossy().into_owned(),
            payload: AudioPayload::File(path),
        })
    }

    fn reference_kind(&self) -> ReferenceKind {
        ReferenceKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloader(dir: &Path, program: &str) -> Downloader {
        Downloader::new(program, dir.to_path_buf(), Duration::from_secs(5), 600)
    }

    #[test]
    fn test_query_format() {
        let t = TrackRef::new("Opus", "Eric Prydz");
        assert_eq!(Downloader::query(&t), "Opus Eric Prydz track");
    }

    #[test]
    fn test_cached_file_reused_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let d = downloader(dir.path(), "/nonexistent/yt-dlp");
        let t = TrackRef::new("Opus", "Eric Prydz");
        std::fs::write(d.cached_file(&t), b"cached").unwrap();

        let audio = d.acquire(&t).unwrap();
        assert!(audio.reference.ends_with("Opus_Eric_Prydz_track.mp3"));
        assert!(matches!(audio.payload, AudioPayload::File(_)));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let d = downloader(dir.path(), "/nonexistent/yt-dlp");
        let err = d.acquire(&TrackRef::new("Opus", "Eric Prydz")).unwrap_err();
        assert!(matches!(err, AcquireError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let d = downloader(dir.path(), "false");
        let err = d.acquire(&TrackRef::new("Opus", "Eric Prydz")).unwrap_err();
        assert!(matches!(err, AcquireError::DownloaderFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_success_without_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let d = downloader(dir.path(), "true");
        let err = d.acquire(&TrackRef::new("Opus", "Eric Prydz")).unwrap_err();
        assert!(matches!(err, AcquireError::MissingOutput(_)));
    }

    /// Shell script standing in for the downloader: writes to its last
    /// argument (the `-o` path), then runs `tail`.
    #[cfg(unix)]
    fn fake_downloader(dir: &Path, tail: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-dl.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nfor a; do out=\"$a\"; done\necho partial > \"$out\"\n{tail}\n"),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_download_leaves_no_cache_entry() {
        let bin = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let script = fake_downloader(bin.path(), "exit 1");
        let d = downloader(cache.path(), script.to_str().unwrap());
        let t = TrackRef::new("Opus", "Eric Prydz");

        let err = d.acquire(&t).unwrap_err();
        assert!(matches!(err, AcquireError::DownloaderFailed { .. }));
        assert!(!d.cached_file(&t).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_timed_out_download_leaves_no_cache_entry() {
        let bin = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let script = fake_downloader(bin.path(), "exec sleep 10");
        let d = Downloader::new(
            script.to_str().unwrap(),
            cache.path().to_path_buf(),
            Duration::from_millis(500),
            600,
        );
        let t = TrackRef::new("Opus", "Eric Prydz");

        let err = d.acquire(&t).unwrap_err();
        assert!(matches!(err, AcquireError::Timeout { .. }));
        assert!(!d.cached_file(&t).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let child = Command::new("sleep")
            .arg("10")
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let started = Instant::now();
        let err = run_with_timeout(child, "sleep", Duration::from_millis(300)).unwrap_err();
        assert!(matches!(err, AcquireError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
