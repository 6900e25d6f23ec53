pub mod danceability;
pub mod decode;
pub mod features;
pub mod mood;
pub mod params;
pub mod spectral;
pub mod tempo;

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use crate::acquire::{AcquireError, AudioAcquirer};
use crate::db::models::TrackFeatureRecord;
use crate::export::{self, ExportError};
use crate::sources::TrackRef;

/// Why a single track produced no record.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Acquisition failed: {0}")]
    Acquire(#[from] AcquireError),
    #[error("Decode failed: {0}")]
    Decode(#[from] decode::DecodeError),
}

/// Result for one track of a batch.
#[derive(Debug)]
pub struct TrackOutcome {
    pub track: TrackRef,
    pub result: Result<TrackFeatureRecord, AnalyzeError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<TrackOutcome>,
}

impl BatchReport {
    /// Successful records, in input order.
    pub fn records(&self) -> Vec<TrackFeatureRecord> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().cloned())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&TrackRef, &AnalyzeError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.track, e)))
    }

    pub fn analyzed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.analyzed()
    }
}

/// Acquire, extract and classify one track.
pub fn analyze_track(
    track: &TrackRef,
    acquirer: &dyn AudioAcquirer,
) -> Result<TrackFeatureRecord, AnalyzeError> {
    let acquired = acquirer.acquire(track)?;
    let reference = acquired.reference.clone();
    let audio = acquired.decode()?;

    log::debug!(
        "Decoded {}: {:.1}s at {} Hz",
        track.label(),
        audio.duration_secs(),
        audio.sample_rate
    );

    let f = features::extract(&audio);
    Ok(TrackFeatureRecord {
        name: track.name.clone(),
        artist: track.artist.clone(),
        audio_reference: reference,
        tempo_bpm: f.tempo_bpm,
        energy: f.energy,
        danceability: f.danceability,
        valence_proxy: f.valence_proxy,
        mood: mood::classify(f.valence_proxy, f.energy),
    })
}

/// Analyze tracks one after another. A failing track is logged and recorded
/// in the report; it never stops the batch.
pub fn analyze_batch(tracks: &[TrackRef], acquirer: &dyn AudioAcquirer) -> BatchReport {
    let mut report = BatchReport::default();
    if tracks.is_empty() {
        log::info!("No tracks to analyze");
        return report;
    }

    log::info!("Analyzing {} tracks", tracks.len());

    let pb = ProgressBar::new(tracks.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );

    let mut analyzed = 0usize;
    let mut failed = 0usize;

    for track in tracks {
        let result = analyze_track(track, acquirer);
        match &result {
            Ok(record) => {
                analyzed += 1;
                log::info!(
                    "{}: {} BPM, energy {:.3}, mood {}",
                    track.label(),
                    record.tempo_bpm,
                    record.energy,
                    record.mood
                );
            }
            Err(e) => {
                failed += 1;
                log::warn!("Skipping {}: {}", track.label(), e);
            }
        }
        report.outcomes.push(TrackOutcome {
            track: track.clone(),
            result,
        });
        pb.inc(1);
        pb.set_message(format!("{analyzed} analyzed, {failed} failed"));
    }

    pb.finish_with_message(format!("Done: {analyzed} analyzed, {failed} failed"));
    report
}

/// Analyze a batch and write the successful records to a feature table at
/// `output`, with the reference column the acquirer produces.
///
/// The table is written even when every track fails.
pub fn analyze_to_table(
    tracks: &[TrackRef],
    acquirer: &dyn AudioAcquirer,
    output: &Path,
) -> Result<BatchReport, ExportError> {
    let report = analyze_batch(tracks, acquirer);
    export::write_features_csv(output, &report.records(), acquirer.reference_kind())?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::{AcquiredAudio, AudioPayload, ReferenceKind};
    use std::path::PathBuf;

    fn write_clicks(path: &Path, secs: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        // 120 BPM clicks: one every 0.5 s
        for i in 0..secs * 8000 {
            let t = (i % 4000) as f32 / 8000.0;
            let click = (2.0 * std::f32::consts::PI * 1000.0 * t).sin() * (-t * 60.0).exp();
            writer.write_sample((click * 20_000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    /// Serves one WAV for every track except the ones named in `broken`.
    struct FakeAcquirer {
        wav: PathBuf,
        broken: Vec<&'static str>,
    }

    impl AudioAcquirer for FakeAcquirer {
        fn acquire(&self, track: &TrackRef) -> Result<AcquiredAudio, AcquireError> {
            if self.broken.contains(&track.name.as_str()) {
                return Err(AcquireError::DownloaderFailed {
                    program: "fake".into(),
                    status: "exit status: 1".into(),
                    stderr: "no results".into(),
                });
            }
            Ok(AcquiredAudio {
                reference: format!("{}.wav", track.name),
                payload: AudioPayload::File(self.wav.clone()),
            })
        }

        fn reference_kind(&self) -> ReferenceKind {
            ReferenceKind::File
        }
    }

    fn tracks() -> Vec<TrackRef> {
        vec![
            TrackRef::new("Opus", "Eric Prydz"),
            TrackRef::new("Cola", "CamelPhat"),
            TrackRef::new("Breathe", "CamelPhat"),
        ]
    }

    #[test]
    fn test_batch_skips_failed_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("clicks.wav");
        write_clicks(&wav, 4);
        let acquirer = FakeAcquirer {
            wav,
            broken: vec!["Cola"],
        };

        let report = analyze_batch(&tracks(), &acquirer);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.analyzed(), 2);
        assert_eq!(report.failed(), 1);

        let names: Vec<_> = report.records().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Opus", "Breathe"]);

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures[0].0.name, "Cola");
        assert!(matches!(failures[0].1, AnalyzeError::Acquire(_)));
    }

    #[test]
    fn test_records_carry_reference_and_valid_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("clicks.wav");
        write_clicks(&wav, 4);
        let acquirer = FakeAcquirer { wav, broken: vec![] };

        for record in analyze_batch(&tracks(), &acquirer).records() {
            assert_eq!(record.audio_reference, format!("{}.wav", record.name));
            assert!((0.0..=1.0).contains(&record.energy));
            assert!((0.0..=1.0).contains(&record.danceability));
            assert!((0.0..=1.0).contains(&record.valence_proxy));
            assert_eq!(record.tempo_bpm, record.tempo_bpm.round());
            assert_eq!(record.mood, mood::classify(record.valence_proxy, record.energy));
        }
    }

    #[test]
    fn test_undecodable_audio_is_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("junk.wav");
        std::fs::write(&junk, b"not a wav file at all").unwrap();
        let acquirer = FakeAcquirer {
            wav: junk,
            broken: vec![],
        };

        let report = analyze_batch(&tracks()[..1], &acquirer);
        assert_eq!(report.analyzed(), 0);
        assert!(matches!(
            report.outcomes[0].result,
            Err(AnalyzeError::Decode(_))
        ));
    }

    #[test]
    fn test_empty_batch() {
        let acquirer = FakeAcquirer {
            wav: PathBuf::from("/unused.wav"),
            broken: vec![],
        };
        let report = analyze_batch(&[], &acquirer);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn test_table_omits_failed_track() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("clicks.wav");
        write_clicks(&wav, 4);
        let acquirer = FakeAcquirer {
            wav,
            broken: vec!["Cola"],
        };
        let output = dir.path().join("out").join("features.csv");

        let report = analyze_to_table(&tracks(), &acquirer, &output).unwrap();
        assert_eq!(report.failed(), 1);

        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.starts_with("Name,Artist,File,Tempo,Energy,Danceability,Valence_Proxy,Mood\n"));
        assert!(!text.contains("Cola"));

        let rows = export::read_features_csv(&output).unwrap();
        let names: Vec<_> = rows.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["Opus", "Breathe"]);
        assert_eq!(rows[1].file.as_deref(), Some("Breathe.wav"));
        assert!(rows.iter().all(|r| r.to_record().is_some()));
    }

    #[test]
    fn test_table_written_when_every_track_fails() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FakeAcquirer {
            wav: PathBuf::from("/unused.wav"),
            broken: vec!["Opus", "Cola", "Breathe"],
        };
        let output = dir.path().join("features.csv");

        let report = analyze_to_table(&tracks(), &acquirer, &output).unwrap();
        assert_eq!(report.analyzed(), 0);
        assert!(export::read_features_csv(&output).unwrap().is_empty());
    }
}
