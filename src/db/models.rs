use serde::Serialize;

use crate::analyzer::mood::Mood;

/// One analyzed track: the flat row of the output table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackFeatureRecord {
    pub name: String,
    pub artist: String,
    /// File path or preview URL the features were computed from.
    pub audio_reference: String,
    pub tempo_bpm: f64,
    pub energy: f64,
    pub danceability: f64,
    pub valence_proxy: f64,
    pub mood: Mood,
}

/// A `tracks` row as stored, before or after cleaning. Any field may be null.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrackRow {
    pub name: Option<String>,
    pub artist: Option<String>,
    pub file: Option<String>,
    pub tempo: Option<f64>,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub valence_proxy: Option<f64>,
    pub mood: Option<String>,
}

impl From<&TrackFeatureRecord> for TrackRow {
    fn from(r: &TrackFeatureRecord) -> Self {
        Self {
            name: Some(r.name.clone()),
            artist: Some(r.artist.clone()),
            file: Some(r.audio_reference.clone()),
            tempo: Some(r.tempo_bpm),
            energy: Some(r.energy),
            danceability: Some(r.danceability),
            valence_proxy: Some(r.valence_proxy),
            mood: Some(r.mood.as_str().to_string()),
        }
    }
}

impl TrackRow {
    /// Complete record, if every feature column is present and the mood is a known label.
    pub fn to_record(&self) -> Option<TrackFeatureRecord> {
        Some(TrackFeatureRecord {
            name: self.name.clone()?,
            artist: self.artist.clone()?,
            audio_reference: self.file.clone().unwrap_or_default(),
            tempo_bpm: self.tempo?,
            energy: self.energy?,
            danceability: self.danceability?,
            valence_proxy: self.valence_proxy?,
            mood: self.mood.as_deref()?.parse().ok()?,
        })
    }
}

/// What one cleaning pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub duplicates_removed: usize,
    pub nulls_filled: usize,
    pub tempo_clamped: usize,
    pub moods_coerced: usize,
}

impl CleanReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Table-wide feature averages.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureAverages {
    pub track_count: i64,
    pub avg_tempo: Option<f64>,
    pub avg_energy: Option<f64>,
    pub avg_danceability: Option<f64>,
    pub avg_valence: Option<f64>,
}

/// Tracks sharing a rounded tempo.
#[derive(Debug, Clone, Serialize)]
pub struct TempoBucket {
    pub tempo: i64,
    pub track_count: i64,
    pub avg_danceability: f64,
    pub moods: String,
}

/// Per-artist energy summary.
#[derive(Debug, Clone, Serialize)]
pub struct ArtistEnergy {
    pub artist: String,
    pub track_count: i64,
    pub avg_energy: f64,
    pub moods: String,
}

/// Track count within a named tempo range.
#[derive(Debug, Clone, Serialize)]
pub struct TempoRangeCount {
    pub range: String,
    pub track_count: i64,
    pub avg_energy: f64,
    pub moods: String,
}

/// Per-mood summary.
#[derive(Debug, Clone, Serialize)]
pub struct MoodSummary {
    pub mood: String,
    pub track_count: i64,
    pub avg_energy: f64,
    pub avg_danceability: f64,
    pub avg_valence: f64,
}

/// Library-level statistics.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryStats {
    pub total_tracks: i64,
    pub complete_tracks: i64,
    pub artists: i64,
    pub moods: Vec<(String, i64)>,
}

/// All canned analysis queries in one bundle.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub averages: FeatureAverages,
    pub bangers: Vec<TrackFeatureRecord>,
    pub tempo_buckets: Vec<TempoBucket>,
    pub top_artists: Vec<ArtistEnergy>,
    pub tempo_ranges: Vec<TempoRangeCount>,
    pub outliers: Vec<TrackFeatureRecord>,
    pub moods: Vec<MoodSummary>,
}
