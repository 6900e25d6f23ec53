use super::cleaning::{DEFAULT_DANCEABILITY, DEFAULT_ENERGY};
use super::models::{
    AnalysisReport, ArtistEnergy, FeatureAverages, LibraryStats, MoodSummary, TempoBucket,
    TempoRangeCount, TrackFeatureRecord, TrackRow,
};
use super::{Database, Result};
use rusqlite::{Row, params};

/// How many rows the "top N" reports return.
pub const REPORT_LIMIT: usize = 5;

/// Standard deviations above the mean that mark an outlier.
const OUTLIER_SIGMAS: f64 = 2.0;

const ROW_COLUMNS: &str = "name, artist, file, tempo, energy, danceability, valence_proxy, mood";

fn read_row(row: &Row<'_>) -> rusqlite::Result<TrackRow> {
    Ok(TrackRow {
        name: row.get(0)?,
        artist: row.get(1)?,
        file: row.get(2)?,
        tempo: row.get(3)?,
        energy: row.get(4)?,
        danceability: row.get(5)?,
        valence_proxy: row.get(6)?,
        mood: row.get(7)?,
    })
}

impl Database {
    /// Insert raw rows in a single transaction. Any failure rolls back the whole batch.
    pub fn insert_rows(&self, rows: &[TrackRow]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO tracks ({ROW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ))?;
            for r in rows {
                stmt.execute(params![
                    r.name,
                    r.artist,
                    r.file,
                    r.tempo,
                    r.energy,
                    r.danceability,
                    r.valence_proxy,
                    r.mood,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Insert freshly analyzed records.
    pub fn insert_records(&self, records: &[TrackFeatureRecord]) -> Result<usize> {
        let rows: Vec<TrackRow> = records.iter().map(TrackRow::from).collect();
        self.insert_rows(&rows)
    }

    /// Remove every row.
    pub fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM tracks", [])?)
    }

    /// All rows in insertion order.
    pub fn all_rows(&self) -> Result<Vec<TrackRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ROW_COLUMNS} FROM tracks ORDER BY rowid"))?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Complete rows as records; incomplete rows are skipped.
    pub fn all_records(&self) -> Result<Vec<TrackFeatureRecord>> {
        Ok(self.all_rows()?.iter().filter_map(TrackRow::to_record).collect())
    }

    pub fn stats(&self) -> Result<LibraryStats> {
        let total_tracks: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))?;

        let complete_tracks: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tracks
             WHERE tempo IS NOT NULL AND energy IS NOT NULL AND danceability IS NOT NULL
               AND valence_proxy IS NOT NULL AND mood IS NOT NULL",
            [],
            |r| r.get(0),
        )?;

        let artists: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT artist) FROM tracks",
            [],
            |r| r.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(mood, '(none)'), COUNT(*) FROM tracks
             GROUP BY mood ORDER BY COUNT(*) DESC, mood",
        )?;
        let moods = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(LibraryStats {
            total_tracks,
            complete_tracks,
            artists,
            moods,
        })
    }

    // ── Analysis reports ──────────────────────────────────────────────

    pub fn feature_averages(&self) -> Result<FeatureAverages> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*),
                    ROUND(AVG(tempo), 1),
                    ROUND(AVG(energy), 3),
                    ROUND(AVG(danceability), 3),
                    ROUND(AVG(valence_proxy), 3)
             FROM tracks",
            [],
            |r| {
                Ok(FeatureAverages {
                    track_count: r.get(0)?,
                    avg_tempo: r.get(1)?,
                    avg_energy: r.get(2)?,
                    avg_danceability: r.get(3)?,
                    avg_valence: r.get(4)?,
                })
            },
        )?)
    }

    /// High-energy, high-danceability tracks, most energetic first.
    pub fn bangers(&self, limit: usize) -> Result<Vec<TrackFeatureRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ROW_COLUMNS} FROM tracks
             WHERE energy > ?1 AND danceability > ?2
             ORDER BY energy DESC, danceability DESC
             LIMIT ?3"
        ))?;
        let rows = stmt
            .query_map(params![DEFAULT_ENERGY, DEFAULT_DANCEABILITY, limit as i64], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.iter().filter_map(TrackRow::to_record).collect())
    }

    pub fn tempo_buckets(&self) -> Result<Vec<TempoBucket>> {
        let mut stmt = self.conn.prepare(
            "SELECT CAST(ROUND(tempo) AS INTEGER) AS bucket,
                    COUNT(*),
                    ROUND(AVG(danceability), 3),
                    GROUP_CONCAT(mood, ', ')
             FROM tracks
             WHERE tempo IS NOT NULL
             GROUP BY bucket
             ORDER BY bucket",
        )?;
        let buckets = stmt
            .query_map([], |r| {
                Ok(TempoBucket {
                    tempo: r.get(0)?,
                    track_count: r.get(1)?,
                    avg_danceability: r.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                    moods: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(buckets)
    }

    /// Artists ranked by average energy over their high-energy tracks.
    pub fn top_artists(&self, limit: usize) -> Result<Vec<ArtistEnergy>> {
        let mut stmt = self.conn.prepare(
            "SELECT artist,
                    COUNT(*),
                    ROUND(AVG(energy), 3) AS avg_energy,
                    GROUP_CONCAT(DISTINCT mood)
             FROM tracks
             WHERE energy > ?1 AND artist IS NOT NULL
             GROUP BY artist
             ORDER BY avg_energy DESC
             LIMIT ?2",
        )?;
        let artists = stmt
            .query_map(params![DEFAULT_ENERGY, limit as i64], |r| {
                Ok(ArtistEnergy {
                    artist: r.get(0)?,
                    track_count: r.get(1)?,
                    avg_energy: r.get(2)?,
                    moods: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(artists)
    }

    /// Slow (≤122), Mid (123-126) and Fast (127-140) tempo ranges.
    pub fn tempo_ranges(&self) -> Result<Vec<TempoRangeCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT CASE
                        WHEN tempo <= 122 THEN 'Slow (110-122)'
                        WHEN tempo <= 126 THEN 'Mid (123-126)'
                        ELSE 'Fast (127-140)'
                    END AS tempo_range,
                    COUNT(*),
                    ROUND(AVG(energy), 3),
                    GROUP_CONCAT(DISTINCT mood)
             FROM tracks
             WHERE tempo IS NOT NULL
             GROUP BY tempo_range
             ORDER BY tempo_range",
        )?;
        let ranges = stmt
            .query_map([], |r| {
                Ok(TempoRangeCount {
                    range: r.get(0)?,
                    track_count: r.get(1)?,
                    avg_energy: r.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                    moods: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ranges)
    }

    /// Tracks more than two standard deviations above the mean energy or danceability.
    ///
    /// SQLite has no STDDEV, so the thresholds are computed here.
    pub fn outliers(&self, limit: usize) -> Result<Vec<TrackFeatureRecord>> {
        let records = self.all_records()?;
        let energies: Vec<f64> = records.iter().map(|r| r.energy).collect();
        let dances: Vec<f64> = records.iter().map(|r| r.danceability).collect();

        let (Some(energy_cut), Some(dance_cut)) = (outlier_cutoff(&energies), outlier_cutoff(&dances))
        else {
            return Ok(Vec::new());
        };

        Ok(records
            .into_iter()
            .filter(|r| r.energy > energy_cut || r.danceability > dance_cut)
            .take(limit)
            .collect())
    }

    pub fn mood_summary(&self) -> Result<Vec<MoodSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT mood,
                    COUNT(*) AS track_count,
                    ROUND(AVG(energy), 3),
                    ROUND(AVG(danceability), 3),
                    ROUND(AVG(valence_proxy), 3)
             FROM tracks
             WHERE mood IS NOT NULL
             GROUP BY mood
             ORDER BY track_count DESC, mood",
        )?;
        let moods = stmt
            .query_map([], |r| {
                Ok(MoodSummary {
                    mood: r.get(0)?,
                    track_count: r.get(1)?,
                    avg_energy: r.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                    avg_danceability: r.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                    avg_valence: r.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(moods)
    }

    /// Run every analysis query.
    pub fn analysis_report(&self) -> Result<AnalysisReport> {
        Ok(AnalysisReport {
            averages: self.feature_averages()?,
            bangers: self.bangers(REPORT_LIMIT)?,
            tempo_buckets: self.tempo_buckets()?,
            top_artists: self.top_artists(REPORT_LIMIT)?,
            tempo_ranges: self.tempo_ranges()?,
            outliers: self.outliers(REPORT_LIMIT)?,
            moods: self.mood_summary()?,
        })
    }
}

/// mean + 2σ (sample standard deviation); `None` with fewer than two values.
fn outlier_cutoff(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(mean + OUTLIER_SIGMAS * var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::mood::Mood;

    fn record(name: &str, artist: &str, tempo: f64, energy: f64, dance: f64, mood: Mood) -> TrackFeatureRecord {
        TrackFeatureRecord {
            name: name.into(),
            artist: artist.into(),
            audio_reference: format!("{name}.mp3"),
            tempo_bpm: tempo,
            energy,
            danceability: dance,
            valence_proxy: 0.72,
            mood,
        }
    }

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_records(&[
            record("Opus", "Eric Prydz", 126.0, 0.45, 0.62, Mood::Happy),
            record("Pjanoo", "Eric Prydz", 128.0, 0.40, 0.70, Mood::Happy),
            record("Cola", "CamelPhat", 124.0, 0.30, 0.50, Mood::Neutral),
            record("Breathe", "CamelPhat", 121.0, 0.36, 0.58, Mood::Energetic),
            record("Afterlife", "Tale Of Us", 122.0, 0.20, 0.40, Mood::Neutral),
        ])
        .unwrap();
        db
    }

    #[test]
    fn test_insert_and_read_back() {
        let db = seeded();
        let records = db.all_records().unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].name, "Opus");
        assert_eq!(records[4].mood, Mood::Neutral);
    }

    #[test]
    fn test_clear() {
        let db = seeded();
        assert_eq!(db.clear().unwrap(), 5);
        assert!(db.all_rows().unwrap().is_empty());
    }

    #[test]
    fn test_averages() {
        let db = seeded();
        let avg = db.feature_averages().unwrap();
        assert_eq!(avg.track_count, 5);
        assert_eq!(avg.avg_tempo, Some(124.2));
        assert_eq!(avg.avg_energy, Some(0.342));
    }

    #[test]
    fn test_averages_empty_table() {
        let db = Database::open_in_memory().unwrap();
        let avg = db.feature_averages().unwrap();
        assert_eq!(avg.track_count, 0);
        assert_eq!(avg.avg_tempo, None);
    }

    #[test]
    fn test_bangers_filter_and_order() {
        let db = seeded();
        let bangers = db.bangers(REPORT_LIMIT).unwrap();
        let names: Vec<_> = bangers.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Opus", "Pjanoo", "Breathe"]);
    }

    #[test]
    fn test_tempo_ranges() {
        let db = seeded();
        let ranges = db.tempo_ranges().unwrap();
        let count = |label: &str| ranges.iter().find(|r| r.range == label).map(|r| r.track_count);
        assert_eq!(count("Slow (110-122)"), Some(2));
        assert_eq!(count("Mid (123-126)"), Some(2));
        assert_eq!(count("Fast (127-140)"), Some(1));
    }

    #[test]
    fn test_top_artists() {
        let db = seeded();
        let artists = db.top_artists(REPORT_LIMIT).unwrap();
        assert_eq!(artists[0].artist, "Eric Prydz");
        assert_eq!(artists[0].track_count, 2);
        assert_eq!(artists.len(), 2);
    }

    #[test]
    fn test_mood_summary() {
        let db = seeded();
        let moods = db.mood_summary().unwrap();
        assert_eq!(moods.len(), 3);
        assert_eq!(moods[0].track_count, 2);
    }

    #[test]
    fn test_tempo_buckets() {
        let db = seeded();
        let buckets = db.tempo_buckets().unwrap();
        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets[0].tempo, 121);
        assert_eq!(buckets[0].moods, "Energetic");
    }

    #[test]
    fn test_outliers() {
        let db = Database::open_in_memory().unwrap();
        let mut records: Vec<_> = (0..10)
            .map(|i| record(&format!("t{i}"), "A", 125.0, 0.30, 0.50, Mood::Neutral))
            .collect();
        records.push(record("spike", "B", 125.0, 0.95, 0.50, Mood::Energetic));
        db.insert_records(&records).unwrap();

        let outliers = db.outliers(REPORT_LIMIT).unwrap();
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].name, "spike");
    }

    #[test]
    fn test_stats() {
        let db = seeded();
        db.insert_rows(&[TrackRow {
            name: Some("Partial".into()),
            artist: Some("Nobody".into()),
            ..Default::default()
        }])
        .unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_tracks, 6);
        assert_eq!(stats.complete_tracks, 5);
        assert_eq!(stats.artists, 4);
        assert!(stats.moods.contains(&("(none)".to_string(), 1)));
    }

    #[test]
    fn test_full_report() {
        let db = seeded();
        let report = db.analysis_report().unwrap();
        assert_eq!(report.averages.track_count, 5);
        assert_eq!(report.moods.iter().map(|m| m.track_count).sum::<i64>(), 5);
    }
}
