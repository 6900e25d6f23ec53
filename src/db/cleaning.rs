//! Post-import cleaning of the `tracks` table.
//!
//! Steps run in order inside one transaction:
//! 1. drop duplicate (name, artist) pairs, keeping the lowest rowid
//! 2. fill null feature columns with dataset-level defaults
//! 3. clamp tempo into [110, 140]
//! 4. coerce unknown mood labels to Neutral
//!
//! Every statement only touches rows that need it, so a second pass over a
//! cleaned table changes nothing.

use rusqlite::params;

use super::models::CleanReport;
use super::{Database, Result};
use crate::analyzer::mood::{DEFAULT_MOOD, Mood};
use crate::analyzer::params::{TEMPO_MAX_BPM, TEMPO_MIN_BPM};

pub const DEFAULT_TEMPO: f64 = 125.0;
pub const DEFAULT_ENERGY: f64 = 0.347;
pub const DEFAULT_DANCEABILITY: f64 = 0.560;
pub const DEFAULT_VALENCE_PROXY: f64 = 0.735;

impl Database {
    pub fn clean(&self) -> Result<CleanReport> {
        let tx = self.conn.unchecked_transaction()?;

        // rowid order is insertion order, so the first imported copy survives
        let duplicates_removed = tx.execute(
            "DELETE FROM tracks
             WHERE rowid NOT IN (
                 SELECT MIN(rowid) FROM tracks GROUP BY name, artist
             )",
            [],
        )?;

        let nulls_filled = tx.execute(
            "UPDATE tracks SET
                 tempo = COALESCE(tempo, ?1),
                 energy = COALESCE(energy, ?2),
                 danceability = COALESCE(danceability, ?3),
                 valence_proxy = COALESCE(valence_proxy, ?4),
                 mood = COALESCE(mood, ?5)
             WHERE tempo IS NULL
                OR energy IS NULL
                OR danceability IS NULL
                OR valence_proxy IS NULL
                OR mood IS NULL",
            params![
                DEFAULT_TEMPO,
                DEFAULT_ENERGY,
                DEFAULT_DANCEABILITY,
                DEFAULT_VALENCE_PROXY,
                DEFAULT_MOOD.as_str(),
            ],
        )?;

        let tempo_clamped = tx.execute(
            "UPDATE tracks SET tempo = CASE
                 WHEN tempo < ?1 THEN ?1
                 WHEN tempo > ?2 THEN ?2
                 ELSE tempo
             END
             WHERE tempo < ?1 OR tempo > ?2",
            params![TEMPO_MIN_BPM, TEMPO_MAX_BPM],
        )?;

        let labels = Mood::ALL.map(|m| m.as_str());
        let moods_coerced = tx.execute(
            "UPDATE tracks SET mood = ?5
             WHERE mood NOT IN (?1, ?2, ?3, ?4)",
            params![labels[0], labels[1], labels[2], labels[3], DEFAULT_MOOD.as_str()],
        )?;

        tx.commit()?;

        let report = CleanReport {
            duplicates_removed,
            nulls_filled,
            tempo_clamped,
            moods_coerced,
        };
        log::info!(
            "Cleaned tracks: {} duplicates removed, {} rows null-filled, {} tempos clamped, {} moods coerced",
            report.duplicates_removed,
            report.nulls_filled,
            report.tempo_clamped,
            report.moods_coerced
        );
        Ok(report)
    }
}
