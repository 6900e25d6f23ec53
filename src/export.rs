//! Feature tables on disk: the analysis output file and the cleaned export.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::acquire::ReferenceKind;
use crate::db::models::{TrackFeatureRecord, TrackRow};
use crate::sources::lowercase_headers;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Feature table {path} is missing required column '{column}'")]
    MissingColumn { path: String, column: &'static str },
}

pub type Result<T> = std::result::Result<T, ExportError>;

const FEATURE_COLUMNS: [&str; 5] = ["Tempo", "Energy", "Danceability", "Valence_Proxy", "Mood"];

/// Write analyzed records with the `Name,Artist,File|Preview_URL,...` header.
pub fn write_features_csv(
    path: &Path,
    records: &[TrackFeatureRecord],
    reference: ReferenceKind,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["Name", "Artist", reference.column()];
    header.extend(FEATURE_COLUMNS);
    wtr.write_record(&header)?;

    for r in records {
        wtr.write_record([
            r.name.clone(),
            r.artist.clone(),
            r.audio_reference.clone(),
            format!("{:.1}", r.tempo_bpm),
            r.energy.to_string(),
            r.danceability.to_string(),
            r.valence_proxy.to_string(),
            r.mood.to_string(),
        ])?;
    }
    wtr.flush()?;
    log::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

#[derive(Debug, Deserialize)]
struct FeatureCsvRow {
    name: Option<String>,
    artist: Option<String>,
    #[serde(default, alias = "preview_url")]
    file: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    tempo: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    energy: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    danceability: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    valence_proxy: Option<f64>,
    #[serde(default)]
    mood: Option<String>,
}

/// Read a feature table as raw rows.
///
/// Headers match case-insensitively, and either `File` or `Preview_URL`
/// fills the file column. Empty or unparseable cells become nulls for the
/// cleaning pass to repair.
pub fn read_features_csv(path: &Path) -> Result<Vec<TrackRow>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = lowercase_headers(&mut rdr)?;

    for column in ["name", "artist"] {
        if !headers.iter().any(|h| h == column) {
            return Err(ExportError::MissingColumn {
                path: path.display().to_string(),
                column,
            });
        }
    }

    let mut rows = Vec::new();
    for row in rdr.deserialize::<FeatureCsvRow>() {
        let row = row?;
        rows.push(TrackRow {
            name: non_empty(row.name),
            artist: non_empty(row.artist),
            file: non_empty(row.file),
            tempo: row.tempo,
            energy: row.energy,
            danceability: row.danceability,
            valence_proxy: row.valence_proxy,
            mood: non_empty(row.mood),
        });
    }
    log::info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// NFKD-decompose and drop everything outside ASCII: "Röyksopp" → "Royksopp".
pub fn fold_to_ascii(text: &str) -> String {
    text.nfkd().filter(char::is_ascii).collect()
}

/// Fold the text columns of a row to ASCII before import.
pub fn fold_row(row: &mut TrackRow) {
    for field in [&mut row.name, &mut row.artist, &mut row.file, &mut row.mood] {
        if let Some(text) = field {
            *text = fold_to_ascii(text);
        }
    }
}

/// Write cleaned rows with the lowercase table-schema header.
pub fn write_cleaned_csv(path: &Path, rows: &[TrackRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "name",
        "artist",
        "file",
        "tempo",
        "energy",
        "danceability",
        "valence_proxy",
        "mood",
    ])?;
    let num = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    for r in rows {
        wtr.write_record([
            r.name.clone().unwrap_or_default(),
            r.artist.clone().unwrap_or_default(),
            r.file.clone().unwrap_or_default(),
            num(r.tempo),
            num(r.energy),
            num(r.danceability),
            num(r.valence_proxy),
            r.mood.clone().unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;
    log::info!("Exported {} cleaned rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::mood::Mood;

    fn record() -> TrackFeatureRecord {
        TrackFeatureRecord {
            name: "Eple".into(),
            artist: "Röyksopp".into(),
            audio_reference: "https://cdn.example/eple.mp3".into(),
            tempo_bpm: 124.0,
            energy: 0.41,
            danceability: 0.62,
            valence_proxy: 0.73,
            mood: Mood::Happy,
        }
    }

    #[test]
    fn test_write_features_header_follows_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        write_features_csv(&path, &[record()], ReferenceKind::PreviewUrl).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Name,Artist,Preview_URL,Tempo,Energy,Danceability,Valence_Proxy,Mood")
        );
        assert_eq!(
            lines.next(),
            Some("Eple,Röyksopp,https://cdn.example/eple.mp3,124.0,0.41,0.62,0.73,Happy")
        );
    }

    #[test]
    fn test_read_back_preview_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        write_features_csv(&path, &[record()], ReferenceKind::PreviewUrl).unwrap();

        let rows = read_features_csv(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file.as_deref(), Some("https://cdn.example/eple.mp3"));
        assert_eq!(rows[0].to_record(), Some(record()));
    }

    #[test]
    fn test_read_tolerates_blank_and_bad_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dirty.csv");
        std::fs::write(
            &path,
            "name,artist,file,tempo,energy,danceability,valence_proxy,mood\n\
             Opus,Eric Prydz,opus.mp3,,0.4,n/a,0.7,\n",
        )
        .unwrap();

        let rows = read_features_csv(&path).unwrap();
        assert_eq!(rows[0].tempo, None);
        assert_eq!(rows[0].energy, Some(0.4));
        assert_eq!(rows[0].danceability, None);
        assert_eq!(rows[0].mood, None);
    }

    #[test]
    fn test_read_requires_name_and_artist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "title,tempo\nOpus,126\n").unwrap();
        assert!(matches!(
            read_features_csv(&path),
            Err(ExportError::MissingColumn { column: "name", .. })
        ));
    }

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Röyksopp"), "Royksopp");
        assert_eq!(fold_to_ascii("Beyoncé – Halo"), "Beyonce  Halo");
        assert_eq!(fold_to_ascii("坂本龍一"), "");
        assert_eq!(fold_to_ascii("plain"), "plain");
    }

    #[test]
    fn test_fold_row_leaves_numbers() {
        let mut row = TrackRow::from(&record());
        fold_row(&mut row);
        assert_eq!(row.artist.as_deref(), Some("Royksopp"));
        assert_eq!(row.energy, Some(0.41));
    }

    #[test]
    fn test_cleaned_export_lowercase_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        let mut row = TrackRow::from(&record());
        row.file = None;
        write_cleaned_csv(&path, &[row]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("name,artist,file,tempo,energy,danceability,valence_proxy,mood\n"));
        assert!(text.contains("Eple,Röyksopp,,124,0.41"));
    }
}
