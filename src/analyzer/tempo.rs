//! Onset-strength envelope and tempo estimation.
//!
//! Local tempo candidates come from a windowed autocorrelation of the onset
//! envelope, weighted by a log-normal prior around 120 BPM. Candidates are then
//! filtered to the [110, 140] BPM band and averaged.

use super::params::{
    FALLBACK_TEMPO_BPM, ONSET_TOP_DB, TEMPO_MAX_BPM, TEMPO_MIN_BPM, TEMPO_PRIOR_BPM,
    TEMPO_PRIOR_OCTAVES, TEMPO_SEARCH_MAX_BPM, TEMPO_SEARCH_MIN_BPM, TEMPO_STRIDE_SECS,
    TEMPO_WINDOW_SECS,
};

/// Onset strength per frame from per-band power.
///
/// Power is converted to dB, floored at `ONSET_TOP_DB` below the loudest band
/// anywhere in the clip, and the positive first difference is averaged across
/// bands. The first frame has strength 0.
pub fn onset_envelope(band_power: &[Vec<f32>]) -> Vec<f64> {
    if band_power.is_empty() {
        return Vec::new();
    }

    let to_db = |p: f32| 10.0 * (p as f64).max(1e-10).log10();
    let peak_db = band_power
        .iter()
        .flat_map(|frame| frame.iter())
        .map(|&p| to_db(p))
        .fold(f64::NEG_INFINITY, f64::max);
    let floor_db = peak_db - ONSET_TOP_DB;

    let db: Vec<Vec<f64>> = band_power
        .iter()
        .map(|frame| frame.iter().map(|&p| to_db(p).max(floor_db)).collect())
        .collect();

    let mut envelope = Vec::with_capacity(db.len());
    envelope.push(0.0);
    for pair in db.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.is_empty() {
            envelope.push(0.0);
            continue;
        }
        let rise: f64 = cur
            .iter()
            .zip(prev.iter())
            .map(|(c, p)| (c - p).max(0.0))
            .sum();
        envelope.push(rise / cur.len() as f64);
    }
    envelope
}

/// Local tempo estimates across the clip.
///
/// `frame_rate` is envelope frames per second. Each window of
/// `TEMPO_WINDOW_SECS` (or the whole envelope when shorter) contributes the
/// prior-weighted autocorrelation peak as one candidate; silent windows
/// contribute nothing.
pub fn tempo_candidates(envelope: &[f64], frame_rate: f64) -> Vec<f64> {
    if envelope.len() < 2 || frame_rate <= 0.0 {
        return Vec::new();
    }

    let window = ((TEMPO_WINDOW_SECS * frame_rate).round() as usize).max(2);
    let stride = ((TEMPO_STRIDE_SECS * frame_rate).round() as usize).max(1);

    let starts: Vec<usize> = if envelope.len() <= window {
        vec![0]
    } else {
        (0..=envelope.len() - window).step_by(stride).collect()
    };

    starts
        .into_iter()
        .filter_map(|start| {
            let end = (start + window).min(envelope.len());
            local_tempo(&envelope[start..end], frame_rate)
        })
        .collect()
}

/// Prior-weighted autocorrelation peak of one envelope window, in BPM.
fn local_tempo(segment: &[f64], frame_rate: f64) -> Option<f64> {
    let min_lag = ((60.0 * frame_rate / TEMPO_SEARCH_MAX_BPM).floor() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / TEMPO_SEARCH_MIN_BPM).ceil() as usize).min(segment.len() - 1);
    if max_lag < min_lag {
        return None;
    }

    let mean = segment.iter().sum::<f64>() / segment.len() as f64;
    let centered: Vec<f64> = segment.iter().map(|v| v - mean).collect();

    let mut best: Option<(f64, usize)> = None;
    for lag in min_lag..=max_lag {
        let ac: f64 = centered[..centered.len() - lag]
            .iter()
            .zip(&centered[lag..])
            .map(|(a, b)| a * b)
            .sum();
        let bpm = 60.0 * frame_rate / lag as f64;
        let score = ac * tempo_prior(bpm);
        if score > 0.0 && best.is_none_or(|(s, _)| score > s) {
            best = Some((score, lag));
        }
    }

    best.map(|(_, lag)| 60.0 * frame_rate / lag as f64)
}

/// Log-normal weighting centred on `TEMPO_PRIOR_BPM`.
fn tempo_prior(bpm: f64) -> f64 {
    let octaves = (bpm / TEMPO_PRIOR_BPM).log2() / TEMPO_PRIOR_OCTAVES;
    (-0.5 * octaves * octaves).exp()
}

/// Keep candidates within [110, 140] BPM, average and round them.
/// Falls back to 125 BPM when nothing survives.
pub fn tempo_from_candidates(candidates: &[f64]) -> f64 {
    let valid: Vec<f64> = candidates
        .iter()
        .copied()
        .filter(|t| (TEMPO_MIN_BPM..=TEMPO_MAX_BPM).contains(t))
        .collect();

    if valid.is_empty() {
        return FALLBACK_TEMPO_BPM;
    }
    (valid.iter().sum::<f64>() / valid.len() as f64).round()
}

/// Estimate the tempo of an onset envelope.
pub fn estimate_tempo(envelope: &[f64], frame_rate: f64) -> f64 {
    let candidates = tempo_candidates(envelope, frame_rate);
    log::trace!("{} tempo candidates", candidates.len());
    tempo_from_candidates(&candidates)
}
