use super::danceability::raw_danceability;
use super::decode::MonoAudio;
use super::params::*;
use super::spectral::{self, MelBands, Stft, Window};
use super::tempo;

/// Number of mel bands feeding the onset envelope.
const ONSET_BANDS: usize = 64;

/// The four scalar descriptors of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFeatures {
    pub tempo_bpm: f64,
    pub energy: f64,
    pub danceability: f64,
    pub valence_proxy: f64,
}

/// Derive tempo, energy, danceability and valence proxy from a mono waveform.
pub fn extract(audio: &MonoAudio) -> AudioFeatures {
    let sr = audio.sample_rate.max(1);
    let nyquist = sr as f64 / 2.0;

    // Pass 1: Hann-windowed frames for loudness, brightness and onsets
    let mut stft = Stft::new(ANALYSIS_FRAME, ANALYSIS_HOP, Window::Hann);
    let bands = MelBands::new(ONSET_BANDS, stft.frame_size(), sr);
    let frame_count = stft.frame_count(audio.samples.len());
    let mut rms_frames = Vec::with_capacity(frame_count);
    let mut centroid_sum = 0.0;
    let mut band_power = Vec::with_capacity(frame_count);

    stft.process(&audio.samples, |raw, mags| {
        rms_frames.push(spectral::rms(raw));
        centroid_sum += spectral::spectral_centroid(mags, nyquist);
        band_power.push(bands.band_power(mags));
    });

    let rms_mean = mean(&rms_frames).unwrap_or(0.0);
    let rms_peak = rms_frames.iter().copied().fold(0.0, f64::max);
    let centroid_mean = if frame_count == 0 { 0.0 } else { centroid_sum / frame_count as f64 };
    let energy = energy_from(rms_mean, rms_peak, centroid_mean);

    let envelope = tempo::onset_envelope(&band_power);
    let frame_rate = sr as f64 / ANALYSIS_HOP as f64;
    let tempo_bpm = tempo::estimate_tempo(&envelope, frame_rate);

    let danceability = danceability_from_raw(raw_danceability(&audio.samples, sr));

    // Pass 2: unwindowed half-overlapping frames for the valence brightness term
    let mut valence_stft = Stft::new(VALENCE_FRAME, VALENCE_HOP, Window::Rectangular);
    let mut valence_centroids = Vec::with_capacity(valence_stft.frame_count(audio.samples.len()));
    valence_stft.process(&audio.samples, |_, mags| {
        valence_centroids.push(spectral::spectral_centroid(mags, nyquist));
    });
    let valence_proxy = valence_from(mean(&valence_centroids), tempo_bpm, energy);

    log::debug!(
        "tempo={tempo_bpm} energy={energy:.3} danceability={danceability:.3} valence={valence_proxy:.3}"
    );

    AudioFeatures {
        tempo_bpm,
        energy,
        danceability,
        valence_proxy,
    }
}

/// Blend normalized loudness with normalized brightness, capped at 1.0.
///
/// A zero peak (digital silence) counts as zero loudness.
pub fn energy_from(rms_mean: f64, rms_peak: f64, centroid_hz: f64) -> f64 {
    let loudness = if rms_peak > 0.0 { rms_mean / rms_peak } else { 0.0 };
    let brightness = centroid_hz / ENERGY_CENTROID_REF_HZ;
    (ENERGY_LOUDNESS_WEIGHT * loudness + ENERGY_BRIGHTNESS_WEIGHT * brightness).min(1.0)
}

/// Scale the raw regularity statistic into [0, 1].
pub fn danceability_from_raw(raw: f64) -> f64 {
    (raw / DANCEABILITY_RAW_MAX).clamp(0.0, 1.0)
}

/// Blend brightness, tempo and energy, clamped to [0, 1].
///
/// `centroid_mean_hz` is `None` when the valence pass produced no frames, in
/// which case `FALLBACK_CENTROID_HZ` stands in.
pub fn valence_from(centroid_mean_hz: Option<f64>, tempo_bpm: f64, energy: f64) -> f64 {
    let centroid = centroid_mean_hz.unwrap_or(FALLBACK_CENTROID_HZ);
    let valence = VALENCE_BRIGHTNESS_WEIGHT * (centroid / VALENCE_CENTROID_REF_HZ)
        + VALENCE_TEMPO_WEIGHT * (tempo_bpm / VALENCE_TEMPO_REF_BPM)
        + VALENCE_ENERGY_WEIGHT * energy;
    valence.clamp(0.0, 1.0)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
