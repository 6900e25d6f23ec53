//! Named constants for the feature heuristics.
//!
//! Every weight, reference frequency and fallback the extractor uses lives here
//! so the heuristic can be audited and tested in isolation.

// ── Framing ───────────────────────────────────────────────────────────
/// STFT size for loudness, brightness and onset analysis.
pub const ANALYSIS_FRAME: usize = 2048;
/// Hop between analysis frames (≈11.6 ms at 44.1 kHz).
pub const ANALYSIS_HOP: usize = 512;
/// Frame size for the valence brightness pass.
pub const VALENCE_FRAME: usize = 2048;
/// Hop for the valence brightness pass (50% overlap).
pub const VALENCE_HOP: usize = 1024;

// ── Tempo ─────────────────────────────────────────────────────────────
/// Candidates below this are discarded.
pub const TEMPO_MIN_BPM: f64 = 110.0;
/// Candidates above this are discarded.
pub const TEMPO_MAX_BPM: f64 = 140.0;
/// Used when no candidate survives the [`TEMPO_MIN_BPM`, `TEMPO_MAX_BPM`] filter.
pub const FALLBACK_TEMPO_BPM: f64 = 125.0;
/// Autocorrelation window for local tempo estimates (seconds).
pub const TEMPO_WINDOW_SECS: f64 = 8.0;
/// Spacing between successive local tempo estimates (seconds).
pub const TEMPO_STRIDE_SECS: f64 = 1.0;
/// Lowest tempo the autocorrelation searches.
pub const TEMPO_SEARCH_MIN_BPM: f64 = 30.0;
/// Highest tempo the autocorrelation searches.
pub const TEMPO_SEARCH_MAX_BPM: f64 = 300.0;
/// Centre of the log-normal tempo prior.
pub const TEMPO_PRIOR_BPM: f64 = 120.0;
/// Width of the tempo prior in octaves.
pub const TEMPO_PRIOR_OCTAVES: f64 = 1.0;
/// Dynamic range floor of the log-power spectrogram used for onsets (dB).
pub const ONSET_TOP_DB: f64 = 80.0;

// ── Energy ────────────────────────────────────────────────────────────
pub const ENERGY_LOUDNESS_WEIGHT: f64 = 0.7;
pub const ENERGY_BRIGHTNESS_WEIGHT: f64 = 0.3;
/// Spectral centroid that maps to full brightness in the energy blend.
pub const ENERGY_CENTROID_REF_HZ: f64 = 10_000.0;

// ── Danceability ──────────────────────────────────────────────────────
/// Raw regularity statistic that maps to danceability 1.0.
pub const DANCEABILITY_RAW_MAX: f64 = 2.5;
/// Frame length for the fluctuation analysis (seconds).
pub const DFA_FRAME_SECS: f64 = 0.01;
/// Smallest fluctuation scale (seconds).
pub const DFA_MIN_TAU_SECS: f64 = 0.31;
/// Largest fluctuation scale (seconds).
pub const DFA_MAX_TAU_SECS: f64 = 8.8;
/// Multiplicative step between fluctuation scales.
pub const DFA_TAU_STEP: f64 = 1.1;
/// Windows per scale: window hop is tau / this.
pub const DFA_WINDOWS_PER_TAU: usize = 50;

// ── Valence proxy ─────────────────────────────────────────────────────
pub const VALENCE_BRIGHTNESS_WEIGHT: f64 = 0.5;
pub const VALENCE_TEMPO_WEIGHT: f64 = 0.4;
pub const VALENCE_ENERGY_WEIGHT: f64 = 0.1;
/// Mean centroid that maps to full brightness in the valence blend.
pub const VALENCE_CENTROID_REF_HZ: f64 = 5_000.0;
/// Tempo that maps to 1.0 in the valence blend.
pub const VALENCE_TEMPO_REF_BPM: f64 = 140.0;
/// Centroid used when the valence pass produces no frames.
pub const FALLBACK_CENTROID_HZ: f64 = 3_000.0;

// ── Mood thresholds ───────────────────────────────────────────────────
pub const MOOD_HAPPY_VALENCE: f64 = 0.7;
pub const MOOD_ENERGETIC_ENERGY: f64 = 0.35;
pub const MOOD_NEUTRAL_VALENCE: f64 = 0.65;
pub const MOOD_CALM_ENERGY: f64 = 0.3;
