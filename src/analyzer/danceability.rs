//! Rhythmic regularity via detrended fluctuation analysis (DFA).
//!
//! The frame-energy series is mean-removed and integrated, then the RMS residual
//! around a local linear trend is measured at growing time scales. The scaling
//! exponent between consecutive scales is small for strongly periodic material,
//! so the statistic averages `1 / alpha`. Typical music lands in roughly [0, 2.5].

use super::params::{
    DFA_FRAME_SECS, DFA_MAX_TAU_SECS, DFA_MIN_TAU_SECS, DFA_TAU_STEP, DFA_WINDOWS_PER_TAU,
};
use super::spectral::rms;

/// Raw regularity statistic for a mono signal. 0 when the clip is too short
/// to measure two scales or carries no energy variation.
pub fn raw_danceability(samples: &[f32], sample_rate: u32) -> f64 {
    let frame = ((DFA_FRAME_SECS * sample_rate as f64).round() as usize).max(1);
    let energies: Vec<f64> = samples.chunks(frame).map(rms).collect();
    let profile = integrated_profile(&energies);

    let frames_per_sec = 1.0 / DFA_FRAME_SECS;
    let scales = fluctuation_scales(
        (DFA_MIN_TAU_SECS * frames_per_sec).round() as usize,
        (DFA_MAX_TAU_SECS * frames_per_sec).round() as usize,
    );

    let fluctuations: Vec<(usize, f64)> = scales
        .into_iter()
        .filter(|&tau| tau < profile.len())
        .filter_map(|tau| {
            let f = fluctuation(&profile, tau);
            (f > 1e-12).then_some((tau, f))
        })
        .collect();

    let inverse_alphas: Vec<f64> = fluctuations
        .windows(2)
        .map(|pair| {
            let (t1, f1) = pair[0];
            let (t2, f2) = pair[1];
            let alpha = (f2.ln() - f1.ln()) / ((t2 as f64).ln() - (t1 as f64).ln());
            if alpha > 0.0 { 1.0 / alpha } else { 0.0 }
        })
        .collect();

    if inverse_alphas.is_empty() {
        return 0.0;
    }
    inverse_alphas.iter().sum::<f64>() / inverse_alphas.len() as f64
}

/// Cumulative sum of the mean-removed series.
fn integrated_profile(series: &[f64]) -> Vec<f64> {
    if series.is_empty() {
        return Vec::new();
    }
    let mean = series.iter().sum::<f64>() / series.len() as f64;
    let mut acc = 0.0;
    series
        .iter()
        .map(|v| {
            acc += v - mean;
            acc
        })
        .collect()
}

/// Geometric progression of window lengths (in frames), strictly increasing.
fn fluctuation_scales(min_tau: usize, max_tau: usize) -> Vec<usize> {
    let mut scales = Vec::new();
    let mut tau = min_tau.max(2);
    while tau <= max_tau {
        scales.push(tau);
        let next = (tau as f64 * DFA_TAU_STEP).round() as usize;
        tau = next.max(tau + 1);
    }
    scales
}

/// RMS residual of a linear fit over windows of `tau` frames.
fn fluctuation(profile: &[f64], tau: usize) -> f64 {
    let jump = (tau / DFA_WINDOWS_PER_TAU).max(1);
    let mut total = 0.0;
    let mut windows = 0usize;

    let mut start = 0;
    while start + tau <= profile.len() {
        total += detrended_residual(&profile[start..start + tau]);
        windows += 1;
        start += jump;
    }

    if windows == 0 {
        return 0.0;
    }
    (total / windows as f64).sqrt()
}

/// Mean squared residual of `y` around its least-squares line.
fn detrended_residual(y: &[f64]) -> f64 {
    let n = y.len() as f64;
    let (mut sx, mut sy, mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (i, &v) in y.iter().enumerate() {
        let x = i as f64;
        sx += x;
        sy += v;
        sxx += x * x;
        sxy += x * v;
        syy += v * v;
    }
    let cxx = sxx - sx * sx / n;
    let cxy = sxy - sx * sy / n;
    let cyy = syy - sy * sy / n;
    let ssr = if cxx > 0.0 { cyy - cxy * cxy / cxx } else { cyy };
    ssr.max(0.0) / n
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random noise in [-1, 1].
    fn noise(len: usize) -> Vec<f32> {
        let mut state: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 23) as f32 - 1.0
            })
            .collect()
    }

    #[test]
    fn test_silence_is_zero() {
        assert_eq!(raw_danceability(&vec![0.0; 8000 * 10], 8000), 0.0);
    }

    #[test]
    fn test_short_clip_is_zero() {
        // 0.2 s: shorter than the smallest scale
        assert_eq!(raw_danceability(&noise(1600), 8000), 0.0);
    }

    #[test]
    fn test_noise_is_finite_and_positive() {
        let raw = raw_danceability(&noise(8000 * 12), 8000);
        assert!(raw.is_finite());
        assert!(raw > 0.0);
    }

    #[test]
    fn test_scales_grow_geometrically() {
        let scales = fluctuation_scales(31, 880);
        assert_eq!(scales[0], 31);
        assert!(*scales.last().unwrap() <= 880);
        assert!(scales.windows(2).all(|w| w[1] > w[0]));
        assert!(scales.len() > 30);
    }

    #[test]
    fn test_linear_profile_has_no_residual() {
        let line: Vec<f64> = (0..100).map(|i| 3.0 * i as f64 + 1.0).collect();
        assert!(detrended_residual(&line) < 1e-9);
    }

    #[test]
    fn test_integrated_profile_ends_at_zero() {
        let profile = integrated_profile(&[1.0, 3.0, 2.0, 6.0]);
        assert_eq!(profile.len(), 4);
        assert!(profile[3].abs() < 1e-12);
    }
}
