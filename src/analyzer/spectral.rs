use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

/// Analysis window applied before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Hann,
    /// No tapering: the frame is transformed as-is.
    Rectangular,
}

/// Short-time Fourier transform over fixed-size, zero-padded frames.
///
/// Frames start every `hop` samples for as long as the start lies inside the
/// signal; the tail frame is padded with zeros. An empty signal yields no frames.
pub struct Stft {
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    frame_size: usize,
    hop: usize,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl Stft {
    pub fn new(frame_size: usize, hop: usize, window: Window) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(frame_size);
        let input = plan.make_input_vec();
        let output = plan.make_output_vec();
        let window = match window {
            Window::Hann => hann_window(frame_size),
            Window::Rectangular => vec![1.0; frame_size],
        };
        Self {
            plan,
            window,
            frame_size,
            hop: hop.max(1),
            magnitudes: vec![0.0; frame_size / 2 + 1],
            input,
            output,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of frames `process` will visit for a signal of `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        if len == 0 { 0 } else { (len - 1) / self.hop + 1 }
    }

    /// Visit every frame with its raw (unwindowed, zero-padded) samples and
    /// its magnitude spectrum (`frame_size / 2 + 1` bins).
    pub fn process<F>(&mut self, samples: &[f32], mut visit: F)
    where
        F: FnMut(&[f32], &[f32]),
    {
        let mut raw = vec![0.0f32; self.frame_size];
        let mut start = 0;
        while start < samples.len() {
            let end = (start + self.frame_size).min(samples.len());
            let filled = end - start;
            raw[..filled].copy_from_slice(&samples[start..end]);
            raw[filled..].fill(0.0);

            for ((dst, &s), &w) in self.input.iter_mut().zip(raw.iter()).zip(self.window.iter()) {
                *dst = s * w;
            }
            if self.plan.process(&mut self.input, &mut self.output).is_err() {
                // Only fails on buffer length mismatch, which the constructor rules out
                log::error!("FFT buffer mismatch for frame size {}", self.frame_size);
                return;
            }
            for (m, c) in self.magnitudes.iter_mut().zip(self.output.iter()) {
                *m = c.norm();
            }

            visit(&raw, &self.magnitudes);
            start += self.hop;
        }
    }
}

/// Root-mean-square amplitude of a frame.
pub fn rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / frame.len() as f64).sqrt()
}

/// Magnitude-weighted mean frequency of a spectrum whose last bin sits at `nyquist` Hz.
///
/// Returns 0 for a silent frame.
pub fn spectral_centroid(magnitudes: &[f32], nyquist: f64) -> f64 {
    if magnitudes.len() < 2 {
        return 0.0;
    }
    let bin_hz = nyquist / (magnitudes.len() - 1) as f64;
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (k, &m) in magnitudes.iter().enumerate() {
        weighted += k as f64 * bin_hz * m as f64;
        total += m as f64;
    }
    if total < 1e-12 { 0.0 } else { weighted / total }
}

/// Mel-spaced rectangular band layout over an FFT spectrum.
pub struct MelBands {
    /// Bin ranges `[lo, hi)` for each band.
    ranges: Vec<(usize, usize)>,
}

impl MelBands {
    pub fn new(n_bands: usize, frame_size: usize, sample_rate: u32) -> Self {
        let n_bins = frame_size / 2 + 1;
        let nyquist = sample_rate as f64 / 2.0;
        let mel_max = hz_to_mel(nyquist);

        let edges: Vec<usize> = (0..=n_bands)
            .map(|i| {
                let hz = mel_to_hz(mel_max * i as f64 / n_bands as f64);
                ((hz / nyquist) * (n_bins - 1) as f64).round() as usize
            })
            .collect();

        let ranges = edges
            .windows(2)
            .map(|w| {
                let lo = w[0].min(n_bins - 1);
                // Every band covers at least one bin
                let hi = w[1].max(lo + 1).min(n_bins);
                (lo, hi)
            })
            .collect();

        Self { ranges }
    }

    /// Summed power per band.
    pub fn band_power(&self, magnitudes: &[f32]) -> Vec<f32> {
        self.ranges
            .iter()
            .map(|&(lo, hi)| magnitudes[lo..hi].iter().map(|m| m * m).sum())
            .collect()
    }
}

pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

fn hann_window(size: usize) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}
