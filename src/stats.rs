//! Summary statistics, feature correlations, and k-means grouping over analyzed tracks.

use serde::Serialize;

use crate::db::models::TrackFeatureRecord;

pub const FEATURE_NAMES: [&str; 4] = ["Tempo", "Energy", "Danceability", "Valence_Proxy"];
const DIM: usize = FEATURE_NAMES.len();

/// Default number of clusters.
pub const DEFAULT_K: usize = 3;
const MAX_ITERATIONS: usize = 100;

type FeatureVector = [f64; DIM];

fn vector(r: &TrackFeatureRecord) -> FeatureVector {
    [r.tempo_bpm, r.energy, r.danceability, r.valence_proxy]
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureSummary {
    pub feature: &'static str,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; 0 for fewer than two tracks.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// count/mean/std/min/max per feature. Empty input yields no rows.
pub fn summarize(records: &[TrackFeatureRecord]) -> Vec<FeatureSummary> {
    if records.is_empty() {
        return Vec::new();
    }
    let vectors: Vec<FeatureVector> = records.iter().map(vector).collect();

    FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(d, &feature)| {
            let column: Vec<f64> = vectors.iter().map(|v| v[d]).collect();
            let (mean, std) = mean_std(&column);
            FeatureSummary {
                feature,
                count: column.len(),
                mean,
                std,
                min: column.iter().copied().fold(f64::INFINITY, f64::min),
                max: column.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect()
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Pearson correlation between two equal-length series.
///
/// `None` when either series is constant or shorter than two values.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mx = xs[..n].iter().sum::<f64>() / n as f64;
    let my = ys[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some((cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0))
}

/// Symmetric feature-by-feature correlation matrix, rows and columns in
/// `FEATURE_NAMES` order.
pub fn correlation_matrix(records: &[TrackFeatureRecord]) -> [[Option<f64>; DIM]; DIM] {
    let columns: Vec<Vec<f64>> = (0..DIM)
        .map(|d| records.iter().map(|r| vector(r)[d]).collect())
        .collect();

    let mut matrix = [[None; DIM]; DIM];
    for i in 0..DIM {
        for j in i..DIM {
            let r = pearson(&columns[i], &columns[j]);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    matrix
}

#[derive(Debug, Clone, Serialize)]
pub struct Clustering {
    /// Cluster index per input record.
    pub assignments: Vec<usize>,
    /// Cluster centres in original feature units.
    pub centroids: Vec<FeatureVector>,
    pub iterations: usize,
}

impl Clustering {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &a in &self.assignments {
            sizes[a] += 1;
        }
        sizes
    }
}

/// Deterministic k-means over z-scored features.
///
/// Seeds with farthest-point initialisation starting from the first track, so
/// the same input always yields the same clusters. `k` is capped at the number
/// of tracks; empty input or `k == 0` gives an empty clustering.
pub fn kmeans(records: &[TrackFeatureRecord], k: usize) -> Clustering {
    let k = k.min(records.len());
    if k == 0 {
        return Clustering {
            assignments: Vec::new(),
            centroids: Vec::new(),
            iterations: 0,
        };
    }

    let raw: Vec<FeatureVector> = records.iter().map(vector).collect();
    let points = standardize(&raw);

    let mut centroids = farthest_point_seeds(&points, k);
    let mut assignments = vec![usize::MAX; points.len()];
    let mut iterations = 0;

    while iterations < MAX_ITERATIONS {
        iterations += 1;
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let nearest = nearest(p, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }
        // An emptied cluster keeps its previous centre
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members = points
                .iter()
                .zip(&assignments)
                .filter(|(_, a)| **a == c)
                .map(|(p, _)| p);
            if let Some(m) = mean_of(members) {
                *centroid = m;
            }
        }
    }

    let centroids = (0..k)
        .map(|c| {
            mean_of(raw.iter().zip(&assignments).filter(|(_, a)| **a == c).map(|(p, _)| p))
                .unwrap_or([0.0; DIM])
        })
        .collect();

    log::debug!("k-means converged after {iterations} iterations");
    Clustering {
        assignments,
        centroids,
        iterations,
    }
}

/// Z-score each dimension; constant dimensions become all zeros.
fn standardize(raw: &[FeatureVector]) -> Vec<FeatureVector> {
    let mut stats = [(0.0, 0.0); DIM];
    for (d, s) in stats.iter_mut().enumerate() {
        let column: Vec<f64> = raw.iter().map(|v| v[d]).collect();
        *s = mean_std(&column);
    }
    raw.iter()
        .map(|v| {
            let mut z = [0.0; DIM];
            for d in 0..DIM {
                let (mean, std) = stats[d];
                z[d] = if std > 0.0 { (v[d] - mean) / std } else { 0.0 };
            }
            z
        })
        .collect()
}

fn farthest_point_seeds(points: &[FeatureVector], k: usize) -> Vec<FeatureVector> {
    let mut seeds = vec![points[0]];
    let mut min_dist: Vec<f64> = points.iter().map(|p| sq_dist(p, &points[0])).collect();

    while seeds.len() < k {
        // Ties go to the lowest index
        let (next, _) = min_dist
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &d)| if d > best.1 { (i, d) } else { best });
        let seed = points[next];
        for (d, p) in min_dist.iter_mut().zip(points) {
            *d = d.min(sq_dist(p, &seed));
        }
        seeds.push(seed);
    }
    seeds
}

fn nearest(p: &FeatureVector, centroids: &[FeatureVector]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = sq_dist(p, centroid);
        if d < best_dist {
            best = c;
            best_dist = d;
        }
    }
    best
}

fn sq_dist(a: &FeatureVector, b: &FeatureVector) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn mean_of<'a>(points: impl Iterator<Item = &'a FeatureVector>) -> Option<FeatureVector> {
    let mut sum = [0.0; DIM];
    let mut n = 0usize;
    for p in points {
        for d in 0..DIM {
            sum[d] += p[d];
        }
        n += 1;
    }
    if n == 0 {
        return None;
    }
    Some(sum.map(|s| s / n as f64))
}
