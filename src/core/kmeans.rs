//! K-means clustering with restarts
//!
//! Features are min-max normalized over the training sample before distances
//! are taken, so bands with wide ranges (backscatter in dB) do not swamp
//! bands with narrow ranges (normalized indices).

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::types::{WaterMapError, WaterMapResult};

/// Per-feature min-max scaling learned from training samples
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    mins: Vec<f64>,
    ranges: Vec<f64>,
}

impl Normalizer {
    pub fn fit(samples: &[Vec<f64>]) -> Self {
        let dims = samples.first().map_or(0, Vec::len);
        let mut mins = vec![f64::INFINITY; dims];
        let mut maxs = vec![f64::NEG_INFINITY; dims];
        for sample in samples {
            for (d, &v) in sample.iter().enumerate() {
                mins[d] = mins[d].min(v);
                maxs[d] = maxs[d].max(v);
            }
        }
        let ranges = mins.iter().zip(&maxs).map(|(lo, hi)| hi - lo).collect();
        Self { mins, ranges }
    }

    /// Scale a feature vector to [0, 1] per dimension; constant features map to 0
    pub fn apply(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mins.iter().zip(&self.ranges))
            .map(|(&v, (&lo, &range))| if range > 0.0 { (v - lo) / range } else { 0.0 })
            .collect()
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the nearest centroid, ties to the lowest index
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (k, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (k, d);
        }
    }
    best
}

/// Trained clusterer: maps a feature vector to a cluster id in `[0, k)`
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterModel {
    feature_names: Vec<String>,
    normalizer: Normalizer,
    centroids: Vec<Vec<f64>>,
    inertia: f64,
    training_samples: usize,
}

impl ClusterModel {
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Band names the model expects, in order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Centroids in normalized feature space
    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    /// Within-cluster sum of squared distances over the training sample
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn training_samples(&self) -> usize {
        self.training_samples
    }

    /// Nearest-centroid cluster id for a raw feature vector
    pub fn predict(&self, features: &[f64]) -> usize {
        nearest(&self.normalizer.apply(features), &self.centroids).0
    }
}

/// K-means configuration: fixed k, bounded restarts and iterations
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub k: usize,
    pub restarts: usize,
    pub max_iterations: usize,
    pub seed: u64,
}

impl KMeans {
    pub fn new(k: usize, restarts: usize, max_iterations: usize, seed: u64) -> Self {
        Self {
            k,
            restarts,
            max_iterations,
            seed,
        }
    }

    /// Fit on raw feature vectors. Requires at least `k` samples.
    pub fn fit(&self, samples: &[Vec<f64>], feature_names: Vec<String>) -> WaterMapResult<ClusterModel> {
        if self.k == 0 || self.restarts == 0 || self.max_iterations == 0 {
            return Err(WaterMapError::Config(format!(
                "K-means needs k, restarts and iterations >= 1 (got {}, {}, {})",
                self.k, self.restarts, self.max_iterations
            )));
        }
        if samples.len() < self.k {
            return Err(WaterMapError::InsufficientTrainingData {
                available: samples.len(),
                required: self.k,
            });
        }
        if samples.iter().any(|s| s.len() != feature_names.len()) {
            return Err(WaterMapError::BandAlignment(format!(
                "Training samples must have {} features",
                feature_names.len()
            )));
        }

        let normalizer = Normalizer::fit(samples);
        let points: Vec<Vec<f64>> = samples.iter().map(|s| normalizer.apply(s)).collect();

        let mut best: Option<(Vec<Vec<f64>>, f64)> = None;
        for restart in 0..self.restarts {
            let (centroids, inertia) = self.run_once(&points, self.seed.wrapping_add(restart as u64));
            log::debug!("K-means restart {}: inertia {:.6}", restart, inertia);
            if best.as_ref().map_or(true, |(_, b)| inertia < *b) {
                best = Some((centroids, inertia));
            }
        }
        let (centroids, inertia) = best.ok_or_else(|| {
            WaterMapError::Processing("K-means produced no result".to_string())
        })?;

        log::info!(
            "K-means k={} on {} samples: best inertia {:.6} over {} restarts",
            self.k,
            points.len(),
            inertia,
            self.restarts
        );
        Ok(ClusterModel {
            feature_names,
            normalizer,
            centroids,
            inertia,
            training_samples: points.len(),
        })
    }

    /// One Lloyd run from k distinct random samples
    fn run_once(&self, points: &[Vec<f64>], seed: u64) -> (Vec<Vec<f64>>, f64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut centroids: Vec<Vec<f64>> = rand::seq::index::sample(&mut rng, points.len(), self.k)
            .into_iter()
            .map(|i| points[i].clone())
            .collect();

        let dims = points[0].len();
        let mut labels = vec![usize::MAX; points.len()];
        for _ in 0..self.max_iterations {
            let mut changed = false;
            for (label, point) in labels.iter_mut().zip(points) {
                let (k, _) = nearest(point, &centroids);
                if *label != k {
                    *label = k;
                    changed = true;
                }
            }
            if !changed {
                break;
            }

            let mut sums = vec![vec![0.0; dims]; self.k];
            let mut counts = vec![0usize; self.k];
            for (&label, point) in labels.iter().zip(points) {
                counts[label] += 1;
                for (s, v) in sums[label].iter_mut().zip(point) {
                    *s += v;
                }
            }
            for (k, centroid) in centroids.iter_mut().enumerate() {
                // Empty clusters keep their previous centroid
                if counts[k] > 0 {
                    *centroid = sums[k].iter().map(|s| s / counts[k] as f64).collect();
                }
            }
        }

        let inertia = points.iter().map(|p| nearest(p, &centroids).1).sum();
        (centroids, inertia)
    }
}
