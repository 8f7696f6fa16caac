//! K-means clustering over projected embeddings.
//!
//! # Algorithm Details
//! - Distance metric: squared Euclidean
//! - Initialization: K-means++ from a seeded RNG
//! - Restarts: `n_init` runs, the lowest inertia wins (first on ties)
//! - Empty clusters: re-seeded with the point farthest from its centroid
//! - Stops when assignments no longer change or after `max_iter` updates

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cluster::ClusterError;

/// Parameters of a k-means fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KMeansOptions {
    pub k: usize,
    pub max_iter: usize,
    pub n_init: usize,
    pub seed: u64,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self {
            k: 9,
            max_iter: 2000,
            n_init: 10,
            seed: 42,
        }
    }
}

/// A fitted partition: centroids plus how well they fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansModel {
    centroids: Vec<Vec<f32>>,
    inertia: f64,
    iterations: usize,
}

impl KMeansModel {
    /// Fits `options.k` clusters, clamped to the number of points.
    pub fn fit(points: &[Vec<f32>], options: KMeansOptions) -> Result<Self, ClusterError> {
        if points.is_empty() {
            return Err(ClusterError::EmptyInput);
        }
        if options.k == 0 {
            return Err(ClusterError::InvalidClusterCount(0));
        }

        let width = points[0].len();
        if let Some(bad) = points.iter().find(|p| p.len() != width) {
            return Err(ClusterError::DimensionMismatch {
                expected: width,
                actual: bad.len(),
            });
        }

        let k = options.k.min(points.len());
        if k < options.k {
            tracing::warn!(
                "Requested {} clusters but only {} documents; using {k}",
                options.k,
                points.len()
            );
        }

        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut best: Option<Self> = None;

        for run in 0..options.n_init.max(1) {
            let model = run_once(points, k, options.max_iter, &mut rng);
            tracing::debug!(
                "k-means run {run}: inertia {:.6} after {} iterations",
                model.inertia,
                model.iterations
            );
            if best.as_ref().is_none_or(|b| model.inertia < b.inertia) {
                best = Some(model);
            }
        }

        best.ok_or(ClusterError::InvalidClusterCount(k))
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    #[must_use]
    pub fn centroids(&self) -> &[Vec<f32>] {
        &self.centroids
    }

    /// Sum of squared distances of the fitted points to their centroids.
    #[must_use]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Index of the nearest centroid; the lowest index wins ties.
    pub fn predict(&self, point: &[f32]) -> Result<usize, ClusterError> {
        let width = self.centroids.first().map_or(0, Vec::len);
        if point.len() != width {
            return Err(ClusterError::DimensionMismatch {
                expected: width,
                actual: point.len(),
            });
        }
        Ok(nearest(point, &self.centroids).0)
    }

    /// Cluster of every point.
    pub fn predict_all(&self, points: &[Vec<f32>]) -> Result<Vec<usize>, ClusterError> {
        points.par_iter().map(|p| self.predict(p)).collect()
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum()
}

fn nearest(point: &[f32], centroids: &[Vec<f32>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < best.1 {
            best = (i, distance);
        }
    }
    best
}

/// K-means++: each new centroid is drawn with probability proportional to
/// its squared distance from the closest centroid chosen so far.
fn initialize_centroids(points: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..points.len())].clone());

    let mut distances: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        let chosen = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            distances
                .iter()
                .position(|&d| {
                    cumulative += d;
                    cumulative >= target && d > 0.0
                })
                .unwrap_or(points.len() - 1)
        } else {
            // Every point coincides with a centroid already
            rng.random_range(0..points.len())
        };

        let centroid = points[chosen].clone();
        for (d, p) in distances.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

fn run_once(points: &[Vec<f32>], k: usize, max_iter: usize, rng: &mut StdRng) -> KMeansModel {
    let width = points[0].len();
    let mut centroids = initialize_centroids(points, k, rng);
    let mut assignments: Vec<usize> = Vec::new();
    let mut iterations = 0;

    loop {
        let scored: Vec<(usize, f64)> = points
            .par_iter()
            .map(|p| nearest(p, &centroids))
            .collect();
        let new_assignments: Vec<usize> = scored.iter().map(|(c, _)| *c).collect();

        let converged = new_assignments == assignments;
        assignments = new_assignments;
        if converged || iterations >= max_iter {
            break;
        }
        iterations += 1;

        // Update step
        let mut sums = vec![vec![0.0f64; width]; k];
        let mut sizes = vec![0usize; k];
        for (point, &cluster) in points.iter().zip(&assignments) {
            for (s, &x) in sums[cluster].iter_mut().zip(point) {
                *s += f64::from(x);
            }
            sizes[cluster] += 1;
        }

        let mut taken = vec![false; points.len()];
        for cluster in 0..k {
            if sizes[cluster] > 0 {
                let size = sizes[cluster] as f64;
                centroids[cluster] = sums[cluster].iter().map(|s| (s / size) as f32).collect();
                continue;
            }

            // Empty cluster: move it onto the worst-fitted point
            let farthest = scored
                .iter()
                .enumerate()
                .filter(|(i, _)| !taken[*i])
                .max_by(|a, b| a.1.1.total_cmp(&b.1.1).then(b.0.cmp(&a.0)))
                .map_or(0, |(i, _)| i);
            taken[farthest] = true;
            centroids[cluster] = points[farthest].clone();
        }
    }

    let inertia = points
        .iter()
        .zip(&assignments)
        .map(|(p, &c)| squared_distance(p, &centroids[c]))
        .sum();

    KMeansModel {
        centroids,
        inertia,
        iterations,
    }
}
