//! Principal component projection.
//!
//! Components are the leading eigenvectors of the covariance matrix, found
//! one at a time by power iteration and removed by deflation. All
//! arithmetic runs in f64; the stored projection is f32.
//!
//! The start vector is fixed and each component's largest-magnitude entry is
//! made positive, so fitting the same data twice yields the same projection.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cluster::ClusterError;

const POWER_ITERATIONS: usize = 1000;

const POWER_TOLERANCE: f64 = 1e-12;

/// Below this norm a deflated matrix has no variance left to explain.
const NULL_NORM: f64 = 1e-12;

/// A fitted linear projection `x -> components * (x - mean)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaProjection {
    mean: Vec<f32>,
    /// Row-major: one unit-length component per row.
    components: Vec<Vec<f32>>,
    explained_variance: Vec<f32>,
}

impl PcaProjection {
    /// Fits `n_components` components over `data`.
    ///
    /// `n_components` is clamped to `min(input width, rows)`. Components past
    /// the data's rank are zero vectors and project everything to 0.
    pub fn fit(data: &[Vec<f32>], n_components: usize) -> Result<Self, ClusterError> {
        let Some(first) = data.first() else {
            return Err(ClusterError::EmptyInput);
        };
        let width = first.len();
        for row in data {
            if row.len() != width {
                return Err(ClusterError::DimensionMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
        }

        let n_components = n_components.min(width).min(data.len());
        let mean = column_mean(data, width);
        let mut covariance = covariance(data, &mean);

        let mut components: Vec<Vec<f64>> = Vec::with_capacity(n_components);
        let mut explained_variance = Vec::with_capacity(n_components);

        for _ in 0..n_components {
            let (value, vector) = leading_eigenpair(&covariance, &components);
            deflate(&mut covariance, value, &vector);
            explained_variance.push(value.max(0.0) as f32);
            components.push(vector);
        }

        tracing::debug!(
            "PCA fitted {n_components} components over {} x {width}",
            data.len()
        );

        Ok(Self {
            mean: mean.iter().map(|&m| m as f32).collect(),
            components: components
                .into_iter()
                .map(|c| c.into_iter().map(|v| v as f32).collect())
                .collect(),
            explained_variance,
        })
    }

    #[must_use]
    pub fn input_dimension(&self) -> usize {
        self.mean.len()
    }

    #[must_use]
    pub fn output_dimension(&self) -> usize {
        self.components.len()
    }

    /// Variance along each component, in component order.
    #[must_use]
    pub fn explained_variance(&self) -> &[f32] {
        &self.explained_variance
    }

    /// Projects one vector.
    pub fn transform(&self, vector: &[f32]) -> Result<Vec<f32>, ClusterError> {
        if vector.len() != self.mean.len() {
            return Err(ClusterError::DimensionMismatch {
                expected: self.mean.len(),
                actual: vector.len(),
            });
        }

        Ok(self
            .components
            .iter()
            .map(|component| {
                component
                    .iter()
                    .zip(vector.iter().zip(&self.mean))
                    .map(|(c, (x, m))| f64::from(*c) * (f64::from(*x) - f64::from(*m)))
                    .sum::<f64>() as f32
            })
            .collect())
    }

    /// Projects every row.
    pub fn transform_all(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, ClusterError> {
        data.par_iter().map(|row| self.transform(row)).collect()
    }
}

fn column_mean(data: &[Vec<f32>], width: usize) -> Vec<f64> {
    let mut mean = vec![0.0f64; width];
    for row in data {
        for (m, &x) in mean.iter_mut().zip(row) {
            *m += f64::from(x);
        }
    }
    let n = data.len() as f64;
    for m in &mut mean {
        *m /= n;
    }
    mean
}

/// Sample covariance (denominator `n - 1`, or 1 for a single row), dense
/// row-major `width x width`.
fn covariance(data: &[Vec<f32>], mean: &[f64]) -> Vec<Vec<f64>> {
    let width = mean.len();
    let zero = || vec![vec![0.0f64; width]; width];

    let mut sums = data
        .par_iter()
        .fold(zero, |mut acc, row| {
            let centered: Vec<f64> = row
                .iter()
                .zip(mean)
                .map(|(&x, &m)| f64::from(x) - m)
                .collect();
            for (i, &ci) in centered.iter().enumerate() {
                if ci == 0.0 {
                    continue;
                }
                for (j, &cj) in centered.iter().enumerate().skip(i) {
                    acc[i][j] += ci * cj;
                }
            }
            acc
        })
        .reduce(zero, |mut a, b| {
            for (row_a, row_b) in a.iter_mut().zip(b) {
                for (x, y) in row_a.iter_mut().zip(row_b) {
                    *x += y;
                }
            }
            a
        });

    let denominator = (data.len().saturating_sub(1)).max(1) as f64;
    for i in 0..width {
        for j in i..width {
            let value = sums[i][j] / denominator;
            sums[i][j] = value;
            sums[j][i] = value;
        }
    }
    sums
}

fn mat_vec(matrix: &[Vec<f64>], vector: &[f64]) -> Vec<f64> {
    matrix
        .iter()
        .map(|row| row.iter().zip(vector).map(|(a, b)| a * b).sum())
        .collect()
}

fn norm(vector: &[f64]) -> f64 {
    vector.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Removes the projections onto earlier components.
fn orthogonalize(vector: &mut [f64], basis: &[Vec<f64>]) {
    for b in basis {
        let dot: f64 = vector.iter().zip(b).map(|(x, y)| x * y).sum();
        for (x, y) in vector.iter_mut().zip(b) {
            *x -= dot * y;
        }
    }
}

fn leading_eigenpair(matrix: &[Vec<f64>], found: &[Vec<f64>]) -> (f64, Vec<f64>) {
    let width = matrix.len();

    // Fixed, non-symmetric start so no eigenvector is missed by accident
    let mut vector: Vec<f64> = (0..width)
        .map(|i| 1.0 + ((i as f64 + 1.0) * 0.618_033_988_749_895).fract())
        .collect();
    orthogonalize(&mut vector, found);
    let start_norm = norm(&vector);
    if start_norm < NULL_NORM {
        return (0.0, vec![0.0; width]);
    }
    vector.iter_mut().for_each(|x| *x /= start_norm);

    for _ in 0..POWER_ITERATIONS {
        let mut next = mat_vec(matrix, &vector);
        orthogonalize(&mut next, found);
        let next_norm = norm(&next);
        if next_norm < NULL_NORM {
            return (0.0, vec![0.0; width]);
        }
        next.iter_mut().for_each(|x| *x /= next_norm);

        let delta: f64 = next
            .iter()
            .zip(&vector)
            .map(|(a, b)| (a - b).abs())
            .sum();
        vector = next;
        if delta < POWER_TOLERANCE {
            break;
        }
    }

    // Sign convention: largest-magnitude entry positive
    let pivot = vector
        .iter()
        .copied()
        .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        vector.iter_mut().for_each(|x| *x = -*x);
    }

    let value: f64 = mat_vec(matrix, &vector)
        .iter()
        .zip(&vector)
        .map(|(a, b)| a * b)
        .sum();
    (value, vector)
}

fn deflate(matrix: &mut [Vec<f64>], value: f64, vector: &[f64]) {
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell -= value * vector[i] * vector[j];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_data() -> Vec<Vec<f32>> {
        // Points along (1, 1) with a little noise along (1, -1)
        (0..20)
            .map(|i| {
                let t = i as f32 - 10.0;
                let noise = if i % 2 == 0 { 0.1 } else { -0.1 };
                vec![t + noise, t - noise]
            })
            .collect()
    }

    #[test]
    fn test_first_component_follows_main_axis() {
        let pca = PcaProjection::fit(&line_data(), 2).unwrap();
        assert_eq!(pca.output_dimension(), 2);

        let first = &pca.components[0];
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((first[0] - expected).abs() < 1e-3);
        assert!((first[1] - expected).abs() < 1e-3);
        assert!(pca.explained_variance()[0] > pca.explained_variance()[1]);
    }

    #[test]
    fn test_components_are_orthonormal() {
        let data: Vec<Vec<f32>> = (0..30)
            .map(|i| {
                let x = i as f32;
                vec![x.sin(), (x * 0.7).cos(), x * 0.1, (x * 1.3).sin() * 2.0]
            })
            .collect();
        let pca = PcaProjection::fit(&data, 3).unwrap();

        for (i, a) in pca.components.iter().enumerate() {
            for (j, b) in pca.components.iter().enumerate() {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-3, "components {i},{j}: {dot}");
            }
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let a = PcaProjection::fit(&line_data(), 2).unwrap();
        let b = PcaProjection::fit(&line_data(), 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_components_clamped_to_rows() {
        let data = vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]];
        let pca = PcaProjection::fit(&data, 8).unwrap();
        assert_eq!(pca.output_dimension(), 2);
        assert_eq!(pca.input_dimension(), 4);

        // The mean maps to the origin
        let projected = pca.transform(&[0.5, 0.5, 0.0, 0.0]).unwrap();
        assert!(projected.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_transform_rejects_wrong_width() {
        let pca = PcaProjection::fit(&line_data(), 1).unwrap();
        assert!(matches!(
            pca.transform(&[1.0, 2.0, 3.0]),
            Err(ClusterError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert!(matches!(
            PcaProjection::fit(&[], 2),
            Err(ClusterError::EmptyInput)
        ));
    }
}
