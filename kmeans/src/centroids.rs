//! Centroid recalculation
//! Moves a centroid to the mean of its cluster, rounded to a fixed number of decimals.
//! The rounding keeps centroid positions on a discrete grid, which is what lets two
//! consecutive iterations produce bit-identical centroids.

use crate::{
    error::{KMeansError, Result},
    point::{AggregateSum, NormalizedPoint},
    types::KmeansValue,
};

/// Decimal digits kept by the centroid update
pub const DEFAULT_PRECISION: u32 = 7;

/// Largest scale `round_half_down` honours; an f64 carries at most 17 significant digits
pub const MAX_PRECISION: u32 = 17;

/// Round to `scale` decimal digits, ties toward zero
///
/// Rounding is decided on the exact binary value. A tie at `scale` digits is a
/// value of the form `j / 2^(scale + 1)` with `j` odd; any other value is rounded
/// to the nearest decimal by the formatter. Scales above [`MAX_PRECISION`] are
/// treated as `MAX_PRECISION`.
pub fn round_half_down(value: f64, scale: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = scale.min(MAX_PRECISION);
    let factor = 10f64.powi(scale as i32);
    let halves = value * 2f64.powi(scale as i32 + 1);
    if halves.fract() == 0.0 && halves % 2.0 != 0.0 {
        return (value * factor).trunc() / factor;
    }
    format!("{:.*}", scale as usize, value).parse::<f64>().unwrap_or(value)
}

/// Move `centroid` to the rounded mean of its cluster
///
/// # Arguments
/// * `centroid` - Centroid to update in place; its label and magnitude are kept
/// * `cluster_sum` - Component-wise sum of the points assigned to the centroid
/// * `cluster_size` - Number of points in the sum
/// * `precision` - Decimal digits to keep
///
/// # Errors
/// * `EmptyCluster` when `cluster_size` is 0
/// * `DimensionMismatch` when the sum and the centroid disagree on length
pub fn update(
    centroid: &mut NormalizedPoint,
    cluster_sum: &AggregateSum,
    cluster_size: usize,
    precision: u32,
) -> Result<()> {
    if cluster_size == 0 {
        return Err(KMeansError::EmptyCluster { label: centroid.label().unwrap_or_default() });
    }
    if cluster_sum.dimension() != centroid.dimension() {
        return Err(KMeansError::DimensionMismatch { expected: centroid.dimension(), found: cluster_sum.dimension() });
    }
    let mean = cluster_sum.components().to_vec().div_by_n(cluster_size);
    centroid.set_components(mean.into_iter().map(|v| round_half_down(v, precision)).collect());
    Ok(())
}

/// True when both centroid sets are bit-identical, position by position
pub fn centroids_converged(old: &[NormalizedPoint], new: &[NormalizedPoint]) -> bool {
    old.len() == new.len() && old.iter().zip(new.iter()).all(|(a, b)| a.same_state(b))
}
