//! Numeric helper traits for dense feature vectors
//! Component-wise arithmetic and the Euclidean metric used by points and centroids.

/// Operations required for centroid calculations
pub trait KmeansValue {
    /// Zero vector of the given dimension
    fn zero(dim: usize) -> Self;
    /// Element-wise sum of two values
    fn sum_by_field(&self, right: &Self) -> Self;
    /// Divide all elements by a scalar value (for averaging)
    fn div_by_n(&self, div: usize) -> Self;
}

impl KmeansValue for Vec<f64> {
    fn zero(dim: usize) -> Self {
        vec![0.0; dim]
    }
    fn sum_by_field(&self, right: &Self) -> Self {
        self.iter().zip(right.iter()).map(|(a, b)| a + b).collect()
    }
    fn div_by_n(&self, div: usize) -> Self {
        self.iter().map(|a| a / div as f64).collect()
    }
}

/// Euclidean distance between two vectors of equal length
pub trait EuclideanDistance {
    fn euclidean_distance(&self, right: &Self) -> f64;
}

impl EuclideanDistance for [f64] {
    /// sqrt(sum((a[i] - b[i])^2)) over paired elements
    fn euclidean_distance(&self, right: &Self) -> f64 {
        self.iter().zip(right.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl EuclideanDistance for Vec<f64> {
    fn euclidean_distance(&self, right: &Self) -> f64 {
        self.as_slice().euclidean_distance(right.as_slice())
    }
}

/// Euclidean norm of a vector
///
/// Values are scaled by the largest absolute value before squaring, so large
/// finite inputs do not overflow the sum of squares.
pub fn l2_norm(values: &[f64]) -> f64 {
    let scale = values.iter().fold(0.0f64, |max, v| max.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return scale;
    }
    scale * values.iter().map(|v| (v / scale) * (v / scale)).sum::<f64>().sqrt()
}
