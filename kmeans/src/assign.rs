//! Nearest-centroid assignment

use crate::{
    error::{KMeansError, Result},
    point::NormalizedPoint,
};

/// Label and distance of the closest centroid
///
/// Centroids are scanned in the given order and a later centroid only replaces the
/// current best when it is strictly closer, so the first of several equidistant
/// centroids wins. An empty centroid set is an `EmptyCentroidSet` error.
pub fn nearest(point: &NormalizedPoint, centroids: &[NormalizedPoint]) -> Result<(Option<usize>, f64)> {
    let mut closest: Option<(Option<usize>, f64)> = None;
    for centroid in centroids {
        let distance = point.distance_to(centroid)?;
        match closest {
            Some((_, best)) if distance >= best => {}
            _ => closest = Some((centroid.label(), distance)),
        }
    }
    closest.ok_or(KMeansError::EmptyCentroidSet)
}

/// Copy of `point` relabeled with its nearest centroid
pub fn assign(point: &NormalizedPoint, centroids: &[NormalizedPoint]) -> Result<NormalizedPoint> {
    let (label, _distance) = nearest(point, centroids)?;
    Ok(point.with_label(label))
}
