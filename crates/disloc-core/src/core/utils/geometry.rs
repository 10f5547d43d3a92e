use nalgebra::{Point3, Vector2, Vector3};

/// In-plane (`x`, `y`) projection of a point.
#[inline]
pub fn in_plane(position: &Point3<f64>) -> Vector2<f64> {
    Vector2::new(position.x, position.y)
}

/// The candidate closest to `vector`, and the remainder after subtracting it.
///
/// Returns `None` only when `candidates` is empty.
pub fn nearest_shift<'a>(
    vector: &Vector3<f64>,
    candidates: &'a [Vector3<f64>],
) -> Option<(&'a Vector3<f64>, Vector3<f64>)> {
    candidates
        .iter()
        .map(|c| (c, vector - c))
        .min_by(|(_, r1), (_, r2)| {
            r1.norm_squared()
                .partial_cmp(&r2.norm_squared())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Relative distance from the half period inside which a value counts as
/// sitting on it.
const HALF_PERIOD_TIE: f64 = 1e-9;

/// Wraps `value` into `(-period/2, period/2]`.
///
/// Values within rounding of `-period/2` are reported at `+period/2`, so
/// `value` and `value + period` always wrap to the same end.
#[inline]
pub fn wrap_symmetric(value: f64, period: f64) -> f64 {
    let wrapped = value - period * (value / period).round();
    if wrapped <= -0.5 * period * (1.0 - HALF_PERIOD_TIE) {
        wrapped + period
    } else {
        wrapped
    }
}

/// Weighted mean of in-plane points; `None` if the weights sum to zero.
pub fn weighted_centroid(points: &[(Vector2<f64>, f64)]) -> Option<Vector2<f64>> {
    let total: f64 = points.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return None;
    }
    let sum: Vector2<f64> = points.iter().map(|(p, w)| p * *w).sum();
    Some(sum / total)
}
