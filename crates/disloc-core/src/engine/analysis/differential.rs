use super::neighbors::NeighborPair;
use crate::core::utils::geometry::{in_plane, wrap_symmetric, weighted_centroid};
use nalgebra::{Point3, Vector2, Vector3};

/// Relative displacement of one bonded pair, projected on the Burgers direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialDisplacement {
    /// Slots of the two atoms in the aligned atom list.
    pub first: usize,
    pub second: usize,
    /// In-plane bond midpoint in the reference configuration.
    pub midpoint: Vector2<f64>,
    /// `(u_second - u_first) · b̂`, wrapped into `(-|b|/2, |b|/2]`.
    pub value: f64,
}

/// Differential displacements for every pair.
///
/// Wrapping by `|b|` removes the jump that pairs straddling the cut carry, so
/// only pairs close to a core keep a large value.
pub fn differential_displacements(
    pairs: &[NeighborPair],
    positions: &[Point3<f64>],
    displacements: &[Vector3<f64>],
    burgers: &Vector3<f64>,
) -> Vec<DifferentialDisplacement> {
    let magnitude = burgers.norm();
    if magnitude == 0.0 {
        return Vec::new();
    }
    let direction = burgers / magnitude;
    pairs
        .iter()
        .map(|pair| {
            let relative = displacements[pair.second] - displacements[pair.first];
            let midpoint = positions[pair.first] + pair.separation * 0.5;
            DifferentialDisplacement {
                first: pair.first,
                second: pair.second,
                midpoint: in_plane(&midpoint),
                value: wrap_symmetric(relative.dot(&direction), magnitude),
            }
        })
        .collect()
}

/// Relative magnitude difference under which two values count as equal.
const MAGNITUDE_TIE: f64 = 1e-9;

/// Largest-magnitude differential displacement touching each atom, signed.
///
/// Values of equal magnitude and opposite sign are common around symmetric
/// cores; the positive one is kept so the result does not depend on pair
/// order or rounding.
pub fn per_atom_maxima(count: usize, values: &[DifferentialDisplacement]) -> Vec<f64> {
    let mut maxima = vec![0.0_f64; count];
    for dd in values {
        for slot in [dd.first, dd.second] {
            if supersedes(dd.value, maxima[slot]) {
                maxima[slot] = dd.value;
            }
        }
    }
    maxima
}

fn supersedes(candidate: f64, current: f64) -> bool {
    let (a, c) = (candidate.abs(), current.abs());
    let tie = MAGNITUDE_TIE * a.max(c);
    if (a - c).abs() <= tie {
        candidate > current
    } else {
        a > c
    }
}

/// Centroid of the bond midpoints whose `|DD|` exceeds `threshold`, weighted by
/// `|DD|`.
pub fn threshold_centroid(values: &[DifferentialDisplacement], threshold: f64) -> Option<Vector2<f64>> {
    let selected: Vec<(Vector2<f64>, f64)> = values
        .iter()
        .filter(|dd| dd.value.abs() > threshold)
        .map(|dd| (dd.midpoint, dd.value.abs()))
        .collect();
    weighted_centroid(&selected)
}
