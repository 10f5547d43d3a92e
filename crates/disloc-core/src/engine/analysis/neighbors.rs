use crate::core::crystal::orientation::Axis;
use crate::core::models::configuration::AtomicConfiguration;
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;

/// A bonded pair of atoms in the reference lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborPair {
    /// Slots into the position list the pairs were built from; `first < second`.
    pub first: usize,
    pub second: usize,
    /// Vector from `first` to the (possibly periodic) image of `second`.
    pub separation: Vector3<f64>,
}

/// Uniform grid of cubic bins for fixed-radius queries.
///
/// Lattice positions share coordinates on whole planes, which a uniform grid
/// handles without any bucket limit: every point goes to the bin containing
/// it and a query scans the bins overlapping its bounding box.
struct NeighborGrid {
    inv_bin: f64,
    bins: FxHashMap<(i64, i64, i64), Vec<usize>>,
}

impl NeighborGrid {
    fn new(points: &[Point3<f64>], bin: f64) -> Self {
        let inv_bin = 1.0 / bin;
        let mut bins: FxHashMap<(i64, i64, i64), Vec<usize>> = FxHashMap::default();
        for (item, p) in points.iter().enumerate() {
            bins.entry(Self::key(p, inv_bin)).or_default().push(item);
        }
        Self { inv_bin, bins }
    }

    fn key(p: &Point3<f64>, inv_bin: f64) -> (i64, i64, i64) {
        (
            (p.x * inv_bin).floor() as i64,
            (p.y * inv_bin).floor() as i64,
            (p.z * inv_bin).floor() as i64,
        )
    }

    /// Items within `radius` of `center`, in ascending order.
    fn within(&self, points: &[Point3<f64>], center: &Point3<f64>, radius: f64) -> Vec<usize> {
        let reach = Vector3::repeat(radius);
        let low = Self::key(&(center - reach), self.inv_bin);
        let high = Self::key(&(center + reach), self.inv_bin);
        let radius_sq = radius * radius;
        let mut found = Vec::new();
        for gx in low.0..=high.0 {
            for gy in low.1..=high.1 {
                for gz in low.2..=high.2 {
                    let Some(items) = self.bins.get(&(gx, gy, gz)) else {
                        continue;
                    };
                    found.extend(
                        items
                            .iter()
                            .copied()
                            .filter(|&item| (points[item] - center).norm_squared() <= radius_sq),
                    );
                }
            }
        }
        found.sort_unstable();
        found
    }
}

/// All pairs closer than `cutoff`, including pairs that straddle a periodic
/// boundary of `cell`.
pub fn neighbor_pairs(
    positions: &[Point3<f64>],
    cell: &AtomicConfiguration,
    cutoff: f64,
) -> Vec<NeighborPair> {
    if positions.is_empty() || cutoff <= 0.0 || !cutoff.is_finite() {
        return Vec::new();
    }
    let shifts = image_shifts(cell);
    let mut points = Vec::with_capacity(positions.len() * shifts.len());
    let mut owners = Vec::with_capacity(points.capacity());
    for shift in &shifts {
        for (slot, p) in positions.iter().enumerate() {
            points.push(p + shift);
            owners.push(slot);
        }
    }
    let grid = NeighborGrid::new(&points, cutoff);

    let mut pairs = Vec::new();
    for (first, p) in positions.iter().enumerate() {
        for item in grid.within(&points, p, cutoff) {
            let second = owners[item];
            if second <= first {
                continue;
            }
            pairs.push(NeighborPair {
                first,
                second,
                separation: points[item] - p,
            });
        }
    }
    pairs
}

fn image_shifts(cell: &AtomicConfiguration) -> Vec<Vector3<f64>> {
    let ranges: Vec<std::ops::RangeInclusive<i32>> = Axis::ALL
        .iter()
        .map(|&axis| if cell.is_periodic(axis) { -1..=1 } else { 0..=0 })
        .collect();
    let mut shifts = vec![Vector3::zeros()];
    for i in ranges[0].clone() {
        for j in ranges[1].clone() {
            for k in ranges[2].clone() {
                if (i, j, k) == (0, 0, 0) {
                    continue;
                }
                shifts.push(cell.cell() * Vector3::new(i as f64, j as f64, k as f64));
            }
        }
    }
    shifts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crystal::orientation::CrystalOrientation;
    use crate::core::crystal::structure::{Crystal, CrystalStructure};
    use crate::core::models::configuration::Boundary;
    use crate::engine::config::Dimensions;
    use crate::engine::lattice::LatticeBuilder;

    fn bcc(boundaries: [Boundary; 3], repeats: [usize; 3]) -> AtomicConfiguration {
        LatticeBuilder::new(
            Crystal::new(CrystalStructure::Bcc, 3.0).unwrap(),
            CrystalOrientation::cubic(),
            "Fe",
        )
        .boundaries(boundaries)
        .build(&Dimensions::repeats(repeats))
        .unwrap()
    }

    fn positions(config: &AtomicConfiguration) -> Vec<Point3<f64>> {
        config.atoms().iter().map(|a| a.position).collect()
    }

    #[test]
    fn periodic_bcc_has_four_first_shell_pairs_per_atom() {
        let config = bcc([Boundary::Periodic; 3], [3, 3, 3]);
        let cutoff = 0.5 * (3.0 * 3f64.sqrt() / 2.0 + 3.0);
        let pairs = neighbor_pairs(&positions(&config), &config, cutoff);
        // eight neighbors per atom, each pair counted once
        assert_eq!(pairs.len(), config.len() * 4);
        for pair in &pairs {
            assert!(pair.first < pair.second);
            assert!((pair.separation.norm() - 3.0 * 3f64.sqrt() / 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn open_boundaries_drop_pairs_across_faces() {
        let periodic = bcc([Boundary::Periodic; 3], [3, 3, 3]);
        let open = bcc([Boundary::Open, Boundary::Open, Boundary::Periodic], [3, 3, 3]);
        let cutoff = 2.8;
        let n_periodic = neighbor_pairs(&positions(&periodic), &periodic, cutoff).len();
        let n_open = neighbor_pairs(&positions(&open), &open, cutoff).len();
        assert!(n_open < n_periodic);
    }

    #[test]
    fn large_periodic_lattice_with_shared_planes_is_handled() {
        let config = bcc([Boundary::Periodic; 3], [8, 8, 8]);
        let cutoff = 0.5 * (3.0 * 3f64.sqrt() / 2.0 + 3.0);
        let pairs = neighbor_pairs(&positions(&config), &config, cutoff);
        assert_eq!(config.len(), 1024);
        assert_eq!(pairs.len(), config.len() * 4);
    }

    #[test]
    fn pairs_match_minimum_image_enumeration() {
        let config = bcc([Boundary::Open, Boundary::Periodic, Boundary::Periodic], [4, 4, 4]);
        let cutoff = 3.2;
        let points = positions(&config);
        let mut expected = Vec::new();
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                let d = config.minimum_image(&(points[j] - points[i]));
                if d.norm() <= cutoff {
                    expected.push((i, j));
                }
            }
        }
        let mut found: Vec<(usize, usize)> = neighbor_pairs(&points, &config, cutoff)
            .iter()
            .map(|pair| (pair.first, pair.second))
            .collect();
        found.sort_unstable();
        assert_eq!(found, expected);
    }

    #[test]
    fn empty_input_yields_no_pairs() {
        let config = bcc([Boundary::Periodic; 3], [1, 1, 1]);
        assert!(neighbor_pairs(&[], &config, 3.0).is_empty());
    }
}
