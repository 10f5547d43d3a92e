use crate::core::elasticity::field::BranchCut;
use crate::core::utils::geometry::nearest_shift;
use crate::engine::error::DislocationError;
use nalgebra::{Vector2, Vector3};
use std::f64::consts::PI;

/// A closed loop of atoms around the core and the Burgers vector it encloses.
#[derive(Debug, Clone, PartialEq)]
pub struct BurgersCircuit {
    /// Slots of the loop atoms in traversal order.
    pub atoms: Vec<usize>,
    pub radius: f64,
    pub burgers: Vector3<f64>,
}

/// Runs a Burgers circuit through the atoms within `width / 2` of the circle
/// of `radius` around `center`.
///
/// Atoms are visited counterclockwise starting just past `cut`. Every step,
/// the closing one included, compares the displacement difference with the
/// nearest entry of `translations`; the sum of the chosen translations is the
/// negated closure failure, so the result is exactly a lattice vector. With
/// the default cut this equals the displacement jump "above minus below".
pub fn burgers_circuit(
    positions: &[Vector2<f64>],
    displacements: &[Vector3<f64>],
    center: &Vector2<f64>,
    radius: f64,
    width: f64,
    cut: &BranchCut,
    translations: &[Vector3<f64>],
) -> Result<BurgersCircuit, DislocationError> {
    let mut ring: Vec<(f64, usize)> = positions
        .iter()
        .enumerate()
        .filter(|(_, p)| ((*p - center).norm() - radius).abs() <= 0.5 * width)
        .map(|(slot, p)| (cut.angle_from_cut(&(p - center)), slot))
        .collect();
    if ring.len() < 3 {
        return Err(DislocationError::CoreFit(format!(
            "only {} atoms on the Burgers circuit of radius {radius:.3}",
            ring.len()
        )));
    }
    ring.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let largest_gap = ring
        .windows(2)
        .map(|w| w[1].0 - w[0].0)
        .chain(std::iter::once(ring[0].0 + 2.0 * PI - ring[ring.len() - 1].0))
        .fold(0.0_f64, f64::max);
    if largest_gap >= PI {
        return Err(DislocationError::CoreFit(format!(
            "Burgers circuit of radius {radius:.3} does not enclose the core (angular gap {largest_gap:.3} rad)"
        )));
    }

    let mut burgers = Vector3::zeros();
    for k in 0..ring.len() {
        let from = ring[k].1;
        let to = ring[(k + 1) % ring.len()].1;
        let step = displacements[to] - displacements[from];
        let (translation, _) = nearest_shift(&step, translations).ok_or_else(|| {
            DislocationError::InvalidInput("no lattice translations for the Burgers circuit".into())
        })?;
        burgers -= translation;
    }

    Ok(BurgersCircuit {
        atoms: ring.into_iter().map(|(_, slot)| slot).collect(),
        radius,
        burgers,
    })
}
