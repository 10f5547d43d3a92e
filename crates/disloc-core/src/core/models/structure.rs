use super::burgers::{BurgersConfig, PartialDislocation};
use crate::core::crystal::orientation::CrystalOrientation;
use nalgebra::Vector2;

/// A named placement of one or more dislocation lines in an oriented crystal.
///
/// `core` is the in-plane reference position (dislocation frame, Angstroms);
/// each partial sits at `core + offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct DislocationStructure {
    pub name: String,
    pub orientation: CrystalOrientation,
    pub burgers: BurgersConfig,
    pub core: Vector2<f64>,
}

impl DislocationStructure {
    pub fn new(
        name: &str,
        orientation: CrystalOrientation,
        burgers: BurgersConfig,
        core: Vector2<f64>,
    ) -> Self {
        Self {
            name: name.to_string(),
            orientation,
            burgers,
            core,
        }
    }

    /// Partials with their absolute in-plane core positions.
    pub fn placed_partials(&self) -> Vec<PartialDislocation> {
        self.burgers
            .partials()
            .into_iter()
            .map(|p| PartialDislocation::new(p.burgers, self.core + p.offset))
            .collect()
    }
}
