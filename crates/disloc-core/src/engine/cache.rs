use crate::core::crystal::orientation::CrystalOrientation;
use crate::core::elasticity::error::ElasticityError;
use crate::core::elasticity::field::{BranchCut, DisplacementField, SolverSettings};
use crate::core::elasticity::tensor::ElasticConstants;
use nalgebra::Vector3;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FieldKey {
    constants: [u64; 36],
    burgers: [u64; 3],
    orientation: [[i32; 3]; 3],
    cut: u64,
}

/// Memoized displacement fields, owned and passed around by the caller.
///
/// Entries are keyed by the exact bit patterns of the elastic constants,
/// Burgers vector and branch cut together with the integer orientation, so
/// only bit-identical inputs hit the cache.
#[derive(Debug, Default, Clone)]
pub struct FieldCache {
    data: HashMap<FieldKey, DisplacementField>,
    hits: usize,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.hits = 0;
    }

    /// Returns the cached field, solving and inserting it on a miss.
    pub fn get_or_solve(
        &mut self,
        constants: &ElasticConstants,
        burgers: &Vector3<f64>,
        orientation: &CrystalOrientation,
        cut: BranchCut,
        settings: &SolverSettings,
    ) -> Result<DisplacementField, ElasticityError> {
        let key = FieldKey {
            constants: constants.cache_key(),
            burgers: [burgers.x.to_bits(), burgers.y.to_bits(), burgers.z.to_bits()],
            orientation: *orientation.directions(),
            cut: cut.cache_key(),
        };
        if let Some(field) = self.data.get(&key) {
            self.hits += 1;
            return Ok(field.clone());
        }
        let field = DisplacementField::solve(constants, burgers, orientation, cut, settings)?;
        self.data.insert(key, field.clone());
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_request_hits_cache() {
        let mut cache = FieldCache::new();
        let constants = ElasticConstants::cubic(243.0, 145.0, 116.0).unwrap();
        let orientation = CrystalOrientation::new([1, 1, -2], [-1, 1, 0], [1, 1, 1]).unwrap();
        let burgers = Vector3::new(0.0, 0.0, 2.48);
        let settings = SolverSettings::default();

        let first = cache
            .get_or_solve(&constants, &burgers, &orientation, BranchCut::default(), &settings)
            .unwrap();
        let second = cache
            .get_or_solve(&constants, &burgers, &orientation, BranchCut::default(), &settings)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);

        cache
            .get_or_solve(
                &constants,
                &Vector3::new(2.48, 0.0, 0.0),
                &orientation,
                BranchCut::default(),
                &settings,
            )
            .unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_solution_is_not_cached() {
        let mut cache = FieldCache::new();
        let constants = ElasticConstants::isotropic(50.0, 0.3).unwrap();
        // A negative isotropy tolerance forces the sextic path.
        let settings = SolverSettings {
            isotropy: -1.0,
            ..SolverSettings::default()
        };
        let result = cache.get_or_solve(
            &constants,
            &Vector3::new(0.0, 0.0, 1.0),
            &CrystalOrientation::cubic(),
            BranchCut::default(),
            &settings,
        );
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
