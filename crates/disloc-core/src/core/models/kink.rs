use super::configuration::ModelError;
use nalgebra::Vector2;

/// Shape of the core-offset ramp across a kink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionProfile {
    Linear,
    /// `3t² - 2t³`; the core offset has zero slope at both ends of the ramp.
    #[default]
    Smoothstep,
}

impl TransitionProfile {
    /// Fraction of the kink offset reached at normalized position `t`,
    /// clamped to `[0, 1]` outside the transition region.
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Smoothstep => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Kink positions along the line (Angstroms from the bottom of the cell).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KinkGeometry {
    /// Two kinks of opposite sense; the cell stays fully periodic.
    Double { first: f64, second: f64 },
    /// One kink; the line-direction cell vector is tilted by the kink offset.
    Single { position: f64 },
}

/// Everything needed to build a kinked line from a straight one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinkPairSpecification {
    pub geometry: KinkGeometry,
    /// Length of each transition region along the line.
    pub width: f64,
    /// In-plane core displacement across a kink.
    pub offset: Vector2<f64>,
    /// Number of straight-slab repeats stacked along the line.
    pub segments: usize,
    pub profile: TransitionProfile,
}

impl KinkPairSpecification {
    pub fn double(
        first: f64,
        second: f64,
        width: f64,
        offset: Vector2<f64>,
        segments: usize,
    ) -> Result<Self, ModelError> {
        if !(first < second) {
            return Err(ModelError::InvalidKink(format!(
                "kink positions must be increasing, got {first} and {second}"
            )));
        }
        Self::checked(KinkGeometry::Double { first, second }, width, offset, segments)
    }

    pub fn single(
        position: f64,
        width: f64,
        offset: Vector2<f64>,
        segments: usize,
    ) -> Result<Self, ModelError> {
        Self::checked(KinkGeometry::Single { position }, width, offset, segments)
    }

    pub fn with_profile(mut self, profile: TransitionProfile) -> Self {
        self.profile = profile;
        self
    }

    fn checked(
        geometry: KinkGeometry,
        width: f64,
        offset: Vector2<f64>,
        segments: usize,
    ) -> Result<Self, ModelError> {
        if !(width > 0.0) {
            return Err(ModelError::InvalidKink(format!(
                "transition width must be positive, got {width}"
            )));
        }
        if segments == 0 {
            return Err(ModelError::InvalidKink("segment count must be at least 1".into()));
        }
        Ok(Self {
            geometry,
            width,
            offset,
            segments,
            profile: TransitionProfile::default(),
        })
    }

    /// Core offset at height `z` along the line.
    pub fn offset_at(&self, z: f64) -> Vector2<f64> {
        let ramp = |center: f64| self.profile.evaluate((z - center) / self.width + 0.5);
        let fraction = match self.geometry {
            KinkGeometry::Double { first, second } => ramp(first) - ramp(second),
            KinkGeometry::Single { position } => ramp(position),
        };
        self.offset * fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_hit_endpoints() {
        for profile in [TransitionProfile::Linear, TransitionProfile::Smoothstep] {
            assert_eq!(profile.evaluate(-1.0), 0.0);
            assert_eq!(profile.evaluate(0.0), 0.0);
            assert_eq!(profile.evaluate(1.0), 1.0);
            assert_eq!(profile.evaluate(2.0), 1.0);
            assert!((profile.evaluate(0.5) - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn double_kink_offset_is_a_plateau() {
        let spec = KinkPairSpecification::double(20.0, 60.0, 10.0, Vector2::new(3.0, 0.0), 40)
            .unwrap();
        assert_eq!(spec.offset_at(5.0), Vector2::zeros());
        assert_eq!(spec.offset_at(40.0), Vector2::new(3.0, 0.0));
        assert_eq!(spec.offset_at(80.0), Vector2::zeros());
        assert!((spec.offset_at(20.0).x - 1.5).abs() < 1e-12);
    }

    #[test]
    fn single_kink_offset_is_a_step() {
        let spec = KinkPairSpecification::single(50.0, 8.0, Vector2::new(0.0, 2.0), 10)
            .unwrap()
            .with_profile(TransitionProfile::Linear);
        assert_eq!(spec.offset_at(0.0), Vector2::zeros());
        assert_eq!(spec.offset_at(100.0), Vector2::new(0.0, 2.0));
        assert!((spec.offset_at(52.0).y - 1.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_degenerate_specifications() {
        assert!(KinkPairSpecification::double(5.0, 5.0, 1.0, Vector2::zeros(), 1).is_err());
        assert!(KinkPairSpecification::single(5.0, 0.0, Vector2::zeros(), 1).is_err());
        assert!(KinkPairSpecification::single(5.0, 1.0, Vector2::zeros(), 0).is_err());
    }
}
