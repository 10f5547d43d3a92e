use super::configuration::ModelError;
use nalgebra::{Vector2, Vector3};

/// One straight dislocation line: Burgers vector plus in-plane core offset.
///
/// Both quantities are in the dislocation frame; the offset is measured from
/// the reference core of the owning structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialDislocation {
    pub burgers: Vector3<f64>,
    pub offset: Vector2<f64>,
}

impl PartialDislocation {
    pub fn new(burgers: Vector3<f64>, offset: Vector2<f64>) -> Self {
        Self { burgers, offset }
    }
}

/// Screw, edge or mixed character of a Burgers vector relative to the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Character {
    Screw,
    Edge,
    Mixed,
}

/// Burgers content of a dislocation: a single compact core or an ordered
/// sequence of partials.
#[derive(Debug, Clone, PartialEq)]
pub enum BurgersConfig {
    Compact { burgers: Vector3<f64> },
    Dissociated { partials: Vec<PartialDislocation> },
}

impl BurgersConfig {
    pub fn compact(burgers: Vector3<f64>) -> Self {
        Self::Compact { burgers }
    }

    /// A dissociated dislocation from an explicit list of partials.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NoPartials`] for an empty list.
    pub fn dissociated(partials: Vec<PartialDislocation>) -> Result<Self, ModelError> {
        if partials.is_empty() {
            return Err(ModelError::NoPartials);
        }
        Ok(Self::Dissociated { partials })
    }

    /// Two partials on the glide plane, `separation` apart along `x` and
    /// centred on the reference core. This is the usual stacking-fault ribbon.
    pub fn split_on_glide_plane(
        leading: Vector3<f64>,
        trailing: Vector3<f64>,
        separation: f64,
    ) -> Self {
        let half = 0.5 * separation;
        Self::Dissociated {
            partials: vec![
                PartialDislocation::new(trailing, Vector2::new(-half, 0.0)),
                PartialDislocation::new(leading, Vector2::new(half, 0.0)),
            ],
        }
    }

    /// Sum of all Burgers vectors.
    pub fn total(&self) -> Vector3<f64> {
        match self {
            Self::Compact { burgers } => *burgers,
            Self::Dissociated { partials } => partials.iter().map(|p| p.burgers).sum(),
        }
    }

    /// The (Burgers vector, core offset) pairs; a compact dislocation is a
    /// single pair at zero offset.
    pub fn partials(&self) -> Vec<PartialDislocation> {
        match self {
            Self::Compact { burgers } => vec![PartialDislocation::new(*burgers, Vector2::zeros())],
            Self::Dissociated { partials } => partials.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Compact { .. } => 1,
            Self::Dissociated { partials } => partials.len(),
        }
    }

    pub fn is_dissociated(&self) -> bool {
        matches!(self, Self::Dissociated { .. })
    }

    /// Angle between the total Burgers vector and the line (`z`), in radians.
    pub fn character_angle(&self) -> f64 {
        let b = self.total();
        b.xy().norm().atan2(b.z.abs())
    }

    pub fn character(&self, tolerance: f64) -> Character {
        let angle = self.character_angle();
        if angle < tolerance {
            Character::Screw
        } else if (angle - std::f64::consts::FRAC_PI_2).abs() < tolerance {
            Character::Edge
        } else {
            Character::Mixed
        }
    }
}
