use super::config::{ClusterGeometry, Dimensions, Tolerances};
use super::error::DislocationError;
use super::lattice::LatticeBuilder;
use crate::core::crystal::orientation::Axis;
use crate::core::elasticity::field::DisplacementField;
use crate::core::models::configuration::AtomicConfiguration;
use crate::core::models::structure::DislocationStructure;
use crate::core::utils::geometry::in_plane;
use nalgebra::{Point3, Vector2, Vector3};
use tracing::{debug, info, instrument, warn};

/// A displacement field anchored at an absolute in-plane core position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedField {
    pub field: DisplacementField,
    pub core: Vector2<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorOptions {
    /// Atoms strictly closer than this to any partial core are deleted.
    pub exclusion_radius: f64,
    pub cluster: Option<ClusterGeometry>,
    /// Width of the fixed boundary shell at the cluster surface, or at the
    /// open cell faces when no cluster is carved.
    pub fixed_shell: f64,
    /// Lengthen periodic in-plane cell vectors by the net Burgers component
    /// along them instead of failing.
    pub adjust_cell: bool,
    pub tolerances: Tolerances,
}

impl Default for ConstructorOptions {
    fn default() -> Self {
        Self {
            exclusion_radius: 0.0,
            cluster: None,
            fixed_shell: 0.0,
            adjust_cell: false,
            tolerances: Tolerances::default(),
        }
    }
}

/// Output of the constructor.
///
/// `reference` holds exactly the atoms of `configuration` (same order, same
/// indices) at their undisplaced lattice positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructedDislocation {
    pub structure: DislocationStructure,
    pub configuration: AtomicConfiguration,
    pub reference: AtomicConfiguration,
    /// Lattice indices of the atoms deleted inside the core exclusion radius.
    pub excluded: Vec<usize>,
}

/// Applies one or more positioned displacement fields to a perfect lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct DislocationConstructor {
    structure: DislocationStructure,
    placements: Vec<PositionedField>,
    options: ConstructorOptions,
}

impl DislocationConstructor {
    /// Pairs each partial of `structure` with its displacement field.
    ///
    /// # Errors
    ///
    /// Returns [`DislocationError::InvalidInput`] if the number of fields does
    /// not match the number of partials or a field carries a different
    /// Burgers vector than its partial.
    pub fn new(
        structure: DislocationStructure,
        fields: Vec<DisplacementField>,
        options: ConstructorOptions,
    ) -> Result<Self, DislocationError> {
        let partials = structure.placed_partials();
        if partials.len() != fields.len() {
            return Err(DislocationError::InvalidInput(format!(
                "{} partials but {} displacement fields",
                partials.len(),
                fields.len()
            )));
        }
        let mut placements = Vec::with_capacity(fields.len());
        for (k, (partial, field)) in partials.iter().zip(fields).enumerate() {
            if (field.burgers() - partial.burgers).norm() > options.tolerances.position {
                return Err(DislocationError::InvalidInput(format!(
                    "field {k} has Burgers vector {:?}, partial expects {:?}",
                    field.burgers(),
                    partial.burgers
                )));
            }
            placements.push(PositionedField {
                field,
                core: partial.offset,
            });
        }
        Ok(Self {
            structure,
            placements,
            options,
        })
    }

    pub fn structure(&self) -> &DislocationStructure {
        &self.structure
    }

    pub fn placements(&self) -> &[PositionedField] {
        &self.placements
    }

    pub fn options(&self) -> &ConstructorOptions {
        &self.options
    }

    /// Straight dislocation along the line axis of `lattice`.
    #[instrument(skip_all, name = "construct_dislocation")]
    pub fn construct(
        &self,
        lattice: &AtomicConfiguration,
    ) -> Result<ConstructedDislocation, DislocationError> {
        self.apply(lattice, |_| Vector2::zeros())
    }

    /// Displaces `lattice` with every core shifted in-plane by
    /// `core_shift(position)`; used for kinked lines.
    pub(crate) fn apply<F>(
        &self,
        lattice: &AtomicConfiguration,
        core_shift: F,
    ) -> Result<ConstructedDislocation, DislocationError>
    where
        F: Fn(&Point3<f64>) -> Vector2<f64>,
    {
        let mut configuration = lattice.clone();
        let mut reference = lattice.clone();
        self.reconcile_periodicity(&mut configuration)?;

        let line = lattice.cell_vector(Axis::Z);
        let drift = if line.z.abs() > 0.0 {
            line.xy() / line.z
        } else {
            Vector2::zeros()
        };
        let cluster = self.options.cluster.map(|c| {
            let center = c.center.unwrap_or_else(|| cell_center(lattice));
            (center, c.radius)
        });
        let exclusion = self.options.exclusion_radius;
        let shell = self.options.fixed_shell;

        let mut excluded = Vec::new();
        let mut carved = 0usize;
        let mut on_cut = 0usize;
        let mut keep = vec![false; lattice.len()];
        let mut fixed = vec![false; lattice.len()];
        let mut displacements = vec![Vector3::zeros(); lattice.len()];

        for (slot, atom) in lattice.atoms().iter().enumerate() {
            let xy = in_plane(&atom.position);
            let shift = core_shift(&atom.position);

            if let Some((center, radius)) = cluster {
                let r = (xy - (center + drift * atom.position.z)).norm();
                if r > radius {
                    carved += 1;
                    continue;
                }
                fixed[slot] = shell > 0.0 && r > radius - shell;
            } else if shell > 0.0 {
                fixed[slot] = near_open_face(lattice, &atom.position, shell);
            }

            let mut u = Vector3::zeros();
            let mut inside = false;
            for placement in &self.placements {
                let relative = xy - (placement.core + shift);
                let r = relative.norm();
                if r < exclusion {
                    inside = true;
                    break;
                }
                if lies_on_cut(&relative, placement, self.options.tolerances.position) {
                    on_cut += 1;
                }
                u += placement.field.displacement(&relative);
            }
            if inside {
                excluded.push(atom.index);
                continue;
            }
            keep[slot] = true;
            displacements[slot] = u;
        }

        for (slot, atom) in configuration.atoms_mut().iter_mut().enumerate() {
            atom.position += displacements[slot];
            atom.fixed = fixed[slot];
        }
        for (slot, atom) in reference.atoms_mut().iter_mut().enumerate() {
            atom.fixed = fixed[slot];
        }
        let mut slot = 0;
        configuration.retain(|_| {
            slot += 1;
            keep[slot - 1]
        });
        let mut slot = 0;
        reference.retain(|_| {
            slot += 1;
            keep[slot - 1]
        });

        if on_cut > 0 {
            warn!(
                atoms = on_cut,
                "Atoms lie on a branch cut; their displacement side is decided by rounding."
            );
        }
        if carved > 0 {
            debug!(atoms = carved, "Atoms outside the cluster radius removed.");
        }
        info!(
            atoms = configuration.len(),
            excluded = excluded.len(),
            partials = self.placements.len(),
            "Dislocation constructed."
        );

        Ok(ConstructedDislocation {
            structure: self.structure.clone(),
            configuration,
            reference,
            excluded,
        })
    }

    /// Keeps periodic in-plane axes consistent with the net Burgers vector.
    ///
    /// The line axis is always compatible because the field does not vary
    /// along it.
    fn reconcile_periodicity(
        &self,
        configuration: &mut AtomicConfiguration,
    ) -> Result<(), DislocationError> {
        let total = self.structure.burgers.total();
        for axis in [Axis::X, Axis::Y] {
            if !configuration.is_periodic(axis) {
                continue;
            }
            let vector = configuration.cell_vector(axis);
            let unit = vector.normalize();
            let component = total.dot(&unit);
            if component.abs() <= self.options.tolerances.periodicity {
                continue;
            }
            if !self.options.adjust_cell {
                return Err(DislocationError::IncompatiblePeriodicity { axis, component });
            }
            configuration.set_cell_vector(axis, vector + unit * component)?;
            info!(
                axis = ?axis,
                component,
                "Periodic cell vector adjusted by the net Burgers component."
            );
        }
        Ok(())
    }
}

/// A straight dislocation ready to be built: lattice recipe plus constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct StraightDislocation {
    pub lattice: LatticeBuilder,
    pub dimensions: Dimensions,
    pub constructor: DislocationConstructor,
}

impl StraightDislocation {
    pub fn construct(&self) -> Result<ConstructedDislocation, DislocationError> {
        let lattice = self.lattice.build(&self.dimensions)?;
        self.constructor.construct(&lattice)
    }
}

/// Default reference core: the in-plane cell center, moved along `y` to the
/// midpoint between the two atomic planes that bracket it.
///
/// With the default branch cut along `-x` no atom then sits on the cut or
/// at the core.
pub fn default_core(lattice: &AtomicConfiguration) -> Vector2<f64> {
    let center = cell_center(lattice);
    let mut planes: Vec<f64> = lattice.atoms().iter().map(|a| a.position.y).collect();
    planes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    planes.dedup_by(|a, b| (*a - *b).abs() < 1e-6);

    let below = planes.iter().rev().find(|&&y| y <= center.y).copied();
    let above = planes.iter().find(|&&y| y > center.y).copied();
    match (below, above) {
        (Some(lo), Some(hi)) => Vector2::new(center.x, 0.5 * (lo + hi)),
        _ => center,
    }
}

fn cell_center(lattice: &AtomicConfiguration) -> Vector2<f64> {
    let c = lattice.cell();
    let mid = lattice.origin().coords + (c.column(0) + c.column(1)) * 0.5;
    mid.xy()
}

fn near_open_face(lattice: &AtomicConfiguration, position: &Point3<f64>, shell: f64) -> bool {
    let s = lattice.fractional(position);
    [Axis::X, Axis::Y].iter().any(|&axis| {
        if lattice.is_periodic(axis) {
            return false;
        }
        let length = lattice.cell_vector(axis).norm();
        let i = axis.index();
        s[i] * length < shell || (1.0 - s[i]) * length < shell
    })
}

fn lies_on_cut(relative: &Vector2<f64>, placement: &PositionedField, tolerance: f64) -> bool {
    let angle = placement.field.cut().angle();
    let direction = Vector2::new(angle.cos(), angle.sin());
    let along = relative.dot(&direction);
    let across = relative.perp(&direction).abs();
    along > 0.0 && across < tolerance
}
