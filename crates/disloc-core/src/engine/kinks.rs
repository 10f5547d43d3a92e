use super::config::{Dimensions, Extent, Tolerances};
use super::constructor::{ConstructedDislocation, StraightDislocation};
use super::error::DislocationError;
use crate::core::crystal::orientation::Axis;
use crate::core::models::configuration::Boundary;
use crate::core::models::kink::{KinkGeometry, KinkPairSpecification};
use nalgebra::{Matrix3, Vector3};
use tracing::{info, instrument};

/// Builds a kinked line from a straight dislocation.
///
/// The straight slab is stacked `segments` times along the line and every
/// core is shifted in-plane by [`KinkPairSpecification::offset_at`] evaluated
/// at each atom's height. A double kink keeps the cell fully periodic; a
/// single kink tilts the line cell vector by a lattice translation whose
/// in-plane part is the kink offset, so the line re-enters the cell shifted by
/// exactly that offset.
///
/// # Errors
///
/// Returns [`DislocationError::InvalidKinkGeometry`] when the line axis is not
/// periodic, when kinks or their transition regions fall outside the cell or
/// overlap, when the kinks are at least half a cell length apart (double) or
/// as wide as half the cell (single), or when a single-kink offset is not the
/// projection of a lattice translation.
#[instrument(skip_all, name = "build_kink_pair")]
pub fn build_kink_pair(
    straight: &StraightDislocation,
    spec: &KinkPairSpecification,
) -> Result<ConstructedDislocation, DislocationError> {
    let builder = &straight.lattice;
    let tolerances = &straight.constructor.options().tolerances;
    if builder.boundary_conditions()[Axis::Z.index()] != Boundary::Periodic {
        return Err(DislocationError::InvalidKinkGeometry(
            "the line axis must be periodic".into(),
        ));
    }

    let repeat = builder.repeat_lengths()?[Axis::Z.index()];
    let lengths = builder.box_lengths(&straight.dimensions)?;
    let slab_repeats = (lengths[2] / repeat).round();
    if slab_repeats < 1.0 || (slab_repeats * repeat - lengths[2]).abs() > tolerances.periodicity {
        return Err(DislocationError::InvalidKinkGeometry(format!(
            "slab length {:.6} Å is not a multiple of the line repeat {repeat:.6} Å",
            lengths[2]
        )));
    }
    let total_repeats = slab_repeats as usize * spec.segments;
    let length = total_repeats as f64 * repeat;

    let lattice = match spec.geometry {
        KinkGeometry::Double { first, second } => {
            validate_double(first, second, spec.width, length, tolerances)?;
            let dimensions = Dimensions {
                extents: [
                    straight.dimensions.extents[0],
                    straight.dimensions.extents[1],
                    Extent::Repeats(total_repeats),
                ],
            };
            builder.build(&dimensions)?
        }
        KinkGeometry::Single { position } => {
            let line = single_kink_line_vector(straight, spec, length, repeat, tolerances)?;
            validate_single(position, spec.width, length.min(line.z), tolerances)?;
            let cell = Matrix3::from_columns(&[
                Vector3::new(lengths[0], 0.0, 0.0),
                Vector3::new(0.0, lengths[1], 0.0),
                line,
            ]);
            builder.build_in_cell(&cell)?
        }
    };

    let built = straight
        .constructor
        .apply(&lattice, |position| spec.offset_at(position.z))?;
    info!(
        atoms = built.configuration.len(),
        length,
        segments = spec.segments,
        "Kinked dislocation constructed."
    );
    Ok(built)
}

fn invalid(message: String) -> DislocationError {
    DislocationError::InvalidKinkGeometry(message)
}

fn validate_double(
    first: f64,
    second: f64,
    width: f64,
    length: f64,
    tolerances: &Tolerances,
) -> Result<(), DislocationError> {
    let separation = second - first;
    if separation >= 0.5 * length - tolerances.position {
        return Err(invalid(format!(
            "kink separation {separation:.6} Å must be below half the cell length {:.6} Å",
            0.5 * length
        )));
    }
    for z in [first, second] {
        if !(0.0..length).contains(&z) {
            return Err(invalid(format!("kink at {z:.6} Å lies outside [0, {length:.6})")));
        }
    }
    if first - 0.5 * width < -tolerances.position || second + 0.5 * width > length + tolerances.position {
        return Err(invalid(format!(
            "transition regions of width {width:.6} Å do not fit inside the cell"
        )));
    }
    if separation < width {
        return Err(invalid(format!(
            "transition regions overlap: separation {separation:.6} Å, width {width:.6} Å"
        )));
    }
    Ok(())
}

fn validate_single(
    position: f64,
    width: f64,
    length: f64,
    tolerances: &Tolerances,
) -> Result<(), DislocationError> {
    if width >= 0.5 * length - tolerances.position {
        return Err(invalid(format!(
            "kink width {width:.6} Å must be below half the cell length {:.6} Å",
            0.5 * length
        )));
    }
    if !(0.0..length).contains(&position) {
        return Err(invalid(format!(
            "kink at {position:.6} Å lies outside [0, {length:.6})"
        )));
    }
    if position - 0.5 * width < -tolerances.position
        || position + 0.5 * width > length + tolerances.position
    {
        return Err(invalid(format!(
            "transition region of width {width:.6} Å does not fit inside the cell"
        )));
    }
    Ok(())
}

/// Line cell vector `T + L ẑ` of a single-kink cell, where `T` is the lattice
/// translation with in-plane part equal to the kink offset and the shortest
/// line component modulo the line repeat.
fn single_kink_line_vector(
    straight: &StraightDislocation,
    spec: &KinkPairSpecification,
    length: f64,
    repeat: f64,
    tolerances: &Tolerances,
) -> Result<Vector3<f64>, DislocationError> {
    let builder = &straight.lattice;
    let radius = spec.offset.norm() + repeat;
    let translations = builder
        .crystal()
        .translations_within(radius, builder.orientation().rotation());

    let matched = translations
        .iter()
        .filter(|t| (t.xy() - spec.offset).norm() <= tolerances.position.max(1e-9 * repeat))
        .map(|t| {
            let along = t.z - repeat * (t.z / repeat).round();
            Vector3::new(t.x, t.y, along)
        })
        .min_by(|a, b| a.z.abs().total_cmp(&b.z.abs()));

    match matched {
        Some(t) => Ok(Vector3::new(t.x, t.y, length + t.z)),
        None => Err(invalid(format!(
            "single-kink offset {:?} is not the in-plane part of a lattice translation",
            spec.offset
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crystal::orientation::CrystalOrientation;
    use crate::core::crystal::structure::{Crystal, CrystalStructure};
    use crate::core::elasticity::field::{BranchCut, DisplacementField};
    use crate::core::elasticity::tensor::ElasticConstants;
    use crate::core::models::burgers::BurgersConfig;
    use crate::core::models::structure::DislocationStructure;
    use crate::core::utils::geometry::in_plane;
    use crate::engine::constructor::{ConstructorOptions, DislocationConstructor, default_core};
    use crate::engine::lattice::LatticeBuilder;
    use nalgebra::Vector2;

    const A: f64 = 3.0;

    fn screw(boundaries: [Boundary; 3]) -> (StraightDislocation, DisplacementField) {
        let crystal = Crystal::new(CrystalStructure::Bcc, A).unwrap();
        let orientation = CrystalOrientation::new([1, 1, -2], [-1, 1, 0], [1, 1, 1]).unwrap();
        let builder = LatticeBuilder::new(crystal, orientation.clone(), "Fe").boundaries(boundaries);
        let dimensions = Dimensions::repeats([3, 4, 2]);
        let slab = builder.build(&dimensions).unwrap();
        let burgers = Vector3::new(0.0, 0.0, A * 3f64.sqrt() / 2.0);
        let field = DisplacementField::solve(
            &ElasticConstants::isotropic(50.0, 0.3).unwrap(),
            &burgers,
            &orientation,
            BranchCut::default(),
            &Default::default(),
        )
        .unwrap();
        let structure = DislocationStructure::new(
            "screw",
            orientation,
            BurgersConfig::compact(burgers),
            default_core(&slab),
        );
        let constructor =
            DislocationConstructor::new(structure, vec![field.clone()], ConstructorOptions::default())
                .unwrap();
        (
            StraightDislocation {
                lattice: builder,
                dimensions,
                constructor,
            },
            field,
        )
    }

    fn line_length(straight: &StraightDislocation, segments: usize) -> f64 {
        straight.lattice.box_lengths(&straight.dimensions).unwrap()[2] * segments as f64
    }

    fn valley_offset() -> Vector2<f64> {
        Vector2::new(A * 6f64.sqrt() / 3.0, 0.0)
    }

    #[test]
    fn double_kink_shifts_core_between_kinks() {
        let (straight, field) = screw([Boundary::Open, Boundary::Open, Boundary::Periodic]);
        let length = line_length(&straight, 10);
        let spec = KinkPairSpecification::double(13.0, 38.0, 5.0, valley_offset(), 10).unwrap();
        let built = build_kink_pair(&straight, &spec).unwrap();

        let core = straight.constructor.structure().core;
        assert!((built.configuration.cell_vector(Axis::Z).z - length).abs() < 1e-9);
        assert_eq!(built.configuration.len(), built.reference.len());
        for (atom, original) in built.configuration.atoms().iter().zip(built.reference.atoms()) {
            let z = original.position.z;
            let expected_core = if (16.0..35.0).contains(&z) {
                core + valley_offset()
            } else if z < 10.0 || z > 41.0 {
                core
            } else {
                continue;
            };
            let expected = field.displacement(&(in_plane(&original.position) - expected_core));
            assert!((atom.position - original.position - expected).norm() < 1e-12);
        }
    }

    #[test]
    fn double_kink_at_half_length_is_rejected() {
        let (straight, _) = screw([Boundary::Open, Boundary::Open, Boundary::Periodic]);
        let length = line_length(&straight, 10);
        let spec =
            KinkPairSpecification::double(8.0, 8.0 + 0.5 * length, 4.0, valley_offset(), 10).unwrap();
        assert!(matches!(
            build_kink_pair(&straight, &spec),
            Err(DislocationError::InvalidKinkGeometry(_))
        ));
    }

    #[test]
    fn overlapping_transitions_are_rejected() {
        let (straight, _) = screw([Boundary::Open, Boundary::Open, Boundary::Periodic]);
        let spec = KinkPairSpecification::double(10.0, 13.0, 5.0, valley_offset(), 10).unwrap();
        assert!(matches!(
            build_kink_pair(&straight, &spec),
            Err(DislocationError::InvalidKinkGeometry(_))
        ));
    }

    #[test]
    fn single_kink_tilts_line_vector_by_lattice_translation() {
        let (straight, _) = screw([Boundary::Periodic; 3]);
        let length = line_length(&straight, 8);
        let spec = KinkPairSpecification::single(20.0, 6.0, valley_offset(), 8).unwrap();
        let built = build_kink_pair(&straight, &spec).unwrap();

        let line = built.configuration.cell_vector(Axis::Z);
        let b = A * 3f64.sqrt() / 2.0;
        assert!((line.xy() - valley_offset()).norm() < 1e-9);
        assert!((line.z - (length + b / 3.0)).abs() < 1e-9);
        let crystal = straight.lattice.crystal();
        let expected = (built.configuration.volume() / crystal.atomic_volume()).round() as usize;
        assert_eq!(built.configuration.len(), expected);
    }

    #[test]
    fn single_kink_offset_must_be_lattice_translation() {
        let (straight, _) = screw([Boundary::Periodic; 3]);
        let spec = KinkPairSpecification::single(20.0, 6.0, Vector2::new(1.0, 0.0), 8).unwrap();
        assert!(matches!(
            build_kink_pair(&straight, &spec),
            Err(DislocationError::InvalidKinkGeometry(_))
        ));
    }

    #[test]
    fn wide_single_kink_is_rejected() {
        let (straight, _) = screw([Boundary::Periodic; 3]);
        let length = line_length(&straight, 4);
        let spec =
            KinkPairSpecification::single(0.5 * length, 0.5 * length, valley_offset(), 4).unwrap();
        assert!(matches!(
            build_kink_pair(&straight, &spec),
            Err(DislocationError::InvalidKinkGeometry(_))
        ));
    }

    #[test]
    fn open_line_axis_is_rejected() {
        let (straight, _) = screw([Boundary::Open; 3]);
        let spec = KinkPairSpecification::double(13.0, 38.0, 5.0, valley_offset(), 10).unwrap();
        assert!(matches!(
            build_kink_pair(&straight, &spec),
            Err(DislocationError::InvalidKinkGeometry(_))
        ));
    }
}
