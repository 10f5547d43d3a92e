use crate::core::crystal::material::Material;
use crate::core::crystal::orientation::CrystalOrientation;
use crate::core::elasticity::field::{BranchCut, SolverSettings};
use crate::core::models::burgers::BurgersConfig;
use crate::core::models::configuration::Boundary;
use nalgebra::Vector2;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Numerical tolerances shared by construction and analysis.
///
/// | field                  | default        | unit      |
/// |------------------------|----------------|-----------|
/// | `isotropy`             | `1e-8`         | relative  |
/// | `root_separation`      | `1e-4`         | -         |
/// | `root_tolerance`       | `1e-13`        | relative  |
/// | `max_root_iterations`  | `500`          | -         |
/// | `periodicity`          | `1e-8`         | Å         |
/// | `burgers_mismatch`     | `1e-4`         | Å         |
/// | `position`             | `1e-8`         | Å         |
/// | `core_regularization`  | `1e-8`         | Å         |
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub isotropy: f64,
    pub root_separation: f64,
    pub root_tolerance: f64,
    pub max_root_iterations: usize,
    pub periodicity: f64,
    pub burgers_mismatch: f64,
    pub position: f64,
    pub core_regularization: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        let solver = SolverSettings::default();
        Self {
            isotropy: solver.isotropy,
            root_separation: solver.root_separation,
            root_tolerance: solver.root_tolerance,
            max_root_iterations: solver.max_root_iterations,
            periodicity: 1e-8,
            burgers_mismatch: 1e-4,
            position: 1e-8,
            core_regularization: solver.core_regularization,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToleranceFile {
    #[serde(default)]
    tolerances: Tolerances,
}

impl Tolerances {
    pub fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            isotropy: self.isotropy,
            root_separation: self.root_separation,
            root_tolerance: self.root_tolerance,
            max_root_iterations: self.max_root_iterations,
            core_regularization: self.core_regularization,
        }
    }

    /// Reads the optional `[tolerances]` table of a TOML file; missing keys
    /// keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: ToleranceFile = toml::from_str(&content).map_err(|e| ConfigLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Ok(file.tolerances)
    }
}

/// Extent of the cell along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extent {
    /// Whole multiples of the minimal repeat along the axis.
    Repeats(usize),
    /// Absolute length in Å, rounded up to whole repeats.
    Length(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub extents: [Extent; 3],
}

impl Dimensions {
    pub fn repeats(counts: [usize; 3]) -> Self {
        Self {
            extents: counts.map(Extent::Repeats),
        }
    }

    pub fn lengths(lengths: [f64; 3]) -> Self {
        Self {
            extents: lengths.map(Extent::Length),
        }
    }
}

/// Cylindrical cluster carved around the line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterGeometry {
    /// Atoms farther than this from the cluster axis are removed.
    pub radius: f64,
    /// Axis position in the plane; the cell center when absent.
    pub center: Option<Vector2<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructionConfig {
    pub material: Material,
    pub orientation: CrystalOrientation,
    pub dimensions: Dimensions,
    pub boundaries: [Boundary; 3],
    pub burgers: BurgersConfig,
    /// Reference core position; placed between glide planes near the cell
    /// center when absent.
    pub core: Option<Vector2<f64>>,
    pub branch_cut: BranchCut,
    pub exclusion_radius: f64,
    pub cluster: Option<ClusterGeometry>,
    pub fixed_shell: f64,
    pub adjust_cell: bool,
    pub tolerances: Tolerances,
}

#[derive(Default)]
pub struct ConstructionConfigBuilder {
    material: Option<Material>,
    orientation: Option<CrystalOrientation>,
    dimensions: Option<Dimensions>,
    boundaries: Option<[Boundary; 3]>,
    burgers: Option<BurgersConfig>,
    core: Option<Vector2<f64>>,
    branch_cut: Option<BranchCut>,
    exclusion_radius: Option<f64>,
    cluster: Option<ClusterGeometry>,
    fixed_shell: Option<f64>,
    adjust_cell: bool,
    tolerances: Option<Tolerances>,
}

impl ConstructionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }
    pub fn orientation(mut self, orientation: CrystalOrientation) -> Self {
        self.orientation = Some(orientation);
        self
    }
    pub fn dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
    pub fn boundaries(mut self, boundaries: [Boundary; 3]) -> Self {
        self.boundaries = Some(boundaries);
        self
    }
    pub fn burgers(mut self, burgers: BurgersConfig) -> Self {
        self.burgers = Some(burgers);
        self
    }
    pub fn core(mut self, core: Vector2<f64>) -> Self {
        self.core = Some(core);
        self
    }
    pub fn branch_cut(mut self, cut: BranchCut) -> Self {
        self.branch_cut = Some(cut);
        self
    }
    pub fn exclusion_radius(mut self, radius: f64) -> Self {
        self.exclusion_radius = Some(radius);
        self
    }
    pub fn cluster(mut self, cluster: ClusterGeometry) -> Self {
        self.cluster = Some(cluster);
        self
    }
    pub fn fixed_shell(mut self, width: f64) -> Self {
        self.fixed_shell = Some(width);
        self
    }
    pub fn adjust_cell(mut self, adjust: bool) -> Self {
        self.adjust_cell = adjust;
        self
    }
    pub fn tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = Some(tolerances);
        self
    }

    /// Finalizes the configuration.
    ///
    /// Boundaries default to open in-plane axes and a periodic line axis.
    pub fn build(self) -> Result<ConstructionConfig, ConfigError> {
        let exclusion_radius = self.exclusion_radius.unwrap_or(0.0);
        if !(exclusion_radius >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "exclusion_radius",
                reason: format!("must be non-negative, got {exclusion_radius}"),
            });
        }
        let fixed_shell = self.fixed_shell.unwrap_or(0.0);
        if !(fixed_shell >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "fixed_shell",
                reason: format!("must be non-negative, got {fixed_shell}"),
            });
        }
        if let Some(cluster) = &self.cluster {
            if !(cluster.radius > exclusion_radius) {
                return Err(ConfigError::InvalidParameter {
                    name: "cluster",
                    reason: format!(
                        "radius {} must exceed the exclusion radius {exclusion_radius}",
                        cluster.radius
                    ),
                });
            }
        }

        Ok(ConstructionConfig {
            material: self
                .material
                .ok_or(ConfigError::MissingParameter("material"))?,
            orientation: self
                .orientation
                .ok_or(ConfigError::MissingParameter("orientation"))?,
            dimensions: self
                .dimensions
                .ok_or(ConfigError::MissingParameter("dimensions"))?,
            boundaries: self
                .boundaries
                .unwrap_or([Boundary::Open, Boundary::Open, Boundary::Periodic]),
            burgers: self
                .burgers
                .ok_or(ConfigError::MissingParameter("burgers"))?,
            core: self.core,
            branch_cut: self.branch_cut.unwrap_or_default(),
            exclusion_radius,
            cluster: self.cluster,
            fixed_shell,
            adjust_cell: self.adjust_cell,
            tolerances: self.tolerances.unwrap_or_default(),
        })
    }
}

/// How the analyzer locates the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoreEstimator {
    /// Weighted centroid of atoms above the differential-displacement threshold.
    Centroid,
    /// Centroid refined by a least-squares fit against the continuum field.
    #[default]
    LeastSquares,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub estimator: CoreEstimator,
    /// Fraction of `|b|/2` a differential displacement must exceed to mark
    /// an atom as part of the core.
    pub dd_threshold: f64,
    /// Neighbor cutoff for differential displacements; midway between the
    /// first and second neighbor shells when absent.
    pub neighbor_cutoff: Option<f64>,
    /// Radius around the initial core estimate used for the fit.
    pub fit_radius: Option<f64>,
    /// Burgers circuit radius around the fitted core.
    pub circuit_radius: Option<f64>,
    pub max_fit_iterations: u64,
    pub tolerances: Tolerances,
}

#[derive(Default)]
pub struct AnalysisConfigBuilder {
    estimator: Option<CoreEstimator>,
    dd_threshold: Option<f64>,
    neighbor_cutoff: Option<f64>,
    fit_radius: Option<f64>,
    circuit_radius: Option<f64>,
    max_fit_iterations: Option<u64>,
    tolerances: Option<Tolerances>,
}

impl AnalysisConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimator(mut self, estimator: CoreEstimator) -> Self {
        self.estimator = Some(estimator);
        self
    }
    pub fn dd_threshold(mut self, fraction: f64) -> Self {
        self.dd_threshold = Some(fraction);
        self
    }
    pub fn neighbor_cutoff(mut self, cutoff: f64) -> Self {
        self.neighbor_cutoff = Some(cutoff);
        self
    }
    pub fn fit_radius(mut self, radius: f64) -> Self {
        self.fit_radius = Some(radius);
        self
    }
    pub fn circuit_radius(mut self, radius: f64) -> Self {
        self.circuit_radius = Some(radius);
        self
    }
    pub fn max_fit_iterations(mut self, iterations: u64) -> Self {
        self.max_fit_iterations = Some(iterations);
        self
    }
    pub fn tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = Some(tolerances);
        self
    }

    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        let dd_threshold = self.dd_threshold.unwrap_or(0.5);
        if !(dd_threshold > 0.0 && dd_threshold <= 1.0) {
            return Err(ConfigError::InvalidParameter {
                name: "dd_threshold",
                reason: format!("must lie in (0, 1], got {dd_threshold}"),
            });
        }
        for (name, value) in [
            ("neighbor_cutoff", self.neighbor_cutoff),
            ("fit_radius", self.fit_radius),
            ("circuit_radius", self.circuit_radius),
        ] {
            if let Some(v) = value {
                if !(v > 0.0) {
                    return Err(ConfigError::InvalidParameter {
                        name,
                        reason: format!("must be positive, got {v}"),
                    });
                }
            }
        }
        Ok(AnalysisConfig {
            estimator: self.estimator.unwrap_or_default(),
            dd_threshold,
            neighbor_cutoff: self.neighbor_cutoff,
            fit_radius: self.fit_radius,
            circuit_radius: self.circuit_radius,
            max_fit_iterations: self.max_fit_iterations.unwrap_or(500),
            tolerances: self.tolerances.unwrap_or_default(),
        })
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            estimator: CoreEstimator::default(),
            dd_threshold: 0.5,
            neighbor_cutoff: None,
            fit_radius: None,
            circuit_radius: None,
            max_fit_iterations: 500,
            tolerances: Tolerances::default(),
        }
    }
}
