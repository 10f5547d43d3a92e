use super::structure::{Crystal, CrystalError, CrystalStructure};
use crate::core::elasticity::error::ElasticityError;
use crate::core::elasticity::tensor::ElasticConstants;
use nalgebra::Matrix6;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaterialLoadError {
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
    #[error("Invalid crystal in '{path}': {source}")]
    Crystal { path: String, source: CrystalError },
    #[error("Invalid elastic constants in '{path}': {source}")]
    Elasticity {
        path: String,
        source: ElasticityError,
    },
}

/// Elastic constants as written in a material file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ElasticParams {
    Cubic {
        c11: f64,
        c12: f64,
        c44: f64,
    },
    Isotropic {
        shear_modulus: f64,
        poisson_ratio: f64,
    },
    Voigt {
        voigt: [[f64; 6]; 6],
    },
}

impl ElasticParams {
    pub fn to_constants(&self) -> Result<ElasticConstants, ElasticityError> {
        match *self {
            Self::Cubic { c11, c12, c44 } => ElasticConstants::cubic(c11, c12, c44),
            Self::Isotropic {
                shear_modulus,
                poisson_ratio,
            } => ElasticConstants::isotropic(shear_modulus, poisson_ratio),
            Self::Voigt { voigt } => {
                ElasticConstants::from_voigt(Matrix6::from_fn(|i, j| voigt[i][j]))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct MaterialFile {
    structure: CrystalStructure,
    lattice_constant: f64,
    species: String,
    elastic: ElasticParams,
}

/// Everything the constructor needs to know about the host crystal.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub crystal: Crystal,
    pub species: String,
    pub elastic_constants: ElasticConstants,
}

impl Material {
    pub fn new(crystal: Crystal, species: &str, elastic_constants: ElasticConstants) -> Self {
        Self {
            crystal,
            species: species.to_string(),
            elastic_constants,
        }
    }

    /// Reads a material description such as
    ///
    /// ```toml
    /// structure = "bcc"
    /// lattice_constant = 2.8665
    /// species = "Fe"
    ///
    /// [elastic]
    /// c11 = 243.0
    /// c12 = 145.0
    /// c44 = 116.0
    /// ```
    ///
    /// The `[elastic]` table may instead hold `shear_modulus` and
    /// `poisson_ratio`, or a full 6×6 `voigt` matrix.
    pub fn load(path: &Path) -> Result<Self, MaterialLoadError> {
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| MaterialLoadError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let file: MaterialFile = toml::from_str(&content).map_err(|e| MaterialLoadError::Toml {
            path: path_str.clone(),
            source: e,
        })?;

        let crystal = Crystal::new(file.structure, file.lattice_constant).map_err(|e| {
            MaterialLoadError::Crystal {
                path: path_str.clone(),
                source: e,
            }
        })?;
        let elastic_constants =
            file.elastic
                .to_constants()
                .map_err(|e| MaterialLoadError::Elasticity {
                    path: path_str,
                    source: e,
                })?;

        Ok(Self {
            crystal,
            species: file.species,
            elastic_constants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("material.toml");
        let mut file = File::create(&path).unwrap();
        write!(file, "{content}").unwrap();
        (dir, path)
    }

    #[test]
    fn load_succeeds_with_cubic_constants() {
        let (_dir, path) = write_file(
            r#"
structure = "bcc"
lattice_constant = 2.8665
species = "Fe"

[elastic]
c11 = 243.0
c12 = 145.0
c44 = 116.0
"#,
        );
        let material = Material::load(&path).unwrap();
        assert_eq!(material.crystal.structure(), CrystalStructure::Bcc);
        assert_eq!(material.species, "Fe");
        assert_eq!(material.elastic_constants.voigt()[(3, 3)], 116.0);
    }

    #[test]
    fn load_succeeds_with_isotropic_constants() {
        let (_dir, path) = write_file(
            r#"
structure = "sc"
lattice_constant = 3.0
species = "X"

[elastic]
shear_modulus = 50.0
poisson_ratio = 0.3
"#,
        );
        let material = Material::load(&path).unwrap();
        assert!(material.elastic_constants.is_isotropic(1e-10));
    }

    #[test]
    fn load_succeeds_with_voigt_matrix() {
        let (_dir, path) = write_file(
            r#"
structure = "fcc"
lattice_constant = 3.615
species = "Cu"

[elastic]
voigt = [
  [168.4, 121.4, 121.4, 0.0, 0.0, 0.0],
  [121.4, 168.4, 121.4, 0.0, 0.0, 0.0],
  [121.4, 121.4, 168.4, 0.0, 0.0, 0.0],
  [0.0, 0.0, 0.0, 75.4, 0.0, 0.0],
  [0.0, 0.0, 0.0, 0.0, 75.4, 0.0],
  [0.0, 0.0, 0.0, 0.0, 0.0, 75.4],
]
"#,
        );
        let material = Material::load(&path).unwrap();
        assert_eq!(
            material.elastic_constants,
            ElasticConstants::cubic(168.4, 121.4, 75.4).unwrap()
        );
    }

    #[test]
    fn load_fails_for_nonexistent_file() {
        let result = Material::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(MaterialLoadError::Io { .. })));
    }

    #[test]
    fn load_fails_for_malformed_toml() {
        let (_dir, path) = write_file("structure = \"bcc\"\nlattice_constant = ");
        assert!(matches!(
            Material::load(&path),
            Err(MaterialLoadError::Toml { .. })
        ));
    }

    #[test]
    fn load_fails_for_unstable_constants() {
        let (_dir, path) = write_file(
            r#"
structure = "fcc"
lattice_constant = 3.6
species = "Cu"

[elastic]
c11 = 100.0
c12 = 150.0
c44 = 50.0
"#,
        );
        assert!(matches!(
            Material::load(&path),
            Err(MaterialLoadError::Elasticity {
                source: ElasticityError::NotPositiveDefinite,
                ..
            })
        ));
    }

    #[test]
    fn load_fails_for_negative_lattice_constant() {
        let (_dir, path) = write_file(
            r#"
structure = "fcc"
lattice_constant = -3.6
species = "Cu"

[elastic]
c11 = 168.4
c12 = 121.4
c44 = 75.4
"#,
        );
        assert!(matches!(
            Material::load(&path),
            Err(MaterialLoadError::Crystal { .. })
        ));
    }
}
