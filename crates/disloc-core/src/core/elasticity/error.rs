use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ElasticityError {
    #[error("Stiffness matrix is not symmetric at Voigt entry ({row}, {col})")]
    NotSymmetric { row: usize, col: usize },

    #[error("Stiffness matrix is not positive-definite")]
    NotPositiveDefinite,

    #[error("Invalid elastic moduli: {0}")]
    InvalidModuli(String),

    #[error("Sextic eigenvalue problem did not converge within {iterations} iterations")]
    SexticNotConverged { iterations: usize },

    #[error("Expected 3 roots with positive imaginary part, found {found}")]
    RootCount { found: usize },

    #[error(
        "Stroh roots are not separated (min separation {separation:e} below tolerance {tolerance:e})"
    )]
    DegenerateRoots { separation: f64, tolerance: f64 },

    #[error("Could not determine the eigenvector for Stroh root {root}")]
    SingularEigenvector { root: usize },

    #[error("The (2,2) block of the rotated stiffness tensor is singular")]
    SingularTensor,
}
