//! # Core Module
//!
//! Stateless building blocks of the library: the continuum elastic solution,
//! crystal lattices and orientations, and the data models that the engine
//! produces and consumes.
//!
//! - **Elastic Field Solver** ([`elasticity`]) - Stroh sextic and isotropic displacement fields
//! - **Crystallography** ([`crystal`]) - Cubic structures, lattice translations, material files
//! - **Models** ([`models`]) - Atoms, configurations, Burgers content, kink specifications
//! - **Utilities** ([`utils`]) - Small geometric helpers shared by the engine

pub mod crystal;
pub mod elasticity;
pub mod models;
pub mod utils;
