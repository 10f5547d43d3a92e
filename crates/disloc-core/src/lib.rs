//! # Disloc Core Library
//!
//! Construction and analysis of atomistic dislocation models, with displacement
//! fields taken from anisotropic (Stroh) or isotropic linear elasticity.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless models and mathematics: elastic
//!   tensors and the sextic solution, crystal structures and orientations,
//!   atomic configurations, Burgers content and kink specifications.
//!
//! - **[`engine`]: The Logic Core.** Lattice generation, dislocation
//!   construction, core analysis and kink geometry, together with tolerances,
//!   errors, the field cache and progress reporting.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that tie `core`
//!   and `engine` together: construct a dislocation from a configuration,
//!   measure one after relaxation, build kinked lines, and batch-construct many
//!   independent configurations.

pub mod core;
pub mod engine;
pub mod workflows;
