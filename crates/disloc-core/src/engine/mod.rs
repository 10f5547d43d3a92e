//! # Engine Module
//!
//! Construction and analysis logic built on the stateless [`crate::core`] layer.
//!
//! ## Overview
//!
//! The engine turns a crystal, an orientation and a Burgers content into atomic
//! configurations containing dislocations, and measures dislocations in
//! configurations that an external engine has relaxed. Every operation is a
//! pure function of its inputs; the only memoization is the explicit
//! [`cache::FieldCache`] owned by the caller.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Tolerances, cell dimensions and the construction/analysis builders
//! - **Error Handling** ([`error`]) - The [`error::DislocationError`] taxonomy
//! - **Progress Monitoring** ([`progress`]) - Optional phase and task callbacks
//! - **Lattice Builder** ([`lattice`]) - Defect-free oriented crystals in orthogonal or tilted cells
//! - **Dislocation Constructor** ([`constructor`]) - Superposition of partial fields onto a lattice
//! - **Core/Structure Analyzer** ([`analysis`]) - Differential displacements, core fit, Burgers circuit
//! - **Kink Geometry Builder** ([`kinks`]) - Double- and single-kink cells from a straight line

pub mod analysis;
pub mod cache;
pub mod config;
pub mod constructor;
pub mod error;
pub mod kinks;
pub mod lattice;
pub mod progress;
