//! # Core Models Module
//!
//! Data structures describing atomistic dislocation models.
//!
//! ## Key Components
//!
//! - [`atom`] - A single atom with its stable lattice index
//! - [`configuration`] - Atoms plus the periodic cell and per-axis boundary conditions
//! - [`burgers`] - Compact or dissociated Burgers content as (Burgers vector, core offset) pairs
//! - [`structure`] - A named placement of a dislocation in an oriented crystal
//! - [`kink`] - Kink positions, transition profile and segment count along the line
//!
//! Positions, Burgers vectors and core offsets are all expressed in the
//! dislocation frame defined by a
//! [`CrystalOrientation`](crate::core::crystal::orientation::CrystalOrientation).

pub mod atom;
pub mod burgers;
pub mod configuration;
pub mod kink;
pub mod structure;
