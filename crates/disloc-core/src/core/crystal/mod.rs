//! # Crystal Module
//!
//! Cubic crystal structures, their lattice translations and the oriented frames
//! in which dislocations are built.
//!
//! - [`structure`] - Bravais lattices with basis, translation membership and repeat lengths
//! - [`orientation`] - Right-handed integer frames (`x` glide direction, `y` glide normal, `z` line)
//! - [`material`] - Material description files (structure, lattice constant, species, elastic constants)

pub mod material;
pub mod orientation;
pub mod structure;
