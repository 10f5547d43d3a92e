//! # Elasticity Module
//!
//! Continuum solution for an infinite straight dislocation in an anisotropic
//! linear-elastic crystal.
//!
//! ## Overview
//!
//! The stiffness tensor is rotated into the dislocation frame (`x` glide
//! direction, `y` glide-plane normal, `z` line direction) and the Stroh sextic
//! eigenvalue problem is solved for the three characteristic roots in the upper
//! half plane. Tensors that are isotropic within tolerance bypass the sextic
//! (whose roots collapse onto `p = i`) and use the Volterra closed form.
//!
//! ## Key Components
//!
//! - [`tensor`] - Voigt stiffness matrix, validation and rotation
//! - [`stroh`] - Sextic roots and eigenvectors
//! - [`isotropic`] - Closed-form isotropic branch
//! - [`field`] - The [`field::DisplacementField`] evaluated by the constructor and analyzer
//!
//! The displacement is multivalued: it jumps by exactly the Burgers vector across
//! the [`field::BranchCut`] ray. That jump is what inserts the dislocation when the
//! field is applied to a perfect lattice.

pub mod error;
pub mod field;
pub mod isotropic;
pub mod stroh;
pub mod tensor;
