//! # Workflows Module
//!
//! High-level entry points that tie the [`crate::core`] and [`crate::engine`]
//! layers together.
//!
//! ## Overview
//!
//! A typical run constructs a dislocation, hands the configuration to an
//! external engine for relaxation, then measures the relaxed result against
//! the construction's reference. Each workflow accepts an optional
//! [`crate::engine::progress::ProgressReporter`] and emits `tracing` events.
//!
//! - **Construction** ([`construct`]) - Lattice, elastic fields and displaced configuration
//! - **Measurement** ([`measure`]) - Strict core and Burgers vector analysis after relaxation
//! - **Kinks** ([`kink`]) - Double- and single-kink cells built on a straight construction
//! - **Batch** ([`batch`]) - Many independent constructions, in parallel with the `parallel` feature

pub mod batch;
pub mod construct;
pub mod kink;
pub mod measure;
