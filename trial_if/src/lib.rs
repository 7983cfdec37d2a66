//! # Trial interface crate.
//!
//! Provides the data model shared between the pose estimation core and its
//! collaborators: body part types, per-frame hypothesis populations, expected
//! length tables and walking pass tables.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Body part types, labels and the label adjacency tables
pub mod parts;

/// Per-frame hypothesis populations and the hypothesis source
pub mod frame;

/// Walking pass tables
pub mod pass;

/// Per-trial length table persistence
pub mod lengths;
