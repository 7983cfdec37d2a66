//! # Pose estimation core library.
//!
//! Reconstructs a walking person's skeletal pose from per-frame sets of 3D body part hypotheses
//! produced by an upstream depth sensor processor.
//!
//! Each frame yields several candidate points per body part type. The core selects a single
//! coherent set of parts per frame by running a shortest path algorithm over a label-layered
//! graph of the candidates, choosing the best pair of feet with a sphere-based consensus vote,
//! and finally resolving which foot is left and which is right consistently across a walking
//! pass.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Geometry primitives: distances, line fitting, side-of-forward tests
pub mod linalg;

/// Per-frame weighted DAG over part candidates and its shortest path engine
pub mod graph;

/// Per-frame skeleton selection
pub mod select;

/// Iterative estimation of expected inter-part lengths
pub mod lengths;

/// Left/right foot assignment over a walking pass
pub mod side;

/// Trial-level orchestration
pub mod proc;

/// Processing parameters
pub mod params;

// ------------------------------------------------------------------------------------------------
// REEXPORTS
// ------------------------------------------------------------------------------------------------

pub use params::PoseEstParams;
pub use proc::{PoseEstimator, PoseError, TrialReport};

pub use trial_if;
