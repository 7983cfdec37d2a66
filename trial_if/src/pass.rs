//! # Walking Pass Tables
//!
//! A walking pass is a maximal contiguous run of frames in which the subject walks in one
//! direction across the sensor's field of view. Each row holds the chosen head position and the
//! two chosen foot positions for one frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::frame::FrameId;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One row of a walking pass table.
///
/// The left/right assignment of the feet is a claim, not a guarantee; rows coming straight out
/// of per-frame selection carry the feet in selection order and are corrected at pass level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassFrame {
    pub frame_id: FrameId,
    pub head: Point3<f64>,
    pub foot_l: Point3<f64>,
    pub foot_r: Point3<f64>,
}

/// An ordered sequence of pass frames, in the caller's insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WalkingPass {
    pub frames: Vec<PassFrame>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised when persisting a walking pass.
#[derive(Debug, thiserror::Error)]
pub enum PassIoError {
    #[error("An IO operation failed: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Couldn't serialize the walking pass: {0}")]
    SerializeError(serde_json::Error),

    #[error("Couldn't deserialize the walking pass: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WalkingPass {
    pub fn new(frames: Vec<PassFrame>) -> Self {
        Self { frames }
    }

    /// Number of frames in the pass.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True if the pass holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The head position of every frame, in pass order.
    pub fn head_points(&self) -> Vec<Point3<f64>> {
        self.frames.iter().map(|f| f.head).collect()
    }

    /// Write the pass to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PassIoError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(PassIoError::SerializeError)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a pass back from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PassIoError> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(PassIoError::DeserializeError)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
