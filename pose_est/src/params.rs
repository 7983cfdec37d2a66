//! # Pose Estimation Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the pose estimation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseEstParams {
    /// Sphere radii assessed by the foot pair vote, in the order they are voted on.
    pub radii: Vec<f64>,

    /// Convergence threshold for the iterative length estimation.
    pub length_conv_eps: f64,

    /// Number of frames used to estimate the expected lengths.
    pub length_est_n_frames: usize,

    /// Maximum number of length estimation iterations before giving up.
    pub length_est_max_iters: usize,

    /// Angular tolerance in radians within which a target counts as straight ahead.
    pub straight_tolerance_rad: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised when loading a parameter file.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("Cannot read the parameter file {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parameter file {path:?} is not valid TOML: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PoseEstParams {
    fn default() -> Self {
        Self {
            radii: (0..30).map(|r| r as f64).collect(),
            length_conv_eps: 0.01,
            length_est_n_frames: 10,
            length_est_max_iters: 10,
            straight_tolerance_rad: 1e-9,
        }
    }
}

impl PoseEstParams {
    /// Load parameters from a TOML file.
    ///
    /// Errors carry the offending path, since batch runs often load one parameter file per
    /// trial set.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParamsError> {
        let path = path.as_ref();

        let text = read_to_string(path).map_err(|source| ParamsError::ReadFailed {
            path: path.to_owned(),
            source,
        })?;

        toml::from_str(&text).map_err(|source| ParamsError::ParseFailed {
            path: path.to_owned(),
            source,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = PoseEstParams::default();

        assert_eq!(params.radii.len(), 30);
        assert_eq!(params.radii[0], 0.0);
        assert_eq!(params.length_conv_eps, 0.01);
    }

    #[test]
    fn test_load_default_file() {
        let params = PoseEstParams::load("../params/pose_est.toml").unwrap();

        assert_eq!(params.radii.len(), 30);
        assert_eq!(params.length_est_n_frames, 10);
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let missing = PoseEstParams::load("../params/no_such_params.toml");

        match missing {
            Err(ParamsError::ReadFailed { path, .. }) => {
                assert!(path.ends_with("no_such_params.toml"));
            }
            other => panic!("Expected ReadFailed, got {:?}", other),
        }
    }
}
