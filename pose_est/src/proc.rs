//! # Trial Processing
//!
//! Drives the full pipeline over a trial: the expected inter-part lengths are estimated once,
//! every frame runs through graph construction, shortest paths and skeleton selection, and the
//! resulting walking pass has its left/right foot assignment corrected. Per-frame failures
//! never abort a batch; they are recorded against their frame ids.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use trial_if::frame::{Frame, FrameId, HypothesisSource, TrialId};
use trial_if::parts::{LabelAdjacency, PartError, DEFAULT_PART_CONNECTIONS};
use trial_if::pass::{PassFrame, WalkingPass};

use crate::graph::{sq_diff_cost, GraphError};
use crate::lengths::{estimate_lengths, LengthError};
use crate::params::PoseEstParams;
use crate::select::{norm_ratio_score, process_frame, SelectError};
use crate::side::{assign_sides, PassError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Runs the pose estimation pipeline over trials.
#[derive(Debug, Clone)]
pub struct PoseEstimator {
    params: PoseEstParams,
    connections: Vec<(usize, usize)>,
}

/// One frame that failed processing, recorded against its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameFailure {
    pub frame_id: FrameId,
    pub kind: String,
    pub message: String,
}

/// The outcome of processing one trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialReport {
    pub trial: TrialId,

    /// The expected lengths the frames were processed with.
    pub lengths: Vec<f64>,

    /// Successfully processed frames, in frame id order.
    pub frames: Vec<PassFrame>,

    /// Frames that were skipped, and why.
    pub failures: Vec<FrameFailure>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Any error of the pose estimation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Length(#[from] LengthError),

    #[error(transparent)]
    Pass(#[from] PassError),

    #[error("Invalid part connection table: {0}")]
    Connections(#[from] PartError),

    #[error("No frames of trial {0} processed successfully")]
    NoProcessedFrames(TrialId),
}

/// Errors raised when persisting a trial report.
#[derive(Debug, thiserror::Error)]
pub enum ReportIoError {
    #[error("An IO operation failed: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Couldn't serialize the trial report: {0}")]
    SerializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PoseError {
    /// A stable string identifying the kind of failure, for reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PoseError::Select(_) => "FRAME_INCOMPLETE",
            PoseError::Graph(GraphError::PathBroken(_)) => "PATH_BROKEN",
            PoseError::Length(LengthError::NotConverged { .. }) => "LENGTH_NOT_CONVERGED",
            PoseError::Length(_) => "LENGTH_ESTIMATION_FAILED",
            PoseError::Pass(PassError::PassTooShort(_)) => "PASS_TOO_SHORT",
            PoseError::Pass(PassError::LineFit(_)) => "PASS_DEGENERATE",
            PoseError::Connections(_) => "INVALID_CONNECTIONS",
            PoseError::NoProcessedFrames(_) => "TRIAL_EMPTY",
        }
    }
}

impl TrialReport {
    /// Write the report to a JSON file for downstream consumers.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReportIoError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(ReportIoError::SerializeError)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl PoseEstimator {
    /// An estimator over the default part connection table.
    pub fn new(params: PoseEstParams) -> Self {
        Self::with_connections(params, DEFAULT_PART_CONNECTIONS.to_vec())
    }

    /// An estimator with a caller-supplied part connection table.
    pub fn with_connections(
        params: PoseEstParams,
        connections: Vec<(usize, usize)>,
    ) -> Self {
        Self {
            params,
            connections,
        }
    }

    pub fn params(&self) -> &PoseEstParams {
        &self.params
    }

    /// Estimate the expected inter-part lengths of a trial from its first frames.
    pub fn estimate_trial_lengths<S>(
        &self,
        source: &S,
        trial: &TrialId,
    ) -> Result<Vec<f64>, PoseError>
    where
        S: HypothesisSource,
    {
        self.estimate_trial_lengths_with(source, trial, sq_diff_cost)
    }

    /// Length estimation with a caller-supplied cost function.
    pub fn estimate_trial_lengths_with<S, C>(
        &self,
        source: &S,
        trial: &TrialId,
        cost: C,
    ) -> Result<Vec<f64>, PoseError>
    where
        S: HypothesisSource,
        C: Fn(f64, f64) -> f64,
    {
        let frames: Vec<&Frame> = source
            .frame_ids(trial)
            .into_iter()
            .filter_map(|id| source.frame(trial, id))
            .collect();

        let lengths = estimate_lengths(
            frames,
            self.params.length_est_n_frames,
            self.params.length_conv_eps,
            self.params.length_est_max_iters,
            cost,
        )?;

        info!("Estimated lengths for trial {}: {:?}", trial, lengths);

        Ok(lengths)
    }

    /// Run per-frame skeleton selection over every frame of a trial.
    ///
    /// Frames that fail are skipped and recorded in the report. The whole trial fails only
    /// when no frame at all processes successfully.
    pub fn process_trial<S>(
        &self,
        source: &S,
        trial: &TrialId,
        lengths: &[f64],
    ) -> Result<TrialReport, PoseError>
    where
        S: HypothesisSource,
    {
        self.process_trial_with(source, trial, lengths, sq_diff_cost, norm_ratio_score)
    }

    /// Trial processing with caller-supplied cost and score functions.
    pub fn process_trial_with<S, C, F>(
        &self,
        source: &S,
        trial: &TrialId,
        lengths: &[f64],
        cost: C,
        score: F,
    ) -> Result<TrialReport, PoseError>
    where
        S: HypothesisSource,
        C: Fn(f64, f64) -> f64,
        F: Fn(f64, f64) -> f64,
    {
        let adjacency = LabelAdjacency::from_lengths(&self.connections, lengths)?;

        let mut frames = Vec::new();
        let mut failures = Vec::new();

        for frame_id in source.frame_ids(trial) {
            let frame = match source.frame(trial, frame_id) {
                Some(f) => f,
                None => continue,
            };

            match process_frame(frame, &adjacency, &self.params.radii, &cost, &score) {
                Ok((pop_1, pop_2)) => {
                    // Both skeletons carry the unified head; the left/right claim is fixed at
                    // pass level
                    frames.push(PassFrame {
                        frame_id,
                        head: pop_1.head(),
                        foot_l: pop_1.foot(),
                        foot_r: pop_2.foot(),
                    });
                }
                Err(e) => {
                    let e = PoseError::from(e);
                    warn!(
                        "Frame {} of trial {} skipped ({}): {}",
                        frame_id,
                        trial,
                        e.kind(),
                        e
                    );
                    failures.push(FrameFailure {
                        frame_id,
                        kind: e.kind().to_owned(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if frames.is_empty() {
            return Err(PoseError::NoProcessedFrames(trial.clone()));
        }

        info!(
            "Trial {}: {} frames processed, {} skipped",
            trial,
            frames.len(),
            failures.len()
        );

        Ok(TrialReport {
            trial: trial.clone(),
            lengths: lengths.to_vec(),
            frames,
            failures,
        })
    }

    /// Correct the left/right foot assignment over one walking pass.
    pub fn assign_sides(&self, pass: &WalkingPass) -> Result<WalkingPass, PoseError> {
        Ok(assign_sides(pass, self.params.straight_tolerance_rad)?)
    }

    /// Run the full pipeline on a trial whose frames form a single walking pass.
    ///
    /// Estimates the lengths, processes every frame and corrects the foot sides of the
    /// resulting pass.
    pub fn run_pass<S>(&self, source: &S, trial: &TrialId) -> Result<TrialReport, PoseError>
    where
        S: HypothesisSource,
    {
        let lengths = self.estimate_trial_lengths(source, trial)?;

        let mut report = self.process_trial(source, trial, &lengths)?;

        let pass = WalkingPass::new(report.frames);
        report.frames = self.assign_sides(&pass)?.frames;

        Ok(report)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Point3;
    use trial_if::frame::HypothesisIndex;
    use trial_if::parts::PartType;

    /// A trial with one valid two-foot frame and one frame missing its feet.
    fn test_source() -> (HypothesisIndex, TrialId) {
        let trial = TrialId::from("unit_trial");
        let mut index = HypothesisIndex::new();

        index.insert(
            trial.clone(),
            FrameId(0),
            Frame::from_hypotheses(&[
                (PartType::Head, vec![Point3::new(0.0, 0.0, 0.0)]),
                (
                    PartType::Hip,
                    vec![Point3::new(0.0, 0.0, 10.0), Point3::new(0.0, 0.0, 12.0)],
                ),
            ]),
        );

        index.insert(
            trial.clone(),
            FrameId(1),
            Frame::from_hypotheses(&[(PartType::Head, vec![Point3::new(0.0, 0.0, 0.0)])]),
        );

        (index, trial)
    }

    fn two_label_estimator() -> PoseEstimator {
        PoseEstimator::with_connections(PoseEstParams::default(), vec![(0, 1)])
    }

    #[test]
    fn test_process_trial_records_failures() -> Result<(), PoseError> {
        let (source, trial) = test_source();
        let estimator = two_label_estimator();

        let report = estimator.process_trial(&source, &trial, &[10.0])?;

        assert_eq!(report.frames.len(), 1);
        assert_eq!(report.frames[0].frame_id, FrameId(0));
        assert_eq!(report.frames[0].foot_l, Point3::new(0.0, 0.0, 10.0));
        assert_eq!(report.frames[0].foot_r, Point3::new(0.0, 0.0, 12.0));

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].frame_id, FrameId(1));
        assert_eq!(report.failures[0].kind, "FRAME_INCOMPLETE");

        Ok(())
    }

    #[test]
    fn test_empty_trial_fails() {
        let (source, _) = test_source();
        let estimator = two_label_estimator();

        let missing = TrialId::from("missing_trial");
        let result = estimator.process_trial(&source, &missing, &[10.0]);

        match result {
            Err(e) => assert_eq!(e.kind(), "TRIAL_EMPTY"),
            Ok(_) => panic!("Expected a trial level failure"),
        }
    }

    #[test]
    fn test_error_kinds_are_stable() {
        let incomplete = PoseError::from(SelectError::FrameIncomplete("x".into()));
        assert_eq!(incomplete.kind(), "FRAME_INCOMPLETE");

        let broken = PoseError::from(GraphError::PathBroken(3));
        assert_eq!(broken.kind(), "PATH_BROKEN");

        let unconverged = PoseError::from(LengthError::NotConverged {
            iterations: 10,
            lengths: vec![1.0],
        });
        assert_eq!(unconverged.kind(), "LENGTH_NOT_CONVERGED");

        let short = PoseError::from(PassError::PassTooShort(1));
        assert_eq!(short.kind(), "PASS_TOO_SHORT");
    }
}
