//! # Length Estimation
//!
//! Estimates the expected distances between consecutive body parts from the frames of a trial.
//! Starting from all-zero lengths, each iteration picks the minimum cost foot path of every
//! frame under the current estimate, measures its consecutive segments, and updates each
//! length to the median of the measurements. The process ends when no length moves by more
//! than epsilon.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use nalgebra::Point3;
use ndarray::{Array2, Axis};
use ndarray_stats::errors::QuantileError;
use ndarray_stats::interpolate::Lower;
use ndarray_stats::QuantileExt;
use noisy_float::types::{n64, N64};
use std::cmp::Ordering;

use trial_if::frame::Frame;
use trial_if::parts::{LabelAdjacency, PartError};

use crate::graph::{pop_shortest_paths, trace_path};
use crate::linalg::consecutive_dist;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised during length estimation.
#[derive(Debug, thiserror::Error)]
pub enum LengthError {
    #[error("No frames produced a usable foot path for length estimation")]
    NoFrames,

    #[error("Length estimation did not converge after {iterations} iterations")]
    NotConverged {
        iterations: usize,
        /// The last estimate, so the caller may accept it anyway.
        lengths: Vec<f64>,
    },

    #[error("Couldn't build the length adjacency table: {0}")]
    Adjacency(#[from] PartError),

    #[error("Couldn't take the segment median: {0}")]
    Median(#[from] QuantileError),

    #[error("Segment matrix has an inconsistent shape: {0}")]
    SegmentShape(#[from] ndarray::ShapeError),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Estimate the consecutive inter-part lengths from the first `n_frames` frames.
///
/// The number of lengths is taken from the highest label of the first frame. Frames without a
/// usable foot path under the current estimate are skipped with a warning. The median is the
/// statistical one, taking the lower of the two middle values on even counts, so results are
/// reproducible across implementations.
///
/// Returns [`LengthError::NotConverged`] with the last estimate when `max_iters` passes did
/// not reach convergence.
pub fn estimate_lengths<'a, I, C>(
    frames: I,
    n_frames: usize,
    eps: f64,
    max_iters: usize,
    cost: C,
) -> Result<Vec<f64>, LengthError>
where
    I: IntoIterator<Item = &'a Frame>,
    C: Fn(f64, f64) -> f64,
{
    let frames: Vec<&Frame> = frames.into_iter().take(n_frames).collect();

    let n_lengths = frames
        .first()
        .and_then(|f| f.max_label())
        .ok_or(LengthError::NoFrames)?;

    if n_lengths == 0 {
        return Err(LengthError::NoFrames);
    }

    let connections: Vec<(usize, usize)> = (0..n_lengths).map(|i| (i, i + 1)).collect();

    let mut lengths = vec![0.0; n_lengths];

    for iteration in 0..max_iters {
        let prev_lengths = lengths.clone();

        let adjacency = LabelAdjacency::from_lengths(&connections, &lengths)?;

        // One row of segment distances per frame with a usable foot path
        let mut segments: Vec<N64> = Vec::new();
        let mut n_rows = 0;

        for frame in &frames {
            match min_foot_segments(frame, &adjacency, &cost, n_lengths) {
                Some(dists) => {
                    segments.extend(dists.into_iter().map(n64));
                    n_rows += 1;
                }
                None => {
                    warn!("Frame without a usable foot path skipped in length estimation");
                }
            }
        }

        if n_rows == 0 {
            return Err(LengthError::NoFrames);
        }

        let mut segment_matrix = Array2::from_shape_vec((n_rows, n_lengths), segments)?;
        let medians = segment_matrix.quantile_axis_mut(Axis(0), n64(0.5), &Lower)?;

        lengths = medians.iter().map(|m| m.raw()).collect();

        let max_delta = lengths
            .iter()
            .zip(prev_lengths.iter())
            .map(|(l, p)| (l - p).abs())
            .fold(0.0, f64::max);

        debug!(
            "Length estimation iteration {}: lengths {:?}, max delta {}",
            iteration, lengths, max_delta
        );

        if max_delta < eps {
            return Ok(lengths);
        }
    }

    Err(LengthError::NotConverged {
        iterations: max_iters,
        lengths,
    })
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The consecutive segment distances along the minimum cost foot path of one frame, or `None`
/// when the frame has no reachable foot candidate.
fn min_foot_segments<C>(
    frame: &Frame,
    adjacency: &LabelAdjacency,
    cost: C,
    foot_label: usize,
) -> Option<Vec<f64>>
where
    C: Fn(f64, f64) -> f64,
{
    let (prev, dist) = pop_shortest_paths(frame, adjacency, cost);

    // Minimum distance foot; on ties the first candidate wins
    let best_foot = frame
        .nodes_with_label(foot_label)
        .min_by(|&a, &b| dist[a].partial_cmp(&dist[b]).unwrap_or(Ordering::Equal))?;

    let path = trace_path(&prev, frame.labels(), best_foot).ok()?;

    let points: Vec<Point3<f64>> = path.iter().map(|&i| frame.point(i)).collect();

    Some(consecutive_dist(&points))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::sq_diff_cost;

    /// A perfect six part skeleton with the given segment lengths, stacked along z.
    fn perfect_frame(segments: &[f64]) -> Frame {
        let total: f64 = segments.iter().sum();

        let mut z = total;
        let mut points = vec![Point3::new(0.0, 0.0, z)];
        for &s in segments {
            z -= s;
            points.push(Point3::new(0.0, 0.0, z));
        }

        let labels = (0..points.len()).collect();

        Frame::new(points, labels).unwrap()
    }

    #[test]
    fn test_convergence_on_perfect_frames() -> Result<(), LengthError> {
        let true_segments = [60.0, 20.0, 15.0, 20.0, 20.0];
        let frames: Vec<Frame> = (0..5).map(|_| perfect_frame(&true_segments)).collect();

        let lengths = estimate_lengths(frames.iter(), 5, 0.01, 10, sq_diff_cost)?;

        // The first iteration already lands on the true segments, the second confirms it
        assert_eq!(lengths, true_segments.to_vec());

        Ok(())
    }

    #[test]
    fn test_median_is_lower_of_two_middles() -> Result<(), LengthError> {
        // Four frames with two distinct segment profiles: medians must take the lower middle
        let mut frames = Vec::new();
        frames.push(perfect_frame(&[60.0, 20.0]));
        frames.push(perfect_frame(&[60.0, 20.0]));
        frames.push(perfect_frame(&[64.0, 24.0]));
        frames.push(perfect_frame(&[64.0, 24.0]));

        let lengths = estimate_lengths(frames.iter(), 4, 0.01, 20, sq_diff_cost)?;

        assert_eq!(lengths, vec![60.0, 20.0]);

        Ok(())
    }

    #[test]
    fn test_no_frames() {
        let frames: Vec<Frame> = Vec::new();

        assert!(matches!(
            estimate_lengths(frames.iter(), 5, 0.01, 10, sq_diff_cost),
            Err(LengthError::NoFrames)
        ));
    }

    #[test]
    fn test_non_convergence_surfaces_last_estimate() {
        let frames = vec![perfect_frame(&[60.0, 20.0, 15.0, 20.0, 20.0])];

        // A single iteration cannot converge from the zero initialisation
        let result = estimate_lengths(frames.iter(), 1, 0.01, 1, sq_diff_cost);

        match result {
            Err(LengthError::NotConverged { iterations, lengths }) => {
                assert_eq!(iterations, 1);
                assert_eq!(lengths, vec![60.0, 20.0, 15.0, 20.0, 20.0]);
            }
            other => panic!("Expected NotConverged, got {:?}", other),
        }
    }
}
