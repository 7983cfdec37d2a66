//! # Side Assignment
//!
//! Resolves which chosen foot is left and which is right, consistently across a walking pass.
//! The direction of motion is the best-fit line through the head positions; a frame's labels
//! are verified with a cross-product side test against that direction, and the sign ambiguity
//! of the fitted line is removed by majority vote before unverified frames have their feet
//! swapped.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};
use nalgebra::{Point3, Vector3};

use trial_if::pass::WalkingPass;

use crate::linalg::{best_fit_line, target_side, target_side_value, LinAlgError, Side};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised during side assignment.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("Walking pass has {0} frame(s), need at least two to fit a line of motion")]
    PassTooShort(usize),

    #[error("Couldn't fit the line of motion: {0}")]
    LineFit(#[from] LinAlgError),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The overall direction of motion of a walking pass.
///
/// Fits a line through all head positions and returns a point on the line together with its
/// unit direction. The sign of the direction is arbitrary at this stage; it is fixed against
/// the foot labels by [`assign_sides`].
pub fn direction_of_pass(
    pass: &WalkingPass,
) -> Result<(Point3<f64>, Vector3<f64>), PassError> {
    if pass.len() < 2 {
        return Err(PassError::PassTooShort(pass.len()));
    }

    let (line_point, direction) = best_fit_line(&pass.head_points())?;

    Ok((line_point, direction.into_inner()))
}

/// Whether the left/right labels of one frame agree with the direction of motion.
///
/// A frame is verified when the vector towards its left foot lies to the left of (or straight
/// along) the direction of motion, as seen against the frame's up vector from the mid-foot to
/// the head.
pub fn verify_sides(
    foot_l: &Point3<f64>,
    foot_r: &Point3<f64>,
    head: &Point3<f64>,
    direction: &Vector3<f64>,
    tolerance_rad: f64,
) -> bool {
    let mean_foot = Point3::from((foot_l.coords + foot_r.coords) / 2.0);

    let up = head - mean_foot;
    let to_left = foot_l - mean_foot;

    matches!(
        target_side(direction, &up, &to_left, tolerance_rad),
        Side::Left | Side::Straight
    )
}

/// Verify every frame of a pass against the given direction of motion.
pub fn verify_sides_pass(
    pass: &WalkingPass,
    direction: &Vector3<f64>,
    tolerance_rad: f64,
) -> Vec<bool> {
    pass.frames
        .iter()
        .map(|f| verify_sides(&f.foot_l, &f.foot_r, &f.head, direction, tolerance_rad))
        .collect()
}

/// The signed side value of the labelled left foot on every frame of a pass.
///
/// Positive values mean the foot lies to the left of the fitted motion direction. Useful for
/// inspecting how confident the assignment is across a pass.
pub fn evaluate_foot_side(pass: &WalkingPass) -> Result<Vec<f64>, PassError> {
    let (_, direction) = direction_of_pass(pass)?;

    let values = pass
        .frames
        .iter()
        .map(|f| {
            let mean_foot = Point3::from((f.foot_l.coords + f.foot_r.coords) / 2.0);
            let up = f.head - mean_foot;
            let target = f.foot_l - mean_foot;

            target_side_value(&direction, &up, &target)
        })
        .collect();

    Ok(values)
}

/// Produce a new pass with the feet of every unverified frame swapped.
pub fn enforce_consistency(pass: &WalkingPass, verified: &[bool]) -> WalkingPass {
    let mut consistent = pass.clone();

    for (frame, &ok) in consistent.frames.iter_mut().zip(verified.iter()) {
        if !ok {
            std::mem::swap(&mut frame.foot_l, &mut frame.foot_r);
        }
    }

    consistent
}

/// Assign the feet of a walking pass to consistent left/right sides.
///
/// The fitted direction of motion carries an arbitrary sign; when the majority of frames fail
/// verification the direction is negated and verification repeated. The corrected pass swaps
/// the feet of every frame that still fails.
pub fn assign_sides(
    pass: &WalkingPass,
    tolerance_rad: f64,
) -> Result<WalkingPass, PassError> {
    let (_, mut direction) = direction_of_pass(pass)?;

    let mut verified = verify_sides_pass(pass, &direction, tolerance_rad);
    let n_verified = verified.iter().filter(|&&v| v).count();

    // The PCA direction may point against the motion, in which case most frames look wrong
    if 2 * n_verified < pass.len() {
        debug!(
            "Only {} of {} frames verified, negating the direction of motion",
            n_verified,
            pass.len()
        );

        direction = -direction;
        verified = verify_sides_pass(pass, &direction, tolerance_rad);
    }

    let n_swapped = verified.iter().filter(|&&v| !v).count();
    if n_swapped > 0 {
        info!("Swapping feet on {} of {} frames", n_swapped, pass.len());
    }

    Ok(enforce_consistency(pass, &verified))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
