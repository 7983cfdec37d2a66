//! # Linear Algebra Primitives
//!
//! Small geometric building blocks used across the pipeline: Euclidean distances along a path,
//! a best-fit line through a point cloud, and a signed test for which side of a forward
//! direction a target lies on.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{distance, DMatrix, Point3, Unit, Vector3};
use std::cmp::Ordering;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Norms below this are treated as zero when testing for degenerate inputs.
const ZERO_NORM_THRESHOLD: f64 = 1e-12;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The side of a forward direction on which a target lies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    Straight,
}

/// Errors raised by the geometric primitives.
#[derive(Debug, thiserror::Error)]
pub enum LinAlgError {
    #[error("Need at least two points to fit a line, got {0}")]
    TooFewPoints(usize),

    #[error("Points are coincident, the line direction is undefined")]
    DegeneratePoints,
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Distances between consecutive points of a path.
pub fn consecutive_dist(points: &[Point3<f64>]) -> Vec<f64> {
    points.windows(2).map(|w| distance(&w[0], &w[1])).collect()
}

/// Fit a line through a set of points.
///
/// Returns the centroid and the unit direction of the dominant principal component of the
/// centred points. The sign of the direction is arbitrary but stable within a call.
pub fn best_fit_line(
    points: &[Point3<f64>],
) -> Result<(Point3<f64>, Unit<Vector3<f64>>), LinAlgError> {
    if points.len() < 2 {
        return Err(LinAlgError::TooFewPoints(points.len()));
    }

    let centroid: Vector3<f64> = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords)
        / points.len() as f64;

    let mut centred = DMatrix::zeros(points.len(), 3);
    for (i, p) in points.iter().enumerate() {
        for k in 0..3 {
            centred[(i, k)] = p.coords[k] - centroid[k];
        }
    }

    // The dominant right singular vector is the first principal component. nalgebra makes no
    // ordering guarantee on the singular values, so find the largest explicitly.
    let svd = centred.svd(false, true);
    let v_t = svd.v_t.ok_or(LinAlgError::DegeneratePoints)?;

    let (i_max, &sv_max) = svd
        .singular_values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
        .ok_or(LinAlgError::DegeneratePoints)?;

    if sv_max < ZERO_NORM_THRESHOLD {
        return Err(LinAlgError::DegeneratePoints);
    }

    let row = v_t.row(i_max);
    let direction = Unit::new_normalize(Vector3::new(row[0], row[1], row[2]));

    Ok((Point3::from(centroid), direction))
}

/// Signed angle, in radians, between `forward` and the projection of `target` onto the plane
/// perpendicular to `up`.
///
/// Positive angles lie counterclockwise about `up`, i.e. towards the left of `forward`.
/// Degenerate inputs (zero vectors, or a target colinear with `up`) give an angle of zero.
pub fn target_side_value(
    forward: &Vector3<f64>,
    up: &Vector3<f64>,
    target: &Vector3<f64>,
) -> f64 {
    let up_norm = up.norm();
    if up_norm < ZERO_NORM_THRESHOLD || forward.norm() < ZERO_NORM_THRESHOLD {
        return 0.0;
    }

    let projected = target - up * (target.dot(up) / up.norm_squared());

    // Both terms carry the same |forward| * |projected| scale, so atan2 recovers the true angle
    let signed_sin = up.dot(&forward.cross(&projected)) / up_norm;
    let aligned = forward.dot(&projected);

    signed_sin.atan2(aligned)
}

/// Which side of `forward` the target lies on, as seen against `up`.
///
/// Targets within `tolerance_rad` of straight ahead (and all degenerate inputs) report
/// [`Side::Straight`].
pub fn target_side(
    forward: &Vector3<f64>,
    up: &Vector3<f64>,
    target: &Vector3<f64>,
    tolerance_rad: f64,
) -> Side {
    let angle = target_side_value(forward, up, target);

    if angle.abs() <= tolerance_rad {
        Side::Straight
    } else if angle > 0.0 {
        Side::Left
    } else {
        Side::Right
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_consecutive_dist() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 4.0, 0.0),
            Point3::new(3.0, 4.0, 2.0),
        ];

        assert_eq!(consecutive_dist(&points), vec![5.0, 2.0]);
        assert!(consecutive_dist(&points[..1]).is_empty());
    }

    #[test]
    fn test_best_fit_line_colinear() -> Result<(), LinAlgError> {
        let points: Vec<_> = (0..5)
            .map(|i| Point3::new(i as f64, 2.0, 3.0))
            .collect();

        let (centroid, direction) = best_fit_line(&points)?;

        assert_eq!(centroid, Point3::new(2.0, 2.0, 3.0));

        // Sign of the direction is arbitrary
        assert!((direction.x.abs() - 1.0).abs() < 1e-9);
        assert!(direction.y.abs() < 1e-9);
        assert!(direction.z.abs() < 1e-9);

        Ok(())
    }

    #[test]
    fn test_best_fit_line_degenerate() {
        let single = [Point3::new(1.0, 1.0, 1.0)];
        assert!(matches!(
            best_fit_line(&single),
            Err(LinAlgError::TooFewPoints(1))
        ));

        let coincident = [Point3::new(1.0, 1.0, 1.0); 4];
        assert!(matches!(
            best_fit_line(&coincident),
            Err(LinAlgError::DegeneratePoints)
        ));
    }

    #[test]
    fn test_target_side() {
        let forward = Vector3::new(1.0, 0.0, 0.0);
        let up = Vector3::new(0.0, 0.0, 1.0);
        let tol = 1e-9;

        // Counterclockwise about up is left
        let left = Vector3::new(0.0, 1.0, 0.0);
        let right = Vector3::new(0.0, -1.0, 0.0);

        assert_eq!(target_side(&forward, &up, &left, tol), Side::Left);
        assert_eq!(target_side(&forward, &up, &right, tol), Side::Right);
        assert_eq!(target_side(&forward, &up, &forward, tol), Side::Straight);

        // A component along up doesn't change the verdict
        let left_raised = Vector3::new(5.0, 1.0, 10.0);
        assert_eq!(target_side(&forward, &up, &left_raised, tol), Side::Left);

        // Target colinear with up degenerates to straight
        assert_eq!(target_side(&forward, &up, &up, tol), Side::Straight);
    }

    #[test]
    fn test_target_side_value_angles() {
        let forward = Vector3::new(1.0, 0.0, 0.0);
        let up = Vector3::new(0.0, 0.0, 1.0);

        let left = Vector3::new(0.0, 2.0, 0.0);
        let back = Vector3::new(-1.0, 0.0, 0.0);

        assert!((target_side_value(&forward, &up, &left) - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert!((target_side_value(&forward, &up, &back).abs() - std::f64::consts::PI).abs() < 1e-9);
        assert!(target_side_value(&forward, &up, &forward).abs() < 1e-9);
    }
}
