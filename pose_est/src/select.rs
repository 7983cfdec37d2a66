//! # Skeleton Selection
//!
//! Selects a single coherent skeleton from the unordered, noisy candidate population of one
//! frame. The shortest paths from the head candidates to every foot candidate propose one
//! skeleton per foot; a consensus vote over spheres of influence grown around each pair of
//! proposals picks the two feet whose surroundings carry the highest link scores.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use itertools::Itertools;
use log::debug;
use nalgebra::{distance, Point3};
use ndarray::{Array1, Array2};
use ndarray_stats::errors::MinMaxError;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

use trial_if::frame::Frame;
use trial_if::parts::LabelAdjacency;

use crate::graph::{pop_shortest_paths, trace_path};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A chosen skeleton: one point per part label, indexed by label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    points: Vec<Point3<f64>>,
}

/// The shortest paths from the head candidates to every reachable foot candidate.
#[derive(Debug, Clone)]
pub struct FootPaths {
    /// One row per foot candidate; column `l` holds the population index of the path's point
    /// with label `l`.
    pub paths: Array2<usize>,

    /// Total shortest path cost to each foot.
    pub dist: Array1<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised during skeleton selection.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("Frame incomplete: {0}")]
    FrameIncomplete(String),

    #[error("Couldn't compare candidate scores: {0}")]
    ScoreComparison(#[from] MinMaxError),

    #[error("Path matrix has an inconsistent shape: {0}")]
    PathShape(#[from] ndarray::ShapeError),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The canonical link score: high when the measured distance is close to the expected one,
/// with a maximum of one at an exact match.
///
/// Near-zero expected lengths would divide by zero, so they score zero instead.
pub fn norm_ratio_score(measured: f64, expected: f64) -> f64 {
    if expected.abs() < f64::EPSILON {
        return 0.0;
    }

    let score = 1.0 - (measured / expected - 1.0).powi(2);

    if score.is_nan() {
        0.0
    } else {
        score
    }
}

/// The shortest path to each foot candidate.
///
/// Foot candidates are the nodes carrying `max_label`. Candidates with a broken predecessor
/// chain are dropped; an error is raised only when no candidate at all survives, or none
/// exists in the first place.
pub fn paths_to_foot(
    prev: &[Option<usize>],
    dist: &[f64],
    labels: &[usize],
    max_label: usize,
) -> Result<FootPaths, SelectError> {
    let foot_nodes: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, &l)| l == max_label)
        .map(|(i, _)| i)
        .collect();

    if foot_nodes.is_empty() {
        return Err(SelectError::FrameIncomplete(format!(
            "no candidates with the foot label {}",
            max_label
        )));
    }

    let mut rows: Vec<usize> = Vec::new();
    let mut path_dist: Vec<f64> = Vec::new();

    for &foot in &foot_nodes {
        match trace_path(prev, labels, foot) {
            Ok(path) => {
                rows.extend(path);
                path_dist.push(dist[foot]);
            }
            // Unreachable foot, drop the row
            Err(_) => continue,
        }
    }

    if path_dist.is_empty() {
        return Err(SelectError::FrameIncomplete(
            "no foot candidate is reachable from a head".into(),
        ));
    }

    let paths = Array2::from_shape_vec((path_dist.len(), max_label + 1), rows)?;

    Ok(FootPaths {
        paths,
        dist: Array1::from(path_dist),
    })
}

/// Score every candidate pair against the expected distance of its label pair.
///
/// Returns the score matrix and the measured distance matrix. Entries whose label combination
/// is not an allowed part connection are zero, and NaN scores are clamped to zero.
pub fn score_matrix<S>(
    frame: &Frame,
    adjacency: &LabelAdjacency,
    score: S,
) -> (Array2<f64>, Array2<f64>)
where
    S: Fn(f64, f64) -> f64,
{
    let n = frame.len();
    let labels = frame.labels();
    let points = frame.population();

    let mut dist_matrix = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = distance(&points[i], &points[j]);
            dist_matrix[[i, j]] = d;
            dist_matrix[[j, i]] = d;
        }
    }

    let mut score_matrix = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            if let Some(expected) = adjacency.expected(labels[i], labels[j]) {
                let s = score(dist_matrix[[i, j]], expected);
                score_matrix[[i, j]] = if s.is_nan() { 0.0 } else { s };
            }
        }
    }

    (score_matrix, dist_matrix)
}

/// Keep only the scores connecting nodes which co-occur on at least one foot path, linked by
/// an allowed part connection. Everything else is zeroed.
pub fn filter_by_path(
    scores: &Array2<f64>,
    paths: &Array2<usize>,
    adjacency: &LabelAdjacency,
) -> Array2<f64> {
    let mut filtered = Array2::zeros(scores.raw_dim());

    for row in paths.rows() {
        for (a, b, _) in adjacency.iter_pairs() {
            let (i, j) = (row[a], row[b]);
            filtered[[i, j]] = scores[[i, j]];
        }
    }

    filtered
}

/// Which points lie inside the union of spheres of radius `radius` centred on the path's
/// points. The path's own points are always inside (distance zero).
pub fn inside_spheres(
    dist_matrix: &Array2<f64>,
    path: &[usize],
    radius: f64,
) -> Array1<bool> {
    let n = dist_matrix.nrows();
    let mut inside = Array1::from_elem(n, false);

    for &centre in path {
        for i in 0..n {
            if dist_matrix[[centre, i]] <= radius {
                inside[i] = true;
            }
        }
    }

    inside
}

/// Choose the pair of foot paths with the best local consensus.
///
/// For each radius, every unordered pair of paths is scored by summing the filtered score
/// submatrix over the points inside the pair's combined sphere region; the pair(s) with the
/// maximum sum at that radius receive one vote. The pair with the most votes overall wins,
/// and ties fall to the lexicographically smallest pair.
pub fn select_best_feet(
    dist_matrix: &Array2<f64>,
    scores: &Array2<f64>,
    paths: &Array2<usize>,
    radii: &[f64],
) -> Result<(usize, usize), SelectError> {
    let n_paths = paths.nrows();

    if n_paths < 2 {
        return Err(SelectError::FrameIncomplete(format!(
            "{} foot path(s), need at least two to pick a pair",
            n_paths
        )));
    }

    // Sphere membership per path per radius
    let memberships: Vec<Vec<Array1<bool>>> = paths
        .rows()
        .into_iter()
        .map(|row| {
            let path: Vec<usize> = row.iter().copied().collect();
            radii
                .iter()
                .map(|&r| inside_spheres(dist_matrix, &path, r))
                .collect()
        })
        .collect();

    let combos: Vec<(usize, usize)> = (0..n_paths).tuple_combinations().collect();

    let n = dist_matrix.nrows();
    let mut votes = Array1::<f64>::zeros(combos.len());
    let mut combo_scores = Array1::<f64>::zeros(combos.len());

    for (r_i, _) in radii.iter().enumerate() {
        for (c_i, &(p, q)) in combos.iter().enumerate() {
            let in_p = &memberships[p][r_i];
            let in_q = &memberships[q][r_i];

            let mut sum = 0.0;
            for i in 0..n {
                if !(in_p[i] || in_q[i]) {
                    continue;
                }
                for j in 0..n {
                    if in_p[j] || in_q[j] {
                        sum += scores[[i, j]];
                    }
                }
            }

            combo_scores[c_i] = sum;
        }

        // One vote to every pair achieving this radius' maximum
        let max_score = *combo_scores.max()?;
        for (c_i, &s) in combo_scores.iter().enumerate() {
            if s == max_score {
                votes[c_i] += 1.0;
            }
        }
    }

    // First maximum wins, which is the lexicographically smallest pair
    let winner = votes.argmax()?;

    Ok(combos[winner])
}

/// Materialise the two chosen foot paths as skeletons.
///
/// Both skeletons receive the same head position: the head of the foot path with the minimum
/// total cost across all foot paths.
pub fn foot_to_pop(
    frame: &Frame,
    foot_paths: &FootPaths,
    foot_1: usize,
    foot_2: usize,
) -> Result<(Skeleton, Skeleton), SelectError> {
    let min_row = foot_paths.dist.argmin()?;
    let head = frame.point(foot_paths.paths[[min_row, 0]]);

    let materialise = |row: usize| -> Vec<Point3<f64>> {
        foot_paths
            .paths
            .row(row)
            .iter()
            .map(|&i| frame.point(i))
            .collect()
    };

    let mut pop_1 = materialise(foot_1);
    let mut pop_2 = materialise(foot_2);
    pop_1[0] = head;
    pop_2[0] = head;

    Ok((Skeleton { points: pop_1 }, Skeleton { points: pop_2 }))
}

/// The full per-frame pipeline: graph, shortest paths, foot paths, scoring, sphere vote.
///
/// Returns the two chosen skeletons, or [`SelectError::FrameIncomplete`] when the population
/// cannot support a pair of feet (empty population, a part type with no candidates, fewer than
/// two reachable foot candidates).
pub fn process_frame<C, S>(
    frame: &Frame,
    adjacency: &LabelAdjacency,
    radii: &[f64],
    cost: C,
    score: S,
) -> Result<(Skeleton, Skeleton), SelectError>
where
    C: Fn(f64, f64) -> f64,
    S: Fn(f64, f64) -> f64,
{
    if frame.is_empty() {
        return Err(SelectError::FrameIncomplete("empty population".into()));
    }

    let max_label = adjacency.max_label();

    for label in 0..=max_label {
        if frame.nodes_with_label(label).next().is_none() {
            return Err(SelectError::FrameIncomplete(format!(
                "no candidates for part label {}",
                label
            )));
        }
    }

    let consecutive = adjacency.consecutive_only();
    let (prev, dist) = pop_shortest_paths(frame, &consecutive, &cost);

    let foot_paths = paths_to_foot(&prev, &dist, frame.labels(), max_label)?;

    let (scores, dist_matrix) = score_matrix(frame, adjacency, &score);
    let filtered = filter_by_path(&scores, &foot_paths.paths, adjacency);

    let (foot_1, foot_2) =
        select_best_feet(&dist_matrix, &filtered, &foot_paths.paths, radii)?;

    debug!(
        "Selected foot paths {} and {} of {}",
        foot_1,
        foot_2,
        foot_paths.paths.nrows()
    );

    foot_to_pop(frame, &foot_paths, foot_1, foot_2)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Skeleton {
    /// The chosen points, indexed by part label.
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// The head position (label zero).
    pub fn head(&self) -> Point3<f64> {
        self.points[0]
    }

    /// The foot position (the highest label).
    pub fn foot(&self) -> Point3<f64> {
        self.points[self.points.len() - 1]
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
