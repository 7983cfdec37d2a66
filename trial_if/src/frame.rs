//! # Frame Populations
//!
//! A frame's population is the union of all candidate 3D points proposed for each body part type
//! in one image frame, sorted ascending by part label. The sorted order is the canonical node
//! numbering of the per-frame part graph.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::parts::PartType;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Identifies a recorded trial.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TrialId(pub String);

/// Identifies an image frame within a trial.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FrameId(pub u32);

/// The population of body part hypotheses for a single frame.
///
/// Invariant: `population` and `labels` have the same length and `labels` is sorted ascending,
/// so points with identical labels are adjacent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    population: Vec<Point3<f64>>,
    labels: Vec<usize>,
}

/// An in-memory hypothesis source keyed by `(TrialId, FrameId)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HypothesisIndex {
    frames: BTreeMap<TrialId, BTreeMap<FrameId, Frame>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Shape errors raised when constructing a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Population has {points} points but {labels} labels")]
    LengthMismatch { points: usize, labels: usize },

    #[error("Labels are not sorted ascending (index {0})")]
    LabelsNotSorted(usize),
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A read-only source of per-frame hypothesis populations.
///
/// The persistence layout behind a source is not part of the core contract; collaborators may
/// back this with whatever storage they have.
pub trait HypothesisSource {
    /// The population for the given trial and frame, if one exists.
    fn frame(&self, trial: &TrialId, frame: FrameId) -> Option<&Frame>;

    /// All frame ids recorded for the given trial, in ascending order.
    fn frame_ids(&self, trial: &TrialId) -> Vec<FrameId>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Frame {
    /// Build a frame from an already-sorted population and label array.
    pub fn new(
        population: Vec<Point3<f64>>,
        labels: Vec<usize>,
    ) -> Result<Self, FrameError> {
        if population.len() != labels.len() {
            return Err(FrameError::LengthMismatch {
                points: population.len(),
                labels: labels.len(),
            });
        }

        if let Some(i) = labels.windows(2).position(|w| w[1] < w[0]) {
            return Err(FrameError::LabelsNotSorted(i + 1));
        }

        Ok(Self { population, labels })
    }

    /// Assemble a frame from per-part hypothesis lists.
    ///
    /// Multiple entries may share a part type (e.g. left and right foot proposals both carry
    /// [`PartType::Foot`]); all of their points receive that type's label. The result is sorted
    /// by label, which makes it a valid population.
    pub fn from_hypotheses(parts: &[(PartType, Vec<Point3<f64>>)]) -> Self {
        let mut tagged: Vec<(usize, Point3<f64>)> = parts
            .iter()
            .flat_map(|(part, points)| {
                let label = part.label();
                points.iter().map(move |p| (label, *p))
            })
            .collect();

        tagged.sort_by_key(|(label, _)| *label);

        let (labels, population) = tagged.into_iter().unzip();

        Self { population, labels }
    }

    /// Number of candidate points in the population.
    pub fn len(&self) -> usize {
        self.population.len()
    }

    /// True if the population holds no candidates.
    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }

    /// The candidate points, in canonical node order.
    pub fn population(&self) -> &[Point3<f64>] {
        &self.population
    }

    /// The part label of each candidate, sorted ascending.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// The candidate point at node index `i`.
    pub fn point(&self, i: usize) -> Point3<f64> {
        self.population[i]
    }

    /// Node indices of all candidates with the given label.
    pub fn nodes_with_label(&self, label: usize) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(move |(_, &l)| l == label)
            .map(|(i, _)| i)
    }

    /// The highest label present in the population, or `None` if it is empty.
    pub fn max_label(&self) -> Option<usize> {
        self.labels.last().copied()
    }
}

impl HypothesisIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a frame, replacing any previous population for the same ids.
    pub fn insert(&mut self, trial: TrialId, frame_id: FrameId, frame: Frame) {
        self.frames.entry(trial).or_default().insert(frame_id, frame);
    }

    /// All trials with at least one recorded frame.
    pub fn trials(&self) -> impl Iterator<Item = &TrialId> {
        self.frames.keys()
    }
}

impl HypothesisSource for HypothesisIndex {
    fn frame(&self, trial: &TrialId, frame: FrameId) -> Option<&Frame> {
        self.frames.get(trial).and_then(|t| t.get(&frame))
    }

    fn frame_ids(&self, trial: &TrialId) -> Vec<FrameId> {
        self.frames
            .get(trial)
            .map(|t| t.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl From<&str> for TrialId {
    fn from(s: &str) -> Self {
        TrialId(s.to_owned())
    }
}

impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_hypotheses_sorts_labels() {
        // Parts supplied out of label order, foot entries split left/right
        let parts = vec![
            (
                PartType::Foot,
                vec![Point3::new(-26.0, -57.0, 249.0), Point3::new(-74.0, -58.0, 260.0)],
            ),
            (PartType::Head, vec![Point3::new(-45.0, 66.0, 238.0)]),
            (PartType::Foot, vec![Point3::new(-30.0, -56.0, 250.0)]),
        ];

        let frame = Frame::from_hypotheses(&parts);

        assert_eq!(frame.labels(), &[0, 5, 5, 5]);
        assert_eq!(frame.point(0), Point3::new(-45.0, 66.0, 238.0));

        // Label monotonicity invariant
        assert!(frame.labels().windows(2).all(|w| w[0] <= w[1]));

        assert_eq!(frame.nodes_with_label(5).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(frame.max_label(), Some(5));
    }

    #[test]
    fn test_new_rejects_bad_shapes() {
        let points = vec![Point3::origin(), Point3::origin()];

        assert!(matches!(
            Frame::new(points.clone(), vec![0]),
            Err(FrameError::LengthMismatch { .. })
        ));

        assert!(matches!(
            Frame::new(points, vec![1, 0]),
            Err(FrameError::LabelsNotSorted(1))
        ));
    }

    #[test]
    fn test_hypothesis_index() -> Result<(), FrameError> {
        let mut index = HypothesisIndex::new();
        let trial = TrialId::from("2014-12-22_P007_Pre_004");

        let frame = Frame::new(vec![Point3::origin()], vec![0])?;
        index.insert(trial.clone(), FrameId(271), frame.clone());
        index.insert(trial.clone(), FrameId(4), frame);

        assert_eq!(index.frame_ids(&trial), vec![FrameId(4), FrameId(271)]);
        assert!(index.frame(&trial, FrameId(271)).is_some());
        assert!(index.frame(&trial, FrameId(5)).is_none());
        assert!(index.frame(&TrialId::from("other"), FrameId(4)).is_none());

        Ok(())
    }
}
