//! # Body Part Types
//!
//! A body part type is identified by a small integer label, ordered from head to foot. The label
//! ordering is significant: graph edges over part candidates always run from lower to higher
//! labels.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of body part types tracked by the pipeline.
pub const NUM_PART_TYPES: usize = 6;

/// The highest part label (the foot label).
pub const MAX_PART_LABEL: usize = NUM_PART_TYPES - 1;

/// The default set of allowed connections between part labels.
///
/// Each pair `(a, b)` has `b > a`. Non-adjacent pairs (e.g. hip to knee) are included so that
/// scores can be assigned to biomechanically meaningful links which skip a part.
pub const DEFAULT_PART_CONNECTIONS: [(usize, usize); 7] =
    [(0, 1), (1, 2), (1, 3), (2, 3), (3, 4), (3, 5), (4, 5)];

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A body part type, in head-to-foot label order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartType {
    Head,
    Hip,
    Thigh,
    Knee,
    Calf,
    Foot,
}

/// Errors raised when building a label adjacency table.
#[derive(Debug, thiserror::Error)]
pub enum PartError {
    #[error("Connection ({0}, {1}) is not forward (need b > a)")]
    ConnectionNotForward(usize, usize),

    #[error("Connection ({0}, {1}) references a segment outside the length vector (len {2})")]
    ConnectionOutOfRange(usize, usize, usize),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Expected distances between pairs of part labels.
///
/// `expected(a, b)` is the anatomical distance between a point of type `a` and a point of type
/// `b`, for the allowed pairs only. For non-adjacent pairs the distance is the sum of the
/// intervening consecutive segment lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelAdjacency {
    /// Entry `a` maps each destination label `b` to the expected distance from `a` to `b`.
    expected: Vec<BTreeMap<usize, f64>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PartType {
    /// All part types in label order.
    pub const ALL: [PartType; NUM_PART_TYPES] = [
        PartType::Head,
        PartType::Hip,
        PartType::Thigh,
        PartType::Knee,
        PartType::Calf,
        PartType::Foot,
    ];

    /// The integer label of this part type.
    pub fn label(&self) -> usize {
        match self {
            PartType::Head => 0,
            PartType::Hip => 1,
            PartType::Thigh => 2,
            PartType::Knee => 3,
            PartType::Calf => 4,
            PartType::Foot => 5,
        }
    }

    /// The part type with the given label, or `None` if the label is out of range.
    pub fn from_label(label: usize) -> Option<Self> {
        Self::ALL.get(label).copied()
    }
}

impl LabelAdjacency {
    /// Build the adjacency table from a connection list and the consecutive segment lengths.
    ///
    /// `lengths[i]` is the distance between parts `i` and `i + 1`. The expected distance for a
    /// connection `(a, b)` is the sum of the intervening consecutive lengths `lengths[a..b]`.
    pub fn from_lengths(
        connections: &[(usize, usize)],
        lengths: &[f64],
    ) -> Result<Self, PartError> {
        let last_part = connections.iter().map(|c| c.1).max().unwrap_or(0);

        let mut expected = vec![BTreeMap::new(); last_part + 1];

        for &(a, b) in connections {
            if b <= a {
                return Err(PartError::ConnectionNotForward(a, b));
            }
            if b > lengths.len() {
                return Err(PartError::ConnectionOutOfRange(a, b, lengths.len()));
            }

            expected[a].insert(b, lengths[a..b].iter().sum());
        }

        Ok(Self { expected })
    }

    /// Project the table down to consecutive pairs only (`b == a + 1`).
    ///
    /// Every source label of the original table is kept, so labels with no consecutive successor
    /// map to an empty entry.
    pub fn consecutive_only(&self) -> Self {
        let expected = self
            .expected
            .iter()
            .enumerate()
            .map(|(a, dests)| {
                dests
                    .iter()
                    .filter(|(&b, _)| b == a + 1)
                    .map(|(&b, &d)| (b, d))
                    .collect()
            })
            .collect();

        Self { expected }
    }

    /// The expected distance from label `a` to label `b`, if the pair is allowed.
    pub fn expected(&self, a: usize, b: usize) -> Option<f64> {
        self.expected.get(a).and_then(|dests| dests.get(&b)).copied()
    }

    /// Number of labels covered by the table.
    pub fn num_labels(&self) -> usize {
        self.expected.len()
    }

    /// The highest label covered by the table.
    pub fn max_label(&self) -> usize {
        self.expected.len().saturating_sub(1)
    }

    /// Iterate over all allowed `(a, b, expected)` entries.
    pub fn iter_pairs(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.expected
            .iter()
            .enumerate()
            .flat_map(|(a, dests)| dests.iter().map(move |(&b, &d)| (a, b, d)))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_lengths_sums_segments() -> Result<(), PartError> {
        let lengths = [62.0, 20.0, 14.0, 19.0, 20.0];
        let adj = LabelAdjacency::from_lengths(&DEFAULT_PART_CONNECTIONS, &lengths)?;

        // Consecutive pairs map straight to the segment lengths
        assert_eq!(adj.expected(0, 1), Some(62.0));
        assert_eq!(adj.expected(4, 5), Some(20.0));

        // Non-adjacent pairs sum the intervening segments
        assert_eq!(adj.expected(1, 3), Some(34.0));
        assert_eq!(adj.expected(3, 5), Some(39.0));

        // Pairs outside the connection table are not present
        assert_eq!(adj.expected(0, 5), None);
        assert_eq!(adj.expected(1, 0), None);

        Ok(())
    }

    #[test]
    fn test_consecutive_only() -> Result<(), PartError> {
        let lengths = [62.0, 20.0, 14.0, 19.0, 20.0];
        let adj = LabelAdjacency::from_lengths(&DEFAULT_PART_CONNECTIONS, &lengths)?;
        let cons = adj.consecutive_only();

        assert_eq!(cons.expected(1, 2), Some(20.0));
        assert_eq!(cons.expected(1, 3), None);
        assert_eq!(cons.expected(3, 5), None);
        assert_eq!(cons.num_labels(), adj.num_labels());

        Ok(())
    }

    #[test]
    fn test_bad_connections() {
        assert!(LabelAdjacency::from_lengths(&[(1, 1)], &[1.0]).is_err());
        assert!(LabelAdjacency::from_lengths(&[(0, 3)], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_part_labels() {
        for (i, part) in PartType::ALL.iter().enumerate() {
            assert_eq!(part.label(), i);
            assert_eq!(PartType::from_label(i), Some(*part));
        }

        assert_eq!(PartType::Foot.label(), MAX_PART_LABEL);
        assert_eq!(PartType::from_label(NUM_PART_TYPES), None);
    }
}
