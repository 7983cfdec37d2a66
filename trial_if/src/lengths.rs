//! # Length Table Persistence
//!
//! Expected inter-part lengths are estimated once per trial and reused for every frame of that
//! trial. This module stores the per-trial length vectors as CSV in long form, one record per
//! `(trial, segment)`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::frame::TrialId;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Per-trial vectors of consecutive inter-part lengths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LengthTable {
    lengths: BTreeMap<TrialId, Vec<f64>>,
}

/// One CSV record of a length table.
#[derive(Debug, Serialize, Deserialize)]
struct LengthRecord {
    trial: String,
    segment: usize,
    length: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised when persisting a length table.
#[derive(Debug, thiserror::Error)]
pub enum LengthStoreError {
    #[error("CSV operation failed: {0}")]
    CsvError(#[from] csv::Error),

    #[error("An IO operation failed: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Trial {0} has a gap in its segment indices")]
    MissingSegment(TrialId),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LengthTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the length vector for a trial, replacing any previous one.
    pub fn insert(&mut self, trial: TrialId, lengths: Vec<f64>) {
        self.lengths.insert(trial, lengths);
    }

    /// The length vector for a trial, if one is recorded.
    pub fn get(&self, trial: &TrialId) -> Option<&[f64]> {
        self.lengths.get(trial).map(|l| l.as_slice())
    }

    /// Number of trials with a recorded length vector.
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// True if no trial is recorded.
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Write the table to a CSV file, one record per `(trial, segment)`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LengthStoreError> {
        let mut writer = csv::Writer::from_path(path)?;

        for (trial, lengths) in &self.lengths {
            for (segment, &length) in lengths.iter().enumerate() {
                writer.serialize(LengthRecord {
                    trial: trial.0.clone(),
                    segment,
                    length,
                })?;
            }
        }

        writer.flush()?;

        Ok(())
    }

    /// Read a table back from a CSV file.
    ///
    /// Records may arrive in any order; segment indices of each trial must form a contiguous
    /// range starting at zero.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LengthStoreError> {
        let mut reader = csv::Reader::from_path(path)?;

        let mut segments: BTreeMap<TrialId, BTreeMap<usize, f64>> = BTreeMap::new();

        for record in reader.deserialize() {
            let record: LengthRecord = record?;
            let trial = TrialId(record.trial);

            let prev = segments
                .entry(trial.clone())
                .or_default()
                .insert(record.segment, record.length);

            if prev.is_some() {
                warn!(
                    "Duplicate length record for trial {} segment {}, keeping the last",
                    trial, record.segment
                );
            }
        }

        let mut table = Self::new();

        for (trial, by_segment) in segments {
            let n_segments = by_segment.keys().max().map(|&m| m + 1).unwrap_or(0);

            if by_segment.len() != n_segments {
                return Err(LengthStoreError::MissingSegment(trial));
            }

            table.insert(trial, by_segment.values().copied().collect());
        }

        Ok(table)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_csv_round_trip() -> Result<(), LengthStoreError> {
        let mut table = LengthTable::new();
        table.insert(
            TrialId::from("trial_a"),
            vec![63.9626, 19.3718, 12.8402, 22.0421, 20.5768],
        );
        table.insert(TrialId::from("trial_b"), vec![60.0, 20.0, 15.0, 20.0, 20.0]);

        let dir = std::env::temp_dir().join("trial_if_lengths_test");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("lengths.csv");

        table.save(&path)?;
        let loaded = LengthTable::load(&path)?;

        assert_eq!(table, loaded);
        assert_eq!(loaded.get(&TrialId::from("trial_b")).unwrap()[2], 15.0);

        Ok(())
    }

    #[test]
    fn test_missing_segment_detected() -> Result<(), LengthStoreError> {
        let dir = std::env::temp_dir().join("trial_if_lengths_gap_test");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("lengths.csv");

        std::fs::write(&path, "trial,segment,length\nt,0,1.0\nt,2,3.0\n")?;

        assert!(matches!(
            LengthTable::load(&path),
            Err(LengthStoreError::MissingSegment(_))
        ));

        Ok(())
    }
}
