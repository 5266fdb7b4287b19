//! Equal contiguous row partitions for the distributed strategies.

use std::ops::Range;

use crate::error::{config_error, Result};

/// Even split of `total_rows` rows across `parts` participants.
///
/// Participant `r` owns rows `[r * local_rows, (r + 1) * local_rows)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPartition {
    total_rows: usize,
    parts: usize,
    local_rows: usize,
}

impl RowPartition {
    /// Splits `total_rows` across `parts` participants.
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless `parts > 0` and `total_rows` is
    /// an exact multiple of `parts`. Ragged partitions are not supported.
    pub fn new(total_rows: usize, parts: usize) -> Result<Self> {
        if parts == 0 {
            return Err(config_error("participant count must be at least 1"));
        }
        if total_rows % parts != 0 {
            return Err(config_error(format!(
                "M ({total_rows}) must be divisible by the participant count ({parts})"
            )));
        }
        Ok(Self {
            total_rows,
            parts,
            local_rows: total_rows / parts,
        })
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn parts(&self) -> usize {
        self.parts
    }

    /// Rows owned by each participant.
    pub fn local_rows(&self) -> usize {
        self.local_rows
    }

    /// Global row range owned by `rank`.
    pub fn range(&self, rank: usize) -> Range<usize> {
        let start = rank * self.local_rows;
        start..start + self.local_rows
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.parts).map(move |r| self.range(r))
    }
}
