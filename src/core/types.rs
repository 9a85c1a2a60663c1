/*!
 * Core Types
 * Common types used across the pipeline
 */

use serde::{Deserialize, Serialize};

/// Integer carried between stages
pub type Candidate = u32;

/// 1-based position of a stage in the chain (stage 1 reads from the feeder)
pub type StageIndex = usize;

/// OS process id as reported in output and logs
pub type Pid = i32;

/// Inclusive candidate range fed into the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRange {
    pub lo: Candidate,
    pub hi: Candidate,
}

impl CandidateRange {
    pub fn new(lo: Candidate, hi: Candidate) -> Self {
        Self { lo, hi }
    }

    /// Ascending iterator over the range; empty when `lo > hi`
    pub fn iter(&self) -> std::ops::RangeInclusive<Candidate> {
        self.lo..=self.hi
    }

    pub fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            u64::from(self.hi - self.lo) + 1
        }
    }
}
