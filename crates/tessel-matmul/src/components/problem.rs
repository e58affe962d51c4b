use core::ops::Range;

use derive_new::new;
use serde::{Deserialize, Serialize};
use tessel_common::Element;
use tessel_runtime::Handle;

use super::{GemmCoord, MatmulSetupError};

#[derive(new, Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Description of a matmul problem to solve, regardless of actual data
pub struct MatmulProblem {
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

impl MatmulProblem {
    /// Rejects empty extents, which the block engine doesn't handle.
    pub fn validate(&self) -> Result<(), MatmulSetupError> {
        if self.m == 0 || self.n == 0 || self.k == 0 {
            return Err(MatmulSetupError::invalid_problem(format!(
                "Matmul extents must be positive, got m={} n={} k={}",
                self.m, self.n, self.k
            )));
        }

        Ok(())
    }

    /// The extents as a coordinate.
    pub fn shape(&self) -> GemmCoord {
        GemmCoord::new(self.m, self.n, self.k)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Boundaries of the groups of a grouped matmul along one dimension.
///
/// Entry `g` is the exclusive end of group `g`; group `g` starts where group `g - 1` ends.
/// The list is stored on device as `i64`, like the boundary lists produced by token routing.
pub struct GroupList {
    ends: Vec<i64>,
}

impl GroupList {
    /// Wraps cumulative group ends.
    pub fn new(ends: Vec<i64>) -> Self {
        Self { ends }
    }

    /// Builds the cumulative list from group sizes.
    pub fn from_sizes(sizes: &[usize]) -> Self {
        let ends = sizes
            .iter()
            .scan(0i64, |end, size| {
                *end += *size as i64;
                Some(*end)
            })
            .collect();

        Self { ends }
    }

    /// Reads the list from a device buffer of `group_count` entries.
    pub fn from_handle(handle: &Handle, group_count: usize) -> Result<Self, MatmulSetupError> {
        let mut ends = handle.read(i64::from_bytes);

        if ends.len() < group_count {
            return Err(MatmulSetupError::invalid_problem(format!(
                "Group list holds {} entries, expected {group_count}",
                ends.len()
            )));
        }
        ends.truncate(group_count);

        Ok(Self { ends })
    }

    /// Checks the list describes `group_count` groups covering at most `extent`.
    pub fn validate(&self, group_count: usize, extent: usize) -> Result<(), MatmulSetupError> {
        if group_count == 0 {
            return Err(MatmulSetupError::invalid_problem(
                "A grouped matmul needs at least one group",
            ));
        }

        if self.ends.len() != group_count {
            return Err(MatmulSetupError::invalid_problem(format!(
                "Group list holds {} entries, expected {group_count}",
                self.ends.len()
            )));
        }

        let mut start = 0i64;
        for (group, end) in self.ends.iter().enumerate() {
            if *end < start {
                return Err(MatmulSetupError::invalid_problem(format!(
                    "Group {group} ends at {end}, before its start {start}"
                )));
            }
            start = *end;
        }

        if start as u64 > extent as u64 {
            return Err(MatmulSetupError::invalid_problem(format!(
                "Group list ends at {start}, past the extent {extent}"
            )));
        }

        Ok(())
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.ends.len()
    }

    /// The cumulative ends.
    pub fn ends(&self) -> &[i64] {
        &self.ends
    }

    /// Range covered by group `group`. The list must be valid.
    pub fn range(&self, group: usize) -> Range<usize> {
        let start = match group {
            0 => 0,
            group => self.ends[group - 1] as usize,
        };
        start..self.ends[group] as usize
    }

    /// Group owning `index`, if any. Empty groups never own an index.
    pub fn group_of(&self, index: usize) -> Option<usize> {
        let group = self.ends.partition_point(|end| *end <= index as i64);
        (group < self.ends.len()).then_some(group)
    }
}

#[derive(new, Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Distance in elements between two consecutive batches of each operand.
pub struct BatchStrides {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

impl BatchStrides {
    /// Strides of densely packed batches.
    pub fn contiguous(problem: &MatmulProblem) -> Self {
        Self {
            a: problem.m * problem.k,
            b: problem.k * problem.n,
            c: problem.m * problem.n,
        }
    }
}
