use core::fmt::Display;

use serde::{Deserialize, Serialize};
use tessel_common::ElemKind;

use crate::components::{DispatchPolicy, GemmCoord, MatrixLayout, MatrixOrder};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// The kernels of the crate.
pub enum KernelKind {
    Basic,
    BatchedQuant,
    GroupedSliceK,
    GroupedSliceM,
    OptimizedQuant,
    MultistageWorkspace,
}

impl KernelKind {
    /// Name the launches of the kernel are profiled under.
    pub fn name(&self) -> &'static str {
        match self {
            KernelKind::Basic => "basic_matmul",
            KernelKind::BatchedQuant => "batched_quant_matmul",
            KernelKind::GroupedSliceK => "grouped_matmul_slice_k_per_token_dequant",
            KernelKind::GroupedSliceM => "grouped_matmul_slice_m",
            KernelKind::OptimizedQuant => "optimized_quant_matmul",
            KernelKind::MultistageWorkspace => "quant_matmul_multistage_workspace",
        }
    }
}

impl Display for KernelKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Dimension a grouped problem is split along.
pub enum GroupSplit {
    M,
    K,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// Summary of a launch, sent to the kernel logger.
pub struct KernelInfo {
    pub kind: KernelKind,
    pub input: ElemKind,
    pub output: ElemKind,
    pub problem: GemmCoord,
    pub group_count: usize,
    pub batch_count: usize,
    pub split: Option<GroupSplit>,
    pub trans_a: bool,
    pub trans_b: bool,
    pub policy: DispatchPolicy,
    pub block_dim: u32,
    pub padded: (bool, bool),
}

impl KernelInfo {
    pub fn new(kind: KernelKind, input: ElemKind, output: ElemKind, problem: GemmCoord) -> Self {
        Self {
            kind,
            input,
            output,
            problem,
            group_count: 1,
            batch_count: 1,
            split: None,
            trans_a: false,
            trans_b: false,
            policy: DispatchPolicy::default(),
            block_dim: 1,
            padded: (false, false),
        }
    }

    /// Records whether the operands are stored transposed, i.e. A column-major or B column-major.
    pub fn with_layouts(mut self, a: &MatrixLayout, b: &MatrixLayout) -> Self {
        self.trans_a = a.order() == MatrixOrder::ColumnMajor;
        self.trans_b = b.order() == MatrixOrder::ColumnMajor;
        self
    }
}

impl Display for KernelInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} {}->{} m={} n={} k={}",
            self.kind, self.input, self.output, self.problem.m, self.problem.n, self.problem.k
        )?;
        if self.group_count > 1 || self.split.is_some() {
            write!(f, " groups={}", self.group_count)?;
        }
        if let Some(split) = self.split {
            write!(f, " split={split:?}")?;
        }
        if self.batch_count > 1 {
            write!(f, " batches={}", self.batch_count)?;
        }
        write!(
            f,
            " trans_a={} trans_b={} policy={} cores={}",
            self.trans_a, self.trans_b, self.policy, self.block_dim
        )?;
        if self.padded.0 || self.padded.1 {
            write!(f, " padded_a={} padded_b={}", self.padded.0, self.padded.1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn summary_mentions_the_grouping() {
        let mut info = KernelInfo::new(
            KernelKind::GroupedSliceK,
            ElemKind::I8,
            ElemKind::BF16,
            GemmCoord::new(64, 64, 384),
        );
        info.group_count = 3;
        info.split = Some(GroupSplit::K);
        info.block_dim = 20;

        assert_eq!(
            info.to_string(),
            "grouped_matmul_slice_k_per_token_dequant i8->bf16 m=64 n=64 k=384 groups=3 split=K \
             trans_a=false trans_b=false policy=pingpong cores=20"
        );
    }
}
