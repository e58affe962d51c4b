#![allow(missing_docs)]

//! Correctness suites of the kernels against the host reference.
//!
//! Each suite takes the client to launch on. [testgen_matmul](crate::testgen_matmul) expands to
//! one test per suite for a device with the given number of cores.

pub mod basic;
pub mod batched;
pub mod optimized;
pub mod policy;
pub mod quant;

#[macro_export]
macro_rules! testgen_matmul {
    () => {
        $crate::testgen_matmul!(20);
    };
    ($cores:expr) => {
        mod matmul {
            use $crate::tests::{self, test_utils::test_client};

            #[test_log::test]
            fn basic_layout_combinations() {
                tests::basic::test_layout_combinations(&test_client($cores));
            }

            #[test_log::test]
            fn basic_edge_blocks() {
                tests::basic::test_edge_blocks(&test_client($cores));
            }

            #[test_log::test]
            fn batched_four_batches_scaled() {
                tests::batched::test_four_batches_scaled(&test_client($cores));
            }

            #[test_log::test]
            fn batched_strided_batches() {
                tests::batched::test_strided_batches(&test_client($cores));
            }

            #[test_log::test]
            fn batched_rejects_integer_output() {
                tests::batched::test_rejects_integer_output(&test_client($cores));
            }

            #[test_log::test]
            fn grouped_single_group_unit_scales() {
                tests::grouped::test_single_group_unit_scales(&test_client($cores));
            }

            #[test_log::test]
            fn grouped_three_groups() {
                tests::grouped::test_three_groups(&test_client($cores));
            }

            #[test_log::test]
            fn grouped_empty_and_uneven_groups() {
                tests::grouped::test_empty_and_uneven_groups(&test_client($cores));
            }

            #[test_log::test]
            fn grouped_matches_separate_launches() {
                tests::grouped::test_groups_match_separate_launches(&test_client($cores));
            }

            #[test_log::test]
            fn grouped_rejects_invalid_group_lists() {
                tests::grouped::test_rejects_invalid_group_lists(&test_client($cores));
            }

            #[test_log::test]
            fn grouped_slice_m() {
                tests::grouped::test_slice_m(&test_client($cores));
            }

            #[test_log::test]
            fn optimized_padding_equivalence() {
                tests::optimized::test_padding_equivalence(&test_client($cores));
            }

            #[test_log::test]
            fn optimized_aligned_operands() {
                tests::optimized::test_aligned_operands(&test_client($cores));
            }

            #[test_log::test]
            fn optimized_column_major_operands() {
                tests::optimized::test_column_major_operands(&test_client($cores));
            }

            #[test_log::test]
            fn quant_epilogue_paths() {
                tests::quant::test_epilogue_paths(&test_client($cores));
            }

            #[test_log::test]
            fn quant_default_selection() {
                tests::quant::test_default_selection(&test_client($cores));
            }

            #[test_log::test]
            fn quant_single_workspace_stage() {
                tests::quant::test_single_workspace_stage(&test_client($cores));
            }

            #[test_log::test]
            fn quant_rejects_direct_cadence() {
                tests::quant::test_rejects_direct_cadence(&test_client($cores));
            }

            #[test_log::test]
            fn policies_are_bit_identical() {
                tests::policy::test_policies_are_bit_identical(&test_client($cores));
            }

            #[test_log::test]
            fn results_independent_of_scheduling() {
                tests::policy::test_results_independent_of_scheduling(&test_client($cores));
            }

            #[test_log::test]
            fn repeated_launches() {
                tests::policy::test_repeated_launches(&test_client($cores));
            }
        }
    };
}

#[cfg(test)]
mod suites {
    crate::testgen_matmul!(4);
}
