//! Property tests for the handle-level algorithms
//!
//! Each property runs on the staged device, whose explicit copies exercise
//! every transfer path, and on the parallel device with inputs large enough
//! to split across threads.

use proptest::prelude::*;
use weft_core::{Algorithm, ArrayHandle, Id, ParallelDevice, StagedDevice};

type Staged = Algorithm<StagedDevice>;
type Parallel = Algorithm<ParallelDevice>;

fn values_strategy() -> impl Strategy<Value = Vec<Id>> {
    prop::collection::vec(-50i64..50, 0..400)
}

fn stencil_strategy() -> impl Strategy<Value = Vec<Id>> {
    prop::collection::vec(0i64..2, 0..400)
}

proptest! {
    #[test]
    fn prop_copy_preserves_contents(values in values_strategy()) {
        let input = ArrayHandle::<Id, StagedDevice>::from_vec(values.clone());
        let output = ArrayHandle::new();
        Staged::copy(&input, &output).unwrap();
        prop_assert_eq!(output.number_of_values(), values.len());
        prop_assert_eq!(output.to_vec().unwrap(), values);
    }

    #[test]
    fn prop_written_output_round_trips(values in values_strategy()) {
        let handle = ArrayHandle::<Id, StagedDevice>::new();
        let portal = handle.prepare_for_output(values.len()).unwrap();
        for (index, value) in values.iter().enumerate() {
            // SAFETY: single-threaded writer.
            unsafe { portal.set(index, *value) };
        }
        let mut copied = vec![0; values.len()];
        handle.copy_into(&mut copied).unwrap();
        prop_assert_eq!(copied, values);
    }

    #[test]
    fn prop_sort_matches_std(values in values_strategy()) {
        let handle = ArrayHandle::<Id, StagedDevice>::from_vec(values.clone());
        Staged::sort(&handle).unwrap();
        let mut expected = values;
        expected.sort();
        prop_assert_eq!(handle.to_vec().unwrap(), expected);
    }

    #[test]
    fn prop_unique_is_idempotent(values in values_strategy()) {
        let handle = ArrayHandle::<Id, StagedDevice>::from_vec(values.clone());
        Staged::sort(&handle).unwrap();
        Staged::unique(&handle).unwrap();
        let once = handle.to_vec().unwrap();
        Staged::unique(&handle).unwrap();
        prop_assert_eq!(handle.to_vec().unwrap(), once.clone());

        let mut expected = values;
        expected.sort();
        expected.dedup();
        prop_assert_eq!(once, expected);
    }

    #[test]
    fn prop_bounds_count_smaller_elements(
        sorted in values_strategy(),
        probes in prop::collection::vec(-60i64..60, 0..50),
    ) {
        let mut sorted = sorted;
        sorted.sort();
        let sorted_handle = ArrayHandle::<Id, StagedDevice>::from_vec(sorted.clone());
        let probe_handle = ArrayHandle::from_vec(probes.clone());
        let lower = ArrayHandle::new();
        let upper = ArrayHandle::new();
        Staged::lower_bounds(&sorted_handle, &probe_handle, &lower).unwrap();
        Staged::upper_bounds(&sorted_handle, &probe_handle, &upper).unwrap();

        let lower = lower.to_vec().unwrap();
        let upper = upper.to_vec().unwrap();
        for (i, probe) in probes.iter().enumerate() {
            prop_assert_eq!(lower[i], sorted.iter().filter(|v| *v < probe).count() as Id);
            prop_assert_eq!(upper[i], sorted.iter().filter(|v| *v <= probe).count() as Id);
        }
    }

    #[test]
    fn prop_scans_sum_prefixes(values in values_strategy()) {
        let input = ArrayHandle::<Id, StagedDevice>::from_vec(values.clone());
        let inclusive = ArrayHandle::new();
        let exclusive = ArrayHandle::new();
        let total: Id = values.iter().sum();
        prop_assert_eq!(Staged::scan_inclusive(&input, &inclusive).unwrap(), total);
        prop_assert_eq!(Staged::scan_exclusive(&input, &exclusive).unwrap(), total);

        let inclusive = inclusive.to_vec().unwrap();
        let exclusive = exclusive.to_vec().unwrap();
        for i in 0..values.len() {
            prop_assert_eq!(inclusive[i], values[..=i].iter().sum::<Id>());
            prop_assert_eq!(exclusive[i], values[..i].iter().sum::<Id>());
        }
    }

    #[test]
    fn prop_compaction_keeps_order(stencil in stencil_strategy()) {
        let input: Vec<Id> = (0..stencil.len() as Id).map(|i| 1000 + i).collect();
        let stencil_handle = ArrayHandle::<Id, StagedDevice>::from_vec(stencil.clone());
        let input_handle = ArrayHandle::from_vec(input.clone());
        let indices = ArrayHandle::new();
        let retained = ArrayHandle::new();
        Staged::stream_compact(&stencil_handle, &indices).unwrap();
        Staged::stream_compact_with_stencil(&input_handle, &stencil_handle, &retained).unwrap();

        let expected_indices: Vec<Id> = (0..stencil.len()).filter(|&i| stencil[i] == 1).map(|i| i as Id).collect();
        let expected_values: Vec<Id> = expected_indices.iter().map(|&i| input[i as usize]).collect();
        prop_assert_eq!(indices.to_vec().unwrap(), expected_indices);
        prop_assert_eq!(retained.to_vec().unwrap(), expected_values);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_parallel_scan_and_compaction(len in 20_000usize..40_000, modulus in 2i64..7) {
        let stencil: Vec<Id> = (0..len as Id).map(|i| i64::from(i % modulus == 0)).collect();
        let handle = ArrayHandle::<Id, ParallelDevice>::from_vec(stencil.clone());

        let indices = ArrayHandle::new();
        Parallel::stream_compact(&handle, &indices).unwrap();
        let expected: Vec<Id> = (0..len as Id).filter(|i| i % modulus == 0).collect();
        prop_assert_eq!(indices.to_vec().unwrap(), expected.clone());

        let sums = ArrayHandle::new();
        let total = Parallel::scan_exclusive(&handle, &sums).unwrap();
        prop_assert_eq!(total, expected.len() as Id);
        let sums = sums.to_vec().unwrap();
        prop_assert_eq!(sums[len - 1], total - stencil[len - 1]);
    }

    #[test]
    fn prop_parallel_unique_after_sort(len in 20_000usize..40_000, distinct in 1i64..500) {
        let handle = ArrayHandle::<Id, ParallelDevice>::from_vec((0..len as Id).map(|i| (i * 7919) % distinct).collect());
        Parallel::sort(&handle).unwrap();
        Parallel::unique(&handle).unwrap();
        prop_assert_eq!(handle.to_vec().unwrap(), (0..distinct.min(len as Id)).collect::<Vec<_>>());
    }
}
