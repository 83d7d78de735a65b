//! Multi-core device backed by the rayon worker pool
//!
//! Shares host memory with the control environment, so preparing arrays never
//! copies. Work smaller than [`PARALLEL_THRESHOLD`] runs inline.

use crate::backend::DeviceAdapter;
use crate::backends::common::parallel;
use crate::backends::common::SharedMirror;
use crate::error::Result;
use crate::error_message::ErrorMessageBuffer;
use crate::types::{Id, Value};
use std::cmp::Ordering;
use std::ops::Add;

pub use crate::backends::common::parallel::{PARALLEL_CHUNK_SIZE, PARALLEL_THRESHOLD};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParallelDevice;

/// Forwards the slice primitives of a rayon-backed device to
/// [`crate::backends::common::parallel`].
macro_rules! rayon_primitives {
    () => {
        fn schedule<F>(functor: F, len: usize) -> Result<()>
        where
            F: Fn(usize, ErrorMessageBuffer<'_>) + Sync,
        {
            parallel::schedule(&functor, len)
        }

        fn copy<T: Value>(input: &[T], output: &mut [T]) {
            parallel::copy(input, output)
        }

        fn sort_by<T, C>(values: &mut [T], compare: C)
        where
            T: Value,
            C: Fn(&T, &T) -> Ordering + Sync,
        {
            parallel::sort_by(values, compare)
        }

        fn sort_by_key<K, V, C>(keys: &mut [K], values: &mut [V], compare: C)
        where
            K: Value,
            V: Value,
            C: Fn(&K, &K) -> Ordering + Sync,
        {
            parallel::sort_by_key(keys, values, compare)
        }

        fn unique_by<T, P>(values: &mut [T], same: P) -> usize
        where
            T: Value,
            P: Fn(&T, &T) -> bool + Sync,
        {
            parallel::unique_by(values, same)
        }

        fn lower_bounds_by<T, C>(sorted: &[T], values: &[T], output: &mut [Id], compare: C)
        where
            T: Value,
            C: Fn(&T, &T) -> Ordering + Sync,
        {
            parallel::lower_bounds_by(sorted, values, output, compare)
        }

        fn upper_bounds_by<T, C>(sorted: &[T], values: &[T], output: &mut [Id], compare: C)
        where
            T: Value,
            C: Fn(&T, &T) -> Ordering + Sync,
        {
            parallel::upper_bounds_by(sorted, values, output, compare)
        }

        fn scan_inclusive<T>(values: &mut [T]) -> T
        where
            T: Value + Add<Output = T>,
        {
            parallel::scan_inclusive(values)
        }

        fn scan_exclusive<T>(values: &mut [T]) -> T
        where
            T: Value + Add<Output = T>,
        {
            parallel::scan_exclusive(values)
        }

        fn count_truthy<T>(values: &[T]) -> usize
        where
            T: Value + PartialEq,
        {
            parallel::count_truthy(values)
        }

        fn compact_indices<T>(stencil: &[T], output: &mut [Id])
        where
            T: Value + PartialEq,
        {
            parallel::compact_indices(stencil, output)
        }

        fn compact_values<T, S>(input: &[T], stencil: &[S], output: &mut [T])
        where
            T: Value,
            S: Value + PartialEq,
        {
            parallel::compact_values(input, stencil, output)
        }
    };
}

pub(crate) use rayon_primitives;

impl DeviceAdapter for ParallelDevice {
    const NAME: &'static str = "parallel";
    const SHARES_CONTROL_MEMORY: bool = true;

    type Mirror<T: Value> = SharedMirror<T>;

    rayon_primitives!();
}
