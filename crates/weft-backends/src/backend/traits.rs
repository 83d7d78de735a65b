//! Device adapter and execution mirror traits
//!
//! A device adapter is a zero-sized tag type selected at compile time. It
//! names the execution mirror used for each array and provides the parallel
//! primitives every algorithm and dispatch is built from.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 DeviceAdapter (tag type)                  │
//! │  - schedule / schedule_3d                                 │
//! │  - copy, sort, unique, bounds, scan, compaction           │
//! │  - Mirror<T>: ExecutionMirror<T>                          │
//! └────────────────────────┬─────────────────────────────────┘
//!                          │
//!         ┌────────────────┼────────────────┐
//!         ▼                ▼                ▼
//!   ┌───────────┐    ┌───────────┐    ┌───────────┐
//!   │  Serial   │    │ Parallel  │    │  Staged   │
//!   │ (shared)  │    │ (shared)  │    │ (copies)  │
//!   └───────────┘    └───────────┘    └───────────┘
//! ```
//!
//! The slice primitives take plain slices. Callers obtain them from portals
//! under the exclusivity rules documented on [`crate::ArrayPortal`].

use crate::backends::common;
use crate::buffer::Container;
use crate::error::{BackendError, Result};
use crate::error_message::ErrorMessageBuffer;
use crate::portal::{ArrayPortal, ArrayPortalConst};
use crate::types::{is_truthy, Id, Id3, Index3, TransferCounts, Value};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;

/// Execution-side storage for one array.
///
/// Devices that share the host address space alias the control [`Container`]
/// allocation; other devices own a separate allocation and copy explicitly.
pub trait ExecutionMirror<T: Value>: Default + Send + Sync {
    /// Make the values of `container` available in the execution environment.
    fn load_data_for_input(&mut self, container: &Container<T>) -> Result<()>;

    /// Allocate exactly `len` values for output.
    ///
    /// Shared-memory mirrors also resize `container` and alias it.
    fn allocate_array_for_output(&mut self, container: &mut Container<T>, len: usize) -> Result<()>;

    /// Make `container` hold the current execution values.
    fn retrieve_output_data(&self, container: &mut Container<T>) -> Result<()>;

    /// Truncate to `len` values. Fails if `len` exceeds the current size.
    fn shrink(&mut self, len: usize) -> Result<()>;

    /// Copy the execution values into the front of `destination`.
    fn copy_into(&self, destination: &mut [T]) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn portal(&self) -> ArrayPortal<T>;

    fn portal_const(&self) -> ArrayPortalConst<T> {
        self.portal().into_const()
    }

    /// Free execution memory that is not shared with the control environment.
    fn release_resources(&mut self);

    /// Explicit host/device copies made so far.
    fn transfer_counts(&self) -> TransferCounts {
        TransferCounts::default()
    }
}

/// Compile-time selected execution backend.
///
/// Every method is an associated function: the adapter carries no state, so an
/// array handle or dispatcher is bound to a device purely by its type.
pub trait DeviceAdapter: Copy + Default + fmt::Debug + Send + Sync + 'static {
    /// Short name used in logs.
    const NAME: &'static str;

    /// True when execution memory is the control memory.
    const SHARES_CONTROL_MEMORY: bool;

    type Mirror<T: Value>: ExecutionMirror<T>;

    /// Invoke `functor` once for every index in `0..len`.
    ///
    /// Indices run in an unspecified order, possibly concurrently. Returns once
    /// every index has run or an error has been latched; a latched error (or a
    /// panic inside `functor`) surfaces as [`BackendError::Execution`].
    fn schedule<F>(functor: F, len: usize) -> Result<()>
    where
        F: Fn(usize, ErrorMessageBuffer<'_>) + Sync;

    /// Invoke `functor` once for every cell of a three-dimensional extent.
    fn schedule_3d<F>(functor: F, extent: Id3) -> Result<()>
    where
        F: Fn(Index3, ErrorMessageBuffer<'_>) + Sync,
    {
        let len = extent
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| BackendError::execution(format!("schedule extent {extent:?} overflows usize")))?;
        Self::schedule(move |flat, errors| functor(Index3::from_flat(flat, extent), errors), len)
    }

    /// Block until outstanding work has finished.
    fn synchronize() {}

    fn copy<T: Value>(input: &[T], output: &mut [T]) {
        output.copy_from_slice(input);
    }

    /// Sort in place; equal elements keep their relative order.
    fn sort_by<T, C>(values: &mut [T], compare: C)
    where
        T: Value,
        C: Fn(&T, &T) -> Ordering + Sync,
    {
        values.sort_by(compare);
    }

    /// Sort `keys` and apply the same permutation to `values`.
    fn sort_by_key<K, V, C>(keys: &mut [K], values: &mut [V], compare: C)
    where
        K: Value,
        V: Value,
        C: Fn(&K, &K) -> Ordering + Sync,
    {
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by(|&a, &b| compare(&keys[a], &keys[b]));
        common::apply_permutation(&order, keys, values);
    }

    /// Collapse runs of adjacent elements for which `same` holds into their
    /// first element. Returns the retained count.
    fn unique_by<T, P>(values: &mut [T], same: P) -> usize
    where
        T: Value,
        P: Fn(&T, &T) -> bool + Sync,
    {
        common::unique_serial(values, &same)
    }

    /// `output[i]` = first position in `sorted` where `values[i]` could be
    /// inserted keeping the order.
    fn lower_bounds_by<T, C>(sorted: &[T], values: &[T], output: &mut [Id], compare: C)
    where
        T: Value,
        C: Fn(&T, &T) -> Ordering + Sync,
    {
        for (slot, value) in output.iter_mut().zip(values) {
            *slot = common::lower_bound(sorted, value, &compare);
        }
    }

    /// `output[i]` = last position in `sorted` where `values[i]` could be
    /// inserted keeping the order.
    fn upper_bounds_by<T, C>(sorted: &[T], values: &[T], output: &mut [Id], compare: C)
    where
        T: Value,
        C: Fn(&T, &T) -> Ordering + Sync,
    {
        for (slot, value) in output.iter_mut().zip(values) {
            *slot = common::upper_bound(sorted, value, &compare);
        }
    }

    /// Replace every element with the running sum up to and including it.
    /// Returns the total.
    ///
    /// Sums use `T`'s `+`: integer overflow panics in debug builds and wraps
    /// in release builds.
    fn scan_inclusive<T>(values: &mut [T]) -> T
    where
        T: Value + Add<Output = T>,
    {
        common::scan_inclusive_serial(values, T::default())
    }

    /// Replace every element with the running sum of the elements before it.
    /// Returns the total. Overflow behaves as in [`Self::scan_inclusive`].
    fn scan_exclusive<T>(values: &mut [T]) -> T
    where
        T: Value + Add<Output = T>,
    {
        common::scan_exclusive_serial(values, T::default())
    }

    fn count_truthy<T>(values: &[T]) -> usize
    where
        T: Value + PartialEq,
    {
        values.iter().filter(|value| is_truthy(*value)).count()
    }

    /// Write the indices of truthy `stencil` entries, in order.
    ///
    /// `output` must hold exactly [`Self::count_truthy`] entries.
    fn compact_indices<T>(stencil: &[T], output: &mut [Id])
    where
        T: Value + PartialEq,
    {
        common::compact_serial(stencil, 0, output, |index, _| index as Id);
    }

    /// Write the `input` values whose `stencil` entry is truthy, in order.
    fn compact_values<T, S>(input: &[T], stencil: &[S], output: &mut [T])
    where
        T: Value,
        S: Value + PartialEq,
    {
        common::compact_serial(stencil, 0, output, |index, _| input[index]);
    }
}
