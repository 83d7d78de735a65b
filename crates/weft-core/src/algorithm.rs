//! Device algorithms on array handles
//!
//! [`Algorithm<D>`] lifts the slice primitives of a [`DeviceAdapter`] to
//! [`ArrayHandle`]s: it prepares every argument for the execution
//! environment, runs the primitive on the prepared allocations and leaves
//! outputs execution-valid. Control memory is refreshed lazily on the next
//! control-side read.
//!
//! Outputs are always prepared after inputs. Output preparation hands out a
//! fresh allocation while input portals keep their own alive, so an output
//! may be the same handle as an input.
//!
//! # Usage
//!
//! ```rust
//! use weft_core::{Algorithm, ArrayHandle, SerialDevice};
//!
//! let values = ArrayHandle::<i64, SerialDevice>::from_vec(vec![3, 1, 3, 2, 1]);
//! Algorithm::<SerialDevice>::sort(&values)?;
//! Algorithm::<SerialDevice>::unique(&values)?;
//! assert_eq!(values.to_vec()?, vec![1, 2, 3]);
//!
//! let sums = ArrayHandle::new();
//! let total = Algorithm::<SerialDevice>::scan_inclusive(&values, &sums)?;
//! assert_eq!(total, 6);
//! assert_eq!(sums.to_vec()?, vec![1, 3, 6]);
//! # Ok::<(), weft_core::Error>(())
//! ```

use crate::array_handle::ArrayHandle;
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::ops::Add;
use weft_backends::{
    contain_panics, ArrayPortal, DefaultDevice, DeviceAdapter, ErrorMessageBuffer, Id, Id3, Index3, Value,
};
use weft_tracing::perf_span;

/// Ascending order through `PartialOrd`; incomparable pairs compare equal.
fn ascending<T: PartialOrd>(a: &T, b: &T) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Algorithms for device `D`. Never instantiated; every operation is an
/// associated function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Algorithm<D: DeviceAdapter = DefaultDevice> {
    _device: PhantomData<D>,
}

impl<D: DeviceAdapter> Algorithm<D> {
    /// Run `functor` once per index in `0..len`; see [`DeviceAdapter::schedule`].
    pub fn schedule<F>(functor: F, len: usize) -> Result<()>
    where
        F: Fn(usize, ErrorMessageBuffer<'_>) + Sync,
    {
        let _span = perf_span!("schedule", device = D::NAME, len = len);
        D::schedule(functor, len)?;
        Ok(())
    }

    pub fn schedule_3d<F>(functor: F, extent: Id3) -> Result<()>
    where
        F: Fn(Index3, ErrorMessageBuffer<'_>) + Sync,
    {
        let _span = perf_span!("schedule_3d", device = D::NAME, len = extent.iter().product::<usize>());
        D::schedule_3d(functor, extent)?;
        Ok(())
    }

    /// Make `output` an execution-side copy of `input`, resized to match.
    pub fn copy<T: Value>(input: &ArrayHandle<T, D>, output: &ArrayHandle<T, D>) -> Result<()> {
        if input.ptr_eq(output) {
            input.prepare_for_input()?;
            return Ok(());
        }
        let source = input.prepare_for_input()?;
        let _span = perf_span!("copy", device = D::NAME, len = source.len());
        let destination = output.prepare_for_output(source.len())?;
        // SAFETY: `destination` is a fresh allocation owned by `output`;
        // nothing else reads or writes either side during the copy.
        unsafe { D::copy(source.as_slice(), destination.as_mut_slice()) };
        Ok(())
    }

    /// Sort in place, ascending.
    pub fn sort<T: Value + PartialOrd>(values: &ArrayHandle<T, D>) -> Result<()> {
        Self::sort_by(values, ascending)
    }

    /// Sort in place with `compare`. Equal elements keep their order.
    pub fn sort_by<T, C>(values: &ArrayHandle<T, D>, compare: C) -> Result<()>
    where
        T: Value,
        C: Fn(&T, &T) -> Ordering + Sync,
    {
        let portal = values.prepare_for_in_place()?;
        let _span = perf_span!("sort", device = D::NAME, len = portal.len());
        // SAFETY: the portal is the only accessor while the sort runs.
        unsafe { D::sort_by(portal.as_mut_slice(), compare) };
        Ok(())
    }

    /// Sort `keys` ascending and apply the same permutation to `values`.
    pub fn sort_by_key<K, V>(keys: &ArrayHandle<K, D>, values: &ArrayHandle<V, D>) -> Result<()>
    where
        K: Value + PartialOrd,
        V: Value,
    {
        Self::sort_by_key_with(keys, values, ascending)
    }

    pub fn sort_by_key_with<K, V, C>(keys: &ArrayHandle<K, D>, values: &ArrayHandle<V, D>, compare: C) -> Result<()>
    where
        K: Value,
        V: Value,
        C: Fn(&K, &K) -> Ordering + Sync,
    {
        if keys.state_addr() == values.state_addr() {
            return Err(Error::bad_value("sort_by_key needs distinct key and value arrays"));
        }
        let (key_count, value_count) = (keys.number_of_values(), values.number_of_values());
        if key_count != value_count {
            return Err(Error::bad_value(format!(
                "sort_by_key given {key_count} keys and {value_count} values"
            )));
        }

        let key_portal = keys.prepare_for_in_place()?;
        let value_portal = values.prepare_for_in_place()?;
        let _span = perf_span!("sort_by_key", device = D::NAME, len = key_portal.len());
        // SAFETY: distinct handles own distinct allocations; each portal is the
        // only accessor of its allocation while the sort runs.
        unsafe { D::sort_by_key(key_portal.as_mut_slice(), value_portal.as_mut_slice(), compare) };
        Ok(())
    }

    /// Collapse runs of equal adjacent values and shrink to the retained count.
    pub fn unique<T: Value + PartialEq>(values: &ArrayHandle<T, D>) -> Result<()> {
        Self::unique_by(values, |a: &T, b: &T| a == b)
    }

    pub fn unique_by<T, P>(values: &ArrayHandle<T, D>, same: P) -> Result<()>
    where
        T: Value,
        P: Fn(&T, &T) -> bool + Sync,
    {
        let portal = values.prepare_for_in_place()?;
        let _span = perf_span!("unique", device = D::NAME, len = portal.len());
        // SAFETY: the portal is the only accessor while unique runs.
        let retained = unsafe { D::unique_by(portal.as_mut_slice(), same) };
        drop(portal);
        values.shrink_execution(retained)?;
        tracing::trace!(device = D::NAME, retained, "unique complete");
        Ok(())
    }

    /// For every element of `values`, the first position of `sorted` where it
    /// could be inserted keeping the order. `output` is resized to
    /// `values.len()`.
    pub fn lower_bounds<T: Value + PartialOrd>(
        sorted: &ArrayHandle<T, D>,
        values: &ArrayHandle<T, D>,
        output: &ArrayHandle<Id, D>,
    ) -> Result<()> {
        Self::lower_bounds_by(sorted, values, output, ascending)
    }

    pub fn lower_bounds_by<T, C>(
        sorted: &ArrayHandle<T, D>,
        values: &ArrayHandle<T, D>,
        output: &ArrayHandle<Id, D>,
        compare: C,
    ) -> Result<()>
    where
        T: Value,
        C: Fn(&T, &T) -> Ordering + Sync,
    {
        let sorted = sorted.prepare_for_input()?;
        let values = values.prepare_for_input()?;
        let _span = perf_span!("lower_bounds", device = D::NAME, len = values.len());
        let output = output.prepare_for_output(values.len())?;
        // SAFETY: inputs are read-only for the duration; `output` is fresh.
        unsafe { D::lower_bounds_by(sorted.as_slice(), values.as_slice(), output.as_mut_slice(), compare) };
        Ok(())
    }

    /// Replace every element of `values_output` with its lower bound in `sorted`.
    pub fn lower_bounds_in_place(sorted: &ArrayHandle<Id, D>, values_output: &ArrayHandle<Id, D>) -> Result<()> {
        Self::lower_bounds(sorted, values_output, values_output)
    }

    /// Like [`Self::lower_bounds`], using the last valid insertion position.
    pub fn upper_bounds<T: Value + PartialOrd>(
        sorted: &ArrayHandle<T, D>,
        values: &ArrayHandle<T, D>,
        output: &ArrayHandle<Id, D>,
    ) -> Result<()> {
        Self::upper_bounds_by(sorted, values, output, ascending)
    }

    pub fn upper_bounds_by<T, C>(
        sorted: &ArrayHandle<T, D>,
        values: &ArrayHandle<T, D>,
        output: &ArrayHandle<Id, D>,
        compare: C,
    ) -> Result<()>
    where
        T: Value,
        C: Fn(&T, &T) -> Ordering + Sync,
    {
        let sorted = sorted.prepare_for_input()?;
        let values = values.prepare_for_input()?;
        let _span = perf_span!("upper_bounds", device = D::NAME, len = values.len());
        let output = output.prepare_for_output(values.len())?;
        // SAFETY: inputs are read-only for the duration; `output` is fresh.
        unsafe { D::upper_bounds_by(sorted.as_slice(), values.as_slice(), output.as_mut_slice(), compare) };
        Ok(())
    }

    pub fn upper_bounds_in_place(sorted: &ArrayHandle<Id, D>, values_output: &ArrayHandle<Id, D>) -> Result<()> {
        Self::upper_bounds(sorted, values_output, values_output)
    }

    /// Running sums including each element. Returns the total; `output` may
    /// be `input`. An overflow that panics (debug builds) is reported as
    /// [`Error::Execution`].
    pub fn scan_inclusive<T>(input: &ArrayHandle<T, D>, output: &ArrayHandle<T, D>) -> Result<T>
    where
        T: Value + Add<Output = T>,
    {
        let _span = perf_span!("scan_inclusive", device = D::NAME, len = input.number_of_values());
        let output = Self::prepare_scan(input, output)?;
        // SAFETY: `output` is a fresh allocation with no other accessor.
        Ok(contain_panics(|| unsafe { D::scan_inclusive(output.as_mut_slice()) })?)
    }

    /// Running sums excluding each element. Returns the total; `output` may
    /// be `input`.
    pub fn scan_exclusive<T>(input: &ArrayHandle<T, D>, output: &ArrayHandle<T, D>) -> Result<T>
    where
        T: Value + Add<Output = T>,
    {
        let _span = perf_span!("scan_exclusive", device = D::NAME, len = input.number_of_values());
        let output = Self::prepare_scan(input, output)?;
        // SAFETY: `output` is a fresh allocation with no other accessor.
        Ok(contain_panics(|| unsafe { D::scan_exclusive(output.as_mut_slice()) })?)
    }

    fn prepare_scan<T: Value>(
        input: &ArrayHandle<T, D>,
        output: &ArrayHandle<T, D>,
    ) -> Result<ArrayPortal<T>> {
        let source = input.prepare_for_input()?;
        let destination = output.prepare_for_output(source.len())?;
        // SAFETY: `destination` is fresh; `source` is only read.
        unsafe { D::copy(source.as_slice(), destination.as_mut_slice()) };
        Ok(destination)
    }

    /// Indices of the truthy elements of `stencil`, in ascending order.
    pub fn stream_compact<T>(stencil: &ArrayHandle<T, D>, output: &ArrayHandle<Id, D>) -> Result<()>
    where
        T: Value + PartialEq,
    {
        let stencil = stencil.prepare_for_input()?;
        let _span = perf_span!("stream_compact", device = D::NAME, len = stencil.len());
        // SAFETY: the stencil is only read.
        let stencil = unsafe { stencil.as_slice() };
        let retained = D::count_truthy(stencil);
        let output = output.prepare_for_output(retained)?;
        // SAFETY: `output` is fresh.
        unsafe { D::compact_indices(stencil, output.as_mut_slice()) };
        Ok(())
    }

    /// Elements of `input` whose `stencil` entry is truthy, order preserved.
    pub fn stream_compact_with_stencil<T, S>(
        input: &ArrayHandle<T, D>,
        stencil: &ArrayHandle<S, D>,
        output: &ArrayHandle<T, D>,
    ) -> Result<()>
    where
        T: Value,
        S: Value + PartialEq,
    {
        let (input_count, stencil_count) = (input.number_of_values(), stencil.number_of_values());
        if input_count != stencil_count {
            return Err(Error::bad_value(format!(
                "stream_compact given {input_count} values and a stencil of {stencil_count}"
            )));
        }

        let input = input.prepare_for_input()?;
        let stencil = stencil.prepare_for_input()?;
        let _span = perf_span!("stream_compact_with_stencil", device = D::NAME, len = stencil.len());
        // SAFETY: the stencil is only read.
        let stencil = unsafe { stencil.as_slice() };
        let retained = D::count_truthy(stencil);
        let output = output.prepare_for_output(retained)?;
        // SAFETY: inputs are only read; `output` is fresh.
        unsafe { D::compact_values(input.as_slice(), stencil, output.as_mut_slice()) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_backends::{SerialDevice, StagedDevice};

    type Serial = Algorithm<SerialDevice>;

    #[test]
    fn test_copy_resizes_output() {
        let input = ArrayHandle::<i64, SerialDevice>::from_vec(vec![1, 2, 3]);
        let output = ArrayHandle::from_vec(vec![0; 10]);
        Serial::copy(&input, &output).unwrap();
        assert_eq!(output.to_vec().unwrap(), vec![1, 2, 3]);
        Serial::copy(&input, &input.clone()).unwrap();
        assert_eq!(input.to_vec().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_copy_onto_itself_prepares_for_execution() {
        let handle = ArrayHandle::<i64, StagedDevice>::from_vec(vec![4, 5, 6]);
        Algorithm::<StagedDevice>::copy(&handle, &handle).unwrap();
        assert!(handle.validity().execution);
        assert_eq!(handle.transfer_counts().host_to_device, 1);
        assert_eq!(handle.to_vec().unwrap(), vec![4, 5, 6]);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_scan_overflow_is_an_execution_error() {
        let input = ArrayHandle::<i64, SerialDevice>::from_vec(vec![i64::MAX, 1]);
        let output = ArrayHandle::new();
        match Serial::scan_inclusive(&input, &output) {
            Err(Error::Execution(message)) => assert!(message.contains("overflow"), "{message}"),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(matches!(Serial::scan_exclusive(&input, &output), Err(Error::Execution(_))));
    }

    #[test]
    fn test_sort_treats_nan_as_equal() {
        let values = ArrayHandle::<f32, SerialDevice>::from_vec(vec![3.0, 1.0, 2.0]);
        Serial::sort(&values).unwrap();
        assert_eq!(values.to_vec().unwrap(), vec![1.0, 2.0, 3.0]);

        let with_nan = ArrayHandle::<f32, SerialDevice>::from_vec(vec![2.0, f32::NAN, 1.0]);
        Serial::sort(&with_nan).unwrap();
        assert_eq!(with_nan.number_of_values(), 3);
    }

    #[test]
    fn test_sort_by_key_rejects_mismatched_lengths() {
        let keys = ArrayHandle::<i64, SerialDevice>::from_vec(vec![2, 1]);
        let values = ArrayHandle::<i64, SerialDevice>::from_vec(vec![1, 2, 3]);
        assert!(matches!(Serial::sort_by_key(&keys, &values), Err(Error::BadValue(_))));
        assert!(matches!(Serial::sort_by_key(&keys, &keys), Err(Error::BadValue(_))));
    }

    #[test]
    fn test_unique_shrinks_handle() {
        let values = ArrayHandle::<i64, StagedDevice>::from_vec(vec![1, 1, 2, 2, 2, 3]);
        Algorithm::<StagedDevice>::unique(&values).unwrap();
        assert_eq!(values.number_of_values(), 3);
        assert_eq!(values.to_vec().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_bounds_in_place() {
        let sorted = ArrayHandle::<Id, SerialDevice>::from_vec(vec![120, 320, 500, 955]);
        let values = ArrayHandle::from_vec(vec![500, 955, 955, 120, 320, 955]);
        Serial::lower_bounds_in_place(&sorted, &values).unwrap();
        assert_eq!(values.to_vec().unwrap(), vec![2, 3, 3, 0, 1, 3]);

        let values = ArrayHandle::from_vec(vec![500, 955, 955, 120, 320, 955]);
        Serial::upper_bounds_in_place(&sorted, &values).unwrap();
        assert_eq!(values.to_vec().unwrap(), vec![3, 4, 4, 1, 2, 4]);
    }

    #[test]
    fn test_scan_into_same_handle() {
        let values = ArrayHandle::<i64, SerialDevice>::from_vec(vec![1, 2, 3, 4]);
        assert_eq!(Serial::scan_exclusive(&values, &values).unwrap(), 10);
        assert_eq!(values.to_vec().unwrap(), vec![0, 1, 3, 6]);
    }

    #[test]
    fn test_stream_compact_on_empty_input() {
        let stencil = ArrayHandle::<i64, SerialDevice>::from_vec(Vec::new());
        let output = ArrayHandle::new();
        Serial::stream_compact(&stencil, &output).unwrap();
        assert_eq!(output.number_of_values(), 0);
    }

    #[test]
    fn test_stream_compact_with_stencil_rejects_mismatch() {
        let input = ArrayHandle::<i64, SerialDevice>::from_vec(vec![1, 2, 3]);
        let stencil = ArrayHandle::<i64, SerialDevice>::from_vec(vec![1, 0]);
        let output = ArrayHandle::new();
        assert!(matches!(
            Serial::stream_compact_with_stencil(&input, &stencil, &output),
            Err(Error::BadValue(_))
        ));
    }

    #[test]
    fn test_schedule_surfaces_execution_error() {
        let result = Serial::schedule(
            |index, errors| {
                if index == 250 {
                    errors.raise_error("Got an error.");
                }
            },
            500,
        );
        assert_eq!(result, Err(Error::Execution("Got an error.".to_string())));
    }
}
