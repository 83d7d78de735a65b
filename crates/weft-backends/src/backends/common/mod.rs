//! Shared backend infrastructure
//!
//! - `shared_mirror` - execution mirror aliasing control memory
//! - `parallel` - rayon implementations of the device primitives
//! - guarded invocation of units of work and the serial building blocks used
//!   by the default [`crate::DeviceAdapter`] methods

pub mod parallel;
pub mod shared_mirror;

pub use shared_mirror::SharedMirror;

use crate::error::{BackendError, Result};
use crate::error_message::{ErrorMessageBuffer, ErrorSlot, UNEXPECTED_ERROR_MESSAGE};
use crate::types::{is_truthy, Id, Value};
use std::any::Any;
use std::cmp::Ordering;
use std::ops::Add;
use std::panic::{self, AssertUnwindSafe};

/// Text carried by a panic payload, if it has any.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        UNEXPECTED_ERROR_MESSAGE
    }
}

/// Run one unit of work, latching a panic into `errors` instead of unwinding
/// into the scheduler.
#[inline]
pub(crate) fn run_guarded<F>(functor: &F, index: usize, errors: ErrorMessageBuffer<'_>)
where
    F: Fn(usize, ErrorMessageBuffer<'_>) + Sync,
{
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| functor(index, errors))) {
        errors.raise_error(panic_message(payload.as_ref()));
    }
}

/// Run a primitive on the calling thread, turning a panic (an integer
/// overflow in a debug build, a panicking comparator) into
/// [`BackendError::Execution`].
pub fn contain_panics<R>(operation: impl FnOnce() -> R) -> Result<R> {
    panic::catch_unwind(AssertUnwindSafe(operation))
        .map_err(|payload| BackendError::execution(panic_message(payload.as_ref())))
}

/// Sequential schedule loop; stops early once an error is latched.
pub(crate) fn schedule_serial<F>(functor: &F, len: usize) -> Result<()>
where
    F: Fn(usize, ErrorMessageBuffer<'_>) + Sync,
{
    let slot = ErrorSlot::new();
    let errors = slot.buffer();
    for index in 0..len {
        if errors.is_raised() {
            break;
        }
        run_guarded(functor, index, errors);
    }
    slot.check()
}

pub(crate) fn lower_bound<T, C>(sorted: &[T], value: &T, compare: &C) -> Id
where
    C: Fn(&T, &T) -> Ordering,
{
    sorted.partition_point(|probe| compare(probe, value) == Ordering::Less) as Id
}

pub(crate) fn upper_bound<T, C>(sorted: &[T], value: &T, compare: &C) -> Id
where
    C: Fn(&T, &T) -> Ordering,
{
    sorted.partition_point(|probe| compare(probe, value) != Ordering::Greater) as Id
}

/// Reorder `keys` and `values` so that position `i` holds the element that was
/// at `order[i]`.
pub(crate) fn apply_permutation<K: Value, V: Value>(order: &[usize], keys: &mut [K], values: &mut [V]) {
    let sorted_keys: Vec<K> = order.iter().map(|&i| keys[i]).collect();
    let sorted_values: Vec<V> = order.iter().map(|&i| values[i]).collect();
    keys.copy_from_slice(&sorted_keys);
    values.copy_from_slice(&sorted_values);
}

/// Keep the first element of every run of adjacent elements related by `same`.
///
/// Each element is compared with its original predecessor, matching the
/// parallel implementation that flags run heads independently.
pub(crate) fn unique_serial<T, P>(values: &mut [T], same: &P) -> usize
where
    T: Value,
    P: Fn(&T, &T) -> bool,
{
    let Some(&first) = values.first() else {
        return 0;
    };
    let mut previous = first;
    let mut retained = 1;
    for read in 1..values.len() {
        let current = values[read];
        if !same(&previous, &current) {
            values[retained] = current;
            retained += 1;
        }
        previous = current;
    }
    retained
}

pub(crate) fn scan_inclusive_serial<T>(values: &mut [T], seed: T) -> T
where
    T: Value + Add<Output = T>,
{
    let mut running = seed;
    for value in values.iter_mut() {
        running = running + *value;
        *value = running;
    }
    running
}

pub(crate) fn scan_exclusive_serial<T>(values: &mut [T], seed: T) -> T
where
    T: Value + Add<Output = T>,
{
    let mut running = seed;
    for value in values.iter_mut() {
        let current = *value;
        *value = running;
        running = running + current;
    }
    running
}

/// Emit `emit(base + i, &stencil[i])` for every truthy stencil entry, in order.
pub(crate) fn compact_serial<S, O, E>(stencil: &[S], base: usize, output: &mut [O], emit: E)
where
    S: Value + PartialEq,
    E: Fn(usize, &S) -> O,
{
    let mut write = 0;
    for (offset, entry) in stencil.iter().enumerate() {
        if is_truthy(entry) {
            output[write] = emit(base + offset, entry);
            write += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_is_latched_with_its_message() {
        let result = schedule_serial(
            &|index: usize, _errors: ErrorMessageBuffer<'_>| {
                if index == 3 {
                    panic!("bad index {index}");
                }
            },
            10,
        );
        assert_eq!(result, Err(BackendError::Execution("bad index 3".to_string())));
    }

    #[test]
    fn test_non_text_panic_uses_generic_message() {
        let result = schedule_serial(
            &|_index: usize, _errors: ErrorMessageBuffer<'_>| std::panic::panic_any(42u32),
            1,
        );
        assert_eq!(result, Err(BackendError::Execution(UNEXPECTED_ERROR_MESSAGE.to_string())));
    }

    #[test]
    fn test_contain_panics_reports_message() {
        assert_eq!(contain_panics(|| 5), Ok(5));
        let result: Result<()> = contain_panics(|| panic!("comparator failed"));
        assert_eq!(result, Err(BackendError::Execution("comparator failed".to_string())));
    }

    #[test]
    fn test_bounds_on_random_data() {
        let sorted = [120i64, 320, 500, 955];
        let cmp = |a: &i64, b: &i64| a.cmp(b);
        let lower: Vec<Id> = [500, 955, 955, 120, 320, 955]
            .iter()
            .map(|v| lower_bound(&sorted, v, &cmp))
            .collect();
        let upper: Vec<Id> = [500, 955, 955, 120, 320, 955]
            .iter()
            .map(|v| upper_bound(&sorted, v, &cmp))
            .collect();
        assert_eq!(lower, vec![2, 3, 3, 0, 1, 3]);
        assert_eq!(upper, vec![3, 4, 4, 1, 2, 4]);
    }

    #[test]
    fn test_unique_keeps_run_heads() {
        let mut values = [1i64, 1, 2, 2, 2, 3, 1, 1];
        let retained = unique_serial(&mut values, &|a: &i64, b: &i64| a == b);
        assert_eq!(&values[..retained], &[1, 2, 3, 1]);
    }

    #[test]
    fn test_scans_return_total() {
        let mut inclusive = [1i64, 2, 3, 4];
        assert_eq!(scan_inclusive_serial(&mut inclusive, 0), 10);
        assert_eq!(inclusive, [1, 3, 6, 10]);

        let mut exclusive = [1i64, 2, 3, 4];
        assert_eq!(scan_exclusive_serial(&mut exclusive, 0), 10);
        assert_eq!(exclusive, [0, 1, 3, 6]);
    }

    #[test]
    fn test_compact_emits_offset_indices() {
        let stencil = [0i64, 1, 0, 1, 1];
        let mut output = [0 as Id; 3];
        compact_serial(&stencil, 100, &mut output, |index, _| index as Id);
        assert_eq!(output, [101, 103, 104]);
    }
}
