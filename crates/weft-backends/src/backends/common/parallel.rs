//! Rayon implementations of the device primitives
//!
//! Inputs shorter than [`PARALLEL_THRESHOLD`] run inline on the calling
//! thread. Larger inputs are split into chunks of at least
//! [`PARALLEL_CHUNK_SIZE`] elements and processed on the global rayon pool
//! (sized by `RAYON_NUM_THREADS`).

use super::{compact_serial, lower_bound, run_guarded, schedule_serial, unique_serial, upper_bound};
use crate::error::Result;
use crate::error_message::{ErrorMessageBuffer, ErrorSlot};
use crate::types::{is_truthy, Id, Value};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::ops::Add;

/// Minimum number of elements before work is split across threads.
pub const PARALLEL_THRESHOLD: usize = 10_000;

/// Minimum number of elements handled by one rayon task.
pub const PARALLEL_CHUNK_SIZE: usize = 3072;

/// Chunk length for `len` elements: at least [`PARALLEL_CHUNK_SIZE`], and
/// about four chunks per worker thread.
fn chunk_len(len: usize) -> usize {
    let target_chunks = rayon::current_num_threads().max(1) * 4;
    len.div_ceil(target_chunks).max(PARALLEL_CHUNK_SIZE)
}

pub(crate) fn schedule<F>(functor: &F, len: usize) -> Result<()>
where
    F: Fn(usize, ErrorMessageBuffer<'_>) + Sync,
{
    if len < PARALLEL_THRESHOLD {
        return schedule_serial(functor, len);
    }

    let slot = ErrorSlot::new();
    let errors = slot.buffer();
    (0..len)
        .into_par_iter()
        .with_min_len(PARALLEL_CHUNK_SIZE)
        .for_each(|index| {
            if !errors.is_raised() {
                run_guarded(functor, index, errors);
            }
        });
    slot.check()
}

pub(crate) fn copy<T: Value>(input: &[T], output: &mut [T]) {
    if input.len() < PARALLEL_THRESHOLD {
        output.copy_from_slice(input);
        return;
    }
    let chunk = chunk_len(input.len());
    output
        .par_chunks_mut(chunk)
        .zip(input.par_chunks(chunk))
        .for_each(|(dst, src)| dst.copy_from_slice(src));
}

pub(crate) fn sort_by<T, C>(values: &mut [T], compare: C)
where
    T: Value,
    C: Fn(&T, &T) -> Ordering + Sync,
{
    if values.len() < PARALLEL_THRESHOLD {
        values.sort_by(compare);
    } else {
        values.par_sort_by(compare);
    }
}

pub(crate) fn sort_by_key<K, V, C>(keys: &mut [K], values: &mut [V], compare: C)
where
    K: Value,
    V: Value,
    C: Fn(&K, &K) -> Ordering + Sync,
{
    let mut order: Vec<usize> = (0..keys.len()).collect();
    {
        let keys: &[K] = keys;
        if keys.len() < PARALLEL_THRESHOLD {
            order.sort_by(|&a, &b| compare(&keys[a], &keys[b]));
        } else {
            order.par_sort_by(|&a, &b| compare(&keys[a], &keys[b]));
        }
    }
    let sorted_keys: Vec<K> = order.par_iter().map(|&i| keys[i]).collect();
    let sorted_values: Vec<V> = order.par_iter().map(|&i| values[i]).collect();
    copy(&sorted_keys, keys);
    copy(&sorted_values, values);
}

pub(crate) fn unique_by<T, P>(values: &mut [T], same: P) -> usize
where
    T: Value,
    P: Fn(&T, &T) -> bool + Sync,
{
    if values.len() < PARALLEL_THRESHOLD {
        return unique_serial(values, &same);
    }

    let heads: Vec<u8> = {
        let values: &[T] = values;
        (0..values.len())
            .into_par_iter()
            .map(|i| u8::from(i == 0 || !same(&values[i - 1], &values[i])))
            .collect()
    };
    let count = count_truthy(&heads);
    let mut retained = vec![T::default(); count];
    compact_values(values, &heads, &mut retained);
    values[..count].copy_from_slice(&retained);
    count
}

pub(crate) fn lower_bounds_by<T, C>(sorted: &[T], values: &[T], output: &mut [Id], compare: C)
where
    T: Value,
    C: Fn(&T, &T) -> Ordering + Sync,
{
    output
        .par_iter_mut()
        .zip(values.par_iter())
        .with_min_len(PARALLEL_CHUNK_SIZE)
        .for_each(|(slot, value)| *slot = lower_bound(sorted, value, &compare));
}

pub(crate) fn upper_bounds_by<T, C>(sorted: &[T], values: &[T], output: &mut [Id], compare: C)
where
    T: Value,
    C: Fn(&T, &T) -> Ordering + Sync,
{
    output
        .par_iter_mut()
        .zip(values.par_iter())
        .with_min_len(PARALLEL_CHUNK_SIZE)
        .for_each(|(slot, value)| *slot = upper_bound(sorted, value, &compare));
}

/// Chunk totals followed by an exclusive scan over them: the seed each chunk
/// starts from.
fn chunk_offsets<T>(values: &[T], chunk: usize) -> (Vec<T>, T)
where
    T: Value + Add<Output = T>,
{
    let totals: Vec<T> = values
        .par_chunks(chunk)
        .map(|part| part.iter().fold(T::default(), |acc, &v| acc + v))
        .collect();
    let mut offsets = totals;
    let total = super::scan_exclusive_serial(&mut offsets, T::default());
    (offsets, total)
}

pub(crate) fn scan_inclusive<T>(values: &mut [T]) -> T
where
    T: Value + Add<Output = T>,
{
    if values.len() < PARALLEL_THRESHOLD {
        return super::scan_inclusive_serial(values, T::default());
    }
    let chunk = chunk_len(values.len());
    let (offsets, total) = chunk_offsets(values, chunk);
    values
        .par_chunks_mut(chunk)
        .zip(offsets.into_par_iter())
        .for_each(|(part, seed)| {
            super::scan_inclusive_serial(part, seed);
        });
    total
}

pub(crate) fn scan_exclusive<T>(values: &mut [T]) -> T
where
    T: Value + Add<Output = T>,
{
    if values.len() < PARALLEL_THRESHOLD {
        return super::scan_exclusive_serial(values, T::default());
    }
    let chunk = chunk_len(values.len());
    let (offsets, total) = chunk_offsets(values, chunk);
    values
        .par_chunks_mut(chunk)
        .zip(offsets.into_par_iter())
        .for_each(|(part, seed)| {
            super::scan_exclusive_serial(part, seed);
        });
    total
}

pub(crate) fn count_truthy<T>(values: &[T]) -> usize
where
    T: Value + PartialEq,
{
    if values.len() < PARALLEL_THRESHOLD {
        return values.iter().filter(|value| is_truthy(*value)).count();
    }
    values
        .par_iter()
        .with_min_len(PARALLEL_CHUNK_SIZE)
        .filter(|value| is_truthy(*value))
        .count()
}

/// Split `output` into the disjoint pieces each stencil chunk writes to.
fn split_by_counts<'a, O>(mut output: &'a mut [O], counts: &[usize]) -> Vec<&'a mut [O]> {
    let mut pieces = Vec::with_capacity(counts.len());
    for &count in counts {
        let (head, tail) = std::mem::take(&mut output).split_at_mut(count);
        pieces.push(head);
        output = tail;
    }
    pieces
}

fn compact_chunked<S, O, E>(stencil: &[S], output: &mut [O], emit: E)
where
    S: Value + PartialEq,
    O: Send,
    E: Fn(usize, &S) -> O + Sync,
{
    if stencil.len() < PARALLEL_THRESHOLD {
        compact_serial(stencil, 0, output, emit);
        return;
    }
    let chunk = chunk_len(stencil.len());
    let counts: Vec<usize> = stencil
        .par_chunks(chunk)
        .map(|part| part.iter().filter(|entry| is_truthy(*entry)).count())
        .collect();
    let pieces = split_by_counts(output, &counts);
    pieces
        .into_par_iter()
        .zip(stencil.par_chunks(chunk))
        .enumerate()
        .for_each(|(index, (piece, part))| compact_serial(part, index * chunk, piece, &emit));
}

pub(crate) fn compact_indices<T>(stencil: &[T], output: &mut [Id])
where
    T: Value + PartialEq,
{
    compact_chunked(stencil, output, |index, _| index as Id);
}

pub(crate) fn compact_values<T, S>(input: &[T], stencil: &[S], output: &mut [T])
where
    T: Value,
    S: Value + PartialEq,
{
    compact_chunked(stencil, output, |index, _| input[index]);
}
