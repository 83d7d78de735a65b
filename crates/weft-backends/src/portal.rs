//! Array portals: the element accessors handed to units of work
//!
//! Portals are cheap to clone and hold an `Arc` to the allocation they view,
//! so a portal stays memory-safe after its handle releases or reallocates.
//! Reads are safe; writes are `unsafe` because the caller must uphold the
//! schedule contract that no two units of work touch the same index.

use crate::buffer::HostBuffer;
use crate::types::Value;
use std::fmt;
use std::sync::Arc;

/// Read-write view onto an execution or control allocation.
pub struct ArrayPortal<T> {
    buffer: Arc<HostBuffer<T>>,
    len: usize,
}

/// Read-only view onto an execution or control allocation.
pub struct ArrayPortalConst<T> {
    buffer: Arc<HostBuffer<T>>,
    len: usize,
}

impl<T> Clone for ArrayPortal<T> {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
            len: self.len,
        }
    }
}

impl<T> Clone for ArrayPortalConst<T> {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
            len: self.len,
        }
    }
}

#[cold]
#[inline(never)]
fn out_of_bounds(index: usize, len: usize) -> ! {
    panic!("index {index} out of bounds for array portal of length {len}")
}

impl<T: Value> ArrayPortal<T> {
    /// View the first `len` values of `buffer` (clamped to its length).
    pub fn new(buffer: Arc<HostBuffer<T>>, len: usize) -> Self {
        let len = len.min(buffer.len());
        Self { buffer, len }
    }

    pub fn empty() -> Self {
        Self::new(Arc::new(HostBuffer::empty()), 0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        if index >= self.len {
            out_of_bounds(index, self.len);
        }
        self.buffer.get(index)
    }

    /// Write one value.
    ///
    /// # Safety
    ///
    /// No other thread may read or write `index` while this call runs. Inside
    /// a schedule this holds when each unit of work writes only its own index.
    #[inline]
    pub unsafe fn set(&self, index: usize, value: T) {
        if index >= self.len {
            out_of_bounds(index, self.len);
        }
        self.buffer.set(index, value);
    }

    /// # Safety
    ///
    /// No element may be written while the slice is alive.
    pub unsafe fn as_slice(&self) -> &[T] {
        &self.buffer.as_slice()[..self.len]
    }

    /// # Safety
    ///
    /// The caller must be the only accessor of the viewed values while the
    /// slice is alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut_slice(&self) -> &mut [T] {
        &mut self.buffer.as_mut_slice()[..self.len]
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(move |index| self.buffer.get(index))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn as_const(&self) -> ArrayPortalConst<T> {
        self.clone().into_const()
    }

    pub fn into_const(self) -> ArrayPortalConst<T> {
        ArrayPortalConst {
            buffer: self.buffer,
            len: self.len,
        }
    }

    /// Identity of the viewed allocation.
    pub fn addr(&self) -> *const () {
        Arc::as_ptr(&self.buffer).cast()
    }
}

impl<T: Value> ArrayPortalConst<T> {
    pub fn new(buffer: Arc<HostBuffer<T>>, len: usize) -> Self {
        ArrayPortal::new(buffer, len).into_const()
    }

    pub fn empty() -> Self {
        ArrayPortal::empty().into_const()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        if index >= self.len {
            out_of_bounds(index, self.len);
        }
        self.buffer.get(index)
    }

    /// # Safety
    ///
    /// No element may be written while the slice is alive.
    pub unsafe fn as_slice(&self) -> &[T] {
        &self.buffer.as_slice()[..self.len]
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(move |index| self.buffer.get(index))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn addr(&self) -> *const () {
        Arc::as_ptr(&self.buffer).cast()
    }
}

impl<T> fmt::Debug for ArrayPortal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayPortal").field("len", &self.len).finish()
    }
}

impl<T> fmt::Debug for ArrayPortalConst<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayPortalConst").field("len", &self.len).finish()
    }
}
