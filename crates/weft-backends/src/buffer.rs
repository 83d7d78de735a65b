//! Host allocations and the control-environment container
//!
//! A [`HostBuffer`] is a fixed-length allocation of interior-mutable cells that
//! portals read and write concurrently (one writer per index). It is always
//! shared through an `Arc`, so a portal keeps the memory it views alive even
//! after the owning [`Container`] or mirror has moved on to a new allocation.

use crate::error::{BackendError, Result};
use crate::portal::{ArrayPortal, ArrayPortalConst};
use crate::types::Value;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::ManuallyDrop;
use std::sync::Arc;

/// Fixed-length host allocation addressed through portals.
pub struct HostBuffer<T> {
    cells: Vec<UnsafeCell<T>>,
}

// SAFETY: cells are only written through `unsafe` portal methods whose
// contract forbids concurrent access to the same index.
unsafe impl<T: Send> Send for HostBuffer<T> {}
unsafe impl<T: Send + Sync> Sync for HostBuffer<T> {}

impl<T: Value> HostBuffer<T> {
    /// Allocate `len` default-initialized values.
    ///
    /// Fails with [`BackendError::OutOfMemory`] instead of aborting when the
    /// request cannot be satisfied.
    pub fn allocate(len: usize) -> Result<Self> {
        let mut cells: Vec<UnsafeCell<T>> = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|_| BackendError::out_of_memory::<T>(len))?;
        cells.resize_with(len, || UnsafeCell::new(T::default()));
        Ok(Self { cells })
    }

    /// Adopt a vector without copying.
    pub fn from_vec(values: Vec<T>) -> Self {
        let mut values = ManuallyDrop::new(values);
        let (ptr, len, capacity) = (values.as_mut_ptr(), values.len(), values.capacity());
        // SAFETY: UnsafeCell<T> is repr(transparent) over T, so the allocation
        // layout is identical and ownership moves over unchanged.
        let cells = unsafe { Vec::from_raw_parts(ptr.cast::<UnsafeCell<T>>(), len, capacity) };
        Self { cells }
    }

    /// Allocate a copy of the values visible through `source`.
    pub fn copy_of(source: &ArrayPortalConst<T>) -> Result<Self> {
        let buffer = Self::allocate(source.len())?;
        // SAFETY: `buffer` is not shared yet and the source is only read.
        unsafe { buffer.as_mut_slice().copy_from_slice(source.as_slice()) };
        Ok(buffer)
    }

    /// Zero-length buffer.
    pub fn empty() -> Self {
        Self { cells: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> T {
        // SAFETY: writers guarantee exclusive access to the index they write.
        unsafe { *self.cells[index].get() }
    }

    /// # Safety
    ///
    /// No other thread may access `index` concurrently.
    #[inline]
    pub(crate) unsafe fn set(&self, index: usize, value: T) {
        *self.cells[index].get() = value;
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut T {
        UnsafeCell::raw_get(self.cells.as_ptr())
    }

    /// # Safety
    ///
    /// No element may be written while the slice is alive.
    pub(crate) unsafe fn as_slice(&self) -> &[T] {
        std::slice::from_raw_parts(self.as_ptr(), self.len())
    }

    /// # Safety
    ///
    /// The caller must be the only accessor of the buffer while the slice is alive.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn as_mut_slice(&self) -> &mut [T] {
        std::slice::from_raw_parts_mut(self.as_ptr(), self.len())
    }
}

impl<T> fmt::Debug for HostBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuffer").field("len", &self.cells.len()).finish()
    }
}

/// Owning host-memory array of the control environment.
///
/// The allocation may be aliased by an execution mirror on devices that share
/// the host address space.
pub struct Container<T> {
    buffer: Option<Arc<HostBuffer<T>>>,
    len: usize,
}

impl<T> Default for Container<T> {
    fn default() -> Self {
        Self { buffer: None, len: 0 }
    }
}

impl<T> fmt::Debug for Container<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("len", &self.len)
            .field("allocated", &self.buffer.is_some())
            .finish()
    }
}

impl<T: Value> Container<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `values` without copying.
    pub fn from_vec(values: Vec<T>) -> Self {
        let len = values.len();
        Self {
            buffer: Some(Arc::new(HostBuffer::from_vec(values))),
            len,
        }
    }

    /// Replace the contents with `len` default-initialized values.
    ///
    /// Prior contents are discarded. On failure the container is left empty.
    pub fn allocate(&mut self, len: usize) -> Result<()> {
        self.release_resources();
        let buffer = HostBuffer::allocate(len)?;
        self.buffer = Some(Arc::new(buffer));
        self.len = len;
        Ok(())
    }

    /// Free the allocation; the container holds zero values afterwards.
    pub fn release_resources(&mut self) {
        self.buffer = None;
        self.len = 0;
    }

    /// Point this container at (a prefix of) an existing allocation.
    pub fn alias(&mut self, buffer: Arc<HostBuffer<T>>, len: usize) {
        self.len = len.min(buffer.len());
        self.buffer = Some(buffer);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_allocated(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn buffer(&self) -> Option<&Arc<HostBuffer<T>>> {
        self.buffer.as_ref()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        match &self.buffer {
            Some(buffer) if index < self.len => Some(buffer.get(index)),
            _ => None,
        }
    }

    pub fn portal(&self) -> ArrayPortal<T> {
        match &self.buffer {
            Some(buffer) => ArrayPortal::new(Arc::clone(buffer), self.len),
            None => ArrayPortal::empty(),
        }
    }

    pub fn portal_const(&self) -> ArrayPortalConst<T> {
        self.portal().into_const()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.portal_const().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_default_initializes() {
        let buffer = HostBuffer::<f32>::allocate(16).unwrap();
        assert_eq!(buffer.len(), 16);
        assert!((0..16).all(|i| buffer.get(i) == 0.0));
    }

    #[test]
    fn test_allocate_too_large_is_out_of_memory() {
        let result = HostBuffer::<f32>::allocate(0x7FFF_FFFF_FFFF_FFFF);
        assert!(matches!(result, Err(BackendError::OutOfMemory { .. })));
    }

    #[test]
    fn test_from_vec_keeps_values() {
        let buffer = HostBuffer::from_vec(vec![3i64, 1, 4, 1, 5]);
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.get(2), 4);
    }

    #[test]
    fn test_container_allocate_discards_contents() {
        let mut container = Container::from_vec(vec![7i64; 10]);
        assert_eq!(container.len(), 10);

        container.allocate(4).unwrap();
        assert_eq!(container.to_vec(), vec![0; 4]);

        container.release_resources();
        assert_eq!(container.len(), 0);
        assert!(!container.is_allocated());
        assert!(container.to_vec().is_empty());
    }

    #[test]
    fn test_container_alias_shares_memory() {
        let source = Container::from_vec(vec![1i64, 2, 3, 4]);
        let mut alias = Container::new();
        alias.alias(Arc::clone(source.buffer().unwrap()), 2);
        assert_eq!(alias.to_vec(), vec![1, 2]);

        // SAFETY: single-threaded test, no other accessor.
        unsafe { source.portal().set(0, 10) };
        assert_eq!(alias.get(0), Some(10));
        assert_eq!(alias.get(2), None);
    }

    #[test]
    fn test_portal_outlives_reallocation() {
        let mut container = Container::from_vec(vec![5u8; 3]);
        let portal = container.portal_const();
        container.allocate(1).unwrap();
        assert_eq!(portal.to_vec(), vec![5, 5, 5]);
        assert_eq!(container.to_vec(), vec![0]);
    }
}
