//! Execution mirror for devices that address host memory directly
//!
//! The mirror never copies: it aliases the control container's allocation on
//! input, allocates through the container on output, and hands the allocation
//! back on retrieval.

use crate::backend::ExecutionMirror;
use crate::buffer::{Container, HostBuffer};
use crate::error::{BackendError, Result};
use crate::portal::ArrayPortal;
use crate::types::Value;
use std::sync::Arc;

pub struct SharedMirror<T> {
    buffer: Option<Arc<HostBuffer<T>>>,
    len: usize,
}

impl<T> Default for SharedMirror<T> {
    fn default() -> Self {
        Self { buffer: None, len: 0 }
    }
}

impl<T: Value> ExecutionMirror<T> for SharedMirror<T> {
    fn load_data_for_input(&mut self, container: &Container<T>) -> Result<()> {
        self.buffer = container.buffer().cloned();
        self.len = container.len();
        Ok(())
    }

    fn allocate_array_for_output(&mut self, container: &mut Container<T>, len: usize) -> Result<()> {
        self.release_resources();
        container.allocate(len)?;
        self.buffer = container.buffer().cloned();
        self.len = len;
        Ok(())
    }

    fn retrieve_output_data(&self, container: &mut Container<T>) -> Result<()> {
        match &self.buffer {
            Some(buffer) => container.alias(Arc::clone(buffer), self.len),
            None => container.release_resources(),
        }
        Ok(())
    }

    fn shrink(&mut self, len: usize) -> Result<()> {
        if len > self.len {
            return Err(BackendError::ShrinkOutOfRange {
                requested: len,
                size: self.len,
            });
        }
        self.len = len;
        Ok(())
    }

    fn copy_into(&self, destination: &mut [T]) -> Result<()> {
        if destination.len() < self.len {
            return Err(BackendError::LengthMismatch {
                expected: self.len,
                actual: destination.len(),
            });
        }
        for (slot, value) in destination.iter_mut().zip(self.portal_const().iter()) {
            *slot = value;
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }

    fn portal(&self) -> ArrayPortal<T> {
        match &self.buffer {
            Some(buffer) => ArrayPortal::new(Arc::clone(buffer), self.len),
            None => ArrayPortal::empty(),
        }
    }

    fn release_resources(&mut self) {
        self.buffer = None;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_aliases_container() {
        let container = Container::from_vec(vec![1i64, 2, 3]);
        let mut mirror = SharedMirror::default();
        mirror.load_data_for_input(&container).unwrap();
        assert_eq!(mirror.portal().addr(), container.portal().addr());
        assert_eq!(mirror.transfer_counts().host_to_device, 0);
    }

    #[test]
    fn test_output_resizes_container() {
        let mut container = Container::from_vec(vec![9i64; 2]);
        let mut mirror = SharedMirror::default();
        mirror.allocate_array_for_output(&mut container, 5).unwrap();
        assert_eq!(container.len(), 5);
        assert_eq!(mirror.portal().addr(), container.portal().addr());
    }

    #[test]
    fn test_shrink_then_retrieve() {
        let mut container = Container::new();
        let mut mirror = SharedMirror::default();
        mirror.allocate_array_for_output(&mut container, 1000).unwrap();
        let portal = mirror.portal();
        for i in 0..1000 {
            // SAFETY: single-threaded test.
            unsafe { portal.set(i, i as i64) };
        }

        mirror.shrink(500).unwrap();
        assert!(matches!(mirror.shrink(501), Err(BackendError::ShrinkOutOfRange { .. })));

        let mut control = Container::new();
        mirror.retrieve_output_data(&mut control).unwrap();
        assert_eq!(control.len(), 500);

        let mut copied = vec![0i64; 500];
        mirror.copy_into(&mut copied).unwrap();
        assert_eq!(copied, (0..500).collect::<Vec<i64>>());
    }
}
