//! Execution memory for the staged device
//!
//! Each mirror owns an allocation distinct from the control container. Every
//! load is an explicit host-to-device copy and every retrieval an explicit
//! device-to-host copy; both are logged and counted.

use crate::backend::ExecutionMirror;
use crate::buffer::{Container, HostBuffer};
use crate::error::{BackendError, Result};
use crate::portal::ArrayPortal;
use crate::types::{TransferCounts, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use weft_tracing::performance::{record_transfer, TransferDirection};

#[derive(Default)]
pub struct StagedMirror<T> {
    device: Option<Arc<HostBuffer<T>>>,
    len: usize,
    host_to_device: AtomicUsize,
    device_to_host: AtomicUsize,
}

impl<T: Value> StagedMirror<T> {
    fn bytes(len: usize) -> usize {
        len.saturating_mul(std::mem::size_of::<T>())
    }

    fn finish_transfer(&self, direction: TransferDirection, len: usize, start: Instant) {
        let counter = match direction {
            TransferDirection::HostToDevice => &self.host_to_device,
            TransferDirection::DeviceToHost => &self.device_to_host,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        record_transfer(direction, Self::bytes(len), start.elapsed());
    }
}

impl<T: Value> ExecutionMirror<T> for StagedMirror<T> {
    #[tracing::instrument(skip(self, container), fields(len = container.len()))]
    fn load_data_for_input(&mut self, container: &Container<T>) -> Result<()> {
        let start = Instant::now();
        let device = HostBuffer::copy_of(&container.portal_const())?;
        self.device = Some(Arc::new(device));
        self.len = container.len();
        self.finish_transfer(TransferDirection::HostToDevice, self.len, start);
        Ok(())
    }

    fn allocate_array_for_output(&mut self, _container: &mut Container<T>, len: usize) -> Result<()> {
        self.release_resources();
        let device = HostBuffer::allocate(len)?;
        self.device = Some(Arc::new(device));
        self.len = len;
        tracing::trace!(len, bytes = Self::bytes(len), "staged output allocated");
        Ok(())
    }

    #[tracing::instrument(skip(self, container), fields(len = self.len))]
    fn retrieve_output_data(&self, container: &mut Container<T>) -> Result<()> {
        let start = Instant::now();
        let host = HostBuffer::copy_of(&self.portal_const())?;
        container.alias(Arc::new(host), self.len);
        self.finish_transfer(TransferDirection::DeviceToHost, self.len, start);
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
        let start = Instant::now();
        let source = self.portal_const();
        // SAFETY: control-side call, no unit of work is running on this array.
        destination[..self.len].copy_from_slice(unsafe { source.as_slice() });
        self.finish_transfer(TransferDirection::DeviceToHost, self.len, start);
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }

    fn portal(&self) -> ArrayPortal<T> {
        match &self.device {
            Some(buffer) => ArrayPortal::new(Arc::clone(buffer), self.len),
            None => ArrayPortal::empty(),
        }
    }

    fn release_resources(&mut self) {
        self.device = None;
        self.len = 0;
    }

    fn transfer_counts(&self) -> TransferCounts {
        TransferCounts {
            host_to_device: self.host_to_device.load(Ordering::Relaxed),
            device_to_host: self.device_to_host.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_copies_into_separate_allocation() {
        let container = Container::from_vec(vec![1i64, 2, 3]);
        let mut mirror = StagedMirror::default();
        mirror.load_data_for_input(&container).unwrap();

        assert_ne!(mirror.portal().addr(), container.portal().addr());
        assert_eq!(mirror.portal().to_vec(), vec![1, 2, 3]);
        assert_eq!(mirror.transfer_counts().host_to_device, 1);
    }

    #[test]
    fn test_output_leaves_container_untouched() {
        let mut container = Container::from_vec(vec![4i64; 3]);
        let mut mirror = StagedMirror::default();
        mirror.allocate_array_for_output(&mut container, 10).unwrap();
        assert_eq!(container.to_vec(), vec![4, 4, 4]);
        assert_eq!(mirror.len(), 10);
    }

    #[test]
    fn test_retrieve_counts_device_to_host() {
        let mut container = Container::new();
        let mut mirror = StagedMirror::default();
        mirror.allocate_array_for_output(&mut container, 4).unwrap();
        // SAFETY: single-threaded test.
        unsafe { mirror.portal().as_mut_slice().copy_from_slice(&[1i64, 2, 3, 4]) };
        mirror.shrink(3).unwrap();

        mirror.retrieve_output_data(&mut container).unwrap();
        assert_eq!(container.to_vec(), vec![1, 2, 3]);
        assert_ne!(mirror.portal().addr(), container.portal().addr());
        assert_eq!(
            mirror.transfer_counts(),
            TransferCounts {
                host_to_device: 0,
                device_to_host: 1
            }
        );
    }

    #[test]
    fn test_output_allocation_failure_is_reported() {
        let mut container = Container::new();
        let mut mirror = StagedMirror::<f32>::default();
        let result = mirror.allocate_array_for_output(&mut container, 0x7FFF_FFFF_FFFF_FFFF);
        assert!(matches!(result, Err(BackendError::OutOfMemory { .. })));
        assert_eq!(mirror.len(), 0);
    }
}
