//! Wall-clock timer that waits for device work before reading the clock

use std::marker::PhantomData;
use std::time::Instant;
use weft_backends::{DefaultDevice, DeviceAdapter};

#[derive(Debug, Clone, Copy)]
pub struct Timer<D: DeviceAdapter = DefaultDevice> {
    start: Instant,
    _device: PhantomData<D>,
}

impl<D: DeviceAdapter> Default for Timer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DeviceAdapter> Timer<D> {
    /// Start timing now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            _device: PhantomData,
        }
    }

    pub fn reset(&mut self) {
        D::synchronize();
        self.start = Instant::now();
    }

    /// Seconds since construction or the last reset, after outstanding device
    /// work has finished.
    pub fn elapsed_secs(&self) -> f64 {
        D::synchronize();
        self.start.elapsed().as_secs_f64()
    }
}
