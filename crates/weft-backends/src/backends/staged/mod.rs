//! Staged device: rayon execution over a separate address space
//!
//! Models an accelerator whose memory the host cannot address. Arrays are
//! copied into a device-owned allocation when prepared for input and copied
//! back when the control environment next reads them. The primitives are the
//! same rayon implementations used by [`crate::ParallelDevice`].

pub mod memory;

pub use memory::StagedMirror;

use crate::backend::DeviceAdapter;
use crate::backends::common::parallel;
use crate::backends::parallel::rayon_primitives;
use crate::error::Result;
use crate::error_message::ErrorMessageBuffer;
use crate::types::{Id, Value};
use std::cmp::Ordering;
use std::ops::Add;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagedDevice;

impl DeviceAdapter for StagedDevice {
    const NAME: &'static str = "staged";
    const SHARES_CONTROL_MEMORY: bool = false;

    type Mirror<T: Value> = StagedMirror<T>;

    rayon_primitives!();
}
