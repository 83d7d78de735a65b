//! Single-threaded reference device
//!
//! Runs every index in order on the calling thread and uses the default
//! (sequential) primitives of [`DeviceAdapter`]. Execution memory is the
//! control memory.

use crate::backend::DeviceAdapter;
use crate::backends::common::{self, SharedMirror};
use crate::error::Result;
use crate::error_message::ErrorMessageBuffer;
use crate::types::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialDevice;

impl DeviceAdapter for SerialDevice {
    const NAME: &'static str = "serial";
    const SHARES_CONTROL_MEMORY: bool = true;

    type Mirror<T: Value> = SharedMirror<T>;

    fn schedule<F>(functor: F, len: usize) -> Result<()>
    where
        F: Fn(usize, ErrorMessageBuffer<'_>) + Sync,
    {
        common::schedule_serial(&functor, len)
    }
}
