//! Device adapter interface
//!
//! - `traits` - [`DeviceAdapter`] and [`ExecutionMirror`]

pub mod traits;

pub use traits::{DeviceAdapter, ExecutionMirror};
