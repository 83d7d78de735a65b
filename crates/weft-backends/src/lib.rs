//! Device backends for weft
//!
//! This crate provides:
//! - **Host memory**: [`HostBuffer`] allocations, the control-side
//!   [`Container`], and [`ArrayPortal`] accessors
//! - **Failure channel**: [`ErrorMessageBuffer`], the write-once slot that
//!   carries an error out of a parallel schedule
//! - **Device adapter trait**: [`DeviceAdapter`] and [`ExecutionMirror`]
//! - **Devices**: [`SerialDevice`], [`ParallelDevice`] (rayon) and
//!   [`StagedDevice`] (rayon with explicit host/device copies)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          weft-core: ArrayHandle / Algorithm / Dispatch   │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │  D: DeviceAdapter
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │   Container ◄──── ExecutionMirror ────► ArrayPortal      │
//! │   schedule / sort / unique / bounds / scan / compact     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use weft_backends::{DeviceAdapter, SerialDevice};
//!
//! let mut values = vec![3i64, 1, 2];
//! SerialDevice::sort_by(&mut values, |a, b| a.cmp(b));
//! let total = SerialDevice::scan_inclusive(&mut values);
//! assert_eq!(values, vec![1, 3, 6]);
//! assert_eq!(total, 6);
//!
//! let result = SerialDevice::schedule(
//!     |index, errors| {
//!         if index == 2 {
//!             errors.raise_error("index 2 failed");
//!         }
//!     },
//!     5,
//! );
//! assert!(result.is_err());
//! ```

pub mod backend;
pub mod backends;
pub mod buffer;
pub mod error;
pub mod error_message;
pub mod portal;
pub mod types;

pub use backend::{DeviceAdapter, ExecutionMirror};
pub use backends::common::{contain_panics, SharedMirror};
pub use backends::parallel::{PARALLEL_CHUNK_SIZE, PARALLEL_THRESHOLD};
pub use backends::staged::StagedMirror;
pub use backends::{DefaultDevice, ParallelDevice, SerialDevice, StagedDevice};
pub use buffer::{Container, HostBuffer};
pub use error::{BackendError, Result};
pub use error_message::{ErrorMessageBuffer, ErrorSlot, MESSAGE_CAPACITY, UNEXPECTED_ERROR_MESSAGE};
pub use portal::{ArrayPortal, ArrayPortalConst};
pub use types::{is_truthy, Id, Id3, Index3, Scalar, TransferCounts, Value, Vector3};
