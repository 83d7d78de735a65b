//! # weft-core - Dual-Environment Arrays and Worklet Dispatch
//!
//! Data-parallel building blocks over a compile-time selected device.
//!
//! ## Architecture
//!
//! Every array lives in two environments: the **control** environment, where
//! this API runs, and the **execution** environment of the device adapter,
//! where per-element work runs. An [`ArrayHandle`] tracks which copy is valid
//! and moves data only when a consumer on the other side asks for it.
//!
//! ```text
//!  ┌───────────────┐  prepare_for_input / output / in_place   ┌──────────────┐
//!  │  ArrayHandle  │ ───────────────────────────────────────► │ ArrayPortal  │
//!  │ (control env) │ ◄─────────────────────────────────────── │ (execution)  │
//!  └──────┬────────┘        lazy sync on control read         └──────┬───────┘
//!         │                                                          │
//!         ▼                                                          ▼
//!  Algorithm<D>: copy, sort, unique,                   Dispatcher<W, D>: one call
//!  bounds, scan, stream compaction                     of worklet W per element
//! ```
//!
//! ## Key Principles
//!
//! 1. **Compile-time devices**: the device is a type parameter; handles and
//!    dispatchers are bound to it for their whole life.
//! 2. **Lazy transfers**: at most one copy per validity transition.
//! 3. **Bounded failure channel**: errors raised inside a schedule are latched
//!    in a fixed-size, first-write-wins buffer and reported once afterwards.
//!
//! ## Example
//!
//! ```rust
//! use weft_core::{Algorithm, ArrayHandle, Id, ParallelDevice};
//!
//! let data = ArrayHandle::<Id, ParallelDevice>::from_vec((0..500).map(|i| i % 2).collect());
//! let odd = ArrayHandle::new();
//! Algorithm::<ParallelDevice>::stream_compact(&data, &odd)?;
//! assert_eq!(odd.number_of_values(), 250);
//! assert_eq!(odd.to_vec()?[0..3], [1, 3, 5]);
//! # Ok::<(), weft_core::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`array_handle`] - the dual-environment array
//! - [`algorithm`] - device algorithms on handles
//! - [`worklet`], [`signature`], [`arg`], [`dispatcher`] - worklet dispatch
//! - [`topology`] - uniform grids for cell-domain worklets
//! - [`timer`] - device-synchronized wall clock

pub mod algorithm;
pub mod arg;
pub mod array_handle;
pub mod dispatcher;
pub mod error;
pub mod signature;
pub mod timer;
pub mod topology;
pub mod worklet;

pub use algorithm::Algorithm;
pub use arg::{
    ConstantArray, ControlArgument, Domain, ExecutionArgument, FieldPortal, GridCells, Permutation, PermutedField,
    Uniform, UniformField,
};
pub use array_handle::{ArrayHandle, Validity};
pub use dispatcher::{Arguments, Dispatcher};
pub use error::{Error, Result};
pub use signature::{Arg, ExecutionSignature, Fetch, ResultSlot, Slot, _1, _2, _3, _4, _5, _6};
pub use timer::Timer;
pub use topology::{CellVoxel, Extent3, Topology, UniformGrid};
pub use worklet::{ControlTag, WorkContext, Worklet, WorkletCall};

// Device layer re-exports
pub use weft_backends::{
    ArrayPortal, ArrayPortalConst, DefaultDevice, DeviceAdapter, ErrorMessageBuffer, Id, Id3, Index3, ParallelDevice,
    Scalar, SerialDevice, StagedDevice, TransferCounts, Value, Vector3, MESSAGE_CAPACITY,
};
