//! Device adapter implementations
//!
//! - `common` - shared mirror, guarded scheduling and rayon primitives
//! - `serial` - single-threaded reference device
//! - `parallel` - rayon worker pool sharing host memory
//! - `staged` - rayon worker pool with a separate execution allocation

pub mod common;
pub mod parallel;
pub mod serial;
pub mod staged;

pub use parallel::ParallelDevice;
pub use serial::SerialDevice;
pub use staged::StagedDevice;

/// Device used when a handle, algorithm or dispatcher names none.
pub type DefaultDevice = ParallelDevice;
