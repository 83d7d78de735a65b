//! Element and index types shared by every device adapter

use std::fmt;

/// Element types that can live in an array handle.
///
/// Blanket-implemented for every plain-data type; `Default` provides both the
/// fill value of fresh allocations and the "false" value for stencils.
pub trait Value: Copy + Default + fmt::Debug + Send + Sync + 'static {}

impl<T> Value for T where T: Copy + Default + fmt::Debug + Send + Sync + 'static {}

/// Index-valued data (compaction output, search results, permutations)
pub type Id = i64;

/// Floating point field values
pub type Scalar = f32;

/// Three-component vector field values
pub type Vector3 = [Scalar; 3];

/// Extent of a three-dimensional schedule
pub type Id3 = [usize; 3];

/// Position of one unit of work in a three-dimensional schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Index3 {
    /// `[i, j, k]` coordinate inside the extent
    pub ijk: Id3,
    /// `i + nx * (j + ny * k)`
    pub flat: usize,
}

impl Index3 {
    /// Decompose a flat index for the given extent.
    pub fn from_flat(flat: usize, extent: Id3) -> Self {
        let nx = extent[0].max(1);
        let ny = extent[1].max(1);
        Self {
            ijk: [flat % nx, (flat / nx) % ny, flat / (nx * ny)],
            flat,
        }
    }
}

/// Element is truthy when it differs from `T::default()`.
#[inline]
pub fn is_truthy<T: Value + PartialEq>(value: &T) -> bool {
    *value != T::default()
}

/// Number of explicit copies an execution mirror has made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCounts {
    pub host_to_device: usize,
    pub device_to_host: usize,
}
