//! Structured topology: uniform grids and their voxel cells
//!
//! A [`UniformGrid`] is described by an origin, a spacing and an inclusive
//! point extent `[min, max]` along each axis. Points and cells are numbered
//! with `i` varying fastest:
//!
//! ```text
//!   point (i, j, k)  ->  i + nx * (j + ny * k)       nx = max - min + 1
//!   cell  (i, j, k)  ->  i + cx * (j + cy * k)       cx = max - min
//! ```

use weft_backends::{Id, Id3, Index3, Vector3};

/// Mesh provider consumed by the dispatcher when a worklet declares a
/// topology slot.
pub trait Topology: Send + Sync {
    fn number_of_points(&self) -> usize;

    fn number_of_cells(&self) -> usize;
}

/// Inclusive point extent of a structured grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent3 {
    pub min: [i64; 3],
    pub max: [i64; 3],
}

impl Extent3 {
    pub fn new(min: [i64; 3], max: [i64; 3]) -> Self {
        Self { min, max }
    }

    /// Points along each axis; zero when `max < min`.
    pub fn point_dimensions(&self) -> Id3 {
        std::array::from_fn(|axis| usize::try_from(self.max[axis] - self.min[axis] + 1).unwrap_or(0))
    }

    /// Cells along each axis; zero when the axis has fewer than two points.
    pub fn cell_dimensions(&self) -> Id3 {
        self.point_dimensions().map(|points| points.saturating_sub(1))
    }
}

/// Axis-aligned grid of evenly spaced points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformGrid {
    pub origin: Vector3,
    pub spacing: Vector3,
    pub extent: Extent3,
}

impl UniformGrid {
    pub fn new(origin: Vector3, spacing: Vector3, extent: Extent3) -> Self {
        Self {
            origin,
            spacing,
            extent,
        }
    }

    pub fn point_dimensions(&self) -> Id3 {
        self.extent.point_dimensions()
    }

    pub fn cell_dimensions(&self) -> Id3 {
        self.extent.cell_dimensions()
    }

    /// World coordinates of point `index`: `origin + spacing * (ijk + min)`.
    pub fn point_coordinates(&self, index: usize) -> Vector3 {
        let ijk = Index3::from_flat(index, self.point_dimensions()).ijk;
        self.coordinates_of(ijk)
    }

    fn coordinates_of(&self, ijk: Id3) -> Vector3 {
        std::array::from_fn(|axis| {
            self.origin[axis] + self.spacing[axis] * (ijk[axis] as i64 + self.extent.min[axis]) as f32
        })
    }

    pub fn cell(&self, index: usize) -> CellVoxel {
        CellVoxel { grid: *self, index }
    }
}

impl Topology for UniformGrid {
    fn number_of_points(&self) -> usize {
        self.point_dimensions().iter().product()
    }

    fn number_of_cells(&self) -> usize {
        self.cell_dimensions().iter().product()
    }
}

/// Vertex offsets of a voxel, in the order its points are reported.
const VOXEL_VERTEX_OFFSETS: [Id3; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// One hexahedral cell of a [`UniformGrid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellVoxel {
    grid: UniformGrid,
    index: usize,
}

impl CellVoxel {
    pub const NUMBER_OF_POINTS: usize = 8;

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn number_of_points(&self) -> usize {
        Self::NUMBER_OF_POINTS
    }

    fn vertex_ijk(&self, vertex: usize) -> Id3 {
        let cell = Index3::from_flat(self.index, self.grid.cell_dimensions()).ijk;
        let offset = VOXEL_VERTEX_OFFSETS[vertex];
        std::array::from_fn(|axis| cell[axis] + offset[axis])
    }

    /// Grid point index of `vertex` (0..8).
    ///
    /// # Panics
    ///
    /// Panics if `vertex >= 8`.
    pub fn point_index(&self, vertex: usize) -> Id {
        let [i, j, k] = self.vertex_ijk(vertex);
        let [nx, ny, _] = self.grid.point_dimensions();
        (i + nx * (j + ny * k)) as Id
    }

    /// World coordinates of `vertex` (0..8).
    pub fn point_coordinates(&self, vertex: usize) -> Vector3 {
        self.grid.coordinates_of(self.vertex_ijk(vertex))
    }

    /// Mean of the eight vertex coordinates.
    pub fn centroid(&self) -> Vector3 {
        let mut sum = [0.0f32; 3];
        for vertex in 0..Self::NUMBER_OF_POINTS {
            let point = self.point_coordinates(vertex);
            for axis in 0..3 {
                sum[axis] += point[axis];
            }
        }
        sum.map(|total| total / Self::NUMBER_OF_POINTS as f32)
    }
}
