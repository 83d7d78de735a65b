//! Dispatch arguments
//!
//! Every value passed to [`crate::Dispatcher::invoke`] implements
//! [`ControlArgument`]: it reports how it constrains the work domain for the
//! tag it is bound to, then transfers itself into an [`ExecutionArgument`]
//! that units of work load from and store to.
//!
//! | control argument       | domain                         | execution argument |
//! |------------------------|--------------------------------|--------------------|
//! | `ArrayHandle<T, D>`    | follows its length             | `FieldPortal<T>`   |
//! | scalars, `Uniform<T>`  | any                            | `UniformField<T>`  |
//! | `ConstantArray<T>`     | follows its length             | `UniformField<T>`  |
//! | `Permutation<T, D>`    | follows the index count        | `PermutedField<T>` |
//! | `UniformGrid`          | defines the cell count         | `GridCells`        |

use crate::array_handle::ArrayHandle;
use crate::error::{Error, Result};
use crate::topology::{CellVoxel, Topology, UniformGrid};
use crate::worklet::ControlTag;
use weft_backends::{ArrayPortal, ArrayPortalConst, DeviceAdapter, Id, Value, Vector3};

/// How an argument constrains the number of units of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// The argument is the domain (a topology)
    Defines(usize),
    /// The argument's length must equal the domain length
    Follows(usize),
    /// Used only when nothing else determines the domain (an output's
    /// existing length)
    Hint(usize),
    /// No constraint
    Any,
}

/// Control-side protocol every dispatch argument implements.
pub trait ControlArgument<D: DeviceAdapter> {
    type Exec: ExecutionArgument;

    fn domain(&self, tag: ControlTag) -> Result<Domain>;

    /// Prepare for the execution environment. Outputs are sized to `len`.
    fn transfer(&self, tag: ControlTag, len: usize) -> Result<Self::Exec>;
}

/// Execution-side accessor bound into a dispatch.
pub trait ExecutionArgument: Send + Sync {
    type Value;

    fn load(&self, index: usize) -> Self::Value;

    /// # Safety
    ///
    /// No other unit of work may access the element behind `index` while this
    /// call runs.
    unsafe fn store(&self, index: usize, value: Self::Value);
}

fn unsupported(tag: ControlTag, what: &str) -> Error {
    Error::bad_value(format!("{what} cannot be bound to a {tag:?} slot"))
}

#[cold]
fn read_only(what: &str) -> ! {
    panic!("attempted to write through read-only {what}")
}

/// Prepared array handle.
#[derive(Debug, Clone)]
pub enum FieldPortal<T> {
    Input(ArrayPortalConst<T>),
    Output(ArrayPortal<T>),
}

impl<T: Value> FieldPortal<T> {
    pub fn len(&self) -> usize {
        match self {
            Self::Input(portal) => portal.len(),
            Self::Output(portal) => portal.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Value> ExecutionArgument for FieldPortal<T> {
    type Value = T;

    #[inline]
    fn load(&self, index: usize) -> T {
        match self {
            Self::Input(portal) => portal.get(index),
            Self::Output(portal) => portal.get(index),
        }
    }

    #[inline]
    unsafe fn store(&self, index: usize, value: T) {
        match self {
            Self::Input(_) => read_only("input field"),
            Self::Output(portal) => portal.set(index, value),
        }
    }
}

impl<T: Value, D: DeviceAdapter> ControlArgument<D> for ArrayHandle<T, D> {
    type Exec = FieldPortal<T>;

    fn domain(&self, tag: ControlTag) -> Result<Domain> {
        let len = self.number_of_values();
        match tag {
            ControlTag::FieldIn | ControlTag::FieldInOut => Ok(Domain::Follows(len)),
            ControlTag::FieldOut if len > 0 => Ok(Domain::Hint(len)),
            ControlTag::FieldOut => Ok(Domain::Any),
            ControlTag::Topology => Err(unsupported(tag, "an array handle")),
        }
    }

    fn transfer(&self, tag: ControlTag, len: usize) -> Result<FieldPortal<T>> {
        match tag {
            ControlTag::FieldIn => Ok(FieldPortal::Input(self.prepare_for_input()?)),
            ControlTag::FieldInOut => Ok(FieldPortal::Output(self.prepare_for_in_place()?)),
            ControlTag::FieldOut => Ok(FieldPortal::Output(self.prepare_for_output(len)?)),
            ControlTag::Topology => Err(unsupported(tag, "an array handle")),
        }
    }
}

impl<D, A> ControlArgument<D> for &A
where
    D: DeviceAdapter,
    A: ControlArgument<D> + ?Sized,
{
    type Exec = A::Exec;

    fn domain(&self, tag: ControlTag) -> Result<Domain> {
        (**self).domain(tag)
    }

    fn transfer(&self, tag: ControlTag, len: usize) -> Result<A::Exec> {
        (**self).transfer(tag, len)
    }
}

/// The same value at every index.
#[derive(Debug, Clone, Copy)]
pub struct UniformField<T> {
    value: T,
}

impl<T: Value> UniformField<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Value> ExecutionArgument for UniformField<T> {
    type Value = T;

    #[inline]
    fn load(&self, _index: usize) -> T {
        self.value
    }

    unsafe fn store(&self, _index: usize, _value: T) {
        read_only("uniform field")
    }
}

fn uniform_domain(tag: ControlTag, what: &str) -> Result<Domain> {
    match tag {
        ControlTag::FieldIn => Ok(Domain::Any),
        _ => Err(unsupported(tag, what)),
    }
}

/// A value read as an unbounded, read-only array holding it at every index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniform<T>(pub T);

impl<T: Value, D: DeviceAdapter> ControlArgument<D> for Uniform<T> {
    type Exec = UniformField<T>;

    fn domain(&self, tag: ControlTag) -> Result<Domain> {
        uniform_domain(tag, "a uniform value")
    }

    fn transfer(&self, tag: ControlTag, _len: usize) -> Result<UniformField<T>> {
        uniform_domain(tag, "a uniform value")?;
        Ok(UniformField::new(self.0))
    }
}

macro_rules! impl_scalar_argument {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl<D: DeviceAdapter> ControlArgument<D> for $ty {
                type Exec = UniformField<$ty>;

                fn domain(&self, tag: ControlTag) -> Result<Domain> {
                    uniform_domain(tag, "a constant")
                }

                fn transfer(&self, tag: ControlTag, _len: usize) -> Result<UniformField<$ty>> {
                    uniform_domain(tag, "a constant")?;
                    Ok(UniformField::new(*self))
                }
            }
        )+
    };
}

impl_scalar_argument!(i32, i64, u32, u64, usize, f32, f64, Vector3);

/// A fixed-length array with one value at every index.
///
/// Read-only like a constant, but its length takes part in the work domain
/// the same way an input handle's does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantArray<T> {
    value: T,
    len: usize,
}

impl<T: Value> ConstantArray<T> {
    pub fn new(value: T, len: usize) -> Self {
        Self { value, len }
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Materialize as an array handle.
    pub fn to_handle<D: DeviceAdapter>(&self) -> ArrayHandle<T, D> {
        ArrayHandle::from_vec(vec![self.value; self.len])
    }
}

impl<T: Value, D: DeviceAdapter> ControlArgument<D> for ConstantArray<T> {
    type Exec = UniformField<T>;

    fn domain(&self, tag: ControlTag) -> Result<Domain> {
        match tag {
            ControlTag::FieldIn => Ok(Domain::Follows(self.len)),
            _ => Err(unsupported(tag, "a constant array")),
        }
    }

    fn transfer(&self, tag: ControlTag, _len: usize) -> Result<UniformField<T>> {
        <Self as ControlArgument<D>>::domain(self, tag)?;
        Ok(UniformField::new(self.value))
    }
}

/// Indexed view onto a value handle: element `i` is `values[indices[i]]`.
///
/// Bound as an output or in-out field, writes go through to `values` in
/// place, so the indices must then be distinct.
#[derive(Debug, Clone)]
pub struct Permutation<T: Value, D: DeviceAdapter> {
    indices: ArrayHandle<Id, D>,
    values: ArrayHandle<T, D>,
}

impl<T: Value, D: DeviceAdapter> Permutation<T, D> {
    pub fn new(indices: ArrayHandle<Id, D>, values: ArrayHandle<T, D>) -> Self {
        Self { indices, values }
    }

    pub fn indices(&self) -> &ArrayHandle<Id, D> {
        &self.indices
    }

    pub fn values(&self) -> &ArrayHandle<T, D> {
        &self.values
    }

    pub fn number_of_values(&self) -> usize {
        self.indices.number_of_values()
    }

    fn validate(&self, indices: &ArrayPortalConst<Id>, writable: bool) -> Result<()> {
        let len = self.values.number_of_values();
        let mut seen = if writable { vec![false; len] } else { Vec::new() };
        for (position, index) in indices.iter().enumerate() {
            let target = usize::try_from(index)
                .ok()
                .filter(|&target| target < len)
                .ok_or_else(|| {
                    Error::bad_value(format!(
                        "permutation index {index} at position {position} is outside 0..{len}"
                    ))
                })?;
            if writable {
                if seen[target] {
                    return Err(Error::bad_value(format!(
                        "permutation index {index} repeats; written permutations need distinct indices"
                    )));
                }
                seen[target] = true;
            }
        }
        Ok(())
    }
}

/// Prepared [`Permutation`].
#[derive(Debug, Clone)]
pub struct PermutedField<T> {
    indices: ArrayPortalConst<Id>,
    values: FieldPortal<T>,
}

impl<T: Value> ExecutionArgument for PermutedField<T> {
    type Value = T;

    #[inline]
    fn load(&self, index: usize) -> T {
        self.values.load(self.indices.get(index) as usize)
    }

    #[inline]
    unsafe fn store(&self, index: usize, value: T) {
        self.values.store(self.indices.get(index) as usize, value);
    }
}

impl<T: Value, D: DeviceAdapter> ControlArgument<D> for Permutation<T, D> {
    type Exec = PermutedField<T>;

    fn domain(&self, tag: ControlTag) -> Result<Domain> {
        match tag {
            ControlTag::Topology => Err(unsupported(tag, "a permutation")),
            _ => Ok(Domain::Follows(self.number_of_values())),
        }
    }

    fn transfer(&self, tag: ControlTag, _len: usize) -> Result<PermutedField<T>> {
        let indices = self.indices.prepare_for_input()?;
        let values = match tag {
            ControlTag::FieldIn => {
                self.validate(&indices, false)?;
                FieldPortal::Input(self.values.prepare_for_input()?)
            }
            ControlTag::FieldOut | ControlTag::FieldInOut => {
                self.validate(&indices, true)?;
                FieldPortal::Output(self.values.prepare_for_in_place()?)
            }
            ControlTag::Topology => return Err(unsupported(tag, "a permutation")),
        };
        Ok(PermutedField { indices, values })
    }
}

/// Prepared [`UniformGrid`]: loads the voxel of each cell.
#[derive(Debug, Clone, Copy)]
pub struct GridCells {
    grid: UniformGrid,
}

impl ExecutionArgument for GridCells {
    type Value = CellVoxel;

    #[inline]
    fn load(&self, index: usize) -> CellVoxel {
        self.grid.cell(index)
    }

    unsafe fn store(&self, _index: usize, _value: CellVoxel) {
        read_only("topology")
    }
}

impl<D: DeviceAdapter> ControlArgument<D> for UniformGrid {
    type Exec = GridCells;

    fn domain(&self, tag: ControlTag) -> Result<Domain> {
        match tag {
            ControlTag::Topology => Ok(Domain::Defines(self.number_of_cells())),
            _ => Err(unsupported(tag, "a grid")),
        }
    }

    fn transfer(&self, tag: ControlTag, _len: usize) -> Result<GridCells> {
        match tag {
            ControlTag::Topology => Ok(GridCells { grid: *self }),
            _ => Err(unsupported(tag, "a grid")),
        }
    }
}
