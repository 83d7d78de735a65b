//! Worklets: per-element kernels and their signatures
//!
//! A worklet declares two signatures:
//!
//! - a **control signature**, one [`ControlTag`] per dispatch argument, which
//!   tells the dispatcher how to prepare each argument;
//! - an **execution signature**, a function-pointer type over the `_N`
//!   placeholders (see [`crate::signature`]), which maps prepared arguments
//!   onto the body's parameters and result.
//!
//! # Usage
//!
//! ```rust
//! use weft_core::{ControlTag, WorkContext, Worklet, WorkletCall, _1, _2};
//!
//! struct Square;
//!
//! impl Worklet for Square {
//!     const CONTROL_SIGNATURE: &'static [ControlTag] = &[ControlTag::FieldIn, ControlTag::FieldOut];
//!     type ExecutionSignature = fn(_1) -> _2;
//! }
//!
//! impl WorkletCall<(f32,)> for Square {
//!     type Output = f32;
//!
//!     fn call(&self, _context: &WorkContext<'_>, (value,): (f32,)) -> f32 {
//!         value * value
//!     }
//! }
//! ```

use weft_backends::ErrorMessageBuffer;

/// How the dispatcher treats one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlTag {
    /// Read-only field; prepared for input
    FieldIn,
    /// Write-only field; prepared for output at the domain length
    FieldOut,
    /// Read-write field; prepared in place
    FieldInOut,
    /// Domain-defining mesh; one unit of work per cell
    Topology,
}

impl ControlTag {
    /// Slots the body may write through.
    pub fn is_writable(self) -> bool {
        matches!(self, Self::FieldOut | Self::FieldInOut)
    }
}

/// Declares the signatures of a worklet.
pub trait Worklet: Sync {
    const CONTROL_SIGNATURE: &'static [ControlTag];

    /// A function-pointer type such as `fn(_1, _2) -> _3`.
    type ExecutionSignature;
}

/// The body of a worklet for one parameter tuple.
///
/// Implemented separately from [`Worklet`] so one worklet can be generic over
/// its field value types.
pub trait WorkletCall<Params>: Worklet {
    type Output;

    fn call(&self, context: &WorkContext<'_>, params: Params) -> Self::Output;
}

/// What a unit of work knows about itself.
#[derive(Debug, Clone, Copy)]
pub struct WorkContext<'a> {
    index: usize,
    errors: ErrorMessageBuffer<'a>,
}

impl<'a> WorkContext<'a> {
    pub fn new(index: usize, errors: ErrorMessageBuffer<'a>) -> Self {
        Self { index, errors }
    }

    /// Position in the work domain.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Latch an error for the dispatch. The body keeps running; the first
    /// message raised in the dispatch is reported after it finishes.
    pub fn raise_error(&self, message: &str) {
        self.errors.raise_error(message);
    }

    pub fn is_error_raised(&self) -> bool {
        self.errors.is_raised()
    }
}
