//! Worklet dispatch
//!
//! ```text
//!   invoke(args)
//!     │
//!     ├─ 1. argument count == control signature length
//!     ├─ 2. result slots name FieldOut / FieldInOut arguments
//!     ├─ 3. domain: topology cells, else the common field length,
//!     │            else an output's existing length
//!     ├─ 4. transfer: inputs and in-place fields first, then outputs
//!     └─ 5. D::schedule(domain) → fetch params → call → store result
//! ```
//!
//! Count, result-slot and domain checks run before any argument is prepared,
//! so a dispatch rejected by them leaves its arguments untouched. A dispatch that fails inside the
//! schedule leaves its outputs allocated but with unspecified contents.
//!
//! # Usage
//!
//! ```rust
//! use weft_core::{ArrayHandle, ControlTag, Dispatcher, SerialDevice, WorkContext, Worklet, WorkletCall, _1, _2, _3};
//!
//! struct Multiply;
//!
//! impl Worklet for Multiply {
//!     const CONTROL_SIGNATURE: &'static [ControlTag] =
//!         &[ControlTag::FieldIn, ControlTag::FieldIn, ControlTag::FieldOut];
//!     type ExecutionSignature = fn(_1, _2) -> _3;
//! }
//!
//! impl WorkletCall<(f32, f32)> for Multiply {
//!     type Output = f32;
//!
//!     fn call(&self, _context: &WorkContext<'_>, (a, b): (f32, f32)) -> f32 {
//!         a * b
//!     }
//! }
//!
//! let input = ArrayHandle::<f32, SerialDevice>::from_vec(vec![1.0, 2.0, 3.0]);
//! let output = ArrayHandle::<f32, SerialDevice>::new();
//! Dispatcher::<_, SerialDevice>::new(Multiply).invoke((&input, 2.0f32, &output))?;
//! assert_eq!(output.to_vec()?, vec![2.0, 4.0, 6.0]);
//! # Ok::<(), weft_core::Error>(())
//! ```

use crate::arg::{ControlArgument, Domain};
use crate::error::{Error, Result};
use crate::signature::{ExecutionSignature, ResultSlot};
use crate::worklet::{ControlTag, WorkContext, Worklet, WorkletCall};
use std::marker::PhantomData;
use weft_backends::{DefaultDevice, DeviceAdapter};

/// Positional dispatch arguments: tuples of one to six [`ControlArgument`]s.
pub trait Arguments<D: DeviceAdapter> {
    const ARITY: usize;

    type Exec: Sync;

    /// Domain constraint of each argument under its tag.
    fn domains(&self, tags: &[ControlTag]) -> Result<Vec<Domain>>;

    /// Transfer every argument; inputs before outputs.
    fn transfer(&self, tags: &[ControlTag], len: usize) -> Result<Self::Exec>;
}

macro_rules! impl_arguments {
    ($arity:literal; $($arg:ident $idx:tt $prepared:ident),+) => {
        impl<D: DeviceAdapter, $($arg: ControlArgument<D>),+> Arguments<D> for ($($arg,)+) {
            const ARITY: usize = $arity;

            type Exec = ($($arg::Exec,)+);

            fn domains(&self, tags: &[ControlTag]) -> Result<Vec<Domain>> {
                Ok(vec![$(self.$idx.domain(tags[$idx])?),+])
            }

            fn transfer(&self, tags: &[ControlTag], len: usize) -> Result<Self::Exec> {
                $(
                    let $prepared = if tags[$idx] == ControlTag::FieldOut {
                        None
                    } else {
                        Some(self.$idx.transfer(tags[$idx], len)?)
                    };
                )+
                Ok(($(
                    match $prepared {
                        Some(prepared) => prepared,
                        None => self.$idx.transfer(tags[$idx], len)?,
                    },
                )+))
            }
        }
    };
}

impl_arguments!(1; A1 0 a1);
impl_arguments!(2; A1 0 a1, A2 1 a2);
impl_arguments!(3; A1 0 a1, A2 1 a2, A3 2 a3);
impl_arguments!(4; A1 0 a1, A2 1 a2, A3 2 a3, A4 3 a4);
impl_arguments!(5; A1 0 a1, A2 1 a2, A3 2 a3, A4 3 a4, A5 4 a5);
impl_arguments!(6; A1 0 a1, A2 1 a2, A3 2 a3, A4 3 a4, A5 4 a5, A6 5 a6);

/// Resolve the number of units of work from per-argument constraints.
fn resolve_domain(domains: &[Domain]) -> Result<usize> {
    if let Some(len) = domains.iter().find_map(|domain| match domain {
        Domain::Defines(len) => Some(*len),
        _ => None,
    }) {
        return Ok(len);
    }

    let mut follows = domains.iter().filter_map(|domain| match domain {
        Domain::Follows(len) => Some(*len),
        _ => None,
    });
    if let Some(first) = follows.next() {
        if let Some(other) = follows.find(|&len| len != first) {
            return Err(Error::bad_value(format!(
                "inconsistent field lengths: {first} and {other}"
            )));
        }
        return Ok(first);
    }

    domains
        .iter()
        .find_map(|domain| match domain {
            Domain::Hint(len) => Some(*len),
            _ => None,
        })
        .ok_or_else(|| Error::bad_value("no argument determines the work domain length"))
}

/// Binds a worklet to device `D` and runs it over argument tuples.
#[derive(Debug, Clone)]
pub struct Dispatcher<W, D: DeviceAdapter = DefaultDevice> {
    worklet: W,
    _device: PhantomData<D>,
}

impl<W: Worklet, D: DeviceAdapter> Dispatcher<W, D> {
    pub fn new(worklet: W) -> Self {
        Self {
            worklet,
            _device: PhantomData,
        }
    }

    pub fn worklet(&self) -> &W {
        &self.worklet
    }

    /// Run the worklet once per element of the work domain.
    #[tracing::instrument(skip_all, fields(worklet = std::any::type_name::<W>(), device = D::NAME))]
    pub fn invoke<A>(&self, args: A) -> Result<()>
    where
        A: Arguments<D>,
        <W as Worklet>::ExecutionSignature: ExecutionSignature<A::Exec>,
        W: WorkletCall<
            <<W as Worklet>::ExecutionSignature as ExecutionSignature<A::Exec>>::Params,
            Output = <<<W as Worklet>::ExecutionSignature as ExecutionSignature<A::Exec>>::Returns as ResultSlot<A::Exec>>::Value,
        >,
    {
        let tags = W::CONTROL_SIGNATURE;
        if A::ARITY != tags.len() {
            return Err(Error::bad_value(format!(
                "worklet declares {} arguments, {} given",
                tags.len(),
                A::ARITY
            )));
        }

        let result_slots = <<W as Worklet>::ExecutionSignature as ExecutionSignature<A::Exec>>::result_slots();
        for slot in result_slots {
            let tag = tags[slot - 1];
            if !tag.is_writable() {
                return Err(Error::bad_value(format!(
                    "worklet result targets argument {slot}, which is bound as {tag:?}"
                )));
            }
        }

        let len = resolve_domain(&args.domains(tags)?)?;
        tracing::debug!(len, "work domain resolved");

        let exec = args.transfer(tags, len)?;
        let worklet = &self.worklet;
        let exec_ref = &exec;
        D::schedule(
            move |index, errors| {
                let context = WorkContext::new(index, errors);
                let params = <<W as Worklet>::ExecutionSignature as ExecutionSignature<A::Exec>>::fetch(exec_ref, index);
                let output = worklet.call(&context, params);
                // SAFETY: unit of work `index` writes only element `index` of
                // each output, and permuted outputs have distinct indices.
                unsafe {
                    <<<W as Worklet>::ExecutionSignature as ExecutionSignature<A::Exec>>::Returns as ResultSlot<A::Exec>>::store(
                        exec_ref, index, output,
                    )
                };
            },
            len,
        )?;
        Ok(())
    }
}
