//! Execution signatures
//!
//! A worklet names the arguments its body reads and writes with a function
//! pointer type over the placeholders `_1`..`_6`, where `_N` is the N-th
//! argument given to [`crate::Dispatcher::invoke`]:
//!
//! ```text
//! fn(_1, _2) -> _3        read slots 1 and 2, write slot 3
//! fn(_1) -> _1            read and write slot 1
//! fn(_1) -> (_2, _3)      read slot 1, write slots 2 and 3
//! fn(_1)                  read slot 1, write nothing
//! fn() -> _1              write slot 1
//! ```
//!
//! The mapping is resolved at compile time: naming a slot the argument tuple
//! does not have fails to type-check.

use crate::arg::ExecutionArgument;

/// Placeholder for the `N`-th dispatch argument (1-based).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Arg<const N: usize>;

#[allow(non_camel_case_types)]
pub type _1 = Arg<1>;
#[allow(non_camel_case_types)]
pub type _2 = Arg<2>;
#[allow(non_camel_case_types)]
pub type _3 = Arg<3>;
#[allow(non_camel_case_types)]
pub type _4 = Arg<4>;
#[allow(non_camel_case_types)]
pub type _5 = Arg<5>;
#[allow(non_camel_case_types)]
pub type _6 = Arg<6>;

/// Positional access into a tuple of execution arguments.
pub trait Slot<const N: usize> {
    type Target: ExecutionArgument;

    fn slot(&self) -> &Self::Target;
}

macro_rules! impl_slot {
    ($n:literal => $idx:tt : $target:ident; $($all:ident),+) => {
        impl<$($all: ExecutionArgument),+> Slot<$n> for ($($all,)+) {
            type Target = $target;

            #[inline]
            fn slot(&self) -> &$target {
                &self.$idx
            }
        }
    };
}

impl_slot!(1 => 0: A1; A1);

impl_slot!(1 => 0: A1; A1, A2);
impl_slot!(2 => 1: A2; A1, A2);

impl_slot!(1 => 0: A1; A1, A2, A3);
impl_slot!(2 => 1: A2; A1, A2, A3);
impl_slot!(3 => 2: A3; A1, A2, A3);

impl_slot!(1 => 0: A1; A1, A2, A3, A4);
impl_slot!(2 => 1: A2; A1, A2, A3, A4);
impl_slot!(3 => 2: A3; A1, A2, A3, A4);
impl_slot!(4 => 3: A4; A1, A2, A3, A4);

impl_slot!(1 => 0: A1; A1, A2, A3, A4, A5);
impl_slot!(2 => 1: A2; A1, A2, A3, A4, A5);
impl_slot!(3 => 2: A3; A1, A2, A3, A4, A5);
impl_slot!(4 => 3: A4; A1, A2, A3, A4, A5);
impl_slot!(5 => 4: A5; A1, A2, A3, A4, A5);

impl_slot!(1 => 0: A1; A1, A2, A3, A4, A5, A6);
impl_slot!(2 => 1: A2; A1, A2, A3, A4, A5, A6);
impl_slot!(3 => 2: A3; A1, A2, A3, A4, A5, A6);
impl_slot!(4 => 3: A4; A1, A2, A3, A4, A5, A6);
impl_slot!(5 => 4: A5; A1, A2, A3, A4, A5, A6);
impl_slot!(6 => 5: A6; A1, A2, A3, A4, A5, A6);

/// A placeholder used as a parameter: loads one value per work index.
pub trait Fetch<Args> {
    type Value;

    const SLOT: usize;

    fn fetch(args: &Args, index: usize) -> Self::Value;
}

impl<const N: usize, Args> Fetch<Args> for Arg<N>
where
    Args: Slot<N>,
{
    type Value = <<Args as Slot<N>>::Target as ExecutionArgument>::Value;

    const SLOT: usize = N;

    #[inline]
    fn fetch(args: &Args, index: usize) -> Self::Value {
        <Args as Slot<N>>::slot(args).load(index)
    }
}

/// The return position of a signature: nothing, one placeholder, or a pair.
pub trait ResultSlot<Args> {
    type Value;

    /// Slots written, 1-based.
    fn slots() -> Vec<usize>;

    /// # Safety
    ///
    /// No other unit of work may access `index` of the written slots while
    /// this call runs.
    unsafe fn store(args: &Args, index: usize, value: Self::Value);
}

impl<Args> ResultSlot<Args> for () {
    type Value = ();

    fn slots() -> Vec<usize> {
        Vec::new()
    }

    #[inline]
    unsafe fn store(_args: &Args, _index: usize, _value: ()) {}
}

impl<const N: usize, Args> ResultSlot<Args> for Arg<N>
where
    Args: Slot<N>,
{
    type Value = <<Args as Slot<N>>::Target as ExecutionArgument>::Value;

    fn slots() -> Vec<usize> {
        vec![N]
    }

    #[inline]
    unsafe fn store(args: &Args, index: usize, value: Self::Value) {
        <Args as Slot<N>>::slot(args).store(index, value);
    }
}

impl<Args, R1, R2> ResultSlot<Args> for (R1, R2)
where
    R1: ResultSlot<Args>,
    R2: ResultSlot<Args>,
{
    type Value = (R1::Value, R2::Value);

    fn slots() -> Vec<usize> {
        let mut slots = R1::slots();
        slots.extend(R2::slots());
        slots
    }

    #[inline]
    unsafe fn store(args: &Args, index: usize, (first, second): Self::Value) {
        R1::store(args, index, first);
        R2::store(args, index, second);
    }
}

/// Function-pointer signature resolved against an execution argument tuple.
pub trait ExecutionSignature<Args> {
    /// Tuple of values handed to the worklet body.
    type Params;

    /// Placeholder(s) the body's result is written through.
    type Returns: ResultSlot<Args>;

    /// Slots read, 1-based, in parameter order.
    fn parameter_slots() -> Vec<usize>;

    fn result_slots() -> Vec<usize> {
        <Self::Returns as ResultSlot<Args>>::slots()
    }

    fn fetch(args: &Args, index: usize) -> Self::Params;
}

macro_rules! impl_execution_signature {
    ($($param:ident),*) => {
        impl<Args, R $(, $param)*> ExecutionSignature<Args> for fn($($param),*) -> R
        where
            R: ResultSlot<Args>,
            $($param: Fetch<Args>,)*
        {
            type Params = ($($param::Value,)*);
            type Returns = R;

            fn parameter_slots() -> Vec<usize> {
                vec![$($param::SLOT),*]
            }

            #[inline]
            #[allow(unused_variables)]
            fn fetch(args: &Args, index: usize) -> Self::Params {
                ($($param::fetch(args, index),)*)
            }
        }
    };
}

impl_execution_signature!();
impl_execution_signature!(P1);
impl_execution_signature!(P1, P2);
impl_execution_signature!(P1, P2, P3);
impl_execution_signature!(P1, P2, P3, P4);
impl_execution_signature!(P1, P2, P3, P4, P5);
impl_execution_signature!(P1, P2, P3, P4, P5, P6);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arg::UniformField;

    type Pair = (UniformField<i64>, UniformField<f32>);

    fn pair() -> Pair {
        (UniformField::new(7), UniformField::new(2.5))
    }

    #[test]
    fn test_slots_are_one_based() {
        assert_eq!(<fn(_2, _1) -> _1 as ExecutionSignature<Pair>>::parameter_slots(), vec![2, 1]);
        assert_eq!(<fn(_2, _1) -> _1 as ExecutionSignature<Pair>>::result_slots(), vec![1]);
        assert_eq!(<fn(_1) -> (_1, _2) as ExecutionSignature<Pair>>::result_slots(), vec![1, 2]);
        assert!(<fn(_1) as ExecutionSignature<Pair>>::result_slots().is_empty());
        assert!(<fn() -> _2 as ExecutionSignature<Pair>>::parameter_slots().is_empty());
    }

    #[test]
    fn test_fetch_loads_in_parameter_order() {
        let args = pair();
        let params = <fn(_2, _1) as ExecutionSignature<Pair>>::fetch(&args, 3);
        assert_eq!(params, (2.5, 7));
    }
}
