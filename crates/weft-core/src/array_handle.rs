//! Array handle: one logical array living in the control and execution
//! environments
//!
//! A handle unifies up to three copies of the same values:
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │  user data   │   │   control    │   │  execution mirror    │
//! │ (adopted Vec)│   │  Container   │   │  D::Mirror<T>        │
//! └──────┬───────┘   └──────┬───────┘   └──────────┬───────────┘
//!   UserValid          ControlValid          ExecutionValid
//! ```
//!
//! User and control data are never valid at the same time. Transfers are
//! pull-driven: preparing for input loads the execution mirror only if it is
//! stale, and control-side reads retrieve execution data only when neither
//! control copy is valid.
//!
//! Clones of a handle share one state block behind `Arc<RwLock<..>>`, so a
//! change made through any clone is visible through all of them.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use weft_backends::{
    ArrayPortal, ArrayPortalConst, Container, DefaultDevice, DeviceAdapter, ExecutionMirror, TransferCounts, Value,
};

const NO_DATA: &str = "ArrayHandle contains no data.";
const NO_INPUT_DATA: &str = "ArrayHandle has no data when PrepareForInput called.";

/// Snapshot of the three validity flags of a handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Validity {
    pub user: bool,
    pub control: bool,
    pub execution: bool,
}

struct HandleState<T: Value, D: DeviceAdapter> {
    user: Container<T>,
    user_valid: bool,
    control: Container<T>,
    control_valid: bool,
    execution: D::Mirror<T>,
    execution_valid: bool,
}

impl<T: Value, D: DeviceAdapter> HandleState<T, D> {
    fn empty() -> Self {
        Self {
            user: Container::new(),
            user_valid: false,
            control: Container::new(),
            control_valid: false,
            execution: D::Mirror::<T>::default(),
            execution_valid: false,
        }
    }

    /// Pull execution data back into the control container when no control
    /// copy is valid. Changes physical placement only, never the values.
    fn sync_control_array(&mut self) -> Result<()> {
        debug_assert!(!(self.user_valid && self.control_valid));
        if self.user_valid || self.control_valid || !self.execution_valid {
            return Ok(());
        }
        self.execution.retrieve_output_data(&mut self.control)?;
        self.control_valid = true;
        tracing::trace!(device = D::NAME, len = self.control.len(), "control array synchronized");
        Ok(())
    }

    fn control_source(&self) -> Option<&Container<T>> {
        if self.user_valid {
            Some(&self.user)
        } else if self.control_valid {
            Some(&self.control)
        } else {
            None
        }
    }

    fn prepare_for_input(&mut self) -> Result<()> {
        if self.execution_valid {
            return Ok(());
        }
        let source = if self.user_valid {
            &self.user
        } else if self.control_valid {
            &self.control
        } else {
            return Err(Error::bad_value(NO_INPUT_DATA));
        };
        self.execution.load_data_for_input(source)?;
        self.execution_valid = true;
        Ok(())
    }

    fn invalidate_control(&mut self) {
        self.user_valid = false;
        self.control_valid = false;
    }
}

/// Reference-counted handle to an array of `T` managed for device `D`.
pub struct ArrayHandle<T: Value, D: DeviceAdapter = DefaultDevice> {
    state: Arc<RwLock<HandleState<T, D>>>,
}

impl<T: Value, D: DeviceAdapter> Clone for ArrayHandle<T, D> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Value, D: DeviceAdapter> Default for ArrayHandle<T, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value, D: DeviceAdapter> fmt::Debug for ArrayHandle<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayHandle")
            .field("device", &D::NAME)
            .field("len", &self.number_of_values())
            .field("validity", &self.validity())
            .finish()
    }
}

impl<T: Value, D: DeviceAdapter> From<Vec<T>> for ArrayHandle<T, D> {
    fn from(values: Vec<T>) -> Self {
        Self::from_vec(values)
    }
}

impl<T: Value, D: DeviceAdapter> ArrayHandle<T, D> {
    /// Empty handle; every validity flag is false.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(HandleState::empty())),
        }
    }

    /// Adopt `values` as the handle's user data without copying.
    pub fn from_vec(values: Vec<T>) -> Self {
        let mut state = HandleState::empty();
        state.user = Container::from_vec(values);
        state.user_valid = true;
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Copy `values` into a new handle.
    pub fn from_slice(values: &[T]) -> Self {
        Self::from_vec(values.to_vec())
    }

    pub fn number_of_values(&self) -> usize {
        let state = self.state.read();
        if state.user_valid {
            state.user.len()
        } else if state.control_valid {
            state.control.len()
        } else if state.execution_valid {
            state.execution.len()
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_values() == 0
    }

    pub fn validity(&self) -> Validity {
        let state = self.state.read();
        Validity {
            user: state.user_valid,
            control: state.control_valid,
            execution: state.execution_valid,
        }
    }

    /// Host/device copies made by this handle's execution mirror.
    pub fn transfer_counts(&self) -> TransferCounts {
        self.state.read().execution.transfer_counts()
    }

    /// True when both handles share one state block.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn state_addr(&self) -> *const () {
        Arc::as_ptr(&self.state).cast()
    }

    /// Read access to the values in the control environment.
    ///
    /// Synchronizes first, so this may copy data back from the execution
    /// environment. The portal views the control allocation at the time of the
    /// call; it must not be read on another thread while an execution-side
    /// operation on this handle is running.
    #[tracing::instrument(level = "trace", skip(self), fields(device = D::NAME))]
    pub fn portal_const_control(&self) -> Result<ArrayPortalConst<T>> {
        let mut state = self.state.write();
        state.sync_control_array()?;
        state
            .control_source()
            .map(Container::portal_const)
            .ok_or_else(|| Error::bad_value(NO_DATA))
    }

    /// Copy of the values, read through the control environment.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.portal_const_control()?.to_vec())
    }

    /// Copy the values into the front of `destination`.
    ///
    /// Reads the execution copy directly when it is valid, skipping the
    /// round trip through control memory.
    pub fn copy_into(&self, destination: &mut [T]) -> Result<()> {
        {
            let state = self.state.read();
            if state.execution_valid {
                return Ok(state.execution.copy_into(destination)?);
            }
        }

        let portal = self.portal_const_control()?;
        if destination.len() < portal.len() {
            return Err(Error::bad_value(format!(
                "copy destination holds {} values, array holds {}",
                destination.len(),
                portal.len()
            )));
        }
        for (slot, value) in destination.iter_mut().zip(portal.iter()) {
            *slot = value;
        }
        Ok(())
    }

    /// Execution-side read access. Loads the mirror unless it is already valid.
    #[tracing::instrument(level = "debug", skip(self), fields(device = D::NAME))]
    pub fn prepare_for_input(&self) -> Result<ArrayPortalConst<T>> {
        let mut state = self.state.write();
        state.prepare_for_input()?;
        Ok(state.execution.portal_const())
    }

    /// Allocate exactly `len` values in the execution environment.
    ///
    /// The control side becomes stale; callers must write every value before
    /// the next control-side read. The old control allocation is not released
    /// here unless the device aliases it.
    #[tracing::instrument(level = "debug", skip(self), fields(device = D::NAME))]
    pub fn prepare_for_output(&self, len: usize) -> Result<ArrayPortal<T>> {
        let mut state = self.state.write();
        state.invalidate_control();
        let HandleState {
            control, execution, ..
        } = &mut *state;
        if let Err(err) = execution.allocate_array_for_output(control, len) {
            state.execution_valid = false;
            return Err(err.into());
        }
        state.execution_valid = true;
        Ok(state.execution.portal())
    }

    /// Execution-side read-write access to the existing values.
    #[tracing::instrument(level = "debug", skip(self), fields(device = D::NAME))]
    pub fn prepare_for_in_place(&self) -> Result<ArrayPortal<T>> {
        let mut state = self.state.write();
        state.prepare_for_input()?;
        state.invalidate_control();
        Ok(state.execution.portal())
    }

    /// Free execution memory. Values that only lived there are lost.
    pub fn release_resources_execution(&self) {
        let mut state = self.state.write();
        if state.execution_valid {
            state.execution.release_resources();
            state.execution_valid = false;
        }
    }

    /// Free execution memory, forget user data and free the control container.
    pub fn release_resources(&self) {
        self.release_resources_execution();
        let mut state = self.state.write();
        state.user_valid = false;
        state.user.release_resources();
        if state.control_valid {
            state.control.release_resources();
            state.control_valid = false;
        }
    }

    /// Truncate the execution copy after an algorithm produced fewer values.
    pub(crate) fn shrink_execution(&self, len: usize) -> Result<()> {
        let mut state = self.state.write();
        if !state.execution_valid {
            return Err(Error::bad_value("shrink requires valid execution data"));
        }
        state.execution.shrink(len)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_backends::{SerialDevice, StagedDevice};

    #[test]
    fn test_empty_handle() {
        let handle = ArrayHandle::<f32, SerialDevice>::new();
        assert_eq!(handle.number_of_values(), 0);
        assert_eq!(handle.validity(), Validity::default());
        assert_eq!(handle.portal_const_control().unwrap_err(), Error::bad_value(NO_DATA));
        assert!(matches!(handle.prepare_for_input(), Err(Error::BadValue(_))));
    }

    #[test]
    fn test_user_data_is_adopted() {
        let handle = ArrayHandle::<i64, SerialDevice>::from_vec(vec![1, 2, 3]);
        assert_eq!(
            handle.validity(),
            Validity {
                user: true,
                control: false,
                execution: false
            }
        );
        assert_eq!(handle.to_vec().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_input_is_loaded_once() {
        let handle = ArrayHandle::<i64, StagedDevice>::from_vec(vec![5; 8]);
        handle.prepare_for_input().unwrap();
        handle.prepare_for_input().unwrap();
        assert_eq!(handle.transfer_counts().host_to_device, 1);
        assert!(handle.validity().user);
        assert!(handle.validity().execution);
    }

    #[test]
    fn test_output_invalidates_control_and_syncs_once() {
        let handle = ArrayHandle::<i64, StagedDevice>::from_vec(vec![0; 4]);
        let portal = handle.prepare_for_output(3).unwrap();
        for i in 0..3 {
            // SAFETY: single-threaded test.
            unsafe { portal.set(i, 10 * i as i64) };
        }
        assert_eq!(
            handle.validity(),
            Validity {
                user: false,
                control: false,
                execution: true
            }
        );

        assert_eq!(handle.to_vec().unwrap(), vec![0, 10, 20]);
        assert_eq!(handle.to_vec().unwrap(), vec![0, 10, 20]);
        assert_eq!(handle.transfer_counts().device_to_host, 1);
        assert!(handle.validity().control);
    }

    #[test]
    fn test_in_place_keeps_values() {
        let handle = ArrayHandle::<i64, SerialDevice>::from_vec(vec![1, 2, 3]);
        let portal = handle.prepare_for_in_place().unwrap();
        // SAFETY: single-threaded test.
        unsafe { portal.set(0, 100) };
        assert!(!handle.validity().user);
        assert_eq!(handle.to_vec().unwrap(), vec![100, 2, 3]);
    }

    #[test]
    fn test_clones_share_state() {
        let handle = ArrayHandle::<i64, SerialDevice>::from_vec(vec![1, 2]);
        let clone = handle.clone();
        handle.prepare_for_output(5).unwrap();
        assert_eq!(clone.number_of_values(), 5);
        assert!(clone.ptr_eq(&handle));
        assert!(!clone.ptr_eq(&ArrayHandle::new()));
    }

    #[test]
    fn test_release_resources_empties_handle() {
        let handle = ArrayHandle::<i64, SerialDevice>::from_vec(vec![1, 2]);
        handle.prepare_for_input().unwrap();
        handle.release_resources();
        assert_eq!(handle.validity(), Validity::default());
        assert_eq!(handle.number_of_values(), 0);
    }

    #[test]
    fn test_copy_into_reads_execution_copy() {
        let handle = ArrayHandle::<i64, StagedDevice>::new();
        let portal = handle.prepare_for_output(2).unwrap();
        // SAFETY: single-threaded test.
        unsafe {
            portal.set(0, 7);
            portal.set(1, 8);
        }
        let mut out = [0i64; 3];
        handle.copy_into(&mut out).unwrap();
        assert_eq!(out, [7, 8, 0]);
        assert!(!handle.validity().control);

        let mut short = [0i64; 1];
        assert!(matches!(handle.copy_into(&mut short), Err(Error::BadValue(_))));
    }
}
