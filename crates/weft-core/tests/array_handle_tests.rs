//! Array handle state transitions on every device

use weft_core::{ArrayHandle, DeviceAdapter, Error, Id, ParallelDevice, Result, SerialDevice, StagedDevice, Validity};

const USER_ONLY: Validity = Validity {
    user: true,
    control: false,
    execution: false,
};

macro_rules! handle_tests {
    ($name:ident, $device:ty) => {
        mod $name {
            use super::*;

            type Device = $device;
            type Handle = ArrayHandle<Id, Device>;

            #[test]
            fn test_input_preparation_keeps_user_data() -> Result<()> {
                let handle = Handle::from_vec((0..64).collect());
                assert_eq!(handle.validity(), USER_ONLY);

                let portal = handle.prepare_for_input()?;
                assert_eq!(portal.len(), 64);
                assert_eq!(portal.get(63), 63);
                assert_eq!(
                    handle.validity(),
                    Validity {
                        user: true,
                        control: false,
                        execution: true
                    }
                );

                let control = handle.portal_const_control()?;
                assert_eq!(control.to_vec(), (0..64).collect::<Vec<_>>());
                if Device::SHARES_CONTROL_MEMORY {
                    assert_eq!(control.addr(), portal.addr());
                } else {
                    assert_ne!(control.addr(), portal.addr());
                }
                Ok(())
            }

            #[test]
            fn test_output_then_control_read() -> Result<()> {
                let handle = Handle::from_vec(vec![7; 3]);
                let portal = handle.prepare_for_output(5)?;
                for index in 0..5 {
                    // SAFETY: single-threaded writer.
                    unsafe { portal.set(index, index as Id * 2) };
                }
                assert_eq!(handle.number_of_values(), 5);
                assert_eq!(handle.to_vec()?, vec![0, 2, 4, 6, 8]);
                assert_eq!(
                    handle.validity(),
                    Validity {
                        user: false,
                        control: true,
                        execution: true
                    }
                );
                Ok(())
            }

            #[test]
            fn test_in_place_after_output() -> Result<()> {
                let handle = Handle::new();
                let output = handle.prepare_for_output(4)?;
                // SAFETY: single-threaded writer.
                unsafe { output.set(2, 9) };

                let in_place = handle.prepare_for_in_place()?;
                assert_eq!(in_place.get(2), 9);
                // SAFETY: single-threaded writer.
                unsafe { in_place.set(3, 10) };
                assert_eq!(handle.to_vec()?, vec![0, 0, 9, 10]);
                Ok(())
            }

            #[test]
            fn test_release_execution_keeps_control_data() -> Result<()> {
                let handle = Handle::from_vec(vec![1, 2, 3]);
                handle.prepare_for_input()?;
                handle.release_resources_execution();
                assert_eq!(handle.validity(), USER_ONLY);
                assert_eq!(handle.to_vec()?, vec![1, 2, 3]);
                Ok(())
            }

            #[test]
            fn test_release_execution_loses_execution_only_data() -> Result<()> {
                let handle = Handle::new();
                handle.prepare_for_output(3)?;
                handle.release_resources_execution();
                assert_eq!(handle.number_of_values(), 0);
                assert!(matches!(handle.to_vec(), Err(Error::BadValue(_))));
                Ok(())
            }

            #[test]
            fn test_release_resources() -> Result<()> {
                let handle = Handle::from_vec(vec![1, 2, 3]);
                handle.prepare_for_output(10)?;
                handle.to_vec()?;
                handle.release_resources();
                assert_eq!(handle.validity(), Validity::default());
                assert!(matches!(
                    handle.prepare_for_input(),
                    Err(Error::BadValue(message)) if message == "ArrayHandle has no data when PrepareForInput called."
                ));
                Ok(())
            }

            #[test]
            fn test_copy_into_short_destination() -> Result<()> {
                let handle = Handle::from_vec(vec![1, 2, 3]);
                let mut short = [0; 2];
                assert!(matches!(handle.copy_into(&mut short), Err(Error::BadValue(_))));

                handle.prepare_for_input()?;
                assert!(matches!(handle.copy_into(&mut short), Err(Error::BadValue(_))));
                Ok(())
            }

            #[test]
            fn test_clone_observes_changes() -> Result<()> {
                let handle = Handle::from_vec(vec![1, 2, 3]);
                let clone = handle.clone();
                let portal = handle.prepare_for_in_place()?;
                // SAFETY: single-threaded writer.
                unsafe { portal.set(0, 100) };
                assert_eq!(clone.to_vec()?, vec![100, 2, 3]);
                Ok(())
            }
        }
    };
}

handle_tests!(serial, SerialDevice);
handle_tests!(parallel, ParallelDevice);
handle_tests!(staged, StagedDevice);

#[test]
fn test_staged_transfers_once_per_transition() -> Result<()> {
    let handle = ArrayHandle::<Id, StagedDevice>::from_vec(vec![5; 100]);
    for _ in 0..3 {
        handle.prepare_for_input()?;
    }
    assert_eq!(handle.transfer_counts().host_to_device, 1);

    handle.prepare_for_in_place()?;
    for _ in 0..3 {
        handle.to_vec()?;
    }
    assert_eq!(handle.transfer_counts().device_to_host, 1);
    Ok(())
}

#[test]
fn test_shared_devices_never_copy() -> Result<()> {
    let handle = ArrayHandle::<Id, SerialDevice>::from_vec(vec![5; 100]);
    handle.prepare_for_in_place()?;
    handle.to_vec()?;
    assert_eq!(handle.transfer_counts(), Default::default());
    Ok(())
}
