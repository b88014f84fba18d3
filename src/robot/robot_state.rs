// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the per-cycle joint state snapshot.
use crate::exception::{create_hardware_exception, TeleopResult};
use crate::robot::hardware::{HardwareInterface, JointInterfaces, JointQuantity};
use crate::utils::{Vector7, NUM_JOINTS};

/// Joint state of the arm at the beginning of one control cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(non_snake_case)]
pub struct JointState {
    /// ![q](https://latex.codecogs.com/png.latex?q)
    ///
    /// Measured joint position. Unit: \[rad\]
    pub q: Vector7,
    /// ![\dot{q}](https://latex.codecogs.com/png.latex?\dot{q})
    ///
    /// Measured joint velocity. Unit: \[rad/s\]
    pub dq: Vector7,
    /// ![\tau_{J}](https://latex.codecogs.com/png.latex?\tau_{J})
    ///
    /// Measured joint effort. Unit: \[Nm\]
    pub tau_J: Vector7,
}

impl Default for JointState {
    fn default() -> Self {
        JointState {
            q: Vector7::zeros(),
            dq: Vector7::zeros(),
            tau_J: Vector7::zeros(),
        }
    }
}

impl JointState {
    /// Reads position, velocity and effort of all joints.
    ///
    /// Either every value is read or the whole snapshot fails, stale values are never
    /// substituted.
    /// # Errors
    /// * HardwareException if any of the values cannot be read or is not finite.
    pub fn read<H: HardwareInterface + ?Sized>(
        hardware: &H,
        interfaces: &JointInterfaces,
    ) -> TeleopResult<Self> {
        let mut state = JointState::default();
        for joint in 0..NUM_JOINTS {
            state.q[joint] =
                hardware.read_state(interfaces.state_index(joint, JointQuantity::Position))?;
            state.dq[joint] =
                hardware.read_state(interfaces.state_index(joint, JointQuantity::Velocity))?;
            state.tau_J[joint] =
                hardware.read_state(interfaces.state_index(joint, JointQuantity::Effort))?;
        }
        if !state.is_finite() {
            return Err(create_hardware_exception(format!(
                "hardware reported a non-finite joint state: {:?}",
                state
            )));
        }
        Ok(state)
    }

    /// true if all values are finite.
    pub fn is_finite(&self) -> bool {
        self.q.iter().chain(self.dq.iter()).chain(self.tau_J.iter()).all(|x| x.is_finite())
    }
}
