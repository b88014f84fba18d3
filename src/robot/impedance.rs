// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the joint impedance torque law.
use crate::robot::low_pass_filter::{joint_exponential_smoothing, VELOCITY_FILTER_ALPHA};
use crate::utils::Vector7;

/// Renders every joint as a spring damper towards a desired joint configuration.
///
/// ![\tau = K (q_d - q) - D \dot{q}_f + c](https://latex.codecogs.com/png.latex?\tau=K(q_d-q)-D\dot{q}_f+c)
///
/// The measured velocity is smoothed with [`VELOCITY_FILTER_ALPHA`] before it enters the
/// damping term. The filter state is owned by this type and persists across cycles.
#[derive(Debug, Clone)]
pub struct JointImpedanceLaw {
    k_gains: Vector7,
    d_gains: Vector7,
    dq_filtered: Vector7,
}

impl JointImpedanceLaw {
    /// Creates a new torque law with a zeroed velocity filter.
    /// # Arguments
    /// * `k_gains` - Joint stiffness in \[Nm/rad\].
    /// * `d_gains` - Joint damping in \[Nm s/rad\].
    pub fn new(k_gains: Vector7, d_gains: Vector7) -> Self {
        JointImpedanceLaw {
            k_gains,
            d_gains,
            dq_filtered: Vector7::zeros(),
        }
    }

    /// Zeroes the velocity filter. Called on activation.
    pub fn reset(&mut self) {
        self.dq_filtered = Vector7::zeros();
    }

    /// Filtered joint velocity of the last cycle.
    pub fn filtered_velocity(&self) -> &Vector7 {
        &self.dq_filtered
    }

    /// Computes the torque command of one cycle and advances the velocity filter.
    /// # Arguments
    /// * `q_d` - Desired joint positions in \[rad\].
    /// * `q` - Measured joint positions in \[rad\].
    /// * `dq` - Measured joint velocities in \[rad/s\].
    /// * `coriolis` - Coriolis force vector of the current state in \[Nm\].
    /// # Return
    /// Desired joint torques in \[Nm\].
    pub fn compute_torque_command(
        &mut self,
        q_d: &Vector7,
        q: &Vector7,
        dq: &Vector7,
        coriolis: &Vector7,
    ) -> Vector7 {
        self.dq_filtered = joint_exponential_smoothing(VELOCITY_FILTER_ALPHA, dq, &self.dq_filtered);
        let q_error = q_d - q;
        self.k_gains.component_mul(&q_error) - self.d_gains.component_mul(&self.dq_filtered)
            + coriolis
    }
}
