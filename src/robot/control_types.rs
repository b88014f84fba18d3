// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains helper types for poses and joint-level torque commands.

use nalgebra::{Isometry3, Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::exception::{TeleopException, TeleopResult};
use crate::robot::robot_state::JointState;
use crate::utils::{array_to_isometry, is_homogeneous_transformation, Vector7};

/// Used to decide whether to enforce realtime mode for a control loop thread.
/// see [`ControlLoop`](`crate::ControlLoop`)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RealtimeConfig {
    Enforce,
    Ignore,
}

/// Position and orientation of the end effector in the base frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CartesianPose {
    /// Translation in \[m\].
    pub position: Vector3<f64>,
    /// Orientation as unit quaternion.
    pub orientation: UnitQuaternion<f64>,
}

impl CartesianPose {
    /// Creates a new pose. The orientation is renormalized.
    pub fn new(position: Vector3<f64>, orientation: Quaternion<f64>) -> Self {
        CartesianPose {
            position,
            orientation: UnitQuaternion::new_normalize(orientation),
        }
    }

    /// Creates a pose from a 4x4 homogeneous transformation matrix in column-major format,
    /// e.g. the `O_T_EE` field of a Franka robot state.
    /// # Errors
    /// * HardwareException if the matrix is not a valid homogeneous transformation.
    pub fn from_homogeneous(transform: &[f64; 16]) -> TeleopResult<Self> {
        if !is_homogeneous_transformation(transform) {
            return Err(TeleopException::HardwareException {
                message: "end effector pose is not a valid homogeneous transformation".to_string(),
            });
        }
        Ok(array_to_isometry(transform).into())
    }
}

impl Default for CartesianPose {
    fn default() -> Self {
        CartesianPose {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl From<Isometry3<f64>> for CartesianPose {
    fn from(transform: Isometry3<f64>) -> Self {
        CartesianPose {
            position: transform.translation.vector,
            orientation: transform.rotation,
        }
    }
}

/// Stores joint-level torque commands.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
#[allow(non_snake_case)]
pub struct Torques {
    /// Desired torques in \[Nm\].
    pub tau_J: [f64; 7],
}

impl From<Vector7> for Torques {
    fn from(vector: Vector7) -> Self {
        Torques::new(vector.into())
    }
}

impl Torques {
    /// Creates a new Torques instance
    /// # Arguments
    /// * `torques` - Desired joint-level torques in \[Nm\].
    pub fn new(torques: [f64; 7]) -> Self {
        Torques { tau_J: torques }
    }
}

/// Result of one control cycle.
#[derive(Debug, Clone)]
pub struct CycleOutput {
    /// Joint state which was read at the beginning of the cycle.
    pub state: JointState,
    /// Torques written to the hardware. `None` while no inverse kinematics solution has been
    /// received yet, in which case nothing was written.
    pub torques: Option<Torques>,
}

impl CycleOutput {
    /// true if torques were written during the cycle.
    pub fn is_commanded(&self) -> bool {
        self.torques.is_some()
    }
}

#[cfg(test)]
mod tests {
    use crate::robot::control_types::{CartesianPose, Torques};
    use crate::utils::Vector7;
    use nalgebra::{Quaternion, Vector3};

    #[test]
    fn pose_is_renormalized() {
        let pose = CartesianPose::new(Vector3::zeros(), Quaternion::new(2., 0., 0., 0.));
        assert!((pose.orientation.into_inner().norm() - 1.).abs() < 1e-12);
        assert!(pose.orientation.angle().abs() < 1e-12);
    }

    #[test]
    fn pose_from_invalid_matrix_fails() {
        let transform = [0.; 16];
        assert!(CartesianPose::from_homogeneous(&transform).is_err());
    }

    #[test]
    fn pose_from_matrix() {
        let transform = [
            1., 0., 0., 0., 0., -1., 0., 0., 0., 0., -1., 0., 0.3, 0., 0.48, 1.,
        ];
        let pose = CartesianPose::from_homogeneous(&transform).unwrap();
        assert_eq!(pose.position, Vector3::new(0.3, 0., 0.48));
        assert!((pose.orientation.angle() - std::f64::consts::PI).abs() < 1e-9);
    }

    #[test]
    fn torques_from_vector() {
        let torques: Torques = Vector7::from_element(1.5).into();
        assert_eq!(torques.tau_J, [1.5; 7]);
    }
}
