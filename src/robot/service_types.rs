// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Request and response types of the services the controller talks to.
use std::fmt::Debug;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::robot::control_types::CartesianPose;
use crate::robot::error::IkErrorCode;
use crate::robot::robot_state::JointState;
use crate::utils::NUM_JOINTS;

/// Collision thresholds which are negotiated with the robot once before the first cycle.
///
/// Torque thresholds are in \[Nm\] per joint, force thresholds in \[N\] and \[Nm\] for
/// (x, y, z, R, P, Y).
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct SetCollisionBehaviorRequest {
    pub lower_torque_thresholds_acceleration: [f64; 7],
    pub upper_torque_thresholds_acceleration: [f64; 7],
    pub lower_torque_thresholds_nominal: [f64; 7],
    pub upper_torque_thresholds_nominal: [f64; 7],
    pub lower_force_thresholds_acceleration: [f64; 6],
    pub upper_force_thresholds_acceleration: [f64; 6],
    pub lower_force_thresholds_nominal: [f64; 6],
    pub upper_force_thresholds_nominal: [f64; 6],
}

impl SetCollisionBehaviorRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lower_torque_thresholds_acceleration: [f64; 7],
        upper_torque_thresholds_acceleration: [f64; 7],
        lower_torque_thresholds_nominal: [f64; 7],
        upper_torque_thresholds_nominal: [f64; 7],
        lower_force_thresholds_acceleration: [f64; 6],
        upper_force_thresholds_acceleration: [f64; 6],
        lower_force_thresholds_nominal: [f64; 6],
        upper_force_thresholds_nominal: [f64; 6],
    ) -> Self {
        SetCollisionBehaviorRequest {
            lower_torque_thresholds_acceleration,
            upper_torque_thresholds_acceleration,
            lower_torque_thresholds_nominal,
            upper_torque_thresholds_nominal,
            lower_force_thresholds_acceleration,
            upper_force_thresholds_acceleration,
            lower_force_thresholds_nominal,
            upper_force_thresholds_nominal,
        }
    }
}

impl Default for SetCollisionBehaviorRequest {
    /// The default collision behavior of the Franka robots.
    fn default() -> Self {
        let torques = [20.0, 20.0, 18.0, 18.0, 16.0, 14.0, 12.0];
        let forces = [20.0, 20.0, 20.0, 25.0, 25.0, 25.0];
        SetCollisionBehaviorRequest::new(
            torques, torques, torques, torques, forces, forces, forces, forces,
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SetCollisionBehaviorResponse {
    pub success: bool,
    /// Explanation given by the robot if the request was refused.
    #[serde(default)]
    pub error: String,
}

/// Inverse kinematics request for one target pose.
#[derive(Debug, Clone)]
pub struct IkRequest {
    /// Planning group, e.g. `fr3_arm`.
    pub group_name: Arc<str>,
    /// Frame the target pose is expressed in, e.g. `fr3_link0`.
    pub frame_id: Arc<str>,
    /// Target pose of the end effector.
    pub pose: CartesianPose,
    /// Names of the joints in the order of the joint state.
    pub joint_names: Arc<[String; NUM_JOINTS]>,
    /// Current joint state used as seed.
    pub joint_state: JointState,
    /// Link the pose refers to. `None` uses the tip of the planning group.
    pub ik_link_name: Option<Arc<str>>,
}

/// Answer of an inverse kinematics service.
#[derive(Debug, Clone, PartialEq)]
pub struct IkResponse {
    /// Raw result code, see [`IkErrorCode`].
    pub error_code: i32,
    /// Joint positions of the solution in the order of the request's joint names.
    pub solution: Vec<f64>,
}

impl IkResponse {
    pub fn success(solution: Vec<f64>) -> Self {
        IkResponse {
            error_code: IkErrorCode::Success as i32,
            solution,
        }
    }

    pub fn failure(code: IkErrorCode) -> Self {
        IkResponse {
            error_code: code as i32,
            solution: Vec::new(),
        }
    }

    pub fn result(&self) -> IkErrorCode {
        IkErrorCode::from_code(self.error_code)
    }
}

#[cfg(test)]
mod tests {
    use crate::robot::error::IkErrorCode;
    use crate::robot::service_types::{
        IkResponse, SetCollisionBehaviorRequest, SetCollisionBehaviorResponse,
    };

    #[test]
    fn default_collision_behavior() {
        let request = SetCollisionBehaviorRequest::default();
        assert_eq!(
            request.upper_torque_thresholds_nominal,
            [20.0, 20.0, 18.0, 18.0, 16.0, 14.0, 12.0]
        );
        assert_eq!(
            request.lower_force_thresholds_acceleration,
            [20.0, 20.0, 20.0, 25.0, 25.0, 25.0]
        );
    }

    #[test]
    fn collision_response_from_yaml() {
        let response: SetCollisionBehaviorResponse =
            serde_yaml::from_str("success: true").unwrap();
        assert!(response.success);
        assert!(response.error.is_empty());
    }

    #[test]
    fn ik_response_result() {
        assert_eq!(
            IkResponse::success(vec![0.; 7]).result(),
            IkErrorCode::Success
        );
        assert_eq!(
            IkResponse::failure(IkErrorCode::NoIkSolution).result(),
            IkErrorCode::NoIkSolution
        );
    }
}
