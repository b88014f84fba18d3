// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the dynamics model abstraction.
#[cfg(test)]
use mockall::automock;

use crate::exception::TeleopResult;
use crate::robot::robot_state::JointState;
use crate::utils::Vector7;

/// Name of the state interface which exposes the dynamics model of the arm.
pub static ROBOT_MODEL_INTERFACE_NAME: &str = "robot_model";
/// Name of the state interface which exposes the full robot state of the arm.
pub static ROBOT_STATE_INTERFACE_NAME: &str = "robot_state";

/// Calculates dynamic properties of the robot.
///
/// An implementation is handed to the controller when it is created and is owned by it until
/// the controller is dropped.
#[cfg_attr(test, automock)]
pub trait RobotModel: Send {
    /// Names of the state interfaces the model needs for the arm with the given id.
    fn state_interface_names(&self, arm_id: &str) -> Vec<String> {
        vec![
            format!("{}/{}", arm_id, ROBOT_MODEL_INTERFACE_NAME),
            format!("{}/{}", arm_id, ROBOT_STATE_INTERFACE_NAME),
        ]
    }

    /// Calculates the Coriolis force vector (state-space equation):
    /// ![c= C \times dq](https://latex.codecogs.com/png.latex?c=&space;C&space;\times&space;dq), in \[Nm\].
    /// # Arguments
    /// * `state` - Joint state of the current cycle.
    /// # Errors
    /// * HardwareException if the model cannot be evaluated.
    fn coriolis(&self, state: &JointState) -> TeleopResult<Vector7>;
}

#[cfg(test)]
mod tests {
    use crate::model::{MockRobotModel, RobotModel};
    use crate::robot::robot_state::JointState;
    use crate::utils::Vector7;

    struct ZeroModel;

    impl RobotModel for ZeroModel {
        fn coriolis(&self, _state: &JointState) -> crate::TeleopResult<Vector7> {
            Ok(Vector7::zeros())
        }
    }

    #[test]
    fn default_interface_names() {
        assert_eq!(
            ZeroModel.state_interface_names("fr3"),
            vec!["fr3/robot_model".to_string(), "fr3/robot_state".to_string()]
        );
    }

    #[test]
    fn mocked_model() {
        let mut model = MockRobotModel::new();
        model
            .expect_coriolis()
            .returning(|state| Ok(state.dq * 2.));
        let mut state = JointState::default();
        state.dq[2] = 1.;
        assert_eq!(model.coriolis(&state).unwrap()[2], 2.);
    }
}
