// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Composes the inverse kinematics target from the current pose and the latest increment.
use nalgebra::UnitQuaternion;

use crate::robot::control_types::CartesianPose;
use crate::robot::teleop::TeleopDelta;

/// Applies a pose increment to the current end effector pose.
///
/// The translation is added in the base frame. The rotation is right-multiplied and therefore
/// applied in the current end effector frame.
pub fn compose_target(current: &CartesianPose, delta: &TeleopDelta) -> CartesianPose {
    let orientation = current.orientation * delta.orientation;
    CartesianPose {
        position: current.position + delta.translation,
        orientation: UnitQuaternion::new_normalize(orientation.into_inner()),
    }
}

#[cfg(test)]
mod tests {
    use crate::robot::cartesian_target::compose_target;
    use crate::robot::control_types::CartesianPose;
    use crate::robot::teleop::{TeleopDelta, TeleopScaling, TwistCommand};
    use nalgebra::{UnitQuaternion, Vector3};
    use std::f64::consts::FRAC_PI_2;

    fn current() -> CartesianPose {
        CartesianPose {
            position: Vector3::new(0.3, 0., 0.5),
            orientation: UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2),
        }
    }

    #[test]
    fn zero_delta_keeps_pose() {
        let target = compose_target(&current(), &TeleopDelta::default());
        assert_eq!(target.position, current().position);
        assert!(target.orientation.angle_to(&current().orientation) < 1e-12);
    }

    #[test]
    fn translation_is_added() {
        let delta = TeleopDelta::from_command(
            &TwistCommand::new([1., 0., -1.], [0.; 3]),
            &TeleopScaling::default(),
        );
        let target = compose_target(&current(), &delta);
        assert!((target.position - Vector3::new(0.307, 0., 0.493)).norm() < 1e-12);
    }

    #[test]
    fn yaw_rotates_about_end_effector_z() {
        let delta = TeleopDelta::from_command(
            &TwistCommand::new([0.; 3], [0., 0., 1.]),
            &TeleopScaling::default(),
        );
        let current = current();
        let target = compose_target(&current, &delta);

        let local_z = current.orientation * Vector3::z();
        assert!((target.orientation * Vector3::z() - local_z).norm() < 1e-12);
        assert!((target.orientation.angle_to(&current.orientation) - 0.03).abs() < 1e-12);

        let world_frame = delta.orientation * current.orientation;
        assert!(target.orientation.angle_to(&world_frame) > 1e-3);
    }

    #[test]
    fn orientation_stays_normalized() {
        let delta = TeleopDelta::from_command(
            &TwistCommand::new([0.; 3], [1., 1., 1.]),
            &TeleopScaling::default(),
        );
        let mut pose = current();
        for _ in 0..10_000 {
            pose = compose_target(&pose, &delta);
        }
        assert!((pose.orientation.into_inner().norm() - 1.).abs() < 1e-12);
    }
}
