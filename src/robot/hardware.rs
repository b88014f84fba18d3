// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the hardware abstraction consumed by the controller.
//!
//! The hardware layer exposes flat lists of named state and command interfaces. The controller
//! never addresses them by raw offsets. Instead it resolves [`JointInterfaces`] once on activation,
//! which maps every joint and every quantity to the index of the matching interface.
use std::fmt;

use crate::exception::{create_hardware_exception, TeleopResult};
use crate::robot::control_types::CartesianPose;
use crate::utils::{joint_name, NUM_JOINTS};

/// Quantity of a joint which is exposed as a hardware interface.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JointQuantity {
    Position,
    Velocity,
    Effort,
}

impl JointQuantity {
    /// All quantities in the order they are read during a cycle.
    pub const ALL: [JointQuantity; 3] = [
        JointQuantity::Position,
        JointQuantity::Velocity,
        JointQuantity::Effort,
    ];

    /// Name of the interface type, e.g. `position`.
    pub fn as_str(&self) -> &'static str {
        match self {
            JointQuantity::Position => "position",
            JointQuantity::Velocity => "velocity",
            JointQuantity::Effort => "effort",
        }
    }
}

impl fmt::Display for JointQuantity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full name of a joint interface, e.g. `fr3_joint4/velocity`.
/// # Arguments
/// * `arm_id` - Identifier of the arm.
/// * `joint` - Zero based joint index.
/// * `quantity` - Exposed quantity.
pub fn joint_interface_name(arm_id: &str, joint: usize, quantity: JointQuantity) -> String {
    format!("{}/{}", joint_name(arm_id, joint), quantity)
}

/// Readable and writable values exposed by the robot hardware.
pub trait HardwareInterface {
    /// Names of all readable state interfaces, in index order.
    fn state_interface_names(&self) -> Vec<String>;
    /// Names of all writable command interfaces, in index order.
    fn command_interface_names(&self) -> Vec<String>;
    /// Reads the state interface with the given index.
    fn read_state(&self, index: usize) -> TeleopResult<f64>;
    /// Writes the command interface with the given index.
    fn write_command(&mut self, index: usize, value: f64) -> TeleopResult<()>;
    /// Current end effector pose in the base frame.
    fn current_pose(&self) -> TeleopResult<CartesianPose>;
}

/// Indices of the joint interfaces of one arm, resolved by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointInterfaces {
    position: [usize; NUM_JOINTS],
    velocity: [usize; NUM_JOINTS],
    effort: [usize; NUM_JOINTS],
    command_effort: [usize; NUM_JOINTS],
}

impl JointInterfaces {
    /// Resolves the position, velocity and effort state interfaces and the effort command
    /// interfaces of all joints.
    /// # Errors
    /// * HardwareException if any of the interfaces is not exposed by the hardware.
    pub fn resolve<H: HardwareInterface + ?Sized>(
        arm_id: &str,
        hardware: &H,
    ) -> TeleopResult<Self> {
        let state_names = hardware.state_interface_names();
        let command_names = hardware.command_interface_names();
        let mut interfaces = JointInterfaces {
            position: [0; NUM_JOINTS],
            velocity: [0; NUM_JOINTS],
            effort: [0; NUM_JOINTS],
            command_effort: [0; NUM_JOINTS],
        };
        for joint in 0..NUM_JOINTS {
            for quantity in JointQuantity::ALL.iter() {
                let index = find_interface(
                    &state_names,
                    &joint_interface_name(arm_id, joint, *quantity),
                    "state",
                )?;
                match quantity {
                    JointQuantity::Position => interfaces.position[joint] = index,
                    JointQuantity::Velocity => interfaces.velocity[joint] = index,
                    JointQuantity::Effort => interfaces.effort[joint] = index,
                }
            }
            interfaces.command_effort[joint] = find_interface(
                &command_names,
                &joint_interface_name(arm_id, joint, JointQuantity::Effort),
                "command",
            )?;
        }
        Ok(interfaces)
    }

    /// Index of the state interface for the given joint and quantity.
    pub fn state_index(&self, joint: usize, quantity: JointQuantity) -> usize {
        match quantity {
            JointQuantity::Position => self.position[joint],
            JointQuantity::Velocity => self.velocity[joint],
            JointQuantity::Effort => self.effort[joint],
        }
    }

    /// Index of the effort command interface of the given joint.
    pub fn command_index(&self, joint: usize) -> usize {
        self.command_effort[joint]
    }
}

fn find_interface(names: &[String], wanted: &str, kind: &str) -> TeleopResult<usize> {
    names.iter().position(|name| name == wanted).ok_or_else(|| {
        create_hardware_exception(format!("{} interface {} is not available", kind, wanted))
    })
}
