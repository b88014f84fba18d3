// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the teleoperation controller and everything it needs to drive the arm.

pub mod cartesian_target;
pub mod control_loop;
mod control_tools;
pub mod control_types;
pub mod controller;
pub mod error;
pub mod hardware;
pub mod ik_bridge;
pub mod impedance;
pub mod logger;
pub mod low_pass_filter;
pub mod robot_control;
pub mod robot_state;
pub mod service_types;
pub mod startup;
pub mod teleop;
