// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later
use std::time::Duration;

use crate::exception::TeleopResult;
use crate::robot::control_types::CycleOutput;
use crate::robot::hardware::HardwareInterface;

/// Lifecycle state of a controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, parameters not yet validated.
    Unconfigured,
    /// Configured, but not driving the hardware.
    Inactive,
    /// Owns the hardware and is updated every cycle.
    Active,
}

/// A controller which can be driven by any host that calls the lifecycle hooks in order:
/// [`on_configure`](`Self::on_configure`) once, then any number of
/// [`on_activate`](`Self::on_activate`), [`update`](`Self::update`)...,
/// [`on_deactivate`](`Self::on_deactivate`) sequences.
pub trait ControllerInterface {
    type Hardware: HardwareInterface;

    /// Names of the command interfaces the controller writes.
    fn command_interface_configuration(&self) -> Vec<String>;
    /// Names of the state interfaces the controller reads.
    fn state_interface_configuration(&self) -> Vec<String>;
    /// Validates the parameters and performs the startup handshake. May block.
    fn on_configure(&mut self) -> TeleopResult<()>;
    /// Takes ownership of the hardware and prepares the first cycle.
    fn on_activate(&mut self, hardware: Self::Hardware) -> TeleopResult<()>;
    /// Stops cycling and hands the hardware back.
    fn on_deactivate(&mut self) -> TeleopResult<Self::Hardware>;
    /// Runs one control cycle. Never blocks.
    /// # Arguments
    /// * `period` - Time since the previous cycle.
    fn update(&mut self, period: &Duration) -> TeleopResult<CycleOutput>;
    fn lifecycle_state(&self) -> LifecycleState;
}
