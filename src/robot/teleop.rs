// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Maps operator velocity commands to bounded Cartesian pose increments.
use std::sync::Arc;
use std::thread::JoinHandle;

use arc_swap::ArcSwap;
use crossbeam_channel::Receiver;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Velocity intent of the operator, e.g. from a space mouse.
///
/// Every component is the fraction of the maximum speed and is expected in \[-1, 1\].
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Default)]
pub struct TwistCommand {
    /// Translational intent (x, y, z).
    pub linear: [f64; 3],
    /// Rotational intent (roll, pitch, yaw).
    pub angular: [f64; 3],
}

impl TwistCommand {
    pub fn new(linear: [f64; 3], angular: [f64; 3]) -> Self {
        TwistCommand { linear, angular }
    }
}

/// Largest pose increment a single command can produce.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct TeleopScaling {
    /// Translation for a full scale command in \[m\].
    #[serde(default = "TeleopScaling::default_linear")]
    pub max_linear_pos_update: f64,
    /// Rotation for a full scale command in \[rad\].
    #[serde(default = "TeleopScaling::default_angular")]
    pub max_angular_pos_update: f64,
}

impl TeleopScaling {
    // A tradeoff between precision and speed, larger values move faster but less precisely.
    fn default_linear() -> f64 {
        0.007
    }
    fn default_angular() -> f64 {
        0.03
    }
}

impl Default for TeleopScaling {
    fn default() -> Self {
        TeleopScaling {
            max_linear_pos_update: TeleopScaling::default_linear(),
            max_angular_pos_update: TeleopScaling::default_angular(),
        }
    }
}

/// Pose increment requested by the latest operator command.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TeleopDelta {
    /// Translation in \[m\], expressed in the base frame.
    pub translation: Vector3<f64>,
    /// Scaled (roll, pitch, yaw) in \[rad\].
    pub rotation_angles: Vector3<f64>,
    /// `Rz(yaw) * Ry(pitch) * Rx(roll)`, applied in the end effector frame.
    pub orientation: UnitQuaternion<f64>,
}

impl Default for TeleopDelta {
    fn default() -> Self {
        TeleopDelta {
            translation: Vector3::zeros(),
            rotation_angles: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl TeleopDelta {
    /// Converts an operator command into a pose increment.
    ///
    /// Each component is clamped to \[-1, 1\] (non-finite components count as zero) before it
    /// is scaled, so no command can exceed the configured increments.
    pub fn from_command(command: &TwistCommand, scaling: &TeleopScaling) -> Self {
        let linear = clamped(&command.linear);
        let angular = clamped(&command.angular);
        let translation = scaling.max_linear_pos_update * linear;
        let rotation_angles = scaling.max_angular_pos_update * angular;
        let roll = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), rotation_angles.x);
        let pitch = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), rotation_angles.y);
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), rotation_angles.z);
        TeleopDelta {
            translation,
            rotation_angles,
            orientation: yaw * pitch * roll,
        }
    }
}

fn clamped(components: &[f64; 3]) -> Vector3<f64> {
    Vector3::from_iterator(components.iter().map(|&x| {
        if x.is_finite() {
            x.clamp(-1., 1.)
        } else {
            0.
        }
    }))
}

/// Holds the latest pose increment.
///
/// Every command replaces the previous increment as a whole. Readers always see one complete
/// increment, never a mix of two. Cloning yields another handle to the same increment.
#[derive(Clone)]
pub struct TeleopDeltaMapper {
    scaling: TeleopScaling,
    latest: Arc<ArcSwap<TeleopDelta>>,
}

impl TeleopDeltaMapper {
    /// Creates a mapper whose increment is initially zero.
    pub fn new(scaling: TeleopScaling) -> Self {
        TeleopDeltaMapper {
            scaling,
            latest: Arc::new(ArcSwap::from_pointee(TeleopDelta::default())),
        }
    }

    /// Converts the command and publishes it as the latest increment.
    pub fn on_command(&self, command: &TwistCommand) {
        let delta = TeleopDelta::from_command(command, &self.scaling);
        self.latest.store(Arc::new(delta));
    }

    /// Latest published increment.
    pub fn latest(&self) -> TeleopDelta {
        **self.latest.load()
    }

    /// Resets the increment to zero, e.g. when the command stream is lost.
    pub fn clear(&self) {
        self.latest.store(Arc::new(TeleopDelta::default()));
    }

    /// Spawns a thread which applies every command received on `commands`.
    ///
    /// The thread finishes once all senders are dropped.
    pub fn spawn_listener(&self, commands: Receiver<TwistCommand>) -> std::io::Result<JoinHandle<()>> {
        let mapper = self.clone();
        std::thread::Builder::new()
            .name("teleop-commands".to_string())
            .spawn(move || {
                for command in commands.iter() {
                    mapper.on_command(&command);
                }
                debug!("teleop command stream closed");
            })
    }
}
