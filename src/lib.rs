// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! # franka-teleop
//! franka-teleop is the control core for teleoperating [Franka](https://franka.de) research
//! robots with a space mouse or any other source of velocity commands.
//!
//! **ALWAYS HAVE THE USER STOP BUTTON AT
//! HAND WHILE CONTROLLING THE ROBOT!**
//!
//! ## Design
//! Every operator command is turned into a small Cartesian increment. Each control cycle applies
//! the latest increment to the current end effector pose and hands the resulting target to an
//! external inverse kinematics service. The answer arrives asynchronously on a worker thread and
//! replaces the desired joint configuration. Meanwhile every cycle drives the joints towards the
//! latest known configuration with a joint impedance law
//!
//! ![\tau = K (q_d - q) - D \dot{q}_f + c](https://latex.codecogs.com/png.latex?\tau&space;=&space;K&space;(q_d&space;-&space;q)&space;-&space;D&space;\dot{q}_f&space;+&space;c)
//!
//! where the velocity is low pass filtered and `c` is the Coriolis force vector. The cycle never
//! waits for the solver. Before the first solution is received the controller writes nothing.
//!
//! The library is divided into these modules:
//! * [config](`crate::config`) - the controller parameters and their validation.
//! * [model](`crate::model`) - the dynamics model abstraction.
//! * [robot](`crate::robot`) - the controller, its hardware abstraction and the control loop.
//!
//! # Example:
//!```no_run
//! use franka_teleop::{
//!     ControlLoop, ControllerInterface, ControllerParameters, ControllerServices,
//!     HardwareInterface, JointImpedanceIkController, RealtimeConfig, RobotModel, TeleopResult,
//!     TwistCommand,
//! };
//! # fn connect<H, M>() -> (ControllerServices, H, M) { unimplemented!() }
//! fn run<H: HardwareInterface, M: RobotModel>() -> TeleopResult<()> {
//!     let parameters = ControllerParameters::from_file("config/joint_impedance_ik_controller.yaml")?;
//!     let (services, hardware, model): (ControllerServices, H, M) = connect();
//!     let mut controller = JointImpedanceIkController::new(parameters, model, services);
//!     controller.on_configure()?;
//!     controller.on_activate(hardware)?;
//!
//!     let (sender, receiver) = crossbeam_channel::unbounded();
//!     let _listener = controller.teleop().spawn_listener(receiver);
//!     sender.send(TwistCommand::new([0., 0., 0.5], [0.; 3])).ok();
//!
//!     ControlLoop::new(&mut controller, 1000., RealtimeConfig::Enforce, 50)?
//!         .with_max_iterations(10_000)
//!         .run()?;
//!     controller.on_deactivate()?;
//!     Ok(())
//! }
//! ```
//!
//! All fallible functions return a [`TeleopResult`]. Errors before activation (invalid gains,
//! a refused collision behavior) prevent the controller from ever running a cycle. Errors during
//! a cycle end the [`ControlLoop`] with a
//! [`ControlException`](`crate::exception::TeleopException::ControlException`) which carries the
//! last cycles.
//!
//! Logging goes through [`tracing`](https://docs.rs/tracing). Install a subscriber to see it.

pub mod config;
pub mod exception;
pub mod robot;

pub mod model;
pub mod utils;

pub use config::{ControllerConfig, ControllerParameters};
pub use exception::{TeleopException, TeleopResult};
pub use model::RobotModel;
pub use robot::control_loop::ControlLoop;
pub use robot::control_types::*;
pub use robot::controller::{ControllerServices, JointImpedanceIkController};
pub use robot::error::IkErrorCode;
pub use robot::hardware::{HardwareInterface, JointInterfaces, JointQuantity};
pub use robot::ik_bridge::{DesiredJointConfiguration, IkService};
pub use robot::logger::Record;
pub use robot::robot_control::{ControllerInterface, LifecycleState};
pub use robot::robot_state::JointState;
pub use robot::service_types::{
    IkRequest, IkResponse, SetCollisionBehaviorRequest, SetCollisionBehaviorResponse,
};
pub use robot::startup::{CollisionBehaviorService, RobotDescriptionProvider};
pub use robot::teleop::{TeleopDeltaMapper, TeleopScaling, TwistCommand};
pub use utils::*;
