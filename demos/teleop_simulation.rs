// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::Sender;
use franka_teleop::{
    CartesianPose, CollisionBehaviorService, ControlLoop, ControllerInterface,
    ControllerParameters, ControllerServices, HardwareInterface, IkErrorCode, IkRequest,
    IkResponse, IkService, JointImpedanceIkController, JointQuantity, JointState,
    RealtimeConfig, RobotDescriptionProvider, RobotModel, SetCollisionBehaviorRequest,
    SetCollisionBehaviorResponse, TeleopException, TeleopResult, TwistCommand, Vector7,
};
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use tracing::info;

/// Teleoperates a simulated arm with a scripted operator.
///
/// The simulated arm uses toy kinematics: joints 1 to 3 translate the end effector along x, y
/// and z, joints 4 to 6 rotate it by roll, pitch and yaw. Every joint has unit inertia. The
/// inverse kinematics solver inverts these kinematics exactly.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct CommandLineArguments {
    /// Controller parameters as YAML. Built-in gains are used if omitted.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Control frequency in Hz.
    #[clap(long, default_value_t = 1000.)]
    pub frequency: f64,
    /// Duration of the simulation in seconds.
    #[clap(long, default_value_t = 2.)]
    pub duration: f64,
    /// Upwards velocity command of the operator in [-1, 1].
    #[clap(long, default_value_t = 0.5)]
    pub up: f64,
    /// Yaw velocity command of the operator in [-1, 1].
    #[clap(long, default_value_t = 0.2)]
    pub yaw: f64,
}

const BASE_POSITION: [f64; 3] = [0.3, 0., 0.5];

/// End effector pose as column-major homogeneous transformation, like `O_T_EE` of a Franka
/// robot state.
fn forward_kinematics(q: &Vector7) -> [f64; 16] {
    let transform = Isometry3::from_parts(
        Translation3::from(Vector3::from(BASE_POSITION) + Vector3::new(q[0], q[1], q[2])),
        UnitQuaternion::from_euler_angles(q[3], q[4], q[5]),
    )
    .to_homogeneous();
    let mut o_t_ee = [0.; 16];
    o_t_ee.copy_from_slice(transform.as_slice());
    o_t_ee
}

struct SimulatedArm {
    arm_id: String,
    q: Vector7,
    dq: Vector7,
    tau: Vector7,
    dt: f64,
}

impl SimulatedArm {
    fn new(arm_id: &str, frequency: f64) -> Self {
        SimulatedArm {
            arm_id: arm_id.to_string(),
            q: Vector7::zeros(),
            dq: Vector7::zeros(),
            tau: Vector7::zeros(),
            dt: 1. / frequency,
        }
    }

    fn step(&mut self) {
        self.dq += self.tau * self.dt;
        self.q += self.dq * self.dt;
    }
}

impl HardwareInterface for SimulatedArm {
    fn state_interface_names(&self) -> Vec<String> {
        let mut names: Vec<String> = JointQuantity::ALL
            .iter()
            .flat_map(|quantity| {
                (1..=7).map(move |joint| format!("{}_joint{}/{}", self.arm_id, joint, quantity))
            })
            .collect();
        names.push(format!("{}/robot_model", self.arm_id));
        names.push(format!("{}/robot_state", self.arm_id));
        names
    }

    fn command_interface_names(&self) -> Vec<String> {
        (1..=7)
            .map(|joint| format!("{}_joint{}/effort", self.arm_id, joint))
            .collect()
    }

    fn read_state(&self, index: usize) -> TeleopResult<f64> {
        let (quantity, joint) = (index / 7, index % 7);
        match quantity {
            0 => Ok(self.q[joint]),
            1 => Ok(self.dq[joint]),
            2 => Ok(self.tau[joint]),
            _ => Err(TeleopException::HardwareException {
                message: format!("state interface {} cannot be read as a value", index),
            }),
        }
    }

    fn write_command(&mut self, index: usize, value: f64) -> TeleopResult<()> {
        if index >= 7 {
            return Err(TeleopException::HardwareException {
                message: format!("no command interface {}", index),
            });
        }
        self.tau[index] = value;
        // the arm moves once all joints have been commanded
        if index == 6 {
            self.step();
        }
        Ok(())
    }

    fn current_pose(&self) -> TeleopResult<CartesianPose> {
        CartesianPose::from_homogeneous(&forward_kinematics(&self.q))
    }
}

struct SimulatedModel;

impl RobotModel for SimulatedModel {
    fn coriolis(&self, _state: &JointState) -> TeleopResult<Vector7> {
        Ok(Vector7::zeros())
    }
}

struct ToyIkSolver;

impl IkService for ToyIkSolver {
    fn wait_for_service(&self, _timeout: Duration) -> bool {
        true
    }

    fn compute_ik(&mut self, request: &IkRequest) -> TeleopResult<IkResponse> {
        let offset = request.pose.position - Vector3::from(BASE_POSITION);
        if offset.norm() > 0.5 {
            return Ok(IkResponse::failure(IkErrorCode::NoIkSolution));
        }
        let (roll, pitch, yaw) = request.pose.orientation.euler_angles();
        Ok(IkResponse::success(vec![
            offset.x,
            offset.y,
            offset.z,
            roll,
            pitch,
            yaw,
            request.joint_state.q[6],
        ]))
    }
}

struct AcceptingCollisionService;

impl CollisionBehaviorService for AcceptingCollisionService {
    fn wait_for_service(&self, _timeout: Duration) -> bool {
        true
    }

    fn set_full_collision_behavior(
        &mut self,
        request: &SetCollisionBehaviorRequest,
    ) -> TeleopResult<SetCollisionBehaviorResponse> {
        info!(?request, "simulated collision behavior set");
        Ok(SetCollisionBehaviorResponse {
            success: true,
            error: String::new(),
        })
    }
}

struct StaticDescription(String);

impl RobotDescriptionProvider for StaticDescription {
    fn wait_for_service(&self, _timeout: Duration) -> bool {
        true
    }

    fn robot_description(&mut self) -> TeleopResult<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

fn scripted_operator(commands: Sender<TwistCommand>, up: f64, yaw: f64, duration: Duration) {
    let start = std::time::Instant::now();
    while start.elapsed() < duration {
        let command = TwistCommand::new([0., 0., up], [0., 0., yaw]);
        if commands.send(command).is_err() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    commands.send(TwistCommand::default()).ok();
}

fn main() -> TeleopResult<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();
    let args = CommandLineArguments::parse();

    let parameters = match &args.config {
        Some(path) => ControllerParameters::from_file(path)?,
        None => ControllerParameters::new(
            "fr3",
            false,
            Some(vec![24.0, 24.0, 24.0, 24.0, 10.0, 6.0, 2.0]),
            Some(vec![2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 0.5]),
        ),
    };
    let services = ControllerServices {
        ik: Box::new(ToyIkSolver),
        collision_behavior: Box::new(AcceptingCollisionService),
        robot_description: Box::new(StaticDescription(format!(
            r#"<robot name="{}"><link name="{}_link0"/></robot>"#,
            parameters.arm_id, parameters.arm_id
        ))),
    };
    let mut controller = JointImpedanceIkController::new(parameters, SimulatedModel, services);
    controller.on_configure()?;
    let arm = SimulatedArm::new(controller.arm_id(), args.frequency);
    let initial_pose = arm.current_pose()?;
    controller.on_activate(arm)?;

    let (sender, receiver) = crossbeam_channel::bounded(10);
    let listener = controller
        .teleop()
        .spawn_listener(receiver)
        .map_err(|error| TeleopException::StartupException {
            message: error.to_string(),
        })?;
    let duration = Duration::from_secs_f64(args.duration);
    let (up, yaw) = (args.up, args.yaw);
    let operator = thread::spawn(move || scripted_operator(sender, up, yaw, duration));

    let iterations = (args.duration * args.frequency) as u64;
    ControlLoop::new(&mut controller, args.frequency, RealtimeConfig::Ignore, 50)?
        .with_max_iterations(iterations)
        .run()?;

    let arm = controller.on_deactivate()?;
    operator.join().ok();
    listener.join().ok();

    let final_pose = arm.current_pose()?;
    info!(
        start = ?initial_pose.position,
        end = ?final_pose.position,
        rotation = final_pose.orientation.angle_to(&initial_pose.orientation),
        "simulation finished"
    );
    if let Some(statistics) = controller.ik_statistics() {
        info!(
            dispatched = statistics.dispatched(),
            dropped = statistics.dropped(),
            solved = statistics.solved(),
            failed = statistics.failed(),
            "inverse kinematics"
        );
    }
    Ok(())
}
