// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the joint impedance controller which follows operator commands through inverse
//! kinematics.
//!
//! Per cycle the controller
//! 1. reads the joint state and the current end effector pose,
//! 2. applies the latest operator increment to the pose,
//! 3. hands the resulting target to the inverse kinematics worker without waiting for it,
//! 4. drives the joints towards the latest solution with the impedance law.
//!
//! Until the first solution arrives nothing is written to the hardware.
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{ControllerConfig, ControllerParameters};
use crate::exception::{
    create_hardware_exception, create_lifecycle_exception, TeleopException, TeleopResult,
};
use crate::model::RobotModel;
use crate::robot::cartesian_target::compose_target;
use crate::robot::control_types::{CycleOutput, Torques};
use crate::robot::hardware::{joint_interface_name, HardwareInterface, JointInterfaces, JointQuantity};
use crate::robot::ik_bridge::{
    DesiredJointConfiguration, IkBridgeStatistics, IkRequestBuilder, IkResolverBridge, IkService,
};
use crate::robot::impedance::JointImpedanceLaw;
use crate::robot::robot_control::{ControllerInterface, LifecycleState};
use crate::robot::robot_state::JointState;
use crate::robot::startup::{
    negotiate_collision_behavior, resolve_arm_id, wait_for_service, CollisionBehaviorService,
    RobotDescriptionProvider, ServiceAvailability,
};
use crate::robot::teleop::TeleopDeltaMapper;
use crate::utils::NUM_JOINTS;

/// External services the controller talks to.
pub struct ControllerServices {
    /// Inverse kinematics solver, handed to the solver worker on configuration.
    pub ik: Box<dyn IkService>,
    /// Used once during configuration.
    pub collision_behavior: Box<dyn CollisionBehaviorService>,
    /// Used once during configuration.
    pub robot_description: Box<dyn RobotDescriptionProvider>,
}

struct ActiveHardware<H> {
    hardware: H,
    interfaces: JointInterfaces,
}

/// Joint impedance controller whose target is computed by an external inverse kinematics
/// service from operator velocity commands.
pub struct JointImpedanceIkController<H: HardwareInterface, M: RobotModel> {
    parameters: ControllerParameters,
    model: M,
    ik_service: Option<Box<dyn IkService>>,
    collision_behavior: Box<dyn CollisionBehaviorService>,
    robot_description: Box<dyn RobotDescriptionProvider>,
    interrupted: Arc<AtomicBool>,
    arm_id: String,
    config: Option<ControllerConfig>,
    teleop: TeleopDeltaMapper,
    desired: DesiredJointConfiguration,
    bridge: Option<IkResolverBridge>,
    law: Option<JointImpedanceLaw>,
    active: Option<ActiveHardware<H>>,
    state: LifecycleState,
}

impl<H: HardwareInterface, M: RobotModel> JointImpedanceIkController<H, M> {
    /// Creates an unconfigured controller.
    /// # Arguments
    /// * `parameters` - Parameters as provided by the user. They are validated in
    ///   [`on_configure`](`ControllerInterface::on_configure`).
    /// * `model` - Dynamics model of the arm.
    /// * `services` - External services.
    pub fn new(parameters: ControllerParameters, model: M, services: ControllerServices) -> Self {
        JointImpedanceIkController {
            arm_id: parameters.arm_id.clone(),
            teleop: TeleopDeltaMapper::new(parameters.teleop),
            parameters,
            model,
            ik_service: Some(services.ik),
            collision_behavior: services.collision_behavior,
            robot_description: services.robot_description,
            interrupted: Arc::new(AtomicBool::new(false)),
            config: None,
            desired: DesiredJointConfiguration::new(),
            bridge: None,
            law: None,
            active: None,
            state: LifecycleState::Unconfigured,
        }
    }

    /// Flag which aborts a blocking startup when set.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Identifier of the arm. Replaced by the name from the robot description during
    /// configuration.
    pub fn arm_id(&self) -> &str {
        &self.arm_id
    }

    /// The validated configuration, `None` before configuration.
    pub fn config(&self) -> Option<&ControllerConfig> {
        self.config.as_ref()
    }

    /// Handle for feeding operator commands into the controller.
    pub fn teleop(&self) -> TeleopDeltaMapper {
        self.teleop.clone()
    }

    /// Latest inverse kinematics solution.
    pub fn desired_configuration(&self) -> &DesiredJointConfiguration {
        &self.desired
    }

    /// Counters of the inverse kinematics worker, `None` before configuration.
    pub fn ik_statistics(&self) -> Option<Arc<IkBridgeStatistics>> {
        self.bridge.as_ref().map(|bridge| bridge.statistics())
    }

    fn configure(&mut self) -> TeleopResult<()> {
        let mut config = self.parameters.validate()?;
        let wait = config.service_wait;

        let ik_service = self
            .ik_service
            .as_ref()
            .ok_or_else(|| create_lifecycle_exception("inverse kinematics service was consumed"))?;
        let availability = wait_for_service("compute_ik", &wait, &self.interrupted, |timeout| {
            ik_service.wait_for_service(timeout)
        })?;
        if availability == ServiceAvailability::Unavailable {
            return Err(TeleopException::StartupException {
                message: "inverse kinematics service is not available".to_string(),
            });
        }

        negotiate_collision_behavior(
            &mut *self.collision_behavior,
            &config.collision_behavior,
            &wait,
            &self.interrupted,
        )?;
        config.arm_id = resolve_arm_id(
            &mut *self.robot_description,
            &config.arm_id,
            &wait,
            &self.interrupted,
        )?;

        let ik_service = self
            .ik_service
            .take()
            .ok_or_else(|| create_lifecycle_exception("inverse kinematics service was consumed"))?;
        let bridge = IkResolverBridge::start(
            ik_service,
            IkRequestBuilder::new(&config.arm_id, config.load_gripper),
            self.desired.clone(),
            config.ik.queue_depth,
        )?;

        self.law = Some(JointImpedanceLaw::new(config.k_gains, config.d_gains));
        self.bridge = Some(bridge);
        self.arm_id = config.arm_id.clone();
        info!(arm_id = %self.arm_id, load_gripper = config.load_gripper, "controller configured");
        self.config = Some(config);
        Ok(())
    }

    fn require_state(&self, expected: LifecycleState, hook: &'static str) -> TeleopResult<()> {
        if self.state != expected {
            debug!(state = ?self.state, ?expected, hook, "lifecycle hook called in wrong state");
            return Err(create_lifecycle_exception(hook));
        }
        Ok(())
    }
}

impl<H: HardwareInterface, M: RobotModel> ControllerInterface for JointImpedanceIkController<H, M> {
    type Hardware = H;

    fn command_interface_configuration(&self) -> Vec<String> {
        (0..NUM_JOINTS)
            .map(|joint| joint_interface_name(&self.arm_id, joint, JointQuantity::Effort))
            .collect()
    }

    fn state_interface_configuration(&self) -> Vec<String> {
        let mut names: Vec<String> = JointQuantity::ALL
            .iter()
            .flat_map(|quantity| {
                (0..NUM_JOINTS).map(move |joint| joint_interface_name(&self.arm_id, joint, *quantity))
            })
            .collect();
        names.extend(self.model.state_interface_names(&self.arm_id));
        names
    }

    fn on_configure(&mut self) -> TeleopResult<()> {
        self.require_state(
            LifecycleState::Unconfigured,
            "on_configure must be called on an unconfigured controller",
        )?;
        self.configure()?;
        self.state = LifecycleState::Inactive;
        Ok(())
    }

    fn on_activate(&mut self, hardware: H) -> TeleopResult<()> {
        self.require_state(
            LifecycleState::Inactive,
            "on_activate must be called on a configured, inactive controller",
        )?;
        let interfaces = JointInterfaces::resolve(&self.arm_id, &hardware)?;
        let available = hardware.state_interface_names();
        for name in self.model.state_interface_names(&self.arm_id) {
            if !available.contains(&name) {
                return Err(create_hardware_exception(format!(
                    "state interface {} is not available",
                    name
                )));
            }
        }
        let bridge = self
            .bridge
            .as_ref()
            .ok_or_else(|| create_lifecycle_exception("inactive controller is not configured"))?;
        bridge.reset();
        if let Some(law) = self.law.as_mut() {
            law.reset();
        }
        self.active = Some(ActiveHardware {
            hardware,
            interfaces,
        });
        self.state = LifecycleState::Active;
        info!(arm_id = %self.arm_id, "controller activated");
        Ok(())
    }

    fn on_deactivate(&mut self) -> TeleopResult<H> {
        self.require_state(
            LifecycleState::Active,
            "on_deactivate must be called on an active controller",
        )?;
        let active = self
            .active
            .take()
            .ok_or_else(|| create_lifecycle_exception("active controller without hardware"))?;
        if let Some(bridge) = self.bridge.as_ref() {
            bridge.reset();
        }
        self.state = LifecycleState::Inactive;
        info!(arm_id = %self.arm_id, "controller deactivated");
        Ok(active.hardware)
    }

    fn update(&mut self, _period: &Duration) -> TeleopResult<CycleOutput> {
        self.require_state(
            LifecycleState::Active,
            "update must only be called on an active controller",
        )?;
        let (active, bridge, law) = match (self.active.as_mut(), self.bridge.as_ref(), self.law.as_mut()) {
            (Some(active), Some(bridge), Some(law)) => (active, bridge, law),
            _ => return Err(create_lifecycle_exception("active controller is not configured")),
        };

        let state = JointState::read(&active.hardware, &active.interfaces)?;
        let pose = active.hardware.current_pose()?;
        let target = compose_target(&pose, &self.teleop.latest());
        bridge.dispatch(target, state);

        let q_d = match self.desired.get() {
            Some(q_d) => q_d,
            None => {
                return Ok(CycleOutput {
                    state,
                    torques: None,
                })
            }
        };
        let coriolis = self.model.coriolis(&state)?;
        if coriolis.iter().any(|c| !c.is_finite()) {
            return Err(create_hardware_exception(format!(
                "dynamics model returned a non-finite coriolis vector {:?}",
                coriolis.as_slice()
            )));
        }
        let tau = law.compute_torque_command(&q_d, &state.q, &state.dq, &coriolis);
        if tau.iter().any(|t| !t.is_finite()) {
            return Err(create_hardware_exception(format!(
                "refusing to command non-finite torques {:?}",
                tau.as_slice()
            )));
        }
        for joint in 0..NUM_JOINTS {
            active
                .hardware
                .write_command(active.interfaces.command_index(joint), tau[joint])?;
        }
        Ok(CycleOutput {
            state,
            torques: Some(Torques::from(tau)),
        })
    }

    fn lifecycle_state(&self) -> LifecycleState {
        self.state
    }
}
