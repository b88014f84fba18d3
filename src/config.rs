// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the controller parameters and their validation.
//!
//! Parameters are usually loaded from a YAML file like
//! ```yaml
//! arm_id: fr3
//! load_gripper: true
//! k_gains: [24.0, 24.0, 24.0, 24.0, 10.0, 6.0, 2.0]
//! d_gains: [2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 0.5]
//! teleop:
//!   max_linear_pos_update: 0.007
//!   max_angular_pos_update: 0.03
//! ```
//! and validated exactly once, before the controller is configured.
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::exception::{TeleopException, TeleopResult};
use crate::robot::service_types::SetCollisionBehaviorRequest;
use crate::robot::teleop::TeleopScaling;
use crate::utils::{Vector7, NUM_JOINTS};

/// How long to wait for the services the controller depends on during startup.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct ServiceWaitConfig {
    /// Timeout of a single wait in \[s\].
    #[serde(default = "ServiceWaitConfig::default_timeout_s")]
    pub timeout_s: f64,
    /// Number of waits before startup is aborted.
    #[serde(default = "ServiceWaitConfig::default_max_attempts")]
    pub max_attempts: u32,
}

impl ServiceWaitConfig {
    fn default_timeout_s() -> f64 {
        1.0
    }
    fn default_max_attempts() -> u32 {
        60
    }

    /// Timeout of a single wait. Falls back to the default timeout if `timeout_s` cannot be
    /// represented, which [`ControllerParameters::validate`] rejects.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_s)
            .unwrap_or_else(|_| Duration::from_secs_f64(ServiceWaitConfig::default_timeout_s()))
    }
}

impl Default for ServiceWaitConfig {
    fn default() -> Self {
        ServiceWaitConfig {
            timeout_s: ServiceWaitConfig::default_timeout_s(),
            max_attempts: ServiceWaitConfig::default_max_attempts(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct IkConfig {
    /// Maximum number of requests waiting for the solver.
    #[serde(default = "IkConfig::default_queue_depth")]
    pub queue_depth: usize,
}

impl IkConfig {
    fn default_queue_depth() -> usize {
        8
    }
}

impl Default for IkConfig {
    fn default() -> Self {
        IkConfig {
            queue_depth: IkConfig::default_queue_depth(),
        }
    }
}

/// Parameters of the controller as they are provided by the user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ControllerParameters {
    /// Identifier of the arm, e.g. `fr3`. Replaced by the name from the robot description
    /// if one is available.
    pub arm_id: String,
    /// Whether the Franka hand is mounted.
    #[serde(default)]
    pub load_gripper: bool,
    /// Joint stiffness in \[Nm/rad\], one value per joint.
    #[serde(default)]
    pub k_gains: Option<Vec<f64>>,
    /// Joint damping in \[Nm s/rad\], one value per joint.
    #[serde(default)]
    pub d_gains: Option<Vec<f64>>,
    #[serde(default)]
    pub teleop: TeleopScaling,
    #[serde(default)]
    pub service_wait: ServiceWaitConfig,
    #[serde(default)]
    pub ik: IkConfig,
    #[serde(default)]
    pub collision_behavior: SetCollisionBehaviorRequest,
}

impl ControllerParameters {
    /// Creates parameters with default tuning.
    pub fn new<S: Into<String>>(
        arm_id: S,
        load_gripper: bool,
        k_gains: Option<Vec<f64>>,
        d_gains: Option<Vec<f64>>,
    ) -> Self {
        ControllerParameters {
            arm_id: arm_id.into(),
            load_gripper,
            k_gains,
            d_gains,
            teleop: TeleopScaling::default(),
            service_wait: ServiceWaitConfig::default(),
            ik: IkConfig::default(),
            collision_behavior: SetCollisionBehaviorRequest::default(),
        }
    }

    /// Parses parameters from a YAML string.
    /// # Errors
    /// * ConfigurationException if the YAML does not describe valid parameters.
    pub fn from_yaml_str(yaml: &str) -> TeleopResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads parameters from a YAML file.
    /// # Errors
    /// * ConfigurationException if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> TeleopResult<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|e| TeleopException::ConfigurationException {
                message: format!("Failed to read {}: {}", path.display(), e),
            })?;
        ControllerParameters::from_yaml_str(&contents)
    }

    /// Checks the parameters and converts them into a [`ControllerConfig`].
    /// # Errors
    /// * ConfigurationException if a gain array is absent, does not have one entry per joint,
    ///   or contains negative or non-finite values, or if the tuning values are out of range.
    pub fn validate(&self) -> TeleopResult<ControllerConfig> {
        let k_gains = validate_gains("k_gains", &self.k_gains)?;
        let d_gains = validate_gains("d_gains", &self.d_gains)?;
        if self.arm_id.is_empty() {
            return Err(configuration_error("arm_id parameter not set".to_string()));
        }
        let teleop = self.teleop;
        if !(teleop.max_linear_pos_update.is_finite() && teleop.max_linear_pos_update >= 0.)
            || !(teleop.max_angular_pos_update.is_finite() && teleop.max_angular_pos_update >= 0.)
        {
            return Err(configuration_error(format!(
                "teleop increments must be finite and non-negative, got {:?}",
                teleop
            )));
        }
        if self.service_wait.timeout_s.is_nan()
            || self.service_wait.timeout_s <= 0.
            || Duration::try_from_secs_f64(self.service_wait.timeout_s).is_err()
            || self.service_wait.max_attempts == 0
        {
            return Err(configuration_error(format!(
                "invalid service wait configuration {:?}",
                self.service_wait
            )));
        }
        if self.ik.queue_depth == 0 {
            return Err(configuration_error(
                "ik queue_depth must be at least 1".to_string(),
            ));
        }
        Ok(ControllerConfig {
            arm_id: self.arm_id.clone(),
            load_gripper: self.load_gripper,
            k_gains,
            d_gains,
            teleop,
            service_wait: self.service_wait,
            ik: self.ik,
            collision_behavior: self.collision_behavior,
        })
    }
}

/// Validated controller configuration. Immutable once the controller is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub arm_id: String,
    pub load_gripper: bool,
    pub k_gains: Vector7,
    pub d_gains: Vector7,
    pub teleop: TeleopScaling,
    pub service_wait: ServiceWaitConfig,
    pub ik: IkConfig,
    pub collision_behavior: SetCollisionBehaviorRequest,
}

fn configuration_error(message: String) -> TeleopException {
    error!("{}", message);
    TeleopException::ConfigurationException { message }
}

fn validate_gains(name: &str, gains: &Option<Vec<f64>>) -> TeleopResult<Vector7> {
    let gains = match gains {
        Some(gains) if !gains.is_empty() => gains,
        _ => return Err(configuration_error(format!("{} parameter not set", name))),
    };
    if gains.len() != NUM_JOINTS {
        return Err(configuration_error(format!(
            "{} should be of size {} but is of size {}",
            name,
            NUM_JOINTS,
            gains.len()
        )));
    }
    if gains.iter().any(|gain| !gain.is_finite() || *gain < 0.) {
        return Err(configuration_error(format!(
            "{} must be finite and non-negative, got {:?}",
            name, gains
        )));
    }
    Ok(Vector7::from_column_slice(gains))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::ControllerParameters;
    use crate::exception::TeleopException;
    use crate::utils::Vector7;

    fn parameters(k: Option<Vec<f64>>, d: Option<Vec<f64>>) -> ControllerParameters {
        ControllerParameters::new("fr3", false, k, d)
    }

    #[test]
    fn valid_gains() {
        let config = parameters(Some(vec![600.; 7]), Some(vec![30.; 7]))
            .validate()
            .unwrap();
        assert_eq!(config.k_gains, Vector7::from_element(600.));
        assert_eq!(config.d_gains, Vector7::from_element(30.));
        assert_eq!(config.arm_id, "fr3");
    }

    #[test]
    fn missing_or_wrong_sized_gains_are_rejected() {
        let cases = vec![
            parameters(None, Some(vec![30.; 7])),
            parameters(Some(vec![600.; 7]), None),
            parameters(Some(vec![]), Some(vec![30.; 7])),
            parameters(Some(vec![600.; 6]), Some(vec![30.; 7])),
            parameters(Some(vec![600.; 7]), Some(vec![30.; 8])),
        ];
        for case in cases {
            match case.validate() {
                Err(TeleopException::ConfigurationException { .. }) => {}
                other => panic!("expected ConfigurationException, got {:?}", other),
            }
        }
    }

    #[test]
    fn negative_gains_are_rejected() {
        let mut k = vec![600.; 7];
        k[3] = -1.;
        assert!(parameters(Some(k), Some(vec![30.; 7])).validate().is_err());
        let mut d = vec![30.; 7];
        d[0] = f64::INFINITY;
        assert!(parameters(Some(vec![600.; 7]), Some(d)).validate().is_err());
    }

    #[test]
    fn unrepresentable_service_timeout_is_rejected() {
        for timeout_s in [1e20, f64::INFINITY, f64::NAN, 0., -1.] {
            let mut parameters = parameters(Some(vec![600.; 7]), Some(vec![30.; 7]));
            parameters.service_wait.timeout_s = timeout_s;
            match parameters.validate() {
                Err(TeleopException::ConfigurationException { .. }) => {}
                other => panic!("expected ConfigurationException, got {:?}", other),
            }
            assert!(parameters.service_wait.timeout() <= Duration::from_secs(1));
        }
    }

    #[test]
    fn from_yaml_with_defaults() {
        let yaml = "
arm_id: fr3
load_gripper: true
k_gains: [24.0, 24.0, 24.0, 24.0, 10.0, 6.0, 2.0]
d_gains: [2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 0.5]
teleop:
  max_linear_pos_update: 0.01
";
        let parameters = ControllerParameters::from_yaml_str(yaml).unwrap();
        assert!(parameters.load_gripper);
        assert_eq!(parameters.teleop.max_linear_pos_update, 0.01);
        assert_eq!(parameters.teleop.max_angular_pos_update, 0.03);
        assert_eq!(parameters.service_wait.max_attempts, 60);
        assert_eq!(parameters.ik.queue_depth, 8);
        let config = parameters.validate().unwrap();
        assert_eq!(config.k_gains[4], 10.);
        assert_eq!(config.d_gains[6], 0.5);
    }

    #[test]
    fn yaml_without_gains_fails_validation() {
        let parameters = ControllerParameters::from_yaml_str("arm_id: panda").unwrap();
        assert!(parameters.k_gains.is_none());
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_a_configuration_error() {
        match ControllerParameters::from_yaml_str("arm_id: [") {
            Err(TeleopException::ConfigurationException { .. }) => {}
            other => panic!("expected ConfigurationException, got {:?}", other),
        }
    }

    #[test]
    fn bundled_configuration_is_valid() {
        let parameters = ControllerParameters::from_file(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/config/joint_impedance_ik_controller.yaml"
        ))
        .unwrap();
        let config = parameters.validate().unwrap();
        assert_eq!(config.arm_id, "fr3");
        assert!(config.load_gripper);
        assert_eq!(config.ik.queue_depth, 8);
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        assert!(ControllerParameters::from_file("/nonexistent/controller.yaml").is_err());
    }
}
