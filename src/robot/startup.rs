// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the one-time startup handshake which runs before the first control cycle.
//!
//! Everything in here may block. None of it is ever called from the control cycle.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use regex::Regex;
use tracing::{error, info, warn};

use crate::config::ServiceWaitConfig;
use crate::exception::{TeleopException, TeleopResult};
use crate::robot::service_types::{SetCollisionBehaviorRequest, SetCollisionBehaviorResponse};

/// Service of the hardware layer which sets the collision thresholds of the robot.
#[cfg_attr(test, automock)]
pub trait CollisionBehaviorService: Send {
    /// Waits up to `timeout` for the service to become available.
    fn wait_for_service(&self, timeout: Duration) -> bool;
    /// Sends the thresholds and waits for the acknowledgment.
    /// # Errors
    /// * StartupException if no answer was received.
    fn set_full_collision_behavior(
        &mut self,
        request: &SetCollisionBehaviorRequest,
    ) -> TeleopResult<SetCollisionBehaviorResponse>;
}

/// Publisher of the robot description (URDF), e.g. the robot state publisher.
#[cfg_attr(test, automock)]
pub trait RobotDescriptionProvider: Send {
    fn wait_for_service(&self, timeout: Duration) -> bool;
    /// The published description, `None` if it is not set.
    /// # Errors
    /// * StartupException if the provider could not be queried.
    fn robot_description(&mut self) -> TeleopResult<Option<String>>;
}

/// Outcome of waiting for a service.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ServiceAvailability {
    Available,
    /// The service did not show up within the configured number of attempts.
    Unavailable,
}

/// Repeatedly waits for a service until it becomes available.
///
/// Every attempt waits up to `wait.timeout_s`. Between attempts the `interrupted` flag is
/// checked so that a shutdown request ends the startup early.
/// # Errors
/// * StartupException if `interrupted` was set.
pub fn wait_for_service<F: FnMut(Duration) -> bool>(
    service: &str,
    wait: &ServiceWaitConfig,
    interrupted: &AtomicBool,
    mut is_available: F,
) -> TeleopResult<ServiceAvailability> {
    for _ in 0..wait.max_attempts {
        if is_available(wait.timeout()) {
            return Ok(ServiceAvailability::Available);
        }
        if interrupted.load(Ordering::SeqCst) {
            error!("Interrupted while waiting for the service. Exiting.");
            return Err(TeleopException::StartupException {
                message: format!("interrupted while waiting for {}", service),
            });
        }
        info!(service, "service not available, waiting again...");
    }
    warn!(
        service,
        attempts = wait.max_attempts,
        "service did not become available"
    );
    Ok(ServiceAvailability::Unavailable)
}

/// Sets the collision behavior of the robot.
/// # Errors
/// * StartupException if the service never became available, did not answer or refused the
///   thresholds. The controller must not be activated in this case.
pub fn negotiate_collision_behavior<S: CollisionBehaviorService + ?Sized>(
    service: &mut S,
    request: &SetCollisionBehaviorRequest,
    wait: &ServiceWaitConfig,
    interrupted: &AtomicBool,
) -> TeleopResult<()> {
    let availability = wait_for_service("set_full_collision_behavior", wait, interrupted, |t| {
        service.wait_for_service(t)
    })?;
    if availability == ServiceAvailability::Unavailable {
        return Err(TeleopException::StartupException {
            message: "collision behavior service is not available".to_string(),
        });
    }
    let response = service.set_full_collision_behavior(request)?;
    if !response.success {
        error!(reason = %response.error, "Failed to set default collision behavior.");
        return Err(TeleopException::StartupException {
            message: format!("Failed to set default collision behavior: {}", response.error),
        });
    }
    info!("Default collision behavior set.");
    Ok(())
}

/// Extracts the robot name from a URDF description, i.e. the `name` attribute of the
/// `<robot>` element.
pub fn robot_name_from_description(description: &str) -> Option<String> {
    let pattern = Regex::new(r#"<robot\s+(?:[^>]*\s)?name\s*=\s*"([^"]+)""#).ok()?;
    pattern
        .captures(description)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
}

/// Resolves the arm identifier from the published robot description.
///
/// If the description is unavailable or carries no robot name, the failure is logged and
/// `fallback` is returned.
/// # Errors
/// * StartupException only if the wait was interrupted.
pub fn resolve_arm_id<P: RobotDescriptionProvider + ?Sized>(
    provider: &mut P,
    fallback: &str,
    wait: &ServiceWaitConfig,
    interrupted: &AtomicBool,
) -> TeleopResult<String> {
    let availability = wait_for_service("robot_description", wait, interrupted, |t| {
        provider.wait_for_service(t)
    })?;
    let description = match availability {
        ServiceAvailability::Available => match provider.robot_description() {
            Ok(description) => description,
            Err(error) => {
                error!(%error, "Failed to get robot_description parameter.");
                None
            }
        },
        ServiceAvailability::Unavailable => None,
    };
    let description = match description {
        Some(description) => description,
        None => {
            error!(fallback, "Failed to get robot_description parameter.");
            return Ok(fallback.to_string());
        }
    };
    match robot_name_from_description(&description) {
        Some(name) => {
            info!(arm_id = %name, "resolved robot name from description");
            Ok(name)
        }
        None => {
            error!(fallback, "robot description does not contain a robot name");
            Ok(fallback.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use mockall::Sequence;

    use crate::config::ServiceWaitConfig;
    use crate::exception::TeleopException;
    use crate::robot::service_types::{
        SetCollisionBehaviorRequest, SetCollisionBehaviorResponse,
    };
    use crate::robot::startup::{
        negotiate_collision_behavior, resolve_arm_id, robot_name_from_description,
        wait_for_service, MockCollisionBehaviorService, MockRobotDescriptionProvider,
        ServiceAvailability,
    };

    const URDF: &str = r#"<?xml version="1.0" ?>
<robot name="fr3" xmlns:xacro="http://www.ros.org/wiki/xacro">
  <link name="fr3_link0"/>
</robot>"#;

    fn fast_wait() -> ServiceWaitConfig {
        ServiceWaitConfig {
            timeout_s: 0.001,
            max_attempts: 3,
        }
    }

    #[test]
    fn name_from_description() {
        assert_eq!(robot_name_from_description(URDF), Some("fr3".to_string()));
        assert_eq!(
            robot_name_from_description(r#"<robot xmlns:x="y" name = "panda">"#),
            Some("panda".to_string())
        );
        assert_eq!(robot_name_from_description("<link name=\"fr3_link0\"/>"), None);
        assert_eq!(robot_name_from_description(""), None);
    }

    #[test]
    fn wait_retries_until_available() {
        let mut calls = 0;
        let availability = wait_for_service("test", &fast_wait(), &AtomicBool::new(false), |_| {
            calls += 1;
            calls == 2
        })
        .unwrap();
        assert_eq!(availability, ServiceAvailability::Available);
        assert_eq!(calls, 2);
    }

    #[test]
    fn wait_gives_up_after_max_attempts() {
        let mut calls = 0;
        let availability = wait_for_service("test", &fast_wait(), &AtomicBool::new(false), |_| {
            calls += 1;
            false
        })
        .unwrap();
        assert_eq!(availability, ServiceAvailability::Unavailable);
        assert_eq!(calls, 3);
    }

    #[test]
    fn wait_is_interrupted() {
        let result = wait_for_service("test", &fast_wait(), &AtomicBool::new(true), |_| false);
        match result {
            Err(TeleopException::StartupException { .. }) => {}
            other => panic!("expected StartupException, got {:?}", other),
        }
    }

    #[test]
    fn collision_behavior_is_sent_after_service_is_up() {
        let mut seq = Sequence::new();
        let mut service = MockCollisionBehaviorService::new();
        service
            .expect_wait_for_service()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(true);
        service
            .expect_set_full_collision_behavior()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|request: &SetCollisionBehaviorRequest| {
                *request == SetCollisionBehaviorRequest::default()
            })
            .returning(|_| {
                Ok(SetCollisionBehaviorResponse {
                    success: true,
                    error: String::new(),
                })
            });
        negotiate_collision_behavior(
            &mut service,
            &SetCollisionBehaviorRequest::default(),
            &fast_wait(),
            &AtomicBool::new(false),
        )
        .unwrap();
    }

    #[test]
    fn refused_collision_behavior_is_fatal() {
        let mut service = MockCollisionBehaviorService::new();
        service.expect_wait_for_service().return_const(true);
        service.expect_set_full_collision_behavior().returning(|_| {
            Ok(SetCollisionBehaviorResponse {
                success: false,
                error: "robot is in reflex mode".to_string(),
            })
        });
        let result = negotiate_collision_behavior(
            &mut service,
            &SetCollisionBehaviorRequest::default(),
            &fast_wait(),
            &AtomicBool::new(false),
        );
        match result {
            Err(TeleopException::StartupException { message }) => {
                assert!(message.contains("reflex"))
            }
            other => panic!("expected StartupException, got {:?}", other),
        }
    }

    #[test]
    fn unavailable_collision_service_is_fatal() {
        let mut service = MockCollisionBehaviorService::new();
        service.expect_wait_for_service().times(3).return_const(false);
        service.expect_set_full_collision_behavior().never();
        assert!(negotiate_collision_behavior(
            &mut service,
            &SetCollisionBehaviorRequest::default(),
            &fast_wait(),
            &AtomicBool::new(false),
        )
        .is_err());
    }

    #[test]
    fn arm_id_from_description() {
        let mut provider = MockRobotDescriptionProvider::new();
        provider.expect_wait_for_service().return_const(true);
        provider
            .expect_robot_description()
            .returning(|| Ok(Some(URDF.to_string())));
        let arm_id =
            resolve_arm_id(&mut provider, "panda", &fast_wait(), &AtomicBool::new(false)).unwrap();
        assert_eq!(arm_id, "fr3");
    }

    #[test]
    fn missing_description_falls_back() {
        let mut provider = MockRobotDescriptionProvider::new();
        provider.expect_wait_for_service().return_const(true);
        provider.expect_robot_description().returning(|| Ok(None));
        let arm_id =
            resolve_arm_id(&mut provider, "fr3", &fast_wait(), &AtomicBool::new(false)).unwrap();
        assert_eq!(arm_id, "fr3");

        let mut provider = MockRobotDescriptionProvider::new();
        provider.expect_wait_for_service().return_const(false);
        provider.expect_robot_description().never();
        let arm_id =
            resolve_arm_id(&mut provider, "fr3", &fast_wait(), &AtomicBool::new(false)).unwrap();
        assert_eq!(arm_id, "fr3");
    }

    #[test]
    fn description_without_name_falls_back() {
        let mut provider = MockRobotDescriptionProvider::new();
        provider.expect_wait_for_service().return_const(true);
        provider
            .expect_robot_description()
            .returning(|| Ok(Some("<link name=\"x\"/>".to_string())));
        let arm_id =
            resolve_arm_id(&mut provider, "fr3", &fast_wait(), &AtomicBool::new(false)).unwrap();
        assert_eq!(arm_id, "fr3");
    }
}
