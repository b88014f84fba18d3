// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later
//! Defines the result codes an inverse kinematics service can answer with.
use std::fmt::{Debug, Display, Formatter, Result};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Result codes of an inverse kinematics request, as defined by MoveIt.
#[derive(Serialize_repr, Deserialize_repr, Debug, PartialEq, Eq, Copy, Clone)]
#[repr(i32)]
#[derive(FromPrimitive, ToPrimitive)]
pub enum IkErrorCode {
    /// No result code was set.
    Undefined = 0,
    /// A solution was found.
    Success = 1,
    /// Generic failure.
    Failure = 99999,
    PlanningFailed = -1,
    InvalidMotionPlan = -2,
    MotionPlanInvalidatedByEnvironmentChange = -3,
    ControlFailed = -4,
    UnableToAquireSensorData = -5,
    /// The solver ran out of time.
    TimedOut = -6,
    Preempted = -7,
    StartStateInCollision = -10,
    StartStateViolatesPathConstraints = -11,
    GoalInCollision = -12,
    GoalViolatesPathConstraints = -13,
    GoalConstraintsViolated = -14,
    /// The requested planning group does not exist.
    InvalidGroupName = -15,
    InvalidGoalConstraints = -16,
    /// The seed state does not match the robot.
    InvalidRobotState = -17,
    /// The requested tip link does not exist.
    InvalidLinkName = -18,
    InvalidObjectName = -19,
    /// The pose could not be transformed into the planning frame.
    FrameTransformFailure = -21,
    CollisionCheckingUnavailable = -22,
    RobotStateStale = -23,
    SensorInfoStale = -24,
    CommunicationFailure = -25,
    StartStateInvalid = -26,
    GoalStateInvalid = -27,
    UnrecognizedGoalType = -28,
    Crash = -29,
    Abort = -30,
    /// The pose is not reachable.
    NoIkSolution = -31,
}

impl IkErrorCode {
    /// Maps a raw result code. Codes which are not part of the table are treated as
    /// [`Failure`](`IkErrorCode::Failure`).
    pub fn from_code(code: i32) -> Self {
        IkErrorCode::from_i32(code).unwrap_or(IkErrorCode::Failure)
    }

    pub fn is_success(&self) -> bool {
        *self == IkErrorCode::Success
    }
}

impl Display for IkErrorCode {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use crate::robot::error::IkErrorCode;

    #[test]
    fn known_codes() {
        assert_eq!(IkErrorCode::from_code(1), IkErrorCode::Success);
        assert_eq!(IkErrorCode::from_code(-31), IkErrorCode::NoIkSolution);
        assert_eq!(IkErrorCode::from_code(-6), IkErrorCode::TimedOut);
        assert!(IkErrorCode::from_code(1).is_success());
        assert!(!IkErrorCode::from_code(0).is_success());
    }

    #[test]
    fn unknown_codes_are_failures() {
        assert_eq!(IkErrorCode::from_code(-8), IkErrorCode::Failure);
        assert_eq!(IkErrorCode::from_code(42), IkErrorCode::Failure);
        assert_eq!(format!("{}", IkErrorCode::NoIkSolution), "NoIkSolution");
    }
}
