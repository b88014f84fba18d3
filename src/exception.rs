// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains exception and Result definitions
use crate::robot::logger::Record;
use thiserror::Error;

/// Represents all kind of errors which can occur while configuring, activating or running the
/// teleoperation controller.
#[derive(Error, Debug)]
pub enum TeleopException {
    /// ControlException is returned by the [`ControlLoop`](`crate::ControlLoop`) if a cycle fails.
    /// The exception holds the last recorded cycles. The number of recorded cycles can be
    /// configured in the ControlLoop constructor.
    #[error("{error}")]
    ControlException {
        /// Vector of joint states and commands logged just before the exception occurred.
        log: Option<Vec<Record>>,
        /// Explanatory string.
        error: String,
    },

    /// ConfigurationException is returned if the controller parameters are missing or invalid.
    /// No control cycle runs after this error.
    #[error("{message}")]
    ConfigurationException { message: String },

    /// StartupException is returned if a startup dependency could not be satisfied, e.g. the
    /// collision behavior was refused or a service never became available.
    #[error("{message}")]
    StartupException { message: String },

    /// HardwareException is returned if a hardware interface cannot be read or written.
    #[error("{message}")]
    HardwareException { message: String },

    /// SolverException is returned by an [`IkService`](`crate::IkService`) if the request could
    /// not be delivered or answered at all.
    #[error("{message}")]
    SolverException { message: String },

    /// LifecycleException is returned if a lifecycle hook is called in the wrong state.
    #[error("{message}")]
    LifecycleException { message: String },

    /// RealTimeException is returned if the real-time priority cannot be set
    #[error("{message}")]
    RealTimeException { message: String },
}

impl From<serde_yaml::Error> for TeleopException {
    fn from(error: serde_yaml::Error) -> Self {
        TeleopException::ConfigurationException {
            message: format!("invalid controller parameters: {}", error),
        }
    }
}

/// creates a HardwareException from anything printable
pub(crate) fn create_hardware_exception<S: ToString>(message: S) -> TeleopException {
    TeleopException::HardwareException {
        message: message.to_string(),
    }
}

/// creates a LifecycleException from a static string slice
pub(crate) fn create_lifecycle_exception(message: &'static str) -> TeleopException {
    TeleopException::LifecycleException {
        message: message.to_string(),
    }
}

/// Result type which can have TeleopException as Error
pub type TeleopResult<T> = Result<T, TeleopException>;
