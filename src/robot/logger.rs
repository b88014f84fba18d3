// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the logging type definitions for [`ControlException`](`crate::exception::TeleopException::ControlException`)
use std::collections::VecDeque;

use crate::robot::control_types::{CycleOutput, Torques};
use crate::robot::robot_state::JointState;

/// One row of the log contains the joint state read in cycle n and the torques which were
/// commanded in the same cycle.
/// Provided by the [`ControlException`](`crate::exception::TeleopException::ControlException`).
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Joint state read at the beginning of the cycle.
    pub state: JointState,
    /// Commanded torques, `None` if nothing was commanded in the cycle.
    pub torques: Option<Torques>,
}

impl From<&CycleOutput> for Record {
    fn from(output: &CycleOutput) -> Self {
        Record {
            state: output.state,
            torques: output.torques,
        }
    }
}

/// Ring buffer of the last `log_size` cycles.
pub(crate) struct Logger {
    records: VecDeque<Record>,
    log_size: usize,
}

impl Logger {
    pub fn new(log_size: usize) -> Self {
        Logger {
            records: VecDeque::with_capacity(log_size),
            log_size,
        }
    }

    pub fn log(&mut self, output: &CycleOutput) {
        if self.log_size == 0 {
            return;
        }
        if self.records.len() == self.log_size {
            self.records.pop_front();
        }
        self.records.push_back(Record::from(output));
    }

    /// Returns the records from oldest to newest and empties the log.
    pub fn flush(&mut self) -> Vec<Record> {
        self.records.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::robot::control_types::{CycleOutput, Torques};
    use crate::robot::logger::Logger;
    use crate::robot::robot_state::JointState;

    fn output(q0: f64, commanded: bool) -> CycleOutput {
        let mut state = JointState::default();
        state.q[0] = q0;
        CycleOutput {
            state,
            torques: if commanded {
                Some(Torques::new([q0; 7]))
            } else {
                None
            },
        }
    }

    #[test]
    fn keeps_last_records_in_order() {
        let mut logger = Logger::new(3);
        for i in 0..5 {
            logger.log(&output(i as f64, i % 2 == 0));
        }
        let records = logger.flush();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].state.q[0], 2.);
        assert_eq!(records[2].state.q[0], 4.);
        assert!(records[1].torques.is_none());
        assert_eq!(records[2].torques.unwrap().tau_J[6], 4.);
        assert!(logger.flush().is_empty());
    }

    #[test]
    fn zero_sized_log_stays_empty() {
        let mut logger = Logger::new(0);
        logger.log(&output(1., true));
        assert!(logger.flush().is_empty());
    }
}
