// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use spin_sleep::SpinSleeper;
use tracing::{debug, info, warn};

use crate::exception::{TeleopException, TeleopResult};
use crate::robot::control_tools::{
    has_realtime_kernel, set_current_thread_to_highest_scheduler_priority,
};
use crate::robot::control_types::RealtimeConfig;
use crate::robot::logger::Logger;
use crate::robot::robot_control::ControllerInterface;

/// Drives an active controller at a fixed rate on the calling thread.
///
/// The loop ends when the stop flag is set, after the optional iteration budget, or with the
/// first failing cycle. A failing cycle is returned as
/// [`ControlException`](`crate::exception::TeleopException::ControlException`) holding the
/// last `log_size` cycles.
pub struct ControlLoop<'a, C: ControllerInterface> {
    controller: &'a mut C,
    period: Duration,
    max_iterations: Option<u64>,
    stop: Arc<AtomicBool>,
    logger: Logger,
}

impl<'a, C: ControllerInterface> ControlLoop<'a, C> {
    /// # Arguments
    /// * `controller` - An active controller.
    /// * `frequency_hz` - Cycle rate.
    /// * `realtime_config` - Under [`RealtimeConfig::Enforce`] the calling thread is switched to
    ///   realtime scheduling.
    /// * `log_size` - Number of cycles kept for the ControlException.
    /// # Errors
    /// * ConfigurationException if the frequency is not positive and finite.
    /// * RealTimeException if realtime scheduling is enforced but not available.
    pub fn new(
        controller: &'a mut C,
        frequency_hz: f64,
        realtime_config: RealtimeConfig,
        log_size: usize,
    ) -> TeleopResult<Self> {
        if !(frequency_hz.is_finite() && frequency_hz > 0.) {
            return Err(TeleopException::ConfigurationException {
                message: format!("invalid control frequency {} Hz", frequency_hz),
            });
        }
        if frequency_hz > 10_000. {
            warn!(frequency_hz, "very high control frequency");
        }
        if realtime_config == RealtimeConfig::Enforce {
            if has_realtime_kernel() {
                set_current_thread_to_highest_scheduler_priority()?;
            } else {
                return Err(TeleopException::RealTimeException {
                    message: "franka-teleop: Running kernel does not have realtime capabilities."
                        .to_string(),
                });
            }
        }
        Ok(ControlLoop {
            controller,
            period: Duration::from_secs_f64(1. / frequency_hz),
            max_iterations: None,
            stop: Arc::new(AtomicBool::new(false)),
            logger: Logger::new(log_size),
        })
    }

    /// Ends the loop after `iterations` cycles.
    pub fn with_max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Flag which ends the loop before the next cycle when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Runs cycles until the loop is stopped.
    /// # Return
    /// Number of executed cycles.
    /// # Errors
    /// * ControlException if a cycle failed.
    pub fn run(&mut self) -> TeleopResult<u64> {
        let sleeper = SpinSleeper::default();
        let mut iterations = 0;
        let mut last_cycle = Instant::now();
        let mut deadline = last_cycle;
        info!(period = ?self.period, "control loop started");
        loop {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            if let Some(max_iterations) = self.max_iterations {
                if iterations >= max_iterations {
                    break;
                }
            }
            let now = Instant::now();
            let elapsed = now - last_cycle;
            last_cycle = now;
            match self.controller.update(&elapsed) {
                Ok(output) => self.logger.log(&output),
                Err(error) => {
                    warn!(%error, iterations, "control cycle failed");
                    return Err(TeleopException::ControlException {
                        log: Some(self.logger.flush()),
                        error: error.to_string(),
                    });
                }
            }
            iterations += 1;

            deadline += self.period;
            let now = Instant::now();
            if deadline > now {
                sleeper.sleep(deadline - now);
            } else {
                debug!(overrun = ?(now - deadline), "control cycle missed its deadline");
                deadline = now;
            }
        }
        info!(iterations, "control loop stopped");
        Ok(iterations)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::exception::{create_hardware_exception, TeleopException, TeleopResult};
    use crate::robot::control_loop::ControlLoop;
    use crate::robot::control_types::{CycleOutput, RealtimeConfig, Torques};
    use crate::robot::hardware::tests::FakeHardware;
    use crate::robot::robot_control::{ControllerInterface, LifecycleState};
    use crate::robot::robot_state::JointState;

    /// Counts its cycles and fails in the cycle `fail_at`.
    struct CountingController {
        cycles: usize,
        fail_at: Option<usize>,
        periods: Vec<Duration>,
    }

    impl CountingController {
        fn new(fail_at: Option<usize>) -> Self {
            CountingController {
                cycles: 0,
                fail_at,
                periods: Vec::new(),
            }
        }
    }

    impl ControllerInterface for CountingController {
        type Hardware = FakeHardware;

        fn command_interface_configuration(&self) -> Vec<String> {
            Vec::new()
        }
        fn state_interface_configuration(&self) -> Vec<String> {
            Vec::new()
        }
        fn on_configure(&mut self) -> TeleopResult<()> {
            Ok(())
        }
        fn on_activate(&mut self, _hardware: FakeHardware) -> TeleopResult<()> {
            Ok(())
        }
        fn on_deactivate(&mut self) -> TeleopResult<FakeHardware> {
            Ok(FakeHardware::new("fr3"))
        }
        fn update(&mut self, period: &Duration) -> TeleopResult<CycleOutput> {
            if Some(self.cycles) == self.fail_at {
                return Err(create_hardware_exception("joint 3 not readable"));
            }
            self.periods.push(*period);
            let mut state = JointState::default();
            state.q[0] = self.cycles as f64;
            self.cycles += 1;
            Ok(CycleOutput {
                state,
                torques: Some(Torques::new([0.; 7])),
            })
        }
        fn lifecycle_state(&self) -> LifecycleState {
            LifecycleState::Active
        }
    }

    #[test]
    fn runs_iteration_budget() {
        let mut controller = CountingController::new(None);
        let iterations = ControlLoop::new(&mut controller, 1000., RealtimeConfig::Ignore, 10)
            .unwrap()
            .with_max_iterations(5)
            .run()
            .unwrap();
        assert_eq!(iterations, 5);
        assert_eq!(controller.cycles, 5);
        assert!(controller.periods[1..].iter().all(|p| *p > Duration::ZERO));
    }

    #[test]
    fn stop_flag_ends_loop() {
        let mut controller = CountingController::new(None);
        let mut control_loop =
            ControlLoop::new(&mut controller, 1000., RealtimeConfig::Ignore, 10).unwrap();
        control_loop
            .stop_handle()
            .store(true, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(control_loop.run().unwrap(), 0);
        assert_eq!(controller.cycles, 0);
    }

    #[test]
    fn failing_cycle_returns_log() {
        let mut controller = CountingController::new(Some(4));
        let result = ControlLoop::new(&mut controller, 1000., RealtimeConfig::Ignore, 3)
            .unwrap()
            .with_max_iterations(100)
            .run();
        match result {
            Err(TeleopException::ControlException { log, error }) => {
                assert!(error.contains("joint 3"));
                let log = log.unwrap();
                assert_eq!(log.len(), 3);
                assert_eq!(log[0].state.q[0], 1.);
                assert_eq!(log[2].state.q[0], 3.);
            }
            other => panic!("expected ControlException, got {:?}", other),
        }
    }

    #[test]
    fn invalid_frequency_is_rejected() {
        let mut controller = CountingController::new(None);
        assert!(ControlLoop::new(&mut controller, 0., RealtimeConfig::Ignore, 1).is_err());
        assert!(ControlLoop::new(&mut controller, f64::NAN, RealtimeConfig::Ignore, 1).is_err());
    }
}
