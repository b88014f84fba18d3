// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later
use std::path::Path;

use crate::exception::{TeleopException, TeleopResult};

/// Determines whether the current OS kernel is a realtime kernel.
///
/// On Linux, this checks for the existence of `/sys/kernel/realtime`.
pub fn has_realtime_kernel() -> bool {
    Path::new("/sys/kernel/realtime").exists()
}

/// Sets the current thread to the highest possible scheduler priority.
///
/// # Errors
/// * RealTimeException if realtime priority cannot be set for the current thread.
///
/// If the method returns an Error please check your /etc/security/limits.conf file
/// There should be a line like this:
/// ```text
///marco            -       rtprio          99
/// ```
pub fn set_current_thread_to_highest_scheduler_priority() -> TeleopResult<()> {
    unsafe {
        let max_priority = libc::sched_get_priority_max(libc::SCHED_FIFO);
        if max_priority == -1 {
            return Err(TeleopException::RealTimeException {
                message: "franka-teleop: unable to get maximum possible thread priority"
                    .to_string(),
            });
        }
        // one below the maximum, see https://rt.wiki.kernel.org/index.php/HOWTO:_Build_an_RT-application
        let thread_param = libc::sched_param {
            sched_priority: max_priority - 1,
        };
        if libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &thread_param) != 0 {
            return Err(TeleopException::RealTimeException {
                message: "franka-teleop: unable to set realtime scheduling".to_string(),
            });
        }
        // keeps the cycle from page faulting on swapped out memory
        if libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) != 0 {
            return Err(TeleopException::RealTimeException {
                message: "franka-teleop: unable to lock memory".to_string(),
            });
        }
    }
    Ok(())
}
