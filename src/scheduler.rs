use tracing::{info, warn};

use crate::error::{Error, Result};

pub const DEFAULT_RT_PRIORITY: i32 = 80;

/// Which scheduler runs the client entry point. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingMode {
    /// Run on the calling thread under the default scheduler.
    Default,
    /// Run on a dedicated SCHED_FIFO thread with locked memory.
    RealTime { priority: i32 },
}

/// Runs `entry` under the selected scheduler and returns its result.
///
/// The entry point owns everything it needs; nothing is shared with the
/// launching thread besides the returned value.
pub fn launch<F, T>(mode: SchedulingMode, entry: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match mode {
        SchedulingMode::Default => Ok(entry()),
        SchedulingMode::RealTime { priority } => {
            let handle = std::thread::Builder::new()
                .name("rt-dispatch".into())
                .spawn(move || -> std::result::Result<T, String> {
                    enter_real_time(priority)?;
                    Ok(entry())
                })
                .map_err(|e| Error::Scheduler(format!("spawning real-time thread: {e}")))?;

            handle
                .join()
                .map_err(|_| Error::Scheduler("real-time thread panicked".into()))?
                .map_err(Error::Scheduler)
        }
    }
}

#[cfg(target_os = "linux")]
fn enter_real_time(priority: i32) -> std::result::Result<(), String> {
    // page faults mid-loop show up as latency spikes
    let ret = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    if ret != 0 {
        warn!(
            err = %std::io::Error::last_os_error(),
            "mlockall failed; continuing with pageable memory"
        );
    }

    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        return Err(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {}",
            std::io::Error::last_os_error()
        ));
    }

    info!(priority, "running under SCHED_FIFO");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn enter_real_time(priority: i32) -> std::result::Result<(), String> {
    warn!(priority, "real-time scheduling unsupported on this platform; using default scheduler");
    Ok(())
}
