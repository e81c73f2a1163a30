// src/metrics.rs

//! Peak memory sampling for child processes.
//!
//! Memory tracking uses the `sysinfo` crate and is best-effort:
//! - Memory is sampled periodically (polling).
//! - Extremely short-lived spikes may not be captured.
//! - If the PID cannot be inspected, the result is `None`.
//!
//! The figure is reported as `memoryUsageKb` and is never used in scoring.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use sysinfo::{Pid, System};

/// Tracks peak memory usage of a child process while it runs.
///
/// The sampler thread stops when the process disappears, when
/// [`MemoryTracker::stop_and_take`] is called, or when the tracker is
/// dropped (e.g. the run was cancelled).
pub struct MemoryTracker {
    stop: Arc<AtomicBool>,
    max_kb: Arc<AtomicU64>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MemoryTracker {
    /// Start tracking memory usage for a process.
    ///
    /// - `pid_u32`: PID of the child process
    /// - `sample_every`: polling interval (e.g. 20ms)
    pub fn start(pid_u32: u32, sample_every: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let max_kb = Arc::new(AtomicU64::new(0));

        let stop_clone = Arc::clone(&stop);
        let max_clone = Arc::clone(&max_kb);

        let handle = thread::spawn(move || {
            let pid = Pid::from_u32(pid_u32);
            let mut system = System::new();

            while !stop_clone.load(Ordering::Relaxed) {
                if !system.refresh_process(pid) {
                    break;
                }

                match system.process(pid) {
                    // sysinfo reports bytes
                    Some(process) => {
                        max_clone.fetch_max(process.memory() / 1024, Ordering::Relaxed);
                    }
                    None => break,
                }

                thread::sleep(sample_every);
            }
        });

        Self {
            stop,
            max_kb,
            handle: Some(handle),
        }
    }

    /// Stop tracking and return the peak RSS in KB.
    ///
    /// Returns `None` if no samples were collected.
    pub fn stop_and_take(mut self) -> Option<u64> {
        self.halt();

        match self.max_kb.load(Ordering::Relaxed) {
            0 => None,
            kb => Some(kb),
        }
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MemoryTracker {
    fn drop(&mut self) {
        self.halt();
    }
}
