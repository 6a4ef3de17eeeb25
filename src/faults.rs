//! Process-wide fault accounting and backoff.
//!
//! One [`FaultMonitor`] is shared by every execution unit. Counters are
//! per-class, append-only, and reset only at process restart, so a burst
//! of errors in one session tightens backoff for all — that coupling is
//! intentional. Reads tolerate slightly stale values; increments are
//! atomic.
//!
//! The latched fatal flag is the only process-wide stop condition: the
//! acceptor, router, and session loops all poll it between iterations.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{error, warn};
use parking_lot::Mutex;

use crate::config::SystemConfig;
use crate::error::ErrorClass;

pub struct FaultMonitor {
    counts: [AtomicU32; ErrorClass::COUNT],
    last_error: Mutex<Option<Instant>>,
    fatal: AtomicBool,
    max_network_retries: u32,
    max_resource_retries: u32,
    max_critical_errors: u32,
}

impl FaultMonitor {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            counts: core::array::from_fn(|_| AtomicU32::new(0)),
            last_error: Mutex::new(None),
            fatal: AtomicBool::new(false),
            max_network_retries: config.max_network_retries,
            max_resource_retries: config.max_resource_retries,
            max_critical_errors: config.max_critical_errors,
        }
    }

    /// Record a fault and decide whether the caller should continue.
    ///
    /// - `Recoverable`: sleeps `100 ms × recoverable_count`, continues.
    /// - `Network`: retryable only on critical paths — up to the ceiling,
    ///   1 s pause each; elsewhere the caller gives up immediately.
    /// - `Resource`: up to the ceiling, 500 ms pause each.
    /// - `Critical`: never continues; past the ceiling on a critical path
    ///   the process-wide fatal flag latches.
    pub fn handle(&self, context: &str, class: ErrorClass, critical_path: bool) -> bool {
        let count = self.counts[class.index()].fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_error.lock() = Some(Instant::now());
        warn!("{context}: {class} fault #{count} (critical_path={critical_path})");

        match class {
            ErrorClass::Recoverable => {
                thread::sleep(Duration::from_millis(100).saturating_mul(count));
                true
            }
            ErrorClass::Network => {
                if !critical_path || count > self.max_network_retries {
                    return false;
                }
                thread::sleep(Duration::from_secs(1));
                true
            }
            ErrorClass::Resource => {
                if count > self.max_resource_retries {
                    return false;
                }
                thread::sleep(Duration::from_millis(500));
                true
            }
            ErrorClass::Critical => {
                if critical_path && count > self.max_critical_errors {
                    self.halt(context);
                }
                false
            }
        }
    }

    /// Latch the fatal flag; the deliberate-halt path.
    pub fn halt(&self, reason: &str) {
        if !self.fatal.swap(true, Ordering::SeqCst) {
            error!("fatal condition latched ({reason}); halting");
        }
    }

    /// True once the process has decided to stop. Polled by every loop.
    pub fn fatal(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }

    pub fn count(&self, class: ErrorClass) -> u32 {
        self.counts[class.index()].load(Ordering::Relaxed)
    }

    /// Per-class counters in [`ErrorClass`] index order, for status lines.
    pub fn snapshot(&self) -> [u32; ErrorClass::COUNT] {
        core::array::from_fn(|i| self.counts[i].load(Ordering::Relaxed))
    }

    pub fn last_error(&self) -> Option<Instant> {
        *self.last_error.lock()
    }
}
