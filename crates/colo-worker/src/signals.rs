//! Start/stop latches driven by OS signals
//!
//! Each latch is a single bit that only ever goes from unset to set. Signal
//! handlers do nothing but store into the latch; the worker's main loop polls
//! it. Delivering a signal twice is therefore a no-op.

use colo_core::config::ReleaseMode;
use colo_core::{START_SIGNAL, STOP_SIGNAL};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet};
use std::ffi::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct LatchFlags {
    start: AtomicBool,
    stop: AtomicBool,
}

/// Latch shared with the process signal handlers
static PROCESS_LATCH: OnceLock<RunLatch> = OnceLock::new();

extern "C" fn handle_start(_: c_int) {
    if let Some(latch) = PROCESS_LATCH.get() {
        latch.flags.start.store(true, Ordering::SeqCst);
    }
}

extern "C" fn handle_stop(_: c_int) {
    if let Some(latch) = PROCESS_LATCH.get() {
        latch.flags.stop.store(true, Ordering::SeqCst);
    }
}

/// Pair of one-shot start/stop latches
#[derive(Debug, Clone)]
pub struct RunLatch {
    flags: Arc<LatchFlags>,
    signal_backed: bool,
}

impl RunLatch {
    /// A latch only set through [`RunLatch::release`] and
    /// [`RunLatch::request_stop`]; used when embedding a worker in-process.
    pub fn detached() -> Self {
        Self {
            flags: Arc::new(LatchFlags::default()),
            signal_backed: false,
        }
    }

    /// The process-wide latch set by `SIGUSR1`/`SIGUSR2` once [`RunLatch::arm`]
    /// has installed the handlers.
    pub fn process() -> Self {
        PROCESS_LATCH
            .get_or_init(|| Self {
                flags: Arc::new(LatchFlags::default()),
                signal_backed: true,
            })
            .clone()
    }

    /// Install the signal handlers feeding this latch.
    ///
    /// Must run before the readiness marker is created, otherwise a start or
    /// stop sent as soon as the marker appears would hit the default action
    /// and kill the process. Detached latches have nothing to install.
    pub fn arm(&self) -> crate::Result<()> {
        if !self.signal_backed {
            return Ok(());
        }

        let start = SigAction::new(
            SigHandler::Handler(handle_start),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        let stop = SigAction::new(
            SigHandler::Handler(handle_stop),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );

        // SAFETY: both handlers only perform an atomic store on a latch that
        // lives for the whole process, which is async-signal-safe.
        unsafe {
            signal::sigaction(START_SIGNAL, &start)?;
            signal::sigaction(STOP_SIGNAL, &stop)?;
        }

        debug!("Installed {} (start) and {} (stop) handlers", START_SIGNAL, STOP_SIGNAL);
        Ok(())
    }

    /// Whether this latch is fed by OS signals
    pub fn is_signal_backed(&self) -> bool {
        self.signal_backed
    }

    /// Set the start latch
    pub fn release(&self) {
        self.flags.start.store(true, Ordering::SeqCst);
    }

    /// Set the stop latch
    pub fn request_stop(&self) {
        self.flags.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_released(&self) -> bool {
        self.flags.start.load(Ordering::SeqCst)
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flags.stop.load(Ordering::SeqCst)
    }

    /// Wait until the start latch is set.
    ///
    /// [`ReleaseMode::Spin`] keeps the core hot and reacts within a few
    /// nanoseconds; [`ReleaseMode::Block`] sleeps `poll` between checks.
    pub fn wait_for_release(&self, mode: ReleaseMode, poll: Duration) {
        match mode {
            ReleaseMode::Spin => {
                while !self.is_released() {
                    std::hint::spin_loop();
                }
            }
            ReleaseMode::Block => {
                while !self.is_released() {
                    std::thread::sleep(poll);
                }
            }
        }
    }
}
