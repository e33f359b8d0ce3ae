//! Best-effort profiler markers around the measurement phase
//!
//! A GPU profiler integration implements [`ProfilerMarkers`] and brackets the
//! measured region with start/stop and a named range. Markers never fail the
//! run: implementations swallow their own errors.

use tracing::span::EnteredSpan;
use tracing::{debug, info_span};

/// Hooks invoked around the measurement phase
pub trait ProfilerMarkers {
    /// Begin capturing
    fn start(&mut self) {}

    /// Open a named range
    fn range_push(&mut self, _name: &str) {}

    /// Close the innermost open range
    fn range_pop(&mut self) {}

    /// Stop capturing
    fn stop(&mut self) {}
}

/// Profiler that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProfiler;

impl ProfilerMarkers for NoopProfiler {}

/// Profiler that maps ranges onto `tracing` spans.
///
/// Useful with a span-aware subscriber to see where the measured region begins
/// and ends relative to the worker's log lines.
#[derive(Debug, Default)]
pub struct TracingProfiler {
    ranges: Vec<EnteredSpan>,
    capturing: bool,
}

impl TracingProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently open ranges
    pub fn depth(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }
}

impl ProfilerMarkers for TracingProfiler {
    fn start(&mut self) {
        self.capturing = true;
        debug!("Profiler capture started");
    }

    fn range_push(&mut self, name: &str) {
        self.ranges.push(info_span!("profile_range", name = name).entered());
    }

    fn range_pop(&mut self) {
        // Popping an empty stack is ignored
        if let Some(span) = self.ranges.pop() {
            span.exit();
        }
    }

    fn stop(&mut self) {
        while let Some(span) = self.ranges.pop() {
            span.exit();
        }
        self.capturing = false;
        debug!("Profiler capture stopped");
    }
}
