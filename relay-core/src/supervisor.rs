//! The lifecycle supervisor: owns every stage's thread handle and the shared
//! stop flag, and orchestrates start/stop/join.
//!
//! Grounded directly on `ThreadManager`: `start()` spawns one thread per
//! handler, `stop()` sets the stop event and joins every thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::diagnostics::PipelineDiagnostics;

/// Shared, single-writer-after-start stop flag. Cloning shares the same
/// underlying atomic; nobody writes `false` back after a run begins.
#[derive(Clone)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds every stage thread and the shared stop flag for one pipeline run.
pub struct Supervisor {
    stop_flag: StopFlag,
    handles: Vec<JoinHandle<()>>,
    diagnostics: PipelineDiagnostics,
}

impl Supervisor {
    pub fn new(stop_flag: StopFlag) -> Self {
        Self {
            stop_flag,
            handles: Vec::new(),
            diagnostics: PipelineDiagnostics::new(),
        }
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop_flag.clone()
    }

    /// Shared handle to this run's metrics. Clone it before wrapping a stage
    /// with [`crate::diagnostics::TimedStage`] so both sides see the same
    /// counters.
    pub fn diagnostics(&self) -> PipelineDiagnostics {
        self.diagnostics.clone()
    }

    /// Registers an already-spawned stage thread. Stages are spawned by the
    /// pipeline assembler (which knows each stage's concrete input/output
    /// types); the supervisor only needs the resulting handle to join later.
    pub fn track(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    /// Sets the stop flag. Does not by itself unblock a stage parked on a
    /// blocking queue `recv` — sentinel propagation or a closed transport
    /// connection does that; cancellation is cooperative, not preemptive.
    pub fn stop(&self) {
        self.stop_flag.set();
    }

    /// Blocks until every tracked thread has exited.
    pub fn join(&mut self) {
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.join() {
                tracing::error!(?err, "stage thread panicked");
            }
        }
    }
}
