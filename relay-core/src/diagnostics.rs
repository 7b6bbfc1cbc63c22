//! Pipeline-wide metrics exposed without a tracing subscriber attached —
//! cheap counters a caller can poll directly.
//!
//! Grounded on `PipelineDiagnostics`/`DiagnosticsSnapshot`
//! (`dictum-core/src/engine/pipeline.rs`): a small shared struct updated off
//! the hot path and read via a snapshot rather than only through log lines.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::stage::Stage;

/// Shared, cheap-to-clone handle to the pipeline's latency metrics.
#[derive(Clone)]
pub struct PipelineDiagnostics {
    start: Instant,
    first_transcript_latency: Arc<Mutex<Option<Duration>>>,
}

impl PipelineDiagnostics {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            first_transcript_latency: Arc::new(Mutex::new(None)),
        }
    }

    /// Time between pipeline start and the first non-empty transcript, or
    /// `None` if none has arrived yet.
    pub fn first_transcript_latency(&self) -> Option<Duration> {
        *self.first_transcript_latency.lock()
    }

    fn record_first_transcript(&self) {
        let mut slot = self.first_transcript_latency.lock();
        if slot.is_none() {
            *slot = Some(self.start.elapsed());
        }
    }
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a stage, recording `diagnostics`'s first-output latency the first
/// time `process` yields anything. Transparent otherwise.
pub struct TimedStage<S: Stage> {
    inner: S,
    diagnostics: PipelineDiagnostics,
}

impl<S: Stage> TimedStage<S> {
    pub fn new(inner: S, diagnostics: PipelineDiagnostics) -> Self {
        Self { inner, diagnostics }
    }
}

impl<S: Stage> Stage for TimedStage<S> {
    type Input = S::Input;
    type Output = S::Output;

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn setup(&mut self) -> crate::error::Result<()> {
        self.inner.setup()
    }

    fn process(&mut self, item: Self::Input) -> Vec<Self::Output> {
        let out = self.inner.process(item);
        if !out.is_empty() {
            self.diagnostics.record_first_transcript();
        }
        out
    }

    fn teardown(&mut self) {
        self.inner.teardown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    impl Stage for Echo {
        type Input = i32;
        type Output = i32;
        fn name(&self) -> &str {
            "echo"
        }
        fn process(&mut self, item: i32) -> Vec<i32> {
            vec![item]
        }
    }

    struct Silent;
    impl Stage for Silent {
        type Input = i32;
        type Output = i32;
        fn name(&self) -> &str {
            "silent"
        }
        fn process(&mut self, _item: i32) -> Vec<i32> {
            Vec::new()
        }
    }

    #[test]
    fn records_latency_on_first_non_empty_output_only() {
        let diagnostics = PipelineDiagnostics::new();
        let mut stage = TimedStage::new(Echo, diagnostics.clone());
        assert!(diagnostics.first_transcript_latency().is_none());

        stage.process(1);
        let first = diagnostics.first_transcript_latency().expect("recorded");

        stage.process(2);
        assert_eq!(diagnostics.first_transcript_latency().unwrap(), first);
    }

    #[test]
    fn empty_outputs_never_record() {
        let diagnostics = PipelineDiagnostics::new();
        let mut stage = TimedStage::new(Silent, diagnostics.clone());
        stage.process(1);
        assert!(diagnostics.first_transcript_latency().is_none());
    }
}
