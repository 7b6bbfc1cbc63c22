//! The stage abstraction: one worker thread per stage, an input queue, an
//! output queue, and a uniform shutdown protocol driven by a sentinel value.
//!
//! Grounded on `BaseHandler.run`: take one item; a sentinel breaks the loop;
//! otherwise `process` it and forward every output it yields, in order; on
//! exit, run teardown and forward exactly one sentinel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvError, Sender};

/// Every inter-stage queue carries either a payload or the shutdown
/// sentinel.
#[derive(Debug, Clone)]
pub enum Message<T> {
    Item(T),
    Shutdown,
}

impl<T> Message<T> {
    pub fn into_item(self) -> Option<T> {
        match self {
            Message::Item(item) => Some(item),
            Message::Shutdown => None,
        }
    }
}

/// A worker that consumes one item type and produces zero or more of
/// another. Implementors supply `process`; `setup`/`teardown` default to
/// no-ops.
pub trait Stage: Send {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Called once before the worker loop starts. Errors here abort
    /// pipeline startup: setup failure is fatal.
    fn setup(&mut self) -> crate::error::Result<()> {
        Ok(())
    }

    /// Invoked once per non-sentinel input. Implementations must not panic;
    /// a failing invocation should log and return an empty vec so the
    /// pipeline continues — per-item processing failure is recovered
    /// locally, not fatal to the stage.
    fn process(&mut self, item: Self::Input) -> Vec<Self::Output>;

    /// Invoked once after the worker loop exits, before the sentinel is
    /// forwarded downstream.
    fn teardown(&mut self) {}
}

/// Runs `stage`'s worker loop to completion: take from `input`, stop on a
/// sentinel or the stop flag, otherwise call `process` and forward every
/// output onto `output` in order. Always forwards exactly one sentinel
/// downstream before returning.
pub fn run_stage<S>(
    mut stage: S,
    input: Receiver<Message<S::Input>>,
    output: Sender<Message<S::Output>>,
    stop_flag: Arc<AtomicBool>,
) where
    S: Stage,
{
    loop {
        if stop_flag.load(Ordering::SeqCst) {
            break;
        }
        match input.recv() {
            Ok(Message::Shutdown) => break,
            Ok(Message::Item(item)) => {
                for out in stage.process(item) {
                    if output.send(Message::Item(out)).is_err() {
                        // downstream already gone; nothing more we can do
                        tracing::warn!(stage = stage.name(), "output queue closed, dropping item");
                    }
                }
            }
            Err(RecvError) => {
                // upstream dropped its sender without a sentinel; treat as
                // end-of-stream rather than spinning
                break;
            }
        }
        if stop_flag.load(Ordering::SeqCst) {
            break;
        }
    }
    stage.teardown();
    let _ = output.send(Message::Shutdown);
}

impl<I, O> Stage for Box<dyn Stage<Input = I, Output = O>>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn setup(&mut self) -> crate::error::Result<()> {
        (**self).setup()
    }

    fn process(&mut self, item: I) -> Vec<O> {
        (**self).process(item)
    }

    fn teardown(&mut self) {
        (**self).teardown()
    }
}

/// A stage with no input queue: it is the head of the chain (e.g.
/// `SocketReceiver`). Implementors drive their own loop and are responsible
/// for emitting exactly one sentinel on exit.
pub trait SourceStage: Send {
    type Output: Send + 'static;

    fn name(&self) -> &str;

    fn run(self: Box<Self>, output: Sender<Message<Self::Output>>, stop_flag: Arc<AtomicBool>);
}

/// A stage with no output queue: it is the tail of the chain (e.g.
/// `SocketSender`).
pub trait SinkStage: Send {
    type Input: Send + 'static;

    fn name(&self) -> &str;

    fn run(self: Box<Self>, input: Receiver<Message<Self::Input>>, stop_flag: Arc<AtomicBool>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::thread;
    use std::time::Duration;

    struct Doubler;

    impl Stage for Doubler {
        type Input = i32;
        type Output = i32;

        fn name(&self) -> &str {
            "doubler"
        }

        fn process(&mut self, item: i32) -> Vec<i32> {
            vec![item, item]
        }
    }

    struct FailsAlways;

    impl Stage for FailsAlways {
        type Input = i32;
        type Output = i32;

        fn name(&self) -> &str {
            "fails-always"
        }

        fn process(&mut self, _item: i32) -> Vec<i32> {
            tracing::warn!(stage = self.name(), "simulated per-item failure");
            Vec::new()
        }
    }

    fn recv_within<T>(rx: &Receiver<T>, millis: u64) -> Option<T> {
        rx.recv_timeout(Duration::from_millis(millis)).ok()
    }

    #[test]
    fn forwards_process_outputs_in_order_then_one_sentinel() {
        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let stop = stop.clone();
            thread::spawn(move || run_stage(Doubler, in_rx, out_tx, stop))
        };

        in_tx.send(Message::Item(1)).unwrap();
        in_tx.send(Message::Item(2)).unwrap();
        in_tx.send(Message::Shutdown).unwrap();

        let mut items = Vec::new();
        loop {
            match recv_within(&out_rx, 500).expect("expected a message") {
                Message::Item(v) => items.push(v),
                Message::Shutdown => break,
            }
        }
        assert_eq!(items, vec![1, 1, 2, 2]);
        handle.join().unwrap();
    }

    #[test]
    fn stop_flag_causes_prompt_exit_with_sentinel() {
        let (in_tx, in_rx) = unbounded::<Message<i32>>();
        let (out_tx, out_rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(true));

        thread::spawn(move || run_stage(Doubler, in_rx, out_tx, stop));
        drop(in_tx);

        match recv_within(&out_rx, 500).expect("expected sentinel") {
            Message::Shutdown => {}
            Message::Item(_) => panic!("expected sentinel, got item"),
        }
    }

    #[test]
    fn failing_stage_drains_without_deadlock_and_emits_no_outputs() {
        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let stop = stop.clone();
            thread::spawn(move || run_stage(FailsAlways, in_rx, out_tx, stop))
        };

        for i in 0..5 {
            in_tx.send(Message::Item(i)).unwrap();
        }
        in_tx.send(Message::Shutdown).unwrap();

        match recv_within(&out_rx, 500).expect("expected sentinel") {
            Message::Shutdown => {}
            Message::Item(_) => panic!("FailsAlways must emit zero items"),
        }
        handle.join().unwrap();
    }
}
