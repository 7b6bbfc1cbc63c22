//! The pipeline assembler: wires the six-stage chain together with SPSC
//! queues and hands every thread to a `Supervisor`.
//!
//! Grounded on `s2s_pipeline.py::main`'s construction of `VADHandler`,
//! `WhisperSTTHandler`, `LanguageModelHandler`, `ParlerTTSHandler`,
//! `SocketReceiver`, `SocketSender` and their wiring into a `ThreadManager`.

use std::net::TcpListener;
use std::thread;

use crossbeam_channel::{unbounded, Sender};

use crate::config::RelayConfig;
use crate::diagnostics::TimedStage;
use crate::error::{RelayError, Result};
use crate::model::{Frame, Segment, Sentence, Transcript};
use crate::stage::{run_stage, Message, SourceStage, Stage};
use crate::supervisor::{Supervisor, StopFlag};
use crate::transport::{SocketReceiver, SocketSender};
use crate::vad::VadSegmenter;

/// The three external collaborators, already constructed and `setup()`-ready.
/// Boxed as trait objects since the pipeline never needs to know their
/// concrete type.
pub struct Collaborators {
    pub transcriber: Box<dyn Stage<Input = Segment, Output = Transcript>>,
    pub responder: Box<dyn Stage<Input = Transcript, Output = Sentence>>,
    pub synthesizer: Box<dyn Stage<Input = Sentence, Output = Frame>>,
}

/// Binds both transport listeners up front so a bind failure aborts startup
/// before any stage thread is spawned.
pub struct BoundListeners {
    receiver: TcpListener,
    sender: TcpListener,
}

impl BoundListeners {
    pub fn bind(config: &RelayConfig) -> Result<Self> {
        let recv_addr = format!(
            "{}:{}",
            config.socket_receiver.recv_host, config.socket_receiver.recv_port
        )
        .parse()
        .map_err(|_| RelayError::SetupFailed("invalid socket-receiver address".into()))?;
        let send_addr = format!(
            "{}:{}",
            config.socket_sender.send_host, config.socket_sender.send_port
        )
        .parse()
        .map_err(|_| RelayError::SetupFailed("invalid socket-sender address".into()))?;

        let receiver = SocketReceiver::new(recv_addr, config.socket_receiver.chunk_size).bind()?;
        let sender = TcpListener::bind(send_addr).map_err(|source| RelayError::Bind {
            addr: send_addr,
            source,
        })?;
        Ok(Self { receiver, sender })
    }
}

/// Spawns every stage thread and returns a `Supervisor` the caller can
/// `stop()`/`join()`. Runs the VAD segmenter with an `EnergyActivityModel`
/// unless a different activity model is supplied via `segmenter`.
pub fn spawn(
    config: RelayConfig,
    listeners: BoundListeners,
    segmenter: VadSegmenter,
    collaborators: Collaborators,
) -> Supervisor {
    let stop_flag = StopFlag::new();
    let mut supervisor = Supervisor::new(stop_flag.clone());

    let (recv_tx, recv_rx) = unbounded::<Message<Frame>>();
    let (seg_tx, seg_rx) = unbounded::<Message<Segment>>();
    let (stt_tx, stt_rx) = unbounded::<Message<Transcript>>();
    let (lm_tx, lm_rx) = unbounded::<Message<Sentence>>();
    let (tts_tx, tts_rx) = unbounded::<Message<Frame>>();

    let chunk_size = config.socket_receiver.chunk_size;
    let recv_addr = format!(
        "{}:{}",
        config.socket_receiver.recv_host, config.socket_receiver.recv_port
    )
    .parse()
    .expect("validated in BoundListeners::bind");
    let send_addr = format!(
        "{}:{}",
        config.socket_sender.send_host, config.socket_sender.send_port
    )
    .parse()
    .expect("validated in BoundListeners::bind");

    supervisor.track(spawn_source(
        SocketReceiver::new(recv_addr, chunk_size),
        listeners.receiver,
        recv_tx,
        stop_flag.inner(),
    ));
    supervisor.track(spawn_stage(segmenter, recv_rx, seg_tx, stop_flag.inner()));
    let transcriber = TimedStage::new(collaborators.transcriber, supervisor.diagnostics());
    supervisor.track(spawn_stage(transcriber, seg_rx, stt_tx, stop_flag.inner()));
    supervisor.track(spawn_stage(collaborators.responder, stt_rx, lm_tx, stop_flag.inner()));
    supervisor.track(spawn_stage(collaborators.synthesizer, lm_rx, tts_tx, stop_flag.inner()));
    supervisor.track(spawn_sink(SocketSender::new(send_addr), listeners.sender, tts_rx, stop_flag.inner()));

    supervisor
}

fn spawn_stage<S>(
    stage: S,
    input: crossbeam_channel::Receiver<Message<S::Input>>,
    output: Sender<Message<S::Output>>,
    stop_flag: std::sync::Arc<std::sync::atomic::AtomicBool>,
) -> thread::JoinHandle<()>
where
    S: Stage + 'static,
{
    thread::spawn(move || run_stage(stage, input, output, stop_flag))
}

fn spawn_source(
    stage: SocketReceiver,
    listener: TcpListener,
    output: Sender<Message<Frame>>,
    stop_flag: std::sync::Arc<std::sync::atomic::AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || stage.run_with_listener(listener, output, stop_flag))
}

fn spawn_sink(
    stage: SocketSender,
    listener: TcpListener,
    input: crossbeam_channel::Receiver<Message<Frame>>,
    stop_flag: std::sync::Arc<std::sync::atomic::AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || stage.run_with_listener(listener, input, stop_flag))
}
