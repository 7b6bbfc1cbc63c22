//! Client-mirror process: connects a microphone and speaker to the relay's
//! two sockets.
//!
//! Grounded directly on `listen_and_play.py`: a send socket and a recv
//! socket, a `sender()` pump thread draining captured audio onto the send
//! socket, a `receiver()` pump thread reading from the recv socket into the
//! playback queue, and a shared stop flag that every loop checks.

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use crossbeam_channel::{bounded, unbounded};
use relay_core::audio::{MicCapture, SpeakerPlayback};
use relay_core::net::{read_full_chunk, write_all_chunk};

/// Depth of the mic-capture-to-socket queue, in callback buffers. Bounded so
/// a stalled send socket applies backpressure to the capture callback
/// instead of growing without limit.
const MIC_QUEUE_DEPTH: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "relay_mirror", about = "Microphone/speaker bridge for the relay sockets")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 12345)]
    send_port: u16,

    #[arg(long, default_value_t = 12346)]
    recv_port: u16,

    #[arg(long, default_value_t = 1024)]
    chunk_size: usize,

    #[arg(long, default_value_t = 16_000)]
    wire_rate: u32,

    #[arg(long)]
    input_device: Option<String>,
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "relay_mirror=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let send_addr = format!("{}:{}", args.host, args.send_port);
    let recv_addr = format!("{}:{}", args.host, args.recv_port);

    let mut send_sock = TcpStream::connect(&send_addr)?;
    let mut recv_sock = TcpStream::connect(&recv_addr)?;
    tracing::info!(send_addr, recv_addr, "connected");

    let running = Arc::new(AtomicBool::new(true));

    // mic -> send_q -> send_sock
    let (send_tx, send_rx) = bounded::<Vec<u8>>(MIC_QUEUE_DEPTH);
    // recv_sock -> recv_q -> speaker
    let (recv_tx, recv_rx) = unbounded::<Vec<u8>>();

    let mic = MicCapture::open(
        args.input_device.as_deref(),
        args.wire_rate,
        send_tx,
        Arc::clone(&running),
    )?;
    let speaker = SpeakerPlayback::open(args.wire_rate, recv_rx, Arc::clone(&running))?;

    let sender_stop = Arc::clone(&running);
    let sender_handle = std::thread::spawn(move || {
        while sender_stop.load(Ordering::Relaxed) {
            match send_rx.recv_timeout(std::time::Duration::from_millis(200)) {
                Ok(data) => {
                    if write_all_chunk(&mut send_sock, &data).is_err() {
                        sender_stop.store(false, Ordering::Relaxed);
                        break;
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }
    });

    let receiver_stop = Arc::clone(&running);
    let recv_chunk_bytes = args.chunk_size * 2;
    let receiver_handle = std::thread::spawn(move || {
        while receiver_stop.load(Ordering::Relaxed) {
            match read_full_chunk(&mut recv_sock, recv_chunk_bytes) {
                Ok(Some(chunk)) => {
                    if recv_tx.send(chunk).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    receiver_stop.store(false, Ordering::Relaxed);
                    break;
                }
                Err(_) => {
                    receiver_stop.store(false, Ordering::Relaxed);
                    break;
                }
            }
        }
    });

    let ctrlc_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, stopping mirror");
        ctrlc_flag.store(false, Ordering::Relaxed);
    })?;

    tracing::info!("streaming, press Ctrl+C to stop");
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    mic.stop();
    speaker.stop();
    sender_handle.join().ok();
    receiver_handle.join().ok();
    tracing::info!("connections closed");
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("relay_mirror: fatal: {err}");
        std::process::exit(1);
    }
}
