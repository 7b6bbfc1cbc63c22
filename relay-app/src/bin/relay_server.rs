//! Server-side entry point: binds the ingress/egress sockets, assembles the
//! pipeline, and runs until interrupted.
//!
//! Grounded on `s2s_pipeline.py::main`'s construction sequence (parse args,
//! configure logging, build each handler, start the `ThreadManager`) and
//! `dictum-app/src/main.rs`'s `tracing_subscriber` setup.

use clap::Parser;
use relay_app::cli::Cli;
use relay_core::collaborators::identity::{IdentityResponder, IdentitySynthesizer, IdentityTranscriber};
use relay_core::pipeline::{BoundListeners, Collaborators};
use relay_core::vad::activity::EnergyActivityModel;
use relay_core::vad::VadSegmenter;
use relay_core::{pipeline, RelayConfig};

fn init_logging(config: &RelayConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("relay_server={},relay_core={}", config.module.log_level, config.module.log_level)
            .parse()
            .unwrap()
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_logging(&config);

    tracing::info!(
        recv = format!("{}:{}", config.socket_receiver.recv_host, config.socket_receiver.recv_port),
        send = format!("{}:{}", config.socket_sender.send_host, config.socket_sender.send_port),
        "relay_server starting"
    );

    let listeners = BoundListeners::bind(&config)?;

    let segmenter = VadSegmenter::new(
        config.vad,
        Box::new(EnergyActivityModel::new(config.vad.threshold)),
    );
    let collaborators = Collaborators {
        transcriber: Box::new(IdentityTranscriber),
        responder: Box::new(IdentityResponder),
        synthesizer: Box::new(IdentitySynthesizer::new(config.socket_receiver.chunk_size)),
    };

    let mut supervisor = pipeline::spawn(config, listeners, segmenter, collaborators);

    let stop_flag = supervisor.stop_flag();
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, stopping pipeline");
        stop_flag.set();
    })?;

    supervisor.join();
    tracing::info!("relay_server exiting cleanly");
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("relay_server: fatal: {err}");
        std::process::exit(1);
    }
}
