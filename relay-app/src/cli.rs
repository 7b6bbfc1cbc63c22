//! Command-line surface for `relay_server`.
//!
//! Grounded on `s2s_pipeline.py::main`'s argument parsing: a single JSON file
//! argument is accepted in place of individual flags
//! (`sys.argv[1].endswith(".json")`), with flags providing quick overrides of
//! the handful of fields operators tune most often.

use std::path::PathBuf;

use clap::Parser;
use relay_core::RelayConfig;

#[derive(Parser, Debug)]
#[command(name = "relay_server", about = "Speech-to-speech relay pipeline")]
pub struct Cli {
    /// Path to a JSON configuration file. When given, overrides every
    /// top-level block; otherwise the defaults below apply.
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long)]
    pub recv_host: Option<String>,

    #[arg(long)]
    pub recv_port: Option<u16>,

    #[arg(long)]
    pub send_host: Option<String>,

    #[arg(long)]
    pub send_port: Option<u16>,

    #[arg(long)]
    pub chunk_size: Option<usize>,

    #[arg(long)]
    pub vad_threshold: Option<f32>,
}

impl Cli {
    /// Loads the base config from `self.config` (if set) or `RelayConfig::default()`,
    /// then applies any flag overrides on top.
    pub fn load_config(&self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str(&text)?
            }
            None => RelayConfig::default(),
        };

        if let Some(v) = &self.log_level {
            config.module.log_level = v.clone();
        }
        if let Some(v) = &self.recv_host {
            config.socket_receiver.recv_host = v.clone();
        }
        if let Some(v) = self.recv_port {
            config.socket_receiver.recv_port = v;
        }
        if let Some(v) = &self.send_host {
            config.socket_sender.send_host = v.clone();
        }
        if let Some(v) = self.send_port {
            config.socket_sender.send_port = v;
        }
        if let Some(v) = self.chunk_size {
            config.socket_receiver.chunk_size = v;
        }
        if let Some(v) = self.vad_threshold {
            config.vad.threshold = v;
        }

        Ok(config)
    }
}
