//! Per-block configuration structs: one top-level block each for module (log
//! level), socket-receiver, socket-sender, vad, and one block per external
//! collaborator.
//!
//! Field names and literal defaults are grounded on the `*Arguments`
//! dataclasses in `s2s_pipeline.py`. Shape (`camelCase` on the wire,
//! `#[serde(default)]`) is grounded on `dictum-app/src/settings.rs::AppSettings`.

use serde::{Deserialize, Serialize};

use crate::collaborators::CollaboratorConfig;
use crate::vad::VadConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct ModuleConfig {
    pub log_level: String,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct SocketReceiverConfig {
    pub recv_host: String,
    pub recv_port: u16,
    pub chunk_size: usize,
}

impl Default for SocketReceiverConfig {
    fn default() -> Self {
        Self {
            recv_host: "0.0.0.0".to_string(),
            recv_port: 12345,
            chunk_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct SocketSenderConfig {
    pub send_host: String,
    pub send_port: u16,
}

impl Default for SocketSenderConfig {
    fn default() -> Self {
        Self {
            send_host: "0.0.0.0".to_string(),
            send_port: 12346,
        }
    }
}

/// The full, aggregated configuration for one `relay_server` run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct RelayConfig {
    pub module: ModuleConfig,
    pub socket_receiver: SocketReceiverConfig,
    pub socket_sender: SocketSenderConfig,
    pub vad: VadConfig,
    pub transcriber: CollaboratorConfig,
    pub responder: CollaboratorConfig,
    pub synthesizer: CollaboratorConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_socket_and_vad_values() {
        let config = RelayConfig::default();
        assert_eq!(config.socket_receiver.recv_port, 12345);
        assert_eq!(config.socket_sender.send_port, 12346);
        assert_eq!(config.socket_receiver.chunk_size, 1024);
        assert_eq!(config.vad.threshold, 0.3);
        assert_eq!(config.vad.min_speech_ms, 500);
        assert!(config.vad.max_speech_ms.is_infinite());
    }

    #[test]
    fn round_trips_through_json_with_camel_case_keys() {
        let config = RelayConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"recvHost\""));
        assert!(json.contains("\"chunkSize\""));
        let back: RelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.socket_receiver.recv_port, config.socket_receiver.recv_port);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{"vad": {"threshold": 0.5}}"#;
        let config: RelayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.vad.threshold, 0.5);
        assert_eq!(config.socket_receiver.recv_port, 12345);
    }
}
