//! # relay-core
//!
//! A real-time, full-duplex speech-to-speech relay pipeline.
//!
//! ## Architecture
//!
//! ```text
//! SocketReceiver → VadSegmenter → Transcriber → Responder → Synthesizer → SocketSender
//!   (ingress)                      (external)    (external)   (external)    (egress)
//! ```
//!
//! Every box is a [`stage::Stage`] running on its own OS thread, connected by
//! unbounded SPSC queues. A shutdown sentinel travels downstream through
//! every queue in order; there is no cooperative scheduler and no event
//! loop. [`supervisor::Supervisor`] owns the thread handles and the shared
//! stop flag.
//!
//! The transcriber, responder, and synthesizer are external collaborators
//! (`collaborators` module) — this crate only defines the interface they
//! must satisfy, never the ML models behind it.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod collaborators;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod net;
pub mod pipeline;
pub mod stage;
pub mod supervisor;
pub mod transport;
pub mod vad;

pub use config::RelayConfig;
pub use error::RelayError;
pub use model::{Frame, Segment, Sentence, Transcript};
pub use pipeline::{BoundListeners, Collaborators};
pub use stage::{Message, SinkStage, SourceStage, Stage};
pub use supervisor::{StopFlag, Supervisor};
