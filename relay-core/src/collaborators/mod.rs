//! External collaborator interfaces: each is a stage-shaped consumer of one
//! typed item that yields a lazy sequence of another typed item. The
//! pipeline never introspects their setup options or internal behavior — it
//! only relies on the `Stage` contract.
//!
//! Grounded on `STT/whisper_stt_handler.py` (transcriber), the sentence
//! splitting in `LanguageModelHandler.process` in `s2s_pipeline.py`
//! (responder), and `TTS/melo_handler.py` (synthesizer) for the shape of
//! each collaborator's `setup`/`process` contract.

pub mod identity;

use crate::model::{Frame, Segment, Sentence, Transcript};
use crate::stage::Stage;

/// Consumes a detected utterance, emits zero or one non-empty transcripts.
pub trait Transcriber: Stage<Input = Segment, Output = Transcript> {}
impl<T: Stage<Input = Segment, Output = Transcript>> Transcriber for T {}

/// Consumes a transcript, emits a lazy sequence of response sentences.
pub trait Responder: Stage<Input = Transcript, Output = Sentence> {}
impl<T: Stage<Input = Transcript, Output = Sentence>> Responder for T {}

/// Consumes a sentence, emits a lazy sequence of fixed-size PCM frames.
pub trait Synthesizer: Stage<Input = Sentence, Output = Frame> {}
impl<T: Stage<Input = Sentence, Output = Frame>> Synthesizer for T {}

/// Opaque setup options common to every collaborator type: model
/// identifier, device selector, numeric precision tag, and an opaque map of
/// generator options. Field names are grounded on the `*HandlerArguments`
/// dataclasses in `s2s_pipeline.py` (`model_name`, `device`, `torch_dtype`,
/// and the `*_gen_*`-prefixed keys collected by `prepare_args`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct CollaboratorConfig {
    pub model_name: String,
    pub device: String,
    pub torch_dtype: String,
    pub gen_kwargs: serde_json::Map<String, serde_json::Value>,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            device: "cpu".to_string(),
            torch_dtype: "float32".to_string(),
            gen_kwargs: serde_json::Map::new(),
        }
    }
}
