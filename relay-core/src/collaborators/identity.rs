//! Identity collaborators: transcriber, responder, and synthesizer that each
//! yield their input unchanged, treating text as a single sentence. Wiring
//! all three together reduces the whole pipeline to loopback after the VAD
//! stage.
//!
//! A `Segment` is float32 samples and a `Transcript`/`Sentence` is text, so
//! "unchanged" here means a lossless round trip through a textual encoding:
//! the transcriber base64-encodes the segment's PCM bytes into the
//! transcript string; the synthesizer decodes them back out. This is purely
//! a test fixture — no real collaborator would do this — but it is the only
//! way to make the loopback-after-VAD property concretely testable without a
//! real model.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::model::{Frame, Segment, Sentence, Transcript};
use crate::stage::Stage;

fn segment_to_bytes(segment: &Segment) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(segment.samples().len() * 2);
    for &s in segment.samples() {
        let clamped = s.clamp(-1.0, 1.0);
        let i16_sample = (clamped * 32768.0) as i16;
        bytes.extend_from_slice(&i16_sample.to_le_bytes());
    }
    bytes
}

pub struct IdentityTranscriber;

impl Stage for IdentityTranscriber {
    type Input = Segment;
    type Output = Transcript;

    fn name(&self) -> &str {
        "identity-transcriber"
    }

    fn process(&mut self, item: Segment) -> Vec<Transcript> {
        let encoded = BASE64.encode(segment_to_bytes(&item));
        Transcript::new(encoded).into_iter().collect()
    }
}

pub struct IdentityResponder;

impl Stage for IdentityResponder {
    type Input = Transcript;
    type Output = Sentence;

    fn name(&self) -> &str {
        "identity-responder"
    }

    fn process(&mut self, item: Transcript) -> Vec<Sentence> {
        Sentence::new(item.into_string()).into_iter().collect()
    }
}

pub struct IdentitySynthesizer {
    frame_bytes: usize,
}

impl IdentitySynthesizer {
    pub fn new(frame_bytes: usize) -> Self {
        Self { frame_bytes }
    }
}

impl Stage for IdentitySynthesizer {
    type Input = Sentence;
    type Output = Frame;

    fn name(&self) -> &str {
        "identity-synthesizer"
    }

    fn process(&mut self, item: Sentence) -> Vec<Frame> {
        let bytes = match BASE64.decode(item.as_str()) {
            Ok(b) => b,
            Err(err) => {
                tracing::warn!(?err, "identity synthesizer received non-base64 sentence");
                return Vec::new();
            }
        };
        bytes
            .chunks(self.frame_bytes)
            .map(|chunk| {
                if chunk.len() == self.frame_bytes {
                    Frame::new(chunk.to_vec())
                } else {
                    // zero-pad the final short chunk, mirroring
                    // melo_handler.py's zero-padded last TTS chunk
                    let mut padded = chunk.to_vec();
                    padded.resize(self.frame_bytes, 0);
                    Frame::new(padded)
                }
            })
            .collect()
    }
}
