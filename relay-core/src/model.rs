//! The types that flow along inter-stage queues.

/// A fixed-size buffer of signed 16-bit little-endian PCM samples at 16 kHz
/// mono. Produced by the transport ingress or the synthesizer; consumed by
/// exactly one downstream stage; never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Interprets the frame as little-endian i16 samples.
    pub fn to_i16_samples(&self) -> Vec<i16> {
        self.bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    pub fn from_i16_samples(samples: &[i16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        Self { bytes }
    }
}

/// A variable-length utterance: float32 samples in [-1, 1] at 16 kHz.
///
/// Invariant (enforced by the VAD segmenter before emission):
/// `min_speech_ms <= duration_ms(segment) <= max_speech_ms`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Segment {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_ms(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64 * 1000.0
    }
}

/// A non-empty, trimmed text string produced by the transcriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript(String);

impl Transcript {
    /// Returns `None` if the trimmed text is empty — empty or
    /// whitespace-only transcripts must not be emitted.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let trimmed = text.into().trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// A non-empty text string representing one sentence of the responder's
/// streaming output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence(String);

impl Sentence {
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let trimmed = text.into();
        if trimmed.trim().is_empty() {
            None
        } else {
            Some(Self(trimmed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrips_i16_samples() {
        let samples = [1i16, -1, 0, i16::MAX, i16::MIN];
        let frame = Frame::from_i16_samples(&samples);
        assert_eq!(frame.to_i16_samples(), samples);
    }

    #[test]
    fn transcript_rejects_blank_text() {
        assert!(Transcript::new("   \n\t").is_none());
        assert!(Transcript::new("").is_none());
    }

    #[test]
    fn transcript_trims_surrounding_whitespace() {
        let t = Transcript::new("  hello world  ").unwrap();
        assert_eq!(t.as_str(), "hello world");
    }

    #[test]
    fn sentence_rejects_blank_text() {
        assert!(Sentence::new("   ").is_none());
        assert!(Sentence::new("hi").is_some());
    }

    #[test]
    fn segment_duration_ms_matches_sample_count() {
        let seg = Segment::new(vec![0.0; 8000], 16000);
        assert!((seg.duration_ms() - 500.0).abs() < 1e-9);
    }
}
