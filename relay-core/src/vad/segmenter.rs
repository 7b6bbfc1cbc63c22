//! The VAD segmenter: the only stage with a nontrivial own state machine.
//! Consumes fixed-size 16-bit PCM frames, converts them to float32, and
//! runs them through a triggered/untriggered hysteresis state machine built
//! on an `ActivityModel`.
//!
//! Grounded on `VAD/vad_handler.py`'s `VADIterator` wrapping plus its
//! post-emit duration filter (`if not (min_speech_ms <= dur <=
//! max_speech_ms): return`).

use std::collections::VecDeque;

use crate::model::{Frame, Segment};
use crate::stage::Stage;
use crate::vad::activity::ActivityModel;

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct VadConfig {
    pub threshold: f32,
    pub sample_rate: u32,
    pub min_silence_ms: u64,
    pub min_speech_ms: u64,
    pub max_speech_ms: f64,
    pub speech_pad_ms: u64,
    /// The half-duplex `should_listen` gate. Deliberately unimplemented:
    /// wired through as an inert field so the decision not to merge it is
    /// visible in the type rather than silently absent. See DESIGN.md.
    pub gate_on_synthesis: bool,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            sample_rate: 16_000,
            min_silence_ms: 250,
            min_speech_ms: 500,
            max_speech_ms: f64::INFINITY,
            speech_pad_ms: 30,
            gate_on_synthesis: false,
        }
    }
}

impl VadConfig {
    fn neg_threshold(&self) -> f32 {
        self.threshold - 0.15
    }

    fn ms_to_samples(&self, ms: u64) -> usize {
        ((ms as f64 * self.sample_rate as f64) / 1000.0).round() as usize
    }
}

fn i16_bytes_to_f32(frame: &Frame) -> Vec<f32> {
    frame
        .to_i16_samples()
        .into_iter()
        .map(|s| s as f32 / 32768.0)
        .collect()
}

pub struct VadSegmenter {
    config: VadConfig,
    model: Box<dyn ActivityModel>,
    triggered: bool,
    accumulated: Vec<f32>,
    pending_silence: Vec<f32>,
    silence_samples: u64,
    pre_speech: VecDeque<f32>,
}

impl VadSegmenter {
    pub fn new(config: VadConfig, model: Box<dyn ActivityModel>) -> Self {
        Self {
            config,
            model,
            triggered: false,
            accumulated: Vec::new(),
            pending_silence: Vec::new(),
            silence_samples: 0,
            pre_speech: VecDeque::new(),
        }
    }

    fn pad_samples(&self) -> usize {
        self.config.ms_to_samples(self.config.speech_pad_ms)
    }

    fn reset_utterance(&mut self) {
        self.triggered = false;
        self.accumulated.clear();
        self.pending_silence.clear();
        self.silence_samples = 0;
    }

    fn push_pre_speech(&mut self, samples: &[f32]) {
        self.pre_speech.extend(samples.iter().copied());
        let cap = self.pad_samples();
        while self.pre_speech.len() > cap {
            self.pre_speech.pop_front();
        }
    }

    /// Runs one frame through the state machine. Returns `Some(samples)` if
    /// this frame completed an utterance (post-emit duration filtering is
    /// the caller's job, see `to_segment`).
    fn push_frame(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        let p = self.model.activity(samples);
        let neg_threshold = self.config.neg_threshold();

        if !self.triggered {
            if p >= self.config.threshold {
                self.triggered = true;
                self.accumulated = self.pre_speech.drain(..).collect();
                self.accumulated.extend_from_slice(samples);
                self.silence_samples = 0;
            } else {
                self.push_pre_speech(samples);
            }
            return None;
        }

        // triggered
        if p < neg_threshold {
            self.pending_silence.extend_from_slice(samples);
            self.silence_samples += samples.len() as u64;
            let min_silence_samples = self.config.ms_to_samples(self.config.min_silence_ms) as u64;
            if self.silence_samples >= min_silence_samples {
                let pad = self.pad_samples();
                let take_from = self.pending_silence.len().saturating_sub(pad);
                self.accumulated.extend_from_slice(&self.pending_silence[take_from..]);
                let utterance = std::mem::take(&mut self.accumulated);
                self.reset_utterance();
                return Some(utterance);
            }
        } else {
            // back above the exit floor: fold any pending (sub-threshold
            // debounce) silence back into the utterance and keep going
            let pending = std::mem::take(&mut self.pending_silence);
            self.accumulated.extend(pending);
            self.accumulated.extend_from_slice(samples);
            self.silence_samples = 0;
        }
        None
    }

    /// Applies the post-emit min/max duration filter, run by the segmenter
    /// itself rather than the activity model.
    fn to_segment(&self, samples: Vec<f32>) -> Option<Segment> {
        let duration_ms = samples.len() as f64 / self.config.sample_rate as f64 * 1000.0;
        if duration_ms < self.config.min_speech_ms as f64 || duration_ms > self.config.max_speech_ms {
            tracing::debug!(duration_ms, "utterance outside min/max speech duration, dropping");
            return None;
        }
        Some(Segment::new(samples, self.config.sample_rate))
    }
}

impl Stage for VadSegmenter {
    type Input = Frame;
    type Output = Segment;

    fn name(&self) -> &str {
        "vad-segmenter"
    }

    fn process(&mut self, item: Frame) -> Vec<Segment> {
        let samples = i16_bytes_to_f32(&item);
        match self.push_frame(&samples) {
            Some(utterance) => self.to_segment(utterance).into_iter().collect(),
            None => Vec::new(),
        }
    }
}
