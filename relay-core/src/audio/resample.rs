//! Sample-rate conversion for the client mirror's mic/speaker bridge, built
//! on rubato's `FastFixedIn`.
//!
//! The wire protocol is fixed at 16 kHz mono; `cpal` devices rarely run at
//! that rate (48 kHz is typical). `RateConverter` is used in both
//! directions on the mirror's audio-callback threads — device rate to wire
//! rate on capture, wire rate to device rate on playback — and degrades to
//! a zero-copy passthrough when the two rates already match.
//!
//! ```ignore
//! let mut rc = RateConverter::new(48_000, 16_000, 960)?;
//! let wire_samples = rc.process(&captured); // Vec<f32> at 16 kHz
//! ```

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::{RelayError, Result};

/// Converts mono f32 audio between two fixed sample rates, buffering
/// partial input between calls since rubato expects fixed-size blocks.
pub struct RateConverter {
    /// `None` when `from_rate == to_rate`: nothing to resample.
    resampler: Option<FastFixedIn<f32>>,
    pending: Vec<f32>,
    block_len: usize,
    scratch: Vec<Vec<f32>>,
}

impl RateConverter {
    /// `block_len` is the input frame count rubato consumes per internal
    /// call (e.g. `960`, the chunk size both capture and playback streams
    /// use elsewhere in this module).
    pub fn new(from_rate: u32, to_rate: u32, block_len: usize) -> Result<Self> {
        if from_rate == to_rate {
            return Ok(Self {
                resampler: None,
                pending: Vec::new(),
                block_len,
                scratch: Vec::new(),
            });
        }

        let ratio = to_rate as f64 / from_rate as f64;
        let resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, block_len, 1)
            .map_err(|e| RelayError::AudioDevice(format!("resampler init: {e}")))?;

        let scratch = vec![vec![0f32; resampler.output_frames_max()]; 1];
        tracing::info!(from_rate, to_rate, block_len, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            pending: Vec::new(),
            block_len,
            scratch,
        })
    }

    /// Feeds `samples` in and returns however much resampled output is
    /// ready (possibly empty — a short input may not fill a block yet).
    /// Passthrough mode returns the input unchanged.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return samples.to_vec();
        };

        self.pending.extend_from_slice(samples);

        let mut out = Vec::new();
        while self.pending.len() >= self.block_len {
            let block = &self.pending[..self.block_len];
            match resampler.process_into_buffer(&[block], &mut self.scratch, None) {
                Ok((_consumed, produced)) => out.extend_from_slice(&self.scratch[0][..produced]),
                Err(err) => tracing::error!("resampler process error: {err}"),
            }
            self.pending.drain(..self.block_len);
        }
        out
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}
