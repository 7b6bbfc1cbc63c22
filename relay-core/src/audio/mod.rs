//! Microphone capture and speaker playback for the client mirror.
//!
//! Grounded on `listen_and_play.py`: a `cb_send` callback that hands each
//! captured buffer to a queue wholesale (`send_q.put(bytes(indata))`), and a
//! `cb_recv` callback that pulls one buffer per invocation and zero-fills the
//! output on an empty queue. That is a discrete per-callback handoff, not a
//! continuous byte-level ring, so `MicCapture`/`SpeakerPlayback` hand whole
//! `Vec<u8>` buffers through a `crossbeam_channel`, one send/recv per cpal
//! callback, instead of a ring buffer.
//!
//! `cpal` opens devices at their native sample rate, which is rarely the
//! wire rate (16 kHz mono). `RateConverter` bridges that gap in both
//! directions before the buffer reaches the channel (mic) or the cpal output
//! buffer (speaker).
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `MicCapture`/`SpeakerPlayback` must be created and dropped on the
//! same OS thread.

pub mod resample;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use crossbeam_channel::{Receiver, Sender};

use crate::error::{RelayError, Result};
#[cfg(feature = "audio-cpal")]
use resample::RateConverter;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
#[cfg(feature = "audio-cpal")]
use tracing::{info, warn};

#[cfg(feature = "audio-cpal")]
const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "wave out",
    "what u hear",
    "what you hear",
    "loopback",
    "virtual output",
    "monitor of",
    "mixage stereo",
    "mezcla estereo",
    "mix stereo",
    "speakers (",
    "headphones (",
];

#[cfg(feature = "audio-cpal")]
const MIC_POSITIVE_KEYWORDS: &[&str] = &[
    "microphone",
    "mic",
    "array",
    "headset",
    "headphone mic",
    "input",
    "line in",
    "usb",
    "webcam",
    "yeti",
    "podcast",
];

/// Best-effort heuristic for loopback/system-output capture devices, which
/// `select_input_device` avoids unless explicitly named by
/// `preferred_device_name`.
#[cfg(feature = "audio-cpal")]
fn is_loopback_like_name(name: &str) -> bool {
    let lowered = name.trim().to_ascii_lowercase();
    LOOPBACK_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Scores a device name for likely speech-microphone intent. Higher is
/// better; loopback-flavored names are penalized.
#[cfg(feature = "audio-cpal")]
fn mic_preference_score(name: &str) -> i32 {
    let lowered = name.trim().to_ascii_lowercase();
    let mut score = 0;
    if !is_loopback_like_name(&lowered) {
        score += 8;
    } else {
        score -= 16;
    }
    if MIC_POSITIVE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        score += 6;
    }
    if lowered.contains("default") {
        score += 1;
    }
    score
}

/// Picks an input device by preferred name, falling back to the default
/// input device, falling back to the least loopback-like device.
#[cfg(feature = "audio-cpal")]
fn select_input_device(preferred_device_name: Option<&str>) -> Result<cpal::Device> {
    use cpal::traits::HostTrait;

    let host = cpal::default_host();
    let mut devices: Vec<(String, cpal::Device)> = host
        .input_devices()
        .map_err(|e| RelayError::AudioDevice(e.to_string()))?
        .enumerate()
        .map(|(idx, device)| {
            let name = device
                .name()
                .unwrap_or_else(|_| format!("Input Device {}", idx + 1));
            (name, device)
        })
        .collect();
    if devices.is_empty() {
        return Err(RelayError::NoDefaultInputDevice);
    }

    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let preferred_idx = preferred_device_name
        .and_then(|preferred| devices.iter().position(|(name, _)| name.as_str() == preferred));
    let default_idx = default_name
        .as_deref()
        .and_then(|name| devices.iter().position(|(n, _)| n.as_str() == name));
    let best_non_loopback_idx = devices
        .iter()
        .enumerate()
        .filter(|(_, (name, _))| !is_loopback_like_name(name))
        .max_by_key(|(_, (name, _))| mic_preference_score(name))
        .map(|(idx, _)| idx);

    if preferred_device_name.is_some() && preferred_idx.is_none() {
        warn!(
            "preferred input device '{}' not found, falling back",
            preferred_device_name.unwrap_or_default()
        );
    }

    let selected_idx = preferred_idx
        .or(default_idx)
        .or(best_non_loopback_idx)
        .unwrap_or(0);

    let (selected_name, device) = devices.swap_remove(selected_idx);
    info!(device = selected_name.as_str(), "opening input device");
    Ok(device)
}

/// Handle to an active microphone capture stream. Each callback buffer is
/// resampled to `wire_rate` and pushed onto `out` as one `Vec<u8>` of
/// little-endian i16 PCM.
///
/// **Not `Send`** — create and drop on one OS thread.
pub struct MicCapture {
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    running: Arc<AtomicBool>,
}

impl MicCapture {
    #[cfg(feature = "audio-cpal")]
    pub fn open(
        preferred_device_name: Option<&str>,
        wire_rate: u32,
        out: Sender<Vec<u8>>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let device = select_input_device(preferred_device_name)?;
        let supported = device
            .default_input_config()
            .map_err(|e| RelayError::AudioDevice(e.to_string()))?;

        let capture_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(capture_rate, channels, wire_rate, "microphone config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(capture_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut converter = RateConverter::new(capture_rate, wire_rate, 960)?;
        let run_flag = Arc::clone(&running);
        let ch = channels as usize;

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _info| {
                    if !run_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    let mono = downmix_f32(data, ch);
                    emit(&mut converter, &mono, &out);
                },
                |err| warn!(kind = "mic", status = %err, "stream status"),
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _info| {
                    if !run_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    let mono = downmix_i16(data, ch);
                    emit(&mut converter, &mono, &out);
                },
                |err| warn!(kind = "mic", status = %err, "stream status"),
                None,
            ),
            SampleFormat::U8 => device.build_input_stream(
                &config,
                move |data: &[u8], _info| {
                    if !run_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    let mono = downmix_u8(data, ch);
                    emit(&mut converter, &mono, &out);
                },
                |err| warn!(kind = "mic", status = %err, "stream status"),
                None,
            ),
            fmt => {
                return Err(RelayError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| RelayError::AudioStream(e.to_string()))?;

        stream.play().map_err(|e| RelayError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
        })
    }

    #[cfg(not(feature = "audio-cpal"))]
    pub fn open(
        _preferred_device_name: Option<&str>,
        _wire_rate: u32,
        _out: Sender<Vec<u8>>,
        _running: Arc<AtomicBool>,
    ) -> Result<Self> {
        Err(RelayError::AudioStream("compiled without audio-cpal feature".into()))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Handle to an active speaker playback stream. Each callback pulls at most
/// one buffer off `input` (`try_recv`, never blocking the audio thread) and
/// zero-fills any remainder, mirroring `cb_recv`'s `Empty` fallback.
///
/// **Not `Send`** — create and drop on one OS thread.
pub struct SpeakerPlayback {
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    running: Arc<AtomicBool>,
}

impl SpeakerPlayback {
    #[cfg(feature = "audio-cpal")]
    pub fn open(
        wire_rate: u32,
        input: Receiver<Vec<u8>>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(RelayError::NoDefaultOutputDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| RelayError::AudioDevice(e.to_string()))?;

        let device_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(device_rate, channels, wire_rate, "speaker config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(device_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut converter = RateConverter::new(wire_rate, device_rate, 960)?;
        let mut leftover: Vec<f32> = Vec::new();
        let run_flag = Arc::clone(&running);
        let ch = channels as usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info| {
                    if !run_flag.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    fill_output(&mut converter, &mut leftover, &input, data, ch);
                },
                |err| warn!(kind = "speaker", status = %err, "stream status"),
                None,
            )
            .map_err(|e| RelayError::AudioStream(e.to_string()))?;

        stream.play().map_err(|e| RelayError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
        })
    }

    #[cfg(not(feature = "audio-cpal"))]
    pub fn open(
        _wire_rate: u32,
        _input: Receiver<Vec<u8>>,
        _running: Arc<AtomicBool>,
    ) -> Result<Self> {
        Err(RelayError::AudioStream("compiled without audio-cpal feature".into()))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(feature = "audio-cpal")]
fn downmix_f32(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    let frames = data.len() / channels;
    (0..frames)
        .map(|f| {
            let base = f * channels;
            data[base..base + channels].iter().sum::<f32>() / channels as f32
        })
        .collect()
}

#[cfg(feature = "audio-cpal")]
fn downmix_i16(data: &[i16], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.iter().map(|&s| s as f32 / 32768.0).collect();
    }
    let frames = data.len() / channels;
    (0..frames)
        .map(|f| {
            let base = f * channels;
            let sum: f32 = data[base..base + channels].iter().map(|&s| s as f32 / 32768.0).sum();
            sum / channels as f32
        })
        .collect()
}

#[cfg(feature = "audio-cpal")]
fn downmix_u8(data: &[u8], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.iter().map(|&s| (s as f32 - 128.0) / 128.0).collect();
    }
    let frames = data.len() / channels;
    (0..frames)
        .map(|f| {
            let base = f * channels;
            let sum: f32 = data[base..base + channels]
                .iter()
                .map(|&s| (s as f32 - 128.0) / 128.0)
                .sum();
            sum / channels as f32
        })
        .collect()
}

/// Resample one capture callback's mono samples to the wire rate, pack as
/// little-endian i16 PCM, and hand the whole buffer to the channel.
#[cfg(feature = "audio-cpal")]
fn emit(converter: &mut RateConverter, mono: &[f32], out: &Sender<Vec<u8>>) {
    let resampled = converter.process(mono);
    if resampled.is_empty() {
        return;
    }
    let mut bytes = Vec::with_capacity(resampled.len() * 2);
    for s in resampled {
        let clamped = s.clamp(-1.0, 1.0);
        bytes.extend_from_slice(&((clamped * 32768.0) as i16).to_le_bytes());
    }
    if out.try_send(bytes).is_err() {
        warn!("mic send queue closed or full, dropping buffer");
    }
}

/// Fill one playback callback's output buffer from at most one queued wire
/// buffer, resampled to the device rate, zero-filling any remainder.
#[cfg(feature = "audio-cpal")]
fn fill_output(
    converter: &mut RateConverter,
    leftover: &mut Vec<f32>,
    input: &Receiver<Vec<u8>>,
    data: &mut [f32],
    channels: usize,
) {
    if leftover.is_empty() {
        if let Ok(bytes) = input.try_recv() {
            let samples: Vec<f32> = bytes
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
                .collect();
            leftover.extend(converter.process(&samples));
        }
    }

    let frames = data.len() / channels;
    let take = frames.min(leftover.len());
    for (f, &sample) in leftover[..take].iter().enumerate() {
        for c in 0..channels {
            data[f * channels + c] = sample;
        }
    }
    for f in take..frames {
        for c in 0..channels {
            data[f * channels + c] = 0.0;
        }
    }
    leftover.drain(..take);
}

#[cfg(all(test, feature = "audio-cpal"))]
mod device_selection_tests {
    use super::{is_loopback_like_name, mic_preference_score};

    #[test]
    fn detects_common_loopback_names() {
        assert!(is_loopback_like_name("Stereo Mix (Realtek Audio)"));
        assert!(is_loopback_like_name("What U Hear (Sound Blaster)"));
        assert!(is_loopback_like_name("Speakers (High Definition Audio Device)"));
    }

    #[test]
    fn scores_mic_higher_than_loopback() {
        let mic = mic_preference_score("Microphone Array (USB PnP Audio Device)");
        let loopback = mic_preference_score("Stereo Mix (Realtek Audio)");
        assert!(mic > loopback);
    }
}
