//! 16-bit PCM speech payloads to normalized f32 buffers.

use std::time::Duration;

use base64::{engine::general_purpose, Engine};

use super::error::AudioError;

/// Rate of every payload produced by the speech service.
pub const SAMPLE_RATE: u32 = 24000;

/// Mono f32 samples in [-1.0, 1.0) at a fixed rate.
///
/// Built once per playback request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Standard-alphabet base64 to raw bytes.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, AudioError> {
    Ok(general_purpose::STANDARD.decode(payload.trim())?)
}

/// Reinterprets `bytes` as little-endian i16 samples and scales them by 1/32768.
///
/// A trailing odd byte cannot form a sample and is rejected rather than dropped.
pub fn build_audio_buffer(bytes: &[u8], sample_rate: u32) -> Result<AudioBuffer, AudioError> {
    if bytes.len() % 2 != 0 {
        return Err(AudioError::OddLength(bytes.len()));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(AudioBuffer {
        samples,
        sample_rate,
    })
}

/// Full path from a speech service payload to a playable buffer.
pub fn decode_pcm(payload: &str) -> Result<AudioBuffer, AudioError> {
    let bytes = decode_base64(payload)?;
    build_audio_buffer(&bytes, SAMPLE_RATE)
}
