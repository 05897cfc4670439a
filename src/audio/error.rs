use thiserror::Error;

/// Failures on the way from a speech payload to audible output.
///
/// None of these are fatal: the owning player drops back to idle.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("invalid base64 audio payload: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("PCM payload has odd length {0}, expected whole 16-bit samples")]
    OddLength(usize),
    #[error("speech service returned no audio")]
    SynthesisUnavailable,
    #[error("failed to start playback: {0}")]
    PlaybackStart(String),
}

impl AudioError {
    pub fn playback_start(err: impl std::fmt::Display) -> Self {
        AudioError::PlaybackStart(err.to_string())
    }
}
