//! audio - Speech payload decoding and slot-based playback
//!
//! Synthesized speech arrives as base64 encoded 16-bit little-endian mono
//! PCM at 24 kHz. It is converted to an f32 buffer and written to an output
//! backend from a dedicated OS thread, one thread per playback, so blocking
//! device writes never stall the async event loop.

#[cfg(feature = "alsa")]
mod alsa_device;
mod error;
pub mod output;
pub mod pcm;
pub mod playback;
pub mod slots;

pub use error::AudioError;
pub use output::{create_output, AudioOutput, OutputConfig};
pub use pcm::{decode_pcm, AudioBuffer};
pub use slots::{Completion, Finished, Request, SlotPlayer, SlotStatus, Ticket};
