//! ALSA playback backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

use super::output::{AudioOutput, OutputConfig, SampleWriter};

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
pub struct AlsaParams {
    /// Actual sample rate after negotiation
    pub sample_rate: u32,
    /// Actual number of channels
    pub channels: u32,
    /// Period size in frames
    pub period_size: usize,
}

/// Open a PCM device for playback.
pub fn open_playback(
    device: &str,
    sample_rate: u32,
    channels: u32,
    period_size: Option<usize>,
) -> Result<(PCM, AlsaParams)> {
    let pcm = PCM::new(device, Direction::Playback, false)
        .with_context(|| format!("Failed to open PCM device '{}' for Playback", device))?;

    {
        let hwp = HwParams::any(&pcm).with_context(|| "Failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(channels)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        if let Some(ps) = period_size {
            hwp.set_period_size_near(ps as alsa::pcm::Frames, ValueOr::Nearest)?;
        }
        pcm.hw_params(&hwp)?;
    }

    // Read back actual negotiated parameters
    let (actual_rate, actual_channels, period_size) = {
        let hwp = pcm.hw_params_current()?;
        let rate = hwp.get_rate()?;
        let ch = hwp.get_channels()?;
        let ps = hwp.get_period_size()? as usize;
        (rate, ch, ps)
    };

    log::info!(
        "ALSA Playback: device={}, rate={}, channels={}, period_size={}",
        device,
        actual_rate,
        actual_channels,
        period_size,
    );

    Ok((
        pcm,
        AlsaParams {
            sample_rate: actual_rate,
            channels: actual_channels,
            period_size,
        },
    ))
}

/// Output context for one player surface. The device itself is opened per playback.
pub struct AlsaOutput {
    device: String,
    sample_rate: u32,
    period_size: usize,
}

impl AlsaOutput {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            device: config.device.clone(),
            sample_rate: config.sample_rate,
            period_size: config.period_size,
        }
    }
}

impl AudioOutput for AlsaOutput {
    fn name(&self) -> &str {
        "alsa"
    }

    fn period_size(&self) -> usize {
        self.period_size
    }

    fn open(&self, label: &str) -> Result<Box<dyn SampleWriter>> {
        let (pcm, params) =
            open_playback(&self.device, self.sample_rate, 1, Some(self.period_size))?;
        if params.sample_rate != self.sample_rate {
            // No resampler in the path, a mismatch only shifts pitch.
            log::warn!(
                "{}: device negotiated {} Hz instead of {} Hz",
                label,
                params.sample_rate,
                self.sample_rate
            );
        }
        Ok(Box::new(AlsaSink {
            pcm,
            channels: params.channels.max(1) as usize,
            interleaved: Vec::new(),
        }))
    }
}

struct AlsaSink {
    pcm: PCM,
    channels: usize,
    interleaved: Vec<i16>,
}

impl SampleWriter for AlsaSink {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        // Mono source duplicated across every negotiated channel.
        self.interleaved.clear();
        for &s in samples {
            let v = (s * 32768.0).clamp(-32768.0, 32767.0) as i16;
            self.interleaved
                .extend(std::iter::repeat(v).take(self.channels));
        }

        let io = self.pcm.io_i16()?;
        let total_frames = samples.len();
        let mut frames_written = 0;
        let mut retry_count = 0u32;

        while frames_written < total_frames {
            let offset = frames_written * self.channels;
            match io.writei(&self.interleaved[offset..]) {
                Ok(n) => {
                    frames_written += n;
                    retry_count = 0;
                }
                Err(e) => {
                    log::warn!("ALSA XRUN or error: {}, recovering...", e);
                    retry_count += 1;
                    self.pcm
                        .prepare()
                        .context("Failed to recover PCM playback")?;
                    if retry_count >= 3 {
                        anyhow::bail!(
                            "Max recovery retries reached, {} frames unwritten",
                            total_frames - frames_written
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self, running: &AtomicBool) -> Result<()> {
        // Poll instead of a blocking drain so a stop can cut the tail short.
        while running.load(Ordering::SeqCst) {
            match self.pcm.delay() {
                Ok(frames) if frames > 0 => thread::sleep(Duration::from_millis(10)),
                _ => break,
            }
        }
        if running.load(Ordering::SeqCst) {
            self.pcm.drain()?;
        } else {
            self.pcm.drop()?;
        }
        Ok(())
    }
}
