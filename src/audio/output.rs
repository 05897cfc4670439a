//! Output backends.
//!
//! An [`AudioOutput`] is the long-lived output context of one player
//! surface. Every playback opens a fresh [`SampleWriter`] from it.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;

/// Sink for one playback. Receives mono f32 chunks in order.
pub trait SampleWriter: Send {
    /// Write one chunk, blocking until the backend has accepted it.
    fn write(&mut self, samples: &[f32]) -> Result<()>;

    /// Called once after the final chunk, while the playback still counts as
    /// active. Backends that keep playing buffered audio wait here, and must
    /// give up and discard it as soon as `running` is cleared.
    fn finish(&mut self, _running: &AtomicBool) -> Result<()> {
        Ok(())
    }
}

pub trait AudioOutput: Send + Sync {
    fn name(&self) -> &str;

    /// Samples handed to [`SampleWriter::write`] per call.
    fn period_size(&self) -> usize;

    /// Open a fresh writer. `label` identifies the playback in logs and file names.
    fn open(&self, label: &str) -> Result<Box<dyn SampleWriter>>;
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// "alsa", "wav" or "null"
    pub backend: String,
    pub device: String,
    pub sample_rate: u32,
    pub period_size: usize,
    pub wav_dir: PathBuf,
    /// Recordings kept in `wav_dir`; older ones are deleted
    pub wav_keep: usize,
    /// Sleep for the duration of each chunk so file and null backends play in real time
    pub pace: bool,
}

impl OutputConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            backend: config.audio_backend.to_string(),
            device: config.audio_device.to_string(),
            sample_rate: config.audio_sample_rate,
            period_size: config.audio_period_size.max(1),
            wav_dir: PathBuf::from(config.audio_wav_dir),
            wav_keep: config.audio_wav_keep.max(1),
            pace: config.audio_pace,
        }
    }
}

/// Factory: build the backend named in the configuration.
pub fn create_output(config: &OutputConfig) -> Result<Arc<dyn AudioOutput>> {
    match config.backend.as_str() {
        #[cfg(feature = "alsa")]
        "alsa" => Ok(Arc::new(super::alsa_device::AlsaOutput::new(config))),
        #[cfg(not(feature = "alsa"))]
        "alsa" => anyhow::bail!(
            "ALSA backend requested for device '{}' but this build lacks the `alsa` feature",
            config.device
        ),
        "wav" => Ok(Arc::new(WavOutput::new(config)?)),
        "null" => Ok(Arc::new(NullOutput {
            sample_rate: config.sample_rate,
            period_size: config.period_size,
            pace: config.pace,
        })),
        other => anyhow::bail!("Unsupported audio backend: {}", other),
    }
}

fn pace_chunk(samples: usize, sample_rate: u32) {
    if sample_rate > 0 {
        thread::sleep(Duration::from_secs_f64(samples as f64 / sample_rate as f64));
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).clamp(-32768.0, 32767.0) as i16
}

// ======================== WAV file backend ========================

/// Writes each playback to `<dir>/<label>.wav`, keeping only the newest `keep` files.
pub struct WavOutput {
    dir: PathBuf,
    keep: usize,
    sample_rate: u32,
    period_size: usize,
    pace: bool,
}

impl WavOutput {
    pub fn new(config: &OutputConfig) -> Result<Self> {
        fs::create_dir_all(&config.wav_dir)
            .with_context(|| format!("Failed to create {}", config.wav_dir.display()))?;
        log::info!("WAV output: dir={}, rate={}", config.wav_dir.display(), config.sample_rate);
        Ok(Self {
            dir: config.wav_dir.clone(),
            keep: config.wav_keep.max(1),
            sample_rate: config.sample_rate,
            period_size: config.period_size,
            pace: config.pace,
        })
    }
}

impl AudioOutput for WavOutput {
    fn name(&self) -> &str {
        "wav"
    }

    fn period_size(&self) -> usize {
        self.period_size
    }

    fn open(&self, label: &str) -> Result<Box<dyn SampleWriter>> {
        // room for the file about to be created
        prune_recordings(&self.dir, self.keep - 1);
        let path = self.dir.join(format!("{}.wav", label));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Box::new(WavSink {
            writer: Some(writer),
            sample_rate: self.sample_rate,
            pace: self.pace,
        }))
    }
}

/// Delete the oldest `.wav` files in `dir` until at most `keep` remain.
fn prune_recordings(dir: &Path, keep: usize) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot list {}: {}", dir.display(), e);
            return;
        }
    };
    let mut recordings: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "wav"))
        .filter_map(|path| {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .collect();
    if recordings.len() <= keep {
        return;
    }
    recordings.sort();
    let excess = recordings.len() - keep;
    for (_, path) in recordings.into_iter().take(excess) {
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("Removed old recording {}", path.display()),
            Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    sample_rate: u32,
    pace: bool,
}

impl SampleWriter for WavSink {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .context("WAV writer already finalized")?;
        for &s in samples {
            writer.write_sample(to_i16(s))?;
        }
        if self.pace {
            pace_chunk(samples.len(), self.sample_rate);
        }
        Ok(())
    }

    fn finish(&mut self, _running: &AtomicBool) -> Result<()> {
        self.finalize()
    }
}

impl WavSink {
    fn finalize(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

impl Drop for WavSink {
    // A stopped playback still leaves a readable file.
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            log::warn!("Failed to finalize WAV file: {}", e);
        }
    }
}

// ======================== Null backend ========================

pub struct NullOutput {
    sample_rate: u32,
    period_size: usize,
    pace: bool,
}

impl AudioOutput for NullOutput {
    fn name(&self) -> &str {
        "null"
    }

    fn period_size(&self) -> usize {
        self.period_size
    }

    fn open(&self, _label: &str) -> Result<Box<dyn SampleWriter>> {
        Ok(Box::new(NullSink {
            sample_rate: self.sample_rate,
            pace: self.pace,
        }))
    }
}

struct NullSink {
    sample_rate: u32,
    pace: bool,
}

impl SampleWriter for NullSink {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        if self.pace {
            pace_chunk(samples.len(), self.sample_rate);
        }
        Ok(())
    }
}
