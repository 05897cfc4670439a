use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::error::AudioError;
use super::output::SampleWriter;
use super::pcm::AudioBuffer;

/// One in-flight sound.
///
/// The playback thread writes the buffer period by period and checks the
/// running flag between periods. The playback stays active until the
/// output has played out its buffered tail. `on_end` fires only when the
/// buffer ran to completion (or the writer failed); an explicit `stop`,
/// even one arriving during the tail, never fires it.
pub struct PlaybackHandle {
    label: String,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackHandle {
    pub fn start<F>(
        label: String,
        mut writer: Box<dyn SampleWriter>,
        buffer: AudioBuffer,
        period_size: usize,
        on_end: F,
    ) -> Result<Self, AudioError>
    where
        F: FnOnce() + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let period_size = period_size.max(1);

        let thread = {
            let running = running.clone();
            let label = label.clone();
            thread::Builder::new()
                .name(format!("audio-play-{}", label))
                .spawn(move || {
                    if buffer.is_empty() {
                        log::warn!("{}: empty buffer", label);
                    }
                    log::debug!(
                        "{}: playing {} samples at {} Hz ({:.2}s)",
                        label,
                        buffer.len(),
                        buffer.sample_rate(),
                        buffer.duration().as_secs_f32()
                    );
                    for chunk in buffer.samples().chunks(period_size) {
                        if !running.load(Ordering::Relaxed) {
                            log::debug!("{}: stopped", label);
                            return;
                        }
                        if let Err(e) = writer.write(chunk) {
                            log::error!("{}: audio write error: {:#}", label, e);
                            break;
                        }
                    }
                    if let Err(e) = writer.finish(&running) {
                        log::warn!("{}: failed to drain output: {:#}", label, e);
                    }
                    // swap so a stop racing with the tail cannot double-report
                    if running.swap(false, Ordering::SeqCst) {
                        log::debug!("{}: finished", label);
                        on_end();
                    } else {
                        log::debug!("{}: stopped while draining", label);
                    }
                })
                .map_err(AudioError::playback_start)?
        };

        Ok(Self {
            label,
            running,
            thread: Some(thread),
        })
    }

    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the thread to stop after its current period, or to discard
    /// the output's buffered tail if it is already draining. Never blocks;
    /// stopping an already finished playback is a no-op.
    pub fn stop(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            log::debug!("{}: stop requested", self.label);
        }
        // Detach: the thread exits on its own at the next period boundary.
        self.thread.take();
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
