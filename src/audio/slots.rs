//! Toggle/preemption protocol for a player surface.
//!
//! A surface (the devotional verse player, the meditation list) owns one
//! `SlotPlayer`. Each playable unit on it is a slot. At most one slot is
//! active at a time, either loading (payload being fetched and decoded) or
//! playing. Every load carries a monotonic token; a fetch that resolves
//! after its slot moved on is recognised by the token and discarded.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::error::AudioError;
use super::output::AudioOutput;
use super::pcm::AudioBuffer;
use super::playback::PlaybackHandle;

pub type OutputFactory = Box<dyn Fn() -> anyhow::Result<Arc<dyn AudioOutput>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Idle,
    Loading,
    Playing,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Idle => "idle",
            SlotStatus::Loading => "loading",
            SlotStatus::Playing => "playing",
        }
    }
}

/// Identity of one load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<K> {
    pub slot: K,
    pub token: u64,
}

/// Outcome of a play request.
#[derive(Debug, PartialEq, Eq)]
pub enum Request<K> {
    /// Fetch the payload, then hand it back through [`SlotPlayer::complete`].
    Load(Ticket<K>),
    /// The slot was playing and has been stopped.
    Stopped(K),
    /// The slot is already loading; the request is ignored.
    Busy,
}

/// Outcome of handing a decoded payload back.
#[derive(Debug)]
pub enum Completion {
    Started,
    /// The ticket is no longer current; nothing was played.
    Stale,
    /// The slot returned to idle.
    Failed(AudioError),
}

/// Natural end of a playback, sent from the playback thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished<K> {
    pub slot: K,
    pub token: u64,
}

enum Active {
    Loading { token: u64 },
    Playing { token: u64, handle: PlaybackHandle },
}

impl Active {
    fn token(&self) -> u64 {
        match self {
            Active::Loading { token } | Active::Playing { token, .. } => *token,
        }
    }
}

pub struct SlotPlayer<K> {
    name: &'static str,
    output_factory: OutputFactory,
    /// Created on the first successful load, kept for the life of the surface
    output: Option<Arc<dyn AudioOutput>>,
    active: Option<(K, Active)>,
    next_token: u64,
    finished_tx: mpsc::Sender<Finished<K>>,
}

impl<K> SlotPlayer<K>
where
    K: Clone + Eq + fmt::Display + Send + 'static,
{
    pub fn new(
        name: &'static str,
        output_factory: OutputFactory,
        finished_tx: mpsc::Sender<Finished<K>>,
    ) -> Self {
        Self {
            name,
            output_factory,
            output: None,
            active: None,
            next_token: 1,
            finished_tx,
        }
    }

    #[cfg(test)]
    pub fn status(&self, slot: &K) -> SlotStatus {
        match &self.active {
            Some((k, Active::Loading { .. })) if k == slot => SlotStatus::Loading,
            Some((k, Active::Playing { .. })) if k == slot => SlotStatus::Playing,
            _ => SlotStatus::Idle,
        }
    }

    pub fn active_slot(&self) -> Option<&K> {
        self.active.as_ref().map(|(k, _)| k)
    }

    /// User asked to play `slot`.
    ///
    /// A slot whose sound already ended counts as idle even before its
    /// [`Finished`] event has been handled, so the press starts it again.
    pub fn request(&mut self, slot: K) -> Request<K> {
        match self.active.take() {
            Some((k, Active::Playing { mut handle, .. })) if k == slot && handle.is_active() => {
                handle.stop();
                log::info!("{}: slot {} toggled off", self.name, slot);
                return Request::Stopped(slot);
            }
            Some((k, Active::Playing { .. })) if k == slot => {
                log::info!("{}: slot {} ended, playing again", self.name, slot);
            }
            Some((k, loading @ Active::Loading { .. })) if k == slot => {
                self.active = Some((k, loading));
                return Request::Busy;
            }
            Some((k, Active::Playing { mut handle, .. })) => {
                handle.stop();
                log::info!("{}: slot {} preempted by {}", self.name, k, slot);
            }
            Some((k, Active::Loading { token })) => {
                log::info!(
                    "{}: pending load {} for slot {} superseded by {}",
                    self.name,
                    token,
                    k,
                    slot
                );
            }
            None => {}
        }

        let token = self.next_token;
        self.next_token += 1;
        self.active = Some((slot.clone(), Active::Loading { token }));
        Request::Load(Ticket { slot, token })
    }

    fn is_current(&self, ticket: &Ticket<K>) -> bool {
        matches!(
            &self.active,
            Some((k, Active::Loading { token })) if *k == ticket.slot && *token == ticket.token
        )
    }

    /// The fetch for `ticket` resolved. Only the current ticket may start sound.
    pub fn complete(
        &mut self,
        ticket: Ticket<K>,
        result: Result<AudioBuffer, AudioError>,
    ) -> Completion {
        if !self.is_current(&ticket) {
            log::debug!(
                "{}: discarding stale result for slot {} (token {})",
                self.name,
                ticket.slot,
                ticket.token
            );
            return Completion::Stale;
        }

        let outcome = result.and_then(|buffer| self.start(&ticket, buffer));
        match outcome {
            Ok(handle) => {
                self.active = Some((
                    ticket.slot,
                    Active::Playing {
                        token: ticket.token,
                        handle,
                    },
                ));
                Completion::Started
            }
            Err(e) => {
                log::warn!("{}: slot {} back to idle: {}", self.name, ticket.slot, e);
                self.active = None;
                Completion::Failed(e)
            }
        }
    }

    fn output(&mut self) -> Result<Arc<dyn AudioOutput>, AudioError> {
        if let Some(output) = &self.output {
            return Ok(output.clone());
        }
        let output = (self.output_factory)()
            .map_err(|e| AudioError::playback_start(format!("{:#}", e)))?;
        log::info!("{}: created {} output context", self.name, output.name());
        self.output = Some(output.clone());
        Ok(output)
    }

    fn start(&mut self, ticket: &Ticket<K>, buffer: AudioBuffer) -> Result<PlaybackHandle, AudioError> {
        let output = self.output()?;
        let label = format!("{}-{}-{}", self.name, ticket.slot, ticket.token);
        let writer = output
            .open(&label)
            .map_err(|e| AudioError::playback_start(format!("{:#}", e)))?;

        let finished_tx = self.finished_tx.clone();
        let finished = Finished {
            slot: ticket.slot.clone(),
            token: ticket.token,
        };
        PlaybackHandle::start(label, writer, buffer, output.period_size(), move || {
            if finished_tx.blocking_send(finished).is_err() {
                log::debug!("playback finished after its player was dropped");
            }
        })
    }

    /// A playback ended by itself. Returns true if that cleared the active slot.
    pub fn finished(&mut self, event: &Finished<K>) -> bool {
        let current = matches!(
            &self.active,
            Some((k, Active::Playing { token, .. })) if *k == event.slot && *token == event.token
        );
        if current {
            self.active = None;
            log::info!("{}: slot {} finished", self.name, event.slot);
        }
        current
    }

    /// Stop whatever is active, loading included. Returns the slot that was active.
    pub fn stop_all(&mut self) -> Option<K> {
        let (slot, active) = self.active.take()?;
        match active {
            Active::Playing { mut handle, .. } => handle.stop(),
            pending => log::debug!("{}: dropping pending load {}", self.name, pending.token()),
        }
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use crate::audio::output::SampleWriter;
    use crate::audio::pcm::{build_audio_buffer, SAMPLE_RATE};

    struct TestOutput {
        delay: Duration,
        opened: Mutex<Vec<String>>,
        /// Samples received per playback label
        written: Arc<Mutex<HashMap<String, usize>>>,
    }

    impl TestOutput {
        fn written(&self, label: &str) -> usize {
            self.written.lock().unwrap().get(label).copied().unwrap_or(0)
        }
    }

    struct TestWriter {
        label: String,
        delay: Duration,
        written: Arc<Mutex<HashMap<String, usize>>>,
    }

    impl SampleWriter for TestWriter {
        fn write(&mut self, samples: &[f32]) -> anyhow::Result<()> {
            *self.written.lock().unwrap().entry(self.label.clone()).or_default() += samples.len();
            thread::sleep(self.delay);
            Ok(())
        }
    }

    impl AudioOutput for TestOutput {
        fn name(&self) -> &str {
            "test"
        }

        fn period_size(&self) -> usize {
            240
        }

        fn open(&self, label: &str) -> anyhow::Result<Box<dyn SampleWriter>> {
            self.opened.lock().unwrap().push(label.to_string());
            Ok(Box::new(TestWriter {
                label: label.to_string(),
                delay: self.delay,
                written: self.written.clone(),
            }))
        }
    }

    struct Harness {
        player: SlotPlayer<usize>,
        finished_rx: mpsc::Receiver<Finished<usize>>,
        output: Arc<TestOutput>,
        contexts_created: Arc<AtomicUsize>,
    }

    fn harness(delay: Duration) -> Harness {
        let output = Arc::new(TestOutput {
            delay,
            opened: Mutex::new(Vec::new()),
            written: Arc::new(Mutex::new(HashMap::new())),
        });
        let contexts_created = Arc::new(AtomicUsize::new(0));
        let factory: OutputFactory = {
            let output = output.clone();
            let contexts_created = contexts_created.clone();
            Box::new(move || -> anyhow::Result<Arc<dyn AudioOutput>> {
                contexts_created.fetch_add(1, Ordering::SeqCst);
                Ok(output.clone() as Arc<dyn AudioOutput>)
            })
        };
        let (tx, rx) = mpsc::channel(8);
        Harness {
            player: SlotPlayer::new("test", factory, tx),
            finished_rx: rx,
            output,
            contexts_created,
        }
    }

    fn seconds(secs: usize) -> AudioBuffer {
        build_audio_buffer(&vec![0u8; secs * SAMPLE_RATE as usize * 2], SAMPLE_RATE).unwrap()
    }

    fn short() -> AudioBuffer {
        build_audio_buffer(&[0u8; 480], SAMPLE_RATE).unwrap()
    }

    fn load(player: &mut SlotPlayer<usize>, slot: usize) -> Ticket<usize> {
        match player.request(slot) {
            Request::Load(ticket) => ticket,
            other => panic!("expected a load for slot {}, got {:?}", slot, other),
        }
    }

    #[test]
    fn toggling_a_playing_slot_stops_it() {
        let mut h = harness(Duration::from_millis(10));
        let ticket = load(&mut h.player, 0);
        assert_eq!(h.player.status(&0), SlotStatus::Loading);

        assert!(matches!(h.player.complete(ticket, Ok(seconds(1))), Completion::Started));
        assert_eq!(h.player.status(&0), SlotStatus::Playing);

        assert_eq!(h.player.request(0), Request::Stopped(0));
        assert_eq!(h.player.status(&0), SlotStatus::Idle);
        assert_eq!(h.player.active_slot(), None);
    }

    #[test]
    fn requesting_another_slot_preempts() {
        let mut h = harness(Duration::from_millis(10));
        let a = load(&mut h.player, 1);
        h.player.complete(a, Ok(seconds(1)));

        let b = load(&mut h.player, 2);
        assert_eq!(h.player.status(&1), SlotStatus::Idle);
        assert_eq!(h.player.status(&2), SlotStatus::Loading);

        assert!(matches!(h.player.complete(b, Ok(seconds(1))), Completion::Started));
        assert_eq!(h.player.status(&1), SlotStatus::Idle);
        assert_eq!(h.player.status(&2), SlotStatus::Playing);
    }

    #[test]
    fn preempted_slot_stops_receiving_samples() {
        let mut h = harness(Duration::from_millis(10));
        let a = load(&mut h.player, 1);
        h.player.complete(a, Ok(seconds(1)));
        thread::sleep(Duration::from_millis(60));
        let first = h.output.opened.lock().unwrap()[0].clone();
        assert!(h.output.written(&first) > 0);

        let b = load(&mut h.player, 2);
        h.player.complete(b, Ok(seconds(1)));
        // let the preempted thread notice the stop
        thread::sleep(Duration::from_millis(40));
        let frozen = h.output.written(&first);
        thread::sleep(Duration::from_millis(120));

        assert_eq!(h.output.written(&first), frozen);
        assert!(frozen < SAMPLE_RATE as usize);
        let second = h.output.opened.lock().unwrap()[1].clone();
        assert!(h.output.written(&second) > 0);
    }

    #[test]
    fn late_result_for_superseded_request_is_discarded() {
        let mut h = harness(Duration::from_millis(10));
        let first = load(&mut h.player, 1);
        let second = load(&mut h.player, 2);

        assert!(matches!(h.player.complete(first, Ok(seconds(1))), Completion::Stale));
        assert_eq!(h.player.status(&1), SlotStatus::Idle);
        assert_eq!(h.player.status(&2), SlotStatus::Loading);
        assert!(h.output.opened.lock().unwrap().is_empty());

        assert!(matches!(h.player.complete(second, Ok(short())), Completion::Started));
    }

    #[test]
    fn same_slot_rerequested_later_gets_a_new_identity() {
        let mut h = harness(Duration::from_millis(10));
        let old = load(&mut h.player, 1);
        let _other = load(&mut h.player, 2);
        let fresh = load(&mut h.player, 1);
        assert_ne!(old.token, fresh.token);

        // The old fetch resolves while slot 1 is loading again: still stale.
        assert!(matches!(h.player.complete(old, Ok(seconds(1))), Completion::Stale));
        assert_eq!(h.player.status(&1), SlotStatus::Loading);
        assert!(matches!(h.player.complete(fresh, Ok(seconds(1))), Completion::Started));
    }

    #[test]
    fn request_while_loading_is_ignored() {
        let mut h = harness(Duration::ZERO);
        let _ticket = load(&mut h.player, 3);
        assert_eq!(h.player.request(3), Request::Busy);
        assert_eq!(h.player.status(&3), SlotStatus::Loading);
    }

    #[test]
    fn failed_payload_returns_slot_to_idle() {
        let mut h = harness(Duration::ZERO);
        let ticket = load(&mut h.player, 0);
        let outcome = h.player.complete(ticket, Err(AudioError::SynthesisUnavailable));
        assert!(matches!(outcome, Completion::Failed(AudioError::SynthesisUnavailable)));
        assert_eq!(h.player.status(&0), SlotStatus::Idle);
    }

    #[test]
    fn unavailable_output_is_a_playback_start_error() {
        let (tx, _rx) = mpsc::channel(1);
        let factory: OutputFactory = Box::new(|| -> anyhow::Result<Arc<dyn AudioOutput>> {
            anyhow::bail!("no sound card")
        });
        let mut player: SlotPlayer<usize> = SlotPlayer::new("broken", factory, tx);

        let ticket = load(&mut player, 0);
        match player.complete(ticket, Ok(short())) {
            Completion::Failed(AudioError::PlaybackStart(msg)) => assert!(msg.contains("no sound card")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(player.status(&0), SlotStatus::Idle);
    }

    #[tokio::test]
    async fn natural_end_clears_the_slot() {
        let mut h = harness(Duration::ZERO);
        let ticket = load(&mut h.player, 4);
        h.player.complete(ticket.clone(), Ok(short()));

        let event = tokio::time::timeout(Duration::from_secs(5), h.finished_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, Finished { slot: 4, token: ticket.token });
        assert!(h.player.finished(&event));
        assert_eq!(h.player.status(&4), SlotStatus::Idle);
    }

    #[tokio::test]
    async fn end_of_an_older_playback_does_not_clear_a_newer_one() {
        let mut h = harness(Duration::ZERO);
        let first = load(&mut h.player, 0);
        h.player.complete(first, Ok(short()));
        let event = tokio::time::timeout(Duration::from_secs(5), h.finished_rx.recv())
            .await
            .unwrap()
            .unwrap();

        // Restart before the completion is processed.
        h.player.active = None;
        let second = load(&mut h.player, 0);
        assert!(matches!(h.player.complete(second, Ok(seconds(1))), Completion::Started));

        assert!(!h.player.finished(&event));
        assert_eq!(h.player.status(&0), SlotStatus::Playing);
    }

    #[tokio::test]
    async fn press_after_natural_end_replays_before_the_end_is_handled() {
        let mut h = harness(Duration::ZERO);
        let first = load(&mut h.player, 0);
        h.player.complete(first.clone(), Ok(short()));
        let event = tokio::time::timeout(Duration::from_secs(5), h.finished_rx.recv())
            .await
            .unwrap()
            .unwrap();

        // the end event is still queued when the user presses again
        let again = load(&mut h.player, 0);
        assert_ne!(again.token, first.token);
        assert!(matches!(h.player.complete(again, Ok(seconds(1))), Completion::Started));

        assert!(!h.player.finished(&event));
        assert_eq!(h.player.status(&0), SlotStatus::Playing);
    }

    #[test]
    fn output_context_is_created_once_per_surface() {
        let mut h = harness(Duration::ZERO);
        for slot in 0..3 {
            let ticket = load(&mut h.player, slot);
            h.player.complete(ticket, Ok(short()));
        }
        assert_eq!(h.contexts_created.load(Ordering::SeqCst), 1);
        assert_eq!(h.output.opened.lock().unwrap().len(), 3);
    }

    #[test]
    fn stop_all_clears_loading_and_playing() {
        let mut h = harness(Duration::from_millis(10));
        let ticket = load(&mut h.player, 5);
        assert_eq!(h.player.stop_all(), Some(5));
        assert!(matches!(h.player.complete(ticket, Ok(short())), Completion::Stale));

        let ticket = load(&mut h.player, 6);
        h.player.complete(ticket, Ok(seconds(1)));
        assert_eq!(h.player.stop_all(), Some(6));
        assert_eq!(h.player.stop_all(), None);
    }
}
