use crate::audio::slots::OutputFactory;
use crate::audio::{
    decode_pcm, AudioBuffer, AudioError, Completion, Finished, Request, SlotPlayer, SlotStatus,
    Ticket,
};
use crate::content::{meditation_entries, MEDITATIONS};
use crate::gemini::{Devotional, DevotionalSource, GenerationError, SpeechSynthesizer};
use crate::poster::{PosterCompositor, PosterError, PosterSpec};
use crate::protocol::{Notification, UiCommand};
use crate::ui_bridge::Notifier;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The verse player has a single slot.
const VERSE_SLOT: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Verse,
    Meditation,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Verse => "verse",
            Surface::Meditation => "meditation",
        }
    }
}

/// Results of work the controller spawned.
pub enum AppEvent {
    AudioReady {
        surface: Surface,
        ticket: Ticket<usize>,
        result: Result<AudioBuffer, AudioError>,
    },
    DevotionalLoaded {
        request: u64,
        result: Result<Devotional, GenerationError>,
    },
    PosterExported {
        id: String,
        result: Result<PathBuf, PosterError>,
    },
}

pub struct Services {
    pub devotionals: Arc<dyn DevotionalSource>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    /// `None` when the poster fonts could not be loaded
    pub posters: Option<Arc<PosterCompositor>>,
    pub catalogue: Vec<PosterSpec>,
    pub poster_dir: PathBuf,
}

/// Receivers the main loop selects on.
pub struct ControllerEvents {
    pub app: mpsc::Receiver<AppEvent>,
    pub verse_finished: mpsc::Receiver<Finished<usize>>,
    pub meditation_finished: mpsc::Receiver<Finished<usize>>,
}

pub struct CoreController {
    verse_player: SlotPlayer<usize>,
    meditation_player: SlotPlayer<usize>,
    devotional: Option<Devotional>,
    devotional_request: u64,
    exporting: HashSet<String>,
    services: Services,
    notifier: Arc<dyn Notifier>,
    events_tx: mpsc::Sender<AppEvent>,
}

impl CoreController {
    pub fn new(
        services: Services,
        notifier: Arc<dyn Notifier>,
        verse_output: OutputFactory,
        meditation_output: OutputFactory,
    ) -> (Self, ControllerEvents) {
        let (events_tx, app) = mpsc::channel(32);
        let (verse_tx, verse_finished) = mpsc::channel(8);
        let (meditation_tx, meditation_finished) = mpsc::channel(8);

        let controller = Self {
            verse_player: SlotPlayer::new(Surface::Verse.as_str(), verse_output, verse_tx),
            meditation_player: SlotPlayer::new(
                Surface::Meditation.as_str(),
                meditation_output,
                meditation_tx,
            ),
            devotional: None,
            devotional_request: 0,
            exporting: HashSet::new(),
            services,
            notifier,
            events_tx,
        };
        let events = ControllerEvents {
            app,
            verse_finished,
            meditation_finished,
        };
        (controller, events)
    }

    fn player(&self, surface: Surface) -> &SlotPlayer<usize> {
        match surface {
            Surface::Verse => &self.verse_player,
            Surface::Meditation => &self.meditation_player,
        }
    }

    fn player_mut(&mut self, surface: Surface) -> &mut SlotPlayer<usize> {
        match surface {
            Surface::Verse => &mut self.verse_player,
            Surface::Meditation => &mut self.meditation_player,
        }
    }

    pub async fn handle_ui_command(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::Devotional { topic } => self.fetch_devotional(topic),
            UiCommand::PlayVerse => {
                let Some(verse) = self.devotional.as_ref().map(|d| d.verse.clone()) else {
                    log::warn!("No devotional loaded yet, ignoring verse playback");
                    return;
                };
                self.play(Surface::Verse, VERSE_SLOT, verse).await;
            }
            UiCommand::PlayMeditation { index } => match MEDITATIONS.get(index) {
                Some(meditation) => {
                    self.play(Surface::Meditation, index, meditation.text.to_string())
                        .await
                }
                None => log::warn!("No meditation at index {}", index),
            },
            UiCommand::Poster { id } => self.export_poster(id).await,
            UiCommand::Stop => self.stop_all().await,
            UiCommand::Catalogue => self.announce_catalogue().await,
        }
    }

    /// Request a new devotional. Only the latest request is shown.
    pub fn fetch_devotional(&mut self, topic: Option<String>) {
        self.devotional_request += 1;
        let request = self.devotional_request;
        let source = self.services.devotionals.clone();
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let result = source.daily_devotional(topic.as_deref()).await;
            if tx
                .send(AppEvent::DevotionalLoaded { request, result })
                .await
                .is_err()
            {
                log::debug!("Controller gone, dropping devotional {}", request);
            }
        });
    }

    async fn play(&mut self, surface: Surface, slot: usize, text: String) {
        let previous = self.player(surface).active_slot().copied();

        match self.player_mut(surface).request(slot) {
            Request::Busy => log::debug!("{} slot {} is still loading", surface.as_str(), slot),
            Request::Stopped(slot) => {
                self.publish_audio(surface, Some(slot), SlotStatus::Idle).await
            }
            Request::Load(ticket) => {
                if let Some(previous) = previous.filter(|p| *p != slot) {
                    self.publish_audio(surface, Some(previous), SlotStatus::Idle).await;
                }
                self.publish_audio(surface, Some(slot), SlotStatus::Loading).await;

                let speech = self.services.speech.clone();
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = match speech.synthesize(&text).await {
                        Ok(Some(payload)) => decode_pcm(&payload),
                        Ok(None) => Err(AudioError::SynthesisUnavailable),
                        Err(e) => {
                            log::warn!("Narration request failed: {}", e);
                            Err(AudioError::SynthesisUnavailable)
                        }
                    };
                    let event = AppEvent::AudioReady {
                        surface,
                        ticket,
                        result,
                    };
                    if tx.send(event).await.is_err() {
                        log::debug!("Controller gone, dropping narration");
                    }
                });
            }
        }
    }

    pub async fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::AudioReady {
                surface,
                ticket,
                result,
            } => {
                let slot = ticket.slot;
                match self.player_mut(surface).complete(ticket, result) {
                    Completion::Started => {
                        self.publish_audio(surface, Some(slot), SlotStatus::Playing).await
                    }
                    Completion::Stale => {}
                    Completion::Failed(e) => {
                        log::warn!("{} slot {} not played: {}", surface.as_str(), slot, e);
                        self.publish_audio(surface, Some(slot), SlotStatus::Idle).await;
                    }
                }
            }
            AppEvent::DevotionalLoaded { request, result } => {
                if request != self.devotional_request {
                    log::debug!("Discarding devotional from superseded request {}", request);
                    return;
                }
                match result {
                    Ok(devotional) => {
                        log::info!("Devotional loaded: {} ({})", devotional.title, devotional.reference);
                        // narration of the old verse
                        if let Some(slot) = self.verse_player.stop_all() {
                            self.publish_audio(Surface::Verse, Some(slot), SlotStatus::Idle).await;
                        }
                        self.devotional = Some(devotional.clone());
                        self.notifier.notify(Notification::Devotional(devotional)).await;
                    }
                    Err(e) => {
                        log::error!("Failed to load devotional: {}", e);
                        self.notifier
                            .notify(Notification::Error {
                                kind: e.kind(),
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }
            AppEvent::PosterExported { id, result } => {
                self.exporting.remove(&id);
                match result {
                    Ok(path) => {
                        self.publish_poster(id, "done", Some(path.display().to_string()))
                            .await
                    }
                    Err(e) => {
                        log::error!("Poster {} failed: {}", id, e);
                        self.publish_poster(id, "failed", None).await;
                    }
                }
            }
        }
    }

    /// A playback on `surface` reached the end of its buffer.
    pub async fn handle_finished(&mut self, surface: Surface, event: Finished<usize>) {
        if self.player_mut(surface).finished(&event) {
            self.publish_audio(surface, Some(event.slot), SlotStatus::Idle).await;
        }
    }

    pub async fn stop_all(&mut self) {
        for surface in [Surface::Verse, Surface::Meditation] {
            if let Some(slot) = self.player_mut(surface).stop_all() {
                self.publish_audio(surface, Some(slot), SlotStatus::Idle).await;
            }
        }
    }

    async fn export_poster(&mut self, id: String) {
        let spec = self.services.catalogue.iter().find(|p| p.id == id).cloned();
        let (Some(compositor), Some(spec)) = (self.services.posters.clone(), spec) else {
            log::warn!("Poster {} unavailable", id);
            self.publish_poster(id, "failed", None).await;
            return;
        };
        if !self.exporting.insert(id.clone()) {
            log::debug!("Poster {} is already being exported", id);
            return;
        }
        self.publish_poster(id.clone(), "exporting", None).await;

        let dir = self.services.poster_dir.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = compositor.export(&spec, &dir).await;
            if tx
                .send(AppEvent::PosterExported { id, result })
                .await
                .is_err()
            {
                log::debug!("Controller gone, dropping poster result");
            }
        });
    }

    pub async fn announce_catalogue(&self) {
        self.notifier
            .notify(Notification::Catalogue {
                meditations: meditation_entries(),
                posters: self.services.catalogue.clone(),
            })
            .await;
    }

    async fn publish_audio(&self, surface: Surface, slot: Option<usize>, status: SlotStatus) {
        self.notifier
            .notify(Notification::Audio {
                surface: surface.as_str(),
                slot,
                state: status.as_str(),
            })
            .await;
    }

    async fn publish_poster(&self, id: String, state: &'static str, path: Option<String>) {
        self.notifier
            .notify(Notification::Poster { id, state, path })
            .await;
    }
}
