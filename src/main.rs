mod audio;
mod config;
mod content;
mod controller;
mod gemini;
mod poster;
mod protocol;
mod ui_bridge;

use audio::slots::OutputFactory;
use audio::{create_output, AudioOutput, OutputConfig};
use config::Config;
use controller::{CoreController, Services, Surface};
use gemini::GeminiClient;
use poster::{default_posters, PosterCompositor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use ui_bridge::{UiBridge, UiEvent};

/// Each player surface gets its own output context, created on first use.
fn output_factory(config: OutputConfig) -> OutputFactory {
    Box::new(move || -> anyhow::Result<Arc<dyn AudioOutput>> { create_output(&config) })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    let config = Config::new().map_err(anyhow::Error::msg)?;
    log::info!("{} {} starting", config.app_name, config.app_version);

    if Config::api_key().is_none() {
        log::warn!("API_KEY is not set, devotional and narration requests will fail until it is");
    }

    // UI进程通道
    let (tx_ui_event, mut rx_ui_event) = mpsc::channel::<UiEvent>(100);

    let ui_bridge = Arc::new(UiBridge::new(&config, tx_ui_event).await?);
    let ui_bridge_clone = ui_bridge.clone();
    tokio::spawn(async move {
        if let Err(e) = ui_bridge_clone.run().await {
            log::error!("UiBridge error: {}", e);
        }
    });

    let gemini = Arc::new(GeminiClient::new(&config)?);

    let posters = match PosterCompositor::from_config(&config) {
        Ok(compositor) => Some(Arc::new(compositor)),
        Err(e) => {
            log::error!("Poster export disabled: {}", e);
            None
        }
    };

    let services = Services {
        devotionals: gemini.clone(),
        speech: gemini,
        posters,
        catalogue: default_posters(),
        poster_dir: PathBuf::from(config.poster_output_dir),
    };
    let output_config = OutputConfig::from_config(&config);
    log::info!(
        "Audio backend: {} ({} Hz, period {})",
        output_config.backend,
        output_config.sample_rate,
        output_config.period_size
    );
    let (mut controller, mut events) = CoreController::new(
        services,
        ui_bridge.clone(),
        output_factory(output_config.clone()),
        output_factory(output_config),
    );

    controller.announce_catalogue().await;
    controller.fetch_devotional(None);

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down...");
                break;
            }

            Some(event) = rx_ui_event.recv() => {
                match event {
                    UiEvent::Command(cmd) => controller.handle_ui_command(cmd).await,
                }
            }

            Some(event) = events.app.recv() => {
                controller.handle_app_event(event).await;
            }

            Some(event) = events.verse_finished.recv() => {
                controller.handle_finished(Surface::Verse, event).await;
            }

            Some(event) = events.meditation_finished.recv() => {
                controller.handle_finished(Surface::Meditation, event).await;
            }
        }
    }

    controller.stop_all().await;
    Ok(())
}
