use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    ui: Ui,
    gemini: Gemini,
    audio: Audio,
    poster: Poster,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Ui {
    local_port: u16,
    remote_port: u16,
    local_ip: String,
    remote_ip: String,
    buffer_size: usize,
}

#[derive(Deserialize)]
struct Gemini {
    base_url: String,
    text_model: String,
    tts_model: String,
    voice: String,
}

#[derive(Deserialize)]
struct Audio {
    backend: String,
    device: String,
    sample_rate: u32,
    period_size: usize,
    wav_dir: String,
    wav_keep: usize,
    pace: bool,
}

#[derive(Deserialize)]
struct Poster {
    serif_font: String,
    sans_font: String,
    output_dir: String,
    accent: String,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // UI process bridge
    println!("cargo:rustc-env=UI_LOCAL_PORT={}", config.ui.local_port);
    println!("cargo:rustc-env=UI_REMOTE_PORT={}", config.ui.remote_port);
    println!("cargo:rustc-env=UI_LOCAL_IP={}", config.ui.local_ip);
    println!("cargo:rustc-env=UI_REMOTE_IP={}", config.ui.remote_ip);
    println!("cargo:rustc-env=UI_BUFFER_SIZE={}", config.ui.buffer_size);

    // Generative service
    println!("cargo:rustc-env=GEMINI_BASE_URL={}", config.gemini.base_url);
    println!("cargo:rustc-env=GEMINI_TEXT_MODEL={}", config.gemini.text_model);
    println!("cargo:rustc-env=GEMINI_TTS_MODEL={}", config.gemini.tts_model);
    println!("cargo:rustc-env=GEMINI_VOICE={}", config.gemini.voice);

    // Audio output
    println!("cargo:rustc-env=AUDIO_BACKEND={}", config.audio.backend);
    println!("cargo:rustc-env=AUDIO_DEVICE={}", config.audio.device);
    println!("cargo:rustc-env=AUDIO_SAMPLE_RATE={}", config.audio.sample_rate);
    println!("cargo:rustc-env=AUDIO_PERIOD_SIZE={}", config.audio.period_size);
    println!("cargo:rustc-env=AUDIO_WAV_DIR={}", config.audio.wav_dir);
    println!("cargo:rustc-env=AUDIO_WAV_KEEP={}", config.audio.wav_keep);
    println!("cargo:rustc-env=AUDIO_PACE={}", config.audio.pace);

    // Posters
    println!("cargo:rustc-env=POSTER_SERIF_FONT={}", config.poster.serif_font);
    println!("cargo:rustc-env=POSTER_SANS_FONT={}", config.poster.sans_font);
    println!("cargo:rustc-env=POSTER_OUTPUT_DIR={}", config.poster.output_dir);
    println!("cargo:rustc-env=POSTER_ACCENT={}", config.poster.accent);
}
