#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: &'static str,
    pub app_version: &'static str,

    // UI进程配置
    pub ui_local_port: u16,
    pub ui_remote_port: u16,
    pub ui_local_ip: &'static str,
    pub ui_remote_ip: &'static str,
    pub ui_buffer_size: usize,

    // 生成服务配置（密钥在运行时从环境变量读取，不参与编译）
    pub gemini_base_url: &'static str,
    pub gemini_text_model: &'static str,
    pub gemini_tts_model: &'static str,
    pub gemini_voice: &'static str,

    // 音频输出
    pub audio_backend: &'static str,
    pub audio_device: &'static str,
    pub audio_sample_rate: u32,
    pub audio_period_size: usize,
    pub audio_wav_dir: &'static str,
    pub audio_wav_keep: usize,
    pub audio_pace: bool,

    // 海报
    pub poster_serif_font: &'static str,
    pub poster_sans_font: &'static str,
    pub poster_output_dir: &'static str,
    pub poster_accent: &'static str,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        Ok(Self {
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            ui_local_port: env!("UI_LOCAL_PORT").parse()
                .map_err(|_| "Failed to parse UI_LOCAL_PORT")?,
            ui_remote_port: env!("UI_REMOTE_PORT").parse()
                .map_err(|_| "Failed to parse UI_REMOTE_PORT")?,
            ui_local_ip: env!("UI_LOCAL_IP"),
            ui_remote_ip: env!("UI_REMOTE_IP"),
            ui_buffer_size: env!("UI_BUFFER_SIZE").parse()
                .map_err(|_| "Failed to parse UI_BUFFER_SIZE")?,

            gemini_base_url: env!("GEMINI_BASE_URL"),
            gemini_text_model: env!("GEMINI_TEXT_MODEL"),
            gemini_tts_model: env!("GEMINI_TTS_MODEL"),
            gemini_voice: env!("GEMINI_VOICE"),

            audio_backend: env!("AUDIO_BACKEND"),
            audio_device: env!("AUDIO_DEVICE"),
            audio_sample_rate: env!("AUDIO_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse AUDIO_SAMPLE_RATE")?,
            audio_period_size: env!("AUDIO_PERIOD_SIZE").parse()
                .map_err(|_| "Failed to parse AUDIO_PERIOD_SIZE")?,
            audio_wav_dir: env!("AUDIO_WAV_DIR"),
            audio_wav_keep: env!("AUDIO_WAV_KEEP").parse()
                .map_err(|_| "Failed to parse AUDIO_WAV_KEEP")?,
            audio_pace: env!("AUDIO_PACE").parse()
                .map_err(|_| "Failed to parse AUDIO_PACE")?,

            poster_serif_font: env!("POSTER_SERIF_FONT"),
            poster_sans_font: env!("POSTER_SANS_FONT"),
            poster_output_dir: env!("POSTER_OUTPUT_DIR"),
            poster_accent: env!("POSTER_ACCENT"),
        })
    }

    /// Gemini API key, looked up at call time so a key exported after start-up is picked up.
    pub fn api_key() -> Option<String> {
        ["API_KEY", "GEMINI_API_KEY"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty() && v != "undefined")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_time_values_parse() {
        let config = Config::new().unwrap();
        assert_eq!(config.audio_sample_rate, 24000);
        assert!(config.audio_period_size > 0);
        assert!(config.audio_wav_keep > 0);
        assert!(!config.gemini_tts_model.is_empty());
    }
}
