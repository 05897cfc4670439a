//! Gemini REST client: devotional text and verse narration.

use async_trait::async_trait;
use chrono::Datelike;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::Config;

const MESES: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];

#[derive(Debug, Error)]
pub enum GenerationError {
    /// No API key configured. The UI shows setup instructions instead of a generic error.
    #[error("API key missing")]
    MissingKey,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP error {0}: {1}")]
    Status(StatusCode, String),
    #[error("unexpected response: {0}")]
    Parse(String),
}

impl GenerationError {
    /// Kind reported to the UI.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::MissingKey => "missing_key",
            _ => "generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Devotional {
    pub id: String,
    pub title: String,
    pub verse: String,
    pub reference: String,
    pub content: String,
    pub date: String,
    pub image_url: String,
}

/// The four fields the model is asked for.
#[derive(Debug, Deserialize)]
struct DevotionalBody {
    title: String,
    verse: String,
    reference: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[allow(dead_code)]
    mime_type: Option<String>,
    data: String,
}

impl GenerateResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let text: String = self
            .first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }

    fn inline_audio(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.inline_data)
            .map(|d| d.data)
            .filter(|d| !d.is_empty())
    }
}

/// Narration source for the players.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Base64 16-bit mono 24 kHz PCM, or `None` when the service produced no audio.
    async fn synthesize(&self, text: &str) -> Result<Option<String>, GenerationError>;
}

/// Source of daily devotionals.
#[async_trait]
pub trait DevotionalSource: Send + Sync {
    async fn daily_devotional(&self, topic: Option<&str>) -> Result<Devotional, GenerationError>;
}

pub type KeyLookup = Box<dyn Fn() -> Option<String> + Send + Sync>;

pub struct GeminiClient {
    http: Client,
    base_url: String,
    text_model: String,
    tts_model: String,
    voice: String,
    api_key: KeyLookup,
}

impl GeminiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Self::with_key_lookup(config, Box::new(Config::api_key))
    }

    pub fn with_key_lookup(config: &Config, api_key: KeyLookup) -> anyhow::Result<Self> {
        let base = Url::parse(config.gemini_base_url)?;
        Ok(Self {
            http: Client::new(),
            base_url: base.as_str().trim_end_matches('/').to_string(),
            text_model: config.gemini_text_model.to_string(),
            tts_model: config.gemini_tts_model.to_string(),
            voice: config.gemini_voice.to_string(),
            api_key,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate(&self, model: &str, body: Value) -> Result<GenerateResponse, GenerationError> {
        // Re-read every call so a key exported after start-up takes effect on retry.
        let key = (self.api_key)().ok_or(GenerationError::MissingKey)?;

        let resp = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Status(status, text));
        }
        Ok(resp.json::<GenerateResponse>().await?)
    }

    /// One devotional, on `topic` when given.
    pub async fn generate_daily_devotional(
        &self,
        topic: Option<&str>,
    ) -> Result<Devotional, GenerationError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": devotional_prompt(topic) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "verse": { "type": "STRING" },
                        "reference": { "type": "STRING" },
                        "content": { "type": "STRING" }
                    },
                    "required": ["title", "verse", "reference", "content"]
                }
            }
        });

        log::info!("Requesting devotional (topic: {:?})", topic);
        let response = self.generate(&self.text_model, body).await?;
        let text = response.text().unwrap_or_else(|| "{}".to_string());
        parse_devotional(&text)
    }
}

#[async_trait]
impl DevotionalSource for GeminiClient {
    async fn daily_devotional(&self, topic: Option<&str>) -> Result<Devotional, GenerationError> {
        self.generate_daily_devotional(topic).await
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize(&self, text: &str) -> Result<Option<String>, GenerationError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": format!("Leia com voz suave e inspiradora: {}", text) }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.voice }
                    }
                }
            }
        });

        log::info!("Requesting narration ({} chars)", text.chars().count());
        let response = self.generate(&self.tts_model, body).await?;
        Ok(response.inline_audio())
    }
}

fn devotional_prompt(topic: Option<&str>) -> String {
    match topic.map(str::trim).filter(|t| !t.is_empty()) {
        Some(topic) => format!(
            "Crie um devocional cristão curto e inspirador sobre {}. Inclua título, versículo, referência e um texto de reflexão de 3 parágrafos. Foco em esperança e amor.",
            topic
        ),
        None => "Crie um devocional cristão diário inspirador. Inclua um título, um versículo chave, a referência bíblica e um texto de reflexão de 3 parágrafos. Foco em esperança e amor.".to_string(),
    }
}

/// Model JSON plus the locally assigned id, date and background image.
fn parse_devotional(text: &str) -> Result<Devotional, GenerationError> {
    let body: DevotionalBody =
        serde_json::from_str(text).map_err(|e| GenerationError::Parse(e.to_string()))?;
    let now = chrono::Local::now();

    Ok(Devotional {
        id: Uuid::new_v4().to_string(),
        title: body.title,
        verse: body.verse,
        reference: body.reference,
        content: body.content,
        date: format!("{} de {}", now.day(), MESES[now.month0() as usize]),
        image_url: format!(
            "https://picsum.photos/seed/spirit{}/1200/800",
            Uuid::new_v4().simple()
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_without_key() -> GeminiClient {
        let config = Config::new().unwrap();
        GeminiClient::with_key_lookup(&config, Box::new(|| None)).unwrap()
    }

    #[test]
    fn parses_devotional_response() {
        let raw = r#"{
            "candidates": [{
                "content": { "parts": [
                    { "text": "{\"title\":\"Paz\",\"verse\":\"O Senhor é o meu pastor\"," },
                    { "text": "\"reference\":\"Salmos 23:1\",\"content\":\"Texto\"}" }
                ]}
            }]
        }"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        let devotional = parse_devotional(&response.text().unwrap()).unwrap();

        assert_eq!(devotional.title, "Paz");
        assert_eq!(devotional.reference, "Salmos 23:1");
        assert!(devotional.image_url.starts_with("https://picsum.photos/seed/spirit"));
        assert!(devotional.date.contains(" de "));
        assert!(!devotional.id.is_empty());
    }

    #[test]
    fn incomplete_devotional_is_a_parse_error() {
        let err = parse_devotional(r#"{"title":"Só título"}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Parse(_)));
        assert_eq!(err.kind(), "generic");

        assert!(matches!(parse_devotional("{}"), Err(GenerationError::Parse(_))));
    }

    #[test]
    fn extracts_inline_audio() {
        let raw = r#"{"candidates":[{"content":{"parts":[
            {"inlineData":{"mimeType":"audio/L16;codec=pcm;rate=24000","data":"AAD/fwCA"}}
        ]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.inline_audio().as_deref(), Some("AAD/fwCA"));
    }

    #[test]
    fn response_without_audio_yields_none() {
        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.inline_audio().is_none());

        let text_only: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"oi"}]}}]}"#).unwrap();
        assert!(text_only.inline_audio().is_none());
    }

    #[test]
    fn topic_is_woven_into_prompt() {
        assert!(devotional_prompt(Some("perdão")).contains("sobre perdão"));
        assert!(devotional_prompt(Some("  ")).contains("diário"));
        assert!(devotional_prompt(None).contains("diário"));
    }

    #[test]
    fn endpoint_uses_model_name() {
        let client = client_without_key();
        assert!(client
            .endpoint("gemini-2.5-flash-preview-tts")
            .ends_with("/models/gemini-2.5-flash-preview-tts:generateContent"));
    }

    #[tokio::test]
    async fn missing_key_is_distinguished() {
        let client = client_without_key();

        let err = client.generate_daily_devotional(None).await.unwrap_err();
        assert!(matches!(err, GenerationError::MissingKey));
        assert_eq!(err.kind(), "missing_key");

        let err = client.synthesize("Tudo posso").await.unwrap_err();
        assert!(matches!(err, GenerationError::MissingKey));
    }
}
