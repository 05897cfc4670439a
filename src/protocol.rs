//! JSON datagrams exchanged with the UI process.

use serde::{Deserialize, Serialize};

use crate::content::MeditationEntry;
use crate::gemini::Devotional;
use crate::poster::PosterSpec;

/// Commands sent by the UI.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiCommand {
    Devotional {
        #[serde(default)]
        topic: Option<String>,
    },
    PlayVerse,
    PlayMeditation {
        index: usize,
    },
    Poster {
        id: String,
    },
    Stop,
    /// Ask for the meditation and poster lists again.
    Catalogue,
}

impl UiCommand {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// State pushed to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Audio {
        surface: &'static str,
        slot: Option<usize>,
        state: &'static str,
    },
    Devotional(Devotional),
    Error {
        kind: &'static str,
        message: String,
    },
    Poster {
        id: String,
        state: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Catalogue {
        meditations: Vec<MeditationEntry>,
        posters: Vec<PosterSpec>,
    },
}

impl Notification {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn parses_commands() {
        assert_eq!(
            UiCommand::parse(r#"{"type":"devotional","topic":"perdão"}"#).unwrap(),
            UiCommand::Devotional {
                topic: Some("perdão".to_string())
            }
        );
        assert_eq!(
            UiCommand::parse(r#"{"type":"devotional"}"#).unwrap(),
            UiCommand::Devotional { topic: None }
        );
        assert_eq!(UiCommand::parse(r#"{"type":"play_verse"}"#).unwrap(), UiCommand::PlayVerse);
        assert_eq!(
            UiCommand::parse(r#"{"type":"play_meditation","index":2}"#).unwrap(),
            UiCommand::PlayMeditation { index: 2 }
        );
        assert_eq!(
            UiCommand::parse(r#"{"type":"poster","id":"1"}"#).unwrap(),
            UiCommand::Poster { id: "1".to_string() }
        );
        assert_eq!(UiCommand::parse(r#"{"type":"stop"}"#).unwrap(), UiCommand::Stop);
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(UiCommand::parse("not json").is_err());
        assert!(UiCommand::parse(r#"{"type":"reboot"}"#).is_err());
        assert!(UiCommand::parse(r#"{"type":"play_meditation"}"#).is_err());
        assert!(UiCommand::parse(r#"{"type":"play_meditation","index":-1}"#).is_err());
    }

    #[test]
    fn notification_wire_format() {
        let audio = Notification::Audio {
            surface: "meditation",
            slot: Some(1),
            state: "loading",
        };
        let value: Value = serde_json::from_str(&audio.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type":"audio","surface":"meditation","slot":1,"state":"loading"})
        );

        let exporting = Notification::Poster {
            id: "2".to_string(),
            state: "exporting",
            path: None,
        };
        let value: Value = serde_json::from_str(&exporting.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type":"poster","id":"2","state":"exporting"}));

        let error = Notification::Error {
            kind: "missing_key",
            message: "API key missing".to_string(),
        };
        let value: Value = serde_json::from_str(&error.to_json().unwrap()).unwrap();
        assert_eq!(value["kind"], "missing_key");
    }

    #[test]
    fn devotional_fields_are_flattened() {
        let devotional = Devotional {
            id: "abc".to_string(),
            title: "Paz".to_string(),
            verse: "Deixo-vos a paz".to_string(),
            reference: "João 14:27".to_string(),
            content: "Texto".to_string(),
            date: "19 de outubro".to_string(),
            image_url: "https://picsum.photos/seed/spirit1/1200/800".to_string(),
        };
        let value: Value =
            serde_json::from_str(&Notification::Devotional(devotional).to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "devotional");
        assert_eq!(value["reference"], "João 14:27");
        assert_eq!(value["image_url"], "https://picsum.photos/seed/spirit1/1200/800");
    }
}
