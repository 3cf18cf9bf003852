use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

use crate::events::{ChatMessage, ChatRole, Locale};
use crate::format::format_text;

/// Snapshot of a chat written on export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub exported_at: DateTime<Utc>,
    pub country: String,
    pub locale: Locale,
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(country: &str, locale: Locale, model: &str, messages: &[ChatMessage]) -> Self {
        Self {
            id: Uuid::new_v4(),
            exported_at: Utc::now(),
            country: country.to_string(),
            locale,
            model: model.to_string(),
            messages: messages.to_vec(),
        }
    }

    fn file_stem(&self) -> String {
        format!("{}-{}", self.exported_at.format("%Y%m%d-%H%M%S"), self.id)
    }
}

pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `<stem>.json` and `<stem>.html`; returns the HTML path.
    pub fn export(&self, transcript: &Transcript) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).context("Failed to create transcripts directory")?;

        let stem = transcript.file_stem();
        let json_path = self.dir.join(format!("{stem}.json"));
        let html_path = self.dir.join(format!("{stem}.html"));

        let content =
            serde_json::to_string_pretty(transcript).context("Failed to serialize transcript")?;
        fs::write(&json_path, content).context("Failed to write transcript")?;
        fs::write(&html_path, render_html(transcript)).context("Failed to write transcript page")?;

        tracing::info!(path = %json_path.display(), messages = transcript.messages.len(), "transcript exported");
        Ok(html_path)
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Standalone page; assistant replies pass through `format_text` once.
pub fn render_html(transcript: &Transcript) -> String {
    let mut body = String::new();
    for message in &transcript.messages {
        let (class, text) = match message.role {
            ChatRole::User => ("user", escape_html(&message.text).replace('\n', "<br>")),
            ChatRole::Assistant => ("ai", format_text(&escape_html(&message.text))),
        };
        let clip = if message.has_attachment { " 📎" } else { "" };
        body.push_str(&format!(
            "<div class=\"msg {class}\"><b>{}{clip}</b><p>{text}</p></div>\n",
            message.role.label()
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>SheriaSense — {country}</title></head>\n<body>\n<h1>SheriaSense — {country}</h1>\n<p>{exported} · {model}</p>\n{body}</body></html>\n",
        country = escape_html(&transcript.country),
        exported = transcript.exported_at.to_rfc3339(),
        model = escape_html(&transcript.model),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn transcript() -> Transcript {
        Transcript::new(
            "Kenya",
            Locale::English,
            "gemini-test",
            &[
                ChatMessage::assistant("**Welcome**"),
                ChatMessage::user("Is 1 < 2?", true),
            ],
        )
    }

    #[test]
    fn test_export_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path().join("transcripts"));
        let transcript = transcript();

        let html_path = store.export(&transcript).unwrap();
        let json_path = html_path.with_extension("json");
        assert!(html_path.exists());

        let loaded: Transcript =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(loaded.id, transcript.id);
        assert_eq!(loaded.messages, transcript.messages);
    }

    #[test]
    fn test_html_formats_replies_once_and_escapes() {
        let html = render_html(&transcript());
        assert!(html.contains("<strong>Welcome</strong>"));
        assert!(html.contains("Is 1 &lt; 2?"));
        assert!(html.contains("You 📎"));
        assert!(!html.contains("**"));
    }
}
