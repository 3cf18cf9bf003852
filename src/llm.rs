use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::error::LlmError;

/// Who produced a turn, in the service's vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// Binary payload sent inline with a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 encoded bytes
    pub data: String,
}

/// One piece of a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        }
    }
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user(parts: Vec<Part>) -> Self {
        Self { role: TurnRole::User, parts }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect::<Vec<_>>().join("")
    }
}

/// The remote conversational service. Each call carries the whole
/// conversation so far and yields exactly one reply.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(
        &self,
        system_instruction: Option<&str>,
        contents: &[Turn],
    ) -> Result<String, LlmError>;
}

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini `generateContent` client
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    relax_safety_filters: bool,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        if !config.has_api_key() {
            return Err(LlmError::MissingApiKey);
        }
        let api_key = config.api_key.clone().unwrap_or_default();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.without_url()))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            relax_safety_filters: config.relax_safety_filters,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_payload(&self, system_instruction: Option<&str>, contents: &[Turn]) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: contents.to_vec(),
            system_instruction: system_instruction.map(|text| SystemInstruction {
                parts: vec![Part::text(text)],
            }),
            safety_settings: if self.relax_safety_filters {
                HARM_CATEGORIES
                    .iter()
                    .map(|category| SafetySetting {
                        category: category.to_string(),
                        threshold: "BLOCK_NONE".to_string(),
                    })
                    .collect()
            } else {
                Vec::new()
            },
        }
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system_instruction: Option<&str>,
        contents: &[Turn],
    ) -> Result<String, LlmError> {
        let payload = self.build_payload(system_instruction, contents);

        if let Some(turn) = contents.last() {
            for part in &turn.parts {
                if let Part::InlineData { inline_data } = part {
                    tracing::info!(mime_type = %inline_data.mime_type, "sending file to model");
                }
            }
        }

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            // The request URL carries the API key.
            .map_err(|e| LlmError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.without_url().to_string()))?;

        extract_text(parsed)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    let text = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        Err(LlmError::EmptyResponse)
    } else {
        Ok(text)
    }
}

fn map_api_error(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(status_text) if !status_text.is_empty() => format!("{status_text}: {msg}"),
                _ => msg,
            }
        })
        .unwrap_or_else(|_| body.to_string());

    LlmError::Api { status, message }
}
