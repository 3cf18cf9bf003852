use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Display language of the chat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    #[strum(serialize = "en", serialize = "english")]
    English,
    /// Secondary locale
    #[strum(serialize = "sw", serialize = "swahili", serialize = "kiswahili")]
    Swahili,
}

impl Locale {
    pub fn from_secondary(to_secondary: bool) -> Self {
        if to_secondary { Locale::Swahili } else { Locale::English }
    }

    pub fn is_secondary(&self) -> bool {
        matches!(self, Locale::Swahili)
    }

    /// Language tag handed to the speech recognizer
    pub fn speech_tag(&self) -> &'static str {
        match self {
            Locale::English => "en-KE",
            Locale::Swahili => "sw-KE",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Locale::English => "English",
            Locale::Swahili => "Kiswahili",
        }
    }
}

/// Entry point the chat was opened with; selects the welcome text
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, AsRefStr, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatMode {
    #[default]
    General,
    /// Document review
    Analyze,
    /// Step-by-step procedures
    Guide,
}

/// Role in conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "You",
            ChatRole::Assistant => "SheriaSense",
        }
    }
}

/// A single entry in the visible chat history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    #[serde(default)]
    pub has_attachment: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>, has_attachment: bool) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            has_attachment,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
            has_attachment: false,
        }
    }
}

/// User-visible notices raised outside the chat history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    AttachmentTooLarge,
    UnsupportedAttachment,
    AttachmentUnreadable(String),
    VoiceInputUnavailable,
    VoiceOutputUnavailable,
    Info(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::AttachmentTooLarge => {
                "File is too large. Please upload a file smaller than 5MB.".to_string()
            }
            Notice::UnsupportedAttachment => "Please upload an Image or PDF.".to_string(),
            Notice::AttachmentUnreadable(reason) => format!("Could not open file: {}", reason),
            Notice::VoiceInputUnavailable => {
                "Voice input is not supported on this system. Configure voice.stt_command to enable it."
                    .to_string()
            }
            Notice::VoiceOutputUnavailable => {
                "Speech output is not available. Install espeak-ng or configure voice.tts_command."
                    .to_string()
            }
            Notice::Info(message) => message.clone(),
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Notice::Info(_))
    }
}
