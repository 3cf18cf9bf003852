use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::events::ChatMode;
use crate::persona::Country;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "SHERIASENSE_MODEL";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini API key; `GEMINI_API_KEY` takes precedence when set
    pub api_key: Option<String>,

    /// Model used for every session
    pub model: String,

    /// Base URL of the generative language API
    pub base_url: String,

    pub request_timeout_secs: u64,

    /// How the persona mandate is attached to a new session
    pub seeding: SessionSeeding,

    /// Ask the service not to block on its harm categories
    pub relax_safety_filters: bool,

    pub ui: UiConfig,

    pub voice: VoiceConfig,

    /// Home directory for config, logs and transcripts
    #[serde(skip)]
    pub home: PathBuf,
}

/// How the persona instruction seeds a conversation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSeeding {
    /// Sent as the request's system instruction
    #[default]
    SystemInstruction,
    /// Sent as a leading user turn answered by a fixed acknowledgement
    PrimingTurn,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub default_country: Country,
    pub swahili: bool,
    pub mode: ChatMode,
}

/// Voice configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Voice name handed to the speech command, e.g. "en-gb"
    pub preferred_voice: Option<String>,
    /// Speech output program; autodetected when unset
    pub tts_command: Option<String>,
    /// Speech input program; receives the locale tag and prints a transcript
    pub stt_command: Option<String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_country: Country::Kenya,
            swahili: false,
            mode: ChatMode::General,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            api_key: None,
            model: "gemini-3-pro-preview".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout_secs: 60,
            seeding: SessionSeeding::default(),
            relax_safety_filters: true,
            ui: UiConfig::default(),
            voice: VoiceConfig::default(),
            home: home.join(".sheriasense"),
        }
    }
}

impl Config {
    /// Load configuration from `~/.sheriasense/config.toml`, creating it on first run
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Self::load_from(&home.join(".sheriasense"))
    }

    /// Load configuration rooted at an explicit directory
    pub fn load_from(app_home: &Path) -> Result<Self> {
        fs::create_dir_all(app_home).context("Failed to create .sheriasense directory")?;

        let config_path = app_home.join("config.toml");
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str::<Config>(&content).context("Failed to parse config file")?
        } else {
            let config = Config::default();
            let content =
                toml::to_string_pretty(&config).context("Failed to serialize default config")?;
            fs::write(&config_path, content).context("Failed to write default config file")?;
            tracing::info!(path = %config_path.display(), "created default config");
            config
        };

        config.home = app_home.to_path_buf();
        config.apply_env(
            std::env::var(API_KEY_ENV).ok(),
            std::env::var(MODEL_ENV).ok(),
        );
        Ok(config)
    }

    fn apply_env(&mut self, api_key: Option<String>, model: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }
    }

    /// Check if API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn log_path(&self) -> PathBuf {
        self.home.join("sheriasense.log")
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.home.join("transcripts")
    }
}
