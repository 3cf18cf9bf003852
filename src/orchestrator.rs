use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::attachment::PendingAttachment;
use crate::error::AttachmentError;
use crate::events::{ChatMessage, ChatMode, ChatRole, Locale, Notice};
use crate::persona::Country;
use crate::prompts::{self, SuggestionChip};
use crate::session::SessionManager;

static RISK_TERMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)suicide|kill|rape|assault|murder|die|violence|kufa|ua|baka").unwrap()
});

/// Motto used when switching to a country outside the catalogue
const FALLBACK_MOTTO: &str = "Sheria";

fn motto_for(name: &str) -> &'static str {
    Country::find(name).map_or(FALLBACK_MOTTO, |c| c.motto())
}

/// Advisory check for high-risk terms; never blocks sending.
pub fn contains_risk_terms(text: &str) -> bool {
    RISK_TERMS.is_match(text)
}

/// A submission that passed the single-flight guard and is ready to send
#[derive(Debug, Clone)]
pub struct PendingTurn {
    /// Decorated text handed to the session
    pub prompt: String,
    pub attachment: Option<PendingAttachment>,
}

/// Owns the visible chat state and drives turns through the session
pub struct MessageOrchestrator {
    session: Arc<Mutex<SessionManager>>,
    country: String,
    mode: ChatMode,
    locale: Locale,
    history: Vec<ChatMessage>,
    input: String,
    pending_attachment: Option<PendingAttachment>,
    is_loading: bool,
    is_analyzing: bool,
    show_safety_warning: bool,
    notices: Vec<Notice>,
}

impl MessageOrchestrator {
    /// Build the orchestrator around a shared session and seed the welcome message.
    pub async fn new(session: Arc<Mutex<SessionManager>>, mode: ChatMode, locale: Locale) -> Self {
        let country = session.lock().await.persona().country_name().to_string();
        let mut orchestrator = Self {
            session,
            country,
            mode,
            locale,
            history: Vec::new(),
            input: String::new(),
            pending_attachment: None,
            is_loading: false,
            is_analyzing: false,
            show_safety_warning: false,
            notices: Vec::new(),
        };
        orchestrator.add_welcome_message();
        orchestrator
    }

    pub fn session(&self) -> Arc<Mutex<SessionManager>> {
        self.session.clone()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    /// Motto of the active country, or the generic one for unknown names
    pub fn motto(&self) -> &'static str {
        motto_for(&self.country)
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_analyzing(&self) -> bool {
        self.is_analyzing
    }

    pub fn show_safety_warning(&self) -> bool {
        self.show_safety_warning
    }

    pub fn pending_attachment(&self) -> Option<&PendingAttachment> {
        self.pending_attachment.as_ref()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn suggestion_chips(&self) -> &'static [SuggestionChip] {
        prompts::suggestion_chips(self.locale)
    }

    /// Drain notices raised since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn welcome_message(&self, locale: Locale) -> String {
        prompts::welcome_message(&self.country, self.mode, locale)
    }

    fn add_welcome_message(&mut self) {
        if !self.history.is_empty() {
            return;
        }
        let message = self.welcome_message(self.locale);
        self.history.push(ChatMessage::assistant(message));
    }

    /// Change display language, re-rendering the welcome entry in place.
    pub fn switch_locale(&mut self, to_secondary: bool) {
        self.locale = Locale::from_secondary(to_secondary);
        let welcome = self.welcome_message(self.locale);
        if let Some(first) = self.history.first_mut() {
            if first.role == ChatRole::Assistant {
                first.text = welcome;
            }
        }
    }

    /// Move to another country's persona. History restarts with a fresh welcome.
    /// Returns false when `name` is already active.
    pub async fn switch_persona(&mut self, name: &str) -> bool {
        if self.country == name {
            return false;
        }
        let changed = self.session.lock().await.set_persona(name, motto_for(name));
        if !changed {
            return false;
        }
        tracing::info!(country = name, "persona switched");
        self.country = name.to_string();
        self.history.clear();
        self.add_welcome_message();
        true
    }

    /// Stage a file for the next submission. Invalid files raise a notice and
    /// leave the current selection untouched.
    pub fn select_attachment(&mut self, path: impl AsRef<Path>) -> bool {
        match PendingAttachment::from_path(path) {
            Ok(attachment) => {
                tracing::info!(
                    path = %attachment.path().display(),
                    mime = attachment.mime_type(),
                    size = attachment.size(),
                    "attachment staged"
                );
                self.pending_attachment = Some(attachment);
                true
            }
            Err(err) => {
                tracing::debug!(error = %err, "attachment rejected");
                self.notices.push(match err {
                    AttachmentError::TooLarge { .. } => Notice::AttachmentTooLarge,
                    AttachmentError::UnsupportedType(_) => Notice::UnsupportedAttachment,
                    AttachmentError::Io(e) => Notice::AttachmentUnreadable(e.to_string()),
                });
                false
            }
        }
    }

    pub fn clear_attachment(&mut self) {
        self.pending_attachment = None;
    }

    /// Synchronous half of a submission: guard, decorate, record the user entry.
    ///
    /// Returns `None` without touching any state when there is nothing to send
    /// or a previous submission is still in flight. `attachment` overrides the
    /// staged file when given.
    pub fn begin_submit(
        &mut self,
        user_text: &str,
        attachment: Option<PendingAttachment>,
    ) -> Option<PendingTurn> {
        if self.is_loading {
            return None;
        }
        let attachment = attachment.or_else(|| self.pending_attachment.clone());
        if user_text.trim().is_empty() && attachment.is_none() {
            return None;
        }

        self.show_safety_warning = contains_risk_terms(user_text);

        let prompt = prompts::decorate_prompt(user_text, &self.country, self.locale);
        let has_file = attachment.is_some();

        self.input.clear();
        self.pending_attachment = None;

        let display = if user_text.trim().is_empty() {
            prompts::attachment_placeholder(self.locale).to_string()
        } else {
            user_text.to_string()
        };
        self.history.push(ChatMessage::user(display, has_file));

        self.is_loading = true;
        self.is_analyzing = has_file;

        Some(PendingTurn { prompt, attachment })
    }

    /// Encode any attachment and run the turn through the session.
    pub async fn dispatch(session: Arc<Mutex<SessionManager>>, turn: PendingTurn) -> Result<String> {
        let inline_data = match &turn.attachment {
            Some(attachment) => Some(attachment.encode().await?),
            None => None,
        };
        let reply = session.lock().await.send(&turn.prompt, inline_data).await;
        Ok(reply)
    }

    /// Record the outcome of a dispatched turn and release the busy flags.
    pub fn finish_submit(&mut self, outcome: Result<String>) {
        match outcome {
            Ok(reply) => self.history.push(ChatMessage::assistant(reply)),
            Err(err) => {
                tracing::warn!(error = %err, "submission failed");
                self.history
                    .push(ChatMessage::assistant(prompts::request_failed_reply(self.locale)));
            }
        }
        self.is_loading = false;
        self.is_analyzing = false;
    }

    /// Full submission cycle. Returns false when the guard rejected the call.
    pub async fn submit(&mut self, user_text: &str, attachment: Option<PendingAttachment>) -> bool {
        let Some(turn) = self.begin_submit(user_text, attachment) else {
            return false;
        };
        let outcome = Self::dispatch(self.session.clone(), turn).await;
        self.finish_submit(outcome);
        true
    }

    /// Text of suggestion chip `index` for the current locale
    pub fn chip_text(&self, index: usize) -> Option<&'static str> {
        self.suggestion_chips().get(index).map(|chip| chip.text)
    }
}
