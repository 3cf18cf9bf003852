use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SessionSeeding;
use crate::error::FailureKind;
use crate::llm::{ChatBackend, InlineData, Part, Turn};
use crate::persona::Persona;
use crate::prompts;

/// A multi-turn exchange with the model, scoped to one persona
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: Uuid,
    persona_name: String,
    created_at: DateTime<Utc>,
    seeding: SessionSeeding,
    instruction: String,
    turns: Vec<Turn>,
}

impl ConversationSession {
    fn open(persona: &Persona, seeding: SessionSeeding) -> Self {
        let instruction = persona.system_instruction().to_string();
        let turns = match seeding {
            SessionSeeding::SystemInstruction => Vec::new(),
            SessionSeeding::PrimingTurn => vec![
                Turn::user(vec![Part::text(instruction.clone())]),
                Turn::model(prompts::PRIMING_ACK),
            ],
        };

        Self {
            id: Uuid::new_v4(),
            persona_name: persona.country_name().to_string(),
            created_at: Utc::now(),
            seeding,
            instruction,
            turns,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn persona_name(&self) -> &str {
        &self.persona_name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn system_instruction(&self) -> Option<&str> {
        match self.seeding {
            SessionSeeding::SystemInstruction => Some(&self.instruction),
            SessionSeeding::PrimingTurn => None,
        }
    }

    /// Every turn sent so far, including any priming exchange
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

/// Owns the active persona and its remote conversation
pub struct SessionManager {
    backend: Arc<dyn ChatBackend>,
    seeding: SessionSeeding,
    persona: Persona,
    session: Option<ConversationSession>,
    resets: usize,
}

impl SessionManager {
    /// Create a manager for `persona`. No conversation is opened until
    /// `reset_session` or the first `send`.
    pub fn new(backend: Arc<dyn ChatBackend>, persona: Persona, seeding: SessionSeeding) -> Self {
        Self {
            backend,
            seeding,
            persona,
            session: None,
            resets: 0,
        }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn session(&self) -> Option<&ConversationSession> {
        self.session.as_ref()
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Number of conversations opened so far
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    /// Switch persona and start over. Returns false when `name` is already active.
    pub fn set_persona(&mut self, name: &str, motto: &str) -> bool {
        if self.persona.country_name() == name {
            return false;
        }
        self.persona = Persona::new(name, motto);
        self.reset_session();
        true
    }

    /// Drop the current conversation and open a fresh one seeded with the persona mandate.
    pub fn reset_session(&mut self) {
        let session = ConversationSession::open(&self.persona, self.seeding);
        tracing::info!(
            session_id = %session.id(),
            country = %self.persona.country_name(),
            seeding = ?self.seeding,
            "started new conversation"
        );
        self.session = Some(session);
        self.resets += 1;
        tracing::debug!(conversations = self.reset_count(), "session reset");
    }

    /// Send one turn and wait for the reply. Service failures resolve to a
    /// fixed user-facing message.
    pub async fn send(&mut self, prompt_text: &str, attachment: Option<InlineData>) -> String {
        if self.session.is_none() {
            self.reset_session();
        }

        let mut parts = Vec::with_capacity(2);
        if attachment.is_some() && prompt_text.is_empty() {
            parts.push(Part::text(prompts::default_document_prompt(
                self.persona.country_name(),
            )));
        } else {
            parts.push(Part::text(prompt_text));
        }
        if let Some(inline_data) = attachment {
            parts.push(Part::InlineData { inline_data });
        }
        let turn = Turn::user(parts);
        tracing::debug!(
            chars = turn.text().len(),
            parts = turn.parts.len(),
            "sending turn"
        );

        let Some(session) = self.session.as_mut() else {
            return prompts::GENERIC_FAILURE_REPLY.to_string();
        };

        let mut contents = session.turns.clone();
        contents.push(turn.clone());

        match self.backend.generate(session.system_instruction(), &contents).await {
            Ok(reply) => {
                session.turns.push(turn);
                session.turns.push(Turn::model(reply.clone()));
                tracing::debug!(
                    session_id = %session.id(),
                    turns = session.turns().len(),
                    age_secs = (Utc::now() - session.created_at()).num_seconds(),
                    "reply received"
                );
                reply
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    session_id = %session.id(),
                    country = session.persona_name(),
                    "model request failed"
                );
                match err.kind() {
                    FailureKind::NotFound => prompts::model_not_found_reply(self.backend.model()),
                    FailureKind::Unauthorized => prompts::UNAUTHORIZED_REPLY.to_string(),
                    FailureKind::Other => prompts::GENERIC_FAILURE_REPLY.to_string(),
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedBackend;
    use super::*;
    use crate::error::LlmError;
    use crate::llm::TurnRole;
    use crate::persona::Country;

    fn manager(backend: &Arc<ScriptedBackend>, seeding: SessionSeeding) -> SessionManager {
        SessionManager::new(backend.clone(), Persona::default(), seeding)
    }

    #[test]
    fn test_starts_uninitialized() {
        let backend = Arc::new(ScriptedBackend::new());
        let manager = manager(&backend, SessionSeeding::SystemInstruction);
        assert!(manager.session().is_none());
        assert_eq!(manager.reset_count(), 0);
    }

    #[test]
    fn test_set_same_persona_is_noop() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager(&backend, SessionSeeding::SystemInstruction);
        manager.reset_session();
        let id = manager.session().unwrap().id();

        assert!(!manager.set_persona("Kenya", "Sheria"));
        assert_eq!(manager.session().unwrap().id(), id);
        assert_eq!(manager.reset_count(), 1);
    }

    #[test]
    fn test_set_persona_replaces_session() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager(&backend, SessionSeeding::SystemInstruction);
        manager.reset_session();
        let first = manager.session().unwrap().id();

        assert!(manager.set_persona("Uganda", Country::Uganda.motto()));
        let session = manager.session().unwrap();
        assert_ne!(session.id(), first);
        assert_eq!(session.persona_name(), "Uganda");
        assert_eq!(manager.persona().motto(), "For God and My Country");
        assert!(manager.persona().system_instruction().contains("**Uganda**"));

        assert!(!manager.set_persona("Uganda", "For God and My Country"));
        assert!(!manager.set_persona("Uganda", "For God and My Country"));
        assert_eq!(manager.reset_count(), 2);
    }

    #[tokio::test]
    async fn test_send_opens_session_lazily() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_reply("Habari");
        let mut manager = manager(&backend, SessionSeeding::SystemInstruction);

        let reply = manager.send("hello", None).await;

        assert_eq!(reply, "Habari");
        assert_eq!(manager.reset_count(), 1);
        let call = backend.last_call();
        assert!(call.system_instruction.unwrap().contains("**Kenya**"));
        assert_eq!(call.contents.len(), 1);
        assert_eq!(call.contents[0].text(), "hello");
    }

    #[tokio::test]
    async fn test_turns_accumulate_and_reset_discards_them() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_reply("first");
        backend.push_reply("second");
        backend.push_reply("third");
        let mut manager = manager(&backend, SessionSeeding::SystemInstruction);

        manager.send("one", None).await;
        manager.send("two", None).await;
        let call = backend.last_call();
        assert_eq!(call.contents.len(), 3);
        assert_eq!(call.contents[1].role, TurnRole::Model);
        assert_eq!(call.contents[1].text(), "first");

        manager.set_persona("Tanzania", Country::Tanzania.motto());
        manager.send("three", None).await;
        let call = backend.last_call();
        assert_eq!(call.contents.len(), 1);
        assert!(call.system_instruction.unwrap().contains("**Tanzania**"));
    }

    #[tokio::test]
    async fn test_priming_turn_seeding() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager(&backend, SessionSeeding::PrimingTurn);

        manager.send("hello", None).await;

        let call = backend.last_call();
        assert!(call.system_instruction.is_none());
        assert_eq!(call.contents.len(), 3);
        assert!(call.contents[0].text().contains("SheriaSenseEA"));
        assert_eq!(call.contents[1].text(), prompts::PRIMING_ACK);
        assert_eq!(call.contents[2].text(), "hello");
    }

    #[tokio::test]
    async fn test_attachment_travels_with_turn() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager(&backend, SessionSeeding::SystemInstruction);
        let data = InlineData {
            mime_type: "application/pdf".into(),
            data: "JVBERi0=".into(),
        };

        manager.send("", Some(data.clone())).await;

        let call = backend.last_call();
        let parts = &call.contents[0].parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0].as_text().unwrap(),
            "Analyze this document based on the laws of Kenya. Summarize legal risks."
        );
        assert_eq!(parts[1], Part::InlineData { inline_data: data });
    }

    #[tokio::test]
    async fn test_whitespace_text_with_attachment_is_sent_as_is() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager(&backend, SessionSeeding::SystemInstruction);
        let data = InlineData {
            mime_type: "image/png".into(),
            data: "iVBORw0=".into(),
        };

        manager.send("  ", Some(data)).await;

        let call = backend.last_call();
        assert_eq!(call.contents[0].parts[0].as_text(), Some("  "));
    }

    #[tokio::test]
    async fn test_errors_map_to_fixed_replies() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error(LlmError::Api { status: 404, message: "not found".into() });
        backend.push_error(LlmError::Api { status: 403, message: "denied".into() });
        backend.push_error(LlmError::EmptyResponse);
        let mut manager = manager(&backend, SessionSeeding::SystemInstruction);

        assert_eq!(
            manager.send("a", None).await,
            "Error 404: The model 'gemini-test' was not found. Please verify your API key access."
        );
        assert_eq!(manager.send("b", None).await, prompts::UNAUTHORIZED_REPLY);
        assert_eq!(manager.send("c", None).await, prompts::GENERIC_FAILURE_REPLY);

        // failed turns are not kept in the conversation
        assert!(manager.session().unwrap().turns().is_empty());
    }
}
