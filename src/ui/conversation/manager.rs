use crate::events::{ChatRole, Locale, Notice};
use crate::format::share_link;
use crate::orchestrator::MessageOrchestrator;
use crate::persona::Country;
use crate::storage::{Transcript, TranscriptStore};
use crate::ui::conversation::commands::{ParsedCommand, SlashCommand, get_help_text};
use crate::ui::conversation::composer::ComposerResult;
use crate::ui::conversation::status::StatusView;
use crate::ui::conversation::{ConversationComposer, ConversationHistory};
use crate::voice::{ListenAction, VoiceController};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use std::path::PathBuf;
use strum::IntoEnumIterator;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

const SCROLL_STEP: usize = 5;

/// Transcript tagged with the capture generation that produced it
type TranscriptOutcome = (u64, Result<String>);

/// Manages the conversation flow and UI components
pub struct ConversationManager {
    orchestrator: MessageOrchestrator,
    voice: VoiceController,
    transcripts: TranscriptStore,
    model: String,
    history: ConversationHistory,
    composer: ConversationComposer,
    notice: Option<Notice>,
    show_help: bool,
    reply_tx: mpsc::UnboundedSender<Result<String>>,
    reply_rx: mpsc::UnboundedReceiver<Result<String>>,
    transcript_tx: mpsc::UnboundedSender<TranscriptOutcome>,
    transcript_rx: mpsc::UnboundedReceiver<TranscriptOutcome>,
    capture_task: Option<JoinHandle<()>>,
}

impl ConversationManager {
    pub fn new(
        orchestrator: MessageOrchestrator,
        voice: VoiceController,
        transcripts: TranscriptStore,
        model: impl Into<String>,
    ) -> Self {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (transcript_tx, transcript_rx) = mpsc::unbounded_channel();
        let composer = ConversationComposer::new(orchestrator.locale());

        Self {
            orchestrator,
            voice,
            transcripts,
            model: model.into(),
            history: ConversationHistory::new(),
            composer,
            notice: None,
            show_help: false,
            reply_tx,
            reply_rx,
            transcript_tx,
            transcript_rx,
            capture_task: None,
        }
    }

    pub fn orchestrator(&self) -> &MessageOrchestrator {
        &self.orchestrator
    }

    /// Apply finished background work. Called once per frame.
    pub fn tick(&mut self) {
        while let Ok(outcome) = self.reply_rx.try_recv() {
            self.orchestrator.finish_submit(outcome);
            self.history.scroll_to_bottom();
        }
        while let Ok((generation, outcome)) = self.transcript_rx.try_recv() {
            self.apply_transcript(generation, outcome);
        }
        self.voice.poll();
        if let Some(notice) = self.orchestrator.take_notices().pop() {
            self.notice = Some(notice);
        }
    }

    /// Handle key input
    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<ConversationAction> {
        if key.kind != KeyEventKind::Press {
            return Ok(ConversationAction::None);
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(ConversationAction::Exit);
        }

        if self.show_help {
            self.show_help = false;
            self.composer.set_focus(true);
            return Ok(ConversationAction::None);
        }

        match key.code {
            KeyCode::PageUp => {
                self.history.scroll_up(SCROLL_STEP);
                return Ok(ConversationAction::None);
            }
            KeyCode::PageDown => {
                self.history.scroll_down(SCROLL_STEP);
                return Ok(ConversationAction::None);
            }
            KeyCode::F(n @ 1..=4) => {
                self.use_chip(usize::from(n - 1));
                return Ok(ConversationAction::None);
            }
            _ => {}
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(text) => {
                self.submit(text);
                Ok(ConversationAction::None)
            }
            ComposerResult::Command(command) => self.handle_slash_command(command).await,
            ComposerResult::None => Ok(ConversationAction::None),
        }
    }

    /// Run the guard synchronously and hand the remote call to a task.
    fn submit(&mut self, text: String) {
        self.orchestrator.set_input(text.as_str());
        let Some(turn) = self.orchestrator.begin_submit(&text, None) else {
            if self.orchestrator.is_loading() {
                self.notice = Some(Notice::Info(self.busy_message().to_string()));
            }
            return;
        };

        self.voice.stop_speaking();
        self.composer.set_content(self.orchestrator.input());
        self.history.scroll_to_bottom();
        self.notice = None;

        let session = self.orchestrator.session();
        let reply_tx = self.reply_tx.clone();
        tokio::spawn(async move {
            let outcome = MessageOrchestrator::dispatch(session, turn).await;
            if reply_tx.send(outcome).is_err() {
                tracing::debug!("reply dropped; chat closed");
            }
        });
    }

    fn use_chip(&mut self, index: usize) {
        let Some(text) = self.orchestrator.chip_text(index) else {
            self.notice = Some(Notice::Info(self.chip_listing()));
            return;
        };
        self.composer.set_content(text);
        self.submit(text.to_string());
    }

    fn apply_transcript(&mut self, generation: u64, outcome: Result<String>) {
        if !self.voice.finish_listening(generation) {
            tracing::debug!(generation, "dropping transcript from cancelled capture");
            return;
        }
        self.capture_task = None;
        match outcome {
            Ok(transcript) if !transcript.trim().is_empty() => {
                self.orchestrator.set_input(transcript.trim());
                self.composer.set_content(self.orchestrator.input());
            }
            Ok(_) => self.notice = Some(Notice::Info("No speech detected.".to_string())),
            Err(err) => {
                tracing::warn!(error = %err, "voice capture failed");
                self.notice = Some(Notice::Info(format!("Voice input failed: {err}")));
            }
        }
    }

    /// Handle slash commands
    async fn handle_slash_command(&mut self, command: ParsedCommand) -> Result<ConversationAction> {
        if self.orchestrator.is_loading() && !command.command.available_while_loading() {
            self.notice = Some(Notice::Info(self.busy_message().to_string()));
            return Ok(ConversationAction::None);
        }

        match command.command {
            SlashCommand::Country => match command.country_target() {
                Some(country) => {
                    if self.orchestrator.switch_persona(country.name()).await {
                        self.voice.stop_speaking();
                        self.history.scroll_to_bottom();
                        self.notice = None;
                    } else {
                        self.notice = Some(Notice::Info(format!("Already advising on {} law.", country.name())));
                    }
                }
                None => {
                    let names: Vec<_> = Country::iter().map(|c| c.name()).collect();
                    self.notice = Some(Notice::Info(format!("Choose a country: {}", names.join(", "))));
                }
            },
            SlashCommand::Lang => {
                let target = match (command.argument(), command.locale_target()) {
                    (None, _) => Locale::from_secondary(!self.orchestrator.locale().is_secondary()),
                    (Some(_), Some(locale)) => locale,
                    (Some(other), None) => {
                        self.notice = Some(Notice::Info(format!("Unknown language '{other}'. Use en or sw.")));
                        return Ok(ConversationAction::None);
                    }
                };
                self.orchestrator.switch_locale(target.is_secondary());
                self.composer.set_locale(target);
            }
            SlashCommand::Attach => match command.argument() {
                Some(path) => {
                    if self.orchestrator.select_attachment(expand_home(path)) {
                        self.notice = None;
                    }
                }
                None => self.notice = Some(Notice::Info("Usage: /attach <path to image or PDF>".to_string())),
            },
            SlashCommand::Detach => self.orchestrator.clear_attachment(),
            SlashCommand::Chip => match command.index_argument() {
                Some(index) => self.use_chip(index),
                None => self.notice = Some(Notice::Info(self.chip_listing())),
            },
            SlashCommand::Speak => {
                if let Some(index) = self.reply_index(&command) {
                    let text = self.orchestrator.history()[index].text.clone();
                    self.notice = self.voice.speak(index, &text);
                }
            }
            SlashCommand::Mic => match self.voice.toggle_listening() {
                ListenAction::Start { recognizer, generation } => {
                    self.cancel_capture();
                    let tag = self.orchestrator.locale().speech_tag();
                    let transcript_tx = self.transcript_tx.clone();
                    self.capture_task = Some(tokio::spawn(async move {
                        let outcome = recognizer.listen(tag).await;
                        if transcript_tx.send((generation, outcome)).is_err() {
                            tracing::debug!("transcript dropped; chat closed");
                        }
                    }));
                }
                ListenAction::Stopped => self.cancel_capture(),
                ListenAction::Unavailable(notice) => {
                    if notice.is_some() {
                        self.notice = notice;
                    }
                }
            },
            SlashCommand::Share => {
                if let Some(index) = self.reply_index(&command) {
                    let link = share_link(&self.orchestrator.history()[index].text);
                    tracing::info!(message = index, "share link created");
                    self.notice = Some(Notice::Info(link));
                }
            }
            SlashCommand::Export => self.export_transcript(),
            SlashCommand::Help => {
                self.show_help = true;
                self.composer.set_focus(false);
            }
            SlashCommand::Bye => return Ok(ConversationAction::Exit),
        }

        Ok(ConversationAction::None)
    }

    /// Abort the running capture; dropping it stops the recognizer process.
    fn cancel_capture(&mut self) {
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
    }

    /// Resolve `/speak`/`/share` targets; defaults to the newest reply.
    fn reply_index(&mut self, command: &ParsedCommand) -> Option<usize> {
        let history = self.orchestrator.history();
        let index = match command.argument() {
            Some(_) => command.index_argument(),
            None => history.iter().rposition(|m| m.role == ChatRole::Assistant),
        };

        let valid = index.filter(|&i| history.get(i).is_some_and(|m| m.role == ChatRole::Assistant));
        if valid.is_none() {
            self.notice = Some(Notice::Info(
                "Pick a SheriaSense reply by its number, e.g. /speak 1".to_string(),
            ));
        }
        valid
    }

    fn export_transcript(&mut self) {
        let transcript = Transcript::new(
            self.orchestrator.country(),
            self.orchestrator.locale(),
            &self.model,
            self.orchestrator.history(),
        );
        self.notice = Some(match self.transcripts.export(&transcript) {
            Ok(path) => Notice::Info(format!("Saved transcript to {}", path.display())),
            Err(err) => {
                tracing::error!(error = %err, "transcript export failed");
                Notice::Info(format!("Could not save transcript: {err:#}"))
            }
        });
    }

    fn chip_listing(&self) -> String {
        self.orchestrator
            .suggestion_chips()
            .iter()
            .enumerate()
            .map(|(i, chip)| format!("/chip {} {}", i + 1, chip.label))
            .collect::<Vec<_>>()
            .join("   ")
    }

    fn busy_message(&self) -> &'static str {
        match self.orchestrator.locale() {
            Locale::English => "Please wait for the current reply.",
            Locale::Swahili => "Tafadhali subiri jibu la sasa.",
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

impl Widget for &ConversationManager {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let orchestrator = &self.orchestrator;
        let status = StatusView {
            locale: orchestrator.locale(),
            is_loading: orchestrator.is_loading(),
            is_analyzing: orchestrator.is_analyzing(),
            is_listening: self.voice.is_listening(),
            show_safety_warning: orchestrator.show_safety_warning(),
            attachment: orchestrator.pending_attachment(),
            notice: self.notice.as_ref(),
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(5),
                Constraint::Length(status.height().min(6)),
                Constraint::Length(3),
            ])
            .split(area);

        render_header(self, chunks[0], buf);

        let title = format!("💬 {} | {}", orchestrator.country(), orchestrator.motto());
        self.history
            .view(orchestrator.history(), self.voice.speaking_message_index())
            .title(&title)
            .render(chunks[1], buf);

        status.render(chunks[2], buf);
        self.composer.render(chunks[3], buf);

        if self.show_help {
            render_help(area, buf);
        }
    }
}

fn render_header(manager: &ConversationManager, area: Rect, buf: &mut Buffer) {
    let orchestrator = &manager.orchestrator;
    let title = Line::from(vec![
        Span::styled(
            "⚖ SheriaSense ",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{} law", orchestrator.country()),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("  [{}] [{}] [{}]", orchestrator.locale().display_name(), orchestrator.mode(), manager.model),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    buf.set_line(area.x, area.y, &title, area.width);

    let mut chips = Vec::new();
    for (i, chip) in orchestrator.suggestion_chips().iter().enumerate() {
        chips.push(Span::styled(format!("F{}", i + 1), Style::default().fg(Color::Black).bg(Color::Cyan)));
        chips.push(Span::styled(format!(" {}  ", chip.label), Style::default().fg(Color::Cyan)));
    }
    if area.height > 1 {
        buf.set_line(area.x, area.y + 1, &Line::from(chips), area.width);
    }
}

fn render_help(area: Rect, buf: &mut Buffer) {
    let width = area.width.saturating_sub(4).min(90);
    let height = area.height.saturating_sub(2).min(20);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };

    let mut lines: Vec<Line> = get_help_text().lines().map(|l| Line::from(l.to_string())).collect();
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Enter send | Shift+Enter newline | F1-F4 suggestions | PgUp/PgDn scroll | Ctrl+C quit",
        Style::default().fg(Color::DarkGray),
    )));

    Clear.render(popup, buf);
    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Help (any key to close)"))
        .render(popup, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSeeding;
    use crate::events::ChatMode;
    use crate::persona::Persona;
    use crate::session::SessionManager;
    use crate::session::testing::ScriptedBackend;
    use crate::voice::{SpeechRecognizer, SpeechSynthesizer};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    async fn manager(backend: Arc<ScriptedBackend>, dir: &TempDir) -> ConversationManager {
        manager_with_voice(backend, dir, VoiceController::new(None, None, None)).await
    }

    async fn manager_with_voice(
        backend: Arc<ScriptedBackend>,
        dir: &TempDir,
        voice: VoiceController,
    ) -> ConversationManager {
        let mut session = SessionManager::new(backend, Persona::default(), SessionSeeding::default());
        session.reset_session();
        let session = Arc::new(Mutex::new(session));
        let orchestrator = MessageOrchestrator::new(session, ChatMode::General, Locale::English).await;
        ConversationManager::new(orchestrator, voice, TranscriptStore::new(dir.path()), "gemini-test")
    }

    async fn run_command(manager: &mut ConversationManager, input: &str) -> ConversationAction {
        manager.composer.set_content(input);
        manager
            .handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
            .await
            .unwrap()
    }

    async fn wait_for_reply(manager: &mut ConversationManager) {
        for _ in 0..100 {
            manager.tick();
            if !manager.orchestrator.is_loading() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("reply never arrived");
    }

    #[tokio::test]
    async fn test_submit_round_trip_through_task() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_reply("You have the right to remain silent.");
        let dir = TempDir::new().unwrap();
        let mut manager = manager(backend, &dir).await;

        run_command(&mut manager, "Nimekamatwa").await;
        assert!(manager.orchestrator.is_loading());
        assert!(manager.composer.content().is_empty());

        wait_for_reply(&mut manager).await;
        let history = manager.orchestrator.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].text, "You have the right to remain silent.");
    }

    #[tokio::test]
    async fn test_rejected_submit_keeps_input() {
        let backend = Arc::new(ScriptedBackend::new());
        let dir = TempDir::new().unwrap();
        let mut manager = manager(backend, &dir).await;

        run_command(&mut manager, "first").await;
        run_command(&mut manager, "second").await;
        assert_eq!(manager.composer.content(), "second");
        assert_eq!(manager.orchestrator.history().len(), 2);
        wait_for_reply(&mut manager).await;
    }

    #[tokio::test]
    async fn test_country_and_language_commands() {
        let backend = Arc::new(ScriptedBackend::new());
        let dir = TempDir::new().unwrap();
        let mut manager = manager(backend, &dir).await;

        run_command(&mut manager, "/country tanzania").await;
        assert_eq!(manager.orchestrator.country(), "Tanzania");
        assert_eq!(manager.orchestrator.history().len(), 1);

        run_command(&mut manager, "/lang").await;
        assert_eq!(manager.orchestrator.locale(), Locale::Swahili);
        run_command(&mut manager, "/lang en").await;
        assert_eq!(manager.orchestrator.locale(), Locale::English);
    }

    #[tokio::test]
    async fn test_missing_voice_engine_notices_once() {
        let backend = Arc::new(ScriptedBackend::new());
        let dir = TempDir::new().unwrap();
        let mut manager = manager(backend, &dir).await;

        run_command(&mut manager, "/speak").await;
        assert_eq!(manager.notice.as_ref(), Some(&Notice::VoiceOutputUnavailable));
        run_command(&mut manager, "/speak").await;
        assert_eq!(manager.notice.as_ref(), None);

        run_command(&mut manager, "/mic").await;
        assert_eq!(manager.notice.as_ref(), Some(&Notice::VoiceInputUnavailable));
    }

    #[tokio::test]
    async fn test_share_and_export() {
        let backend = Arc::new(ScriptedBackend::new());
        let dir = TempDir::new().unwrap();
        let mut manager = manager(backend, &dir).await;

        run_command(&mut manager, "/share 1").await;
        match manager.notice.as_ref() {
            Some(Notice::Info(link)) => assert!(link.starts_with("https://wa.me/?text=From%20SheriaSense")),
            other => panic!("expected share link, got {:?}", other),
        }

        run_command(&mut manager, "/export").await;
        let html_files = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "html"))
            .count();
        assert_eq!(html_files, 1);
    }

    #[tokio::test]
    async fn test_bye_exits() {
        let backend = Arc::new(ScriptedBackend::new());
        let dir = TempDir::new().unwrap();
        let mut manager = manager(backend, &dir).await;
        assert_eq!(run_command(&mut manager, "/bye").await, ConversationAction::Exit);
    }

    #[derive(Default)]
    struct SpeechLog {
        cancels: usize,
        speaking: bool,
    }

    struct RecordingSynth(Arc<std::sync::Mutex<SpeechLog>>);

    impl SpeechSynthesizer for RecordingSynth {
        fn speak(&mut self, _text: &str, _voice: Option<&str>) -> Result<()> {
            self.0.lock().unwrap().speaking = true;
            Ok(())
        }

        fn cancel(&mut self) {
            let mut log = self.0.lock().unwrap();
            log.cancels += 1;
            log.speaking = false;
        }

        fn is_speaking(&mut self) -> bool {
            self.0.lock().unwrap().speaking
        }
    }

    /// Answers each capture in order after its own delay
    struct SlowRecognizer {
        calls: AtomicUsize,
        script: Vec<(u64, &'static str)>,
    }

    #[async_trait]
    impl SpeechRecognizer for SlowRecognizer {
        async fn listen(&self, _language_tag: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay_ms, text) = self.script[call.min(self.script.len() - 1)];
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(text.to_string())
        }
    }

    #[tokio::test]
    async fn test_submit_stops_playback() {
        let backend = Arc::new(ScriptedBackend::new());
        let dir = TempDir::new().unwrap();
        let log = Arc::new(std::sync::Mutex::new(SpeechLog::default()));
        let voice = VoiceController::new(Some(Box::new(RecordingSynth(log.clone()))), None, None);
        let mut manager = manager_with_voice(backend, &dir, voice).await;

        run_command(&mut manager, "/speak").await;
        assert_eq!(manager.voice.speaking_message_index(), Some(0));
        let cancels_before = log.lock().unwrap().cancels;

        run_command(&mut manager, "Polisi wamenikamata").await;
        assert_eq!(manager.voice.speaking_message_index(), None);
        assert!(log.lock().unwrap().cancels > cancels_before);
        assert!(!log.lock().unwrap().speaking);
        wait_for_reply(&mut manager).await;
    }

    #[tokio::test]
    async fn test_restarted_mic_keeps_only_fresh_transcript() {
        let backend = Arc::new(ScriptedBackend::new());
        let dir = TempDir::new().unwrap();
        let recognizer = Arc::new(SlowRecognizer {
            calls: AtomicUsize::new(0),
            script: vec![(100, "stale cancelled capture"), (300, "fresh capture")],
        });
        let voice = VoiceController::new(None, Some(recognizer.clone()), None);
        let mut manager = manager_with_voice(backend, &dir, voice).await;

        run_command(&mut manager, "/mic").await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        run_command(&mut manager, "/mic").await;
        assert!(!manager.voice.is_listening());
        run_command(&mut manager, "/mic").await;
        assert!(manager.voice.is_listening());

        for _ in 0..100 {
            manager.tick();
            if !manager.voice.is_listening() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!manager.voice.is_listening());
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.composer.content(), "fresh capture");
        assert_eq!(manager.orchestrator.input(), "fresh capture");
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/a.pdf"), PathBuf::from("/tmp/a.pdf"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/a.pdf"), home.join("a.pdf"));
        }
    }
}
