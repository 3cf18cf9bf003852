//! Speech output and input through external programs.
//!
//! Availability is decided once at startup. A missing engine produces a
//! single notice and the feature is a no-op afterwards.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use crate::config::VoiceConfig;
use crate::events::Notice;
use crate::format::clean_text;

const TTS_CANDIDATES: [&str; 3] = ["espeak-ng", "espeak", "say"];

/// Plays text aloud; at most one utterance at a time
pub trait SpeechSynthesizer: Send {
    fn speak(&mut self, text: &str, voice: Option<&str>) -> Result<()>;
    fn cancel(&mut self);
    fn is_speaking(&mut self) -> bool;
}

/// Captures a single final transcript
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn listen(&self, language_tag: &str) -> Result<String>;
}

/// Speaks through `espeak`-style programs: `<program> [-v voice] <text>`
pub struct CommandSynthesizer {
    program: PathBuf,
    child: Option<Child>,
}

impl CommandSynthesizer {
    pub fn new(program: PathBuf) -> Self {
        Self { program, child: None }
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&mut self, text: &str, voice: Option<&str>) -> Result<()> {
        self.cancel();
        let mut command = Command::new(&self.program);
        if let Some(voice) = voice {
            command.arg("-v").arg(voice);
        }
        let child = command
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;
        self.child = Some(child);
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn is_speaking(&mut self) -> bool {
        match self.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => true,
            Some(_) => {
                self.child = None;
                false
            }
            None => false,
        }
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs `<program> <language-tag>` and reads the transcript from stdout
pub struct CommandRecognizer {
    program: PathBuf,
}

impl CommandRecognizer {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    async fn listen(&self, language_tag: &str) -> Result<String> {
        let output = tokio::process::Command::new(&self.program)
            .arg(language_tag)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!("speech recognizer exited with {}", output.status);
        }
        let transcript = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if transcript.is_empty() {
            return Err(anyhow!("speech recognizer returned no transcript"));
        }
        Ok(transcript)
    }
}

/// Locate an executable by name on `PATH`, or check an explicit path.
pub fn find_program(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}

/// Engines found at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceCapabilities {
    pub output: Option<PathBuf>,
    pub input: Option<PathBuf>,
}

impl VoiceCapabilities {
    pub fn detect(config: &VoiceConfig) -> Self {
        let output = match &config.tts_command {
            Some(command) => find_program(command),
            None => TTS_CANDIDATES.iter().find_map(|name| find_program(name)),
        };
        let input = config.stt_command.as_deref().and_then(find_program);
        tracing::debug!(?output, ?input, "voice capabilities detected");
        Self { output, input }
    }
}

/// Result of pressing the microphone toggle
pub enum ListenAction {
    /// Begin a capture; its transcript must be handed back with the same generation
    Start {
        recognizer: Arc<dyn SpeechRecognizer>,
        generation: u64,
    },
    Stopped,
    Unavailable(Option<Notice>),
}

/// Tracks listening and playback state for the chat
pub struct VoiceController {
    synthesizer: Option<Box<dyn SpeechSynthesizer>>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    preferred_voice: Option<String>,
    speaking_message_index: Option<usize>,
    is_listening: bool,
    listen_generation: u64,
    output_notice_shown: bool,
    input_notice_shown: bool,
}

impl VoiceController {
    pub fn new(
        synthesizer: Option<Box<dyn SpeechSynthesizer>>,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        preferred_voice: Option<String>,
    ) -> Self {
        Self {
            synthesizer,
            recognizer,
            preferred_voice,
            speaking_message_index: None,
            is_listening: false,
            listen_generation: 0,
            output_notice_shown: false,
            input_notice_shown: false,
        }
    }

    pub fn from_config(config: &VoiceConfig) -> Self {
        let capabilities = VoiceCapabilities::detect(config);
        let synthesizer = capabilities
            .output
            .map(|p| Box::new(CommandSynthesizer::new(p)) as Box<dyn SpeechSynthesizer>);
        let recognizer = capabilities
            .input
            .map(|p| Arc::new(CommandRecognizer::new(p)) as Arc<dyn SpeechRecognizer>);
        Self::new(synthesizer, recognizer, config.preferred_voice.clone())
    }

    pub fn speaking_message_index(&self) -> Option<usize> {
        self.speaking_message_index
    }

    pub fn is_listening(&self) -> bool {
        self.is_listening
    }

    /// Toggle playback of message `index`. Pressing the same message again stops it.
    pub fn speak(&mut self, index: usize, text: &str) -> Option<Notice> {
        let Some(synthesizer) = self.synthesizer.as_mut() else {
            if self.output_notice_shown {
                return None;
            }
            self.output_notice_shown = true;
            return Some(Notice::VoiceOutputUnavailable);
        };

        if self.speaking_message_index == Some(index) {
            synthesizer.cancel();
            self.speaking_message_index = None;
            return None;
        }

        synthesizer.cancel();
        match synthesizer.speak(&clean_text(text), self.preferred_voice.as_deref()) {
            Ok(()) => {
                self.speaking_message_index = Some(index);
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "speech playback failed");
                self.speaking_message_index = None;
                Some(Notice::Info(format!("Speech playback failed: {err}")))
            }
        }
    }

    /// Stop any playback in progress.
    pub fn stop_speaking(&mut self) {
        if let Some(synthesizer) = self.synthesizer.as_mut() {
            synthesizer.cancel();
        }
        self.speaking_message_index = None;
    }

    /// Clear the playback marker once the utterance has finished.
    pub fn poll(&mut self) {
        if self.speaking_message_index.is_none() {
            return;
        }
        let still_speaking = self
            .synthesizer
            .as_mut()
            .is_some_and(|synthesizer| synthesizer.is_speaking());
        if !still_speaking {
            self.speaking_message_index = None;
        }
    }

    pub fn toggle_listening(&mut self) -> ListenAction {
        let Some(recognizer) = self.recognizer.as_ref() else {
            if self.input_notice_shown {
                return ListenAction::Unavailable(None);
            }
            self.input_notice_shown = true;
            return ListenAction::Unavailable(Some(Notice::VoiceInputUnavailable));
        };

        if self.is_listening {
            self.is_listening = false;
            return ListenAction::Stopped;
        }
        self.is_listening = true;
        self.listen_generation += 1;
        ListenAction::Start {
            recognizer: recognizer.clone(),
            generation: self.listen_generation,
        }
    }

    /// Mark capture `generation` finished. Returns false when that capture was
    /// cancelled or superseded, in which case the transcript should be dropped.
    pub fn finish_listening(&mut self, generation: u64) -> bool {
        if !self.is_listening || generation != self.listen_generation {
            return false;
        }
        self.is_listening = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log {
        spoken: Vec<(String, Option<String>)>,
        cancels: usize,
        speaking: bool,
    }

    struct FakeSynth(Arc<Mutex<Log>>);

    impl SpeechSynthesizer for FakeSynth {
        fn speak(&mut self, text: &str, voice: Option<&str>) -> Result<()> {
            let mut log = self.0.lock().unwrap();
            log.spoken.push((text.to_string(), voice.map(str::to_string)));
            log.speaking = true;
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

    struct FakeRecognizer;

    #[async_trait]
    impl SpeechRecognizer for FakeRecognizer {
        async fn listen(&self, language_tag: &str) -> Result<String> {
            Ok(format!("heard in {language_tag}"))
        }
    }

    fn controller() -> (VoiceController, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let controller = VoiceController::new(
            Some(Box::new(FakeSynth(log.clone()))),
            Some(Arc::new(FakeRecognizer)),
            Some("en-gb".to_string()),
        );
        (controller, log)
    }

    #[test]
    fn test_speak_cleans_text_and_tracks_index() {
        let (mut voice, log) = controller();
        assert!(voice.speak(2, "**Haki** zako").is_none());
        assert_eq!(voice.speaking_message_index(), Some(2));
        let log = log.lock().unwrap();
        assert_eq!(log.spoken, vec![("Haki zako".to_string(), Some("en-gb".to_string()))]);
    }

    #[test]
    fn test_same_index_toggles_off() {
        let (mut voice, log) = controller();
        voice.speak(1, "hello");
        voice.speak(1, "hello");
        assert_eq!(voice.speaking_message_index(), None);
        assert_eq!(log.lock().unwrap().spoken.len(), 1);
    }

    #[test]
    fn test_new_playback_cancels_previous() {
        let (mut voice, log) = controller();
        voice.speak(1, "first");
        let cancels_before = log.lock().unwrap().cancels;
        voice.speak(3, "second");
        assert_eq!(voice.speaking_message_index(), Some(3));
        assert!(log.lock().unwrap().cancels > cancels_before);
    }

    #[test]
    fn test_poll_clears_finished_playback() {
        let (mut voice, log) = controller();
        voice.speak(0, "hello");
        voice.poll();
        assert_eq!(voice.speaking_message_index(), Some(0));
        log.lock().unwrap().speaking = false;
        voice.poll();
        assert_eq!(voice.speaking_message_index(), None);
    }

    #[test]
    fn test_missing_engines_notify_once() {
        let mut voice = VoiceController::new(None, None, None);
        assert_eq!(voice.speak(0, "x"), Some(Notice::VoiceOutputUnavailable));
        assert_eq!(voice.speak(0, "x"), None);

        assert!(matches!(
            voice.toggle_listening(),
            ListenAction::Unavailable(Some(Notice::VoiceInputUnavailable))
        ));
        assert!(matches!(voice.toggle_listening(), ListenAction::Unavailable(None)));
        assert!(!voice.is_listening());
    }

    #[tokio::test]
    async fn test_listening_toggle() {
        let (mut voice, _) = controller();
        let ListenAction::Start { recognizer, generation } = voice.toggle_listening() else {
            panic!("expected listening to start");
        };
        assert!(voice.is_listening());
        assert_eq!(recognizer.listen("sw-KE").await.unwrap(), "heard in sw-KE");
        assert!(voice.finish_listening(generation));
        assert!(!voice.is_listening());

        let ListenAction::Start { generation, .. } = voice.toggle_listening() else {
            panic!("expected listening to start");
        };
        assert!(matches!(voice.toggle_listening(), ListenAction::Stopped));
        assert!(!voice.finish_listening(generation));
    }

    #[test]
    fn test_superseded_capture_is_dropped() {
        let (mut voice, _) = controller();
        let ListenAction::Start { generation: first, .. } = voice.toggle_listening() else {
            panic!("expected listening to start");
        };
        voice.toggle_listening();
        let ListenAction::Start { generation: second, .. } = voice.toggle_listening() else {
            panic!("expected listening to restart");
        };

        assert!(!voice.finish_listening(first));
        assert!(voice.is_listening());
        assert!(voice.finish_listening(second));
        assert!(!voice.is_listening());
    }

    #[test]
    fn test_find_program_explicit_path() {
        assert!(find_program("/definitely/not/here/tts").is_none());
    }
}
