mod attachment;
mod config;
mod error;
mod events;
mod format;
mod llm;
mod orchestrator;
mod persona;
mod prompts;
mod session;
mod storage;
mod ui;
mod voice;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio::sync::Mutex;

use crate::attachment::PendingAttachment;
use crate::config::Config;
use crate::events::{ChatMode, Locale};
use crate::llm::GeminiClient;
use crate::orchestrator::MessageOrchestrator;
use crate::persona::{Country, Persona};
use crate::session::SessionManager;
use crate::storage::TranscriptStore;
use crate::ui::conversation::ConversationManager;
use crate::voice::VoiceController;

#[derive(Parser)]
#[command(name = "sheriasense")]
#[command(version = "0.1.0")]
#[command(about = "East African legal guidance chat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Jurisdiction to advise on (Kenya, Uganda, Tanzania)
    #[arg(long, global = true)]
    country: Option<String>,

    /// Reply in Kiswahili
    #[arg(long, global = true)]
    swahili: bool,

    /// Entry point: general, analyze or guide
    #[arg(long, global = true)]
    mode: Option<ChatMode>,

    /// Override the configured model
    #[arg(long, global = true)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Ask a single question and print the reply
    Ask {
        /// Question text; may be omitted when a file is attached
        prompt: Option<String>,
        /// Image or PDF to analyze
        #[arg(long, short)]
        file: Option<PathBuf>,
        /// Print the reply as HTML
        #[arg(long)]
        html: bool,
    },
    /// List the available countries
    Countries,
}

impl Cli {
    /// Flags win over the config file and environment.
    fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(name) = &self.country {
            let Some(country) = Country::find(name) else {
                bail!("Unknown country '{}'. Run `sheriasense countries` to see the options.", name);
            };
            config.ui.default_country = country;
        }
        if self.swahili {
            config.ui.swahili = true;
        }
        if let Some(mode) = self.mode {
            config.ui.mode = mode;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        Ok(())
    }
}

fn init_tracing(config: &Config, interactive: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    if interactive {
        // The alternate screen owns stdout/stderr while the chat is open.
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.log_path())
            .context("Failed to open log file")?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(log_file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

/// Build the shared session; a missing API key stops startup here.
fn build_session(config: &Config) -> Result<Arc<Mutex<SessionManager>>> {
    let client = GeminiClient::new(config).context("Could not start the SheriaSense client")?;
    let persona = Persona::for_country(config.ui.default_country);
    let mut session = SessionManager::new(Arc::new(client), persona, config.seeding);
    session.reset_session();
    Ok(Arc::new(Mutex::new(session)))
}

fn list_countries() {
    println!("⚖ SheriaSense covers:\n");
    for country in Country::iter() {
        println!("  • {:<10} {:<24} {}", country.name(), country.motto(), country.flag_url());
    }
    println!("\nUse --country <name> to choose one.");
}

async fn run_chat(config: Config) -> Result<()> {
    let session = build_session(&config)?;
    let locale = Locale::from_secondary(config.ui.swahili);
    let orchestrator = MessageOrchestrator::new(session, config.ui.mode, locale).await;
    let voice = VoiceController::from_config(&config.voice);
    let transcripts = TranscriptStore::new(config.transcripts_dir());

    let manager = ConversationManager::new(orchestrator, voice, transcripts, config.model.clone());
    ui::run_tui(manager).await
}

async fn run_ask(config: Config, prompt: Option<String>, file: Option<PathBuf>, html: bool) -> Result<()> {
    let attachment = match file {
        Some(path) => Some(
            PendingAttachment::from_path(&path)
                .with_context(|| format!("Cannot attach {}", path.display()))?,
        ),
        None => None,
    };

    let session = build_session(&config)?;
    let locale = Locale::from_secondary(config.ui.swahili);
    let mut orchestrator = MessageOrchestrator::new(session, config.ui.mode, locale).await;

    let prompt = prompt.unwrap_or_default();
    if !orchestrator.submit(&prompt, attachment).await {
        bail!("Nothing to send. Provide a question or --file.");
    }

    if orchestrator.show_safety_warning() {
        eprintln!("⚠ If you are in danger, call emergency services (999 / 112) or a trusted person now.\n");
    }

    let reply = orchestrator
        .history()
        .last()
        .map(|message| message.text.as_str())
        .unwrap_or_default();
    if html {
        println!("{}", format::format_text(reply));
    } else {
        println!("{}", reply);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    cli.apply_to(&mut config)?;

    let interactive = matches!(cli.command, None | Some(Commands::Chat));
    init_tracing(&config, interactive)?;

    match cli.command {
        None | Some(Commands::Chat) => run_chat(config).await,
        Some(Commands::Ask { prompt, file, html }) => run_ask(config, prompt, file, html).await,
        Some(Commands::Countries) => {
            list_countries();
            Ok(())
        }
    }
}
