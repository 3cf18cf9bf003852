use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::time::Duration;

use crate::ui::conversation::{ConversationAction, ConversationManager};

const FRAME_POLL: Duration = Duration::from_millis(33);

/// Full-screen chat. The terminal is restored even when the loop fails.
pub async fn run_tui(mut manager: ConversationManager) -> Result<()> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &mut manager).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!(
        messages = manager.orchestrator().history().len(),
        "chat closed"
    );
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    manager: &mut ConversationManager,
) -> Result<()> {
    loop {
        manager.tick();
        terminal.draw(|frame| frame.render_widget(&*manager, frame.size()))?;

        if !event::poll(FRAME_POLL)? {
            // Let spawned dispatch and capture tasks make progress.
            tokio::task::yield_now().await;
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if manager.handle_key(key).await? == ConversationAction::Exit {
                return Ok(());
            }
        }
    }
}
