use crate::events::Locale;
use crate::ui::conversation::commands::{
    CommandEntry, ParsedCommand, command_entries, parse_slash_command,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    /// Enter pressed on plain text. The buffer is left intact; the caller
    /// clears it once the submission is accepted.
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// Editable text with a cursor counted in chars
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor_position: usize,
}

impl TextAreaState {
    fn byte_index(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor_position)
            .map_or(self.content.len(), |(i, _)| i)
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Single input box for questions and slash commands
pub struct ConversationComposer {
    state: TextAreaState,
    locale: Locale,
    has_focus: bool,
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(locale: Locale) -> Self {
        Self {
            state: TextAreaState::default(),
            locale,
            has_focus: true,
            command_entries: command_entries(),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.insert_char('\n');
                } else if self.show_command_palette && self.apply_selected_command() {
                    return ComposerResult::None;
                } else if let Some(command) = parse_slash_command(&self.state.content) {
                    self.clear();
                    return ComposerResult::Command(command);
                } else {
                    self.close_command_palette();
                    return ComposerResult::Submitted(self.state.content.clone());
                }
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Esc if self.show_command_palette => self.close_command_palette(),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command();
            }
            KeyCode::Char(c) => {
                self.insert_char(c);

                if self.show_command_palette {
                    if !self.state.content.starts_with('/') || c.is_whitespace() {
                        self.close_command_palette();
                    } else {
                        self.refresh_command_palette();
                    }
                } else if self.state.content == "/" {
                    self.open_command_palette();
                }
            }
            KeyCode::Backspace => {
                if self.backspace() {
                    self.sync_palette();
                }
            }
            KeyCode::Delete => {
                if self.delete() {
                    self.sync_palette();
                }
            }
            KeyCode::Left => {
                self.state.cursor_position = self.state.cursor_position.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.state.cursor_position < self.state.char_len() {
                    self.state.cursor_position += 1;
                }
            }
            KeyCode::Home => self.state.cursor_position = 0,
            KeyCode::End => self.state.cursor_position = self.state.char_len(),
            _ => {}
        }

        ComposerResult::None
    }

    fn insert_char(&mut self, c: char) {
        let at = self.state.byte_index();
        self.state.content.insert(at, c);
        self.state.cursor_position += 1;
    }

    /// Delete character before cursor
    fn backspace(&mut self) -> bool {
        if self.state.cursor_position == 0 {
            return false;
        }
        self.state.cursor_position -= 1;
        let at = self.state.byte_index();
        self.state.content.remove(at);
        true
    }

    /// Delete character at cursor
    fn delete(&mut self) -> bool {
        if self.state.cursor_position >= self.state.char_len() {
            return false;
        }
        let at = self.state.byte_index();
        self.state.content.remove(at);
        true
    }

    fn sync_palette(&mut self) {
        if !self.show_command_palette {
            return;
        }
        if self.state.content.starts_with('/') {
            self.refresh_command_palette();
        } else {
            self.close_command_palette();
        }
    }

    fn open_command_palette(&mut self) {
        self.show_command_palette = true;
        self.selected_command = Some(0);
        self.refresh_command_palette();
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self) {
        let query = self.state.content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        self.selected_command = if self.filtered_commands.is_empty() {
            None
        } else {
            let index = self.selected_command.unwrap_or(0);
            Some(index.min(self.filtered_commands.len() - 1))
        };
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let len = self.filtered_commands.len() as isize;
        let current = self.selected_command.unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len);
        self.selected_command = Some(next as usize);
    }

    fn apply_selected_command(&mut self) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index))
            .copied()
        else {
            return false;
        };

        self.set_content(format!("/{} ", entry.keyword));
        self.close_command_palette();
        true
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
    }

    #[cfg(test)]
    pub fn content(&self) -> &str {
        &self.state.content
    }

    /// Replace the buffer, leaving the cursor at the end
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.state.content = content.into();
        self.state.cursor_position = self.state.char_len();
    }

    pub fn clear(&mut self) {
        self.state = TextAreaState::default();
        self.close_command_palette();
    }

    fn title(&self) -> &'static str {
        match self.locale {
            Locale::English => "✍ Ask a legal question",
            Locale::Swahili => "✍ Uliza swali la kisheria",
        }
    }

    fn placeholder(&self) -> &'static str {
        match self.locale {
            Locale::English => "Type your question, or / for commands...",
            Locale::Swahili => "Andika swali lako, au / kwa amri...",
        }
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.state.content.is_empty() {
            let placeholder = Line::from(Span::styled(
                self.placeholder(),
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner_area.x, inner_area.y, &placeholder, inner_area.width);
        } else {
            let mut content = self.state.content.clone();
            if self.has_focus {
                content.insert(self.state.byte_index(), '▌');
            }

            // Keep the line holding the cursor visible.
            let lines: Vec<&str> = content.split('\n').collect();
            let height = inner_area.height as usize;
            let start = lines.len().saturating_sub(height);
            for (i, line_text) in lines[start..].iter().enumerate() {
                let line = Line::from(Span::raw(*line_text));
                buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
            }
        }

        if self.show_command_palette && !self.filtered_commands.is_empty() {
            let palette_height = (self.filtered_commands.len().min(8) + 2) as u16;
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height.min(area.y),
            };
            if palette_area.height < 3 {
                return;
            }

            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            ratatui::widgets::Clear.render(palette_area, buf);
            block.render(palette_area, buf);

            // Scroll the list so the selection stays in view.
            let visible = inner.height as usize;
            let selected = self.selected_command.unwrap_or(0);
            let offset = (selected + 1).saturating_sub(visible);

            for (row, (index, entry)) in self
                .filtered_commands
                .iter()
                .enumerate()
                .skip(offset)
                .take(visible)
                .enumerate()
            {
                let style = if self.selected_command == Some(index) {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled(" - ", Style::default().fg(Color::DarkGray)),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);
                buf.set_line(inner.x, inner.y + row as u16, &line, inner.width);
            }
        }
    }
}
