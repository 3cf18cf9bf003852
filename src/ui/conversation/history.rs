//! Conversation history display component

use crate::events::{ChatMessage, ChatRole};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget},
};
use std::cell::Cell;

/// Scroll position of the history pane, counted in lines from the bottom
#[derive(Debug, Default)]
pub struct ConversationHistory {
    scroll_offset: usize,
    max_offset: Cell<usize>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = (self.scroll_offset + lines).min(self.max_offset.get());
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn view<'a>(&'a self, messages: &'a [ChatMessage], speaking: Option<usize>) -> HistoryView<'a> {
        HistoryView {
            history: self,
            messages,
            speaking,
            title: "💬 Conversation",
        }
    }
}

/// Borrowed rendering of the chat entries
pub struct HistoryView<'a> {
    history: &'a ConversationHistory,
    messages: &'a [ChatMessage],
    speaking: Option<usize>,
    title: &'a str,
}

impl<'a> HistoryView<'a> {
    pub fn title(mut self, title: &'a str) -> Self {
        self.title = title;
        self
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title.to_string());

        let inner_area = block.inner(area);
        block.render(area, buf);

        let width = inner_area.width.saturating_sub(3) as usize;
        let mut all_lines: Vec<Line<'static>> = Vec::new();
        for (index, message) in self.messages.iter().enumerate() {
            all_lines.extend(render_message(
                index,
                message,
                self.speaking == Some(index),
                width,
            ));
            all_lines.push(Line::default());
        }

        let height = inner_area.height as usize;
        let total = all_lines.len();
        let max_offset = total.saturating_sub(height);
        self.history.max_offset.set(max_offset);

        let offset = self.history.scroll_offset.min(max_offset);
        let end = total - offset;
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }

        if max_offset > 0 {
            let mut state = ScrollbarState::new(max_offset).position(max_offset - offset);
            Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .render(area, buf, &mut state);
        }
    }
}

/// Header line plus wrapped body for one entry
fn render_message(
    index: usize,
    message: &ChatMessage,
    is_speaking: bool,
    width: usize,
) -> Vec<Line<'static>> {
    let (icon, header_style, body_style) = match message.role {
        ChatRole::User => (
            "👤",
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            Style::default().fg(Color::Blue),
        ),
        ChatRole::Assistant => (
            "⚖",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            Style::default().fg(Color::White),
        ),
    };

    let mut header = vec![
        Span::styled(format!("[{}] ", index + 1), Style::default().fg(Color::DarkGray)),
        Span::styled(format!("{} {}", icon, message.role.label()), header_style),
    ];
    if message.has_attachment {
        header.push(Span::styled(" 📎", Style::default().fg(Color::Yellow)));
    }
    if is_speaking {
        header.push(Span::styled(" 🔊 speaking", Style::default().fg(Color::Magenta)));
    }

    let mut lines = vec![Line::from(header)];
    for raw_line in message.text.split('\n') {
        let words = match message.role {
            ChatRole::User => plain_words(raw_line, body_style),
            ChatRole::Assistant => styled_words(raw_line, body_style),
        };
        lines.extend(wrap_words(words, width));
    }
    lines
}

fn plain_words(line: &str, style: Style) -> Vec<(String, Style)> {
    line.split_whitespace()
        .map(|word| (word.to_string(), style))
        .collect()
}

/// Terminal rendering of the reply markdown: `#` headings and `**bold**`
/// become bold, `* ` bullets become `•`, stray single `*` is dropped.
fn styled_words(line: &str, base: Style) -> Vec<(String, Style)> {
    let bold = base.add_modifier(Modifier::BOLD);
    let trimmed = line.trim_start();

    let heading = trimmed.trim_start_matches('#');
    if heading.len() < trimmed.len() && trimmed.len() - heading.len() <= 6 && heading.starts_with(' ') {
        return plain_words(&heading.replace('*', ""), bold.fg(Color::Cyan));
    }

    let mut words = Vec::new();
    let body = match trimmed.strip_prefix("* ").or_else(|| trimmed.strip_prefix("- ")) {
        Some(rest) => {
            words.push(("•".to_string(), base.fg(Color::Green)));
            rest
        }
        None => trimmed,
    };

    for (segment_index, segment) in body.split("**").enumerate() {
        let style = if segment_index % 2 == 1 { bold } else { base };
        for word in segment.split_whitespace() {
            let word = word.replace('*', "");
            if !word.is_empty() {
                words.push((word, style));
            }
        }
    }
    words
}

/// Greedy word wrap that keeps each word's style
fn wrap_words(words: Vec<(String, Style)>, width: usize) -> Vec<Line<'static>> {
    const INDENT: &str = "  ";

    if words.is_empty() {
        return vec![Line::default()];
    }

    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = vec![Span::raw(INDENT)];
    let mut current_width = 0usize;

    for (word, style) in words {
        let word_width = word.chars().count();
        if current_width > 0 && width > 0 && current_width + 1 + word_width > width {
            lines.push(Line::from(std::mem::replace(&mut current, vec![Span::raw(INDENT)])));
            current_width = 0;
        }
        if current_width > 0 {
            current.push(Span::raw(" "));
            current_width += 1;
        }
        current_width += word_width;
        current.push(Span::styled(word, style));
    }

    lines.push(Line::from(current));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn test_bold_segments_keep_style() {
        let words = styled_words("You have **the right** to bail", Style::default());
        let bold: Vec<_> = words
            .iter()
            .filter(|(_, style)| style.add_modifier.contains(Modifier::BOLD))
            .map(|(word, _)| word.as_str())
            .collect();
        assert_eq!(bold, vec!["the", "right"]);
    }

    #[test]
    fn test_heading_and_bullet() {
        let heading = styled_words("## Your Rights", Style::default());
        assert_eq!(heading[0].0, "Your");
        assert!(heading[0].1.add_modifier.contains(Modifier::BOLD));

        let bullet = styled_words("* File a report", Style::default());
        assert_eq!(bullet[0].0, "•");
        assert_eq!(bullet[1].0, "File");
    }

    #[test]
    fn test_wrap_respects_width() {
        let words = plain_words("one two three four", Style::default());
        let lines = wrap_words(words, 9);
        let texts: Vec<_> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["  one two", "  three", "  four"]);
    }

    #[test]
    fn test_header_marks_attachment_and_speech() {
        let message = ChatMessage::user("see file", true);
        let lines = render_message(2, &message, true, 40);
        let header = line_text(&lines[0]);
        assert!(header.starts_with("[3] 👤 You"));
        assert!(header.contains("📎"));
        assert!(header.contains("speaking"));
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut history = ConversationHistory::new();
        history.max_offset.set(4);
        history.scroll_up(10);
        assert_eq!(history.scroll_offset, 4);
        history.scroll_down(1);
        assert_eq!(history.scroll_offset, 3);
        history.scroll_to_bottom();
        assert_eq!(history.scroll_offset, 0);
    }
}
