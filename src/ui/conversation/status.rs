//! Status strip between the history and the composer

use crate::attachment::PendingAttachment;
use crate::events::{Locale, Notice};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot of the transient chat flags for one frame
pub struct StatusView<'a> {
    pub locale: Locale,
    pub is_loading: bool,
    pub is_analyzing: bool,
    pub is_listening: bool,
    pub show_safety_warning: bool,
    pub attachment: Option<&'a PendingAttachment>,
    pub notice: Option<&'a Notice>,
}

impl StatusView<'_> {
    /// Rows needed to show every active indicator
    pub fn height(&self) -> u16 {
        self.lines(u16::MAX).len() as u16
    }

    fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        if self.is_loading {
            let label = match (self.is_analyzing, self.locale) {
                (true, Locale::English) => "📄 Analyzing document",
                (true, Locale::Swahili) => "📄 Inachambua hati",
                (false, Locale::English) => "⚖ SheriaSense is thinking",
                (false, Locale::Swahili) => "⚖ SheriaSense inafikiri",
            };
            lines.push(Line::from(vec![
                Span::styled(label, Style::default().fg(Color::Green)),
                Span::styled(animated_dots(), Style::default().fg(Color::Yellow)),
            ]));
        }

        if self.is_listening {
            let label = match self.locale {
                Locale::English => "🎙 Listening... (/mic to stop)",
                Locale::Swahili => "🎙 Inasikiliza... (/mic kusimamisha)",
            };
            lines.push(Line::from(Span::styled(label, Style::default().fg(Color::Magenta))));
        }

        if self.show_safety_warning {
            let label = match self.locale {
                Locale::English => {
                    "⚠ If you are in danger, call emergency services (999 / 112) or a trusted person now."
                }
                Locale::Swahili => {
                    "⚠ Ukiwa hatarini, piga simu ya dharura (999 / 112) au mtu unayemwamini sasa."
                }
            };
            lines.push(Line::from(Span::styled(
                label,
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
        }

        if let Some(attachment) = self.attachment {
            let kind = if attachment.is_image() { "🖼" } else { "📎" };
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{} {} ({})", kind, attachment.file_name(), human_size(attachment.size())),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled("  /detach to remove", Style::default().fg(Color::DarkGray)),
            ]));
        }

        if let Some(notice) = self.notice {
            let style = if notice.is_error() {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::Cyan)
            };
            // Long notices (share links) wrap by character.
            let text = notice.message();
            let chars: Vec<char> = text.chars().collect();
            let width = width.max(1) as usize;
            for chunk in chars.chunks(width).take(4) {
                lines.push(Line::from(Span::styled(chunk.iter().collect::<String>(), style)));
            }
        }

        lines
    }
}

impl Widget for StatusView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for (i, line) in self.lines(area.width).iter().take(area.height as usize).enumerate() {
            buf.set_line(area.x, area.y + i as u16, line, area.width);
        }
    }
}

fn animated_dots() -> &'static str {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    match (millis / 300) % 4 {
        0 => ".",
        1 => "..",
        2 => "...",
        _ => "   ",
    }
}

fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
