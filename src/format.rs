//! Text transforms for displaying, speaking and sharing replies.

use once_cell::sync::Lazy;
use regex::Regex;

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+(.*)$").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\*\s+(.*)$").unwrap());
static MARKUP_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*#]").unwrap());

const SHARE_BASE: &str = "https://wa.me/?text=";
const SHARE_HEADER: &str = "From SheriaSense:\n\n";

/// Convert the markdown subset the model uses into HTML.
///
/// Not idempotent: the output contains no markers but feeding already
/// converted text back in may wrap it again. Apply exactly once per raw
/// message.
pub fn format_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let formatted = HEADING.replace_all(text, "<strong>${1}</strong>");
    let formatted = BOLD.replace_all(&formatted, "<strong>${1}</strong>");
    let formatted = ITALIC.replace_all(&formatted, "<em>${1}</em>");
    let formatted = BULLET.replace_all(&formatted, "• ${1}");
    formatted.replace('\n', "<br>")
}

/// Strip emphasis and heading markers before speaking or sharing.
pub fn clean_text(text: &str) -> String {
    MARKUP_CHARS.replace_all(text, "").into_owned()
}

/// Messaging deep link carrying the cleaned reply.
pub fn share_link(text: &str) -> String {
    let body = format!("{}{}", SHARE_HEADER, clean_text(text));
    format!("{}{}", SHARE_BASE, urlencoding::encode(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_italic_and_newline() {
        assert_eq!(
            format_text("**bold** and *italic*\nnext line"),
            "<strong>bold</strong> and <em>italic</em><br>next line"
        );
    }

    #[test]
    fn test_headings() {
        assert_eq!(format_text("## Your Rights\nbody"), "<strong>Your Rights</strong><br>body");
        assert_eq!(format_text("###### Deep"), "<strong>Deep</strong>");
        assert_eq!(format_text("#hashtag"), "#hashtag");
    }

    #[test]
    fn test_unrecognized_passes_through() {
        assert_eq!(format_text("plain `code` _x_"), "plain `code` _x_");
        assert_eq!(format_text(""), "");
    }

    #[test]
    fn test_bullets() {
        assert_eq!(format_text("Steps:\n* File a report"), "Steps:<br>• File a report");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("## **Rights**\n* one"), " Rights\n one");
    }

    #[test]
    fn test_share_link() {
        let link = share_link("**Hi** there");
        assert_eq!(link, "https://wa.me/?text=From%20SheriaSense%3A%0A%0AHi%20there");
    }
}
