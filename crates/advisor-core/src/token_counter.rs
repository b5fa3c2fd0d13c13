use unicode_segmentation::UnicodeSegmentation;

use crate::message::Message;

/// Rough token estimation: 1 token ≈ 4 characters, plus per-message overhead
pub struct TokenCounter;

impl TokenCounter {
    const CHARS_PER_TOKEN: usize = 4;
    const MESSAGE_OVERHEAD: usize = 10;

    /// User-perceived characters (grapheme clusters)
    pub fn char_count(text: &str) -> usize {
        text.graphemes(true).count()
    }

    pub fn count_text(text: &str) -> usize {
        Self::char_count(text) / Self::CHARS_PER_TOKEN + Self::MESSAGE_OVERHEAD
    }

    pub fn count_messages(messages: &[Message]) -> usize {
        messages.iter().map(|msg| msg.estimate_tokens()).sum()
    }

    /// Longest prefix of `text` holding at most `max_chars` grapheme clusters
    pub fn truncate(text: &str, max_chars: usize) -> &str {
        match text.grapheme_indices(true).nth(max_chars) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_text() {
        // 11 chars / 4 + 10
        assert_eq!(TokenCounter::count_text("Hello world"), 12);
        assert_eq!(TokenCounter::count_text(""), 10);
    }

    #[test]
    fn test_count_messages() {
        let messages = vec![
            Message::user("What is a career roadmap?"),
            Message::assistant("A plan with milestones"),
        ];
        let tokens = TokenCounter::count_messages(&messages);
        assert_eq!(tokens, (25 / 4 + 10) + (22 / 4 + 10));
    }

    #[test]
    fn test_char_count_uses_graphemes() {
        // "e" + combining acute accent is one grapheme
        assert_eq!(TokenCounter::char_count("cafe\u{301}"), 4);
        assert_eq!(TokenCounter::char_count("日本語"), 3);
    }

    #[test]
    fn test_truncate_never_splits_units() {
        assert_eq!(TokenCounter::truncate("日本語テキスト", 3), "日本語");
        assert_eq!(TokenCounter::truncate("cafe\u{301}s", 4), "cafe\u{301}");
        assert_eq!(TokenCounter::truncate("short", 10), "short");
        assert_eq!(TokenCounter::truncate("👩‍💻 dev", 1), "👩‍💻");
    }
}
