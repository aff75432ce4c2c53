//! Outgoing message text.

use std::borrow::Cow;

/// Longest message body sent as-is, in characters.
///
/// Leaves room for the `...` marker under the platform's 2000-character cap.
pub const MAX_MESSAGE_LENGTH: usize = 1996;

const ELLIPSIS: &str = "...";

/// Cuts `text` to [`MAX_MESSAGE_LENGTH`] characters, marking the cut with `...`.
pub fn truncate_message(text: &str) -> Cow<'_, str> {
    truncate_to(text, MAX_MESSAGE_LENGTH)
}

/// Cuts `text` to `limit` characters, marking the cut with `...`.
///
/// Text within the limit is returned unchanged and unallocated.
pub fn truncate_to(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + ELLIPSIS.len());
            truncated.push_str(&text[..cut]);
            truncated.push_str(ELLIPSIS);
            Cow::Owned(truncated)
        }
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_borrowed() {
        assert!(matches!(truncate_message("hello"), Cow::Borrowed("hello")));

        let exact = "a".repeat(MAX_MESSAGE_LENGTH);
        assert_eq!(truncate_message(&exact), exact.as_str());
    }

    #[test]
    fn test_long_text_gets_marker() {
        let long = "a".repeat(MAX_MESSAGE_LENGTH + 10);
        let truncated = truncate_message(&long);

        assert_eq!(truncated.chars().count(), MAX_MESSAGE_LENGTH + 3);
        assert!(truncated.ends_with("a..."));
    }

    #[test]
    fn test_cut_respects_char_boundaries() {
        assert_eq!(truncate_to("héllo wörld", 4), "héll...");
        assert_eq!(truncate_to("⚡⚡⚡", 2), "⚡⚡...");
    }
}
