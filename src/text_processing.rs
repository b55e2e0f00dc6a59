//! # Text Processing Module
//!
//! Helpers for embedding arbitrary text in Telegram MarkdownV2 messages.
//!
//! Telegram rejects a MarkdownV2 body outright when a reserved character is
//! left unescaped, so every variable field of an outgoing message goes through
//! [`escape_markdown_v2`] exactly once, right before the message is composed.
//! Escaping an already escaped string doubles the backslashes.

/// Characters reserved by MarkdownV2 outside of entities, plus the escape marker itself
pub const MARKDOWN_V2_RESERVED: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escape marker prefixed to each reserved character
pub const ESCAPE_MARKER: char = '\\';

/// Returns `true` if `c` must be escaped in MarkdownV2 text
pub fn is_reserved(c: char) -> bool {
    MARKDOWN_V2_RESERVED.contains(&c)
}

/// Escape text for MarkdownV2.
///
/// Every reserved character gets exactly one [`ESCAPE_MARKER`] in front of it.
/// Strings without reserved characters are returned unchanged.
///
/// # Examples
///
/// ```rust
/// use dermabot::text_processing::escape_markdown_v2;
///
/// assert_eq!(escape_markdown_v2("95.00%"), "95\\.00%");
/// assert_eq!(escape_markdown_v2("Melanoma"), "Melanoma");
/// ```
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        if is_reserved(c) {
            escaped.push(ESCAPE_MARKER);
        }
        escaped.push(c);
    }
    escaped
}

/// Inverse of [`escape_markdown_v2`]: drop one marker in front of each reserved character.
///
/// A marker that is not followed by a reserved character is kept as-is.
pub fn unescape_markdown_v2(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ESCAPE_MARKER {
            if let Some(&next) = chars.peek() {
                if is_reserved(next) {
                    unescaped.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        unescaped.push(c);
    }
    unescaped
}
