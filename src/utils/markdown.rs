//! Text helpers for Telegram formatting.
//!
//! Replies from command handlers use MarkdownV2, which needs every reserved
//! character escaped. Broadcast bodies are sent as HTML and escaped with
//! `teloxide::utils::html` where user data is interpolated.

const MARKDOWN_V2_RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Characters people use to decorate chat titles (`*INACTIVE*`, `_old_`).
const TITLE_MARKUP: &[char] = &['*', '_', '~', '`'];

/// Escapes markdown special characters for MarkdownV2 parsing mode
///
/// # Example
/// ```
/// use referral_bot::utils::markdown::escape_markdown;
///
/// let escaped = escape_markdown("Reminder #3 (daily)");
/// assert_eq!(escaped, "Reminder \\#3 \\(daily\\)");
/// ```
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Removes decoration characters and normalizes case so titles can be
/// compared against plain keywords.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|ch| !TITLE_MARKUP.contains(ch))
        .collect::<String>()
        .trim()
        .to_uppercase()
}
