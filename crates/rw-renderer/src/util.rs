//! Shared helpers for markdown rendering.

use pulldown_cmark::HeadingLevel;

/// Convert heading level enum to number (1-6).
#[must_use]
pub(crate) fn heading_level_to_num(level: HeadingLevel) -> u32 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Language tag of a fenced code block: the first word of its info string.
pub(crate) fn fence_language(info: &str) -> Option<&str> {
    info.split_whitespace().next()
}

/// `data` without trailing `\n` bytes.
pub(crate) fn trim_trailing_newlines(data: &[u8]) -> &[u8] {
    let end = data.len() - data.iter().rev().take_while(|&&b| b == b'\n').count();
    &data[..end]
}
