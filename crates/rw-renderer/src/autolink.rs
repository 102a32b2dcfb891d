//! Bare URL, `www.` and email detection in plain text.
//!
//! Each finder is called with the text of an inline run and the offset of a
//! trigger byte (`w` for [`www`], `@` for [`email`], `:` for [`url`]). On a
//! hit it appends the link to `link` and returns a [`Match`] telling the caller
//! how many bytes from `offset` onwards belong to the link, and how many bytes
//! before `offset` (already scanned as plain text) must be taken back.

use rw_buffer::Buffer;

/// Schemes (and scheme-like prefixes) that may be autolinked.
const SAFE_PREFIXES: [&[u8]; 6] = [b"http://", b"https://", b"/", b"#", b"ftp://", b"mailto:"];

/// Autolink detection options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutolinkFlags {
    /// Accept domains without a dot (e.g., `http://localhost`).
    pub short_domains: bool,
}

impl AutolinkFlags {
    pub const SHORT_DOMAINS: Self = Self {
        short_domains: true,
    };
}

/// A located link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Bytes consumed starting at the trigger offset.
    pub len: usize,
    /// Bytes before the trigger offset that are part of the link.
    pub rewind: usize,
}

/// Whether `url` starts with a scheme that is safe to link to.
///
/// The prefix must be followed by at least one alphanumeric byte.
#[must_use]
pub fn is_safe(url: &[u8]) -> bool {
    SAFE_PREFIXES.iter().any(|prefix| {
        url.len() > prefix.len()
            && url[..prefix.len()].eq_ignore_ascii_case(prefix)
            && url[prefix.len()].is_ascii_alphanumeric()
    })
}

/// Trim trailing punctuation and unbalanced closing brackets from a link.
fn delimit(data: &[u8], mut end: usize) -> usize {
    if let Some(lt) = data[..end].iter().position(|&b| b == b'<') {
        end = lt;
    }

    while end > 0 {
        let last = data[end - 1];
        if b"?!.,:".contains(&last) {
            end -= 1;
        } else if last == b';' {
            // Drop a trailing entity such as `&quot;` as a whole.
            let mut start = end - 1;
            while start > 0 && data[start - 1].is_ascii_alphabetic() {
                start -= 1;
            }
            if start > 0 && start < end - 1 && data[start - 1] == b'&' {
                end = start - 1;
            } else {
                end -= 1;
            }
        } else {
            break;
        }
    }

    if end == 0 {
        return 0;
    }

    let close = data[end - 1];
    let open = match close {
        b'"' => b'"',
        b'\'' => b'\'',
        b')' => b'(',
        b']' => b'[',
        b'}' => b'{',
        _ => return end,
    };

    let (mut opening, mut closing) = (0usize, 0usize);
    for &b in &data[..end] {
        if b == open {
            opening += 1;
        } else if b == close {
            closing += 1;
        }
    }
    if opening != closing {
        end -= 1;
    }
    end
}

/// Length of the domain at the start of `data`, or 0 if there is none.
fn check_domain(data: &[u8], allow_short: bool) -> usize {
    if data.first().is_none_or(|b| !b.is_ascii_alphanumeric()) {
        return 0;
    }

    let mut dots = 0;
    let mut i = 1;
    while i + 1 < data.len() {
        let b = data[i];
        if b == b'.' || b == b':' {
            dots += 1;
        } else if !b.is_ascii_alphanumeric() && b != b'-' {
            break;
        }
        i += 1;
    }

    if allow_short || dots > 0 { i } else { 0 }
}

/// Find a `www.` link starting at `offset`.
///
/// The link must start a word: the preceding byte, if any, has to be
/// whitespace or punctuation.
pub fn www(link: &mut Buffer, text: &[u8], offset: usize, _flags: AutolinkFlags) -> Option<Match> {
    if offset > 0 {
        let prev = text[offset - 1];
        if !prev.is_ascii_punctuation() && !prev.is_ascii_whitespace() {
            return None;
        }
    }

    let data = &text[offset..];
    if !data.starts_with(b"www.") {
        return None;
    }

    let mut end = check_domain(data, false);
    if end == 0 {
        return None;
    }
    while end < data.len() && !data[end].is_ascii_whitespace() {
        end += 1;
    }

    let end = delimit(data, end);
    if end == 0 {
        return None;
    }

    link.put(&data[..end]);
    Some(Match { len: end, rewind: 0 })
}

/// Find an email address around the `@` at `offset`.
pub fn email(
    link: &mut Buffer,
    text: &[u8],
    offset: usize,
    _flags: AutolinkFlags,
) -> Option<Match> {
    let rewind = text[..offset]
        .iter()
        .rev()
        .take_while(|&&b| b.is_ascii_alphanumeric() || b".+-_".contains(&b))
        .count();
    if rewind == 0 {
        return None;
    }

    let data = &text[offset..];
    let (mut at_signs, mut dots) = (0, 0);
    let mut end = 0;
    while end < data.len() {
        match data[end] {
            b'@' => at_signs += 1,
            b'.' if end + 1 < data.len() => dots += 1,
            b'-' | b'_' => {}
            b if b.is_ascii_alphanumeric() => {}
            _ => break,
        }
        end += 1;
    }

    if end < 2 || at_signs != 1 || dots == 0 || !data[end - 1].is_ascii_alphabetic() {
        return None;
    }

    let end = delimit(data, end);
    if end == 0 {
        return None;
    }

    link.put(&text[offset - rewind..offset + end]);
    Some(Match { len: end, rewind })
}

/// Find a `scheme://` URL around the `:` at `offset`.
pub fn url(link: &mut Buffer, text: &[u8], offset: usize, flags: AutolinkFlags) -> Option<Match> {
    let data = &text[offset..];
    if data.len() < 4 || data[1] != b'/' || data[2] != b'/' {
        return None;
    }

    let rewind = text[..offset]
        .iter()
        .rev()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if !is_safe(&text[offset - rewind..]) {
        return None;
    }

    let scheme_end = b"://".len();
    let domain = check_domain(&data[scheme_end..], flags.short_domains);
    if domain == 0 {
        return None;
    }

    let mut end = scheme_end + domain;
    while end < data.len() && !data[end].is_ascii_whitespace() {
        end += 1;
    }

    let end = delimit(data, end);
    if end == 0 {
        return None;
    }

    link.put(&text[offset - rewind..offset + end]);
    Some(Match { len: end, rewind })
}
