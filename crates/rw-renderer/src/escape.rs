//! Escaping for markup bodies and attribute values.
//!
//! Both functions are total over arbitrary bytes: untrusted document text is
//! neutralized, never rejected.

use percent_encoding::{AsciiSet, CONTROLS, percent_encode};
use rw_buffer::Buffer;

/// Entities indexed by [`HTML_ESCAPE`] class.
const HTML_ENTITIES: [&str; 6] = ["", "&quot;", "&amp;", "&#39;", "&lt;", "&gt;"];

/// Class of `'`, only escaped in secure mode.
const APOSTROPHE: u8 = 3;

/// Escape class per byte: 0 copies the byte, otherwise an index into
/// [`HTML_ENTITIES`].
const HTML_ESCAPE: [u8; 256] = {
    let mut table = [0u8; 256];
    table[b'"' as usize] = 1;
    table[b'&' as usize] = 2;
    table[b'\'' as usize] = APOSTROPHE;
    table[b'<' as usize] = 4;
    table[b'>' as usize] = 5;
    table
};

/// Bytes that cannot appear raw inside a double-quoted `href`.
///
/// Unreserved characters and the reserved delimiters `!#$%()*+,/:;=?@[]` stay
/// as they are; `&` and `'` are entity-escaped separately. Everything else,
/// including all non-ASCII bytes, is percent-encoded.
const HREF_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Append `src` escaped for an HTML body or a quoted attribute value.
///
/// `&`, `<`, `>` and `"` are always replaced; `'` only when `secure` is set.
/// All other bytes, including multi-byte UTF-8 sequences, are copied.
pub fn escape_html(ob: &mut Buffer, src: &[u8], secure: bool) {
    let mut start = 0;
    for (i, &byte) in src.iter().enumerate() {
        let class = HTML_ESCAPE[usize::from(byte)];
        if class == 0 || (class == APOSTROPHE && !secure) {
            continue;
        }
        ob.put(&src[start..i]);
        ob.puts(HTML_ENTITIES[usize::from(class)]);
        start = i + 1;
    }
    ob.put(&src[start..]);
}

/// Append `src` escaped for an `href` or `src` attribute.
pub fn escape_href(ob: &mut Buffer, src: &[u8]) {
    for chunk in percent_encode(src, HREF_UNSAFE) {
        let bytes = chunk.as_bytes();
        let mut start = 0;
        for (i, &byte) in bytes.iter().enumerate() {
            let entity = match byte {
                b'&' => "&amp;",
                b'\'' => "&#x27;",
                _ => continue,
            };
            ob.put(&bytes[start..i]);
            ob.puts(entity);
            start = i + 1;
        }
        ob.put(&bytes[start..]);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn html(src: &str, secure: bool) -> String {
        let mut ob = Buffer::new(16);
        escape_html(&mut ob, src.as_bytes(), secure);
        String::from_utf8(ob.to_vec()).unwrap()
    }

    fn href(src: &[u8]) -> String {
        let mut ob = Buffer::new(16);
        escape_href(&mut ob, src);
        String::from_utf8(ob.to_vec()).unwrap()
    }

    /// Whether every `&` in `s` starts one of the entities we emit.
    fn ampersands_are_entities(s: &str) -> bool {
        s.match_indices('&').all(|(i, _)| {
            ["&amp;", "&lt;", "&gt;", "&quot;", "&#39;", "&#x27;"]
                .iter()
                .any(|e| s[i..].starts_with(e))
        })
    }

    #[test]
    fn test_escape_html_specials() {
        assert_eq!(
            html(r#"<a href="x">Tom & 'Jerry'</a>"#, false),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; 'Jerry'&lt;/a&gt;"
        );
    }

    #[test]
    fn test_escape_html_secure_apostrophe() {
        assert_eq!(html("it's", true), "it&#39;s");
        assert_eq!(html("it's", false), "it's");
    }

    #[test]
    fn test_escape_html_keeps_utf8() {
        assert_eq!(html("café → naïve", false), "café → naïve");
    }

    #[test]
    fn test_escape_html_empty() {
        assert_eq!(html("", false), "");
    }

    #[test]
    fn test_escape_href_keeps_url_syntax() {
        assert_eq!(
            href(b"https://example.com/a/b?q=1#frag"),
            "https://example.com/a/b?q=1#frag"
        );
        assert_eq!(href(b"/path(1)[2];x=@y"), "/path(1)[2];x=@y");
    }

    #[test]
    fn test_escape_href_entities() {
        assert_eq!(href(b"/?a=1&b='2'"), "/?a=1&amp;b=&#x27;2&#x27;");
    }

    #[test]
    fn test_escape_href_percent_encodes() {
        assert_eq!(href(b"a b\"c<d>"), "a%20b%22c%3Cd%3E");
        assert_eq!(href(b"\x01\x7f"), "%01%7F");
        assert_eq!(href("é".as_bytes()), "%C3%A9");
    }

    #[test]
    fn test_escape_href_keeps_existing_escapes() {
        assert_eq!(href(b"a%20b"), "a%20b");
    }

    proptest! {
        #[test]
        fn prop_escape_html_neutralizes_markup(src in any::<Vec<u8>>(), secure in any::<bool>()) {
            let mut ob = Buffer::new(32);
            escape_html(&mut ob, &src, secure);
            let out = String::from_utf8_lossy(&ob);
            prop_assert!(!out.contains('<'));
            prop_assert!(!out.contains('>'));
            prop_assert!(!out.contains('"'));
            prop_assert!(ampersands_are_entities(&out));
        }

        #[test]
        fn prop_escape_href_neutralizes_markup(src in any::<Vec<u8>>()) {
            let mut ob = Buffer::new(32);
            escape_href(&mut ob, &src);
            prop_assert!(ob.iter().all(|&b| b.is_ascii_graphic()));
            let out = String::from_utf8_lossy(&ob);
            prop_assert!(!out.contains('<'));
            prop_assert!(!out.contains('>'));
            prop_assert!(!out.contains('"'));
            prop_assert!(ampersands_are_entities(&out));
        }
    }
}
