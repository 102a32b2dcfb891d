//! HTML and XHTML backend.
//!
//! [`renderer`] builds a capability table that writes HTML fragments: every
//! block starts on a fresh line, text is escaped, and headings up to the
//! configured nesting level get `toc_N` anchors that match the entries
//! produced by [`crate::toc`].

use rw_buffer::Buffer;

use crate::callbacks::{Callbacks, Renderer};
use crate::escape::{escape_href, escape_html};
use crate::flags::{Alignment, AutolinkType, HtmlFlags, ListFlags, TableFlags};
use crate::state::HtmlState;
use crate::util::trim_trailing_newlines;

/// Result of matching raw markup against a tag name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HtmlTag {
    None,
    Open,
    Close,
}

/// Check whether `data` starts with an opening or closing `tagname` tag.
///
/// The name must be followed by whitespace or `>`, so `<b>` matches `b` but
/// `<br>` does not.
///
/// ```
/// use rw_renderer::{HtmlTag, is_tag};
///
/// assert_eq!(is_tag(b"<div class=\"x\">", "div"), HtmlTag::Open);
/// assert_eq!(is_tag(b"</div>", "div"), HtmlTag::Close);
/// assert_eq!(is_tag(b"<divider>", "div"), HtmlTag::None);
/// ```
#[must_use]
pub fn is_tag(data: &[u8], tagname: &str) -> HtmlTag {
    if data.len() < 3 || data[0] != b'<' {
        return HtmlTag::None;
    }

    let closed = data[1] == b'/';
    let mut i = if closed { 2 } else { 1 };
    for &expected in tagname.as_bytes() {
        if i == data.len() {
            break;
        }
        if data[i] != expected {
            return HtmlTag::None;
        }
        i += 1;
    }

    if i == data.len() {
        return HtmlTag::None;
    }
    if data[i].is_ascii_whitespace() || data[i] == b'>' {
        if closed { HtmlTag::Close } else { HtmlTag::Open }
    } else {
        HtmlTag::None
    }
}

/// Create an HTML renderer.
///
/// Headings of level `nesting_level` or shallower get `id="toc_N"`. With
/// [`HtmlFlags::SKIP_HTML`] or [`HtmlFlags::ESCAPE`] the block-HTML slot is
/// left empty so raw blocks never reach the output verbatim.
#[must_use]
pub fn renderer(flags: HtmlFlags, nesting_level: u32) -> Renderer<HtmlState> {
    let mut callbacks = callbacks();
    if flags.intersects(HtmlFlags::SKIP_HTML | HtmlFlags::ESCAPE) {
        callbacks.blockhtml = None;
    }
    tracing::debug!(%flags, nesting_level, "Created HTML renderer");
    Renderer::new(callbacks, HtmlState::new(flags, nesting_level))
}

/// The full HTML capability table.
#[must_use]
pub fn callbacks() -> Callbacks<HtmlState> {
    Callbacks {
        blockcode: Some(blockcode),
        blockquote: Some(blockquote),
        header: Some(header),
        hrule: Some(hrule),
        list: Some(list),
        listitem: Some(listitem),
        paragraph: Some(paragraph),
        table: Some(table),
        table_header: Some(table_header),
        table_body: Some(table_body),
        table_row: Some(table_row),
        table_cell: Some(table_cell),
        footnotes: Some(footnotes),
        footnote_def: Some(footnote_def),
        blockhtml: Some(raw_block),

        autolink: Some(autolink),
        codespan: Some(codespan),
        double_emphasis: Some(double_emphasis),
        emphasis: Some(emphasis),
        underline: Some(underline),
        highlight: Some(highlight),
        quote: Some(quote),
        image: Some(image),
        linebreak: Some(linebreak),
        link: Some(link),
        triple_emphasis: Some(triple_emphasis),
        strikethrough: Some(strikethrough),
        superscript: Some(superscript),
        footnote_ref: Some(footnote_ref),
        math: Some(math),
        raw_html: Some(raw_html),

        normal_text: Some(normal_text),
        ..Callbacks::empty()
    }
}

/// Start a block on a fresh line unless it opens the output.
fn block_start(ob: &mut Buffer) {
    if !ob.is_empty() {
        ob.putc(b'\n');
    }
}

/// Wrap non-empty span content in a tag pair.
fn wrap(ob: &mut Buffer, content: &[u8], open: &str, close: &str) -> bool {
    if content.is_empty() {
        return false;
    }
    ob.puts(open);
    ob.put(content);
    ob.puts(close);
    true
}

/// Close an anchor's opening tag, letting the decorator add attributes.
fn close_anchor(ob: &mut Buffer, link: &[u8], state: &HtmlState) {
    match state.link_attributes {
        Some(decorate) => {
            ob.putc(b'"');
            decorate(ob, link, state);
            ob.putc(b'>');
        }
        None => ob.puts("\">"),
    }
}

// Block-level

fn blockcode(ob: &mut Buffer, text: &[u8], lang: Option<&[u8]>, _state: &mut HtmlState) {
    block_start(ob);
    match lang {
        Some(lang) => {
            ob.puts("<pre><code class=\"language-");
            escape_html(ob, lang, false);
            ob.puts("\">");
        }
        None => ob.puts("<pre><code>"),
    }
    escape_html(ob, text, false);
    ob.puts("</code></pre>\n");
}

fn blockquote(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) {
    block_start(ob);
    ob.puts("<blockquote>\n");
    ob.put(content);
    ob.puts("</blockquote>\n");
}

fn header(ob: &mut Buffer, content: &[u8], level: u32, state: &mut HtmlState) {
    block_start(ob);
    if level <= state.toc.nesting_level {
        ob.printf(format_args!(
            "<h{level} id=\"toc_{}\">",
            state.toc.header_count
        ));
        state.toc.header_count += 1;
    } else {
        ob.printf(format_args!("<h{level}>"));
    }
    ob.put(content);
    ob.printf(format_args!("</h{level}>\n"));
}

fn hrule(ob: &mut Buffer, state: &mut HtmlState) {
    block_start(ob);
    ob.puts(if state.use_xhtml() { "<hr/>\n" } else { "<hr>\n" });
}

fn list(ob: &mut Buffer, content: &[u8], flags: ListFlags, _state: &mut HtmlState) {
    block_start(ob);
    let ordered = flags.contains(ListFlags::ORDERED);
    ob.puts(if ordered { "<ol>\n" } else { "<ul>\n" });
    ob.put(content);
    ob.puts(if ordered { "</ol>\n" } else { "</ul>\n" });
}

fn listitem(ob: &mut Buffer, content: &[u8], _flags: ListFlags, _state: &mut HtmlState) {
    ob.puts("<li>");
    ob.put(trim_trailing_newlines(content));
    ob.puts("</li>\n");
}

fn paragraph(ob: &mut Buffer, content: &[u8], state: &mut HtmlState) {
    let Some(start) = content.iter().position(|b| !b.is_ascii_whitespace()) else {
        return;
    };

    block_start(ob);
    ob.puts("<p>");
    if state.flags.contains(HtmlFlags::HARD_WRAP) {
        let mut i = start;
        while i < content.len() {
            let line = i;
            while i < content.len() && content[i] != b'\n' {
                i += 1;
            }
            ob.put(&content[line..i]);

            // No break for a newline ending the paragraph.
            if i + 1 >= content.len() {
                break;
            }
            linebreak(ob, state);
            i += 1;
        }
    } else {
        ob.put(&content[start..]);
    }
    ob.puts("</p>\n");
}

fn raw_block(ob: &mut Buffer, text: &[u8], _state: &mut HtmlState) {
    let text = trim_trailing_newlines(text);
    let start = text.iter().take_while(|&&b| b == b'\n').count();
    if start == text.len() {
        return;
    }

    block_start(ob);
    ob.put(&text[start..]);
    ob.putc(b'\n');
}

fn table(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) {
    block_start(ob);
    ob.puts("<table>\n");
    ob.put(content);
    ob.puts("</table>\n");
}

fn table_header(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) {
    block_start(ob);
    ob.puts("<thead>\n");
    ob.put(content);
    ob.puts("</thead>\n");
}

fn table_body(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) {
    block_start(ob);
    ob.puts("<tbody>\n");
    ob.put(content);
    ob.puts("</tbody>\n");
}

fn table_row(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) {
    ob.puts("<tr>\n");
    ob.put(content);
    ob.puts("</tr>\n");
}

fn table_cell(ob: &mut Buffer, content: &[u8], flags: TableFlags, _state: &mut HtmlState) {
    let tag = if flags.is_header() { "th" } else { "td" };
    ob.putc(b'<');
    ob.puts(tag);
    match flags.alignment() {
        Alignment::Center => ob.puts(" style=\"text-align: center\">"),
        Alignment::Left => ob.puts(" style=\"text-align: left\">"),
        Alignment::Right => ob.puts(" style=\"text-align: right\">"),
        Alignment::None => ob.putc(b'>'),
    }
    ob.put(content);
    ob.puts("</");
    ob.puts(tag);
    ob.puts(">\n");
}

fn footnotes(ob: &mut Buffer, content: &[u8], state: &mut HtmlState) {
    block_start(ob);
    ob.puts("<div class=\"footnotes\">\n");
    ob.puts(if state.use_xhtml() { "<hr/>\n" } else { "<hr>\n" });
    ob.puts("<ol>\n");
    ob.put(content);
    ob.puts("\n</ol>\n</div>\n");
}

/// Footnote body with a back-reference spliced before the first `</p>`.
///
/// The close tag is found by a plain byte scan, so a `</p>` inside nested
/// markup also matches.
fn footnote_def(ob: &mut Buffer, content: &[u8], num: u32, _state: &mut HtmlState) {
    let close = content
        .windows(4)
        .position(|window| window.eq_ignore_ascii_case(b"</p>"));

    ob.printf(format_args!("\n<li id=\"fn{num}\">\n"));
    match close {
        Some(i) => {
            ob.put(&content[..i]);
            ob.printf(format_args!(
                "&nbsp;<a href=\"#fnref{num}\" rev=\"footnote\">&#8617;</a>"
            ));
            ob.put(&content[i..]);
        }
        None => ob.put(content),
    }
    ob.puts("</li>\n");
}

// Span-level

fn autolink(ob: &mut Buffer, link: &[u8], kind: AutolinkType, state: &mut HtmlState) -> bool {
    if link.is_empty() {
        return false;
    }

    ob.puts("<a href=\"");
    if kind == AutolinkType::Email {
        ob.puts("mailto:");
    }
    escape_href(ob, link);
    close_anchor(ob, link, state);

    // Show `mailto:me@example.com` as the bare address.
    let text = link.strip_prefix(b"mailto:").unwrap_or(link);
    escape_html(ob, text, false);
    ob.puts("</a>");
    true
}

pub(crate) fn codespan(ob: &mut Buffer, text: &[u8], _state: &mut HtmlState) -> bool {
    ob.puts("<code>");
    escape_html(ob, text, false);
    ob.puts("</code>");
    true
}

pub(crate) fn double_emphasis(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) -> bool {
    wrap(ob, content, "<strong>", "</strong>")
}

pub(crate) fn emphasis(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) -> bool {
    wrap(ob, content, "<em>", "</em>")
}

pub(crate) fn underline(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) -> bool {
    wrap(ob, content, "<u>", "</u>")
}

pub(crate) fn highlight(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) -> bool {
    wrap(ob, content, "<mark>", "</mark>")
}

pub(crate) fn quote(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) -> bool {
    wrap(ob, content, "<q>", "</q>")
}

pub(crate) fn triple_emphasis(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) -> bool {
    wrap(ob, content, "<strong><em>", "</em></strong>")
}

pub(crate) fn strikethrough(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) -> bool {
    wrap(ob, content, "<del>", "</del>")
}

pub(crate) fn superscript(ob: &mut Buffer, content: &[u8], _state: &mut HtmlState) -> bool {
    wrap(ob, content, "<sup>", "</sup>")
}

fn image(ob: &mut Buffer, link: &[u8], title: &[u8], alt: &[u8], state: &mut HtmlState) -> bool {
    if link.is_empty() {
        return false;
    }

    ob.puts("<img src=\"");
    escape_href(ob, link);
    ob.puts("\" alt=\"");
    escape_html(ob, alt, false);
    if !title.is_empty() {
        ob.puts("\" title=\"");
        escape_html(ob, title, false);
    }
    ob.puts(if state.use_xhtml() { "\"/>" } else { "\">" });
    true
}

fn linebreak(ob: &mut Buffer, state: &mut HtmlState) -> bool {
    ob.puts(if state.use_xhtml() { "<br/>\n" } else { "<br>\n" });
    true
}

fn link(ob: &mut Buffer, content: &[u8], link: &[u8], title: &[u8], state: &mut HtmlState) -> bool {
    ob.puts("<a href=\"");
    escape_href(ob, link);
    if !title.is_empty() {
        ob.puts("\" title=\"");
        escape_html(ob, title, false);
    }
    close_anchor(ob, link, state);
    ob.put(content);
    ob.puts("</a>");
    true
}

fn footnote_ref(ob: &mut Buffer, num: u32, _state: &mut HtmlState) -> bool {
    ob.printf(format_args!(
        "<sup id=\"fnref{num}\"><a href=\"#fn{num}\" rel=\"footnote\">{num}</a></sup>"
    ));
    true
}

fn math(ob: &mut Buffer, text: &[u8], display: bool, _state: &mut HtmlState) -> bool {
    ob.puts(if display { "\\[" } else { "\\(" });
    escape_html(ob, text, false);
    ob.puts(if display { "\\]" } else { "\\)" });
    true
}

fn raw_html(ob: &mut Buffer, text: &[u8], state: &mut HtmlState) -> bool {
    if state.flags.contains(HtmlFlags::ESCAPE) {
        tracing::trace!(len = text.len(), "Escaping raw HTML");
        escape_html(ob, text, false);
    } else if state.flags.contains(HtmlFlags::SKIP_HTML) {
        tracing::trace!(len = text.len(), "Skipping raw HTML");
    } else {
        ob.put(text);
    }
    true
}

// Low-level

pub(crate) fn normal_text(ob: &mut Buffer, text: &[u8], _state: &mut HtmlState) {
    escape_html(ob, text, false);
}
