//! Table-of-contents backend.
//!
//! Renders only headings, as nested `<ul>` lists of `<a href="#toc_N">`
//! anchors numbered like the ids [`crate::html`] puts on headings. Inline
//! formatting inside headings is kept; links collapse to their text.

use rw_buffer::Buffer;

use crate::callbacks::{Callbacks, Renderer};
use crate::flags::HtmlFlags;
use crate::html;
use crate::state::HtmlState;

/// Create a TOC renderer listing headings up to `nesting_level`.
#[must_use]
pub fn renderer(nesting_level: u32) -> Renderer<HtmlState> {
    Renderer::new(callbacks(), HtmlState::new(HtmlFlags::empty(), nesting_level))
}

/// The TOC capability table.
#[must_use]
pub fn callbacks() -> Callbacks<HtmlState> {
    Callbacks {
        header: Some(header),

        codespan: Some(html::codespan),
        double_emphasis: Some(html::double_emphasis),
        emphasis: Some(html::emphasis),
        underline: Some(html::underline),
        highlight: Some(html::highlight),
        quote: Some(html::quote),
        link: Some(link),
        triple_emphasis: Some(html::triple_emphasis),
        strikethrough: Some(html::strikethrough),
        superscript: Some(html::superscript),

        normal_text: Some(html::normal_text),

        doc_footer: Some(finalize),
        ..Callbacks::empty()
    }
}

/// Add a heading entry, opening or closing nested lists to reach its depth.
///
/// The first heading of a document fixes the level offset, so a document
/// starting at `##` lists that heading at depth 1. Headings shallower than
/// the first one are clamped to depth 1.
fn header(ob: &mut Buffer, content: &[u8], level: u32, state: &mut HtmlState) {
    let toc = &mut state.toc;
    if level > toc.nesting_level {
        return;
    }

    if toc.current_level == 0 {
        toc.level_offset = level.saturating_sub(1);
    }
    let level = level.saturating_sub(toc.level_offset).max(1);

    if level > toc.current_level {
        while level > toc.current_level {
            ob.puts("<ul>\n<li>\n");
            toc.current_level += 1;
        }
    } else if level < toc.current_level {
        ob.puts("</li>\n");
        while level < toc.current_level {
            ob.puts("</ul>\n</li>\n");
            toc.current_level -= 1;
        }
        ob.puts("<li>\n");
    } else {
        ob.puts("</li>\n<li>\n");
    }

    ob.printf(format_args!("<a href=\"#toc_{}\">", toc.header_count));
    toc.header_count += 1;
    ob.put(content);
    ob.puts("</a>\n");
}

fn link(
    ob: &mut Buffer,
    content: &[u8],
    _link: &[u8],
    _title: &[u8],
    _state: &mut HtmlState,
) -> bool {
    ob.put(content);
    true
}

/// Close every open list and reset numbering for the next document.
fn finalize(ob: &mut Buffer, inline_render: bool, state: &mut HtmlState) {
    if inline_render {
        return;
    }

    let toc = &mut state.toc;
    tracing::trace!(
        entries = toc.header_count,
        depth = toc.current_level,
        "Closing table of contents"
    );
    while toc.current_level > 0 {
        ob.puts("</li>\n</ul>\n");
        toc.current_level -= 1;
    }
    toc.header_count = 0;
}
