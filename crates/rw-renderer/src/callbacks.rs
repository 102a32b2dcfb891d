//! Renderer capability table.
//!
//! A [`Callbacks`] value lists one optional function per construct. Drivers
//! walk a parsed document in order and call the slot for every construct they
//! recognize, passing already-rendered child content and the backend's
//! per-instance state. What happens when a slot is empty depends on its group:
//!
//! - Block-level: the construct is skipped.
//! - Span-level: the slot returns `true` when it handled the span; when it
//!   returns `false` or is empty, the driver emits the span's source as text.
//! - Low-level (`entity`, `normal_text`): the input is copied unchanged.
//! - Lifecycle (`doc_header`, `doc_footer`): nothing happens.
//!
//! Absent content is passed as an empty slice; callbacks never fail.

use rw_buffer::Buffer;

use crate::flags::{AutolinkType, ListFlags, TableFlags};

/// Fenced or indented code: `(out, text, language, state)`.
pub type BlockCodeFn<S> = fn(&mut Buffer, &[u8], Option<&[u8]>, &mut S);
/// Block wrapping rendered content: `(out, content, state)`.
pub type BlockFn<S> = fn(&mut Buffer, &[u8], &mut S);
/// Heading: `(out, content, level, state)`.
pub type HeaderFn<S> = fn(&mut Buffer, &[u8], u32, &mut S);
/// Content-free block: `(out, state)`.
pub type RuleFn<S> = fn(&mut Buffer, &mut S);
/// List or list item: `(out, content, flags, state)`.
pub type ListFn<S> = fn(&mut Buffer, &[u8], ListFlags, &mut S);
/// Table cell: `(out, content, flags, state)`.
pub type TableCellFn<S> = fn(&mut Buffer, &[u8], TableFlags, &mut S);
/// Footnote definition: `(out, content, ordinal, state)`.
pub type FootnoteDefFn<S> = fn(&mut Buffer, &[u8], u32, &mut S);

/// Autolink: `(out, link, kind, state) -> handled`.
pub type AutolinkFn<S> = fn(&mut Buffer, &[u8], AutolinkType, &mut S) -> bool;
/// Span wrapping content: `(out, content, state) -> handled`.
pub type SpanFn<S> = fn(&mut Buffer, &[u8], &mut S) -> bool;
/// Image: `(out, link, title, alt, state) -> handled`.
pub type ImageFn<S> = fn(&mut Buffer, &[u8], &[u8], &[u8], &mut S) -> bool;
/// Forced line break: `(out, state) -> handled`.
pub type LineBreakFn<S> = fn(&mut Buffer, &mut S) -> bool;
/// Hyperlink: `(out, content, link, title, state) -> handled`.
pub type LinkFn<S> = fn(&mut Buffer, &[u8], &[u8], &[u8], &mut S) -> bool;
/// Footnote reference: `(out, ordinal, state) -> handled`.
pub type FootnoteRefFn<S> = fn(&mut Buffer, u32, &mut S) -> bool;
/// Math: `(out, text, display_mode, state) -> handled`.
pub type MathFn<S> = fn(&mut Buffer, &[u8], bool, &mut S) -> bool;

/// Text passthrough: `(out, text, state)`.
pub type TextFn<S> = fn(&mut Buffer, &[u8], &mut S);
/// Document lifecycle hook: `(out, inline_render, state)`.
pub type DocFn<S> = fn(&mut Buffer, bool, &mut S);

/// Optional callback slots defining one output backend.
pub struct Callbacks<S> {
    // Block-level
    pub blockcode: Option<BlockCodeFn<S>>,
    pub blockquote: Option<BlockFn<S>>,
    pub header: Option<HeaderFn<S>>,
    pub hrule: Option<RuleFn<S>>,
    pub list: Option<ListFn<S>>,
    pub listitem: Option<ListFn<S>>,
    pub paragraph: Option<BlockFn<S>>,
    pub table: Option<BlockFn<S>>,
    pub table_header: Option<BlockFn<S>>,
    pub table_body: Option<BlockFn<S>>,
    pub table_row: Option<BlockFn<S>>,
    pub table_cell: Option<TableCellFn<S>>,
    pub footnotes: Option<BlockFn<S>>,
    pub footnote_def: Option<FootnoteDefFn<S>>,
    pub blockhtml: Option<BlockFn<S>>,

    // Span-level
    pub autolink: Option<AutolinkFn<S>>,
    pub codespan: Option<SpanFn<S>>,
    pub double_emphasis: Option<SpanFn<S>>,
    pub emphasis: Option<SpanFn<S>>,
    pub underline: Option<SpanFn<S>>,
    pub highlight: Option<SpanFn<S>>,
    pub quote: Option<SpanFn<S>>,
    pub image: Option<ImageFn<S>>,
    pub linebreak: Option<LineBreakFn<S>>,
    pub link: Option<LinkFn<S>>,
    pub triple_emphasis: Option<SpanFn<S>>,
    pub strikethrough: Option<SpanFn<S>>,
    pub superscript: Option<SpanFn<S>>,
    pub footnote_ref: Option<FootnoteRefFn<S>>,
    pub math: Option<MathFn<S>>,
    pub raw_html: Option<SpanFn<S>>,

    // Low-level
    pub entity: Option<TextFn<S>>,
    pub normal_text: Option<TextFn<S>>,

    // Lifecycle
    pub doc_header: Option<DocFn<S>>,
    pub doc_footer: Option<DocFn<S>>,
}

impl<S> Callbacks<S> {
    /// A table with every slot empty.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            blockcode: None,
            blockquote: None,
            header: None,
            hrule: None,
            list: None,
            listitem: None,
            paragraph: None,
            table: None,
            table_header: None,
            table_body: None,
            table_row: None,
            table_cell: None,
            footnotes: None,
            footnote_def: None,
            blockhtml: None,
            autolink: None,
            codespan: None,
            double_emphasis: None,
            emphasis: None,
            underline: None,
            highlight: None,
            quote: None,
            image: None,
            linebreak: None,
            link: None,
            triple_emphasis: None,
            strikethrough: None,
            superscript: None,
            footnote_ref: None,
            math: None,
            raw_html: None,
            entity: None,
            normal_text: None,
            doc_header: None,
            doc_footer: None,
        }
    }
}

// Manual impls: the slots are function pointers, so no bound on `S` is needed.
impl<S> Clone for Callbacks<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Callbacks<S> {}

impl<S> Default for Callbacks<S> {
    fn default() -> Self {
        Self::empty()
    }
}

/// One renderer instance: a capability table plus the state it owns.
///
/// The state is handed to every callback as `&mut S`, so two instances never
/// share mutable state. One instance may be reused for sequential renders.
pub struct Renderer<S> {
    pub callbacks: Callbacks<S>,
    pub state: S,
}

impl<S> Renderer<S> {
    /// Bundle a capability table with its state.
    #[must_use]
    pub fn new(callbacks: Callbacks<S>, state: S) -> Self {
        Self { callbacks, state }
    }

    /// Call a block-level slot. An empty slot skips the construct.
    pub fn block<F>(&mut self, slot: Option<F>, call: impl FnOnce(F, &mut S)) {
        if let Some(f) = slot {
            call(f, &mut self.state);
        }
    }

    /// Call a span-level slot, falling back to `source` as text when the slot
    /// is empty or declines the span.
    pub fn span<F>(
        &mut self,
        ob: &mut Buffer,
        slot: Option<F>,
        source: &[u8],
        call: impl FnOnce(F, &mut Buffer, &mut S) -> bool,
    ) {
        let handled = match slot {
            Some(f) => call(f, ob, &mut self.state),
            None => false,
        };
        if !handled {
            self.text(ob, source);
        }
    }

    /// Emit plain text through `normal_text`, or copy it when the slot is empty.
    pub fn text(&mut self, ob: &mut Buffer, text: &[u8]) {
        match self.callbacks.normal_text {
            Some(f) => f(ob, text, &mut self.state),
            None => ob.put(text),
        }
    }

    /// Emit a character entity through `entity`, or copy it when the slot is
    /// empty.
    pub fn entity(&mut self, ob: &mut Buffer, entity: &[u8]) {
        match self.callbacks.entity {
            Some(f) => f(ob, entity, &mut self.state),
            None => ob.put(entity),
        }
    }

    /// Run the document header hook.
    pub fn doc_header(&mut self, ob: &mut Buffer, inline_render: bool) {
        if let Some(f) = self.callbacks.doc_header {
            f(ob, inline_render, &mut self.state);
        }
    }

    /// Run the document footer hook.
    pub fn doc_footer(&mut self, ob: &mut Buffer, inline_render: bool) {
        if let Some(f) = self.callbacks.doc_footer {
            f(ob, inline_render, &mut self.state);
        }
    }

    /// Consume the renderer, returning its state.
    pub fn into_state(self) -> S {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Calls(Vec<&'static str>);

    fn declining(_ob: &mut Buffer, _content: &[u8], state: &mut Calls) -> bool {
        state.0.push("declined");
        false
    }

    fn bracket(ob: &mut Buffer, content: &[u8], state: &mut Calls) -> bool {
        state.0.push("handled");
        ob.putc(b'[');
        ob.put(content);
        ob.putc(b']');
        true
    }

    fn shout(ob: &mut Buffer, text: &[u8], _state: &mut Calls) {
        ob.put(&text.to_ascii_uppercase());
    }

    #[test]
    fn test_empty_table() {
        let callbacks: Callbacks<()> = Callbacks::empty();
        assert!(callbacks.paragraph.is_none());
        assert!(callbacks.emphasis.is_none());
        assert!(callbacks.doc_footer.is_none());
    }

    #[test]
    fn test_span_handled() {
        let mut callbacks = Callbacks::empty();
        callbacks.emphasis = Some(bracket as SpanFn<Calls>);
        let mut renderer = Renderer::new(callbacks, Calls::default());
        let mut ob = Buffer::new(16);
        let slot = renderer.callbacks.emphasis;
        renderer.span(&mut ob, slot, b"*x*", |f, ob, s| f(ob, b"x", s));
        assert_eq!(ob, "[x]");
        assert_eq!(renderer.state.0, vec!["handled"]);
    }

    #[test]
    fn test_span_declined_falls_back_to_source() {
        let mut callbacks = Callbacks::empty();
        callbacks.emphasis = Some(declining as SpanFn<Calls>);
        let mut renderer = Renderer::new(callbacks, Calls::default());
        let mut ob = Buffer::new(16);
        let slot = renderer.callbacks.emphasis;
        renderer.span(&mut ob, slot, b"*x*", |f, ob, s| f(ob, b"x", s));
        assert_eq!(ob, "*x*");
        assert_eq!(renderer.state.0, vec!["declined"]);
    }

    #[test]
    fn test_span_fallback_goes_through_normal_text() {
        let mut callbacks = Callbacks::empty();
        callbacks.normal_text = Some(shout as TextFn<Calls>);
        let mut renderer = Renderer::new(callbacks, Calls::default());
        let mut ob = Buffer::new(16);
        let slot = renderer.callbacks.emphasis;
        renderer.span(&mut ob, slot, b"*x*", |f, ob, s| f(ob, b"x", s));
        assert_eq!(ob, "*X*");
        assert!(renderer.state.0.is_empty());
    }

    #[test]
    fn test_block_skipped_when_empty() {
        let mut renderer = Renderer::new(Callbacks::<Calls>::empty(), Calls::default());
        let mut ob = Buffer::new(16);
        let slot = renderer.callbacks.paragraph;
        renderer.block(slot, |f, s| f(&mut ob, b"text", s));
        assert!(ob.is_empty());
    }

    #[test]
    fn test_low_level_defaults_copy() {
        let mut renderer = Renderer::new(Callbacks::<()>::empty(), ());
        let mut ob = Buffer::new(16);
        renderer.text(&mut ob, b"a<b");
        renderer.entity(&mut ob, b"&amp;");
        renderer.doc_header(&mut ob, false);
        renderer.doc_footer(&mut ob, false);
        assert_eq!(ob, "a<b&amp;");
    }
}
