//! Markdown document driver.
//!
//! [`Document`] parses markdown with pulldown-cmark and feeds the resulting
//! constructs to a [`Renderer`] in document order. Every open element gets a
//! pooled work buffer; when the element closes, its rendered children are
//! handed to the matching callback, which writes into the parent's buffer.
//!
//! ```
//! use rw_buffer::Buffer;
//! use rw_renderer::{Document, Extensions, HtmlFlags, html};
//!
//! let mut doc = Document::new(html::renderer(HtmlFlags::empty(), 6), Extensions::empty(), 16);
//! let mut out = Buffer::new(64);
//! doc.render(&mut out, b"hello");
//! assert_eq!(out, "<p>hello</p>\n");
//! ```

use std::collections::HashMap;
use std::mem;
use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, LinkType, Options, Parser, Tag, TagEnd};
use rw_buffer::{BLOCK_UNIT, Buffer, SPAN_UNIT, Stack};

use crate::autolink::{self, AutolinkFlags, Match};
use crate::callbacks::Renderer;
use crate::flags::{Alignment, AutolinkType, Extensions, ListFlags, TableFlags};
use crate::util::{fence_language, heading_level_to_num, trim_trailing_newlines};

/// Element depth at which further nesting is copied as text.
pub const DEFAULT_MAX_NESTING: usize = 16;

/// Index of the caller's output buffer in the pool.
const ROOT: usize = 0;

/// Markdown parser bound to one renderer.
pub struct Document<S> {
    renderer: Renderer<S>,
    extensions: Extensions,
    max_nesting: usize,
}

impl<S> Document<S> {
    /// Create a document parser.
    ///
    /// Elements nested deeper than `max_nesting` are emitted as plain text.
    #[must_use]
    pub fn new(renderer: Renderer<S>, extensions: Extensions, max_nesting: usize) -> Self {
        Self {
            renderer,
            extensions,
            max_nesting: max_nesting.max(1),
        }
    }

    /// Render a full document, including its footnotes, into `ob`.
    ///
    /// Invalid UTF-8 in `data` is replaced with U+FFFD before parsing.
    pub fn render(&mut self, ob: &mut Buffer, data: &[u8]) {
        self.run(ob, data, false);
    }

    /// Render a fragment into `ob` without paragraph wrapping or footnotes.
    ///
    /// Only inline markup is interpreted. Block constructs such as headings,
    /// lists, quotes, code blocks, tables and rules are copied as text, so
    /// block callbacks never run.
    pub fn render_inline(&mut self, ob: &mut Buffer, data: &[u8]) {
        self.run(ob, data, true);
    }

    /// Extensions enabled for parsing.
    #[must_use]
    pub fn extensions(&self) -> Extensions {
        self.extensions
    }

    /// The bound renderer, including its state.
    #[must_use]
    pub fn renderer(&self) -> &Renderer<S> {
        &self.renderer
    }

    /// Mutable access to the bound renderer between renders.
    pub fn renderer_mut(&mut self) -> &mut Renderer<S> {
        &mut self.renderer
    }

    /// Consume the document, returning its renderer.
    #[must_use]
    pub fn into_renderer(self) -> Renderer<S> {
        self.renderer
    }

    fn parser_options(&self) -> Options {
        let mut options = Options::empty();
        for (extension, option) in [
            (Extensions::TABLES, Options::ENABLE_TABLES),
            (Extensions::FOOTNOTES, Options::ENABLE_FOOTNOTES),
            (Extensions::STRIKETHROUGH, Options::ENABLE_STRIKETHROUGH),
            (Extensions::MATH, Options::ENABLE_MATH),
            (Extensions::SUPERSCRIPT, Options::ENABLE_SUPERSCRIPT),
        ] {
            if self.extensions.contains(extension) {
                options |= option;
            }
        }
        options
    }

    fn run(&mut self, ob: &mut Buffer, data: &[u8], inline: bool) {
        let text = String::from_utf8_lossy(data);
        tracing::debug!(
            len = data.len(),
            inline,
            extensions = %self.extensions,
            "Rendering document"
        );

        self.renderer.doc_header(ob, inline);

        let options = self.parser_options();
        let start = ob.len();
        let mut walker = Walker {
            renderer: &mut self.renderer,
            src: &text,
            extensions: self.extensions,
            max_nesting: self.max_nesting,
            inline,
            root_start: start,
            pool: Pool::new(mem::take(ob)),
            frames: Vec::new(),
            skip: 0,
            opaque: 0,
            pending: String::new(),
            footnotes: Footnotes::default(),
        };
        for (event, range) in Parser::new_ext(&text, options).into_offset_iter() {
            walker.event(event, range);
        }
        *ob = walker.finish();

        self.renderer.doc_footer(ob, inline);
        tracing::debug!(written = ob.len().saturating_sub(start), "Rendered document");
    }
}

/// Growth unit class of a work buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Unit {
    Block,
    Span,
}

impl Unit {
    fn index(self) -> usize {
        match self {
            Unit::Block => 0,
            Unit::Span => 1,
        }
    }

    fn size(self) -> usize {
        match self {
            Unit::Block => BLOCK_UNIT,
            Unit::Span => SPAN_UNIT,
        }
    }
}

/// Work buffers reused across elements.
///
/// Slot [`ROOT`] holds the caller's output for the duration of a render.
struct Pool {
    buffers: Vec<Buffer>,
    free: [Stack<usize>; 2],
}

impl Pool {
    fn new(root: Buffer) -> Self {
        Self {
            buffers: vec![root],
            free: [Stack::default(), Stack::default()],
        }
    }

    fn acquire(&mut self, unit: Unit) -> usize {
        if let Some(index) = self.free[unit.index()].pop() {
            return index;
        }
        self.buffers.push(Buffer::new(unit.size()));
        self.buffers.len() - 1
    }

    fn release(&mut self, index: usize, unit: Unit) {
        self.buffers[index].truncate(0);
        self.free[unit.index()].push(index);
    }
}

#[derive(Debug)]
enum Kind {
    Paragraph,
    Heading(u32),
    BlockQuote,
    CodeBlock(Option<String>),
    HtmlBlock,
    List { ordered: bool, block: bool },
    Item { block: bool },
    FootnoteDefinition(String),
    Table {
        alignments: Vec<Alignment>,
        body: usize,
        column: usize,
    },
    TableHead,
    TableRow,
    TableCell(TableFlags),
    Emphasis { triple: bool },
    Strong { triple: bool },
    Strikethrough,
    Superscript,
    Link {
        link_type: LinkType,
        dest: String,
        title: String,
    },
    Image { dest: String, title: String },
    /// Element without a callback; its content goes straight to the parent.
    Transparent,
}

impl Kind {
    fn unit(&self) -> Unit {
        match self {
            Kind::Emphasis { .. }
            | Kind::Strong { .. }
            | Kind::Strikethrough
            | Kind::Superscript
            | Kind::Link { .. }
            | Kind::Image { .. }
            | Kind::TableCell(_)
            | Kind::Heading(_)
            | Kind::Transparent => Unit::Span,
            _ => Unit::Block,
        }
    }

    /// Whether text inside is copied without going through `normal_text`.
    fn is_raw(&self) -> bool {
        matches!(
            self,
            Kind::CodeBlock(_) | Kind::HtmlBlock | Kind::Image { .. }
        )
    }
}

/// An open element.
struct Frame {
    kind: Kind,
    /// Source bytes of the whole element.
    range: Range<usize>,
    buffer: usize,
}

#[derive(Default)]
struct Footnotes {
    /// Ordinal of each referenced label, assigned on first reference.
    ordinals: HashMap<String, u32>,
    /// Rendered body of each definition.
    definitions: HashMap<String, Vec<u8>>,
}

/// Event-to-callback adapter for a single render.
struct Walker<'a, S> {
    renderer: &'a mut Renderer<S>,
    src: &'a str,
    extensions: Extensions,
    max_nesting: usize,
    inline: bool,
    /// Length of the caller's output before this render.
    root_start: usize,
    pool: Pool,
    frames: Vec<Frame>,
    /// Events left in an element that was copied as text.
    skip: usize,
    /// Tags nested inside image alt text.
    opaque: usize,
    /// Adjacent text not yet emitted.
    pending: String,
    footnotes: Footnotes,
}

impl<S> Walker<'_, S> {
    fn event(&mut self, event: Event<'_>, range: Range<usize>) {
        if self.skip > 0 {
            match event {
                Event::Start(_) => self.skip += 1,
                Event::End(_) => self.skip -= 1,
                _ => {}
            }
            return;
        }

        if !matches!(event, Event::Text(_)) {
            self.flush_text();
        }

        match event {
            Event::Start(tag) => self.start(tag, range),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text, range),
            Event::Code(code) => self.code(&code, range),
            Event::InlineMath(math) => self.math(&math, false, range),
            Event::DisplayMath(math) => self.math(&math, true, range),
            Event::Html(html) => self.raw(html.as_bytes()),
            Event::InlineHtml(html) => self.inline_html(&html),
            Event::FootnoteReference(label) => self.footnote_ref(&label, range),
            Event::SoftBreak => self.soft_break(),
            Event::HardBreak => self.hard_break(range),
            Event::Rule => self.rule(range),
            Event::TaskListMarker(_) => {}
        }
    }

    fn finish(mut self) -> Buffer {
        self.flush_text();
        if !self.inline {
            self.emit_footnotes();
        }
        mem::take(&mut self.pool.buffers[ROOT])
    }

    /// Buffer receiving output at the current position.
    fn current(&self) -> usize {
        self.frames.last().map_or(ROOT, |frame| frame.buffer)
    }

    fn in_raw(&self) -> bool {
        self.frames.last().is_some_and(|frame| frame.kind.is_raw())
    }

    fn in_image(&self) -> bool {
        matches!(
            self.frames.last(),
            Some(Frame {
                kind: Kind::Image { .. },
                ..
            })
        )
    }

    fn in_link(&self) -> bool {
        self.frames
            .iter()
            .any(|frame| matches!(frame.kind, Kind::Link { .. }))
    }

    /// Alignment of the next cell in the innermost table.
    fn next_column(&mut self) -> Alignment {
        for frame in self.frames.iter_mut().rev() {
            if let Kind::Table {
                alignments, column, ..
            } = &mut frame.kind
            {
                let alignment = alignments.get(*column).copied().unwrap_or_default();
                *column += 1;
                return alignment;
            }
        }
        Alignment::None
    }

    fn reset_column(&mut self) {
        for frame in self.frames.iter_mut().rev() {
            if let Kind::Table { column, .. } = &mut frame.kind {
                *column = 0;
                return;
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>, range: Range<usize>) {
        if self.in_image() {
            self.opaque += 1;
            return;
        }

        if self.inline && is_block_only(&tag) {
            tracing::trace!(offset = range.start, "Copying block construct as text");
            self.literal(range);
            self.skip = 1;
            return;
        }

        if self.frames.len() >= self.max_nesting {
            tracing::debug!(
                depth = self.frames.len(),
                offset = range.start,
                "Nesting limit reached, copying element as text"
            );
            let current = self.current();
            let src = self.src;
            self.renderer
                .text(&mut self.pool.buffers[current], &src.as_bytes()[range]);
            self.skip = 1;
            return;
        }

        let kind = match tag {
            Tag::Paragraph => Kind::Paragraph,
            Tag::Heading { level, .. } => Kind::Heading(heading_level_to_num(level)),
            Tag::BlockQuote(_) => Kind::BlockQuote,
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
                Kind::CodeBlock(fence_language(&info).map(str::to_owned))
            }
            Tag::CodeBlock(CodeBlockKind::Indented) => Kind::CodeBlock(None),
            Tag::HtmlBlock => Kind::HtmlBlock,
            Tag::List(start) => Kind::List {
                ordered: start.is_some(),
                block: false,
            },
            Tag::Item => Kind::Item { block: false },
            Tag::FootnoteDefinition(label) => Kind::FootnoteDefinition(label.into_string()),
            Tag::Table(alignments) => Kind::Table {
                alignments: alignments.into_iter().map(Alignment::from).collect(),
                body: self.pool.acquire(Unit::Block),
                column: 0,
            },
            Tag::TableHead => {
                self.reset_column();
                Kind::TableHead
            }
            Tag::TableRow => {
                self.reset_column();
                Kind::TableRow
            }
            Tag::TableCell => {
                let header = matches!(
                    self.frames.last(),
                    Some(Frame {
                        kind: Kind::TableHead,
                        ..
                    })
                );
                Kind::TableCell(TableFlags::new(self.next_column(), header))
            }
            Tag::Emphasis => Kind::Emphasis { triple: false },
            Tag::Strong => Kind::Strong { triple: false },
            Tag::Strikethrough => Kind::Strikethrough,
            Tag::Superscript => Kind::Superscript,
            Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            } => Kind::Link {
                link_type,
                dest: dest_url.into_string(),
                title: title.into_string(),
            },
            Tag::Image {
                dest_url, title, ..
            } => Kind::Image {
                dest: dest_url.into_string(),
                title: title.into_string(),
            },
            Tag::Subscript
            | Tag::DefinitionList
            | Tag::DefinitionListTitle
            | Tag::DefinitionListDefinition
            | Tag::MetadataBlock(_) => Kind::Transparent,
        };

        let buffer = self.pool.acquire(kind.unit());
        self.frames.push(Frame {
            kind,
            range,
            buffer,
        });
    }

    fn end(&mut self, _tag: TagEnd) {
        if self.opaque > 0 {
            self.opaque -= 1;
            return;
        }
        let Some(Frame {
            kind,
            range,
            buffer,
        }) = self.frames.pop()
        else {
            return;
        };

        let unit = kind.unit();
        let content = mem::take(&mut self.pool.buffers[buffer]);
        self.close(kind, range, &content);
        self.pool.buffers[buffer] = content;
        self.pool.release(buffer, unit);
    }

    /// Render a closed element into its parent.
    #[allow(clippy::too_many_lines)]
    fn close(&mut self, kind: Kind, range: Range<usize>, content: &[u8]) {
        let parent = self.current();
        let cb = self.renderer.callbacks;
        let src = self.src;
        let source = &src.as_bytes()[range.clone()];

        match kind {
            Kind::Paragraph => {
                let written = self.has_output(parent);
                let ob = &mut self.pool.buffers[parent];
                if self.inline {
                    if written && !content.is_empty() {
                        ob.putc(b'\n');
                    }
                    ob.put(content);
                } else {
                    self.renderer.block(cb.paragraph, |f, s| f(ob, content, s));
                }
                if let Some(Frame {
                    kind: Kind::Item { block },
                    ..
                }) = self.frames.last_mut()
                {
                    *block = true;
                }
            }
            Kind::Heading(level) => {
                let ob = &mut self.pool.buffers[parent];
                self.renderer
                    .block(cb.header, |f, s| f(ob, content, level, s));
            }
            Kind::BlockQuote => {
                let ob = &mut self.pool.buffers[parent];
                self.renderer.block(cb.blockquote, |f, s| f(ob, content, s));
            }
            Kind::CodeBlock(lang) => {
                let ob = &mut self.pool.buffers[parent];
                let lang = lang.as_deref().map(str::as_bytes);
                self.renderer
                    .block(cb.blockcode, |f, s| f(ob, content, lang, s));
            }
            Kind::HtmlBlock => {
                let written = self.has_output(parent);
                let ob = &mut self.pool.buffers[parent];
                if self.inline {
                    if written {
                        ob.putc(b'\n');
                    }
                    self.renderer.span(
                        ob,
                        cb.raw_html,
                        trim_trailing_newlines(content),
                        |f, ob, s| f(ob, trim_trailing_newlines(content), s),
                    );
                } else if cb.blockhtml.is_some() {
                    self.renderer.block(cb.blockhtml, |f, s| f(ob, content, s));
                } else {
                    // Raw blocks become a paragraph of inline HTML.
                    let mut spans = Buffer::new(SPAN_UNIT);
                    self.renderer
                        .span(&mut spans, cb.raw_html, content, |f, ob, s| f(ob, content, s));
                    self.renderer.block(cb.paragraph, |f, s| f(ob, &spans, s));
                }
            }
            Kind::List { ordered, block } => {
                let ob = &mut self.pool.buffers[parent];
                let flags = list_flags(ordered, block);
                self.renderer.block(cb.list, |f, s| f(ob, content, flags, s));
            }
            Kind::Item { block } => {
                let ordered = match self.frames.last_mut() {
                    Some(Frame {
                        kind:
                            Kind::List {
                                ordered,
                                block: list_block,
                            },
                        ..
                    }) => {
                        *list_block |= block;
                        *ordered
                    }
                    _ => false,
                };
                let ob = &mut self.pool.buffers[parent];
                let flags = list_flags(ordered, block);
                self.renderer
                    .block(cb.listitem, |f, s| f(ob, content, flags, s));
            }
            Kind::FootnoteDefinition(label) => {
                self.footnotes.definitions.insert(label, content.to_vec());
            }
            Kind::Table { body, .. } => {
                let mut table = Buffer::new(BLOCK_UNIT);
                table.put(content);
                let rows = mem::take(&mut self.pool.buffers[body]);
                self.renderer
                    .block(cb.table_body, |f, s| f(&mut table, &rows, s));
                self.pool.buffers[body] = rows;
                self.pool.release(body, Unit::Block);

                let ob = &mut self.pool.buffers[parent];
                self.renderer.block(cb.table, |f, s| f(ob, &table, s));
            }
            Kind::TableHead => {
                let mut row = Buffer::new(BLOCK_UNIT);
                self.renderer.block(cb.table_row, |f, s| f(&mut row, content, s));
                let ob = &mut self.pool.buffers[parent];
                self.renderer.block(cb.table_header, |f, s| f(ob, &row, s));
            }
            Kind::TableRow => {
                let target = match self.frames.last() {
                    Some(Frame {
                        kind: Kind::Table { body, .. },
                        ..
                    }) => *body,
                    _ => parent,
                };
                let ob = &mut self.pool.buffers[target];
                self.renderer.block(cb.table_row, |f, s| f(ob, content, s));
            }
            Kind::TableCell(flags) => {
                let ob = &mut self.pool.buffers[parent];
                self.renderer
                    .block(cb.table_cell, |f, s| f(ob, content, flags, s));
            }
            Kind::Emphasis { triple } => {
                self.close_emphasis(false, triple, &range, parent, content);
            }
            Kind::Strong { triple } => {
                self.close_emphasis(true, triple, &range, parent, content);
            }
            Kind::Strikethrough => {
                let ob = &mut self.pool.buffers[parent];
                self.renderer
                    .span(ob, cb.strikethrough, source, |f, ob, s| f(ob, content, s));
            }
            Kind::Superscript => {
                let ob = &mut self.pool.buffers[parent];
                self.renderer
                    .span(ob, cb.superscript, source, |f, ob, s| f(ob, content, s));
            }
            Kind::Link {
                link_type,
                dest,
                title,
            } => {
                let ob = &mut self.pool.buffers[parent];
                match link_type {
                    LinkType::Autolink | LinkType::Email => {
                        let kind = if link_type == LinkType::Email {
                            AutolinkType::Email
                        } else {
                            AutolinkType::Normal
                        };
                        self.renderer.span(ob, cb.autolink, source, |f, ob, s| {
                            f(ob, dest.as_bytes(), kind, s)
                        });
                    }
                    _ => {
                        self.renderer.span(ob, cb.link, source, |f, ob, s| {
                            f(ob, content, dest.as_bytes(), title.as_bytes(), s)
                        });
                    }
                }
            }
            Kind::Image { dest, title } => {
                let ob = &mut self.pool.buffers[parent];
                self.renderer.span(ob, cb.image, source, |f, ob, s| {
                    f(ob, dest.as_bytes(), title.as_bytes(), content, s)
                });
            }
            Kind::Transparent => self.pool.buffers[parent].put(content),
        }
    }

    fn close_emphasis(
        &mut self,
        strong: bool,
        triple: bool,
        range: &Range<usize>,
        parent: usize,
        content: &[u8],
    ) {
        if self.merge_triple(strong, range, parent) {
            self.pool.buffers[parent].put(content);
            return;
        }

        let cb = self.renderer.callbacks;
        let slot = if triple {
            cb.triple_emphasis
        } else if strong {
            cb.double_emphasis
        } else {
            cb.emphasis
        };
        let src = self.src;
        let ob = &mut self.pool.buffers[parent];
        self.renderer.span(ob, slot, &src.as_bytes()[range.clone()], |f, ob, s| {
            f(ob, content, s)
        });
    }

    /// Fold an emphasis that exactly fills the opposite emphasis around it
    /// (`***text***`) into that parent, marking the parent as triple.
    fn merge_triple(&mut self, strong: bool, range: &Range<usize>, parent: usize) -> bool {
        if self.renderer.callbacks.triple_emphasis.is_none() {
            return false;
        }
        let parent_empty = self.pool.buffers[parent].is_empty();
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        let (outer_delimiter, triple) = match &mut frame.kind {
            Kind::Emphasis { triple } if strong => (1, triple),
            Kind::Strong { triple } if !strong => (2, triple),
            _ => return false,
        };
        if parent_empty
            && frame.range.start + outer_delimiter == range.start
            && range.end + outer_delimiter == frame.range.end
        {
            *triple = true;
            return true;
        }
        false
    }

    fn text(&mut self, text: &str, range: Range<usize>) {
        let current = self.current();
        if self.in_raw() {
            self.pool.buffers[current].put(text.as_bytes());
            return;
        }

        let src = self.src;
        let source = &src.as_bytes()[range];
        if source.len() > 2
            && source.starts_with(b"&")
            && source.ends_with(b";")
            && source != text.as_bytes()
        {
            self.flush_text();
            self.renderer.entity(&mut self.pool.buffers[current], source);
            return;
        }

        // The parser splits text at delimiter characters; links may span them.
        self.pending.push_str(text);
    }

    /// Emit merged text, running autolink detection when enabled.
    fn flush_text(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut text = mem::take(&mut self.pending);
        let current = self.current();
        if self.extensions.contains(Extensions::AUTOLINK) && !self.in_link() {
            self.autolink_text(current, text.as_bytes());
        } else {
            self.renderer.text(&mut self.pool.buffers[current], text.as_bytes());
        }
        text.clear();
        self.pending = text;
    }

    /// Whether `index` has received output during this render.
    fn has_output(&self, index: usize) -> bool {
        let buffer = &self.pool.buffers[index];
        if index == ROOT {
            buffer.len() > self.root_start
        } else {
            !buffer.is_empty()
        }
    }

    /// Copy an element's source as text on its own line.
    fn literal(&mut self, range: Range<usize>) {
        let current = self.current();
        let written = self.has_output(current);
        let src = self.src;
        let source = trim_trailing_newlines(&src.as_bytes()[range]);
        let ob = &mut self.pool.buffers[current];
        if written {
            ob.putc(b'\n');
        }
        self.renderer.text(ob, source);
    }

    /// Emit text, turning bare URLs, `www.` domains and emails into links.
    fn autolink_text(&mut self, current: usize, text: &[u8]) {
        type Finder = fn(&mut Buffer, &[u8], usize, AutolinkFlags) -> Option<Match>;

        let cb = self.renderer.callbacks;
        let ob = &mut self.pool.buffers[current];
        let mut emitted = 0;
        let mut i = 0;
        while i < text.len() {
            let trigger = text[i];
            let finder: Finder = match trigger {
                b'w' => autolink::www,
                b'@' => autolink::email,
                b':' => autolink::url,
                _ => {
                    i += 1;
                    continue;
                }
            };

            let mut link = Buffer::new(SPAN_UNIT);
            let Some(found) = finder(&mut link, text, i, AutolinkFlags::default()) else {
                i += 1;
                continue;
            };
            let start = i - found.rewind;
            if start < emitted {
                i += 1;
                continue;
            }

            if start > emitted {
                self.renderer.text(ob, &text[emitted..start]);
            }
            let end = i + found.len;
            let source = &text[start..end];
            match trigger {
                b'w' => {
                    let mut content = Buffer::new(SPAN_UNIT);
                    self.renderer.text(&mut content, &link);
                    let mut url = Buffer::new(SPAN_UNIT);
                    url.puts("http://");
                    url.put(&link);
                    self.renderer.span(ob, cb.link, source, |f, ob, s| {
                        f(ob, &content, &url, b"", s)
                    });
                }
                b'@' => {
                    self.renderer.span(ob, cb.autolink, source, |f, ob, s| {
                        f(ob, &link, AutolinkType::Email, s)
                    });
                }
                _ => {
                    self.renderer.span(ob, cb.autolink, source, |f, ob, s| {
                        f(ob, &link, AutolinkType::Normal, s)
                    });
                }
            }
            emitted = end;
            i = end;
        }

        if emitted < text.len() {
            self.renderer.text(ob, &text[emitted..]);
        }
    }

    /// Copy bytes into the current buffer as they are.
    fn raw(&mut self, bytes: &[u8]) {
        let current = self.current();
        self.pool.buffers[current].put(bytes);
    }

    fn code(&mut self, code: &str, range: Range<usize>) {
        if self.in_raw() {
            self.raw(code.as_bytes());
            return;
        }
        let current = self.current();
        let slot = self.renderer.callbacks.codespan;
        let src = self.src;
        let source = &src.as_bytes()[range];
        self.renderer
            .span(&mut self.pool.buffers[current], slot, source, |f, ob, s| {
                f(ob, code.as_bytes(), s)
            });
    }

    fn math(&mut self, math: &str, display: bool, range: Range<usize>) {
        if self.in_raw() {
            self.raw(math.as_bytes());
            return;
        }
        let current = self.current();
        let slot = self.renderer.callbacks.math;
        let src = self.src;
        let source = &src.as_bytes()[range];
        self.renderer
            .span(&mut self.pool.buffers[current], slot, source, |f, ob, s| {
                f(ob, math.as_bytes(), display, s)
            });
    }

    fn inline_html(&mut self, html: &str) {
        if self.in_raw() {
            self.raw(html.as_bytes());
            return;
        }
        let current = self.current();
        let slot = self.renderer.callbacks.raw_html;
        self.renderer.span(
            &mut self.pool.buffers[current],
            slot,
            html.as_bytes(),
            |f, ob, s| f(ob, html.as_bytes(), s),
        );
    }

    fn footnote_ref(&mut self, label: &str, range: Range<usize>) {
        let src = self.src;
        let source = &src.as_bytes()[range];
        if self.in_raw() {
            self.raw(source);
            return;
        }

        let next = u32::try_from(self.footnotes.ordinals.len() + 1).unwrap_or(u32::MAX);
        let num = *self
            .footnotes
            .ordinals
            .entry(label.to_owned())
            .or_insert(next);

        let current = self.current();
        let slot = self.renderer.callbacks.footnote_ref;
        self.renderer
            .span(&mut self.pool.buffers[current], slot, source, |f, ob, s| {
                f(ob, num, s)
            });
    }

    fn soft_break(&mut self) {
        let current = self.current();
        if self.in_raw() {
            self.raw(b"\n");
        } else {
            self.renderer.text(&mut self.pool.buffers[current], b"\n");
        }
    }

    fn hard_break(&mut self, range: Range<usize>) {
        if self.in_raw() {
            self.raw(b"\n");
            return;
        }
        let current = self.current();
        let slot = self.renderer.callbacks.linebreak;
        let src = self.src;
        let source = &src.as_bytes()[range];
        self.renderer
            .span(&mut self.pool.buffers[current], slot, source, |f, ob, s| f(ob, s));
    }

    fn rule(&mut self, range: Range<usize>) {
        if self.inline {
            self.literal(range);
            return;
        }
        let current = self.current();
        let slot = self.renderer.callbacks.hrule;
        let ob = &mut self.pool.buffers[current];
        self.renderer.block(slot, |f, s| f(ob, s));
    }

    /// Append the footnote list in reference order.
    fn emit_footnotes(&mut self) {
        if self.footnotes.ordinals.is_empty() {
            return;
        }

        let mut used: Vec<(&str, u32)> = self
            .footnotes
            .ordinals
            .iter()
            .map(|(label, &num)| (label.as_str(), num))
            .collect();
        used.sort_unstable_by_key(|&(_, num)| num);

        let cb = self.renderer.callbacks;
        let mut list = Buffer::new(BLOCK_UNIT);
        let mut count = 0;
        for (label, num) in used {
            let Some(definition) = self.footnotes.definitions.get(label) else {
                tracing::debug!(label, "Footnote referenced without definition");
                continue;
            };
            self.renderer
                .block(cb.footnote_def, |f, s| f(&mut list, definition, num, s));
            count += 1;
        }

        tracing::debug!(count, "Emitting footnotes");
        if list.is_empty() {
            return;
        }
        let ob = &mut self.pool.buffers[ROOT];
        self.renderer.block(cb.footnotes, |f, s| f(ob, &list, s));
    }
}

/// Tags that only exist at block level and have no inline reading.
fn is_block_only(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::Heading { .. }
            | Tag::BlockQuote(_)
            | Tag::CodeBlock(_)
            | Tag::List(_)
            | Tag::Item
            | Tag::Table(_)
            | Tag::TableHead
            | Tag::TableRow
            | Tag::TableCell
            | Tag::DefinitionList
            | Tag::DefinitionListTitle
            | Tag::DefinitionListDefinition
            | Tag::MetadataBlock(_)
    )
}

fn list_flags(ordered: bool, block: bool) -> ListFlags {
    let mut flags = ListFlags::empty();
    if ordered {
        flags |= ListFlags::ORDERED;
    }
    if block {
        flags |= ListFlags::BLOCK;
    }
    flags
}

impl From<pulldown_cmark::Alignment> for Alignment {
    fn from(alignment: pulldown_cmark::Alignment) -> Self {
        match alignment {
            pulldown_cmark::Alignment::None => Alignment::None,
            pulldown_cmark::Alignment::Left => Alignment::Left,
            pulldown_cmark::Alignment::Center => Alignment::Center,
            pulldown_cmark::Alignment::Right => Alignment::Right,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::callbacks::Callbacks;
    use crate::flags::HtmlFlags;
    use crate::state::HtmlState;
    use crate::{html, toc};

    fn render_with(renderer: Renderer<HtmlState>, extensions: Extensions, src: &str) -> String {
        let mut doc = Document::new(renderer, extensions, DEFAULT_MAX_NESTING);
        let mut ob = Buffer::new(BLOCK_UNIT);
        doc.render(&mut ob, src.as_bytes());
        String::from_utf8(ob.to_vec()).unwrap()
    }

    fn render(src: &str) -> String {
        render_with(html::renderer(HtmlFlags::empty(), 6), Extensions::empty(), src)
    }

    fn render_ext(extensions: Extensions, src: &str) -> String {
        render_with(html::renderer(HtmlFlags::empty(), 6), extensions, src)
    }

    #[test]
    fn test_single_paragraph() {
        assert_eq!(render("hello"), "<p>hello</p>\n");
    }

    #[test]
    fn test_heading_and_emphasis() {
        assert_eq!(
            render("# Title\n\nSome *emphasis* and **strong**.\n"),
            "<h1 id=\"toc_0\">Title</h1>\n\n<p>Some <em>emphasis</em> and <strong>strong</strong>.</p>\n"
        );
    }

    #[test]
    fn test_triple_emphasis() {
        assert_eq!(
            render("***both***"),
            "<p><strong><em>both</em></strong></p>\n"
        );
    }

    #[test]
    fn test_triple_emphasis_nests_without_slot() {
        let mut renderer = html::renderer(HtmlFlags::empty(), 6);
        renderer.callbacks.triple_emphasis = None;
        assert_eq!(
            render_with(renderer, Extensions::empty(), "***both***"),
            "<p><em><strong>both</strong></em></p>\n"
        );
    }

    #[test]
    fn test_nested_emphasis_is_not_triple() {
        assert_eq!(
            render("*a **b** c*"),
            "<p><em>a <strong>b</strong> c</em></p>\n"
        );
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(render("a < b & \"c\""), "<p>a &lt; b &amp; &quot;c&quot;</p>\n");
    }

    #[test]
    fn test_entities_pass_through() {
        assert_eq!(render("&copy; &amp;"), "<p>&copy; &amp;</p>\n");
    }

    #[test]
    fn test_tight_list() {
        assert_eq!(
            render("- one\n- two\n"),
            "<ul>\n<li>one</li>\n<li>two</li>\n</ul>\n"
        );
        assert_eq!(
            render("1. a\n2. b\n"),
            "<ol>\n<li>a</li>\n<li>b</li>\n</ol>\n"
        );
    }

    #[test]
    fn test_loose_list_flags() {
        fn record(ob: &mut Buffer, content: &[u8], flags: ListFlags, _state: &mut HtmlState) {
            ob.printf(format_args!("[{flags}]"));
            ob.put(content);
        }

        let mut renderer = html::renderer(HtmlFlags::empty(), 6);
        renderer.callbacks.list = Some(record);
        let out = render_with(renderer, Extensions::empty(), "1. one\n\n2. two\n");
        assert!(out.starts_with("[ordered,block]<li><p>one</p></li>\n"));
    }

    #[test]
    fn test_loose_list() {
        assert_eq!(
            render("- one\n\n- two\n"),
            "<ul>\n<li><p>one</p></li>\n<li><p>two</p></li>\n</ul>\n"
        );
    }

    #[test]
    fn test_code_block() {
        assert_eq!(
            render("```rust\nlet x = 1 < 2;\n```\n"),
            "<pre><code class=\"language-rust\">let x = 1 &lt; 2;\n</code></pre>\n"
        );
        assert_eq!(
            render("    indented\n"),
            "<pre><code>indented\n</code></pre>\n"
        );
    }

    #[test]
    fn test_codespan_and_rule() {
        assert_eq!(
            render("`a<b`\n\n***\n"),
            "<p><code>a&lt;b</code></p>\n\n<hr>\n"
        );
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(
            render("> quoted\n"),
            "<blockquote>\n<p>quoted</p>\n</blockquote>\n"
        );
    }

    #[test]
    fn test_table() {
        assert_eq!(
            render_ext(Extensions::TABLES, "| a | b |\n|:-|-:|\n| 1 | 2 |\n"),
            "<table>\n<thead>\n<tr>\n\
             <th style=\"text-align: left\">a</th>\n\
             <th style=\"text-align: right\">b</th>\n\
             </tr>\n</thead>\n\n<tbody>\n<tr>\n\
             <td style=\"text-align: left\">1</td>\n\
             <td style=\"text-align: right\">2</td>\n\
             </tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn test_links_and_images() {
        assert_eq!(
            render("[Rust](https://rust-lang.org \"The Rust\") ![alt *text*](img.png)"),
            "<p><a href=\"https://rust-lang.org\" title=\"The Rust\">Rust</a> \
             <img src=\"img.png\" alt=\"alt text\"></p>\n"
        );
    }

    #[test]
    fn test_angle_autolinks() {
        assert_eq!(
            render("<https://example.com> <me@example.com>"),
            "<p><a href=\"https://example.com\">https://example.com</a> \
             <a href=\"mailto:me@example.com\">me@example.com</a></p>\n"
        );
    }

    #[test]
    fn test_autolink_spans_emphasis_delimiters() {
        assert_eq!(
            render_ext(Extensions::AUTOLINK, "see https://example.com/a*b now"),
            "<p>see <a href=\"https://example.com/a*b\">https://example.com/a*b</a> now</p>\n"
        );
    }

    #[test]
    fn test_bare_autolinks() {
        assert_eq!(
            render_ext(
                Extensions::AUTOLINK,
                "Visit www.example.com or https://rust-lang.org now."
            ),
            "<p>Visit <a href=\"http://www.example.com\">www.example.com</a> or \
             <a href=\"https://rust-lang.org\">https://rust-lang.org</a> now.</p>\n"
        );
        assert_eq!(
            render_ext(Extensions::AUTOLINK, "mail me@example.com"),
            "<p>mail <a href=\"mailto:me@example.com\">me@example.com</a></p>\n"
        );
    }

    #[test]
    fn test_bare_urls_need_extension() {
        assert_eq!(
            render("see https://rust-lang.org"),
            "<p>see https://rust-lang.org</p>\n"
        );
    }

    #[test]
    fn test_no_autolink_inside_links() {
        assert_eq!(
            render_ext(Extensions::AUTOLINK, "[www.example.com](/x)"),
            "<p><a href=\"/x\">www.example.com</a></p>\n"
        );
    }

    #[test]
    fn test_footnotes() {
        let out = render_ext(
            Extensions::FOOTNOTES,
            "Text[^b] and[^a].\n\n[^a]: First.\n\n[^b]: Second.\n",
        );
        assert!(out.starts_with(
            "<p>Text<sup id=\"fnref1\"><a href=\"#fn1\" rel=\"footnote\">1</a></sup> \
             and<sup id=\"fnref2\"><a href=\"#fn2\" rel=\"footnote\">2</a></sup>.</p>\n"
        ));
        assert!(out.contains("\n<div class=\"footnotes\">\n<hr>\n<ol>\n"));
        let second = out.find("<li id=\"fn1\">\n<p>Second.&nbsp;").unwrap();
        let first = out.find("<li id=\"fn2\">\n<p>First.&nbsp;").unwrap();
        assert!(second < first);
        assert!(out.ends_with("\n</ol>\n</div>\n"));
    }

    #[test]
    fn test_inline_render_copies_blocks_as_text() {
        let mut doc = Document::new(
            html::renderer(HtmlFlags::empty(), 6),
            Extensions::empty(),
            DEFAULT_MAX_NESTING,
        );
        let mut ob = Buffer::new(SPAN_UNIT);
        doc.render_inline(&mut ob, b"# Title *x*\n\n- item");
        assert_eq!(ob, "# Title *x*\n- item");
    }

    #[test]
    fn test_inline_render_keeps_spans_around_rule() {
        let mut doc = Document::new(
            html::renderer(HtmlFlags::empty(), 6),
            Extensions::empty(),
            DEFAULT_MAX_NESTING,
        );
        let mut ob = Buffer::new(SPAN_UNIT);
        doc.render_inline(&mut ob, b"*a*\n\n***\n\nb");
        assert_eq!(ob, "<em>a</em>\n***\nb");
    }

    #[test]
    fn test_inline_render_leaves_toc_state_untouched() {
        let mut doc = Document::new(toc::renderer(6), Extensions::empty(), DEFAULT_MAX_NESTING);
        let mut fragment = Buffer::new(SPAN_UNIT);
        doc.render_inline(&mut fragment, b"# A\n");
        assert!(!fragment.starts_with(b"<ul>"));
        assert_eq!(doc.renderer().state.toc.header_count, 0);
        assert_eq!(doc.renderer().state.toc.current_level, 0);

        let mut full = Buffer::new(BLOCK_UNIT);
        doc.render(&mut full, b"# B\n");
        assert_eq!(full, "<ul>\n<li>\n<a href=\"#toc_0\">B</a>\n</li>\n</ul>\n");
    }

    #[test]
    fn test_inline_render_skips_footnotes() {
        let mut doc = Document::new(
            html::renderer(HtmlFlags::empty(), 6),
            Extensions::FOOTNOTES,
            DEFAULT_MAX_NESTING,
        );
        let mut ob = Buffer::new(SPAN_UNIT);
        doc.render_inline(&mut ob, b"hello *world*[^1]\n\n[^1]: Note.\n");
        let out = String::from_utf8(ob.to_vec()).unwrap();
        assert!(out.starts_with("hello <em>world</em><sup id=\"fnref1\">"));
        assert!(!out.contains("footnotes"));
        assert!(!out.contains("<p>"));
    }

    #[test]
    fn test_strikethrough_superscript_math() {
        let extensions = Extensions::STRIKETHROUGH | Extensions::SUPERSCRIPT | Extensions::MATH;
        assert_eq!(
            render_ext(extensions, "~~gone~~ x^2^ $a+b$"),
            "<p><del>gone</del> x<sup>2</sup> \\(a+b\\)</p>\n"
        );
    }

    #[test]
    fn test_breaks() {
        assert_eq!(render("a  \nb"), "<p>a<br>\nb</p>\n");
        assert_eq!(render("a\nb"), "<p>a\nb</p>\n");
    }

    #[test]
    fn test_raw_html() {
        assert_eq!(render("<div>\nhi\n</div>\n"), "<div>\nhi\n</div>\n");
        assert_eq!(render("a <b>b</b>"), "<p>a <b>b</b></p>\n");
    }

    #[test]
    fn test_raw_html_skipped() {
        let skip = || html::renderer(HtmlFlags::SKIP_HTML, 6);
        assert_eq!(render_with(skip(), Extensions::empty(), "<div>\nhi\n</div>\n"), "");
        assert_eq!(render_with(skip(), Extensions::empty(), "a <b>b</b>"), "<p>a b</p>\n");
    }

    #[test]
    fn test_raw_html_escaped() {
        let out = render_with(
            html::renderer(HtmlFlags::ESCAPE, 6),
            Extensions::empty(),
            "<div>\nhi\n</div>\n",
        );
        assert!(out.starts_with("<p>&lt;div&gt;\nhi\n&lt;/div&gt;"));
    }

    #[test]
    fn test_declined_span_falls_back_to_source() {
        let mut renderer = html::renderer(HtmlFlags::empty(), 6);
        renderer.callbacks.emphasis = None;
        assert_eq!(
            render_with(renderer, Extensions::empty(), "*x* <y>"),
            "<p>*x* <y></p>\n"
        );
    }

    #[test]
    fn test_empty_block_slots_skip_content() {
        let mut renderer = html::renderer(HtmlFlags::empty(), 6);
        renderer.callbacks.blockquote = None;
        assert_eq!(
            render_with(renderer, Extensions::empty(), "> gone\n\nkept"),
            "<p>kept</p>\n"
        );
    }

    #[test]
    fn test_nesting_limit() {
        let mut doc = Document::new(
            html::renderer(HtmlFlags::empty(), 6),
            Extensions::empty(),
            2,
        );
        let mut ob = Buffer::new(BLOCK_UNIT);
        doc.render(&mut ob, b"> > > deep\n");
        let out = String::from_utf8(ob.to_vec()).unwrap();
        assert_eq!(out.matches("<blockquote>").count(), 2);
        assert!(out.contains("deep"));
    }

    #[test]
    fn test_appends_to_existing_output() {
        let mut doc = Document::new(
            html::renderer(HtmlFlags::empty(), 6),
            Extensions::empty(),
            DEFAULT_MAX_NESTING,
        );
        let mut ob = Buffer::new(BLOCK_UNIT);
        ob.puts("<body>");
        doc.render(&mut ob, b"x");
        assert_eq!(ob, "<body>\n<p>x</p>\n");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut doc = Document::new(
            html::renderer(HtmlFlags::empty(), 6),
            Extensions::empty(),
            DEFAULT_MAX_NESTING,
        );
        let mut ob = Buffer::new(BLOCK_UNIT);
        doc.render(&mut ob, b"a\xffb");
        assert_eq!(ob, "<p>a\u{fffd}b</p>\n");
    }

    #[test]
    fn test_toc_document() {
        let out = render_with(toc::renderer(6), Extensions::empty(), "# A\n\ntext\n\n## B *x*\n\n# C\n");
        assert_eq!(
            out,
            "<ul>\n<li>\n<a href=\"#toc_0\">A</a>\n\
             <ul>\n<li>\n<a href=\"#toc_1\">B <em>x</em></a>\n\
             </li>\n</ul>\n</li>\n<li>\n<a href=\"#toc_2\">C</a>\n\
             </li>\n</ul>\n"
        );
    }

    #[test]
    fn test_toc_link_shows_text() {
        let out = render_with(toc::renderer(6), Extensions::empty(), "# [Docs](http://x)\n");
        assert_eq!(
            out,
            "<ul>\n<li>\n<a href=\"#toc_0\">Docs</a>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_toc_renderer_reuse_restarts_numbering() {
        let mut doc = Document::new(toc::renderer(6), Extensions::empty(), DEFAULT_MAX_NESTING);
        let mut first = Buffer::new(BLOCK_UNIT);
        doc.render(&mut first, b"# A\n## B\n");
        let mut second = Buffer::new(BLOCK_UNIT);
        doc.render(&mut second, b"# A\n## B\n");
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(doc.renderer().state.toc.header_count, 0);
    }

    #[test]
    fn test_html_anchors_match_toc() {
        let src = "# One\n\n## Two\n";
        let body = render(src);
        let toc = render_with(toc::renderer(6), Extensions::empty(), src);
        for id in ["toc_0", "toc_1"] {
            assert!(body.contains(&format!("id=\"{id}\"")));
            assert!(toc.contains(&format!("href=\"#{id}\"")));
        }
    }

    #[test]
    fn test_doc_hooks_wrap_output() {
        fn header(ob: &mut Buffer, inline: bool, _state: &mut ()) {
            ob.puts(if inline { "[inline]" } else { "[doc]" });
        }
        fn footer(ob: &mut Buffer, _inline: bool, _state: &mut ()) {
            ob.puts("[end]");
        }

        let callbacks = Callbacks {
            doc_header: Some(header),
            doc_footer: Some(footer),
            ..Callbacks::empty()
        };
        let mut doc = Document::new(
            Renderer::new(callbacks, ()),
            Extensions::empty(),
            DEFAULT_MAX_NESTING,
        );
        let mut ob = Buffer::new(SPAN_UNIT);
        doc.render(&mut ob, b"body");
        doc.render_inline(&mut ob, b"more");
        assert_eq!(ob, "[doc][end][inline]more[end]");
    }

    #[test]
    fn test_parser_options() {
        let doc = Document::new(
            Renderer::new(Callbacks::<()>::empty(), ()),
            Extensions::TABLES | Extensions::MATH | Extensions::AUTOLINK,
            DEFAULT_MAX_NESTING,
        );
        let options = doc.parser_options();
        assert!(options.contains(Options::ENABLE_TABLES | Options::ENABLE_MATH));
        assert!(!options.contains(Options::ENABLE_FOOTNOTES));
        assert_eq!(doc.extensions(), Extensions::TABLES | Extensions::MATH | Extensions::AUTOLINK);
    }
}
