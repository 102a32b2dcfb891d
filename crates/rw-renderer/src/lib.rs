//! Callback-driven markdown rendering.
//!
//! A backend is a [`Callbacks`] table: one optional function per markdown
//! construct, each receiving already-rendered child content and the backend's
//! state. [`Document`] walks a parsed document and calls the table in order.
//!
//! # Backends
//!
//! - [`html`]: HTML or XHTML fragments with `toc_N` heading anchors
//! - [`toc`]: nested lists linking to those anchors
//!
//! # Example
//!
//! ```
//! use rw_buffer::Buffer;
//! use rw_renderer::{DEFAULT_MAX_NESTING, Document, Extensions, HtmlOptions};
//!
//! let options = HtmlOptions::default();
//! let source = b"# Intro\n\nSome *text*.\n\n## Details\n";
//!
//! let mut body = Buffer::new(64);
//! Document::new(options.renderer(), Extensions::TABLES, DEFAULT_MAX_NESTING)
//!     .render(&mut body, source);
//! assert!(body.starts_with(b"<h1 id=\"toc_0\">Intro</h1>"));
//!
//! let mut toc = Buffer::new(64);
//! Document::new(options.toc_renderer(), Extensions::TABLES, DEFAULT_MAX_NESTING)
//!     .render(&mut toc, source);
//! assert!(toc.starts_with(b"<ul>\n<li>\n<a href=\"#toc_0\">Intro</a>"));
//! ```

pub mod autolink;
mod callbacks;
mod document;
mod escape;
mod flags;
pub mod html;
mod state;
pub mod toc;
mod util;

pub use callbacks::{
    AutolinkFn, BlockCodeFn, BlockFn, Callbacks, DocFn, FootnoteDefFn, FootnoteRefFn, HeaderFn,
    ImageFn, LineBreakFn, LinkFn, ListFn, MathFn, Renderer, RuleFn, SpanFn, TableCellFn, TextFn,
};
pub use document::{DEFAULT_MAX_NESTING, Document};
pub use escape::{escape_href, escape_html};
pub use flags::{
    Alignment, AutolinkType, Extensions, FlagError, HtmlFlags, ListFlags, TableFlags,
};
pub use html::{HtmlTag, is_tag};
pub use rw_buffer::Buffer;
pub use state::{DEFAULT_NESTING_LEVEL, HtmlOptions, HtmlState, LinkAttributesFn, TocData};

/// Library version as `(major, minor, revision)`.
pub const VERSION: (u32, u32, u32) = (1, 0, 0);

/// Report the library version as `(major, minor, revision)`.
#[must_use]
pub fn version() -> (u32, u32, u32) {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_package() {
        let (major, minor, revision) = version();
        assert_eq!(
            format!("{major}.{minor}.{revision}"),
            env!("CARGO_PKG_VERSION")
        );
    }
}
