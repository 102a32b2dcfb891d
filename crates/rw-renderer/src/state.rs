//! Per-instance state of the HTML and TOC backends.

use rw_buffer::Buffer;

use crate::callbacks::Renderer;
use crate::flags::HtmlFlags;

/// Heading depth that receives `toc_N` anchors when nothing else is configured.
pub const DEFAULT_NESTING_LEVEL: u32 = 6;

/// Hook writing extra attributes into an anchor's opening tag.
///
/// Called with the output positioned after the closing quote of `href`, and
/// the raw link target. Whatever it writes lands before the tag's `>`.
pub type LinkAttributesFn = fn(&mut Buffer, &[u8], &HtmlState);

/// Heading bookkeeping shared by the HTML and TOC backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TocData {
    /// Next `toc_N` anchor number.
    pub header_count: u32,
    /// Depth of the TOC list currently open (0 before the first heading).
    pub current_level: u32,
    /// Subtracted from heading levels so the first heading sits at depth 1.
    pub level_offset: u32,
    /// Deepest heading level that gets an anchor or TOC entry.
    pub nesting_level: u32,
}

/// State owned by one HTML or TOC renderer instance.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlState {
    pub flags: HtmlFlags,
    pub toc: TocData,
    pub link_attributes: Option<LinkAttributesFn>,
}

impl HtmlState {
    #[must_use]
    pub fn new(flags: HtmlFlags, nesting_level: u32) -> Self {
        Self {
            flags,
            toc: TocData {
                nesting_level,
                ..TocData::default()
            },
            link_attributes: None,
        }
    }

    pub(crate) fn use_xhtml(&self) -> bool {
        self.flags.contains(HtmlFlags::USE_XHTML)
    }
}

/// Declarative configuration for the HTML backends.
///
/// ```
/// use rw_renderer::{HtmlFlags, HtmlOptions};
///
/// let options = HtmlOptions {
///     flags: HtmlFlags::USE_XHTML,
///     ..HtmlOptions::default()
/// };
/// let renderer = options.renderer();
/// assert!(renderer.state.flags.contains(HtmlFlags::USE_XHTML));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct HtmlOptions {
    /// Rendering flags.
    pub flags: HtmlFlags,
    /// Deepest heading level that gets an anchor or TOC entry.
    pub nesting_level: u32,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            flags: HtmlFlags::empty(),
            nesting_level: DEFAULT_NESTING_LEVEL,
        }
    }
}

impl HtmlOptions {
    /// Build an HTML renderer with these options.
    #[must_use]
    pub fn renderer(&self) -> Renderer<HtmlState> {
        crate::html::renderer(self.flags, self.nesting_level)
    }

    /// Build a table-of-contents renderer with these options.
    #[must_use]
    pub fn toc_renderer(&self) -> Renderer<HtmlState> {
        crate::toc::renderer(self.nesting_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_nesting_level_only() {
        let state = HtmlState::new(HtmlFlags::HARD_WRAP, 3);
        assert_eq!(
            state.toc,
            TocData {
                nesting_level: 3,
                ..TocData::default()
            }
        );
        assert!(state.link_attributes.is_none());
        assert!(!state.use_xhtml());
    }

    #[test]
    fn test_options_default() {
        let options = HtmlOptions::default();
        assert!(options.flags.is_empty());
        assert_eq!(options.nesting_level, DEFAULT_NESTING_LEVEL);
    }

    #[test]
    fn test_options_build_renderers() {
        let options = HtmlOptions {
            flags: HtmlFlags::SKIP_HTML,
            nesting_level: 2,
        };
        let html = options.renderer();
        assert_eq!(html.state.toc.nesting_level, 2);
        assert!(html.callbacks.blockhtml.is_none());
        let toc = options.toc_renderer();
        assert_eq!(toc.state.toc.nesting_level, 2);
        assert!(toc.callbacks.paragraph.is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_options_deserialize() {
        let options: HtmlOptions =
            serde_json::from_str(r#"{"flags": "escape,hard-wrap", "nesting-level": 3}"#).unwrap();
        assert_eq!(options.flags, HtmlFlags::ESCAPE | HtmlFlags::HARD_WRAP);
        assert_eq!(options.nesting_level, 3);

        let defaults: HtmlOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, HtmlOptions::default());
    }
}
