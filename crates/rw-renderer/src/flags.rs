//! Construct metadata flags shared by parsers and renderers.
//!
//! Values are stable: they match the bit positions documented for each set
//! and may be persisted or passed across process boundaries.
//!
//! [`Extensions`] and [`HtmlFlags`] can be configured by name:
//!
//! ```
//! use rw_renderer::{Extensions, HtmlFlags};
//!
//! let ext: Extensions = "tables, footnotes".parse().unwrap();
//! assert!(ext.contains(Extensions::TABLES | Extensions::FOOTNOTES));
//!
//! let flags: HtmlFlags = "hard-wrap,use_xhtml".parse().unwrap();
//! assert_eq!(flags.to_string(), "hard-wrap,use-xhtml");
//! ```

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

/// Error returned when parsing a flag set from names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlagError {
    /// A name that does not belong to the flag set.
    #[error("Unknown {kind} flag: {name:?}")]
    Unknown {
        /// Flag set being parsed (e.g., "extension").
        kind: &'static str,
        /// The offending name.
        name: String,
    },
}

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident($repr:ty), $kind:literal {
            $( $(#[$fmeta:meta])* $flag:ident = $value:expr, $label:literal; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
        #[cfg_attr(
            feature = "serde",
            derive(serde::Serialize, serde::Deserialize),
            serde(try_from = "String", into = "String")
        )]
        pub struct $name($repr);

        impl $name {
            $( $(#[$fmeta])* pub const $flag: Self = Self($value); )*

            const NAMED: &'static [(&'static str, Self)] = &[$( ($label, Self::$flag) ),*];
            const ALL_BITS: $repr = 0 $( | $value )*;

            /// The empty set.
            #[must_use]
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Raw bit representation.
            #[must_use]
            pub const fn bits(self) -> $repr {
                self.0
            }

            /// Build a set from raw bits, dropping unknown ones.
            #[must_use]
            pub const fn from_bits_truncate(bits: $repr) -> Self {
                Self(bits & Self::ALL_BITS)
            }

            /// Whether every flag in `other` is set.
            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Whether any flag in `other` is set.
            #[must_use]
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// Whether no flag is set.
            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut first = true;
                for (label, flag) in Self::NAMED {
                    if self.contains(*flag) {
                        if !first {
                            f.write_str(",")?;
                        }
                        f.write_str(label)?;
                        first = false;
                    }
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x}: {})", stringify!($name), self.0, self)
            }
        }

        impl FromStr for $name {
            type Err = FlagError;

            fn from_str(s: &str) -> Result<Self, FlagError> {
                let mut set = Self::empty();
                for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    let normalized = name.to_ascii_lowercase().replace('_', "-");
                    let flag = Self::NAMED
                        .iter()
                        .find(|(label, _)| *label == normalized)
                        .map(|(_, flag)| *flag)
                        .ok_or_else(|| FlagError::Unknown {
                            kind: $kind,
                            name: name.to_owned(),
                        })?;
                    set |= flag;
                }
                Ok(set)
            }
        }

        impl TryFrom<String> for $name {
            type Error = FlagError;

            fn try_from(s: String) -> Result<Self, FlagError> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(set: $name) -> String {
                set.to_string()
            }
        }
    };
}

flag_set! {
    /// Parser extensions enabled for a document.
    Extensions(u32), "extension" {
        /// Pipe tables.
        TABLES = 1 << 0, "tables";
        /// Fenced code blocks.
        FENCED_CODE = 1 << 1, "fenced-code";
        /// Footnote references and definitions.
        FOOTNOTES = 1 << 2, "footnotes";
        /// Bare URL, `www.` and email autolinking.
        AUTOLINK = 1 << 3, "autolink";
        /// `~~deleted~~` spans.
        STRIKETHROUGH = 1 << 4, "strikethrough";
        /// Underline spans.
        UNDERLINE = 1 << 5, "underline";
        /// `==highlighted==` spans.
        HIGHLIGHT = 1 << 6, "highlight";
        /// Inline quotes.
        QUOTE = 1 << 7, "quote";
        /// `^superscript^` spans.
        SUPERSCRIPT = 1 << 8, "superscript";
        /// `$math$` spans.
        MATH = 1 << 9, "math";
        /// Ignore emphasis markers inside words.
        NO_INTRA_EMPHASIS = 1 << 11, "no-intra-emphasis";
        /// Require a space after `#` in headings.
        SPACE_HEADERS = 1 << 12, "space-headers";
        /// Only treat `$$` as math delimiters.
        MATH_EXPLICIT = 1 << 13, "math-explicit";
        /// Do not recognize indented code blocks.
        DISABLE_INDENTED_CODE = 1 << 14, "disable-indented-code";
    }
}

impl Extensions {
    /// Block-level extensions.
    pub const BLOCK: Self = Self(Self::TABLES.0 | Self::FENCED_CODE.0 | Self::FOOTNOTES.0);

    /// Span-level extensions.
    pub const SPAN: Self = Self(
        Self::AUTOLINK.0
            | Self::STRIKETHROUGH.0
            | Self::UNDERLINE.0
            | Self::HIGHLIGHT.0
            | Self::QUOTE.0
            | Self::SUPERSCRIPT.0
            | Self::MATH.0,
    );

    /// Parsing behavior flags.
    pub const FLAGS: Self =
        Self(Self::NO_INTRA_EMPHASIS.0 | Self::SPACE_HEADERS.0 | Self::MATH_EXPLICIT.0);

    /// Flags that turn standard syntax off.
    pub const NEGATIVE: Self = Self::DISABLE_INDENTED_CODE;
}

flag_set! {
    /// HTML backend rendering flags.
    HtmlFlags(u32), "html" {
        /// Drop raw HTML from the output.
        SKIP_HTML = 1 << 0, "skip-html";
        /// Escape raw HTML as text. Wins over `SKIP_HTML`.
        ESCAPE = 1 << 1, "escape";
        /// Render every newline inside a paragraph as a line break.
        HARD_WRAP = 1 << 2, "hard-wrap";
        /// Close void elements XHTML style (`<br/>`).
        USE_XHTML = 1 << 3, "use-xhtml";
    }
}

flag_set! {
    /// Flags passed to list and list item callbacks.
    ListFlags(u32), "list" {
        /// Ordered (`<ol>`) list.
        ORDERED = 1 << 0, "ordered";
        /// Item (or list) containing block content.
        BLOCK = 1 << 1, "block";
    }
}

/// Column alignment of a table cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    None,
    Left,
    Right,
    Center,
}

/// Flags passed to table cell callbacks: a 2-bit alignment and a header bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TableFlags(u32);

impl TableFlags {
    pub const ALIGN_LEFT: Self = Self(1);
    pub const ALIGN_RIGHT: Self = Self(2);
    pub const ALIGN_CENTER: Self = Self(3);
    pub const ALIGNMASK: Self = Self(3);
    pub const HEADER: Self = Self(4);

    /// Build flags from an alignment and header marker.
    #[must_use]
    pub const fn new(alignment: Alignment, header: bool) -> Self {
        let align = match alignment {
            Alignment::None => 0,
            Alignment::Left => Self::ALIGN_LEFT.0,
            Alignment::Right => Self::ALIGN_RIGHT.0,
            Alignment::Center => Self::ALIGN_CENTER.0,
        };
        Self(align | if header { Self::HEADER.0 } else { 0 })
    }

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Alignment encoded in the low two bits.
    #[must_use]
    pub const fn alignment(self) -> Alignment {
        match self.0 & Self::ALIGNMASK.0 {
            1 => Alignment::Left,
            2 => Alignment::Right,
            3 => Alignment::Center,
            _ => Alignment::None,
        }
    }

    /// Whether the cell belongs to the header row.
    #[must_use]
    pub const fn is_header(self) -> bool {
        self.0 & Self::HEADER.0 != 0
    }
}

/// Kind of link reported to the autolink callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AutolinkType {
    /// Not an autolink.
    #[default]
    None,
    /// A URL carrying its own scheme (`http://`, `mailto:`, ...).
    Normal,
    /// An email address without an explicit `mailto:`.
    Email,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_bits_are_stable() {
        assert_eq!(Extensions::TABLES.bits(), 1);
        assert_eq!(Extensions::MATH.bits(), 1 << 9);
        assert_eq!(Extensions::NO_INTRA_EMPHASIS.bits(), 1 << 11);
        assert_eq!(Extensions::DISABLE_INDENTED_CODE.bits(), 1 << 14);
        assert_eq!(HtmlFlags::USE_XHTML.bits(), 8);
        assert_eq!(ListFlags::BLOCK.bits(), 2);
    }

    #[test]
    fn test_extension_groups() {
        assert!(Extensions::BLOCK.contains(Extensions::FOOTNOTES));
        assert!(Extensions::SPAN.contains(Extensions::AUTOLINK | Extensions::MATH));
        assert!(!Extensions::SPAN.intersects(Extensions::BLOCK));
        assert!(Extensions::FLAGS.contains(Extensions::SPACE_HEADERS));
    }

    #[test]
    fn test_from_bits_truncate_drops_unknown() {
        let ext = Extensions::from_bits_truncate((1 << 10) | 1);
        assert_eq!(ext, Extensions::TABLES);
    }

    #[test]
    fn test_parse_names() {
        let ext: Extensions = "tables, Fenced_Code,autolink".parse().unwrap();
        assert_eq!(
            ext,
            Extensions::TABLES | Extensions::FENCED_CODE | Extensions::AUTOLINK
        );
        assert_eq!("".parse::<HtmlFlags>().unwrap(), HtmlFlags::empty());
    }

    #[test]
    fn test_parse_unknown_name() {
        let err = "tables,wiki".parse::<Extensions>().unwrap_err();
        assert_eq!(
            err,
            FlagError::Unknown {
                kind: "extension",
                name: "wiki".to_owned()
            }
        );
        assert_eq!(err.to_string(), r#"Unknown extension flag: "wiki""#);
    }

    #[test]
    fn test_display_roundtrip() {
        let flags = HtmlFlags::SKIP_HTML | HtmlFlags::HARD_WRAP;
        assert_eq!(flags.to_string(), "skip-html,hard-wrap");
        assert_eq!(flags.to_string().parse::<HtmlFlags>().unwrap(), flags);
    }

    #[test]
    fn test_debug_includes_bits() {
        let flags = ListFlags::ORDERED;
        assert_eq!(format!("{flags:?}"), "ListFlags(0x1: ordered)");
    }

    #[test]
    fn test_table_flags_alignment() {
        assert_eq!(TableFlags::ALIGN_CENTER.alignment(), Alignment::Center);
        assert_eq!(TableFlags::HEADER.alignment(), Alignment::None);
        let flags = TableFlags::new(Alignment::Right, true);
        assert_eq!(flags.bits(), 6);
        assert!(flags.is_header());
        assert_eq!(flags.alignment(), Alignment::Right);
        assert!(!TableFlags::new(Alignment::Left, false).is_header());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_as_names() {
        let json = serde_json::to_string(&(HtmlFlags::ESCAPE | HtmlFlags::USE_XHTML)).unwrap();
        assert_eq!(json, r#""escape,use-xhtml""#);
        let ext: Extensions = serde_json::from_str(r#""math,superscript""#).unwrap();
        assert_eq!(ext, Extensions::MATH | Extensions::SUPERSCRIPT);
    }
}
