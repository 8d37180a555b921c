use std::collections::HashMap;
use std::ops::Range;

use crate::metadata::MetadataMap;

/// One directive block instance found in a document.
///
/// A section is immutable once produced by a scan. A settled-later update
/// re-extracts a fresh section from the live document rather than mutating
/// this one, because the document may have shifted underneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Sequence number disambiguating blocks that share a label: the first
    /// occurrence of a label gets 1, the next 2, and so on in document order.
    /// Recomputed from scratch on every scan, never persisted.
    pub id: u32,
    /// The trimmed directive text between the start marker's prefix and its
    /// closing `%%`, with any legacy numeric-id prefix stripped.
    pub label: String,
    /// Present when the label is exactly one fenced code block.
    pub script: Option<EmbeddedScript>,
    /// Content between the markers. `None` while the block is open.
    pub body: Option<String>,
    /// Raw trimmed text of the end marker's metadata region.
    pub closing_label: Option<String>,
    /// `closing_label` parsed as `key: value` lines.
    pub closing_metadata: Option<MetadataMap>,
    /// The exact substring of the document this section occupies, from the
    /// start marker through the end marker (or the start marker alone if the
    /// block is open). Replacement is anchored on this literal text, never on
    /// a byte offset.
    pub span: String,
    /// Byte range of the span at extraction time. Diagnostics only; offsets
    /// go stale as soon as any earlier section is rewritten.
    pub source_range: Range<usize>,
}

impl Section {
    pub fn is_closed(&self) -> bool {
        self.body.is_some()
    }
}

/// A fenced code block used as a section label: the whole label is
/// `fence, language token, newline, body, newline, fence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedScript {
    pub language: String,
    pub code: String,
}

/// Per-scan counter of label occurrences, used solely to assign [`Section::id`].
pub type LabelFrequency = HashMap<String, u32>;
