use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::marker::Markers;
use crate::metadata::MetadataMap;
use crate::section::{EmbeddedScript, LabelFrequency, Section};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Scans raw text for directive blocks.
pub struct Extractor {
    markers: Markers,
}

impl Extractor {
    pub fn new(markers: Markers) -> Self {
        Extractor { markers }
    }

    /// Find every directive block in `document`, in document order.
    ///
    /// Also returns the label-frequency table the scan used to assign ids.
    pub fn extract(&self, document: &str) -> (Vec<Section>, LabelFrequency) {
        let starts = scan_markers(document, &self.markers.start_prefix(), 0);
        let end_prefix = self.markers.end_prefix();

        let mut sections = Vec::with_capacity(starts.len());
        let mut frequency = LabelFrequency::new();

        for (i, start) in starts.iter().enumerate() {
            let label = parse_label(&document[start.inner.clone()]);
            let script = detect_script(&label);

            let id = {
                let count = frequency.entry(label.clone()).or_insert(0);
                *count += 1;
                *count
            };

            // A fresh search for the next end marker, starting right after
            // this start marker's match. End markers are not consumed: an end
            // marker rejected here may still close a later block.
            let end = find_marker(document, &end_prefix, start.range.end);

            // The end marker belongs to this block only if it comes before
            // the next block's start marker (or there is no next block).
            let next_start = starts.get(i + 1);
            let accepted = match (&end, next_start) {
                (Some(end), Some(next)) => end.range.start < next.range.start,
                (Some(_), None) => true,
                (None, _) => false,
            };

            if accepted {
                let end = end.unwrap();
                let body = document[start.range.end..end.range.start].trim();
                let closing_label = document[end.inner.clone()].trim();
                sections.push(Section {
                    id,
                    label,
                    script,
                    body: Some(body.to_string()),
                    closing_label: Some(closing_label.to_string()),
                    closing_metadata: Some(MetadataMap::parse(closing_label)),
                    span: document[start.range.start..end.range.end].to_string(),
                    source_range: start.range.start..end.range.end,
                });
            } else {
                // Open block: the span is the start marker's own matched text.
                sections.push(Section {
                    id,
                    label,
                    script,
                    body: None,
                    closing_label: None,
                    closing_metadata: None,
                    span: document[start.range.clone()].to_string(),
                    source_range: start.range.clone(),
                });
            }
        }

        (sections, frequency)
    }
}

// ---------------------------------------------------------------------------
// Marker scanning
// ---------------------------------------------------------------------------

/// One matched marker: the full match and the captured text inside it.
struct MarkerMatch {
    /// Byte range of the whole marker, `%%` to `%%` inclusive.
    range: Range<usize>,
    /// Byte range of the free-form text between the prefix and the
    /// terminating `%%`.
    inner: Range<usize>,
}

/// Find every `<prefix> ... %%` marker at or after `from`, left to right,
/// non-overlapping. A prefix with no subsequent `%%` is not a marker.
fn scan_markers(document: &str, prefix: &str, from: usize) -> Vec<MarkerMatch> {
    let mut matches = Vec::new();
    let mut pos = from;

    while let Some(marker) = find_marker(document, prefix, pos) {
        pos = marker.range.end;
        matches.push(marker);
    }

    matches
}

/// Find the first `<prefix> ... %%` marker at or after `from`.
fn find_marker(document: &str, prefix: &str, from: usize) -> Option<MarkerMatch> {
    let start = from + document[from..].find(prefix)?;
    let inner_start = start + prefix.len();

    // A prefix with no terminator anywhere after it is not a marker.
    let inner_end = inner_start + document[inner_start..].find("%%")?;

    Some(MarkerMatch {
        range: start..inner_end + 2,
        inner: inner_start..inner_end,
    })
}

// ---------------------------------------------------------------------------
// Label parsing
// ---------------------------------------------------------------------------

/// Trim the captured label text and strip a legacy `^\d+\s+` id prefix.
/// The numeric prefix must still parse, but its value is discarded.
fn parse_label(raw: &str) -> String {
    let trimmed = raw.trim();

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return trimmed.to_string();
    }

    let rest = &trimmed[digits..];
    if rest.starts_with(char::is_whitespace) {
        rest.trim_start().to_string()
    } else {
        // All digits, or digits glued to text: not the legacy convention.
        trimmed.to_string()
    }
}

/// Detect a label that is exactly one fenced code block with a language
/// token. Anything else around the fence disqualifies it.
fn detect_script(label: &str) -> Option<EmbeddedScript> {
    let mut events = CmarkParser::new_ext(label, Options::empty());

    let language = match events.next() {
        Some(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))) => {
            info.split_whitespace().next()?.to_string()
        }
        _ => return None,
    };

    let mut code = String::new();
    for event in events.by_ref() {
        match event {
            Event::Text(text) => code.push_str(&text),
            Event::End(TagEnd::CodeBlock) => break,
            _ => return None,
        }
    }

    // The fence must be the entire label.
    if events.next().is_some() {
        return None;
    }

    if code.ends_with('\n') {
        code.pop();
    }

    Some(EmbeddedScript { language, code })
}
