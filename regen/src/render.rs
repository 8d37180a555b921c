use crate::marker::Markers;
use crate::metadata::MetadataMap;
use crate::section::Section;

/// Literal stand-in for a value that has not settled yet.
pub const PENDING_PLACEHOLDER: &str = "Loading...";

/// Metadata key recording when a block was last rewritten.
pub const LAST_UPDATE_KEY: &str = "last update";

/// Metadata key carrying the latest evaluation failure. Error state lives
/// only here, so writing a block back preserves whatever other metadata
/// existed.
pub const ERROR_KEY: &str = "error";

/// The rendered effect of evaluating one section.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Evaluation produced a value to splice into the block.
    Value(String),
    /// Evaluation produced an unsettled asynchronous result; the block gets
    /// the fixed placeholder until it settles.
    Pending,
    /// Evaluation failed. The block keeps its previous body and the message
    /// is recorded in the end marker's metadata.
    Failure(String),
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// When set, successful renders stamp a `last update` metadata line with
    /// this `YYYY-MM-DD HH:MM:SS` timestamp.
    pub timestamp: Option<String>,
}

/// Produce the new literal text for a section's block.
///
/// Success builds a fresh metadata map (clearing any previous error);
/// failure keeps the previous body untouched and merges an `error` entry
/// into the previous metadata.
pub fn render(
    markers: &Markers,
    section: &Section,
    outcome: &Outcome,
    options: &RenderOptions,
) -> String {
    let (content, metadata) = match outcome {
        Outcome::Value(value) => (value.clone(), stamped(options)),
        Outcome::Pending => (PENDING_PLACEHOLDER.to_string(), stamped(options)),
        Outcome::Failure(message) => {
            let body = section.body.clone().unwrap_or_default();
            let mut metadata = section.closing_metadata.clone().unwrap_or_default();
            metadata.insert(ERROR_KEY, single_line(message));
            (body, metadata)
        }
    };

    format!(
        "{}\n{}\n{}",
        start_marker(markers, &section.label),
        content,
        end_marker(markers, &metadata),
    )
}

fn stamped(options: &RenderOptions) -> MetadataMap {
    let mut metadata = MetadataMap::new();
    if let Some(timestamp) = &options.timestamp {
        metadata.insert(LAST_UPDATE_KEY, timestamp.clone());
    }
    metadata
}

/// Metadata values are one line each; fold any newlines in a failure
/// message so the end marker stays parseable.
fn single_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

fn start_marker(markers: &Markers, label: &str) -> String {
    let prefix = markers.start_prefix();
    if label.is_empty() {
        format!("{} %%", prefix)
    } else if label.contains('\n') {
        format!("{}\n{}\n%%", prefix, label)
    } else {
        format!("{} {} %%", prefix, label)
    }
}

fn end_marker(markers: &Markers, metadata: &MetadataMap) -> String {
    let prefix = markers.end_prefix();
    if metadata.is_empty() {
        format!("{} %%", prefix)
    } else {
        format!("{}\n{}\n%%", prefix, metadata.to_lines())
    }
}
