use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

use crate::section::Section;

/// Advisory diagnostics for a scanned document.
///
/// An open block is a recognized valid state, so these are warnings, never
/// errors. Spans come from extraction-time byte ranges and are only valid
/// against the scanned text.
pub fn section_diagnostics(sections: &[Section], file_id: usize) -> Vec<Diagnostic<usize>> {
    sections
        .iter()
        .filter(|section| !section.is_closed())
        .map(|section| {
            let name = if section.label.is_empty() {
                format!("unlabeled block #{}", section.id)
            } else {
                format!("block '{}' #{}", first_line(&section.label), section.id)
            };
            Diagnostic::new(Severity::Warning)
                .with_message(format!("{} has no end marker", name))
                .with_labels(vec![Label::primary(file_id, section.source_range.clone())])
                .with_notes(vec![
                    "an end marker after a later start marker closes that block instead"
                        .to_string(),
                ])
        })
        .collect()
}

fn first_line(label: &str) -> &str {
    label.lines().next().unwrap_or(label)
}
