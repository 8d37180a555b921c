use crate::extract::Extractor;
use crate::marker::Markers;
use crate::render::{Outcome, RenderOptions, render};
use crate::section::Section;

/// The result of composing a batch of rendered sections into a document.
#[derive(Debug, Clone)]
pub struct Composed {
    pub text: String,
    /// False when every rendered block matched its on-document text, so the
    /// composed text equals the input and nothing needs to be written.
    pub changed: bool,
    /// Sections whose outcome was pending, rebuilt with their span set to
    /// the rendered placeholder text so a later single-section recomposition
    /// can find them. Indexed into the input section list.
    pub pending: Vec<(usize, Section)>,
    /// Failed sections and their messages, indexed into the input list.
    pub failures: Vec<(usize, String)>,
}

/// Replace each section's span with its rendered block, in order.
///
/// Spans are matched by their literal captured substring on the *current*
/// working string, so earlier substitutions cannot invalidate later ones —
/// a sequential find-and-replace-first-occurrence pass.
pub fn compose(
    markers: &Markers,
    document: &str,
    sections: &[Section],
    outcomes: &[Outcome],
    options: &RenderOptions,
) -> Composed {
    debug_assert_eq!(sections.len(), outcomes.len());

    let mut working = document.to_string();
    let mut pending = Vec::new();
    let mut failures = Vec::new();

    for (index, (section, outcome)) in sections.iter().zip(outcomes).enumerate() {
        let rendered = render(markers, section, outcome, options);

        if rendered != section.span {
            working = working.replacen(&section.span, &rendered, 1);
        }

        match outcome {
            Outcome::Pending => {
                let mut placeholder = section.clone();
                placeholder.span = rendered;
                pending.push((index, placeholder));
            }
            Outcome::Failure(message) => failures.push((index, message.clone())),
            Outcome::Value(_) => {}
        }
    }

    let changed = working != document;
    Composed {
        text: working,
        changed,
        pending,
        failures,
    }
}

/// Compose a single-section update against a fresh document snapshot.
///
/// The section is located by literal substring search for the stored
/// placeholder span — not by id, since the document may have been edited by
/// the user or by other completions since dispatch. Returns `None` when the
/// placeholder can no longer be found intact; the caller drops the write.
pub fn recompose(
    markers: &Markers,
    document: &str,
    placeholder_span: &str,
    outcome: &Outcome,
    options: &RenderOptions,
) -> Option<Composed> {
    if !document.contains(placeholder_span) {
        return None;
    }

    let (sections, _) = Extractor::new(markers.clone()).extract(document);
    let section = sections.into_iter().find(|s| s.span == placeholder_span)?;

    Some(compose(
        markers,
        document,
        std::slice::from_ref(&section),
        std::slice::from_ref(outcome),
        options,
    ))
}
