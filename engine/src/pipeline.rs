use std::collections::HashMap;
use std::rc::Rc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use regen::{
    Extractor, Markers, Outcome, RenderOptions, Section, compose, frontmatter, recompose,
};

use crate::context::{DocumentMetadata, EvalContext, HostQuery, TIMESTAMP_FORMAT};
use crate::eval::{EvalKind, EvalRequest, Evaluation, Evaluator, PendingEval};
use crate::host::{Host, Severity};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Stamp a `last update` metadata line on successful renders.
    pub stamp_metadata: bool,
    /// Front-matter key that opts a whole document out of processing.
    pub ignore_key: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            stamp_metadata: true,
            ignore_key: "regen-ignore".to_string(),
        }
    }
}

/// What one batch did. Counts cover the sections found in this scan.
pub struct BatchReport {
    pub completed: usize,
    pub pending: usize,
    pub failed: usize,
    /// The document opted out via front matter; nothing was scanned.
    pub skipped: bool,
    /// Continuation tasks for deferred sections. Awaiting them observes
    /// settlement — a CLI does before writing the file out, an editor host
    /// leaves them to the event loop.
    pub settle_tasks: Vec<JoinHandle<()>>,
}

impl BatchReport {
    fn empty(skipped: bool) -> Self {
        BatchReport {
            completed: 0,
            pending: 0,
            failed: 0,
            skipped,
            settle_tasks: Vec::new(),
        }
    }
}

/// Extract → evaluate → render → compose → patch, plus the pending-result
/// tracker for evaluations that settle later.
pub struct Pipeline {
    markers: Markers,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(markers: Markers, options: PipelineOptions) -> Self {
        Pipeline { markers, options }
    }

    /// Run one batch against the host's current text.
    ///
    /// Must be called from within a `tokio::task::LocalSet` whenever a
    /// section can defer (scripts, asynchronous evaluators). The batch
    /// itself runs synchronously to completion; deferred sections render
    /// the pending placeholder and reconcile on their own tasks.
    pub fn run_batch<H: Host + 'static>(
        &self,
        host: &Rc<H>,
        evaluator: &dyn Evaluator,
        query: &Rc<dyn HostQuery>,
        metadata: &DocumentMetadata,
        bindings: &HashMap<String, Value>,
    ) -> BatchReport {
        let text = host.read_current_text();

        if frontmatter::is_ignored(&text, &self.options.ignore_key) {
            debug!(key = %self.options.ignore_key, "document opts out, skipping");
            return BatchReport::empty(true);
        }

        let (sections, _) = Extractor::new(self.markers.clone()).extract(&text);
        if sections.is_empty() {
            return BatchReport::empty(false);
        }

        let ctx = EvalContext {
            metadata,
            host: query.as_ref(),
            bindings,
        };

        // Evaluate every section up front; deferred handles are kept by
        // section index until composition decides their placeholders.
        let mut outcomes = Vec::with_capacity(sections.len());
        let mut handles: HashMap<usize, PendingEval> = HashMap::new();
        for (index, section) in sections.iter().enumerate() {
            let request = match &section.script {
                Some(script) => EvalRequest {
                    source: &script.code,
                    kind: EvalKind::Script {
                        language: &script.language,
                    },
                },
                None => EvalRequest {
                    source: &section.label,
                    kind: EvalKind::Expression,
                },
            };
            match evaluator.evaluate(&request, &ctx) {
                Evaluation::Value(value) => outcomes.push(Outcome::Value(value.to_string())),
                Evaluation::Deferred(handle) => {
                    handles.insert(index, handle);
                    outcomes.push(Outcome::Pending);
                }
                Evaluation::Failure(message) => outcomes.push(Outcome::Failure(message)),
            }
        }

        let composed = compose(
            &self.markers,
            &text,
            &sections,
            &outcomes,
            &self.render_options(query),
        );

        if composed.changed {
            host.apply_patch(&text, &composed.text);
        }

        for (index, message) in &composed.failures {
            let section = &sections[*index];
            warn!(label = %section.label, id = section.id, %message, "evaluation failed");
        }

        let pending = composed.pending.len();
        let failed = composed.failures.len();
        let completed = sections.len() - pending - failed;

        host.notify(
            &format!(
                "{} updated, {} pending, {} failed",
                completed, pending, failed
            ),
            if failed > 0 {
                Severity::Error
            } else {
                Severity::Info
            },
        );

        // Attach a continuation per deferred section. Each settles
        // independently; there is no ordering between them.
        let mut settle_tasks = Vec::new();
        for (index, placeholder) in composed.pending {
            let Some(handle) = handles.remove(&index) else {
                continue;
            };
            settle_tasks.push(self.track(host, query, placeholder, handle));
        }

        BatchReport {
            completed,
            pending,
            failed,
            skipped: false,
            settle_tasks,
        }
    }

    /// The pending-result tracker for one section: wait for the handle,
    /// then read-modify-write against whatever text is live at settle time,
    /// not the snapshot from dispatch.
    fn track<H: Host + 'static>(
        &self,
        host: &Rc<H>,
        query: &Rc<dyn HostQuery>,
        section: Section,
        handle: PendingEval,
    ) -> JoinHandle<()> {
        let markers = self.markers.clone();
        let stamp = self.options.stamp_metadata;
        let host = Rc::clone(host);
        let query = Rc::clone(query);

        tokio::task::spawn_local(async move {
            let outcome = match handle.settle().await {
                Ok(value) => Outcome::Value(value),
                Err(message) => {
                    host.notify(
                        &format!(
                            "section '{}' #{}: {}",
                            section.label, section.id, message
                        ),
                        Severity::Error,
                    );
                    Outcome::Failure(message)
                }
            };

            let options = RenderOptions {
                timestamp: stamp.then(|| query.now().format(TIMESTAMP_FORMAT).to_string()),
            };

            let current = host.read_current_text();
            match recompose(&markers, &current, &section.span, &outcome, &options) {
                Some(composed) if composed.changed => host.apply_patch(&current, &composed.text),
                Some(_) => {}
                None => debug!(
                    label = %section.label,
                    id = section.id,
                    "placeholder no longer present, dropping result"
                ),
            }
        })
    }

    fn render_options(&self, query: &Rc<dyn HostQuery>) -> RenderOptions {
        RenderOptions {
            timestamp: self
                .options
                .stamp_metadata
                .then(|| query.now().format(TIMESTAMP_FORMAT).to_string()),
        }
    }
}
