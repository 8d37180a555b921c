use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Local, TimeZone};
use tokio::sync::oneshot;

use engine::{
    BatchReport, DefaultEvaluator, DocumentMetadata, EvalContext, EvalRequest, Evaluation,
    Evaluator, Host, HostQuery, PendingEval, Pipeline, PipelineOptions, Severity, Value,
};
use regen::{Markers, PENDING_PLACEHOLDER, TextBuffer, apply_patch};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// In-memory host recording every notification.
struct MemoryHost {
    buffer: RefCell<TextBuffer>,
    notices: RefCell<Vec<(String, Severity)>>,
}

impl MemoryHost {
    fn new(text: &str) -> Self {
        MemoryHost {
            buffer: RefCell::new(TextBuffer::new(text)),
            notices: RefCell::new(Vec::new()),
        }
    }

    fn text(&self) -> String {
        self.buffer.borrow().text()
    }

    /// Simulate a concurrent user edit: replace the live text wholesale.
    fn overwrite(&self, text: &str) {
        *self.buffer.borrow_mut() = TextBuffer::new(text);
    }

    fn notices(&self) -> Vec<(String, Severity)> {
        self.notices.borrow().clone()
    }
}

impl Host for MemoryHost {
    fn read_current_text(&self) -> String {
        self.buffer.borrow().text()
    }

    fn apply_patch(&self, old: &str, new: &str) {
        apply_patch(&mut self.buffer.borrow_mut(), old, new);
    }

    fn notify(&self, message: &str, severity: Severity) {
        self.notices
            .borrow_mut()
            .push((message.to_string(), severity));
    }
}

/// Deterministic clock for stable `last update` stamps.
struct FixedClock;

impl HostQuery for FixedClock {
    fn now(&self) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn query(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Evaluator whose single deferred result settles when the test says so.
struct ManualEvaluator {
    trigger: RefCell<Option<oneshot::Receiver<Result<String, String>>>>,
}

impl ManualEvaluator {
    fn new() -> (Self, oneshot::Sender<Result<String, String>>) {
        let (tx, rx) = oneshot::channel();
        (
            ManualEvaluator {
                trigger: RefCell::new(Some(rx)),
            },
            tx,
        )
    }
}

impl Evaluator for ManualEvaluator {
    fn evaluate(&self, _request: &EvalRequest<'_>, _ctx: &EvalContext<'_>) -> Evaluation {
        let rx = self.trigger.borrow_mut().take().expect("single section");
        Evaluation::Deferred(PendingEval::spawn(async move {
            rx.await.unwrap_or_else(|e| Err(e.to_string()))
        }))
    }
}

fn pipeline(stamp_metadata: bool) -> Pipeline {
    Pipeline::new(
        Markers::default(),
        PipelineOptions {
            stamp_metadata,
            ..PipelineOptions::default()
        },
    )
}

/// Run one batch with the default evaluator and wait for every deferred
/// section to settle.
fn run_to_completion(document: &str, stamp_metadata: bool) -> (Rc<MemoryHost>, BatchReport) {
    run_with(document, stamp_metadata, &DefaultEvaluator, |_| {})
}

/// Run one batch, invoking `between` after dispatch but before settlement.
fn run_with(
    document: &str,
    stamp_metadata: bool,
    evaluator: &dyn Evaluator,
    between: impl FnOnce(&MemoryHost),
) -> (Rc<MemoryHost>, BatchReport) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let local = tokio::task::LocalSet::new();

    let host = Rc::new(MemoryHost::new(document));
    let query: Rc<dyn HostQuery> = Rc::new(FixedClock);
    let metadata = DocumentMetadata::default();
    let bindings = HashMap::new();
    let pipeline = pipeline(stamp_metadata);

    let report = runtime.block_on(local.run_until(async {
        let mut report = pipeline.run_batch(&host, evaluator, &query, &metadata, &bindings);
        between(&host);
        for task in report.settle_tasks.drain(..) {
            let _ = task.await;
        }
        report
    }));

    (host, report)
}

// ---------------------------------------------------------------------------
// Batch behavior
// ---------------------------------------------------------------------------

#[test]
fn expression_batch_rewrites_the_document() {
    let doc = "# Notes\n\n%% regen start 1+1 %%\nold\n%% regen end %%\n";
    let (host, report) = run_to_completion(doc, false);

    assert_eq!(
        host.text(),
        "# Notes\n\n%% regen start 1+1 %%\n2\n%% regen end %%\n"
    );
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(
        host.notices(),
        vec![("1 updated, 0 pending, 0 failed".to_string(), Severity::Info)]
    );
}

#[test]
fn failure_is_isolated_from_sibling_sections() {
    let doc = "\
%% regen start x + %%
kept
%% regen end %%
%% regen start 2*3 %%
old
%% regen end %%";
    let (host, report) = run_to_completion(doc, false);

    let text = host.text();
    // The failing block keeps its body and gains an error entry.
    assert!(text.contains("kept"));
    assert!(text.contains("error: syntax error"));
    // The sibling still updates.
    assert!(text.contains("\n6\n"));

    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(
        host.notices(),
        vec![("1 updated, 0 pending, 1 failed".to_string(), Severity::Error)]
    );
}

#[test]
fn successful_render_stamps_the_host_clock() {
    let doc = "%% regen start 40+2 %%\nold\n%% regen end %%";
    let (host, _) = run_to_completion(doc, true);

    assert_eq!(
        host.text(),
        "%% regen start 40+2 %%\n42\n%% regen end\nlast update: 2024-01-01 00:00:00\n%%"
    );
}

#[test]
fn reruns_are_idempotent() {
    let doc = "%% regen start 40+2 %%\nold\n%% regen end %%";
    let (host, _) = run_to_completion(doc, true);
    let first = host.text();

    let (host, _) = run_to_completion(&first, true);
    assert_eq!(host.text(), first);
}

#[test]
fn front_matter_key_opts_the_document_out() {
    let doc = "---\nregen-ignore: true\n---\n%% regen start 1+1 %%\nold\n%% regen end %%";
    let (host, report) = run_to_completion(doc, false);

    assert!(report.skipped);
    assert_eq!(host.text(), doc);
    assert!(host.notices().is_empty());
}

#[test]
fn documents_without_blocks_are_left_alone() {
    let doc = "just prose, no directives";
    let (host, report) = run_to_completion(doc, false);

    assert_eq!(host.text(), doc);
    assert_eq!(report.completed, 0);
    assert!(host.notices().is_empty());
}

#[test]
fn empty_label_records_an_error() {
    let doc = "%% regen start %%\nkept\n%% regen end %%";
    let (host, report) = run_to_completion(doc, false);

    assert_eq!(report.failed, 1);
    assert!(host.text().contains("kept"));
    assert!(host.text().contains("error: syntax error: empty expression"));
}

// ---------------------------------------------------------------------------
// Embedded scripts
// ---------------------------------------------------------------------------

#[test]
fn shell_script_defers_then_settles() {
    let doc = "\
%% regen start
```sh
echo from-script
```
%%
old
%% regen end %%";
    let (host, report) = run_to_completion(doc, false);

    assert_eq!(report.pending, 1);
    assert!(host.text().contains("\nfrom-script\n"));
    assert!(!host.text().contains(PENDING_PLACEHOLDER));
}

#[test]
fn failing_script_reports_per_section() {
    let doc = "\
%% regen start
```sh
echo oops >&2
exit 3
```
%%
kept
%% regen end %%";
    let (host, _) = run_to_completion(doc, false);

    let text = host.text();
    assert!(text.contains("error: oops"));
    assert!(
        host.notices()
            .iter()
            .any(|(message, severity)| message.contains("oops") && *severity == Severity::Error)
    );
}

#[test]
fn script_receives_the_document_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.md");
    let doc = "%% regen start\n```sh\necho \"$REGEN_FILE\"\n```\n%%\nold\n%% regen end %%";

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let local = tokio::task::LocalSet::new();

    let host = Rc::new(MemoryHost::new(doc));
    let query: Rc<dyn HostQuery> = Rc::new(FixedClock);
    let metadata = DocumentMetadata {
        path: Some(path),
        frontmatter: regen::MetadataMap::new(),
    };
    let bindings = HashMap::new();
    let pipeline = pipeline(false);

    runtime.block_on(local.run_until(async {
        let mut report = pipeline.run_batch(&host, &DefaultEvaluator, &query, &metadata, &bindings);
        for task in report.settle_tasks.drain(..) {
            let _ = task.await;
        }
    }));

    assert!(host.text().contains("doc.md"));
}

#[test]
fn unknown_script_language_fails_cleanly() {
    let doc = "\
%% regen start
```cobol
DISPLAY 'HELLO'.
```
%%
kept
%% regen end %%";
    let (host, report) = run_to_completion(doc, false);

    assert_eq!(report.failed, 1);
    assert!(host.text().contains("kept"));
    assert!(
        host.text()
            .contains("error: unsupported script language: cobol")
    );
}

// ---------------------------------------------------------------------------
// Pending reconciliation
// ---------------------------------------------------------------------------

#[test]
fn settlement_survives_a_concurrent_edit() {
    let doc = "%% regen start x %%\nold\n%% regen end %%";
    let (evaluator, tx) = ManualEvaluator::new();

    let (host, report) = run_with(doc, false, &evaluator, move |host| {
        // Placeholder is live; the user appends unrelated text elsewhere.
        assert!(host.text().contains(PENDING_PLACEHOLDER));
        let edited = format!("{}\nappended later", host.text());
        host.overwrite(&edited);
        tx.send(Ok("resolved".to_string())).unwrap();
    });

    assert_eq!(report.pending, 1);
    let text = host.text();
    assert_eq!(
        text,
        "%% regen start x %%\nresolved\n%% regen end %%\nappended later"
    );
}

#[test]
fn settlement_is_dropped_when_the_placeholder_is_gone() {
    let doc = "%% regen start x %%\nold\n%% regen end %%";
    let (evaluator, tx) = ManualEvaluator::new();

    let (host, _) = run_with(doc, false, &evaluator, move |host| {
        // The user deletes the whole block before the result settles.
        host.overwrite("the block is gone");
        tx.send(Ok("resolved".to_string())).unwrap();
    });

    assert_eq!(host.text(), "the block is gone");
    // A miss is logged, not notified.
    assert_eq!(host.notices().len(), 1);
}

#[test]
fn late_failure_notifies_with_the_section_id() {
    let doc = "%% regen start x %%\nold\n%% regen end %%";
    let (evaluator, tx) = ManualEvaluator::new();

    let (host, _) = run_with(doc, false, &evaluator, move |_| {
        tx.send(Err("kaboom".to_string())).unwrap();
    });

    let text = host.text();
    // The failure lands on the placeholder body that was live at settle time.
    assert!(text.contains(PENDING_PLACEHOLDER));
    assert!(text.contains("error: kaboom"));
    assert!(
        host.notices()
            .iter()
            .any(|(message, severity)| {
                message.contains("section 'x' #1") && *severity == Severity::Error
            })
    );
}

// ---------------------------------------------------------------------------
// Expression engine
// ---------------------------------------------------------------------------

fn eval_expr(source: &str) -> Result<String, String> {
    let metadata = DocumentMetadata::default();
    let bindings = HashMap::new();
    let clock = FixedClock;
    let ctx = EvalContext {
        metadata: &metadata,
        host: &clock,
        bindings: &bindings,
    };
    engine::expr::evaluate(source, &ctx)
        .map(|value| value.to_string())
        .map_err(|e| e.to_string())
}

#[test]
fn arithmetic() {
    assert_eq!(eval_expr("2 + 3").unwrap(), "5");
    assert_eq!(eval_expr("10 - 4").unwrap(), "6");
    assert_eq!(eval_expr("3 * 7").unwrap(), "21");
    assert_eq!(eval_expr("15 / 3").unwrap(), "5");
    assert_eq!(eval_expr("10 % 3").unwrap(), "1");
}

#[test]
fn operator_precedence() {
    assert_eq!(eval_expr("2 + 3 * 4").unwrap(), "14");
    assert_eq!(eval_expr("(2 + 3) * 4").unwrap(), "20");
}

#[test]
fn unary_operators() {
    assert_eq!(eval_expr("-5 + 10").unwrap(), "5");
    assert_eq!(eval_expr("!false").unwrap(), "true");
    assert_eq!(eval_expr("!true").unwrap(), "false");
}

#[test]
fn boolean_logic() {
    assert_eq!(eval_expr("true && false").unwrap(), "false");
    assert_eq!(eval_expr("true || false").unwrap(), "true");
    assert_eq!(eval_expr("5 == 5").unwrap(), "true");
    assert_eq!(eval_expr("5 != 3").unwrap(), "true");
    assert_eq!(eval_expr("3 > 5").unwrap(), "false");
    assert_eq!(eval_expr("3 <= 5").unwrap(), "true");
}

#[test]
fn string_operations() {
    assert_eq!(eval_expr("\"hello\"").unwrap(), "hello");
    assert_eq!(eval_expr("\"a\" + \"b\"").unwrap(), "ab");
    assert_eq!(eval_expr("\"n = \" + 42").unwrap(), "n = 42");
    assert_eq!(eval_expr("\"a\" < \"b\"").unwrap(), "true");
}

#[test]
fn conditional_expression() {
    assert_eq!(eval_expr("10 > 5 ? \"yes\" : \"no\"").unwrap(), "yes");
    assert_eq!(eval_expr("3 > 5 ? \"yes\" : \"no\"").unwrap(), "no");
}

#[test]
fn builtin_now_uses_the_host_clock() {
    assert_eq!(eval_expr("now").unwrap(), "2024-01-01 00:00:00");
}

#[test]
fn evaluation_errors() {
    assert!(eval_expr("1 / 0").unwrap_err().contains("division by zero"));
    assert!(eval_expr("missing").unwrap_err().contains("undefined binding"));
    assert!(eval_expr("1 +").unwrap_err().contains("syntax error"));
    assert!(eval_expr("\"a\" - 1").unwrap_err().contains("type error"));
}

#[test]
fn bindings_shadow_builtins() {
    let metadata = DocumentMetadata::default();
    let mut bindings = HashMap::new();
    bindings.insert("now".to_string(), Value::String("never".to_string()));
    let clock = FixedClock;
    let ctx = EvalContext {
        metadata: &metadata,
        host: &clock,
        bindings: &bindings,
    };
    let value = engine::expr::evaluate("now", &ctx).unwrap();
    assert_eq!(value.to_string(), "never");
}

#[test]
fn document_metadata_is_resolvable() {
    let metadata = DocumentMetadata {
        path: Some("notes/today.md".into()),
        frontmatter: regen::MetadataMap::parse("title: Daily log"),
    };
    let bindings = HashMap::new();
    let clock = FixedClock;
    let ctx = EvalContext {
        metadata: &metadata,
        host: &clock,
        bindings: &bindings,
    };

    let name = engine::expr::evaluate("file.name", &ctx).unwrap();
    assert_eq!(name.to_string(), "today.md");
    let title = engine::expr::evaluate("meta.title", &ctx).unwrap();
    assert_eq!(title.to_string(), "Daily log");
}
