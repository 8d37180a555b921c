use std::future::Future;

use tokio::task::JoinHandle;

use crate::context::EvalContext;
use crate::expr;
use crate::script;
use crate::value::Value;

/// What to evaluate for one section.
#[derive(Debug, Clone, Copy)]
pub struct EvalRequest<'a> {
    pub source: &'a str,
    pub kind: EvalKind<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum EvalKind<'a> {
    /// An inline label, evaluated as a single expression.
    Expression,
    /// A fenced-block label, executed as a full script body.
    Script { language: &'a str },
}

/// The outcome of dispatching one evaluation. Failures are converted at
/// this boundary and never propagate into the pipeline as errors.
pub enum Evaluation {
    Value(Value),
    /// The result has not settled; the section gets the pending placeholder
    /// and the handle is reconciled later against the live document.
    Deferred(PendingEval),
    Failure(String),
}

/// Handle to an evaluation still running on the local task set.
pub struct PendingEval {
    handle: JoinHandle<Result<String, String>>,
}

impl PendingEval {
    /// Spawn a deferred evaluation. Must be called from within a
    /// `tokio::task::LocalSet`.
    pub fn spawn(future: impl Future<Output = Result<String, String>> + 'static) -> Self {
        PendingEval {
            handle: tokio::task::spawn_local(future),
        }
    }

    /// Wait for the evaluation to settle.
    pub async fn settle(self) -> Result<String, String> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(format!("evaluation task failed: {}", e)),
        }
    }
}

/// The expression/script execution seam. Hosts may substitute their own
/// engine; the pipeline only sees `Evaluation`s.
pub trait Evaluator {
    fn evaluate(&self, request: &EvalRequest<'_>, ctx: &EvalContext<'_>) -> Evaluation;
}

/// The built-in engine: inline labels run through the expression evaluator,
/// fenced-script labels run as child processes.
pub struct DefaultEvaluator;

impl Evaluator for DefaultEvaluator {
    fn evaluate(&self, request: &EvalRequest<'_>, ctx: &EvalContext<'_>) -> Evaluation {
        match request.kind {
            EvalKind::Expression => match expr::evaluate(request.source, ctx) {
                Ok(value) => Evaluation::Value(value),
                Err(e) => Evaluation::Failure(e.to_string()),
            },
            EvalKind::Script { language } => {
                script::spawn(language, request.source, ctx.metadata)
            }
        }
    }
}
