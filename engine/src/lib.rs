pub mod context;
pub mod error;
pub mod eval;
pub mod expr;
pub mod host;
pub mod pipeline;
pub mod script;
pub mod value;

pub use context::{DocumentMetadata, EvalContext, HostQuery, SystemQuery, TIMESTAMP_FORMAT};
pub use error::EngineError;
pub use eval::{DefaultEvaluator, EvalKind, EvalRequest, Evaluation, Evaluator, PendingEval};
pub use host::{Host, Severity};
pub use pipeline::{BatchReport, Pipeline, PipelineOptions};
pub use value::Value;
