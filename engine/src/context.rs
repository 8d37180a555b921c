use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Local};

use regen::MetadataMap;

use crate::value::Value;

/// Timestamp format stamped into end-marker metadata.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What the document itself contributes to evaluation: its location and its
/// front matter.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub path: Option<PathBuf>,
    pub frontmatter: MetadataMap,
}

impl DocumentMetadata {
    /// Resolve `file.*` and `meta.*` names.
    fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "file.path" => self
                .path
                .as_ref()
                .map(|p| Value::String(p.display().to_string())),
            "file.name" => self
                .path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| Value::String(n.to_string_lossy().into_owned())),
            _ => name
                .strip_prefix("meta.")
                .and_then(|key| self.frontmatter.get(key))
                .map(|v| Value::String(v.to_string())),
        }
    }
}

/// Host-provided capabilities available during evaluation. This is the whole
/// surface the evaluation engine gets; it is deliberately not an open-ended
/// bag of bindings.
pub trait HostQuery {
    fn now(&self) -> DateTime<Local>;
    fn query(&self, name: &str) -> Option<Value>;
}

/// The ambient host: wall clock, no extra names.
pub struct SystemQuery;

impl HostQuery for SystemQuery {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn query(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Everything an evaluator may consult for one document.
pub struct EvalContext<'a> {
    pub metadata: &'a DocumentMetadata,
    pub host: &'a dyn HostQuery,
    pub bindings: &'a HashMap<String, Value>,
}

impl EvalContext<'_> {
    /// Resolve a name: runtime bindings shadow document metadata, which
    /// shadows host queries; `now` is built in last.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        self.bindings
            .get(name)
            .cloned()
            .or_else(|| self.metadata.lookup(name))
            .or_else(|| self.host.query(name))
            .or_else(|| (name == "now").then(|| Value::String(self.timestamp())))
    }

    /// The current time in end-marker metadata format.
    pub fn timestamp(&self) -> String {
        self.host.now().format(TIMESTAMP_FORMAT).to_string()
    }
}
