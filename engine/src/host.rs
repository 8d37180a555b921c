use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// The document surface the pipeline works against.
///
/// The host owns the live buffer. All mutation goes through `apply_patch`,
/// which the pipeline invokes at most once per batch and at most once per
/// individually settled section; `read_current_text` must always reflect
/// prior patches and any concurrent user edits.
pub trait Host {
    fn read_current_text(&self) -> String;
    fn apply_patch(&self, old: &str, new: &str);
    fn notify(&self, message: &str, severity: Severity);
}
