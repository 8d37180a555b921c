/// The directive marker grammar for one namespace token.
///
/// Markers are line-agnostic literals:
///
/// ```text
/// %% <ns> start <label-text> %%
/// %% <ns> end <metadata-text> %%
/// ```
///
/// The captured text is free-form and may span multiple lines; it is
/// terminated by the first subsequent `%%`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    namespace: String,
}

impl Markers {
    pub fn new(namespace: impl Into<String>) -> Self {
        Markers {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Literal prefix of a start marker, up to (not including) the label.
    pub fn start_prefix(&self) -> String {
        format!("%% {} start", self.namespace)
    }

    /// Literal prefix of an end marker, up to (not including) the metadata.
    pub fn end_prefix(&self) -> String {
        format!("%% {} end", self.namespace)
    }
}

impl Default for Markers {
    fn default() -> Self {
        Markers::new("regen")
    }
}
