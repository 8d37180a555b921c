use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    Syntax(String),
    UndefinedBinding(String),
    TypeError { expected: String, got: String },
    DivisionByZero,
    UnsupportedLanguage(String),
    IoError(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Syntax(msg) => write!(f, "syntax error: {}", msg),
            EngineError::UndefinedBinding(name) => write!(f, "undefined binding: {}", name),
            EngineError::TypeError { expected, got } => {
                write!(f, "type error: expected {}, got {}", expected, got)
            }
            EngineError::DivisionByZero => write!(f, "division by zero"),
            EngineError::UnsupportedLanguage(lang) => {
                write!(f, "unsupported script language: {}", lang)
            }
            EngineError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}
