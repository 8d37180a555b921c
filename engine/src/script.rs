use std::io::Write;

use tokio::process::Command;

use crate::context::DocumentMetadata;
use crate::error::EngineError;
use crate::eval::{Evaluation, PendingEval};

/// Map a fence language token to the interpreter that runs it.
fn interpreter(language: &str) -> Option<&'static str> {
    match language {
        "sh" | "shell" => Some("sh"),
        "bash" => Some("bash"),
        "python" | "python3" | "py" => Some("python3"),
        _ => None,
    }
}

/// Execute an embedded script as a child process and return the evaluation
/// as deferred: the section renders the pending placeholder immediately and
/// the captured stdout is reconciled when the process exits.
///
/// The script runs with the document's directory as working directory and
/// the document path in `REGEN_FILE`.
pub fn spawn(language: &str, code: &str, metadata: &DocumentMetadata) -> Evaluation {
    let Some(program) = interpreter(language) else {
        return Evaluation::Failure(
            EngineError::UnsupportedLanguage(language.to_string()).to_string(),
        );
    };

    let mut file = match tempfile::NamedTempFile::new() {
        Ok(file) => file,
        Err(e) => return Evaluation::Failure(EngineError::IoError(e.to_string()).to_string()),
    };
    if let Err(e) = file.write_all(code.as_bytes()) {
        return Evaluation::Failure(EngineError::IoError(e.to_string()).to_string());
    }

    let workdir = metadata
        .path
        .as_ref()
        .and_then(|p| p.parent())
        .filter(|d| !d.as_os_str().is_empty())
        .map(|d| d.to_path_buf());
    let document = metadata.path.clone();

    Evaluation::Deferred(PendingEval::spawn(async move {
        let mut command = Command::new(program);
        command.arg(file.path());
        if let Some(dir) = &workdir {
            command.current_dir(dir);
        }
        if let Some(path) = &document {
            command.env("REGEN_FILE", path);
        }

        let output = command
            .output()
            .await
            .map_err(|e| format!("cannot run {}: {}", program, e))?;

        // The temp file must outlive the child.
        drop(file);

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(stdout.trim_end_matches('\n').to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            if detail.is_empty() {
                Err(format!("script exited with {}", output.status))
            } else {
                Err(detail.to_string())
            }
        }
    }))
}
