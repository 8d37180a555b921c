use std::cell::RefCell;

use engine::{Host, Severity};
use regen::{TextBuffer, apply_patch};

/// Host over the in-memory buffer of one file.
///
/// All edits route through the incremental patcher; the caller writes the
/// buffer back to disk once the batch and its pending settlements finish.
pub struct FileHost {
    buffer: RefCell<TextBuffer>,
    quiet: bool,
}

impl FileHost {
    pub fn new(text: &str, quiet: bool) -> Self {
        FileHost {
            buffer: RefCell::new(TextBuffer::new(text)),
            quiet,
        }
    }

    pub fn text(&self) -> String {
        self.buffer.borrow().text()
    }
}

impl Host for FileHost {
    fn read_current_text(&self) -> String {
        self.buffer.borrow().text()
    }

    fn apply_patch(&self, old: &str, new: &str) {
        apply_patch(&mut self.buffer.borrow_mut(), old, new);
    }

    fn notify(&self, message: &str, severity: Severity) {
        if self.quiet && severity == Severity::Info {
            return;
        }
        eprintln!("{}: {}", severity, message);
    }
}
