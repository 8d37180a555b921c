use crate::diff::{Chunk, diff};

/// A caret location in a buffer. `column` is counted in characters, not
/// bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// The position reached after walking over `text` from `self`.
    pub fn advanced(self, text: &str) -> Position {
        let mut line = self.line;
        let mut column = self.column;
        for c in text.chars() {
            if c == '\n' {
                line += 1;
                column = 0;
            } else {
                column += 1;
            }
        }
        Position { line, column }
    }
}

/// One edit operation against a live buffer, in line/column coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    Insert { at: Position, text: String },
    Delete { from: Position, to: Position },
}

/// A line-oriented text buffer that accepts range edits, standing in for a
/// host editor's document. Lines are joined by `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    lines: Vec<String>,
}

impl TextBuffer {
    pub fn new(text: &str) -> Self {
        TextBuffer {
            lines: text.split('\n').map(String::from).collect(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn insert(&mut self, at: Position, text: &str) {
        let byte = char_to_byte(&self.lines[at.line], at.column);
        let tail = self.lines[at.line].split_off(byte);

        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            self.lines[at.line].push_str(first);
        }

        let rest: Vec<&str> = parts.collect();
        if rest.is_empty() {
            self.lines[at.line].push_str(&tail);
            return;
        }
        for (k, part) in rest.iter().enumerate() {
            let mut new_line = (*part).to_string();
            if k == rest.len() - 1 {
                new_line.push_str(&tail);
            }
            self.lines.insert(at.line + 1 + k, new_line);
        }
    }

    pub fn delete(&mut self, from: Position, to: Position) {
        if from.line == to.line {
            let line = &mut self.lines[from.line];
            let start = char_to_byte(line, from.column);
            let end = char_to_byte(line, to.column);
            line.replace_range(start..end, "");
            return;
        }

        let start = char_to_byte(&self.lines[from.line], from.column);
        let end = char_to_byte(&self.lines[to.line], to.column);
        let tail = self.lines[to.line][end..].to_string();
        self.lines[from.line].truncate(start);
        self.lines[from.line].push_str(&tail);
        self.lines.drain(from.line + 1..=to.line);
    }

    pub fn apply(&mut self, op: &PatchOp) {
        match op {
            PatchOp::Insert { at, text } => self.insert(*at, text),
            PatchOp::Delete { from, to } => self.delete(*from, *to),
        }
    }
}

/// Translate the diff of `old` → `new` into ordered edit operations.
///
/// A virtual cursor tracks the position reached by the already-replayed
/// `Equal` and `Insert` content: `Equal` advances without mutating, `Insert`
/// inserts at the cursor and advances past it, `Delete` removes the range
/// covering its own text without advancing. Regions the diff marks equal are
/// never touched by an operation.
pub fn patch_ops(old: &str, new: &str) -> Vec<PatchOp> {
    let mut cursor = Position::default();
    let mut ops = Vec::new();

    for chunk in diff(old, new) {
        match chunk {
            Chunk::Equal(text) => {
                cursor = cursor.advanced(&text);
            }
            Chunk::Insert(text) => {
                let next = cursor.advanced(&text);
                ops.push(PatchOp::Insert { at: cursor, text });
                cursor = next;
            }
            Chunk::Delete(text) => {
                ops.push(PatchOp::Delete {
                    from: cursor,
                    to: cursor.advanced(&text),
                });
            }
        }
    }

    ops
}

/// Diff `old` against `new` and apply the resulting operations to a live
/// buffer whose current content must equal `old`.
pub fn apply_patch(buffer: &mut TextBuffer, old: &str, new: &str) {
    for op in patch_ops(old, new) {
        buffer.apply(&op);
    }
}

fn char_to_byte(line: &str, column: usize) -> usize {
    line.char_indices()
        .nth(column)
        .map(|(byte, _)| byte)
        .unwrap_or(line.len())
}
