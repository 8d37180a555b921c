/// One segment of a text diff. The `Equal` and `Delete` chunks concatenate
/// to the old text; the `Equal` and `Insert` chunks concatenate to the new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Equal(String),
    Delete(String),
    Insert(String),
}

/// Beyond this many line-pair comparisons the middle is emitted as one
/// delete plus one insert instead of running the quadratic LCS.
const LCS_LIMIT: usize = 1_000_000;

/// Diff `old` against `new`: common prefix and suffix are split off
/// unconditionally, the middle is diffed line by line.
///
/// Replaying the chunks against `old` reconstructs `new` exactly.
pub fn diff(old: &str, new: &str) -> Vec<Chunk> {
    if old == new {
        if old.is_empty() {
            return Vec::new();
        }
        return vec![Chunk::Equal(old.to_string())];
    }

    let prefix = common_prefix(old, new);
    let (old_rest, new_rest) = (&old[prefix..], &new[prefix..]);
    let suffix = common_suffix(old_rest, new_rest);

    let old_mid = &old_rest[..old_rest.len() - suffix];
    let new_mid = &new_rest[..new_rest.len() - suffix];

    let mut chunks = Vec::new();
    if prefix > 0 {
        chunks.push(Chunk::Equal(old[..prefix].to_string()));
    }
    chunks.extend(diff_middle(old_mid, new_mid));
    if suffix > 0 {
        chunks.push(Chunk::Equal(old_rest[old_rest.len() - suffix..].to_string()));
    }

    coalesce(chunks)
}

fn diff_middle(old: &str, new: &str) -> Vec<Chunk> {
    if old.is_empty() && new.is_empty() {
        return Vec::new();
    }
    if old.is_empty() {
        return vec![Chunk::Insert(new.to_string())];
    }
    if new.is_empty() {
        return vec![Chunk::Delete(old.to_string())];
    }

    let old_lines: Vec<&str> = old.split_inclusive('\n').collect();
    let new_lines: Vec<&str> = new.split_inclusive('\n').collect();

    if old_lines.len().saturating_mul(new_lines.len()) > LCS_LIMIT {
        return vec![
            Chunk::Delete(old.to_string()),
            Chunk::Insert(new.to_string()),
        ];
    }

    diff_lines(&old_lines, &new_lines)
}

/// Line-level longest-common-subsequence diff.
fn diff_lines(old: &[&str], new: &[&str]) -> Vec<Chunk> {
    let n = old.len();
    let m = new.len();

    // lcs[i][j] = length of the LCS of old[i..] and new[j..].
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut chunks = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        if i < n && j < m && old[i] == new[j] {
            chunks.push(Chunk::Equal(old[i].to_string()));
            i += 1;
            j += 1;
        } else if i < n && (j == m || lcs[i + 1][j] >= lcs[i][j + 1]) {
            chunks.push(Chunk::Delete(old[i].to_string()));
            i += 1;
        } else {
            chunks.push(Chunk::Insert(new[j].to_string()));
            j += 1;
        }
    }

    chunks
}

/// Merge adjacent chunks of the same kind and normalize each changed run to
/// a single delete followed by a single insert.
fn coalesce(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut out: Vec<Chunk> = Vec::new();
    let mut deleted = String::new();
    let mut inserted = String::new();

    fn flush(out: &mut Vec<Chunk>, deleted: &mut String, inserted: &mut String) {
        if !deleted.is_empty() {
            out.push(Chunk::Delete(std::mem::take(deleted)));
        }
        if !inserted.is_empty() {
            out.push(Chunk::Insert(std::mem::take(inserted)));
        }
    }

    for chunk in chunks {
        match chunk {
            Chunk::Equal(text) => {
                flush(&mut out, &mut deleted, &mut inserted);
                match out.last_mut() {
                    Some(Chunk::Equal(prev)) => prev.push_str(&text),
                    _ => out.push(Chunk::Equal(text)),
                }
            }
            Chunk::Delete(text) => deleted.push_str(&text),
            Chunk::Insert(text) => inserted.push_str(&text),
        }
    }
    flush(&mut out, &mut deleted, &mut inserted);

    out
}

fn common_prefix(a: &str, b: &str) -> usize {
    let mut len = 0;
    for (ca, cb) in a.chars().zip(b.chars()) {
        if ca != cb {
            break;
        }
        len += ca.len_utf8();
    }
    len
}

fn common_suffix(a: &str, b: &str) -> usize {
    let mut len = 0;
    for (ca, cb) in a.chars().rev().zip(b.chars().rev()) {
        if ca != cb {
            break;
        }
        len += ca.len_utf8();
    }
    len
}
