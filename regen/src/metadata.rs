/// An insertion-ordered string map for end-marker metadata.
///
/// Serialization order is the merge order: keys already present keep their
/// original position when overwritten, new keys append at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMap {
    entries: Vec<(String, String)>,
}

impl MetadataMap {
    pub fn new() -> Self {
        MetadataMap::default()
    }

    /// Parse newline-separated `key: value` lines.
    ///
    /// The first colon on each line splits key from value; lines without a
    /// colon, or whose key or value trims to empty, are dropped. The last
    /// occurrence of a duplicate key wins.
    pub fn parse(text: &str) -> Self {
        let mut map = MetadataMap::new();
        for line in text.lines() {
            let Some(colon) = line.find(':') else {
                continue;
            };
            let key = line[..colon].trim();
            let value = line[colon + 1..].trim();
            if key.is_empty() || value.is_empty() {
                continue;
            }
            map.insert(key, value);
        }
        map
    }

    /// Insert or overwrite a key. Overwriting keeps the key's position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize as one `key: value` line per entry, in order.
    pub fn to_lines(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
