use pulldown_cmark::{Event, MetadataBlockKind, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::metadata::MetadataMap;

/// Parse a document's leading YAML-style front-matter block (`---` fences)
/// into a metadata map. Only `key: value` lines are recognized; nested
/// structure is ignored.
pub fn frontmatter(document: &str) -> MetadataMap {
    let options = Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;
    let mut parser = CmarkParser::new_ext(document, options);

    match parser.next() {
        Some(Event::Start(Tag::MetadataBlock(MetadataBlockKind::YamlStyle))) => {
            let mut text = String::new();
            for event in parser {
                match event {
                    Event::Text(t) => text.push_str(&t),
                    Event::End(TagEnd::MetadataBlock(_)) => break,
                    _ => break,
                }
            }
            MetadataMap::parse(&text)
        }
        _ => MetadataMap::new(),
    }
}

/// Whether the document opts out of processing via a front-matter key.
///
/// Presence of the key opts out unless its value spells a negative.
pub fn is_ignored(document: &str, key: &str) -> bool {
    match frontmatter(document).get(key) {
        Some(value) => !matches!(
            value.to_ascii_lowercase().as_str(),
            "false" | "no" | "off" | "0"
        ),
        None => false,
    }
}
