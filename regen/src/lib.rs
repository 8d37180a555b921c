pub mod buffer;
pub mod compose;
pub mod diagnostic;
pub mod diff;
pub mod extract;
pub mod frontmatter;
pub mod marker;
pub mod metadata;
pub mod render;
pub mod section;

pub use buffer::{Position, PatchOp, TextBuffer, apply_patch, patch_ops};
pub use compose::{Composed, compose, recompose};
pub use diff::{Chunk, diff};
pub use extract::Extractor;
pub use marker::Markers;
pub use metadata::MetadataMap;
pub use render::{Outcome, PENDING_PLACEHOLDER, RenderOptions, render};
pub use section::{EmbeddedScript, LabelFrequency, Section};
