pub mod block;
pub mod document;
pub mod highlight;
pub mod loader;
pub mod markup;
pub mod merge;
pub mod parser;
pub mod selection;
pub mod tree;

mod text;

pub use block::{Block, BlockKind};
pub use document::Document;
pub use highlight::{Annotation, AnnotationId, HighlightManager, PaintResult, VisualState};
pub use merge::{
    Degradation, EditOp, MergeError, MergeMode, MergeOptions, MergeReport, apply_merge,
    apply_merge_with,
};
pub use parser::{ReplyStream, parse_reply};
pub use selection::{
    Anchor, BlockRange, BlockSelection, Selection, SelectionError, SelectionSpan, SpanFragment,
    resolve_selection,
};
pub use tree::{BlockId, NodeId, TextSurface, TextTree};
