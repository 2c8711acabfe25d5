use thiserror::Error;
use tracing::debug;

use crate::text;
use crate::tree::{BlockId, NodeId, TextTree};

/// A pointer position: a node plus a char offset into its visible text.
/// Anchors on element nodes are resolved down to the fragment holding the
/// offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub node: NodeId,
    pub offset: usize,
}

impl Anchor {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Anchor { node, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("selection anchor {0} does not resolve to a live text fragment")]
    Unresolvable(NodeId),
    #[error("selection is empty")]
    Empty,
    #[error("selection was captured before the document changed")]
    Stale,
}

/// The selected chars of one text fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanFragment {
    pub fragment: NodeId,
    pub start: usize,
    pub end: usize,
    /// Fragment revision at capture time.
    pub revision: u64,
}

/// Offset-based description of a selected run of text, independent of how
/// many blocks it crosses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionSpan {
    pub fragments: Vec<SpanFragment>,
    /// Plain-text snapshot at capture, used to re-locate the run when the
    /// fragment handles no longer hold.
    pub original_text: String,
}

impl SelectionSpan {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn char_len(&self) -> usize {
        text::char_len(&self.original_text)
    }

    /// True once any referenced fragment is gone or has been mutated.
    pub fn is_stale<T: TextTree + ?Sized>(&self, tree: &T) -> bool {
        self.fragments.iter().any(|piece| {
            !tree.is_text_fragment(piece.fragment)
                || tree.revision(piece.fragment) != Some(piece.revision)
        })
    }

    /// Live blocks touched by the span, in span order.
    pub fn blocks<T: TextTree + ?Sized>(&self, tree: &T) -> Vec<BlockId> {
        let mut blocks: Vec<BlockId> = Vec::new();
        for piece in &self.fragments {
            if let Some(block) = tree.block_of(piece.fragment) {
                if !blocks.contains(&block) {
                    blocks.push(block);
                }
            }
        }
        blocks
    }

    pub fn start_block<T: TextTree + ?Sized>(&self, tree: &T) -> Option<BlockId> {
        self.fragments
            .iter()
            .find_map(|piece| tree.block_of(piece.fragment))
    }

    pub fn end_block<T: TextTree + ?Sized>(&self, tree: &T) -> Option<BlockId> {
        self.fragments
            .iter()
            .rev()
            .find_map(|piece| tree.block_of(piece.fragment))
    }

    /// The span as char ranges relative to each block's visible text.
    /// Touching pieces in one block come back as a single range.
    pub fn block_ranges<T: TextTree + ?Sized>(&self, tree: &T) -> Vec<BlockRange> {
        let mut ranges: Vec<BlockRange> = Vec::new();
        for piece in &self.fragments {
            let Some(block) = tree.block_of(piece.fragment) else {
                continue;
            };
            let Some(before) = chars_before(tree, block, piece.fragment) else {
                continue;
            };
            let (start, end) = (before + piece.start, before + piece.end);
            match ranges.last_mut() {
                Some(last) if last.block == block && last.end == start => last.end = end,
                _ => ranges.push(BlockRange { block, start, end }),
            }
        }
        ranges
    }

    /// Rebuild a span over whatever fragments currently hold `ranges`.
    pub fn from_block_ranges<T: TextTree + ?Sized>(
        tree: &T,
        ranges: &[BlockRange],
        original_text: String,
    ) -> SelectionSpan {
        let mut span = SelectionSpan::default();
        for range in ranges {
            let mut offset = 0;
            for fragment in tree.text_fragments_of(range.block) {
                let len = tree.text_len(fragment);
                let lo = range.start.max(offset);
                let hi = range.end.min(offset + len);
                if hi > lo {
                    span.push(tree, fragment, lo - offset, hi - offset);
                }
                offset += len;
            }
        }
        span.original_text = original_text;
        span
    }

    fn push<T: TextTree + ?Sized>(&mut self, tree: &T, fragment: NodeId, start: usize, end: usize) {
        let content = tree.fragment_text(fragment).unwrap_or_default();
        self.original_text
            .push_str(text::char_slice(content, start, end));
        self.fragments.push(SpanFragment {
            fragment,
            start,
            end,
            revision: tree.revision(fragment).unwrap_or_default(),
        });
    }
}

/// A char range inside one block's visible text. Unlike fragment handles it
/// survives splits and merges of the fragments below the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub block: BlockId,
    pub start: usize,
    pub end: usize,
}

/// Chars of `block` that come before `fragment`.
fn chars_before<T: TextTree + ?Sized>(tree: &T, block: BlockId, fragment: NodeId) -> Option<usize> {
    let mut before = 0;
    for id in tree.text_fragments_of(block) {
        if id == fragment {
            return Some(before);
        }
        before += tree.text_len(id);
    }
    None
}

/// A set of whole blocks, the coarse alternative to a span.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockSelection {
    ids: Vec<BlockId>,
}

impl BlockSelection {
    pub fn new(ids: impl IntoIterator<Item = BlockId>) -> Self {
        let mut selection = BlockSelection::default();
        for id in ids {
            if !selection.ids.contains(&id) {
                selection.ids.push(id);
            }
        }
        selection
    }

    pub fn ids(&self) -> &[BlockId] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.ids.contains(&id)
    }

    /// Selected blocks still in the document, in document order.
    pub fn ordered<T: TextTree + ?Sized>(&self, tree: &T) -> Vec<BlockId> {
        tree.blocks()
            .into_iter()
            .filter(|id| self.contains(*id))
            .collect()
    }

    /// The equivalent span: offset 0 of the first block to the end of the
    /// last one.
    pub fn to_span<T: TextTree + ?Sized>(&self, tree: &T) -> SelectionSpan {
        let mut span = SelectionSpan::default();
        for block in self.ordered(tree) {
            for fragment in tree.text_fragments_of(block) {
                let len = tree.text_len(fragment);
                if len > 0 {
                    span.push(tree, fragment, 0, len);
                }
            }
        }
        span
    }
}

/// What the user has selected: a text span or a set of blocks, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Span(SelectionSpan),
    Blocks(BlockSelection),
}

impl Selection {
    pub fn original_text<T: TextTree + ?Sized>(&self, tree: &T) -> String {
        match self {
            Selection::Span(span) => span.original_text.clone(),
            Selection::Blocks(set) => set.to_span(tree).original_text,
        }
    }
}

/// Resolve a pointer selection into a span.
///
/// Walks every text fragment under `container` in document order, taking
/// partial bounds on the first and last fragment and full bounds in between.
/// A container that is not inside a single block (or does not hold both
/// anchors) widens the walk to the whole document. A backward selection is
/// normalized. When the walk selects nothing, the fragment nearest the start
/// anchor becomes the whole span.
pub fn resolve_selection<T: TextTree + ?Sized>(
    tree: &T,
    start: Anchor,
    end: Anchor,
    container: NodeId,
) -> Result<SelectionSpan, SelectionError> {
    let (start_fragment, start_offset) =
        locate(tree, start).ok_or(SelectionError::Unresolvable(start.node))?;
    let (end_fragment, end_offset) =
        locate(tree, end).ok_or(SelectionError::Unresolvable(end.node))?;

    let scope = walk_scope(tree, container, start_fragment, end_fragment);
    let fragments = tree.text_fragments_of(scope);
    let position = |node: NodeId| fragments.iter().position(|id| *id == node);
    let (Some(first), Some(last)) = (position(start_fragment), position(end_fragment)) else {
        return Err(SelectionError::Unresolvable(start.node));
    };

    let (mut from, mut to) = ((first, start_offset), (last, end_offset));
    if from > to {
        std::mem::swap(&mut from, &mut to);
    }

    let mut span = SelectionSpan::default();
    for (index, fragment) in fragments.iter().enumerate().take(to.0 + 1).skip(from.0) {
        let len = tree.text_len(*fragment);
        let lo = if index == from.0 { from.1 } else { 0 };
        let hi = if index == to.0 { to.1 } else { len };
        if hi > lo {
            span.push(tree, *fragment, lo, hi);
        }
    }

    if span.is_empty() {
        let nearest = fragments[from.0..]
            .iter()
            .copied()
            .find(|fragment| tree.text_len(*fragment) > 0)
            .ok_or(SelectionError::Unresolvable(start.node))?;
        let len = tree.text_len(nearest);
        span.push(tree, nearest, 0, len);
        debug!(fragment = %nearest, "collapsed selection widened to nearest fragment");
    }

    debug!(
        fragments = span.fragments.len(),
        chars = span.char_len(),
        scope = %scope,
        "resolved selection"
    );
    Ok(span)
}

/// Map an anchor onto `(text fragment, offset within it)`.
fn locate<T: TextTree + ?Sized>(tree: &T, anchor: Anchor) -> Option<(NodeId, usize)> {
    if !tree.contains(anchor.node) {
        return None;
    }
    if let Some(content) = tree.fragment_text(anchor.node) {
        return (anchor.offset <= text::char_len(content)).then_some((anchor.node, anchor.offset));
    }
    if anchor.offset > tree.text_len(anchor.node) {
        return None;
    }

    let fragments = tree.text_fragments_of(anchor.node);
    let mut remaining = anchor.offset;
    for (index, fragment) in fragments.iter().enumerate() {
        let len = tree.text_len(*fragment);
        let is_last = index + 1 == fragments.len();
        if remaining < len || (is_last && remaining <= len) {
            return Some((*fragment, remaining));
        }
        remaining -= len;
    }

    // No text below the anchor (a divider, an empty block): use the closest
    // fragment that follows it, else the one before it.
    let order = tree.descendants(tree.root());
    let at = order.iter().position(|id| *id == anchor.node)?;
    if let Some(next) = order[at..].iter().find(|id| tree.is_text_fragment(**id)) {
        return Some((*next, 0));
    }
    order[..at]
        .iter()
        .rev()
        .find(|id| tree.is_text_fragment(**id))
        .map(|prev| (*prev, tree.text_len(*prev)))
}

fn walk_scope<T: TextTree + ?Sized>(
    tree: &T,
    container: NodeId,
    start: NodeId,
    end: NodeId,
) -> NodeId {
    let root = tree.root();
    if !tree.contains(container) || tree.block_of(container).is_none() {
        return root;
    }
    if !tree.is_ancestor(container, start) || !tree.is_ancestor(container, end) {
        return root;
    }
    container
}

/// Char offset of the first exact occurrence of `needle` in a block's
/// visible text.
pub fn find_text<T: TextTree + ?Sized>(tree: &T, block: BlockId, needle: &str) -> Option<usize> {
    if needle.is_empty() || !tree.contains(block) {
        return None;
    }
    let haystack = tree.text_content(block);
    haystack
        .find(needle)
        .map(|at| text::char_len(&haystack[..at]))
}
