//! Capability traits over a rendered document.
//!
//! Everything above the document model talks to these traits.
//! [`Document`](crate::Document) is the in-memory implementation.

use std::fmt;

use crate::block::BlockKind;
use crate::highlight::{AnnotationId, VisualState};
use crate::text;

/// Handle to any node of a rendered tree. Handles are never reused: a
/// removed node's handle stays dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

/// A block is addressed by the handle of its block node.
pub type BlockId = NodeId;

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Read access to the text-bearing structure of a document.
pub trait TextTree {
    fn root(&self) -> NodeId;

    /// True while `node` is attached to the live tree.
    fn contains(&self, node: NodeId) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn is_text_fragment(&self, node: NodeId) -> bool;

    fn fragment_text(&self, node: NodeId) -> Option<&str>;

    /// Mutation counter of a node. Bumped whenever a fragment's text changes.
    fn revision(&self, node: NodeId) -> Option<u64>;

    fn block_kind(&self, node: NodeId) -> Option<BlockKind>;

    /// Annotation carried by `node`, when it is an annotation wrapper.
    fn annotation(&self, node: NodeId) -> Option<(AnnotationId, VisualState)>;

    fn is_block(&self, node: NodeId) -> bool {
        self.block_kind(node).is_some()
    }

    /// Blocks in document order.
    fn blocks(&self) -> Vec<BlockId> {
        self.children(self.root())
            .into_iter()
            .filter(|node| self.is_block(*node))
            .collect()
    }

    /// Nearest block at or above `node`.
    fn block_of(&self, node: NodeId) -> Option<BlockId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if !self.contains(id) {
                return None;
            }
            if self.is_block(id) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    /// Pre-order walk of `node` and everything below it.
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if !self.contains(id) {
                continue;
            }
            out.push(id);
            stack.extend(self.children(id).into_iter().rev());
        }
        out
    }

    /// Text fragments under `node`, in document order.
    fn text_fragments_of(&self, node: NodeId) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|id| self.is_text_fragment(*id))
            .collect()
    }

    /// Visible length of `node` in chars.
    fn text_len(&self, node: NodeId) -> usize {
        self.text_fragments_of(node)
            .into_iter()
            .filter_map(|id| self.fragment_text(id))
            .map(text::char_len)
            .sum()
    }

    fn text_content(&self, node: NodeId) -> String {
        self.text_fragments_of(node)
            .into_iter()
            .filter_map(|id| self.fragment_text(id))
            .collect()
    }

    /// Inclusive: a node is its own ancestor.
    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        let mut current = Some(a);
        while let Some(id) = current {
            if self.is_ancestor(id, b) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }
}

/// Write access: the operations a host renderer exposes for annotating and
/// splicing. Operations on dead handles are no-ops reporting failure.
pub trait TextSurface: TextTree {
    /// Split a text fragment at a char offset. The original handle keeps the
    /// left part; the returned handle is the new right sibling.
    fn split_at(&mut self, fragment: NodeId, offset: usize) -> Option<NodeId>;

    /// Wrap a node in a new annotation element, returning the wrapper.
    fn wrap_in_annotation(&mut self, node: NodeId, id: AnnotationId) -> Option<NodeId>;

    fn set_annotation_state(&mut self, wrapper: NodeId, state: VisualState) -> bool;

    /// Replace an annotation wrapper by its children, in place.
    fn unwrap(&mut self, wrapper: NodeId) -> bool;

    /// Merge adjacent text fragments below `container` and drop empty ones.
    fn normalize(&mut self, container: NodeId);

    /// Insert a block after `after`, or at the start when `after` is `None`.
    /// A dead `after` handle appends at the end.
    fn insert_block_after(&mut self, after: Option<BlockId>, kind: BlockKind, content: &str)
    -> BlockId;

    fn insert_table_after(&mut self, after: Option<BlockId>, rows: &[Vec<String>]) -> BlockId;

    fn remove_block(&mut self, block: BlockId) -> bool;

    /// Replace `node` (and everything below it) with inline markup.
    fn replace_with_markup(&mut self, node: NodeId, content: &str) -> bool;

    fn remove_node(&mut self, node: NodeId) -> bool;

    fn request_layout_recalc(&mut self);

    fn mark_dirty(&mut self, dirty: bool);
}
