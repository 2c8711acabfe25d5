use std::fmt;

use crate::block::{Block, BlockKind};
use crate::highlight::{AnnotationId, VisualState};
use crate::markup::{self, Inline};
use crate::selection::Anchor;
use crate::tree::{BlockId, NodeId, TextSurface, TextTree};
use crate::text;

const ROOT: NodeId = NodeId(0);

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Root,
    Block(BlockKind),
    Row,
    Cell,
    Bold,
    Italic,
    Annotation { id: AnnotationId, state: VisualState },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    revision: u64,
}

/// In-memory rendered report: the ordered block store plus the text tree
/// below each block.
///
/// Nodes live in an arena and are never reused, so a stale handle is simply
/// dead. Layout recalculation requests and the dirty flag are recorded so
/// callers can observe what a real renderer would have been asked to do.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    dirty: bool,
    layout_requests: usize,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            nodes: vec![Some(Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
                revision: 0,
            })],
            dirty: false,
            layout_requests: 0,
        }
    }

    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut document = Document::new();
        for block in blocks {
            document.push_block(block);
        }
        document
    }

    /// Append a block at the end of the document.
    pub fn push_block(&mut self, block: &Block) -> BlockId {
        let last = self.block_ids().last().copied();
        match &block.rows {
            Some(rows) if block.kind == BlockKind::Table => self.insert_table_after(last, rows),
            _ => self.insert_block_after(last, block.kind, &block.content),
        }
    }

    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks()
    }

    pub fn block_count(&self) -> usize {
        self.node(ROOT).map_or(0, |root| root.children.len())
    }

    /// Snapshot of one block as a record.
    pub fn block(&self, id: BlockId) -> Option<Block> {
        let kind = self.block_kind(id)?;
        if kind == BlockKind::Table {
            let rows = self
                .children(id)
                .into_iter()
                .map(|row| {
                    self.children(row)
                        .into_iter()
                        .map(|cell| self.markup_of(cell))
                        .collect()
                })
                .collect();
            return Some(Block::table(rows));
        }
        Some(Block::new(kind, self.markup_of(id)))
    }

    /// Snapshot of every block, in order.
    pub fn snapshot(&self) -> Vec<Block> {
        self.block_ids()
            .into_iter()
            .filter_map(|id| self.block(id))
            .collect()
    }

    pub fn block_text(&self, id: BlockId) -> String {
        self.text_content(id)
    }

    /// Whole-document visible text, blocks joined by newlines.
    pub fn plain_text(&self) -> String {
        self.block_ids()
            .into_iter()
            .map(|id| self.text_content(id))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Anchor at a char offset into a block's visible text.
    pub fn anchor_at(&self, block: BlockId, offset: usize) -> Option<Anchor> {
        (self.is_block(block) && offset <= self.text_len(block)).then_some(Anchor::new(block, offset))
    }

    /// Direct user edit: replace a block's inline content. Any annotation
    /// inside the block goes with it.
    pub fn edit_block(&mut self, block: BlockId, content: &str) -> bool {
        if !self.is_block(block) || self.block_kind(block) == Some(BlockKind::Table) {
            return false;
        }
        for child in self.children(block) {
            self.release(child);
        }
        let inlines = markup::parse_markup(content);
        let built: Vec<NodeId> = inlines
            .iter()
            .filter_map(|inline| self.build_inline(block, inline))
            .collect();
        if let Some(node) = self.node_mut(block) {
            node.children = built;
            node.revision += 1;
        }
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn layout_requests(&self) -> usize {
        self.layout_requests
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            kind,
            parent,
            children: Vec::new(),
            revision: 0,
        }));
        id
    }

    /// Parent and index within the parent's children.
    fn position(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.node(node)?.parent?;
        let index = self.node(parent)?.children.iter().position(|c| *c == node)?;
        Some((parent, index))
    }

    fn detach(&mut self, node: NodeId) -> bool {
        let Some((parent, index)) = self.position(node) else {
            return false;
        };
        if let Some(parent) = self.node_mut(parent) {
            parent.children.remove(index);
        }
        true
    }

    /// Free a node and its subtree without touching the parent's list.
    fn release(&mut self, node: NodeId) {
        for child in self.children(node) {
            self.release(child);
        }
        if let Some(slot) = self.nodes.get_mut(node.index()) {
            *slot = None;
        }
    }

    /// Allocate the subtree for one inline node. Empty text is skipped.
    fn build_inline(&mut self, parent: NodeId, inline: &Inline) -> Option<NodeId> {
        match inline {
            Inline::Text(content) if content.is_empty() => None,
            Inline::Text(content) => Some(self.alloc(NodeKind::Text(content.clone()), Some(parent))),
            Inline::Bold(children) | Inline::Italic(children) => {
                let kind = if matches!(inline, Inline::Bold(_)) {
                    NodeKind::Bold
                } else {
                    NodeKind::Italic
                };
                let id = self.alloc(kind, Some(parent));
                let built: Vec<NodeId> = children
                    .iter()
                    .filter_map(|child| self.build_inline(id, child))
                    .collect();
                if let Some(node) = self.node_mut(id) {
                    node.children = built;
                }
                Some(id)
            }
        }
    }

    fn insert_into_root(&mut self, after: Option<BlockId>, block: NodeId) {
        let index = match after {
            None => 0,
            Some(after) => match self.position(after) {
                Some((ROOT, index)) => index + 1,
                _ => self.block_count(),
            },
        };
        if let Some(root) = self.node_mut(ROOT) {
            root.children.insert(index, block);
        }
    }

    /// Re-serialize the inline content under `node` as markup. Annotations
    /// are transparent.
    fn markup_of(&self, node: NodeId) -> String {
        markup::render_markup(&self.inlines_of(node))
    }

    fn inlines_of(&self, node: NodeId) -> Vec<Inline> {
        let mut out: Vec<Inline> = Vec::new();
        for child in self.children(node) {
            let Some(entry) = self.node(child) else {
                continue;
            };
            match &entry.kind {
                NodeKind::Text(content) => match out.last_mut() {
                    Some(Inline::Text(prev)) => prev.push_str(content),
                    _ => out.push(Inline::Text(content.clone())),
                },
                NodeKind::Bold => out.push(Inline::Bold(self.inlines_of(child))),
                NodeKind::Italic => out.push(Inline::Italic(self.inlines_of(child))),
                _ => {
                    for inline in self.inlines_of(child) {
                        match (out.last_mut(), inline) {
                            (Some(Inline::Text(prev)), Inline::Text(next)) => prev.push_str(&next),
                            (_, inline) => out.push(inline),
                        }
                    }
                }
            }
        }
        out
    }
}

impl TextTree for Document {
    fn root(&self) -> NodeId {
        ROOT
    }

    fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    fn is_text_fragment(&self, node: NodeId) -> bool {
        matches!(self.node(node).map(|entry| &entry.kind), Some(NodeKind::Text(_)))
    }

    fn fragment_text(&self, node: NodeId) -> Option<&str> {
        match &self.node(node)?.kind {
            NodeKind::Text(content) => Some(content),
            _ => None,
        }
    }

    fn revision(&self, node: NodeId) -> Option<u64> {
        self.node(node).map(|entry| entry.revision)
    }

    fn block_kind(&self, node: NodeId) -> Option<BlockKind> {
        match self.node(node)?.kind {
            NodeKind::Block(kind) => Some(kind),
            _ => None,
        }
    }

    fn annotation(&self, node: NodeId) -> Option<(AnnotationId, VisualState)> {
        match self.node(node)?.kind {
            NodeKind::Annotation { id, state } => Some((id, state)),
            _ => None,
        }
    }
}

impl TextSurface for Document {
    fn split_at(&mut self, fragment: NodeId, offset: usize) -> Option<NodeId> {
        let (parent, index) = self.position(fragment)?;
        let current = self.fragment_text(fragment)?;
        if offset > text::char_len(current) {
            return None;
        }
        let at = text::byte_index(current, offset);
        let right_text = current[at..].to_string();

        let node = self.node_mut(fragment)?;
        if let NodeKind::Text(content) = &mut node.kind {
            content.truncate(at);
        }
        node.revision += 1;

        let right = self.alloc(NodeKind::Text(right_text), Some(parent));
        self.node_mut(parent)?.children.insert(index + 1, right);
        Some(right)
    }

    fn wrap_in_annotation(&mut self, node: NodeId, id: AnnotationId) -> Option<NodeId> {
        let (parent, index) = self.position(node)?;
        let kind = NodeKind::Annotation {
            id,
            state: VisualState::Idle,
        };
        let wrapper = self.alloc(kind, Some(parent));
        self.node_mut(parent)?.children[index] = wrapper;
        self.node_mut(wrapper)?.children.push(node);
        self.node_mut(node)?.parent = Some(wrapper);
        Some(wrapper)
    }

    fn set_annotation_state(&mut self, wrapper: NodeId, state: VisualState) -> bool {
        match self.node_mut(wrapper).map(|entry| &mut entry.kind) {
            Some(NodeKind::Annotation { state: current, .. }) => {
                *current = state;
                true
            }
            _ => false,
        }
    }

    fn unwrap(&mut self, wrapper: NodeId) -> bool {
        if self.annotation(wrapper).is_none() {
            return false;
        }
        let Some((parent, index)) = self.position(wrapper) else {
            return false;
        };
        let children = self.children(wrapper);
        for child in &children {
            if let Some(entry) = self.node_mut(*child) {
                entry.parent = Some(parent);
            }
        }
        if let Some(entry) = self.node_mut(parent) {
            entry.children.splice(index..=index, children);
        }
        if let Some(slot) = self.nodes.get_mut(wrapper.index()) {
            *slot = None;
        }
        true
    }

    fn normalize(&mut self, container: NodeId) {
        let mut kept: Vec<NodeId> = Vec::new();
        for child in self.children(container) {
            let Some(content) = self.fragment_text(child).map(str::to_string) else {
                self.normalize(child);
                let emptied_mark = matches!(
                    self.node(child).map(|entry| &entry.kind),
                    Some(NodeKind::Bold | NodeKind::Italic)
                ) && self.children(child).is_empty();
                if emptied_mark {
                    self.release(child);
                } else {
                    kept.push(child);
                }
                continue;
            };
            if content.is_empty() {
                self.release(child);
                continue;
            }
            let previous = kept.last().copied().filter(|prev| self.is_text_fragment(*prev));
            match previous.and_then(|prev| self.node_mut(prev)) {
                Some(Node {
                    kind: NodeKind::Text(prev),
                    revision,
                    ..
                }) => {
                    prev.push_str(&content);
                    *revision += 1;
                    self.release(child);
                }
                _ => kept.push(child),
            }
        }
        if let Some(entry) = self.node_mut(container) {
            entry.children = kept;
        }
    }

    fn insert_block_after(
        &mut self,
        after: Option<BlockId>,
        kind: BlockKind,
        content: &str,
    ) -> BlockId {
        let block = self.alloc(NodeKind::Block(kind), Some(ROOT));
        let inlines = markup::parse_markup(content);
        let built: Vec<NodeId> = inlines
            .iter()
            .filter_map(|inline| self.build_inline(block, inline))
            .collect();
        if let Some(entry) = self.node_mut(block) {
            entry.children = built;
        }
        self.insert_into_root(after, block);
        block
    }

    fn insert_table_after(&mut self, after: Option<BlockId>, rows: &[Vec<String>]) -> BlockId {
        let block = self.alloc(NodeKind::Block(BlockKind::Table), Some(ROOT));
        let mut row_ids = Vec::with_capacity(rows.len());
        for cells in rows {
            let row = self.alloc(NodeKind::Row, Some(block));
            let mut cell_ids = Vec::with_capacity(cells.len());
            for cell_content in cells {
                let cell = self.alloc(NodeKind::Cell, Some(row));
                let inlines = markup::parse_markup(cell_content);
                let built: Vec<NodeId> = inlines
                    .iter()
                    .filter_map(|inline| self.build_inline(cell, inline))
                    .collect();
                if let Some(entry) = self.node_mut(cell) {
                    entry.children = built;
                }
                cell_ids.push(cell);
            }
            if let Some(entry) = self.node_mut(row) {
                entry.children = cell_ids;
            }
            row_ids.push(row);
        }
        if let Some(entry) = self.node_mut(block) {
            entry.children = row_ids;
        }
        self.insert_into_root(after, block);
        block
    }

    fn remove_block(&mut self, block: BlockId) -> bool {
        if !self.is_block(block) || !self.detach(block) {
            return false;
        }
        self.release(block);
        true
    }

    fn replace_with_markup(&mut self, node: NodeId, content: &str) -> bool {
        let Some((parent, index)) = self.position(node) else {
            return false;
        };
        let inlines = markup::parse_markup(content);
        let built: Vec<NodeId> = inlines
            .iter()
            .filter_map(|inline| self.build_inline(parent, inline))
            .collect();
        if let Some(entry) = self.node_mut(parent) {
            entry.children.splice(index..=index, built);
        }
        self.release(node);
        true
    }

    fn remove_node(&mut self, node: NodeId) -> bool {
        if node == ROOT || !self.detach(node) {
            return false;
        }
        self.release(node);
        true
    }

    fn request_layout_recalc(&mut self) {
        self.layout_requests += 1;
    }

    fn mark_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let blocks = self.snapshot();
        let mut number = 0usize;
        for (index, block) in blocks.iter().enumerate() {
            let previous = index.checked_sub(1).map(|i| blocks[i].kind);
            let continues_list = block.kind.is_list_item() && previous == Some(block.kind);
            if index > 0 && !continues_list {
                writeln!(f)?;
            }
            number = match (block.kind, continues_list) {
                (BlockKind::Number, true) => number + 1,
                (BlockKind::Number, false) => 1,
                _ => 0,
            };
            write_block(f, block, number)?;
        }
        Ok(())
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &Block, number: usize) -> fmt::Result {
    let content = markup::to_markdown(&block.content);
    match block.kind {
        BlockKind::Paragraph => writeln!(f, "{}", content),
        BlockKind::Heading1 => writeln!(f, "# {}", content),
        BlockKind::Heading2 => writeln!(f, "## {}", content),
        BlockKind::Heading3 => writeln!(f, "### {}", content),
        BlockKind::Bullet => writeln!(f, "- {}", content),
        BlockKind::Number => writeln!(f, "{}. {}", number, content),
        BlockKind::Quote => writeln!(f, "> {}", content),
        BlockKind::Divider => writeln!(f, "---"),
        BlockKind::Table => {
            let Some(header) = block.header() else {
                return Ok(());
            };
            write_row(f, header)?;
            write!(f, "|")?;
            for _ in header {
                write!(f, "---|")?;
            }
            writeln!(f)?;
            for row in block.body_rows() {
                write_row(f, row)?;
            }
            Ok(())
        }
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, cells: &[String]) -> fmt::Result {
    write!(f, "|")?;
    for cell in cells {
        write!(f, " {} |", markup::to_markdown(cell))?;
    }
    writeln!(f)
}
