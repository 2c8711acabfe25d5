//! Merge engine: splices parsed reply blocks into the document around the
//! user's selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::block::{Block, BlockKind};
use crate::highlight::{Annotation, HighlightManager};
use crate::selection::{Anchor, BlockSelection, Selection, SelectionSpan, find_text, resolve_selection};
use crate::text;
use crate::tree::{BlockId, NodeId, TextSurface};

/// Whether the original content is deleted, kept before the new content, or
/// kept with the new content appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    #[default]
    Replace,
    Insert,
    Append,
}

impl MergeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeMode::Replace => "replace",
            MergeMode::Insert => "insert",
            MergeMode::Append => "append",
        }
    }
}

impl FromStr for MergeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(MergeMode::Replace),
            "insert" => Ok(MergeMode::Insert),
            "append" => Ok(MergeMode::Append),
            other => Err(format!(
                "unknown merge mode '{}' (expected replace, insert or append)",
                other
            )),
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural change made by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    InsertedBlock(BlockId),
    RemovedBlock(BlockId),
    /// A single paragraph reply was spliced inline into this block.
    SplicedInline { block: BlockId },
    /// A highlighted fragment was deleted.
    RemovedFragment(NodeId),
    /// Annotations unwrapped without deleting text.
    ClearedHighlight(usize),
}

/// The merge succeeded, but less precisely than asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// Replace could not find the selected text and appended instead.
    AnchorNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub mode: MergeMode,
    pub ops: Vec<EditOp>,
    pub degraded: Option<Degradation>,
}

impl MergeReport {
    fn new(mode: MergeMode) -> Self {
        MergeReport {
            mode,
            ops: Vec::new(),
            degraded: None,
        }
    }

    pub fn inserted_blocks(&self) -> Vec<BlockId> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                EditOp::InsertedBlock(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn removed_blocks(&self) -> Vec<BlockId> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                EditOp::RemovedBlock(id) => Some(*id),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("the reply produced no blocks")]
    EmptyReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Re-locate a lost span by searching for its original text before
    /// degrading to append.
    pub search_fallback: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            search_fallback: true,
        }
    }
}

/// Merge `blocks` into the document with default options.
pub fn apply_merge<H: TextSurface + ?Sized>(
    host: &mut H,
    highlights: &mut HighlightManager,
    mode: MergeMode,
    selection: &Selection,
    blocks: &[Block],
) -> Result<MergeReport, MergeError> {
    apply_merge_with(host, highlights, mode, selection, blocks, MergeOptions::default())
}

/// Merge `blocks` into the document around `selection`.
///
/// An empty block list is refused before anything is touched, so the
/// document and any painted highlight stay as they were. Every merge that
/// runs ends with a layout recalculation request and the dirty flag set.
pub fn apply_merge_with<H: TextSurface + ?Sized>(
    host: &mut H,
    highlights: &mut HighlightManager,
    mode: MergeMode,
    selection: &Selection,
    blocks: &[Block],
    options: MergeOptions,
) -> Result<MergeReport, MergeError> {
    if blocks.is_empty() {
        debug!(%mode, "empty reply, nothing to merge");
        return Err(MergeError::EmptyReply);
    }

    let mut merger = Merger {
        host: &mut *host,
        highlights,
        options,
        report: MergeReport::new(mode),
    };
    match (mode, selection) {
        (MergeMode::Replace, Selection::Blocks(set)) => merger.replace_blocks(set, blocks),
        (MergeMode::Replace, Selection::Span(span)) => merger.replace_span(span, blocks),
        (_, selection) => merger.insert_after(selection, blocks),
    }
    let report = merger.report;

    host.request_layout_recalc();
    host.mark_dirty(true);
    debug!(
        %mode,
        ops = report.ops.len(),
        degraded = report.degraded.is_some(),
        "merged reply"
    );
    Ok(report)
}

struct Merger<'a, H: ?Sized> {
    host: &'a mut H,
    highlights: &'a mut HighlightManager,
    options: MergeOptions,
    report: MergeReport,
}

impl<H: TextSurface + ?Sized> Merger<'_, H> {
    // -----------------------------------------------------------------------
    // insert / append
    // -----------------------------------------------------------------------

    /// Unwrap the highlight without deleting anything, then put the reply
    /// after the block holding the end of the selection.
    fn insert_after(&mut self, selection: &Selection, blocks: &[Block]) {
        let end = self.selection_end_block(selection);
        self.clear_highlight();
        let after = end
            .filter(|block| self.host.contains(*block))
            .or_else(|| self.last_block());
        self.insert_sequence(after, blocks);
    }

    fn selection_end_block(&self, selection: &Selection) -> Option<BlockId> {
        match selection {
            Selection::Blocks(set) => set.ordered(&*self.host).last().copied(),
            Selection::Span(span) => self
                .highlight_end_block()
                .or_else(|| span.end_block(&*self.host))
                .or_else(|| self.highlights.anchor_block())
                .or_else(|| self.search_block(&span.original_text)),
        }
    }

    // -----------------------------------------------------------------------
    // replace a block set
    // -----------------------------------------------------------------------

    fn replace_blocks(&mut self, set: &BlockSelection, blocks: &[Block]) {
        self.clear_highlight();
        let selected = set.ordered(&*self.host);
        let Some(first) = selected.first().copied() else {
            warn!("none of the selected blocks remain, appending instead");
            self.report.degraded = Some(Degradation::AnchorNotFound);
            let last = self.last_block();
            self.insert_sequence(last, blocks);
            return;
        };

        let order = self.host.blocks();
        let predecessor = order
            .iter()
            .position(|id| *id == first)
            .and_then(|at| at.checked_sub(1))
            .map(|at| order[at]);

        for id in &selected {
            if self.host.remove_block(*id) {
                self.report.ops.push(EditOp::RemovedBlock(*id));
            }
        }

        match predecessor {
            Some(anchor) => {
                self.insert_sequence(Some(anchor), blocks);
            }
            None => {
                // Nothing precedes the removed run: insert behind a
                // temporary empty block at the start, then drop it.
                let temporary = self.host.insert_block_after(None, BlockKind::Paragraph, "");
                self.insert_sequence(Some(temporary), blocks);
                self.host.remove_block(temporary);
                debug!(%temporary, "removed temporary anchor block");
            }
        }
    }

    // -----------------------------------------------------------------------
    // replace a span
    // -----------------------------------------------------------------------

    fn replace_span(&mut self, span: &SelectionSpan, blocks: &[Block]) {
        if self.highlights.is_intact(&*self.host) {
            let annotations = self.highlights.take();
            self.splice(annotations, blocks);
            return;
        }

        let anchor = self
            .highlight_end_block()
            .or_else(|| self.highlights.anchor_block())
            .or_else(|| span.end_block(&*self.host))
            .or_else(|| span.start_block(&*self.host));
        self.clear_highlight();

        if let Some(annotations) = self.repaint(span) {
            self.splice(annotations, blocks);
            return;
        }
        if self.options.search_fallback {
            if let Some(annotations) = self.search_and_paint(anchor, &span.original_text) {
                self.splice(annotations, blocks);
                return;
            }
        }

        warn!(
            text = %span.original_text,
            "selected text not found, appending instead of replacing"
        );
        self.report.degraded = Some(Degradation::AnchorNotFound);
        let after = anchor
            .filter(|block| self.host.is_block(*block))
            .or_else(|| self.last_block());
        self.insert_sequence(after, blocks);
    }

    /// Paint the span as captured, when none of its fragments moved.
    fn repaint(&mut self, span: &SelectionSpan) -> Option<Vec<Annotation>> {
        if span.is_empty() || span.is_stale(&*self.host) {
            return None;
        }
        self.highlights.paint(&mut *self.host, span).ok()?;
        Some(self.highlights.take())
    }

    /// Find the first exact occurrence of `needle` in the anchor block (or
    /// in the whole document when the anchor is gone) and paint it.
    fn search_and_paint(&mut self, anchor: Option<BlockId>, needle: &str) -> Option<Vec<Annotation>> {
        let candidates = match anchor.filter(|block| self.host.is_block(*block)) {
            Some(block) => vec![block],
            None => self.host.blocks(),
        };
        let len = text::char_len(needle);
        for block in candidates {
            let Some(offset) = find_text(&*self.host, block, needle) else {
                continue;
            };
            let start = Anchor::new(block, offset);
            let end = Anchor::new(block, offset + len);
            let span = resolve_selection(&*self.host, start, end, block).ok()?;
            self.highlights.paint(&mut *self.host, &span).ok()?;
            debug!(%block, offset, "re-located selection by text search");
            return Some(self.highlights.take());
        }
        None
    }

    /// Put the reply where the annotations are and delete the annotated
    /// fragments.
    ///
    /// A single paragraph reply replaces the first annotation inline and
    /// keeps the block. Anything else goes in after the last touched block.
    /// Touched blocks left without text are removed, except the one spliced
    /// into.
    fn splice(&mut self, annotations: Vec<Annotation>, blocks: &[Block]) {
        let mut touched: Vec<BlockId> = Vec::new();
        for annotation in &annotations {
            if let Some(block) = self.host.block_of(annotation.wrapper) {
                if !touched.contains(&block) {
                    touched.push(block);
                }
            }
        }

        let mut parents: Vec<NodeId> = Vec::new();
        let mut remaining = annotations.as_slice();
        let mut spliced = None;

        let single_paragraph = blocks.len() == 1 && blocks[0].kind == BlockKind::Paragraph;
        if let (true, Some(first)) = (single_paragraph, annotations.first()) {
            let block = self.host.block_of(first.wrapper);
            let parent = self.host.parent(first.wrapper);
            if let (Some(block), Some(parent)) = (block, parent) {
                if self.host.replace_with_markup(first.wrapper, &blocks[0].content) {
                    self.report.ops.push(EditOp::SplicedInline { block });
                    parents.push(parent);
                    spliced = Some(block);
                    remaining = &annotations[1..];
                }
            }
        }
        if spliced.is_none() {
            let after = touched.last().copied().or_else(|| self.last_block());
            self.insert_sequence(after, blocks);
        }

        for annotation in remaining {
            let parent = self.host.parent(annotation.wrapper);
            if self.host.remove_node(annotation.wrapper) {
                self.report.ops.push(EditOp::RemovedFragment(annotation.fragment));
                if let Some(parent) = parent.filter(|p| !parents.contains(p)) {
                    parents.push(parent);
                }
            }
        }
        for parent in parents {
            if self.host.contains(parent) {
                self.host.normalize(parent);
            }
        }

        for block in touched {
            if Some(block) == spliced || !self.host.contains(block) {
                continue;
            }
            if self.host.text_len(block) == 0 && self.host.remove_block(block) {
                self.report.ops.push(EditOp::RemovedBlock(block));
            }
        }
    }

    // -----------------------------------------------------------------------
    // shared
    // -----------------------------------------------------------------------

    fn insert_sequence(&mut self, after: Option<BlockId>, blocks: &[Block]) {
        let mut cursor = after;
        for block in blocks {
            let id = match &block.rows {
                Some(rows) if block.kind == BlockKind::Table => {
                    self.host.insert_table_after(cursor, rows)
                }
                _ => self.host.insert_block_after(cursor, block.kind, &block.content),
            };
            self.report.ops.push(EditOp::InsertedBlock(id));
            cursor = Some(id);
        }
    }

    fn clear_highlight(&mut self) {
        let cleared = self.highlights.teardown(&mut *self.host);
        if cleared > 0 {
            self.report.ops.push(EditOp::ClearedHighlight(cleared));
        }
    }

    /// Block of the last live annotation wrapper.
    fn highlight_end_block(&self) -> Option<BlockId> {
        self.highlights
            .annotations()
            .iter()
            .rev()
            .find_map(|annotation| self.host.block_of(annotation.wrapper))
    }

    fn search_block(&self, needle: &str) -> Option<BlockId> {
        if !self.options.search_fallback {
            return None;
        }
        self.host
            .blocks()
            .into_iter()
            .find(|block| find_text(&*self.host, *block, needle).is_some())
    }

    fn last_block(&self) -> Option<BlockId> {
        self.host.blocks().last().copied()
    }
}
