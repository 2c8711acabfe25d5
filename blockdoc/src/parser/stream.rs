use crate::block::Block;

use super::BlockBuilder;

/// Incremental reply parser for text arriving in chunks.
///
/// Blocks are emitted once their line is complete. A table stays buffered
/// until a non-table line arrives or the stream is flushed, since another
/// row could still follow. Everything emitted by `push` calls plus `flush`
/// equals [`parse_reply`](super::parse_reply) of the whole text.
#[derive(Debug, Default, Clone)]
pub struct ReplyStream {
    partial: String,
    builder: BlockBuilder,
}

impl ReplyStream {
    pub fn new() -> Self {
        ReplyStream::default()
    }

    /// Feed one chunk, returning the blocks it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<Block> {
        self.partial.push_str(chunk);
        while let Some(at) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=at).collect();
            self.builder.feed(&line[..at]);
        }
        self.builder.drain()
    }

    /// End of input: emit the trailing line and any pending table.
    pub fn flush(&mut self) -> Vec<Block> {
        let rest = std::mem::take(&mut self.partial);
        if !rest.is_empty() {
            self.builder.feed(&rest);
        }
        std::mem::take(&mut self.builder).finish()
    }

    /// True while text or a table is held back.
    pub fn pending(&self) -> bool {
        !self.partial.is_empty() || self.builder.has_pending_table()
    }

    pub fn reset(&mut self) {
        self.partial.clear();
        self.builder = BlockBuilder::default();
    }
}
