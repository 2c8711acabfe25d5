mod line;
pub mod stream;

pub use stream::ReplyStream;

use crate::block::{Block, BlockKind};
use crate::markup::format_inline;

use line::Line;

/// Parse a generated reply into blocks, one line at a time.
///
/// Pure: the same input always yields the same blocks. An empty or blank
/// reply yields no blocks.
pub fn parse_reply(text: &str) -> Vec<Block> {
    let mut builder = BlockBuilder::default();
    for raw in text.lines() {
        builder.feed(raw);
    }
    builder.finish()
}

// ---------------------------------------------------------------------------
// Block builder
// ---------------------------------------------------------------------------

/// Line-driven builder shared by [`parse_reply`] and [`ReplyStream`]. The
/// only lookahead is the pending table buffer.
#[derive(Debug, Default, Clone)]
pub(crate) struct BlockBuilder {
    table: Vec<Vec<String>>,
    blocks: Vec<Block>,
}

impl BlockBuilder {
    pub(crate) fn feed(&mut self, raw: &str) {
        let line = line::classify(raw);
        match line {
            Line::TableSeparator => return,
            Line::TableRow(cells) => {
                self.table
                    .push(cells.into_iter().map(format_inline).collect());
                return;
            }
            _ => self.flush_table(),
        }

        let block = match line {
            Line::Blank | Line::TableSeparator | Line::TableRow(_) => return,
            Line::Heading(level, text) => Block::new(BlockKind::heading(level), format_inline(text)),
            Line::Divider => Block::divider(),
            Line::Bullet(text) => Block::new(BlockKind::Bullet, format_inline(text)),
            Line::Number(text) => Block::new(BlockKind::Number, format_inline(text)),
            Line::Quote(text) => Block::new(BlockKind::Quote, format_inline(text)),
            Line::Paragraph(text) => Block::paragraph(format_inline(text)),
        };
        self.blocks.push(block);
    }

    /// Close the pending table, if any. The first buffered row is the header.
    pub(crate) fn flush_table(&mut self) {
        if !self.table.is_empty() {
            let rows = std::mem::take(&mut self.table);
            self.blocks.push(Block::table(rows));
        }
    }

    pub(crate) fn has_pending_table(&self) -> bool {
        !self.table.is_empty()
    }

    /// Hand out the blocks completed so far.
    pub(crate) fn drain(&mut self) -> Vec<Block> {
        std::mem::take(&mut self.blocks)
    }

    pub(crate) fn finish(mut self) -> Vec<Block> {
        self.flush_table();
        self.blocks
    }
}
