use std::fmt;

use serde::{Deserialize, Serialize};

use crate::markup;

/// Structural type of a block. There is no list container: every list item
/// is a block of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    Bullet,
    Number,
    Quote,
    Divider,
    Table,
}

impl BlockKind {
    /// Map a markdown heading depth onto the three available levels.
    /// Anything deeper than `###` collapses to `Heading3`.
    pub fn heading(level: usize) -> Self {
        match level {
            0 | 1 => BlockKind::Heading1,
            2 => BlockKind::Heading2,
            _ => BlockKind::Heading3,
        }
    }

    pub fn is_list_item(self) -> bool {
        matches!(self, BlockKind::Bullet | BlockKind::Number)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading1 => "heading1",
            BlockKind::Heading2 => "heading2",
            BlockKind::Heading3 => "heading3",
            BlockKind::Bullet => "bullet",
            BlockKind::Number => "number",
            BlockKind::Quote => "quote",
            BlockKind::Divider => "divider",
            BlockKind::Table => "table",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural unit of a report.
///
/// `content` holds the inline markup subset (escaped text plus `<b>`/`<i>`).
/// Tables leave `content` empty and carry their cells in `rows`, header row
/// first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<String>>>,
}

impl Block {
    pub fn new(kind: BlockKind, content: impl Into<String>) -> Self {
        Block {
            kind,
            content: content.into(),
            rows: None,
        }
    }

    pub fn paragraph(content: impl Into<String>) -> Self {
        Block::new(BlockKind::Paragraph, content)
    }

    pub fn divider() -> Self {
        Block::new(BlockKind::Divider, String::new())
    }

    pub fn table(rows: Vec<Vec<String>>) -> Self {
        Block {
            kind: BlockKind::Table,
            content: String::new(),
            rows: Some(rows),
        }
    }

    /// First table row, if this is a table with at least one row.
    pub fn header(&self) -> Option<&[String]> {
        self.rows.as_ref()?.first().map(Vec::as_slice)
    }

    /// Table rows after the header.
    pub fn body_rows(&self) -> &[Vec<String>] {
        match &self.rows {
            Some(rows) if !rows.is_empty() => &rows[1..],
            _ => &[],
        }
    }

    /// Visible text: entities decoded, tags dropped, table cells concatenated.
    pub fn plain_text(&self) -> String {
        match &self.rows {
            Some(rows) => rows
                .iter()
                .flatten()
                .map(|cell| markup::plain_text(cell))
                .collect(),
            None => markup::plain_text(&self.content),
        }
    }
}
