pub mod error;

use std::ops::Range;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::block::{Block, BlockKind};
use crate::document::Document;
use crate::markup::escape_html;

pub use error::{LoadWarning, LossKind};

type Events<'e> = [(Event<'e>, Range<usize>)];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build a document from a CommonMark report.
///
/// Anything the block model has no room for (nested lists, code blocks,
/// images, raw HTML) is approximated or dropped, with a warning pointing at
/// the source.
pub fn load_markdown(source: &str, file_id: usize) -> (Document, Vec<LoadWarning>) {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let parser = CmarkParser::new_ext(source, options);
    let events: Vec<(Event<'_>, Range<usize>)> = parser.into_offset_iter().collect();

    let mut state = LoadState::new(file_id);
    state.process_events(&events);
    (Document::from_blocks(&state.blocks), state.warnings)
}

// ---------------------------------------------------------------------------
// Load state
// ---------------------------------------------------------------------------

struct LoadState {
    file_id: usize,
    blocks: Vec<Block>,
    warnings: Vec<LoadWarning>,
}

impl LoadState {
    fn new(file_id: usize) -> Self {
        LoadState {
            file_id,
            blocks: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, kind: LossKind, span: &Range<usize>) {
        self.warnings.push(LoadWarning::new(kind, span.clone(), self.file_id));
    }

    fn process_events(&mut self, events: &Events<'_>) {
        let mut i = 0;

        while i < events.len() {
            let (ref ev, ref range) = events[i];

            match ev {
                Event::Start(Tag::Heading { level, .. }) => {
                    let kind = BlockKind::heading(heading_depth(level));
                    i += 1;
                    let content = self.collect_inlines(events, &mut i, &|e| {
                        matches!(e, TagEnd::Heading(_))
                    });
                    self.blocks.push(Block::new(kind, content));
                }

                Event::Start(Tag::Paragraph) => {
                    i += 1;
                    let content = self.collect_inlines(events, &mut i, &|e| {
                        matches!(e, TagEnd::Paragraph)
                    });
                    // An image-only paragraph has nothing left.
                    if !content.is_empty() {
                        self.blocks.push(Block::paragraph(content));
                    }
                }

                Event::Start(Tag::List(start)) => {
                    i += 1;
                    self.collect_list(events, &mut i, start.is_some());
                }

                Event::Start(Tag::BlockQuote(_)) => {
                    i += 1;
                    self.collect_blockquote(events, &mut i);
                }

                Event::Start(Tag::Table(_)) => {
                    i += 1;
                    let rows = self.collect_table(events, &mut i);
                    self.blocks.push(Block::table(rows));
                }

                Event::Start(Tag::CodeBlock(_)) => {
                    self.warn(LossKind::CodeBlock, range);
                    i += 1;
                    let content = collect_text_until(events, &mut i, |e| {
                        matches!(e, TagEnd::CodeBlock)
                    });
                    let joined = content.split_whitespace().collect::<Vec<_>>().join(" ");
                    self.blocks.push(Block::paragraph(escape_html(&joined)));
                }

                Event::Start(Tag::HtmlBlock) => {
                    self.warn(LossKind::RawHtml, range);
                    i += 1;
                    collect_text_until(events, &mut i, |e| matches!(e, TagEnd::HtmlBlock));
                }

                Event::Rule => {
                    self.blocks.push(Block::divider());
                    i += 1;
                }

                _ => {
                    i += 1;
                }
            }
        }
    }

    /// Collect inline events as markup until the matching end tag.
    fn collect_inlines(
        &mut self,
        events: &Events<'_>,
        i: &mut usize,
        is_end: &dyn Fn(&TagEnd) -> bool,
    ) -> String {
        let mut out = String::new();

        while *i < events.len() {
            match &events[*i].0 {
                Event::End(tag_end) if is_end(tag_end) => {
                    *i += 1;
                    break;
                }
                _ => self.push_inline(events, i, &mut out),
            }
        }

        out
    }

    /// Render the inline construct starting at `events[*i]` and advance
    /// past it.
    fn push_inline(&mut self, events: &Events<'_>, i: &mut usize, out: &mut String) {
        let (ref ev, ref range) = events[*i];
        *i += 1;
        match ev {
            Event::Text(s) | Event::Code(s) | Event::InlineHtml(s) => {
                out.push_str(&escape_html(s));
            }
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            Event::Start(Tag::Strong) => {
                let inner = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Strong));
                out.push_str("<b>");
                out.push_str(&inner);
                out.push_str("</b>");
            }
            Event::Start(Tag::Emphasis) => {
                let inner = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Emphasis));
                out.push_str("<i>");
                out.push_str(&inner);
                out.push_str("</i>");
            }
            Event::Start(Tag::Strikethrough) => {
                let inner =
                    self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Strikethrough));
                out.push_str(&inner);
            }
            Event::Start(Tag::Link { .. }) => {
                let inner = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Link));
                out.push_str(&inner);
            }
            Event::Start(Tag::Image { .. }) => {
                self.warn(LossKind::Image, range);
                collect_text_until(events, i, |e| matches!(e, TagEnd::Image));
            }
            _ => {}
        }
    }

    /// Every item becomes a block of its own. Nested lists are flattened in
    /// place after their parent item.
    fn collect_list(&mut self, events: &Events<'_>, i: &mut usize, ordered: bool) {
        let kind = if ordered { BlockKind::Number } else { BlockKind::Bullet };

        while *i < events.len() {
            match &events[*i].0 {
                Event::End(TagEnd::List(_)) => {
                    *i += 1;
                    break;
                }
                Event::Start(Tag::Item) => {
                    *i += 1;
                    self.collect_item(events, i, kind);
                }
                _ => {
                    *i += 1;
                }
            }
        }
    }

    fn collect_item(&mut self, events: &Events<'_>, i: &mut usize, kind: BlockKind) {
        let mut content = String::new();
        let mut emitted = false;

        while *i < events.len() {
            let (ref ev, ref range) = events[*i];
            match ev {
                Event::End(TagEnd::Item) => {
                    *i += 1;
                    break;
                }
                Event::Start(Tag::Paragraph) => {
                    *i += 1;
                    let run = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Paragraph));
                    append_run(&mut content, &run);
                }
                Event::Start(Tag::List(start)) => {
                    if !emitted {
                        self.blocks.push(Block::new(kind, std::mem::take(&mut content)));
                        emitted = true;
                    }
                    self.warn(LossKind::NestedList, range);
                    *i += 1;
                    self.collect_list(events, i, start.is_some());
                }
                Event::End(_) | Event::Start(_) if !is_inline(ev) => {
                    *i += 1;
                }
                _ => self.push_inline(events, i, &mut content),
            }
        }

        if !emitted || !content.is_empty() {
            self.blocks.push(Block::new(kind, content));
        }
    }

    /// Paragraphs (and headings) inside a quote become quote blocks.
    fn collect_blockquote(&mut self, events: &Events<'_>, i: &mut usize) {
        let mut depth = 0usize;

        while *i < events.len() {
            match &events[*i].0 {
                Event::End(TagEnd::BlockQuote(_)) if depth == 0 => {
                    *i += 1;
                    break;
                }
                Event::End(TagEnd::BlockQuote(_)) => {
                    depth -= 1;
                    *i += 1;
                }
                Event::Start(Tag::BlockQuote(_)) => {
                    depth += 1;
                    *i += 1;
                }
                Event::Start(Tag::Paragraph) => {
                    *i += 1;
                    let content =
                        self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Paragraph));
                    self.blocks.push(Block::new(BlockKind::Quote, content));
                }
                Event::Start(Tag::Heading { .. }) => {
                    *i += 1;
                    let content =
                        self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Heading(_)));
                    self.blocks.push(Block::new(BlockKind::Quote, content));
                }
                _ => {
                    *i += 1;
                }
            }
        }
    }

    /// Table rows as markup cells, header row first.
    fn collect_table(&mut self, events: &Events<'_>, i: &mut usize) -> Vec<Vec<String>> {
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut current_row: Vec<String> = Vec::new();

        while *i < events.len() {
            match &events[*i].0 {
                Event::End(TagEnd::Table) => {
                    *i += 1;
                    break;
                }
                Event::Start(Tag::TableHead) | Event::Start(Tag::TableRow) => {
                    current_row = Vec::new();
                    *i += 1;
                }
                Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
                    rows.push(std::mem::take(&mut current_row));
                    *i += 1;
                }
                Event::Start(Tag::TableCell) => {
                    *i += 1;
                    let cell = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::TableCell));
                    current_row.push(cell);
                }
                _ => {
                    *i += 1;
                }
            }
        }

        rows
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn heading_depth(level: &HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn is_inline(ev: &Event<'_>) -> bool {
    matches!(
        ev,
        Event::Start(
            Tag::Strong | Tag::Emphasis | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
        )
    )
}

/// Join separate paragraphs of one list item with a space.
fn append_run(content: &mut String, run: &str) {
    if !content.is_empty() && !run.is_empty() {
        content.push(' ');
    }
    content.push_str(run);
}

/// Collect raw text (all Text events) until the matching end tag.
fn collect_text_until(
    events: &Events<'_>,
    i: &mut usize,
    is_end: impl Fn(&TagEnd) -> bool,
) -> String {
    let mut text = String::new();
    while *i < events.len() {
        match &events[*i].0 {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            Event::Text(s) | Event::Html(s) => {
                text.push_str(s);
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    text
}
