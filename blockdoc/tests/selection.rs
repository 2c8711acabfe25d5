use blockdoc::selection::find_text;
use blockdoc::{
    Anchor, Block, BlockSelection, Document, Selection, SelectionError, TextSurface, TextTree,
    resolve_selection,
};

fn report() -> Document {
    Document::from_blocks(&[
        Block::paragraph("Hello world"),
        Block::paragraph("Second <b>bold</b> line"),
    ])
}

#[test]
fn span_inside_one_fragment() {
    let doc = report();
    let b0 = doc.block_ids()[0];
    let span = resolve_selection(&doc, Anchor::new(b0, 6), Anchor::new(b0, 11), b0).unwrap();
    assert_eq!(span.original_text, "world");
    assert_eq!(span.fragments.len(), 1);
    assert_eq!((span.fragments[0].start, span.fragments[0].end), (6, 11));
}

#[test]
fn span_across_inline_marks() {
    let doc = report();
    let b1 = doc.block_ids()[1];
    let span = resolve_selection(&doc, Anchor::new(b1, 3), Anchor::new(b1, 9), b1).unwrap();
    assert_eq!(span.original_text, "ond bo");
    assert_eq!(span.fragments.len(), 2);
    assert_eq!(span.blocks(&doc), vec![b1]);
}

#[test]
fn span_across_blocks_widens_to_document() {
    let doc = report();
    let ids = doc.block_ids();
    let span =
        resolve_selection(&doc, Anchor::new(ids[0], 6), Anchor::new(ids[1], 6), ids[0]).unwrap();
    assert_eq!(span.original_text, "worldSecond");
    assert_eq!(span.start_block(&doc), Some(ids[0]));
    assert_eq!(span.end_block(&doc), Some(ids[1]));
}

#[test]
fn full_fragments_between_anchors() {
    let doc = report();
    let ids = doc.block_ids();
    let root = doc.root();
    let span = resolve_selection(&doc, Anchor::new(ids[0], 0), Anchor::new(ids[1], 16), root)
        .unwrap();
    assert_eq!(span.original_text, "Hello worldSecond bold line");
    assert_eq!(span.fragments.len(), 4);
}

#[test]
fn backward_selection_is_normalized() {
    let doc = report();
    let b0 = doc.block_ids()[0];
    let forward = resolve_selection(&doc, Anchor::new(b0, 6), Anchor::new(b0, 11), b0).unwrap();
    let backward = resolve_selection(&doc, Anchor::new(b0, 11), Anchor::new(b0, 6), b0).unwrap();
    assert_eq!(forward, backward);
}

#[test]
fn collapsed_selection_takes_nearest_fragment() {
    let doc = report();
    let b0 = doc.block_ids()[0];
    let span = resolve_selection(&doc, Anchor::new(b0, 3), Anchor::new(b0, 3), b0).unwrap();
    assert_eq!(span.original_text, "Hello world");
}

#[test]
fn textless_anchor_moves_to_next_fragment() {
    let doc = Document::from_blocks(&[Block::divider(), Block::paragraph("after")]);
    let ids = doc.block_ids();
    let span =
        resolve_selection(&doc, Anchor::new(ids[0], 0), Anchor::new(ids[1], 5), doc.root())
            .unwrap();
    assert_eq!(span.original_text, "after");
}

#[test]
fn dead_anchor_is_unresolvable() {
    let mut doc = report();
    let b0 = doc.block_ids()[0];
    doc.remove_block(b0);
    let err = resolve_selection(&doc, Anchor::new(b0, 0), Anchor::new(b0, 3), b0).unwrap_err();
    assert_eq!(err, SelectionError::Unresolvable(b0));
}

#[test]
fn out_of_range_offset_is_unresolvable() {
    let doc = report();
    let b0 = doc.block_ids()[0];
    let result = resolve_selection(&doc, Anchor::new(b0, 0), Anchor::new(b0, 40), b0);
    assert!(matches!(result, Err(SelectionError::Unresolvable(_))));
}

#[test]
fn edits_make_spans_stale() {
    let mut doc = report();
    let b0 = doc.block_ids()[0];
    let span = resolve_selection(&doc, Anchor::new(b0, 0), Anchor::new(b0, 5), b0).unwrap();
    assert!(!span.is_stale(&doc));
    doc.edit_block(b0, "Goodbye world");
    assert!(span.is_stale(&doc));
}

#[test]
fn block_selection_as_span() {
    let doc = report();
    let ids = doc.block_ids();
    let set = BlockSelection::new([ids[1], ids[0], ids[1]]);
    assert_eq!(set.ids().len(), 2);
    assert_eq!(set.ordered(&doc), ids);

    let span = set.to_span(&doc);
    assert_eq!(span.original_text, "Hello worldSecond bold line");
    assert_eq!(
        Selection::Blocks(set).original_text(&doc),
        "Hello worldSecond bold line"
    );
}

#[test]
fn find_text_returns_char_offsets() {
    let doc = Document::from_blocks(&[Block::paragraph("café <b>au</b> lait")]);
    let block = doc.block_ids()[0];
    assert_eq!(find_text(&doc, block, "au lait"), Some(5));
    assert_eq!(find_text(&doc, block, "missing"), None);
    assert_eq!(find_text(&doc, block, ""), None);
}
