use blockdoc::{
    Anchor, Block, BlockKind, BlockSelection, Degradation, Document, EditOp, HighlightManager,
    MergeError, MergeMode, MergeOptions, Selection, TextSurface, TextTree, apply_merge,
    apply_merge_with, parse_reply, resolve_selection,
};

fn paragraphs(texts: &[&str]) -> Document {
    let blocks: Vec<Block> = texts.iter().map(|text| Block::paragraph(*text)).collect();
    Document::from_blocks(&blocks)
}

/// Resolve and paint a selection inside one block.
fn select(
    doc: &mut Document,
    highlights: &mut HighlightManager,
    block: usize,
    start: usize,
    end: usize,
) -> Selection {
    let id = doc.block_ids()[block];
    let span =
        resolve_selection(&*doc, Anchor::new(id, start), Anchor::new(id, end), id).unwrap();
    highlights.paint(doc, &span).unwrap();
    Selection::Span(span)
}

fn bullet(text: &str) -> Block {
    Block::new(BlockKind::Bullet, text)
}

#[test]
fn paragraph_reply_splices_inline() {
    let mut doc = paragraphs(&["The risk is high.", "Other"]);
    let mut highlights = HighlightManager::new();
    let selection = select(&mut doc, &mut highlights, 0, 12, 16);
    let b0 = doc.block_ids()[0];

    let report = apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Replace,
        &selection,
        &parse_reply("**severe**"),
    )
    .unwrap();

    assert_eq!(doc.block_count(), 2);
    assert_eq!(doc.block(b0), Some(Block::paragraph("The risk is <b>severe</b>.")));
    assert!(report.ops.contains(&EditOp::SplicedInline { block: b0 }));
    assert_eq!(report.degraded, None);
    assert!(!highlights.is_active());
}

#[test]
fn merge_marks_dirty_and_requests_layout() {
    let mut doc = paragraphs(&["The risk is high."]);
    let mut highlights = HighlightManager::new();
    let selection = select(&mut doc, &mut highlights, 0, 12, 16);
    apply_merge(&mut doc, &mut highlights, MergeMode::Replace, &selection, &parse_reply("low"))
        .unwrap();
    assert!(doc.is_dirty());
    assert_eq!(doc.layout_requests(), 1);
}

#[test]
fn multi_block_reply_over_a_whole_paragraph() {
    let mut doc = paragraphs(&["Intro", "Replace me", "Outro"]);
    let mut highlights = HighlightManager::new();
    let selection = select(&mut doc, &mut highlights, 1, 0, 10);
    let reply = parse_reply("# Title\n- a\n- b");

    apply_merge(&mut doc, &mut highlights, MergeMode::Replace, &selection, &reply).unwrap();

    assert_eq!(doc.block_count(), 3 + reply.len() - 1);
    assert_eq!(
        doc.snapshot(),
        vec![
            Block::paragraph("Intro"),
            Block::new(BlockKind::Heading1, "Title"),
            bullet("a"),
            bullet("b"),
            Block::paragraph("Outro"),
        ]
    );
}

#[test]
fn multi_block_reply_over_part_of_a_paragraph() {
    let mut doc = paragraphs(&["Intro", "Replace me", "Outro"]);
    let mut highlights = HighlightManager::new();
    let selection = select(&mut doc, &mut highlights, 1, 8, 10);

    apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Replace,
        &selection,
        &parse_reply("- a\n- b"),
    )
    .unwrap();

    // The partly selected block stays, so every reply block is a new one.
    assert_eq!(doc.block_count(), 3 + 2);
    assert_eq!(
        doc.snapshot(),
        vec![
            Block::paragraph("Intro"),
            Block::paragraph("Replace "),
            bullet("a"),
            bullet("b"),
            Block::paragraph("Outro"),
        ]
    );
}

#[test]
fn span_across_blocks_replaced_by_paragraph() {
    let mut doc = paragraphs(&["Keep this", "drop all", "and this"]);
    let ids = doc.block_ids();
    let mut highlights = HighlightManager::new();
    let span = resolve_selection(
        &doc,
        Anchor::new(ids[0], 5),
        Anchor::new(ids[2], 3),
        doc.root(),
    )
    .unwrap();
    highlights.paint(&mut doc, &span).unwrap();

    let report = apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Replace,
        &Selection::Span(span),
        &parse_reply("that"),
    )
    .unwrap();

    assert_eq!(
        doc.snapshot(),
        vec![Block::paragraph("Keep that"), Block::paragraph(" this")]
    );
    assert_eq!(report.removed_blocks(), vec![ids[1]]);
}

#[test]
fn block_set_replace_without_predecessor() {
    let mut doc = paragraphs(&["First", "Second", "Third"]);
    let ids = doc.block_ids();
    let mut highlights = HighlightManager::new();
    let selection = Selection::Blocks(BlockSelection::new([ids[0], ids[1]]));

    let report = apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Replace,
        &selection,
        &parse_reply("- x\n- y"),
    )
    .unwrap();

    assert_eq!(
        doc.snapshot(),
        vec![bullet("x"), bullet("y"), Block::paragraph("Third")]
    );
    assert_eq!(report.removed_blocks(), vec![ids[0], ids[1]]);
    assert_eq!(report.inserted_blocks().len(), 2);
    assert_eq!(doc.block_ids()[..2], report.inserted_blocks()[..]);
}

#[test]
fn block_set_replace_with_predecessor() {
    let mut doc = paragraphs(&["First", "Second", "Third"]);
    let ids = doc.block_ids();
    let mut highlights = HighlightManager::new();
    let selection = Selection::Blocks(BlockSelection::new([ids[1]]));

    apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Replace,
        &selection,
        &parse_reply("- x\n- y"),
    )
    .unwrap();

    assert_eq!(
        doc.snapshot(),
        vec![
            Block::paragraph("First"),
            bullet("x"),
            bullet("y"),
            Block::paragraph("Third"),
        ]
    );
}

#[test]
fn block_set_replace_inserts_at_first_removed_position() {
    let mut doc = paragraphs(&["First", "Second", "Third"]);
    let ids = doc.block_ids();
    let mut highlights = HighlightManager::new();
    let selection = Selection::Blocks(BlockSelection::new([ids[2], ids[0]]));

    apply_merge(&mut doc, &mut highlights, MergeMode::Replace, &selection, &parse_reply("x"))
        .unwrap();

    assert_eq!(
        doc.snapshot(),
        vec![Block::paragraph("x"), Block::paragraph("Second")]
    );
}

#[test]
fn insert_keeps_the_selected_text() {
    let mut doc = paragraphs(&["Alpha beta", "Gamma"]);
    let mut highlights = HighlightManager::new();
    let selection = select(&mut doc, &mut highlights, 0, 6, 10);
    let b0 = doc.block_ids()[0];

    let report = apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Insert,
        &selection,
        &parse_reply("New para"),
    )
    .unwrap();

    assert_eq!(
        doc.snapshot(),
        vec![
            Block::paragraph("Alpha beta"),
            Block::paragraph("New para"),
            Block::paragraph("Gamma"),
        ]
    );
    assert_eq!(report.ops[0], EditOp::ClearedHighlight(1));
    assert_eq!(doc.children(b0).len(), 1);
}

#[test]
fn append_goes_after_the_block_holding_the_end() {
    let mut doc = paragraphs(&["One", "Two", "Three"]);
    let ids = doc.block_ids();
    let mut highlights = HighlightManager::new();
    let span = resolve_selection(&doc, Anchor::new(ids[0], 1), Anchor::new(ids[1], 2), doc.root())
        .unwrap();
    highlights.paint(&mut doc, &span).unwrap();

    let report = apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Append,
        &Selection::Span(span),
        &parse_reply("- added"),
    )
    .unwrap();

    assert_eq!(report.mode, MergeMode::Append);
    assert_eq!(
        doc.snapshot(),
        vec![
            Block::paragraph("One"),
            Block::paragraph("Two"),
            bullet("added"),
            Block::paragraph("Three"),
        ]
    );
}

#[test]
fn critical_risk_at_an_empty_anchor() {
    let expected = vec![
        Block::paragraph("<b>Critical</b> risk."),
        bullet("Mitigate"),
        bullet("Monitor"),
    ];
    let reply = parse_reply("**Critical** risk.\n\n- Mitigate\n- Monitor");

    let mut doc = Document::new();
    let mut highlights = HighlightManager::new();
    let selection = Selection::Blocks(BlockSelection::default());
    apply_merge(&mut doc, &mut highlights, MergeMode::Insert, &selection, &reply).unwrap();
    assert_eq!(doc.snapshot(), expected);

    let mut doc = paragraphs(&[""]);
    let selection = Selection::Blocks(BlockSelection::new(doc.block_ids()));
    apply_merge(&mut doc, &mut highlights, MergeMode::Replace, &selection, &reply).unwrap();
    assert_eq!(doc.snapshot(), expected);
}

#[test]
fn tables_are_inserted_with_their_rows() {
    let mut doc = paragraphs(&["Before"]);
    let mut highlights = HighlightManager::new();
    let selection = Selection::Blocks(BlockSelection::new(doc.block_ids()));
    let report = apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Append,
        &selection,
        &parse_reply("| A | B |\n|---|---|\n| 1 | 2 |"),
    )
    .unwrap();

    let table = report.inserted_blocks()[0];
    let block = doc.block(table).unwrap();
    assert_eq!(block.kind, BlockKind::Table);
    assert_eq!(
        block.rows,
        Some(vec![
            vec!["A".to_string(), "B".to_string()],
            vec!["1".to_string(), "2".to_string()],
        ])
    );
}

#[test]
fn empty_reply_changes_nothing() {
    let mut doc = paragraphs(&["Hello world"]);
    let mut highlights = HighlightManager::new();
    let selection = select(&mut doc, &mut highlights, 0, 0, 5);
    let before = doc.snapshot();

    let result = apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Replace,
        &selection,
        &parse_reply("\n\n"),
    );

    assert_eq!(result, Err(MergeError::EmptyReply));
    assert_eq!(doc.snapshot(), before);
    assert!(highlights.is_intact(&doc));
    assert!(!doc.is_dirty());
    assert_eq!(doc.layout_requests(), 0);
}

#[test]
fn unpainted_span_is_painted_before_replacing() {
    let mut doc = paragraphs(&["The risk is high."]);
    let b0 = doc.block_ids()[0];
    let span = resolve_selection(&doc, Anchor::new(b0, 12), Anchor::new(b0, 16), b0).unwrap();
    let mut highlights = HighlightManager::new();

    apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Replace,
        &Selection::Span(span),
        &parse_reply("low"),
    )
    .unwrap();

    assert_eq!(doc.snapshot(), vec![Block::paragraph("The risk is low.")]);
}

#[test]
fn lost_span_is_found_by_text_search() {
    let mut doc = paragraphs(&["Keep this sentence intact."]);
    let mut highlights = HighlightManager::new();
    let selection = select(&mut doc, &mut highlights, 0, 10, 18);
    let b0 = doc.block_ids()[0];
    doc.edit_block(b0, "Keep this sentence, please.");

    let report = apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Replace,
        &selection,
        &parse_reply("phrase"),
    )
    .unwrap();

    assert_eq!(report.degraded, None);
    assert_eq!(doc.snapshot(), vec![Block::paragraph("Keep this phrase, please.")]);
}

#[test]
fn missing_text_degrades_to_append() {
    let mut doc = paragraphs(&["Keep this sentence intact.", "Tail"]);
    let mut highlights = HighlightManager::new();
    let selection = select(&mut doc, &mut highlights, 0, 10, 18);
    let b0 = doc.block_ids()[0];
    doc.edit_block(b0, "Completely different.");

    let report = apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Replace,
        &selection,
        &parse_reply("phrase"),
    )
    .unwrap();

    assert_eq!(report.degraded, Some(Degradation::AnchorNotFound));
    assert_eq!(
        doc.snapshot(),
        vec![
            Block::paragraph("Completely different."),
            Block::paragraph("phrase"),
            Block::paragraph("Tail"),
        ]
    );
}

#[test]
fn search_can_be_switched_off() {
    let mut doc = paragraphs(&["Keep this sentence intact."]);
    let mut highlights = HighlightManager::new();
    let selection = select(&mut doc, &mut highlights, 0, 10, 18);
    let b0 = doc.block_ids()[0];
    doc.edit_block(b0, "Keep this sentence, please.");

    let report = apply_merge_with(
        &mut doc,
        &mut highlights,
        MergeMode::Replace,
        &selection,
        &parse_reply("phrase"),
        MergeOptions {
            search_fallback: false,
        },
    )
    .unwrap();

    assert_eq!(report.degraded, Some(Degradation::AnchorNotFound));
    assert_eq!(doc.block_count(), 2);
}

#[test]
fn block_set_with_no_live_blocks_appends() {
    let mut doc = paragraphs(&["Only"]);
    let gone = doc.insert_block_after(None, BlockKind::Quote, "gone");
    doc.remove_block(gone);
    let mut highlights = HighlightManager::new();

    let report = apply_merge(
        &mut doc,
        &mut highlights,
        MergeMode::Replace,
        &Selection::Blocks(BlockSelection::new([gone])),
        &parse_reply("new"),
    )
    .unwrap();

    assert_eq!(report.degraded, Some(Degradation::AnchorNotFound));
    assert_eq!(
        doc.snapshot(),
        vec![Block::paragraph("Only"), Block::paragraph("new")]
    );
}

#[test]
fn mode_names() {
    assert_eq!("Insert".parse::<MergeMode>(), Ok(MergeMode::Insert));
    assert_eq!(MergeMode::default(), MergeMode::Replace);
    assert_eq!(MergeMode::Append.to_string(), "append");
    assert!("merge".parse::<MergeMode>().is_err());
}
