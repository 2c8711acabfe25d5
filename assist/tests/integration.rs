use std::io::Write;

use assist::{AssistConfig, AssistError, AssistSession, ConfigError};
use blockdoc::{
    Anchor, Block, BlockKind, Degradation, Document, MergeMode, SelectionError, TextSurface,
    TextTree,
};

fn report(texts: &[&str]) -> Document {
    let blocks: Vec<Block> = texts.iter().map(|text| Block::paragraph(*text)).collect();
    Document::from_blocks(&blocks)
}

fn select(session: &mut AssistSession, doc: &mut Document, block: usize, start: usize, end: usize) {
    let id = doc.block_ids()[block];
    session
        .select_span(doc, Anchor::new(id, start), Anchor::new(id, end), id)
        .expect("selection failed");
}

#[test]
fn round_trip_applies_the_reply() {
    let mut doc = report(&["The risk is high.", "Next"]);
    let mut session = AssistSession::new();
    select(&mut session, &mut doc, 0, 12, 16);

    let token = session.begin_request(&mut doc).unwrap();
    assert!(session.is_processing());
    let version = session.version();

    let report = session.complete(&mut doc, token, "moderate").unwrap();
    assert_eq!(report.mode, MergeMode::Replace);
    assert_eq!(report.degraded, None);
    assert_eq!(
        doc.snapshot(),
        vec![Block::paragraph("The risk is moderate."), Block::paragraph("Next")]
    );
    assert!(session.selection().is_none());
    assert!(!session.highlights().is_active());
    assert!(session.pending().is_none());
    assert!(session.version() > version);
    assert!(doc.is_dirty());
}

#[test]
fn new_selection_makes_pending_result_stale() {
    let mut doc = report(&["Alpha beta gamma"]);
    let mut session = AssistSession::new();
    select(&mut session, &mut doc, 0, 0, 5);
    let token = session.begin_request(&mut doc).unwrap();

    select(&mut session, &mut doc, 0, 6, 10);
    let err = session.complete(&mut doc, token, "replaced").unwrap_err();

    assert_eq!(
        err,
        AssistError::StaleResult {
            got: token.version(),
            current: session.version(),
        }
    );
    assert!(err.is_silent());
    assert_eq!(doc.block_text(doc.block_ids()[0]), "Alpha beta gamma");
    assert_eq!(session.highlights().painted_text(&doc), "beta");
    assert!(!doc.is_dirty());
}

#[test]
fn reselect_over_painted_fragments_while_pending() {
    let mut doc = report(&["The risk is high today."]);
    let block = doc.block_ids()[0];
    let mut session = AssistSession::new();
    select(&mut session, &mut doc, 0, 12, 16);
    let token = session.begin_request(&mut doc).unwrap();

    // Anchors taken from the tree as the user sees it, wrappers included.
    let fragments = doc.text_fragments_of(block);
    assert_eq!(fragments.len(), 3);
    assert_eq!(doc.fragment_text(fragments[1]), Some("high"));
    session
        .select_span(
            &mut doc,
            Anchor::new(fragments[1], 0),
            Anchor::new(fragments[2], 6),
            block,
        )
        .unwrap();
    assert_eq!(session.highlights().painted_text(&doc), "high today");
    assert!(session.highlights().is_intact(&doc));

    let err = session.complete(&mut doc, token, "low").unwrap_err();
    assert!(matches!(err, AssistError::StaleResult { .. }));
    assert_eq!(doc.block_text(block), "The risk is high today.");

    let retry = session.begin_request(&mut doc).unwrap();
    session.complete(&mut doc, retry, "x").unwrap();
    assert_eq!(doc.snapshot(), vec![Block::paragraph("The risk is x.")]);
}

#[test]
fn paint_span_resolved_against_the_old_highlight() {
    let mut doc = report(&["The risk is high."]);
    let block = doc.block_ids()[0];
    let mut session = AssistSession::new();
    select(&mut session, &mut doc, 0, 12, 16);
    let token = session.begin_request(&mut doc).unwrap();

    let span = session
        .resolve_selection(&doc, Anchor::new(block, 0), Anchor::new(block, 3), block)
        .unwrap();
    let painted = session.paint_selection(&mut doc, &span).unwrap();
    assert_eq!(painted.len(), 1);
    assert_eq!(session.highlights().painted_text(&doc), "The");
    assert!(!session.is_processing());

    let err = session.complete(&mut doc, token, "low").unwrap_err();
    assert!(matches!(err, AssistError::StaleResult { .. }));

    let retry = session.begin_request(&mut doc).unwrap();
    session.complete(&mut doc, retry, "A").unwrap();
    assert_eq!(doc.snapshot(), vec![Block::paragraph("A risk is high.")]);
}

#[test]
fn failed_reselect_clears_the_old_highlight() {
    let mut doc = report(&["Alpha beta", "Gone"]);
    let gone = doc.block_ids()[1];
    doc.remove_block(gone);
    let mut session = AssistSession::new();
    select(&mut session, &mut doc, 0, 6, 10);
    let token = session.begin_request(&mut doc).unwrap();

    assert!(
        session
            .select_span(&mut doc, Anchor::new(gone, 0), Anchor::new(gone, 2), gone)
            .is_err()
    );
    assert!(!session.highlights().is_active());
    assert!(session.selection().is_none());
    assert_eq!(doc.snapshot(), vec![Block::paragraph("Alpha beta")]);
    assert!(session.complete(&mut doc, token, "late").is_err());
}

#[test]
fn second_request_supersedes_the_first() {
    let mut doc = report(&["Alpha beta gamma"]);
    let mut session = AssistSession::new();
    select(&mut session, &mut doc, 0, 6, 10);

    let first = session.begin_request(&mut doc).unwrap();
    let second = session.begin_request(&mut doc).unwrap();
    assert_ne!(first, second);
    assert!(second.version() > first.version());

    let err = session.complete(&mut doc, first, "one").unwrap_err();
    assert!(matches!(err, AssistError::StaleResult { .. }));
    assert_eq!(doc.block_text(doc.block_ids()[0]), "Alpha beta gamma");

    session.complete(&mut doc, second, "two").unwrap();
    assert_eq!(doc.snapshot(), vec![Block::paragraph("Alpha two gamma")]);
}

#[test]
fn cancel_unwraps_and_drops_late_results() {
    let mut doc = report(&["Alpha beta gamma"]);
    let mut session = AssistSession::new();
    select(&mut session, &mut doc, 0, 6, 10);
    let token = session.begin_request(&mut doc).unwrap();

    session.cancel(&mut doc);
    assert!(!session.highlights().is_active());
    assert_eq!(doc.snapshot(), vec![Block::paragraph("Alpha beta gamma")]);

    let err = session.complete(&mut doc, token, "late").unwrap_err();
    assert!(matches!(err, AssistError::StaleResult { .. }));
    assert_eq!(doc.snapshot(), vec![Block::paragraph("Alpha beta gamma")]);
}

#[test]
fn empty_reply_leaves_everything_in_place() {
    let mut doc = report(&["Alpha beta gamma"]);
    let mut session = AssistSession::new();
    select(&mut session, &mut doc, 0, 6, 10);
    let token = session.begin_request(&mut doc).unwrap();

    let err = session.complete(&mut doc, token, "\n   \n").unwrap_err();
    assert_eq!(err, AssistError::EmptyReply);
    assert!(err.is_silent());
    assert!(session.highlights().is_intact(&doc));
    assert!(session.selection().is_some());
    assert!(!session.is_processing());
    assert_eq!(doc.block_text(doc.block_ids()[0]), "Alpha beta gamma");
    assert!(!doc.is_dirty());

    // The same selection can be sent again.
    let retry = session.begin_request(&mut doc).unwrap();
    session.complete(&mut doc, retry, "delta").unwrap();
    assert_eq!(doc.snapshot(), vec![Block::paragraph("Alpha delta gamma")]);
}

#[test]
fn unresolvable_selection_disables_requests() {
    let mut doc = report(&["Only"]);
    let id = doc.block_ids()[0];
    doc.remove_block(id);
    let mut session = AssistSession::new();

    let err = session
        .select_span(&mut doc, Anchor::new(id, 0), Anchor::new(id, 2), id)
        .unwrap_err();
    assert_eq!(
        err,
        AssistError::SelectionUnresolvable(SelectionError::Unresolvable(id))
    );
    assert!(!err.is_silent());
    assert!(session.selection().is_none());
    assert!(matches!(
        session.begin_request(&mut doc),
        Err(AssistError::SelectionUnresolvable(_))
    ));
}

#[test]
fn block_selection_round_trip() {
    let mut doc = report(&["First", "Second", "Third"]);
    let ids = doc.block_ids();
    let mut session = AssistSession::new();
    session.select_blocks(&mut doc, [ids[1]]).unwrap();
    assert_eq!(session.highlights().painted_text(&doc), "Second");

    let token = session.begin_request(&mut doc).unwrap();
    session.complete(&mut doc, token, "## New\n- item").unwrap();

    assert_eq!(
        doc.snapshot(),
        vec![
            Block::paragraph("First"),
            Block::new(BlockKind::Heading2, "New"),
            Block::new(BlockKind::Bullet, "item"),
            Block::paragraph("Third"),
        ]
    );
}

#[test]
fn edited_block_falls_back_to_append() {
    let mut doc = report(&["Keep this sentence intact."]);
    let mut session = AssistSession::new();
    select(&mut session, &mut doc, 0, 10, 18);
    let token = session.begin_request(&mut doc).unwrap();
    doc.edit_block(doc.block_ids()[0], "Rewritten by hand.");

    let report = session.complete(&mut doc, token, "phrase").unwrap();
    assert_eq!(report.degraded, Some(Degradation::AnchorNotFound));
    assert_eq!(AssistError::degradation(&report), Some(AssistError::AnchorNotFound));
    assert_eq!(
        doc.snapshot(),
        vec![Block::paragraph("Rewritten by hand."), Block::paragraph("phrase")]
    );
}

#[test]
fn mode_comes_from_config() {
    let config = AssistConfig {
        default_mode: MergeMode::Insert,
        ..AssistConfig::default()
    };
    let mut doc = report(&["Alpha beta"]);
    let mut session = AssistSession::with_config(config);
    select(&mut session, &mut doc, 0, 6, 10);
    let token = session.begin_request(&mut doc).unwrap();
    session.complete(&mut doc, token, "- note").unwrap();

    assert_eq!(
        doc.snapshot(),
        vec![
            Block::paragraph("Alpha beta"),
            Block::new(BlockKind::Bullet, "note"),
        ]
    );
}

#[test]
fn step_by_step_operations() {
    let mut doc = report(&["Alpha beta gamma", "Delta"]);
    let ids = doc.block_ids();
    let mut session = AssistSession::new();
    assert_eq!(session.mode(), MergeMode::Replace);
    session.set_mode(MergeMode::Append);
    assert_eq!(session.config(), &AssistConfig::default());

    let span = session
        .resolve_selection(&doc, Anchor::new(ids[0], 6), Anchor::new(ids[0], 10), ids[0])
        .unwrap();
    assert_eq!(span.original_text, "beta");
    assert!(session.highlights().annotations().is_empty());

    let painted = session.paint_selection(&mut doc, &span).unwrap();
    assert_eq!(painted.len(), 1);
    session.set_processing(&mut doc, true);
    assert!(session.is_processing());
    session.set_processing(&mut doc, false);
    assert!(!session.is_processing());

    assert_eq!(session.teardown_highlight(&mut doc), 1);
    assert_eq!(doc.block_text(ids[0]), "Alpha beta gamma");

    let blocks = AssistSession::parse_reply("> quoted");
    let selection = session.selection().cloned().unwrap();
    let report = session
        .apply_merge(&mut doc, session.mode(), &selection, &blocks)
        .unwrap();
    assert_eq!(report.mode, MergeMode::Append);
    assert_eq!(
        doc.snapshot(),
        vec![
            Block::paragraph("Alpha beta gamma"),
            Block::new(BlockKind::Quote, "quoted"),
            Block::paragraph("Delta"),
        ]
    );
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn config_defaults() {
    let config = AssistConfig::default();
    assert_eq!(config.default_mode, MergeMode::Replace);
    assert!(config.search_fallback);
    assert_eq!(config.log_level, "warn");
    assert_eq!(AssistConfig::from_toml_str("").unwrap(), config);
}

#[test]
fn config_partial_file() {
    let config = AssistConfig::from_toml_str("default_mode = \"append\"\n").unwrap();
    assert_eq!(config.default_mode, MergeMode::Append);
    assert!(config.search_fallback);
}

#[test]
fn config_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "search_fallback = false").unwrap();
    writeln!(file, "log_level = \"debug\"").unwrap();

    let config = AssistConfig::load(file.path()).unwrap();
    assert!(!config.search_fallback);
    assert!(!config.merge_options().search_fallback);
    assert_eq!(config.log_level, "debug");
}

#[test]
fn config_discover() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        AssistConfig::discover_in(dir.path()).unwrap(),
        AssistConfig::default()
    );

    std::fs::write(dir.path().join("assist.toml"), "default_mode = \"insert\"").unwrap();
    assert_eq!(
        AssistConfig::discover_in(dir.path()).unwrap().default_mode,
        MergeMode::Insert
    );
}

#[test]
fn config_errors() {
    assert!(matches!(
        AssistConfig::from_toml_str("default_mode = \"merge\""),
        Err(ConfigError::Toml(_))
    ));
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        AssistConfig::load(&dir.path().join("missing.toml")),
        Err(ConfigError::Io { .. })
    ));
}
