use blockdoc::markup::{
    Inline, escape_html, format_inline, parse_markup, plain_text, render_markup, to_markdown,
    unescape_html,
};
use blockdoc::Block;

#[test]
fn escapes_the_five_characters() {
    assert_eq!(
        escape_html(r#"a & b < c > d "e" 'f'"#),
        "a &amp; b &lt; c &gt; d &quot;e&quot; &#39;f&#39;"
    );
}

#[test]
fn unescape_reverses_escape_and_keeps_unknown_entities() {
    let raw = r#"<tag> & "quotes" it's"#;
    assert_eq!(unescape_html(&escape_html(raw)), raw);
    assert_eq!(unescape_html("&#x27;"), "'");
    assert_eq!(unescape_html("AT&T &copy;"), "AT&T &copy;");
}

#[test]
fn bold_and_italic() {
    assert_eq!(format_inline("**Critical** risk."), "<b>Critical</b> risk.");
    assert_eq!(format_inline("an *important* note"), "an <i>important</i> note");
    assert_eq!(
        format_inline("**both** and *one*"),
        "<b>both</b> and <i>one</i>"
    );
}

#[test]
fn escaping_happens_before_emphasis() {
    assert_eq!(format_inline("a < b & *c*"), "a &lt; b &amp; <i>c</i>");
    assert_eq!(format_inline("<b>not a tag</b>"), "&lt;b&gt;not a tag&lt;/b&gt;");
}

#[test]
fn stray_stars_are_left_alone() {
    assert_eq!(format_inline("5 * 3 * 2"), "5 * 3 * 2");
    assert_eq!(format_inline("**unclosed"), "**unclosed");
}

#[test]
fn parse_markup_builds_inline_tree() {
    assert_eq!(
        parse_markup("<b>Critical</b> risk."),
        vec![
            Inline::Bold(vec![Inline::Text("Critical".into())]),
            Inline::Text(" risk.".into()),
        ]
    );
    assert_eq!(
        parse_markup("<strong>a</strong><em>b</em>"),
        vec![
            Inline::Bold(vec![Inline::Text("a".into())]),
            Inline::Italic(vec![Inline::Text("b".into())]),
        ]
    );
}

#[test]
fn unknown_and_unmatched_tags_are_text() {
    assert_eq!(parse_markup("<u>x</u>"), vec![Inline::Text("<u>x</u>".into())]);
    assert_eq!(parse_markup("a </b> b"), vec![Inline::Text("a </b> b".into())]);
}

#[test]
fn unclosed_element_closes_at_end() {
    assert_eq!(
        parse_markup("<i>open"),
        vec![Inline::Italic(vec![Inline::Text("open".into())])]
    );
}

#[test]
fn render_is_stable() {
    let content = "a &amp; <b>b <i>c</i></b>";
    assert_eq!(render_markup(&parse_markup(content)), content);
}

#[test]
fn plain_text_and_markdown() {
    assert_eq!(plain_text("<b>A</b> &lt;3"), "A <3");
    assert_eq!(to_markdown("<b>bold</b> and <i>it</i>"), "**bold** and *it*");

    let table = Block::table(vec![
        vec!["<b>A</b>".to_string(), "B".to_string()],
        vec!["1 &amp; 2".to_string(), String::new()],
    ]);
    assert_eq!(table.plain_text(), "AB1 & 2");
    assert_eq!(Block::paragraph("x <i>y</i>").plain_text(), "x y");
}
