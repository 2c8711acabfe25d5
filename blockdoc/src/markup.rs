//! The inline markup subset carried in `Block::content`: escaped text with
//! `<b>` and `<i>` elements. Everything here is a pure string transform.

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));
static ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s](?:[^*]*[^*\s])?)\*").expect("valid italic regex"));

const ENTITIES: [(&str, char); 6] = [
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&#39;", '\''),
    ("&#x27;", '\''),
];

/// Inline node of the markup subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Bold(Vec<Inline>),
    Italic(Vec<Inline>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Root,
    Bold,
    Italic,
}

/// Escape the five markup-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Decode the entities produced by [`escape_html`]. Unknown `&` sequences
/// are kept literally.
pub fn unescape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Turn one line of reply text into markup: escape first, then rewrite
/// `**x**` to bold and a standalone `*x*` to italic.
pub fn format_inline(line: &str) -> String {
    let escaped = escape_html(line);
    let bolded = BOLD_RE.replace_all(&escaped, "<b>$1</b>");
    italicize(&bolded)
}

fn italicize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for captures in ITALIC_RE.captures_iter(text) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        // A star glued to another star is a leftover of an unmatched `**`.
        let before = text[..whole.start()].chars().next_back();
        let after = text[whole.end()..].chars().next();
        if before == Some('*') || after == Some('*') {
            continue;
        }
        out.push_str(&text[last..whole.start()]);
        out.push_str("<i>");
        out.push_str(inner.as_str());
        out.push_str("</i>");
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Parse markup into inline nodes. Tags outside the subset and unmatched
/// closing tags stay as literal text; unclosed elements close at the end.
pub fn parse_markup(content: &str) -> Vec<Inline> {
    let mut stack: Vec<(Frame, Vec<Inline>)> = vec![(Frame::Root, Vec::new())];
    let mut raw = String::new();
    let mut rest = content;

    while let Some(ch) = rest.chars().next() {
        if ch == '<' {
            if let Some((frame, opening, len)) = tag_at(rest) {
                if opening {
                    flush_text(&mut raw, &mut stack);
                    stack.push((frame, Vec::new()));
                } else if stack.last().map(|(top, _)| *top) == Some(frame) {
                    flush_text(&mut raw, &mut stack);
                    close_frame(&mut stack);
                } else {
                    raw.push_str(&rest[..len]);
                }
                rest = &rest[len..];
                continue;
            }
        }
        raw.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    flush_text(&mut raw, &mut stack);
    while stack.len() > 1 {
        close_frame(&mut stack);
    }
    stack.pop().map(|(_, nodes)| nodes).unwrap_or_default()
}

fn tag_at(rest: &str) -> Option<(Frame, bool, usize)> {
    const TAGS: [(&str, Frame, bool); 8] = [
        ("<b>", Frame::Bold, true),
        ("</b>", Frame::Bold, false),
        ("<strong>", Frame::Bold, true),
        ("</strong>", Frame::Bold, false),
        ("<i>", Frame::Italic, true),
        ("</i>", Frame::Italic, false),
        ("<em>", Frame::Italic, true),
        ("</em>", Frame::Italic, false),
    ];
    TAGS.iter()
        .find(|(tag, _, _)| rest.starts_with(tag))
        .map(|(tag, frame, opening)| (*frame, *opening, tag.len()))
}

fn flush_text(raw: &mut String, stack: &mut [(Frame, Vec<Inline>)]) {
    if raw.is_empty() {
        return;
    }
    let text = unescape_html(raw);
    raw.clear();
    if let Some((_, nodes)) = stack.last_mut() {
        match nodes.last_mut() {
            Some(Inline::Text(prev)) => prev.push_str(&text),
            _ => nodes.push(Inline::Text(text)),
        }
    }
}

fn close_frame(stack: &mut Vec<(Frame, Vec<Inline>)>) {
    let Some((frame, children)) = stack.pop() else {
        return;
    };
    let node = match frame {
        Frame::Bold => Inline::Bold(children),
        Frame::Italic => Inline::Italic(children),
        Frame::Root => return,
    };
    if let Some((_, nodes)) = stack.last_mut() {
        nodes.push(node);
    }
}

/// Serialize inline nodes back into markup.
pub fn render_markup(nodes: &[Inline]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Inline::Text(text) => out.push_str(&escape_html(text)),
            Inline::Bold(children) => {
                out.push_str("<b>");
                out.push_str(&render_markup(children));
                out.push_str("</b>");
            }
            Inline::Italic(children) => {
                out.push_str("<i>");
                out.push_str(&render_markup(children));
                out.push_str("</i>");
            }
        }
    }
    out
}

/// Visible text of a markup string.
pub fn plain_text(content: &str) -> String {
    fn collect(nodes: &[Inline], out: &mut String) {
        for node in nodes {
            match node {
                Inline::Text(text) => out.push_str(text),
                Inline::Bold(children) | Inline::Italic(children) => collect(children, out),
            }
        }
    }
    let mut out = String::new();
    collect(&parse_markup(content), &mut out);
    out
}

/// Render a markup string as markdown emphasis.
pub fn to_markdown(content: &str) -> String {
    fn write(nodes: &[Inline], out: &mut String) {
        for node in nodes {
            match node {
                Inline::Text(text) => out.push_str(text),
                Inline::Bold(children) => {
                    out.push_str("**");
                    write(children, out);
                    out.push_str("**");
                }
                Inline::Italic(children) => {
                    out.push('*');
                    write(children, out);
                    out.push('*');
                }
            }
        }
    }
    let mut out = String::new();
    write(&parse_markup(content), &mut out);
    out
}
