use once_cell::sync::Lazy;
use regex::Regex;

static TABLE_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)+\|?$").expect("valid table separator regex")
});
static TABLE_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\|.*\|$").expect("valid table row regex"));
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,4})\s+(.*)$").expect("valid heading regex"));
static DIVIDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-{3,}$").expect("valid divider regex"));
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*]\s+(.*)$").expect("valid bullet regex"));
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]\s+(.*)$").expect("valid number regex"));
static QUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^>\s?(.*)$").expect("valid quote regex"));

/// What one trimmed reply line is, before inline formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    Blank,
    TableSeparator,
    TableRow(Vec<&'a str>),
    Heading(usize, &'a str),
    Divider,
    Bullet(&'a str),
    Number(&'a str),
    Quote(&'a str),
    Paragraph(&'a str),
}

/// Classify one line. Indentation is discarded, so nested list markers
/// come out as flat items.
pub(crate) fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim_end_matches('\r').trim();
    if line.is_empty() {
        return Line::Blank;
    }
    // The separator has to be tested before the divider: `---` alone is a
    // divider, `|---|---|` is not.
    if line.contains('|') && TABLE_SEPARATOR_RE.is_match(line) {
        return Line::TableSeparator;
    }
    if TABLE_ROW_RE.is_match(line) {
        return Line::TableRow(split_cells(line));
    }
    if let Some(caps) = HEADING_RE.captures(line) {
        let level = caps.get(1).map_or(1, |m| m.as_str().len());
        return Line::Heading(level, capture(&caps, line));
    }
    if DIVIDER_RE.is_match(line) {
        return Line::Divider;
    }
    if let Some(caps) = BULLET_RE.captures(line) {
        return Line::Bullet(capture(&caps, line));
    }
    if let Some(caps) = NUMBER_RE.captures(line) {
        return Line::Number(capture(&caps, line));
    }
    if let Some(caps) = QUOTE_RE.captures(line) {
        return Line::Quote(capture(&caps, line));
    }
    Line::Paragraph(line)
}

fn capture<'a>(caps: &regex::Captures<'a>, line: &'a str) -> &'a str {
    let group = caps.len() - 1;
    caps.get(group).map_or(line, |m| m.as_str().trim())
}

fn split_cells(line: &str) -> Vec<&str> {
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(str::trim).collect()
}
