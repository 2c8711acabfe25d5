use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

/// A construct the block model has no room for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    NestedList,
    CodeBlock,
    RawHtml,
    Image,
}

impl LossKind {
    pub fn message(self) -> &'static str {
        match self {
            LossKind::NestedList => "nested list flattened",
            LossKind::CodeBlock => "code block flattened into a paragraph",
            LossKind::RawHtml => "raw HTML dropped",
            LossKind::Image => "image dropped",
        }
    }

    fn label(self) -> &'static str {
        match self {
            LossKind::NestedList => "this list is nested",
            LossKind::CodeBlock => "this code block",
            LossKind::RawHtml => "this HTML",
            LossKind::Image => "this image",
        }
    }

    fn note(self) -> &'static str {
        match self {
            LossKind::NestedList => {
                "indentation is not kept; nested items become list items of their own"
            }
            LossKind::CodeBlock => "reports have no code blocks; the lines are joined with spaces",
            LossKind::RawHtml => "only markdown structure is loaded",
            LossKind::Image => "reports carry text only",
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Part of a markdown report that was approximated or dropped while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub kind: LossKind,
    /// Byte range in the source.
    pub span: Range<usize>,
    pub file_id: usize,
}

impl LoadWarning {
    pub fn new(kind: LossKind, span: Range<usize>, file_id: usize) -> Self {
        LoadWarning {
            kind,
            span,
            file_id,
        }
    }

    pub fn message(&self) -> &'static str {
        self.kind.message()
    }

    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let label = Label::primary(self.file_id, self.span.clone()).with_message(self.kind.label());
        Diagnostic::warning()
            .with_message(self.kind.message())
            .with_labels(vec![label])
            .with_notes(vec![self.kind.note().to_string()])
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at bytes {}..{}", self.kind, self.span.start, self.span.end)
    }
}
