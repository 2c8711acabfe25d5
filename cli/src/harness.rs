use assist::{AssistError, AssistSession};
use blockdoc::{Anchor, Document, MergeReport, SelectionError, TextTree};
use tracing::warn;

/// One end of a `--select` range: block index and char offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub block: usize,
    pub offset: usize,
}

/// What the harness selects before sending the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Span { start: Position, end: Position },
    Blocks(Vec<usize>),
}

/// Parse `B:O..B:O`.
pub fn parse_select(arg: &str) -> Result<Target, String> {
    let (start, end) = arg
        .split_once("..")
        .ok_or_else(|| format!("expected B:O..B:O, got '{}'", arg))?;
    Ok(Target::Span {
        start: parse_position(start)?,
        end: parse_position(end)?,
    })
}

fn parse_position(arg: &str) -> Result<Position, String> {
    let (block, offset) = arg
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("expected BLOCK:OFFSET, got '{}'", arg))?;
    let number = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid number '{}': {}", s, e))
    };
    Ok(Position {
        block: number(block)?,
        offset: number(offset)?,
    })
}

/// Parse a comma separated list of block indices.
pub fn parse_blocks(arg: &str) -> Result<Target, String> {
    let indices = arg
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|e| format!("invalid block index '{}': {}", part, e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Target::Blocks(indices))
}

/// Select `target`, start a request, and complete it with `reply`.
pub fn round_trip(
    doc: &mut Document,
    session: &mut AssistSession,
    target: &Target,
    reply: &str,
) -> Result<MergeReport, AssistError> {
    let ids = doc.block_ids();
    let block_at = |index: usize| {
        ids.get(index).copied().ok_or_else(|| {
            warn!(index, blocks = ids.len(), "block index out of range");
            AssistError::SelectionUnresolvable(SelectionError::Empty)
        })
    };

    match target {
        Target::Span { start, end } => {
            let first = block_at(start.block)?;
            let last = block_at(end.block)?;
            let container = if first == last { first } else { doc.root() };
            session.select_span(
                doc,
                Anchor::new(first, start.offset),
                Anchor::new(last, end.offset),
                container,
            )?;
        }
        Target::Blocks(indices) => {
            let selected = indices
                .iter()
                .map(|index| block_at(*index))
                .collect::<Result<Vec<_>, _>>()?;
            session.select_blocks(doc, selected)?;
        }
    }

    let token = session.begin_request(doc)?;
    session.complete(doc, token, reply)
}
