use tracing::{debug, warn};

use crate::selection::{SelectionError, SelectionSpan, SpanFragment};
use crate::tree::{BlockId, NodeId, TextSurface, TextTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(pub u64);

/// Presentation state of the painted selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualState {
    #[default]
    Idle,
    Processing,
}

/// A visible marker wrapping one fragment of a painted span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub id: AnnotationId,
    /// The annotation element inserted into the tree.
    pub wrapper: NodeId,
    /// The text fragment inside the wrapper.
    pub fragment: NodeId,
    pub state: VisualState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaintResult {
    pub annotations: Vec<AnnotationId>,
    /// The painted span re-expressed over the wrapped fragments. Offsets of
    /// the span passed to `paint` do not survive the splits.
    pub bounds: SelectionSpan,
}

/// Owns the annotations of the one active selection.
#[derive(Debug, Default)]
pub struct HighlightManager {
    active: Vec<Annotation>,
    original_text: String,
    anchor: Option<BlockId>,
    state: VisualState,
    next_id: u64,
}

impl HighlightManager {
    pub fn new() -> Self {
        HighlightManager::default()
    }

    pub fn is_active(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.active
    }

    pub fn state(&self) -> VisualState {
        self.state
    }

    /// Block that held the end of the painted span. Survives edits that
    /// destroy the wrappers, until teardown.
    pub fn anchor_block(&self) -> Option<BlockId> {
        self.anchor
    }

    /// Wrap every fragment of `span` in an annotation. Partially covered
    /// fragments are split at the span offsets first so only the covered
    /// chars end up inside. Any previous annotations are torn down.
    ///
    /// `span` may be resolved against the currently painted tree: it is
    /// carried across the teardown as block-relative offsets.
    pub fn paint<H: TextSurface + ?Sized>(
        &mut self,
        host: &mut H,
        span: &SelectionSpan,
    ) -> Result<PaintResult, SelectionError> {
        if span.is_empty() {
            return Err(SelectionError::Empty);
        }
        if span.is_stale(&*host) {
            warn!("refusing to paint a stale selection");
            return Err(SelectionError::Stale);
        }

        let remapped;
        let span = if self.is_active() {
            let ranges = span.block_ranges(&*host);
            self.teardown(host);
            remapped = SelectionSpan::from_block_ranges(&*host, &ranges, span.original_text.clone());
            if remapped.is_empty() {
                warn!("selection did not survive highlight teardown");
                return Err(SelectionError::Stale);
            }
            &remapped
        } else {
            span
        };

        let mut bounds = SelectionSpan {
            fragments: Vec::with_capacity(span.fragments.len()),
            original_text: span.original_text.clone(),
        };
        let mut created = Vec::with_capacity(span.fragments.len());

        for piece in &span.fragments {
            let len = host.text_len(piece.fragment);
            let mut target = piece.fragment;
            // Right edge first: the left part keeps the original handle.
            if piece.end < len && host.split_at(target, piece.end).is_none() {
                continue;
            }
            if piece.start > 0 {
                match host.split_at(target, piece.start) {
                    Some(right) => target = right,
                    None => continue,
                }
            }

            let id = AnnotationId(self.next_id);
            self.next_id += 1;
            let Some(wrapper) = host.wrap_in_annotation(target, id) else {
                continue;
            };
            self.active.push(Annotation {
                id,
                wrapper,
                fragment: target,
                state: VisualState::Idle,
            });
            bounds.fragments.push(SpanFragment {
                fragment: target,
                start: 0,
                end: piece.end - piece.start,
                revision: host.revision(target).unwrap_or_default(),
            });
            created.push(id);
        }

        self.original_text = span.original_text.clone();
        self.anchor = self
            .active
            .last()
            .and_then(|annotation| host.block_of(annotation.wrapper));
        self.state = VisualState::Idle;
        debug!(annotations = created.len(), "painted selection");
        Ok(PaintResult {
            annotations: created,
            bounds,
        })
    }

    /// Toggle the processing look of every active annotation.
    pub fn set_processing<H: TextSurface + ?Sized>(&mut self, host: &mut H, processing: bool) {
        let state = if processing {
            VisualState::Processing
        } else {
            VisualState::Idle
        };
        for annotation in &mut self.active {
            host.set_annotation_state(annotation.wrapper, state);
            annotation.state = state;
        }
        self.state = state;
    }

    /// Unwrap every annotation in place and normalize the touched parents.
    /// Returns how many wrappers were removed; a no-op when nothing is
    /// painted.
    pub fn teardown<H: TextSurface + ?Sized>(&mut self, host: &mut H) -> usize {
        if self.active.is_empty() {
            self.clear();
            return 0;
        }

        let mut parents: Vec<NodeId> = Vec::new();
        let mut unwrapped = 0;
        for annotation in self.active.drain(..) {
            let Some(parent) = host.parent(annotation.wrapper) else {
                continue;
            };
            if host.unwrap(annotation.wrapper) {
                unwrapped += 1;
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        }
        for parent in parents {
            if host.contains(parent) {
                host.normalize(parent);
            }
        }

        self.clear();
        debug!(unwrapped, "tore down highlight");
        unwrapped
    }

    /// True when every wrapper is still in place and together they still
    /// hold exactly the captured text.
    pub fn is_intact<T: TextTree + ?Sized>(&self, tree: &T) -> bool {
        !self.active.is_empty()
            && self.active.iter().all(|annotation| {
                tree.annotation(annotation.wrapper).map(|(id, _)| id) == Some(annotation.id)
            })
            && self.painted_text(tree) == self.original_text
    }

    /// Concatenated text of the live wrappers.
    pub fn painted_text<T: TextTree + ?Sized>(&self, tree: &T) -> String {
        self.active
            .iter()
            .filter(|annotation| tree.contains(annotation.wrapper))
            .map(|annotation| tree.text_content(annotation.wrapper))
            .collect()
    }

    /// Hand the annotations over to a caller that will consume the wrappers
    /// itself, leaving the manager empty.
    pub fn take(&mut self) -> Vec<Annotation> {
        self.clear();
        std::mem::take(&mut self.active)
    }

    fn clear(&mut self) {
        self.original_text.clear();
        self.anchor = None;
        self.state = VisualState::Idle;
    }
}
