use blockdoc::{
    Anchor, AnnotationId, Block, BlockId, BlockSelection, HighlightManager, MergeMode,
    MergeReport, NodeId, PaintResult, Selection, SelectionError, SelectionSpan, TextSurface,
    TextTree, VisualState,
};
use tracing::{debug, info, warn};

use crate::config::AssistConfig;
use crate::error::AssistError;

/// Captured when a request starts. A result is only applied while its token
/// still matches the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    version: u64,
}

impl RequestToken {
    pub fn version(self) -> u64 {
        self.version
    }
}

/// The one owned assist interaction: what is selected, its annotations, the
/// version counter and the merge mode.
///
/// Every new selection and every cancel bumps the version, so a reply that
/// arrives for an older request is dropped instead of applied.
#[derive(Debug, Default)]
pub struct AssistSession {
    selection: Option<Selection>,
    highlights: HighlightManager,
    version: u64,
    mode: MergeMode,
    pending: Option<RequestToken>,
    config: AssistConfig,
}

impl AssistSession {
    pub fn new() -> Self {
        AssistSession::default()
    }

    pub fn with_config(config: AssistConfig) -> Self {
        AssistSession {
            mode: config.default_mode,
            config,
            ..AssistSession::default()
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn highlights(&self) -> &HighlightManager {
        &self.highlights
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: MergeMode) {
        self.mode = mode;
    }

    pub fn pending(&self) -> Option<RequestToken> {
        self.pending
    }

    pub fn config(&self) -> &AssistConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Resolve anchors without touching the session.
    pub fn resolve_selection<T: TextTree + ?Sized>(
        &self,
        host: &T,
        start: Anchor,
        end: Anchor,
        container: NodeId,
    ) -> Result<SelectionSpan, AssistError> {
        Ok(blockdoc::resolve_selection(host, start, end, container)?)
    }

    /// Replace the current selection with a resolved and painted span.
    ///
    /// The anchors are resolved against the tree as it is now, old
    /// annotations included; the highlight manager carries the span across
    /// their teardown.
    pub fn select_span<H: TextSurface + ?Sized>(
        &mut self,
        host: &mut H,
        start: Anchor,
        end: Anchor,
        container: NodeId,
    ) -> Result<PaintResult, AssistError> {
        self.forget();
        let span = match blockdoc::resolve_selection(&*host, start, end, container) {
            Ok(span) => span,
            Err(err) => {
                debug!(%err, "selection did not resolve");
                self.highlights.teardown(host);
                return Err(err.into());
            }
        };
        self.paint(host, &span)
    }

    /// Replace the current selection with a set of whole blocks.
    pub fn select_blocks<H: TextSurface + ?Sized>(
        &mut self,
        host: &mut H,
        ids: impl IntoIterator<Item = BlockId>,
    ) -> Result<(), AssistError> {
        self.reset(host);
        let set = BlockSelection::new(ids);
        if set.ordered(&*host).is_empty() {
            return Err(SelectionError::Empty.into());
        }
        let span = set.to_span(&*host);
        if !span.is_empty() {
            self.highlights.paint(host, &span)?;
        }
        self.selection = Some(Selection::Blocks(set));
        Ok(())
    }

    /// Paint an already resolved span as the new selection.
    pub fn paint_selection<H: TextSurface + ?Sized>(
        &mut self,
        host: &mut H,
        span: &SelectionSpan,
    ) -> Result<Vec<AnnotationId>, AssistError> {
        self.forget();
        Ok(self.paint(host, span)?.annotations)
    }

    pub fn set_processing<H: TextSurface + ?Sized>(&mut self, host: &mut H, processing: bool) {
        self.highlights.set_processing(host, processing);
    }

    pub fn teardown_highlight<H: TextSurface + ?Sized>(&mut self, host: &mut H) -> usize {
        self.highlights.teardown(host)
    }

    // -----------------------------------------------------------------------
    // Request round trip
    // -----------------------------------------------------------------------

    /// Mark the selection as in flight and capture a fresh version. Starting
    /// a request again supersedes the earlier token.
    pub fn begin_request<H: TextSurface + ?Sized>(
        &mut self,
        host: &mut H,
    ) -> Result<RequestToken, AssistError> {
        if self.selection.is_none() {
            return Err(SelectionError::Empty.into());
        }
        self.version += 1;
        self.highlights.set_processing(host, true);
        let token = RequestToken {
            version: self.version,
        };
        self.pending = Some(token);
        debug!(version = token.version, mode = %self.mode, "request started");
        Ok(token)
    }

    /// Apply a reply for `token`.
    ///
    /// A token from before the latest selection or cancel is rejected
    /// without touching anything. An empty reply keeps the document and the
    /// highlight as they are.
    pub fn complete<H: TextSurface + ?Sized>(
        &mut self,
        host: &mut H,
        token: RequestToken,
        reply: &str,
    ) -> Result<MergeReport, AssistError> {
        if self.pending != Some(token) || token.version != self.version {
            debug!(got = token.version, current = self.version, "dropping stale result");
            return Err(AssistError::StaleResult {
                got: token.version,
                current: self.version,
            });
        }
        self.pending = None;

        let blocks = Self::parse_reply(reply);
        if blocks.is_empty() {
            self.highlights.set_processing(host, false);
            info!("reply was empty, nothing applied");
            return Err(AssistError::EmptyReply);
        }

        let selection = self
            .selection
            .take()
            .ok_or(AssistError::SelectionUnresolvable(SelectionError::Empty))?;
        let report = self.apply_merge(host, self.mode, &selection, &blocks)?;
        self.version += 1;

        if let Some(warning) = AssistError::degradation(&report) {
            warn!(%warning, "merge degraded");
        }
        info!(
            mode = %report.mode,
            inserted = report.inserted_blocks().len(),
            removed = report.removed_blocks().len(),
            "applied reply"
        );
        Ok(report)
    }

    /// Close the interaction: unwrap the highlight and drop whatever result
    /// is still on its way.
    pub fn cancel<H: TextSurface + ?Sized>(&mut self, host: &mut H) {
        let cleared = self.reset(host);
        debug!(cleared, version = self.version, "assist cancelled");
    }

    pub fn parse_reply(text: &str) -> Vec<Block> {
        blockdoc::parse_reply(text)
    }

    /// Merge `blocks` with the session's highlights and configured options.
    pub fn apply_merge<H: TextSurface + ?Sized>(
        &mut self,
        host: &mut H,
        mode: MergeMode,
        selection: &Selection,
        blocks: &[Block],
    ) -> Result<MergeReport, AssistError> {
        let options = self.config.merge_options();
        let report =
            blockdoc::apply_merge_with(host, &mut self.highlights, mode, selection, blocks, options)?;
        Ok(report)
    }

    pub fn is_processing(&self) -> bool {
        self.highlights.state() == VisualState::Processing
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Drop the current selection and its annotations and move to a new
    /// version.
    fn reset<H: TextSurface + ?Sized>(&mut self, host: &mut H) -> usize {
        let cleared = self.highlights.teardown(host);
        self.forget();
        cleared
    }

    /// Like `reset`, but the annotations stay until the next paint replaces
    /// them.
    fn forget(&mut self) {
        self.selection = None;
        self.pending = None;
        self.version += 1;
    }

    fn paint<H: TextSurface + ?Sized>(
        &mut self,
        host: &mut H,
        span: &SelectionSpan,
    ) -> Result<PaintResult, AssistError> {
        let painted = match self.highlights.paint(host, span) {
            Ok(painted) => painted,
            Err(err) => {
                self.highlights.teardown(host);
                return Err(err.into());
            }
        };
        // The painted bounds stay valid after the splits; the input span
        // does not.
        self.selection = Some(Selection::Span(painted.bounds.clone()));
        Ok(painted)
    }
}
