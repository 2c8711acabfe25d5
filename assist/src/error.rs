use std::path::PathBuf;

use blockdoc::{Degradation, MergeError, MergeReport, SelectionError};
use thiserror::Error;

/// Everything an assist round trip can report. None of these is fatal:
/// each one leaves the document valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistError {
    /// The anchors no longer point at live text. Apply stays disabled until
    /// a new selection exists.
    #[error("nothing selected: {0}")]
    SelectionUnresolvable(#[from] SelectionError),
    #[error("the reply produced no blocks")]
    EmptyReply,
    #[error("dropped result of request {got}; the session is at {current}")]
    StaleResult { got: u64, current: u64 },
    #[error("selected text was not found, the reply was appended instead")]
    AnchorNotFound,
}

impl AssistError {
    /// Silent kinds are dropped without telling the user anything beyond an
    /// informational notice.
    pub fn is_silent(&self) -> bool {
        matches!(self, AssistError::EmptyReply | AssistError::StaleResult { .. })
    }

    /// The warning carried by a merge that succeeded in a degraded way.
    pub fn degradation(report: &MergeReport) -> Option<AssistError> {
        match report.degraded? {
            Degradation::AnchorNotFound => Some(AssistError::AnchorNotFound),
        }
    }
}

impl From<MergeError> for AssistError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::EmptyReply => AssistError::EmptyReply,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}
