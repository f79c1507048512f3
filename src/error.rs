use thiserror::Error;

use crate::identity::Identity;

/// Failure surfaced at the pipeline boundary. Cloneable so a single
/// failed computation can be reported to every caller sharing it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// Every sub-resource failed or came back empty; distinct from a
    /// clean zero-score assessment.
    #[error("no usable data for {0}")]
    NoData(Identity),
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// The shared computation was dropped before producing a result.
    #[error("analysis interrupted before completion")]
    Interrupted,
}
