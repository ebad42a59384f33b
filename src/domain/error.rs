/// Error type for archive mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("no entry with id {0}")]
    NotFound(String),
    #[error("entry {0} cannot be its own parent")]
    SelfParent(String),
    #[error("moving {target} under {parent} would create a cycle")]
    Cycle { target: String, parent: String },
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("end time {end} is before start time {start}")]
    InvalidInterval { start: String, end: String },
}

impl ModelError {
    /// Not-found errors come from stale ids (an entry deleted elsewhere)
    /// and are treated as no-ops by the application layer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
