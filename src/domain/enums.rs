use std::fmt;

/// Classification of an entry, derived from its timestamps.
///
/// The persisted format has no tag for this: a missing end time means
/// running, and an end time equal to the start time marks a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryKind {
    #[default]
    Running,
    Done,
    Project,
}

impl EntryKind {
    /// Classify from the raw persisted timestamps
    pub fn classify(start_time: &str, end_time: Option<&str>) -> Self {
        match end_time {
            None => Self::Running,
            Some(end) if end == start_time => Self::Project,
            Some(_) => Self::Done,
        }
    }

    /// Short label used in listings
    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Project => "PROJECT",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_project(&self) -> bool {
        matches!(self, Self::Project)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What caused a "model changed" signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A command mutated the in-memory archive
    Mutated,
    /// The archive was rebuilt from disk after an external edit
    Reloaded,
    /// A different archive document became active
    AddressSwitched,
}
