use serde::{Deserialize, Serialize};

/// Protocol-neutral job state. Every backend maps its own status strings
/// onto this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    Undefined,
    Accepted,
    Preparing,
    Submitting,
    Queuing,
    Running,
    Finishing,
    Finished,
    Killed,
    Failed,
    Deleted,
    Other,
}

impl JobState {
    pub const ALL: [JobState; 12] = [
        JobState::Undefined,
        JobState::Accepted,
        JobState::Preparing,
        JobState::Submitting,
        JobState::Queuing,
        JobState::Running,
        JobState::Finishing,
        JobState::Finished,
        JobState::Killed,
        JobState::Failed,
        JobState::Deleted,
        JobState::Other,
    ];

    /// The job will not change state again on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Finished | JobState::Killed | JobState::Failed | JobState::Deleted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Undefined => "Undefined",
            JobState::Accepted => "Accepted",
            JobState::Preparing => "Preparing",
            JobState::Submitting => "Submitting",
            JobState::Queuing => "Queuing",
            JobState::Running => "Running",
            JobState::Finishing => "Finishing",
            JobState::Finished => "Finished",
            JobState::Killed => "Killed",
            JobState::Failed => "Failed",
            JobState::Deleted => "Deleted",
            JobState::Other => "Other",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    /// Case-insensitive parse of the general state names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown job state '{}'", s))
    }
}
