use crate::job::JobState;

/// Map a `nordugrid-job-status` value onto [`JobState`].
///
/// Statuses reported while the grid manager holds the job back carry a
/// `PENDING:` prefix; they map like the status they are pending in.
pub fn state_map(raw: &str) -> JobState {
    let state = raw.strip_prefix("PENDING:").unwrap_or(raw);
    match state {
        "" => JobState::Undefined,
        "ACCEPTING" | "ACCEPTED" => JobState::Accepted,
        "PREPARING" | "PREPARED" => JobState::Preparing,
        "SUBMIT" | "SUBMITTING" => JobState::Submitting,
        "INLRMS:Q" => JobState::Queuing,
        "INLRMS:R" | "INLRMS:EXECUTED" | "INLRMS:S" | "INLRMS:E" => JobState::Running,
        "FINISHING" | "KILLING" | "CANCELING" | "EXECUTED" => JobState::Finishing,
        "FINISHED" => JobState::Finished,
        "KILLED" => JobState::Killed,
        "FAILED" => JobState::Failed,
        "DELETED" => JobState::Deleted,
        _ => JobState::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses() {
        let cases = [
            ("ACCEPTING", JobState::Accepted),
            ("ACCEPTED", JobState::Accepted),
            ("PREPARING", JobState::Preparing),
            ("PREPARED", JobState::Preparing),
            ("SUBMIT", JobState::Submitting),
            ("SUBMITTING", JobState::Submitting),
            ("INLRMS:Q", JobState::Queuing),
            ("INLRMS:R", JobState::Running),
            ("INLRMS:EXECUTED", JobState::Running),
            ("INLRMS:S", JobState::Running),
            ("INLRMS:E", JobState::Running),
            ("FINISHING", JobState::Finishing),
            ("KILLING", JobState::Finishing),
            ("CANCELING", JobState::Finishing),
            ("EXECUTED", JobState::Finishing),
            ("FINISHED", JobState::Finished),
            ("KILLED", JobState::Killed),
            ("FAILED", JobState::Failed),
            ("DELETED", JobState::Deleted),
        ];
        for (raw, expected) in cases {
            assert_eq!(state_map(raw), expected, "{}", raw);
        }
    }

    #[test]
    fn pending_prefix_is_stripped() {
        assert_eq!(state_map("PENDING:ACCEPTED"), JobState::Accepted);
        assert_eq!(state_map("PENDING:INLRMS:Q"), JobState::Queuing);
    }

    #[test]
    fn mapping_is_total() {
        assert_eq!(state_map(""), JobState::Undefined);
        assert_eq!(state_map("INLRMS:O"), JobState::Other);
        assert_eq!(state_map("finished"), JobState::Other);
        assert_eq!(state_map("PENDING:"), JobState::Undefined);
    }
}
