use crate::job::JobState;

/// Map a job management service status onto [`JobState`].
///
/// Terminal statuses carry attributes after a colon, e.g.
/// `terminal:client-cancel,processing-cancel`. The attributes decide which
/// terminal state applies.
pub fn state_map(raw: &str) -> JobState {
    let lowered = raw.trim().to_ascii_lowercase();
    let status = lowered.strip_prefix("emies:").unwrap_or(&lowered);
    let (primary, attributes) = match status.split_once(':') {
        Some((primary, attributes)) => (primary, attributes),
        None => (status, ""),
    };

    match primary {
        "" => JobState::Undefined,
        "accepted" => JobState::Accepted,
        "preprocessing" => JobState::Preparing,
        "processing-accepting" => JobState::Submitting,
        "processing-queued" => JobState::Queuing,
        "processing-running" | "processing" => JobState::Running,
        "postprocessing" => JobState::Finishing,
        "terminal" => terminal_state(attributes),
        _ => JobState::Other,
    }
}

fn terminal_state(attributes: &str) -> JobState {
    let attrs: Vec<&str> = attributes
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .collect();

    if attrs.iter().any(|a| a.ends_with("-cancel")) {
        JobState::Killed
    } else if attrs.iter().any(|a| a.ends_with("-failure")) {
        JobState::Failed
    } else if attrs
        .iter()
        .any(|a| *a == "validity-timeout" || *a == "expired")
    {
        JobState::Deleted
    } else {
        JobState::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_statuses() {
        assert_eq!(state_map("accepted"), JobState::Accepted);
        assert_eq!(state_map("preprocessing"), JobState::Preparing);
        assert_eq!(state_map("processing-accepting"), JobState::Submitting);
        assert_eq!(state_map("processing-queued"), JobState::Queuing);
        assert_eq!(state_map("processing-running"), JobState::Running);
        assert_eq!(state_map("postprocessing"), JobState::Finishing);
        assert_eq!(state_map("emies:Processing-Running"), JobState::Running);
    }

    #[test]
    fn terminal_attributes() {
        assert_eq!(state_map("terminal"), JobState::Finished);
        assert_eq!(state_map("terminal:app-success"), JobState::Finished);
        assert_eq!(
            state_map("terminal:client-cancel,processing-cancel"),
            JobState::Killed
        );
        assert_eq!(state_map("terminal:app-failure"), JobState::Failed);
        assert_eq!(state_map("terminal:validity-timeout"), JobState::Deleted);
        assert_eq!(state_map("emies:terminal:expired"), JobState::Deleted);
    }

    #[test]
    fn unknown_and_empty() {
        assert_eq!(state_map(""), JobState::Undefined);
        assert_eq!(state_map("vacuuming"), JobState::Other);
    }
}
