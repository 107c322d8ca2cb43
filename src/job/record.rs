use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GridError, Result};
use crate::job::JobState;

/// Resources a job controller can resolve a URL for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Stdin,
    Stdout,
    Stderr,
    JobLog,
    StageInDir,
    StageOutDir,
    SessionDir,
    JobDescription,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Stdin => write!(f, "stdin"),
            ResourceKind::Stdout => write!(f, "stdout"),
            ResourceKind::Stderr => write!(f, "stderr"),
            ResourceKind::JobLog => write!(f, "joblog"),
            ResourceKind::StageInDir => write!(f, "stage-in dir"),
            ResourceKind::StageOutDir => write!(f, "stage-out dir"),
            ResourceKind::SessionDir => write!(f, "session dir"),
            ResourceKind::JobDescription => write!(f, "job description"),
        }
    }
}

/// One managed job.
///
/// Identity fields are written once at submission. Everything else is
/// refreshed by the job controller of the job's flavour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub flavour: String,
    pub management_url: Url,
    #[serde(default)]
    pub info_endpoint: Option<Url>,
    #[serde(default)]
    pub activity_id: Option<String>,

    #[serde(default)]
    pub state: JobState,
    /// Backend status string `state` was mapped from.
    #[serde(default)]
    pub raw_state: String,
    #[serde(default)]
    pub restart_state: Option<String>,
    #[serde(default)]
    pub delegation_ids: Vec<String>,

    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub execution_ce: Option<String>,
    #[serde(default)]
    pub submission_host: Option<String>,
    #[serde(default)]
    pub submission_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub used_slots: Option<u32>,
    /// Seconds.
    #[serde(default)]
    pub used_cpu_time: Option<u64>,
    /// Seconds.
    #[serde(default)]
    pub used_wall_time: Option<u64>,
    /// Kilobytes.
    #[serde(default)]
    pub used_memory: Option<u64>,
    #[serde(default)]
    pub waiting_position: Option<u32>,

    #[serde(default)]
    pub stdin: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub log_dir: Option<String>,

    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub execution_nodes: Vec<String>,
    #[serde(default)]
    pub other_messages: Option<String>,

    #[serde(default)]
    pub stage_in_urls: Vec<Url>,
    #[serde(default)]
    pub stage_out_urls: Vec<Url>,
    #[serde(default)]
    pub session_urls: Vec<Url>,
}

impl Job {
    pub fn new(job_id: impl Into<String>, flavour: impl Into<String>, management_url: Url) -> Self {
        Self {
            job_id: job_id.into(),
            flavour: flavour.into(),
            management_url,
            info_endpoint: None,
            activity_id: None,
            state: JobState::Undefined,
            raw_state: String::new(),
            restart_state: None,
            delegation_ids: Vec::new(),
            name: None,
            owner: None,
            queue: None,
            execution_ce: None,
            submission_host: None,
            submission_time: None,
            end_time: None,
            exit_code: None,
            used_slots: None,
            used_cpu_time: None,
            used_wall_time: None,
            used_memory: None,
            waiting_position: None,
            stdin: None,
            stdout: None,
            stderr: None,
            log_dir: None,
            errors: Vec::new(),
            execution_nodes: Vec::new(),
            other_messages: None,
            stage_in_urls: Vec::new(),
            stage_out_urls: Vec::new(),
            session_urls: Vec::new(),
        }
    }

    /// The job id parsed as a URL.
    pub fn job_url(&self) -> Result<Url> {
        Url::parse(&self.job_id).map_err(|_| GridError::InvalidJobId(self.job_id.clone()))
    }

    /// Last path segment of the job id, the identifier the site itself uses.
    pub fn local_id(&self) -> Option<&str> {
        self.job_id
            .trim_end_matches('/')
            .rsplit_once('/')
            .map(|(_, id)| id)
            .filter(|id| !id.is_empty())
    }

    pub fn is_resumable(&self) -> bool {
        self.restart_state.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn can_renew(&self) -> bool {
        !self.delegation_ids.is_empty()
    }

    /// Record a backend status string together with its mapped state.
    pub fn set_state(&mut self, raw: impl Into<String>, state: JobState) {
        self.raw_state = raw.into();
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> Job {
        Job::new(
            id,
            "ARC0",
            Url::parse("gsiftp://ce.example.org:2811/jobs").unwrap(),
        )
    }

    #[test]
    fn new_job_defaults() {
        let j = job("gsiftp://ce.example.org:2811/jobs/12345");
        assert_eq!(j.state, JobState::Undefined);
        assert!(j.raw_state.is_empty());
        assert!(!j.is_resumable());
        assert!(!j.can_renew());
    }

    #[test]
    fn local_id_is_last_segment() {
        assert_eq!(
            job("gsiftp://ce.example.org:2811/jobs/12345").local_id(),
            Some("12345")
        );
        assert_eq!(
            job("gsiftp://ce.example.org:2811/jobs/12345/").local_id(),
            Some("12345")
        );
        assert_eq!(job("12345").local_id(), None);
    }

    #[test]
    fn job_url_rejects_opaque_ids() {
        assert!(job("gsiftp://ce.example.org:2811/jobs/1").job_url().is_ok());
        assert!(matches!(
            job("not a url").job_url(),
            Err(GridError::InvalidJobId(_))
        ));
    }

    #[test]
    fn empty_restart_state_is_not_resumable() {
        let mut j = job("gsiftp://ce/jobs/1");
        j.restart_state = Some(String::new());
        assert!(!j.is_resumable());
        j.restart_state = Some("FINISHING".to_string());
        assert!(j.is_resumable());
    }

    #[test]
    fn sparse_record_deserializes() {
        let json = r#"{
            "job_id": "https://ce.example.org:443/arex/abc",
            "flavour": "EMIES",
            "management_url": "https://ce.example.org:443/arex"
        }"#;
        let j: Job = serde_json::from_str(json).unwrap();
        assert_eq!(j.flavour, "EMIES");
        assert_eq!(j.state, JobState::Undefined);
        assert!(j.delegation_ids.is_empty());
    }
}
