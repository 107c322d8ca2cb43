use url::Url;

use crate::job::{Job, JobState, ResourceKind};

/// The stage-in, stage-out and session directories of one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryUrls {
    pub stage_in: Option<Url>,
    pub stage_out: Option<Url>,
    pub session: Option<Url>,
}

impl DirectoryUrls {
    /// The first URL of each kind recorded on the job.
    pub fn from_job(job: &Job) -> Self {
        Self {
            stage_in: job.stage_in_urls.first().cloned(),
            stage_out: job.stage_out_urls.first().cloned(),
            session: job.session_urls.first().cloned(),
        }
    }

    /// The directory for one of the directory resource kinds.
    pub fn get(&self, kind: ResourceKind) -> Option<&Url> {
        match kind {
            ResourceKind::StageInDir => self.stage_in.as_ref(),
            ResourceKind::StageOutDir => self.stage_out.as_ref(),
            ResourceKind::SessionDir => self.session.as_ref(),
            _ => None,
        }
    }

    /// The directory a job in `state` is working from.
    ///
    /// Jobs still staging in use the stage-in directory, jobs past execution
    /// use the stage-out directory, everything else the session directory.
    /// When the preferred one is missing the first available of session,
    /// stage-in and stage-out is used.
    pub fn for_state(&self, state: JobState) -> Option<&Url> {
        let preferred = match state {
            JobState::Accepted | JobState::Preparing => self.stage_in.as_ref(),
            JobState::Deleted
            | JobState::Failed
            | JobState::Killed
            | JobState::Finished
            | JobState::Finishing => self.stage_out.as_ref(),
            _ => self.session.as_ref(),
        };
        preferred
            .or(self.session.as_ref())
            .or(self.stage_in.as_ref())
            .or(self.stage_out.as_ref())
    }
}

/// Append `segment` to the path of `base`, inserting exactly one `/`.
pub fn join_path(base: &Url, segment: &str) -> Url {
    let mut url = base.clone();
    let path = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        segment.trim_start_matches('/')
    );
    url.set_path(&path);
    url
}
