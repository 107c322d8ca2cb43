//! Controller for jobs managed through an information system and a
//! per-job control channel.
//!
//! Status comes from one merged information query per info endpoint. Every
//! mutation opens its own control session against the job URL, changes into
//! the job's parent directory, issues one command and disconnects.

pub mod info;
pub mod state;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use url::Url;

use crate::config::{ClientConfig, Credentials};
use crate::controller::grouping::{endpoint_key, group_by_endpoint, host_key};
use crate::controller::retrieve::{job_download_dir, Download};
use crate::controller::urls::join_path;
use crate::controller::{BatchOutcome, JobController, Transports};
use crate::error::{GridError, Result};
use crate::job::{Job, JobState, ResourceKind};
use crate::remote::{
    bounded, ControlCommand, ControlConnector, DataMover, DelegationService, InfoFilter, InfoQuery,
    TransportError,
};

pub use state::state_map;

pub const FLAVOUR: &str = "ARC0";

const SUPPORTED_SCHEMES: [&str; 3] = ["gsiftp", "ftp", "ldap"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation<'a> {
    Clean,
    Cancel,
    Renew,
    Resume,
    /// Download into the given directory.
    Retrieve(&'a Path),
}

impl Operation<'_> {
    fn name(&self) -> &'static str {
        match self {
            Operation::Clean => "clean",
            Operation::Cancel => "cancel",
            Operation::Renew => "renew",
            Operation::Resume => "resume",
            Operation::Retrieve(_) => "retrieve",
        }
    }
}

/// Split a job URL path into the jobs directory and the job's own id,
/// e.g. `/jobs/12345` into `("/jobs", "12345")`.
fn split_job_path(job: &Job, url: &Url) -> Result<(String, String)> {
    let path = url.path().trim_end_matches('/');
    match path.rsplit_once('/') {
        Some((dir, id)) if !id.is_empty() => {
            let dir = if dir.is_empty() { "/" } else { dir };
            Ok((dir.to_string(), id.to_string()))
        }
        _ => Err(GridError::InvalidJobId(job.job_id.clone())),
    }
}

/// A sibling of the job directory under the jobs directory, e.g.
/// `/jobs/info/12345/description` for the suffix `description`.
fn info_url(job: &Job, url: &Url, suffix: &str) -> Result<Url> {
    let (dir, id) = split_job_path(job, url)?;
    let mut info = url.clone();
    info.set_path(&format!(
        "{}/info/{}/{}",
        dir.trim_end_matches('/'),
        id,
        suffix
    ));
    Ok(info)
}

pub struct FtpJobController {
    timeout: Duration,
    credentials: Credentials,
    info: Arc<dyn InfoQuery>,
    control: Arc<dyn ControlConnector>,
    delegation: Arc<dyn DelegationService>,
    mover: Arc<dyn DataMover>,
}

impl FtpJobController {
    pub fn new(config: &ClientConfig, transports: &Transports) -> Self {
        Self {
            timeout: config.timeout,
            credentials: config.credentials.clone(),
            info: transports.info.clone(),
            control: transports.control.clone(),
            delegation: transports.delegation.clone(),
            mover: transports.mover.clone(),
        }
    }

    /// Connect, send `commands` in order and disconnect. The session is
    /// disconnected even when a command fails; the first error wins.
    async fn run_control_sequence(
        &self,
        endpoint: &Url,
        commands: &[ControlCommand],
    ) -> std::result::Result<(), TransportError> {
        let mut session = bounded(
            self.timeout,
            "connect",
            self.control.connect(endpoint, &self.credentials),
        )
        .await?;

        let mut result = Ok(());
        for command in commands {
            if let Err(e) = bounded(self.timeout, "control command", session.send(command)).await
            {
                tracing::debug!(endpoint = %endpoint, %command, error = %e, "Control command failed");
                result = Err(e);
                break;
            }
        }

        let closed = bounded(self.timeout, "disconnect", session.disconnect()).await;
        result.and(closed)
    }

    async fn renew_delegations(&self, job: &Job, url: &Url) -> Result<()> {
        for delegation_id in &job.delegation_ids {
            bounded(
                self.timeout,
                "delegation renewal",
                self.delegation.renew(url, delegation_id),
            )
            .await?;
        }
        Ok(())
    }

    /// Write the restart directive for `id` and push it to the site's
    /// action directory.
    async fn push_restart_directive(&self, url: &Url, dir: &str, id: &str) -> Result<()> {
        let directive = tempfile::NamedTempFile::new()?;
        tokio::fs::write(
            directive.path(),
            format!("&(action=restart)(jobid={})", id),
        )
        .await?;

        let source = Url::from_file_path(directive.path())
            .map_err(|_| GridError::Internal("temporary file path is not absolute".to_string()))?;
        let mut destination = url.clone();
        destination.set_path(&format!("{}/new/action", dir.trim_end_matches('/')));

        bounded(
            self.timeout,
            "restart directive upload",
            self.mover
                .transfer(&source, &destination, &self.credentials),
        )
        .await?;
        Ok(())
    }

    fn download(&self) -> Download<'_> {
        Download {
            mover: self.mover.as_ref(),
            credentials: &self.credentials,
            timeout: self.timeout,
        }
    }

    async fn apply(&self, op: Operation<'_>, job: &mut Job) -> Result<()> {
        let url = job.job_url()?;
        let (dir, id) = split_job_path(job, &url)?;

        match op {
            Operation::Clean => {
                self.run_control_sequence(
                    &url,
                    &[ControlCommand::ChangeDir(dir), ControlCommand::RemoveDir(id)],
                )
                .await?;
            }
            Operation::Cancel => {
                self.run_control_sequence(
                    &url,
                    &[ControlCommand::ChangeDir(dir), ControlCommand::Delete(id)],
                )
                .await?;
                job.set_state("KILLED", JobState::Killed);
            }
            Operation::Renew => {
                self.renew_delegations(job, &url).await?;
                // Entering the session directory hands the refreshed proxy
                // to the job.
                self.run_control_sequence(
                    &url,
                    &[ControlCommand::ChangeDir(dir), ControlCommand::ChangeDir(id)],
                )
                .await?;
            }
            Operation::Resume => {
                if job.can_renew() {
                    if let Err(e) = self.renew_delegations(job, &url).await {
                        tracing::warn!(job_id = %job.job_id, error = %e, "Credential renewal before resume failed");
                    }
                }
                tracing::info!(
                    job_id = %job.job_id,
                    restart_state = job.restart_state.as_deref().unwrap_or_default(),
                    "Resuming job"
                );
                self.push_restart_directive(&url, &dir, &id).await?;
                job.restart_state = None;
            }
            Operation::Retrieve(download_dir) => {
                // The job URL is the session directory.
                let destination = job_download_dir(download_dir, &id)?;
                let files = self
                    .download()
                    .directory(&job.job_id, &url, &destination)
                    .await?;
                tracing::info!(job_id = %job.job_id, files, destination = %destination.display(), "Job downloaded");
            }
        }
        Ok(())
    }

    /// Run `op` for every job of one host, in order. A host-level transport
    /// failure stops the host: the failing job and all jobs after it are
    /// not processed.
    async fn apply_on_host(
        &self,
        op: Operation<'_>,
        host: String,
        jobs: Vec<&mut Job>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut jobs = jobs.into_iter();

        while let Some(job) = jobs.next() {
            match self.apply(op, job).await {
                Ok(()) => {
                    tracing::debug!(job_id = %job.job_id, operation = op.name(), "Job operation successful");
                    outcome.processed(&job.job_id);
                }
                Err(GridError::Transport(e)) if e.is_host_level() => {
                    tracing::warn!(%host, operation = op.name(), error = %e, "Host unreachable");
                    outcome.not_processed(&job.job_id);
                    for rest in jobs.by_ref() {
                        outcome.not_processed(&rest.job_id);
                    }
                    outcome.unreachable(&host);
                }
                Err(e) => {
                    tracing::warn!(job_id = %job.job_id, operation = op.name(), error = %e, "Job operation failed");
                    outcome.not_processed(&job.job_id);
                }
            }
        }
        outcome
    }

    async fn apply_all(&self, op: Operation<'_>, jobs: Vec<&mut Job>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut ready = Vec::with_capacity(jobs.len());

        for job in jobs {
            let precondition = match op {
                Operation::Renew if !job.can_renew() => Some("no delegation associated"),
                Operation::Resume if !job.is_resumable() => Some("no resumable state reported"),
                _ => None,
            };
            if let Some(reason) = precondition {
                tracing::info!(job_id = %job.job_id, operation = op.name(), reason, "Job skipped");
                outcome.not_processed(&job.job_id);
                continue;
            }
            match job.job_url() {
                Ok(_) => ready.push(job),
                Err(e) => {
                    tracing::warn!(error = %e, "Job skipped");
                    outcome.not_processed(&job.job_id);
                }
            }
        }

        let groups = group_by_endpoint(ready, |j| {
            j.job_url().map(|url| host_key(&url)).unwrap_or_default()
        });
        let results = join_all(
            groups
                .into_iter()
                .map(|(host, jobs)| self.apply_on_host(op, host, jobs)),
        )
        .await;
        outcome.merge(results.into_iter().collect());
        outcome
    }

    async fn update_host(&self, key: String, jobs: Vec<&mut Job>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let Some(mut endpoint) = jobs.first().and_then(|j| j.info_endpoint.clone()) else {
            return outcome;
        };
        endpoint.set_query(None);
        endpoint.set_fragment(None);

        let filter = InfoFilter::any_of(jobs.iter().map(|j| j.job_id.clone()));
        tracing::debug!(endpoint = %endpoint, jobs = filter.len(), "Querying job information");

        let records = match bounded(
            self.timeout,
            "information query",
            self.info.query(&endpoint, &filter),
        )
        .await
        {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(endpoint = %key, error = %e, "Information query failed");
                for job in &jobs {
                    outcome.not_processed(&job.job_id);
                }
                if e.is_host_level() {
                    outcome.unreachable(&key);
                }
                return outcome;
            }
        };

        for job in jobs {
            let record = records
                .iter()
                .find(|r| r.get(info::GLOBAL_ID) == Some(job.job_id.as_str()));
            match record {
                Some(record) => {
                    info::apply_record(job, record);
                    outcome.processed(&job.job_id);
                }
                None => {
                    tracing::warn!(job_id = %job.job_id, "Job information not found in the information system");
                    outcome.not_processed(&job.job_id);
                }
            }
        }
        outcome
    }
}

#[async_trait]
impl JobController for FtpJobController {
    fn flavour(&self) -> &'static str {
        FLAVOUR
    }

    fn is_endpoint_supported(&self, endpoint: &Url) -> bool {
        SUPPORTED_SCHEMES.contains(&endpoint.scheme())
    }

    async fn update_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let (known, unknown): (Vec<&mut Job>, Vec<&mut Job>) =
            jobs.into_iter().partition(|j| j.info_endpoint.is_some());
        for job in unknown {
            tracing::warn!(job_id = %job.job_id, "Job has no information endpoint");
            outcome.not_processed(&job.job_id);
        }

        let groups = group_by_endpoint(known, |j| {
            j.info_endpoint
                .as_ref()
                .map(endpoint_key)
                .unwrap_or_default()
        });
        let results = join_all(
            groups
                .into_iter()
                .map(|(key, jobs)| self.update_host(key, jobs)),
        )
        .await;
        outcome.merge(results.into_iter().collect());
        outcome
    }

    async fn clean_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        self.apply_all(Operation::Clean, jobs).await
    }

    async fn cancel_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        self.apply_all(Operation::Cancel, jobs).await
    }

    async fn renew_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        self.apply_all(Operation::Renew, jobs).await
    }

    async fn resume_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        self.apply_all(Operation::Resume, jobs).await
    }

    async fn retrieve_jobs(&self, jobs: Vec<&mut Job>, download_dir: &Path) -> BatchOutcome {
        self.apply_all(Operation::Retrieve(download_dir), jobs).await
    }

    /// Every URL is derived from the job id; the session directory doubles
    /// as stage-in and stage-out directory.
    async fn resource_url(&self, job: &Job, kind: ResourceKind) -> Result<Url> {
        let url = job.job_url()?;
        let unavailable = || GridError::ResourceUnavailable {
            job_id: job.job_id.clone(),
            resource: kind,
        };

        match kind {
            ResourceKind::Stdin => {
                let file = job.stdin.as_deref().ok_or_else(unavailable)?;
                Ok(join_path(&url, file))
            }
            ResourceKind::Stdout => {
                let file = job.stdout.as_deref().ok_or_else(unavailable)?;
                Ok(join_path(&url, file))
            }
            ResourceKind::Stderr => {
                let file = job.stderr.as_deref().ok_or_else(unavailable)?;
                Ok(join_path(&url, file))
            }
            ResourceKind::JobLog => info_url(job, &url, "errors"),
            ResourceKind::StageInDir | ResourceKind::StageOutDir | ResourceKind::SessionDir => {
                Ok(url)
            }
            ResourceKind::JobDescription => info_url(job, &url, "description"),
        }
    }

    async fn job_description(&self, job: &Job) -> Result<String> {
        tracing::info!(job_id = %job.job_id, "Retrieving job description from cluster");
        let source = self
            .resource_url(job, ResourceKind::JobDescription)
            .await?;

        let local = tempfile::NamedTempFile::new()?;
        let destination = Url::from_file_path(local.path())
            .map_err(|_| GridError::Internal("temporary file path is not absolute".to_string()))?;
        bounded(
            self.timeout,
            "job description download",
            self.mover
                .transfer(&source, &destination, &self.credentials),
        )
        .await?;

        let stored = tokio::fs::read_to_string(local.path()).await?;
        match info::extract_client_description(&stored) {
            Some(description) => {
                tracing::debug!(job_id = %job.job_id, %description, "Job description retrieved");
                Ok(description)
            }
            None => {
                tracing::warn!(job_id = %job.job_id, "Client description not found in stored description");
                Err(GridError::ResourceUnavailable {
                    job_id: job.job_id.clone(),
                    resource: ResourceKind::JobDescription,
                })
            }
        }
    }
}
