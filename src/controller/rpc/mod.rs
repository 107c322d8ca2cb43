//! Controller for jobs managed by a session-based job management service.
//!
//! Client sessions are pooled per manager endpoint. Every operation leases
//! one client per manager and runs that manager's jobs through it.

pub mod pool;
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
use crate::controller::urls::{join_path, DirectoryUrls};
use crate::controller::{BatchOutcome, JobController, Transports};
use crate::error::{GridError, Result};
use crate::job::{Job, ResourceKind};
use crate::remote::{bounded, ActivityInfo, DataMover};

pub use pool::{ClientLease, ClientPool};
pub use state::state_map;

pub const FLAVOUR: &str = "EMIES";

const SUPPORTED_SCHEMES: [&str; 2] = ["http", "https"];

/// Status recorded on a job once the service accepted its cancellation.
const CANCELLED: &str = "terminal:processing-cancel";

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

/// The identifier the service knows the job by.
fn activity_id(job: &Job) -> Option<String> {
    job.activity_id
        .clone()
        .or_else(|| job.local_id().map(str::to_string))
}

/// Copy what the service reported onto `job`. Fields the answer leaves
/// empty keep their previous value; the restart state is always replaced.
pub fn apply_activity(job: &mut Job, info: &ActivityInfo) {
    job.set_state(info.state.clone(), state_map(&info.state));
    job.restart_state = info.restart_state.clone();
    if job.activity_id.is_none() {
        job.activity_id = Some(info.activity_id.clone());
    }

    macro_rules! set {
        ($($field:ident),*) => {
            $(
                if let Some(v) = &info.$field {
                    job.$field = Some(v.clone());
                }
            )*
        };
    }
    set!(name, owner, queue, exit_code, submission_time, end_time, stdin, stdout, stderr, log_dir);

    if !info.errors.is_empty() {
        job.errors = info.errors.clone();
    }
    if !info.execution_nodes.is_empty() {
        job.execution_nodes = info.execution_nodes.clone();
    }
    if !info.stage_in.is_empty() {
        job.stage_in_urls = info.stage_in.clone();
    }
    if !info.stage_out.is_empty() {
        job.stage_out_urls = info.stage_out.clone();
    }
    if !info.session.is_empty() {
        job.session_urls = info.session.clone();
    }
}

/// Resolve `kind` from the URLs and file names recorded on `job`.
fn locate(job: &Job, kind: ResourceKind) -> Option<Url> {
    let dirs = DirectoryUrls::from_job(job);
    let base = dirs.for_state(job.state);
    match kind {
        ResourceKind::StageInDir | ResourceKind::StageOutDir | ResourceKind::SessionDir => {
            dirs.get(kind).or(base).cloned()
        }
        ResourceKind::Stdin => Some(join_path(base?, job.stdin.as_deref()?)),
        ResourceKind::Stdout => Some(join_path(base?, job.stdout.as_deref()?)),
        ResourceKind::Stderr => Some(join_path(base?, job.stderr.as_deref()?)),
        ResourceKind::JobLog => {
            let log = join_path(base?, job.log_dir.as_deref()?);
            Some(join_path(&log, "errors"))
        }
        ResourceKind::JobDescription => None,
    }
}

pub struct RpcJobController {
    pool: ClientPool,
    timeout: Duration,
    credentials: Credentials,
    mover: Arc<dyn DataMover>,
}

impl RpcJobController {
    pub fn new(config: &ClientConfig, transports: &Transports) -> Self {
        Self {
            pool: ClientPool::new(transports.rpc.clone(), config.timeout),
            timeout: config.timeout,
            credentials: config.credentials.clone(),
            mover: transports.mover.clone(),
        }
    }

    /// Idle pooled clients for `manager`.
    pub fn idle_clients(&self, manager: &Url) -> usize {
        self.pool.idle_count(manager)
    }

    /// The stage-out directory of `job`, asking the service over `client`
    /// when none is recorded.
    async fn output_dir(&self, client: &mut ClientLease<'_>, job: &Job, id: &str) -> Result<Url> {
        if let Some(dir) = DirectoryUrls::from_job(job).get(ResourceKind::StageOutDir) {
            return Ok(dir.clone());
        }
        let info = bounded(self.timeout, "information query", client.info_one(id)).await?;
        let mut refreshed = job.clone();
        apply_activity(&mut refreshed, &info);
        locate(&refreshed, ResourceKind::StageOutDir).ok_or_else(|| {
            GridError::ResourceUnavailable {
                job_id: job.job_id.clone(),
                resource: ResourceKind::StageOutDir,
            }
        })
    }

    async fn apply(
        &self,
        op: Operation<'_>,
        client: &mut ClientLease<'_>,
        job: &mut Job,
    ) -> Result<()> {
        let id = activity_id(job).ok_or_else(|| GridError::InvalidJobId(job.job_id.clone()))?;

        match op {
            Operation::Clean => {
                bounded(self.timeout, "clean", client.clean(&id)).await?;
            }
            Operation::Cancel => {
                bounded(self.timeout, "kill", client.kill(&id)).await?;
                job.set_state(CANCELLED, state_map(CANCELLED));
            }
            Operation::Renew => {
                let mut renewed = Vec::with_capacity(job.delegation_ids.len());
                for delegation_id in &job.delegation_ids {
                    let handle = bounded(
                        self.timeout,
                        "delegation renewal",
                        client.renew_delegation(delegation_id),
                    )
                    .await?;
                    renewed.push(handle);
                }
                job.delegation_ids = renewed;
            }
            Operation::Resume => {
                bounded(self.timeout, "restart", client.restart(&id)).await?;
                job.restart_state = None;
            }
            Operation::Retrieve(download_dir) => {
                let source = self.output_dir(client, job, &id).await?;
                let destination = job_download_dir(download_dir, &id)?;
                let download = Download {
                    mover: self.mover.as_ref(),
                    credentials: &self.credentials,
                    timeout: self.timeout,
                };
                let files = download
                    .directory(&job.job_id, &source, &destination)
                    .await?;
                tracing::info!(job_id = %job.job_id, files, destination = %destination.display(), "Job downloaded");
            }
        }
        Ok(())
    }

    async fn apply_on_manager(&self, op: Operation<'_>, jobs: Vec<&mut Job>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let Some(manager) = jobs.first().map(|j| j.management_url.clone()) else {
            return outcome;
        };
        let host = host_key(&manager);

        let mut lease = match self.pool.acquire(&manager).await {
            Ok(lease) => lease,
            Err(e) => {
                tracing::warn!(manager = %manager, operation = op.name(), error = %e, "Cannot reach job manager");
                for job in &jobs {
                    outcome.not_processed(&job.job_id);
                }
                if e.is_host_level() {
                    outcome.unreachable(&host);
                }
                return outcome;
            }
        };

        let mut jobs = jobs.into_iter();
        while let Some(job) = jobs.next() {
            match self.apply(op, &mut lease, job).await {
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
                _ if activity_id(job).is_none() => Some("no activity id"),
                _ => None,
            };
            match precondition {
                Some(reason) => {
                    tracing::info!(job_id = %job.job_id, operation = op.name(), reason, "Job skipped");
                    outcome.not_processed(&job.job_id);
                }
                None => ready.push(job),
            }
        }

        let groups = group_by_endpoint(ready, |j| endpoint_key(&j.management_url));
        let results = join_all(
            groups
                .into_values()
                .map(|jobs| self.apply_on_manager(op, jobs)),
        )
        .await;
        outcome.merge(results.into_iter().collect());
        outcome
    }

    async fn update_manager(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let Some(manager) = jobs.first().map(|j| j.management_url.clone()) else {
            return outcome;
        };
        let host = host_key(&manager);

        let mut queried = Vec::with_capacity(jobs.len());
        for job in jobs {
            match activity_id(job) {
                Some(id) => queried.push((id, job)),
                None => {
                    tracing::warn!(job_id = %job.job_id, "Job has no activity id");
                    outcome.not_processed(&job.job_id);
                }
            }
        }
        if queried.is_empty() {
            return outcome;
        }

        let answer = match self.pool.acquire(&manager).await {
            Ok(mut lease) => {
                let ids: Vec<String> = queried.iter().map(|(id, _)| id.clone()).collect();
                bounded(self.timeout, "information query", lease.info(&ids)).await
            }
            Err(e) => Err(e),
        };

        let infos = match answer {
            Ok(infos) => infos,
            Err(e) => {
                tracing::warn!(manager = %manager, error = %e, "Information query failed");
                for (_, job) in &queried {
                    outcome.not_processed(&job.job_id);
                }
                if e.is_host_level() {
                    outcome.unreachable(&host);
                }
                return outcome;
            }
        };

        for (id, job) in queried {
            match infos.iter().find(|info| info.activity_id == id) {
                Some(info) => {
                    apply_activity(job, info);
                    outcome.processed(&job.job_id);
                }
                None => {
                    tracing::warn!(job_id = %job.job_id, "Job information is not yet available");
                    outcome.not_processed(&job.job_id);
                }
            }
        }
        outcome
    }

    /// One `info_one` round trip for `job`. A job without an activity id is
    /// rejected before a client is leased.
    async fn fetch_activity(&self, job: &Job) -> Result<ActivityInfo> {
        let id = activity_id(job).ok_or_else(|| GridError::InvalidJobId(job.job_id.clone()))?;
        let mut lease = self.pool.acquire(&job.management_url).await?;
        Ok(bounded(self.timeout, "information query", lease.info_one(&id)).await?)
    }
}

#[async_trait]
impl JobController for RpcJobController {
    fn flavour(&self) -> &'static str {
        FLAVOUR
    }

    fn is_endpoint_supported(&self, endpoint: &Url) -> bool {
        SUPPORTED_SCHEMES.contains(&endpoint.scheme())
    }

    async fn update_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        let groups = group_by_endpoint(jobs, |j| endpoint_key(&j.management_url));
        join_all(groups.into_values().map(|jobs| self.update_manager(jobs)))
            .await
            .into_iter()
            .collect()
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

    /// A directory recorded on the job is returned as is. Anything else is
    /// resolved against a fresh answer from the service, selected by the
    /// state the service reports.
    async fn resource_url(&self, job: &Job, kind: ResourceKind) -> Result<Url> {
        if kind == ResourceKind::JobDescription {
            return Err(GridError::Unsupported {
                flavour: FLAVOUR,
                operation: "job description URL",
            });
        }

        if let Some(dir) = DirectoryUrls::from_job(job).get(kind) {
            return Ok(dir.clone());
        }

        let info = self.fetch_activity(job).await.map_err(|e| {
            tracing::info!(job_id = %job.job_id, error = %e, "Failed retrieving information for job");
            e
        })?;
        let mut refreshed = job.clone();
        apply_activity(&mut refreshed, &info);

        locate(&refreshed, kind).ok_or_else(|| GridError::ResourceUnavailable {
            job_id: job.job_id.clone(),
            resource: kind,
        })
    }

    async fn job_description(&self, job: &Job) -> Result<String> {
        tracing::info!(job_id = %job.job_id, "Retrieving the job description is not supported by this service");
        Err(GridError::Unsupported {
            flavour: FLAVOUR,
            operation: "job description",
        })
    }
}
