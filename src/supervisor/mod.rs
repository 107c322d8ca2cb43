//! Bulk management of a mixed set of jobs.
//!
//! A [`JobSupervisor`] owns the jobs it was handed, instantiates one
//! [`Controller`] per flavour present among them and fans every bulk
//! operation out to the matching controller.

pub mod registry;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use futures::future::join_all;
use url::Url;

use crate::config::ClientConfig;
use crate::controller::{
    ftp, rpc, BatchOutcome, Controller, FtpJobController, JobController, RpcJobController,
    Transports,
};
use crate::error::{GridError, Result};
use crate::job::{Job, JobState, ResourceKind};

pub use registry::{JobRegistry, RegistryError};

type Constructor = Box<dyn Fn() -> Controller + Send + Sync>;

/// Flavour name to controller constructor.
#[derive(Default)]
pub struct ControllerRegistry {
    constructors: HashMap<String, Constructor>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with both built-in flavours sharing `transports`.
    pub fn with_transports(config: &ClientConfig, transports: Transports) -> Self {
        let mut registry = Self::new();

        let (cfg, t) = (config.clone(), transports.clone());
        registry.register(ftp::FLAVOUR, move || {
            Controller::Ftp(FtpJobController::new(&cfg, &t))
        });

        let cfg = config.clone();
        registry.register(rpc::FLAVOUR, move || {
            Controller::Rpc(RpcJobController::new(&cfg, &transports))
        });

        registry
    }

    pub fn register<F>(&mut self, flavour: impl Into<String>, constructor: F)
    where
        F: Fn() -> Controller + Send + Sync + 'static,
    {
        self.constructors
            .insert(flavour.into(), Box::new(constructor));
    }

    pub fn contains(&self, flavour: &str) -> bool {
        self.constructors.contains_key(flavour)
    }

    pub fn build(&self, flavour: &str) -> Option<Controller> {
        self.constructors.get(flavour).map(|ctor| ctor())
    }
}

/// States a job must be in before its output can be retrieved.
const RETRIEVABLE: [JobState; 3] = [JobState::Finished, JobState::Failed, JobState::Killed];

#[derive(Debug, Clone, Copy)]
enum Operation<'a> {
    Update,
    Clean,
    Cancel,
    Renew,
    Resume,
    Retrieve(&'a Path),
}

/// Which of the stored jobs a supervisor takes charge of.
///
/// Clusters are matched against the host of a job's management URL and may
/// be given either as a bare host name or as a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSelection {
    /// Job ids to manage. Empty means every job.
    pub ids: Vec<String>,
    /// Only manage jobs on these clusters. Empty means every cluster.
    pub clusters: Vec<String>,
    /// Never manage jobs on these clusters.
    pub rejected_clusters: Vec<String>,
}

impl JobSelection {
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.ids.extend(ids);
        self
    }

    pub fn with_clusters(mut self, clusters: impl IntoIterator<Item = String>) -> Self {
        self.clusters.extend(clusters);
        self
    }

    pub fn with_rejected_clusters(mut self, clusters: impl IntoIterator<Item = String>) -> Self {
        self.rejected_clusters.extend(clusters);
        self
    }

    /// The job runs on a selected cluster that is not rejected.
    pub fn accepts_cluster(&self, job: &Job) -> bool {
        let Some(host) = job.management_url.host_str() else {
            return self.clusters.is_empty();
        };
        let listed = |clusters: &[String]| {
            clusters
                .iter()
                .any(|c| cluster_host(c).eq_ignore_ascii_case(host))
        };

        (self.clusters.is_empty() || listed(&self.clusters)) && !listed(&self.rejected_clusters)
    }
}

fn cluster_host(cluster: &str) -> String {
    match Url::parse(cluster) {
        Ok(url) if url.has_host() => url.host_str().unwrap_or_default().to_string(),
        _ => cluster.trim_end_matches('/').to_string(),
    }
}

pub struct JobSupervisor {
    jobs: Vec<Job>,
    controllers: BTreeMap<String, Controller>,
    missing_ids: Vec<String>,
    unsupported_flavours: Vec<String>,
}

impl JobSupervisor {
    /// Take charge of `jobs`. With a non-empty `ids` only the jobs named
    /// there are managed; names with no matching job are reported by
    /// [`JobSupervisor::missing_ids`].
    pub fn new(registry: &ControllerRegistry, jobs: Vec<Job>, ids: &[String]) -> Self {
        let selection = JobSelection::default().with_ids(ids.iter().cloned());
        Self::with_selection(registry, jobs, &selection)
    }

    /// Take charge of the jobs `selection` picks out of `jobs`. Jobs left
    /// out by the cluster lists are dropped silently; they are not missing.
    pub fn with_selection(
        registry: &ControllerRegistry,
        jobs: Vec<Job>,
        selection: &JobSelection,
    ) -> Self {
        let (jobs, missing_ids) = if selection.ids.is_empty() {
            (jobs, Vec::new())
        } else {
            let wanted: HashSet<&str> = selection.ids.iter().map(String::as_str).collect();
            let jobs: Vec<Job> = jobs
                .into_iter()
                .filter(|j| wanted.contains(j.job_id.as_str()))
                .collect();
            let found: HashSet<&str> = jobs.iter().map(|j| j.job_id.as_str()).collect();
            let missing: Vec<String> = selection
                .ids
                .iter()
                .filter(|id| !found.contains(id.as_str()))
                .cloned()
                .collect();
            (jobs, missing)
        };

        for id in &missing_ids {
            tracing::warn!(job_id = %id, "Job not found in job list");
        }

        let (jobs, skipped): (Vec<Job>, Vec<Job>) = jobs
            .into_iter()
            .partition(|job| selection.accepts_cluster(job));
        for job in &skipped {
            tracing::debug!(job_id = %job.job_id, manager = %job.management_url, "Job excluded by cluster selection");
        }

        let mut controllers = BTreeMap::new();
        let mut unsupported_flavours = Vec::new();
        for job in &jobs {
            if controllers.contains_key(&job.flavour)
                || unsupported_flavours.contains(&job.flavour)
            {
                continue;
            }
            match registry.build(&job.flavour) {
                Some(controller) => {
                    tracing::debug!(flavour = %job.flavour, "Job controller loaded");
                    controllers.insert(job.flavour.clone(), controller);
                }
                None => {
                    tracing::warn!(flavour = %job.flavour, "No job controller for flavour");
                    unsupported_flavours.push(job.flavour.clone());
                }
            }
        }

        Self {
            jobs,
            controllers,
            missing_ids,
            unsupported_flavours,
        }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn into_jobs(self) -> Vec<Job> {
        self.jobs
    }

    pub fn missing_ids(&self) -> &[String] {
        &self.missing_ids
    }

    pub fn unsupported_flavours(&self) -> &[String] {
        &self.unsupported_flavours
    }

    /// Flavours with a loaded controller.
    pub fn flavours(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }

    pub fn controller(&self, flavour: &str) -> Option<&Controller> {
        self.controllers.get(flavour)
    }

    pub async fn update(&mut self) -> BatchOutcome {
        self.dispatch(Operation::Update, None).await
    }

    pub async fn clean(&mut self) -> BatchOutcome {
        self.dispatch(Operation::Clean, None).await
    }

    pub async fn cancel(&mut self) -> BatchOutcome {
        self.dispatch(Operation::Cancel, None).await
    }

    pub async fn renew(&mut self) -> BatchOutcome {
        self.dispatch(Operation::Renew, None).await
    }

    pub async fn resume(&mut self) -> BatchOutcome {
        self.dispatch(Operation::Resume, None).await
    }

    /// Refresh every job, then cancel those now in one of `states`.
    pub async fn cancel_by_state(&mut self, states: &[JobState]) -> BatchOutcome {
        self.update().await;
        self.dispatch(Operation::Cancel, Some(states)).await
    }

    /// Refresh every job, then clean those now in one of `states`.
    pub async fn clean_by_state(&mut self, states: &[JobState]) -> BatchOutcome {
        self.update().await;
        self.dispatch(Operation::Clean, Some(states)).await
    }

    /// Refresh every job, then download the output of those that finished,
    /// failed or were killed into `download_dir/<local job id>`.
    pub async fn retrieve(&mut self, download_dir: &Path) -> BatchOutcome {
        self.update().await;
        self.dispatch(Operation::Retrieve(download_dir), Some(&RETRIEVABLE[..]))
            .await
    }

    pub async fn resource_url(&self, job_id: &str, kind: ResourceKind) -> Result<Url> {
        let (job, controller) = self.lookup(job_id)?;
        controller.resource_url(job, kind).await
    }

    pub async fn job_description(&self, job_id: &str) -> Result<String> {
        let (job, controller) = self.lookup(job_id)?;
        controller.job_description(job).await
    }

    fn lookup(&self, job_id: &str) -> Result<(&Job, &Controller)> {
        let job = self
            .jobs
            .iter()
            .find(|j| j.job_id == job_id)
            .ok_or_else(|| GridError::JobNotFound(job_id.to_string()))?;
        let controller = self
            .controllers
            .get(&job.flavour)
            .ok_or_else(|| GridError::UnknownFlavour(job.flavour.clone()))?;
        Ok((job, controller))
    }

    async fn dispatch(&mut self, op: Operation<'_>, states: Option<&[JobState]>) -> BatchOutcome {
        let mut groups: BTreeMap<String, Vec<&mut Job>> = BTreeMap::new();
        for job in self.jobs.iter_mut() {
            if states.is_some_and(|s| !s.contains(&job.state)) {
                continue;
            }
            groups.entry(job.flavour.clone()).or_default().push(job);
        }

        let mut outcome = BatchOutcome::default();
        let mut pending = Vec::with_capacity(groups.len());
        for (flavour, jobs) in groups {
            match self.controllers.get(&flavour) {
                Some(controller) => pending.push(async move {
                    match op {
                        Operation::Update => controller.update_jobs(jobs).await,
                        Operation::Clean => controller.clean_jobs(jobs).await,
                        Operation::Cancel => controller.cancel_jobs(jobs).await,
                        Operation::Renew => controller.renew_jobs(jobs).await,
                        Operation::Resume => controller.resume_jobs(jobs).await,
                        Operation::Retrieve(dir) => controller.retrieve_jobs(jobs, dir).await,
                    }
                }),
                None => {
                    tracing::warn!(%flavour, jobs = jobs.len(), operation = ?op, "Jobs of unsupported flavour not processed");
                    for job in jobs {
                        outcome.not_processed(&job.job_id);
                    }
                }
            }
        }

        outcome.merge(join_all(pending).await.into_iter().collect());
        tracing::info!(
            operation = ?op,
            processed = outcome.processed.len(),
            not_processed = outcome.not_processed.len(),
            unreachable = outcome.unreachable.len(),
            "Bulk operation finished"
        );
        outcome
    }
}
