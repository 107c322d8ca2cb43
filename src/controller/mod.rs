//! Remote job lifecycle control.
//!
//! A [`JobController`] manages batches of jobs of a single flavour. Two
//! adapters implement it:
//!
//! - [`ftp::FtpJobController`]: polls an information system and mutates
//!   jobs over per-job control connections
//! - [`rpc::RpcJobController`]: talks to a job management service through
//!   pooled client sessions
//!
//! # Batch semantics
//!
//! Bulk operations never fail as a whole. Each job ends up in either
//! [`BatchOutcome::processed`] or [`BatchOutcome::not_processed`]; hosts
//! that could not be reached at all are additionally listed in
//! [`BatchOutcome::unreachable`]. Jobs are grouped per remote endpoint with
//! [`grouping::group_by_endpoint`]; groups run concurrently, jobs within a
//! group run one after the other.

pub mod ftp;
pub mod grouping;
pub mod retrieve;
pub mod rpc;
pub mod urls;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::job::{Job, ResourceKind};
use crate::remote::{
    ControlConnector, DataMover, DelegationService, InfoQuery, Offline, RpcConnector,
};

pub use ftp::FtpJobController;
pub use rpc::RpcJobController;

/// Partition of a batch into jobs that were and were not handled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub processed: Vec<String>,
    pub not_processed: Vec<String>,
    /// Hosts whose transport failed during the call.
    pub unreachable: Vec<String>,
}

impl BatchOutcome {
    pub fn processed(&mut self, job_id: &str) {
        self.processed.push(job_id.to_string());
    }

    pub fn not_processed(&mut self, job_id: &str) {
        self.not_processed.push(job_id.to_string());
    }

    pub fn unreachable(&mut self, host: &str) {
        if !self.unreachable.iter().any(|h| h == host) {
            self.unreachable.push(host.to_string());
        }
    }

    pub fn merge(&mut self, other: BatchOutcome) {
        self.processed.extend(other.processed);
        self.not_processed.extend(other.not_processed);
        for host in other.unreachable {
            self.unreachable(&host);
        }
    }

    /// Every job was processed and every host answered.
    pub fn is_complete(&self) -> bool {
        self.not_processed.is_empty() && self.unreachable.is_empty()
    }

    pub fn total(&self) -> usize {
        self.processed.len() + self.not_processed.len()
    }
}

impl FromIterator<BatchOutcome> for BatchOutcome {
    fn from_iter<I: IntoIterator<Item = BatchOutcome>>(iter: I) -> Self {
        let mut merged = BatchOutcome::default();
        for outcome in iter {
            merged.merge(outcome);
        }
        merged
    }
}

/// Lifecycle operations on remote jobs of one flavour.
#[async_trait]
pub trait JobController: Send + Sync {
    /// Flavour name recorded on the jobs this controller manages.
    fn flavour(&self) -> &'static str;

    fn is_endpoint_supported(&self, endpoint: &Url) -> bool;

    /// Refresh state and descriptive fields, one remote query per host.
    async fn update_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome;

    /// Remove the jobs' remote artifacts.
    async fn clean_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome;

    /// Request termination. Cancelled jobs end up in a terminal state.
    async fn cancel_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome;

    /// Renew every delegation of every job. Jobs without delegations are
    /// not processed.
    async fn renew_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome;

    /// Restart jobs from their restart state. Jobs without one are not
    /// processed.
    async fn resume_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome;

    /// Download every file of each job's output directory into
    /// `download_dir/<local job id>`. A job is processed once all of its
    /// files arrived.
    async fn retrieve_jobs(&self, jobs: Vec<&mut Job>, download_dir: &Path) -> BatchOutcome;

    async fn resource_url(&self, job: &Job, kind: ResourceKind) -> Result<Url>;

    /// The job description as originally submitted.
    async fn job_description(&self, job: &Job) -> Result<String>;
}

/// Remote collaborators shared by all controllers of one client.
#[derive(Clone)]
pub struct Transports {
    pub info: Arc<dyn InfoQuery>,
    pub control: Arc<dyn ControlConnector>,
    pub rpc: Arc<dyn RpcConnector>,
    pub delegation: Arc<dyn DelegationService>,
    pub mover: Arc<dyn DataMover>,
}

impl Transports {
    /// Collaborators that fail every call as unreachable.
    pub fn offline() -> Self {
        Self {
            info: Arc::new(Offline),
            control: Arc::new(Offline),
            rpc: Arc::new(Offline),
            delegation: Arc::new(Offline),
            mover: Arc::new(Offline),
        }
    }
}

/// The closed set of controller implementations.
pub enum Controller {
    Ftp(FtpJobController),
    Rpc(RpcJobController),
}

impl Controller {
    fn inner(&self) -> &dyn JobController {
        match self {
            Controller::Ftp(c) => c,
            Controller::Rpc(c) => c,
        }
    }
}

#[async_trait]
impl JobController for Controller {
    fn flavour(&self) -> &'static str {
        self.inner().flavour()
    }

    fn is_endpoint_supported(&self, endpoint: &Url) -> bool {
        self.inner().is_endpoint_supported(endpoint)
    }

    async fn update_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        self.inner().update_jobs(jobs).await
    }

    async fn clean_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        self.inner().clean_jobs(jobs).await
    }

    async fn cancel_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        self.inner().cancel_jobs(jobs).await
    }

    async fn renew_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        self.inner().renew_jobs(jobs).await
    }

    async fn resume_jobs(&self, jobs: Vec<&mut Job>) -> BatchOutcome {
        self.inner().resume_jobs(jobs).await
    }

    async fn retrieve_jobs(&self, jobs: Vec<&mut Job>, download_dir: &Path) -> BatchOutcome {
        self.inner().retrieve_jobs(jobs, download_dir).await
    }

    async fn resource_url(&self, job: &Job, kind: ResourceKind) -> Result<Url> {
        self.inner().resource_url(job, kind).await
    }

    async fn job_description(&self, job: &Job) -> Result<String> {
        self.inner().job_description(job).await
    }
}
