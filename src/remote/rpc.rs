use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::remote::TransportError;

/// Everything a job management service reports about one activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityInfo {
    pub activity_id: String,
    /// Service status string, e.g. `processing-running`.
    pub state: String,
    pub restart_state: Option<String>,
    pub name: Option<String>,
    pub owner: Option<String>,
    pub queue: Option<String>,
    pub exit_code: Option<i32>,
    pub submission_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub stdin: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub log_dir: Option<String>,
    pub errors: Vec<String>,
    pub execution_nodes: Vec<String>,
    pub stage_in: Vec<Url>,
    pub stage_out: Vec<Url>,
    pub session: Vec<Url>,
}

impl ActivityInfo {
    pub fn new(activity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            activity_id: activity_id.into(),
            state: state.into(),
            ..Default::default()
        }
    }
}

/// A client session with one job management service.
#[async_trait]
pub trait RpcClient: Send {
    /// Batched status query. Activities unknown to the service are simply
    /// absent from the answer.
    async fn info(&mut self, activity_ids: &[String]) -> Result<Vec<ActivityInfo>, TransportError>;

    async fn info_one(&mut self, activity_id: &str) -> Result<ActivityInfo, TransportError>;

    async fn clean(&mut self, activity_id: &str) -> Result<(), TransportError>;

    async fn kill(&mut self, activity_id: &str) -> Result<(), TransportError>;

    async fn restart(&mut self, activity_id: &str) -> Result<(), TransportError>;

    /// Renew one delegated credential, returning the handle now in use.
    async fn renew_delegation(&mut self, delegation_id: &str) -> Result<String, TransportError>;
}

#[async_trait]
pub trait RpcConnector: Send + Sync {
    async fn connect(&self, manager: &Url) -> Result<Box<dyn RpcClient>, TransportError>;
}
