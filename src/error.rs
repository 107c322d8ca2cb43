use thiserror::Error;

use crate::job::ResourceKind;
use crate::remote::TransportError;
use crate::supervisor::registry::RegistryError;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("No job controller registered for flavour {0}")]
    UnknownFlavour(String),

    #[error("{operation} is not supported by the {flavour} job controller")]
    Unsupported {
        flavour: &'static str,
        operation: &'static str,
    },

    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    #[error("No {resource} URL available for job {job_id}")]
    ResourceUnavailable {
        job_id: String,
        resource: ResourceKind,
    },

    #[error("{failed} of {total} files of job {job_id} could not be downloaded")]
    IncompleteDownload {
        job_id: String,
        failed: usize,
        total: usize,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GridError>;
