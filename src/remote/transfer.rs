use async_trait::async_trait;
use url::Url;

use crate::config::Credentials;
use crate::remote::TransportError;

/// Copies one file between two URLs. Either side may be a `file://` URL.
#[async_trait]
pub trait DataMover: Send + Sync {
    async fn transfer(
        &self,
        source: &Url,
        destination: &Url,
        credentials: &Credentials,
    ) -> Result<(), TransportError>;

    /// Paths of the files below `directory`, relative to it. Subdirectories
    /// are walked; directories themselves are not listed.
    async fn list(
        &self,
        directory: &Url,
        credentials: &Credentials,
    ) -> Result<Vec<String>, TransportError>;
}

#[async_trait]
pub trait DelegationService: Send + Sync {
    /// Renew the delegation `delegation_id` held by `endpoint` and return
    /// the new credential handle.
    async fn renew(&self, endpoint: &Url, delegation_id: &str) -> Result<String, TransportError>;
}
