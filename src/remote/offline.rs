use async_trait::async_trait;
use url::Url;

use crate::config::Credentials;
use crate::remote::{
    ControlConnector, ControlSession, DataMover, DelegationService, InfoFilter,
    InfoQuery, InfoRecord, RpcClient, RpcConnector, TransportError,
};

/// Stand-in for every collaborator when no transport is wired up. Each call
/// fails as if the endpoint could not be reached.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

fn unreachable(endpoint: &Url) -> TransportError {
    TransportError::Connect {
        endpoint: endpoint.to_string(),
        reason: "no transport configured".to_string(),
    }
}

#[async_trait]
impl InfoQuery for Offline {
    async fn query(
        &self,
        endpoint: &Url,
        _filter: &InfoFilter,
    ) -> Result<Vec<InfoRecord>, TransportError> {
        Err(unreachable(endpoint))
    }
}

#[async_trait]
impl ControlConnector for Offline {
    async fn connect(
        &self,
        endpoint: &Url,
        _credentials: &Credentials,
    ) -> Result<Box<dyn ControlSession>, TransportError> {
        Err(unreachable(endpoint))
    }
}

#[async_trait]
impl RpcConnector for Offline {
    async fn connect(&self, manager: &Url) -> Result<Box<dyn RpcClient>, TransportError> {
        Err(unreachable(manager))
    }
}

#[async_trait]
impl DelegationService for Offline {
    async fn renew(&self, endpoint: &Url, _delegation_id: &str) -> Result<String, TransportError> {
        Err(unreachable(endpoint))
    }
}

#[async_trait]
impl DataMover for Offline {
    async fn transfer(
        &self,
        source: &Url,
        destination: &Url,
        _credentials: &Credentials,
    ) -> Result<(), TransportError> {
        let remote = if source.scheme() == "file" {
            destination
        } else {
            source
        };
        Err(unreachable(remote))
    }

    async fn list(
        &self,
        directory: &Url,
        _credentials: &Credentials,
    ) -> Result<Vec<String>, TransportError> {
        Err(unreachable(directory))
    }
}
