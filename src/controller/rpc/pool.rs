use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use url::Url;

use crate::controller::grouping::endpoint_key;
use crate::remote::{bounded, RpcClient, RpcConnector, TransportError};

/// Idle client sessions, keyed by manager endpoint.
pub struct ClientPool {
    connector: Arc<dyn RpcConnector>,
    timeout: Duration,
    idle: Mutex<HashMap<String, Vec<Box<dyn RpcClient>>>>,
}

impl ClientPool {
    pub fn new(connector: Arc<dyn RpcConnector>, timeout: Duration) -> Self {
        Self {
            connector,
            timeout,
            idle: Mutex::new(HashMap::new()),
        }
    }

    /// Take an idle client for `manager`, connecting a new one if none is
    /// left. The client goes back to the pool when the lease is dropped.
    pub async fn acquire(&self, manager: &Url) -> Result<ClientLease<'_>, TransportError> {
        let key = endpoint_key(manager);
        let idle = self.idle.lock().get_mut(&key).and_then(Vec::pop);

        let client = match idle {
            Some(client) => client,
            None => {
                tracing::debug!(manager = %key, "Connecting new client");
                bounded(self.timeout, "connect", self.connector.connect(manager)).await?
            }
        };

        Ok(ClientLease {
            pool: self,
            key,
            client: Some(client),
        })
    }

    /// Number of clients for `manager` currently waiting in the pool.
    pub fn idle_count(&self, manager: &Url) -> usize {
        self.idle
            .lock()
            .get(&endpoint_key(manager))
            .map_or(0, Vec::len)
    }

    fn release(&self, key: String, client: Box<dyn RpcClient>) {
        self.idle.lock().entry(key).or_default().push(client);
    }
}

/// Exclusive use of one pooled client.
pub struct ClientLease<'p> {
    pool: &'p ClientPool,
    key: String,
    client: Option<Box<dyn RpcClient>>,
}

impl Deref for ClientLease<'_> {
    type Target = dyn RpcClient;

    fn deref(&self) -> &Self::Target {
        self.client
            .as_deref()
            .expect("lease holds a client until dropped")
    }
}

impl DerefMut for ClientLease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client
            .as_deref_mut()
            .expect("lease holds a client until dropped")
    }
}

impl Drop for ClientLease<'_> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(std::mem::take(&mut self.key), client);
        }
    }
}
