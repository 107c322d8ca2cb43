//! Interfaces to the remote collaborators job controllers drive.
//!
//! The crate never speaks a wire protocol itself. Each adapter is handed
//! implementations of these traits:
//!
//! - [`InfoQuery`]: directory-style information queries
//! - [`ControlConnector`] / [`ControlSession`]: stateful command channels
//! - [`RpcConnector`] / [`RpcClient`]: session-based job management services
//! - [`DelegationService`]: credential delegation renewal
//! - [`DataMover`]: file transfers between local and remote URLs
//!
//! Implementations report failures as [`TransportError`]; timeouts are
//! applied by the caller.

pub mod control;
pub mod info;
pub mod offline;
pub mod rpc;
pub mod transfer;

use std::time::Duration;

use thiserror::Error;

pub use control::{ControlCommand, ControlConnector, ControlSession};
pub use info::{InfoFilter, InfoQuery, InfoRecord};
pub use offline::Offline;
pub use rpc::{ActivityInfo, RpcClient, RpcConnector};
pub use transfer::{DataMover, DelegationService};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Cannot connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("{operation} rejected by remote: {reason}")]
    Rejected { operation: String, reason: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// The failure concerns the host as a whole rather than one request.
    pub fn is_host_level(&self) -> bool {
        matches!(
            self,
            TransportError::Connect { .. } | TransportError::Timeout { .. }
        )
    }

    pub fn rejected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        TransportError::Rejected {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Await `fut`, turning an elapsed `timeout` into [`TransportError::Timeout`].
pub async fn bounded<T, F>(timeout: Duration, operation: &str, fut: F) -> Result<T, TransportError>
where
    F: std::future::Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            operation: operation.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_level_errors() {
        let connect = TransportError::Connect {
            endpoint: "gsiftp://ce/".to_string(),
            reason: "refused".to_string(),
        };
        let timeout = TransportError::Timeout {
            operation: "info".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(connect.is_host_level());
        assert!(timeout.is_host_level());
        assert!(!TransportError::rejected("kill", "no such job").is_host_level());
        assert!(!TransportError::Malformed("truncated".to_string()).is_host_level());
    }

    #[tokio::test]
    async fn bounded_passes_result_through() {
        let ok = bounded(Duration::from_secs(1), "noop", async {
            Ok::<_, TransportError>(7)
        })
        .await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_times_out() {
        let slow = bounded(Duration::from_millis(10), "slow", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, TransportError>(())
        })
        .await;
        match slow {
            Err(TransportError::Timeout { operation, timeout }) => {
                assert_eq!(operation, "slow");
                assert_eq!(timeout, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
